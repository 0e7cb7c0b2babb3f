pub mod match_store;
