pub mod models;
pub mod reconciler;
pub mod views;
