pub mod client;
pub mod dashboard;
pub mod models;
pub mod reconcile;
