pub mod advisory;
pub mod api;
pub mod classifier;
pub mod config;
pub mod error;
pub mod store;
pub mod summary;
