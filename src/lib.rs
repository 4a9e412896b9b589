pub mod api;
pub mod config;
pub mod errors;
pub mod flow;
pub mod metrics;
pub mod models;
pub mod odds;
pub mod settlement;
pub mod status;
pub mod store;
pub mod wallet;
