pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod graph;
pub mod handlers;
pub mod models;
pub mod patch;
pub mod routes;
pub mod server;
pub mod services;
pub mod store;

pub use error::ApiError;
pub use handlers::AppState;
pub use routes::app;
