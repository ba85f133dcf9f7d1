pub mod api;
pub mod app;
pub mod auth;
pub mod cli;
pub mod config;
pub mod lifecycle;
pub mod logging;
pub mod state;
pub mod worker_seed;
