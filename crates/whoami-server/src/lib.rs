pub mod accounting;
pub mod app;
pub mod config;
pub mod enrich;
pub mod error;
pub mod routes;
pub mod state;
