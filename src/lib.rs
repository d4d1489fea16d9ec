// src/lib.rs
pub mod api;
pub mod config;
pub mod health;
pub mod metrics;
pub mod recommendation;
pub mod server;
