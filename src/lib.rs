pub mod api;
pub mod commands;
pub mod config;
pub mod error;
pub mod events;
pub mod feeds;
pub mod session;
pub mod state;
