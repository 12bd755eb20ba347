//! Core FolioSync library (session, brokers, portfolio sync, config).

pub mod auth;
pub mod brokers;
pub mod client;
pub mod config;
pub mod portfolio;
