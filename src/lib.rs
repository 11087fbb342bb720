pub mod cli;
pub mod config;
pub mod confirm;
pub mod coordinator;
pub mod error;
pub mod hooks;
pub mod trust;
pub mod workspace;
