pub mod commands;
pub mod config;
pub mod display;
pub mod error;
pub mod protocol;
pub mod session;
pub mod transcript;
