pub mod browser_ai;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod models;
pub mod profiles;
pub mod secrets;

pub use error::{AppError, Result};
