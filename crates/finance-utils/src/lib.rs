//! Shared utilities for the finance agent system
//!
//! This crate provides the ambient pieces every other crate in the workspace
//! leans on: logging setup, `.env` loading, typed environment lookups, and the
//! general (non-sensitive) application settings.

pub mod config;
pub mod env;
pub mod logging;

pub use config::{KeyReport, Settings};
pub use env::{load_dotenv, parse_bool, parse_int};
pub use logging::{LogOptions, init_tracing};
