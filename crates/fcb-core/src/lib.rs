//! Core domain + application logic for the File Compiler Bot.
//!
//! This crate is intentionally framework-agnostic. Telegram lives behind a
//! port (trait) implemented in the adapter crate.

pub mod archive;
pub mod config;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod logging;
pub mod menu;
pub mod messaging;
pub mod security;
pub mod session;
pub mod storage;
pub mod utils;

pub use errors::{Error, Result};
