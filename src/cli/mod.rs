//! Command handlers for the `ethwallet` binary

pub mod commands;

pub use commands::*;
