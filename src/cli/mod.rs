// src/cli/mod.rs
pub mod types;

pub use types::{Cli, Commands};
