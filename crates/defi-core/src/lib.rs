pub mod action;
pub mod builder;
pub mod chain;
pub mod config;
pub mod engine;
pub mod error;
pub mod io;
pub mod paths;
pub mod planner;
pub mod provider;
pub mod registry;
pub mod types;

#[cfg(test)]
mod testing;

pub use error::{DefiError, ErrorKind, Result};
