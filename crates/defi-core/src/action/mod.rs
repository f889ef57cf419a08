//! Action plans and their persistence.
//!
//! Provides `Action`, `ActionStep`, `Constraints` and `ActionStore`. They form the
//! data layer shared by the planners, the builder registry and the engine.

pub mod model;
pub mod store;

pub use model::{Action, ActionStep, Constraints};
pub use store::ActionStore;
