//! Human input → canonical chain, asset and amount values.

pub mod amount;
pub mod assets;
pub mod chains;

pub use amount::{format_units, normalize_amount, parse_base_units, parse_units, NormalizedAmount};
pub use assets::{parse_address, resolve_asset, Asset};
pub use chains::{resolve_chain, Chain};
