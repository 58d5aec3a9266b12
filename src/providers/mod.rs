//! Providers Module - External Data Sources
//!
//! HTTP clients for Etherscan-family explorers and the inference endpoint.

pub mod explorer;
pub mod inference;

pub use explorer::*;
pub use inference::*;
