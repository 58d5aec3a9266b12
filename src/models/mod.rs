//! Models Module - Data Structures & Configuration
//!
//! Single source of truth for explorer wire types, the normalized
//! contract bundle, configuration and error codes.

pub mod config;
pub mod errors;
pub mod types;

pub use config::*;
pub use errors::*;
pub use types::*;
