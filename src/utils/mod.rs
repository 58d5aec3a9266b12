//! Utils Module - Shared constants and process telemetry
//!
//! `constants` is the single source of truth for endpoints, defaults and
//! prompt texts.

pub mod constants;
pub mod telemetry;

pub use constants::*;
pub use telemetry::*;
