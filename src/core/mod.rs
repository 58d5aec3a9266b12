//! Core Module - resolution and analysis pipeline
//!
//! `resolver` drives normalizer, proxy and ABI fetching into a
//! `ContractBundle`; `orchestrator` turns a bundle into a Markdown report.

pub mod abi;
pub mod normalizer;
pub mod orchestrator;
pub mod prompt;
pub mod proxy;
pub mod resolver;

pub use abi::*;
pub use normalizer::*;
pub use orchestrator::*;
pub use prompt::*;
pub use proxy::*;
pub use resolver::*;
