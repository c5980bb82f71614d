//! Shared data model, error taxonomy, configuration loader and LLM adapter
//! used by every Tom process (gateway, backend, providers).

pub mod config;
pub mod error;
pub mod llm;
pub mod logging;
pub mod model;

pub use error::{Result, TomError};
