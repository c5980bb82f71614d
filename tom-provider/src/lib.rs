//! Generic scaffolding shared by every Tom tool-provider binary: the
//! [`protocol::ToolProvider`] trait, an axum HTTP harness, and a SQLite
//! read-through cache with background refresh.

pub mod cache;
pub mod http;
pub mod protocol;

pub use cache::ProviderCache;
pub use protocol::{ToolOutcome, ToolProvider};
