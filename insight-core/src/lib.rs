//! InsightProfile Core - Shared Types
//!
//! Entities, identity normalization, the error taxonomy and configuration.
//! Every other crate in the workspace depends on this one; it carries no I/O.

pub mod config;
pub mod entities;
pub mod error;
pub mod health;
pub mod identity;

pub use config::*;
pub use entities::*;
pub use error::*;
pub use health::*;
pub use identity::*;
