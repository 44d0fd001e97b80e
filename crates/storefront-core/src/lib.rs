//! # storefront-core
//!
//! Core types, traits, and abstractions for the storefront catalog.
//!
//! This crate provides the foundational data structures and trait definitions
//! that the storage and HTTP crates depend on.

pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod search;
pub mod traits;
pub mod uuid_utils;

#[cfg(feature = "mock")]
pub mod mock;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use models::*;
pub use search::*;
pub use traits::*;
pub use uuid_utils::new_v7;
