//! Centralized default constants for the storefront catalog.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates should reference these constants instead of defining their own
//! magic numbers.

// =============================================================================
// PAGINATION
// =============================================================================

/// Default page size for category searches.
pub const PAGE_LIMIT: i64 = 50;

/// Largest page size a caller may request.
pub const PAGE_LIMIT_MAX: i64 = 1000;

// =============================================================================
// CACHE
// =============================================================================

/// TTL for single-category entries (10 minutes).
pub const CACHE_ENTITY_TTL_SECS: u64 = 600;

/// TTL for list and search aggregates (5 minutes).
pub const CACHE_LIST_TTL_SECS: u64 = 300;

/// Upper bound on any single cache round trip before falling back to the store.
pub const CACHE_OP_TIMEOUT_MS: u64 = 250;

/// Namespace prepended to every cache key.
pub const CACHE_PREFIX: &str = "sf:";

// =============================================================================
// HIERARCHY
// =============================================================================

/// Upper bound on ancestor-chain walks. The domain uses two levels; anything
/// longer than this indicates corrupted relation data.
pub const MAX_ANCESTOR_WALK: usize = 64;
