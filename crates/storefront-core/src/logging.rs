//! Structured logging schema and field name constants for the catalog.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation can query by the same names across subsystems.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied (cache outage, rollback) |
//! | INFO  | Lifecycle events (startup, shutdown), completed mutations |
//! | DEBUG | Cache hits/misses, decision points, config choices |
//! | TRACE | Per-item iteration (ancestor walks, projection rows) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "api", "catalog", "cache", "database"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "hierarchy", "category_service", "category_cache", "pool"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "add_child", "remove", "hard_delete", "invalidate"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Category UUID being operated on.
pub const CATEGORY_ID: &str = "category_id";

/// Parent side of a relation.
pub const PARENT_ID: &str = "parent_id";

/// Child side of a relation.
pub const CHILD_ID: &str = "child_id";

/// Cache key or key pattern.
pub const CACHE_KEY: &str = "cache_key";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of results returned by a search or listing.
pub const RESULT_COUNT: &str = "result_count";

/// Number of cache keys removed by an invalidation.
pub const KEYS_REMOVED: &str = "keys_removed";

// ─── Database fields ───────────────────────────────────────────────────────

/// Number of active connections in the pool.
pub const POOL_SIZE: &str = "pool_size";

/// Number of idle connections in the pool.
pub const POOL_IDLE: &str = "pool_idle";

/// Database constraint that rejected a write.
pub const CONSTRAINT: &str = "constraint";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Error kind when an operation fails.
pub const ERROR_KIND: &str = "error_kind";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_names_are_snake_case() {
        for field in [
            SUBSYSTEM,
            COMPONENT,
            CATEGORY_ID,
            PARENT_ID,
            CHILD_ID,
            CACHE_KEY,
            DURATION_MS,
            RESULT_COUNT,
            KEYS_REMOVED,
            POOL_SIZE,
            POOL_IDLE,
            CONSTRAINT,
            ERROR_KIND,
            ERROR_MSG,
        ] {
            assert!(field
                .chars()
                .all(|c| c.is_ascii_lowercase() || c == '_'));
        }
    }
}
