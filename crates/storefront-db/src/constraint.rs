//! Translation of storage constraint violations into catalog errors.
//!
//! Application-level pre-checks can race with concurrent writers. The partial
//! unique indexes and check constraints are the final authority, so a
//! violation reported by PostgreSQL is mapped back to the same error the
//! pre-check would have produced.

use tracing::debug;
use uuid::Uuid;

use storefront_core::Error;

/// SQLSTATE for unique_violation.
pub const UNIQUE_VIOLATION: &str = "23505";
/// SQLSTATE for foreign_key_violation.
pub const FOREIGN_KEY_VIOLATION: &str = "23503";
/// SQLSTATE for check_violation.
pub const CHECK_VIOLATION: &str = "23514";

pub const CATEGORY_NAME_LIVE: &str = "uq_category_name_live";
pub const CHILD_LIVE: &str = "uq_category_children_child_live";
pub const PAIR_LIVE: &str = "uq_category_children_pair_live";
pub const NO_SELF: &str = "ck_category_children_no_self";

/// The write that produced the error.
#[derive(Debug, Clone, Copy)]
pub enum WriteContext<'a> {
    Category { name: &'a str },
    Relation { parent_id: Uuid, child_id: Uuid },
    Product { category_id: Uuid },
}

/// Map a sqlx error raised by a write into a typed catalog error.
///
/// Anything that is not a recognised constraint violation is returned as
/// `Error::Database`.
pub fn translate(err: sqlx::Error, ctx: WriteContext<'_>) -> Error {
    let (code, constraint) = match &err {
        sqlx::Error::Database(e) => (
            e.code().map(|c| c.into_owned()).unwrap_or_default(),
            e.constraint().map(str::to_string).unwrap_or_default(),
        ),
        _ => return Error::Database(err),
    };

    let translated = match (code.as_str(), constraint.as_str(), ctx) {
        (UNIQUE_VIOLATION, CATEGORY_NAME_LIVE, WriteContext::Category { name }) => {
            Some(Error::DuplicateName(name.to_string()))
        }
        (UNIQUE_VIOLATION, CHILD_LIVE | PAIR_LIVE, WriteContext::Relation { child_id, .. }) => {
            Some(Error::AlreadyHasParent { child_id })
        }
        (CHECK_VIOLATION, NO_SELF, WriteContext::Relation { child_id, .. }) => {
            Some(Error::SelfReference(child_id))
        }
        (
            FOREIGN_KEY_VIOLATION,
            c,
            WriteContext::Relation {
                parent_id,
                child_id,
            },
        ) => {
            let missing = if c.contains("parent") {
                parent_id
            } else {
                child_id
            };
            Some(Error::category_not_found(missing))
        }
        (FOREIGN_KEY_VIOLATION, _, WriteContext::Product { category_id }) => {
            Some(Error::category_not_found(category_id))
        }
        _ => None,
    };

    match translated {
        Some(e) => {
            debug!(
                subsystem = "database",
                component = "constraint",
                constraint = %constraint,
                error_kind = e.kind(),
                "Constraint violation translated"
            );
            e
        }
        None => Error::Database(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::borrow::Cow;

    #[derive(Debug)]
    struct FakePgError {
        code: &'static str,
        constraint: &'static str,
    }

    impl std::fmt::Display for FakePgError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "violates constraint {}", self.constraint)
        }
    }

    impl std::error::Error for FakePgError {}

    impl DatabaseError for FakePgError {
        fn message(&self) -> &str {
            "constraint violated"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed(self.code))
        }

        fn constraint(&self) -> Option<&str> {
            Some(self.constraint)
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            match self.code {
                UNIQUE_VIOLATION => ErrorKind::UniqueViolation,
                FOREIGN_KEY_VIOLATION => ErrorKind::ForeignKeyViolation,
                CHECK_VIOLATION => ErrorKind::CheckViolation,
                _ => ErrorKind::Other,
            }
        }
    }

    fn violation(code: &'static str, constraint: &'static str) -> sqlx::Error {
        sqlx::Error::Database(Box::new(FakePgError { code, constraint }))
    }

    #[test]
    fn test_duplicate_name() {
        let err = translate(
            violation(UNIQUE_VIOLATION, CATEGORY_NAME_LIVE),
            WriteContext::Category { name: "Laptop" },
        );
        assert!(matches!(err, Error::DuplicateName(n) if n == "Laptop"));
    }

    #[test]
    fn test_child_and_pair_uniqueness_mean_already_has_parent() {
        let parent_id = Uuid::new_v4();
        let child_id = Uuid::new_v4();
        for constraint in [CHILD_LIVE, PAIR_LIVE] {
            let err = translate(
                violation(UNIQUE_VIOLATION, constraint),
                WriteContext::Relation {
                    parent_id,
                    child_id,
                },
            );
            assert!(matches!(err, Error::AlreadyHasParent { child_id: c } if c == child_id));
        }
    }

    #[test]
    fn test_self_loop_check() {
        let id = Uuid::new_v4();
        let err = translate(
            violation(CHECK_VIOLATION, NO_SELF),
            WriteContext::Relation {
                parent_id: id,
                child_id: id,
            },
        );
        assert!(matches!(err, Error::SelfReference(_)));
    }

    #[test]
    fn test_foreign_key_names_the_missing_side() {
        let parent_id = Uuid::new_v4();
        let child_id = Uuid::new_v4();
        let err = translate(
            violation(FOREIGN_KEY_VIOLATION, "category_children_parent_id_fkey"),
            WriteContext::Relation {
                parent_id,
                child_id,
            },
        );
        assert!(err.to_string().contains(&parent_id.to_string()));
    }

    #[test]
    fn test_unrelated_errors_pass_through() {
        let err = translate(
            violation(UNIQUE_VIOLATION, "some_other_index"),
            WriteContext::Category { name: "x" },
        );
        assert!(matches!(err, Error::Database(_)));

        let err = translate(sqlx::Error::RowNotFound, WriteContext::Category { name: "x" });
        assert!(matches!(err, Error::Database(_)));
    }
}
