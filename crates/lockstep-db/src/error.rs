//! Outcome classification for operations issued through a [`Session`].
//!
//! [`Session`]: crate::session::Session

use thiserror::Error;

/// SQLSTATE `serialization_failure`.
pub const SERIALIZATION_FAILURE: &str = "40001";
/// SQLSTATE `deadlock_detected`.
pub const DEADLOCK_DETECTED: &str = "40P01";

/// Why the database refused an operation.
///
/// `Conflict` covers the failures a concurrent transaction can provoke and a
/// script may want to answer with a rollback. Everything else is `Other`.
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("{message} (SQLSTATE {code})")]
    Conflict { code: String, message: String },

    #[error(transparent)]
    Other(sqlx::Error),
}

impl ResourceError {
    /// Whether this is a concurrent-access conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

impl From<sqlx::Error> for ResourceError {
    fn from(err: sqlx::Error) -> Self {
        let conflict = err.as_database_error().and_then(|db_err| {
            let code = db_err.code()?;
            is_conflict_code(&code).then(|| (code.into_owned(), db_err.message().to_owned()))
        });
        match conflict {
            Some((code, message)) => Self::Conflict { code, message },
            None => Self::Other(err),
        }
    }
}

fn is_conflict_code(code: &str) -> bool {
    code == SERIALIZATION_FAILURE || code == DEADLOCK_DETECTED
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_codes() {
        assert!(is_conflict_code("40001"));
        assert!(is_conflict_code("40P01"));
        assert!(!is_conflict_code("23505"));
    }

    #[test]
    fn non_database_errors_are_other() {
        let err = ResourceError::from(sqlx::Error::RowNotFound);
        assert!(!err.is_conflict());
        assert!(matches!(err, ResourceError::Other(sqlx::Error::RowNotFound)));
    }

    #[test]
    fn conflict_display_carries_code() {
        let err = ResourceError::Conflict {
            code: SERIALIZATION_FAILURE.to_owned(),
            message: "could not serialize access due to concurrent update".to_owned(),
        };
        assert!(err.is_conflict());
        assert_eq!(
            err.to_string(),
            "could not serialize access due to concurrent update (SQLSTATE 40001)"
        );
    }
}
