use std::fmt;
use std::str::FromStr;

/// Transaction isolation level applied when a [`Session`](crate::session::Session)
/// begins its transaction.
///
/// PostgreSQL accepts `READ UNCOMMITTED` but treats it as `READ COMMITTED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    /// Every level, weakest first.
    pub const ALL: [IsolationLevel; 4] = [
        Self::ReadUncommitted,
        Self::ReadCommitted,
        Self::RepeatableRead,
        Self::Serializable,
    ];

    /// The SQL phrase used after `ISOLATION LEVEL`.
    pub fn sql(self) -> &'static str {
        match self {
            Self::ReadUncommitted => "READ UNCOMMITTED",
            Self::ReadCommitted => "READ COMMITTED",
            Self::RepeatableRead => "REPEATABLE READ",
            Self::Serializable => "SERIALIZABLE",
        }
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ReadUncommitted => "read-uncommitted",
            Self::ReadCommitted => "read-committed",
            Self::RepeatableRead => "repeatable-read",
            Self::Serializable => "serializable",
        };
        f.write_str(s)
    }
}

impl FromStr for IsolationLevel {
    type Err = IsolationLevelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read-uncommitted" => Ok(Self::ReadUncommitted),
            "read-committed" => Ok(Self::ReadCommitted),
            "repeatable-read" => Ok(Self::RepeatableRead),
            "serializable" => Ok(Self::Serializable),
            other => Err(IsolationLevelParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`IsolationLevel`] string.
#[derive(Debug, Clone, thiserror::Error)]
#[error(
    "invalid isolation level: {0:?} \
     (expected read-uncommitted, read-committed, repeatable-read, or serializable)"
)]
pub struct IsolationLevelParseError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_parse_agree() {
        for level in IsolationLevel::ALL {
            let parsed: IsolationLevel = level.to_string().parse().unwrap();
            assert_eq!(parsed, level);
        }
    }

    #[test]
    fn sql_phrases() {
        assert_eq!(IsolationLevel::ReadCommitted.sql(), "READ COMMITTED");
        assert_eq!(IsolationLevel::RepeatableRead.sql(), "REPEATABLE READ");
    }

    #[test]
    fn rejects_unknown_level() {
        let err = "snapshot".parse::<IsolationLevel>().unwrap_err();
        assert_eq!(err.0, "snapshot");
        assert!(err.to_string().contains("invalid isolation level"));
    }
}
