//! Error types for the store crate.
//!
//! - `DatabaseError`: a classified failure from a single statement
//! - `StartupError`: fatal failures of the startup sequence

use std::fmt;

/// SQLSTATE codes PostgreSQL raises when an object being created already exists.
const ALREADY_EXISTS_CODES: &[&str] = &[
    "42P07", // duplicate_table
    "42701", // duplicate_column
    "42710", // duplicate_object
    "42P06", // duplicate_schema
];

/// Errors from executing a statement against the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseError {
    /// The database could not be reached or the pool gave up waiting.
    Connection { details: String },
    /// A unique or other integrity constraint rejected the statement.
    ConstraintViolation {
        constraint: Option<String>,
        details: String,
    },
    /// The object a DDL statement tried to create already exists.
    AlreadyExists { code: String, details: String },
    /// The statement was rejected by the database.
    Query {
        code: Option<String>,
        details: String,
    },
    /// A returned row could not be decoded.
    Decode { details: String },
}

impl DatabaseError {
    /// Classifies a sqlx error.
    #[must_use]
    pub fn from_sqlx(err: &sqlx::Error) -> Self {
        let details = err.to_string();
        match err {
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.into_owned());
                if db_err.is_unique_violation()
                    || db_err.is_foreign_key_violation()
                    || db_err.is_check_violation()
                {
                    Self::ConstraintViolation {
                        constraint: db_err.constraint().map(str::to_string),
                        details,
                    }
                } else if let Some(code) = code.filter(|c| is_already_exists_code(c)) {
                    Self::AlreadyExists { code, details }
                } else {
                    Self::Query {
                        code: db_err.code().map(|c| c.into_owned()),
                        details,
                    }
                }
            }
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
            | sqlx::Error::Configuration(_) => Self::Connection { details },
            sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::Decode(_)
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::ColumnIndexOutOfBounds { .. } => Self::Decode { details },
            _ => Self::Query {
                code: None,
                details,
            },
        }
    }

    /// Returns true if a constraint rejected the statement.
    #[must_use]
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, Self::ConstraintViolation { .. })
    }

    /// Returns true if one of the named constraints rejected the statement.
    #[must_use]
    pub fn violates_any(&self, constraints: &[&str]) -> bool {
        match self {
            Self::ConstraintViolation {
                constraint: Some(name),
                ..
            } => constraints.contains(&name.as_str()),
            _ => false,
        }
    }

    /// Returns true if this failure means a schema object is already in place.
    ///
    /// Concurrent `CREATE ... IF NOT EXISTS` from several processes can also
    /// surface as a unique violation on one of PostgreSQL's `pg_*` catalog
    /// indexes; that counts too.
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        match self {
            Self::AlreadyExists { .. } => true,
            Self::ConstraintViolation {
                constraint: Some(name),
                ..
            } => is_catalog_constraint(name),
            _ => false,
        }
    }
}

/// Returns true for SQLSTATE codes meaning "object already exists".
#[must_use]
pub fn is_already_exists_code(code: &str) -> bool {
    ALREADY_EXISTS_CODES.contains(&code)
}

fn is_catalog_constraint(name: &str) -> bool {
    name.starts_with("pg_")
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection { details } => {
                write!(f, "database connection failed: {details}")
            }
            Self::ConstraintViolation {
                constraint: Some(constraint),
                details,
            } => {
                write!(f, "constraint '{constraint}' violated: {details}")
            }
            Self::ConstraintViolation {
                constraint: None,
                details,
            } => {
                write!(f, "constraint violated: {details}")
            }
            Self::AlreadyExists { code, details } => {
                write!(f, "object already exists ({code}): {details}")
            }
            Self::Query {
                code: Some(code),
                details,
            } => {
                write!(f, "query failed ({code}): {details}")
            }
            Self::Query {
                code: None,
                details,
            } => {
                write!(f, "query failed: {details}")
            }
            Self::Decode { details } => {
                write!(f, "failed to decode row: {details}")
            }
        }
    }
}

impl std::error::Error for DatabaseError {}

/// Errors that abort process startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupError {
    /// No probe succeeded before the deadline.
    DatabaseUnreachable {
        target: String,
        attempts: u32,
        elapsed_ms: u128,
    },
    /// A schema step failed for a reason other than "already exists".
    SchemaFailed { step: String, details: String },
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DatabaseUnreachable {
                target,
                attempts,
                elapsed_ms,
            } => {
                write!(
                    f,
                    "database {target} not reachable after {attempts} attempts in {elapsed_ms}ms"
                )
            }
            Self::SchemaFailed { step, details } => {
                write!(f, "schema step '{step}' failed: {details}")
            }
        }
    }
}

impl std::error::Error for StartupError {}
