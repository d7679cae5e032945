use std::fmt;

/// Crate-wide error type for the fallible, non-`apply`/`record_run_outcome`
/// surface (store construction, migrations, explicit CLI operations).
///
/// `apply` and `record_run_outcome` themselves never return this type — per
/// spec §7 they degrade internally and never reject.
#[derive(Debug)]
pub enum ContinuityError {
    Io(std::io::Error),
    Json(serde_json::Error),
    Sqlite(rusqlite::Error),
    Utf8(std::string::FromUtf8Error),
    Generic(String),
}

impl fmt::Display for ContinuityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContinuityError::Io(e) => write!(f, "io error: {e}"),
            ContinuityError::Json(e) => write!(f, "json error: {e}"),
            ContinuityError::Sqlite(e) => write!(f, "sqlite error: {e}"),
            ContinuityError::Utf8(e) => write!(f, "utf8 error: {e}"),
            ContinuityError::Generic(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for ContinuityError {}

impl From<std::io::Error> for ContinuityError {
    fn from(e: std::io::Error) -> Self {
        ContinuityError::Io(e)
    }
}

impl From<serde_json::Error> for ContinuityError {
    fn from(e: serde_json::Error) -> Self {
        ContinuityError::Json(e)
    }
}

impl From<rusqlite::Error> for ContinuityError {
    fn from(e: rusqlite::Error) -> Self {
        ContinuityError::Sqlite(e)
    }
}

impl From<std::string::FromUtf8Error> for ContinuityError {
    fn from(e: std::string::FromUtf8Error) -> Self {
        ContinuityError::Utf8(e)
    }
}
