use thiserror::Error;

#[derive(Error, Debug)]
pub enum CovgateError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Profile parse error at line {line}: {message}")]
    ProfileParse { line: usize, message: String },

    #[error("Profile is empty")]
    EmptyProfile,

    #[error("Statement count overflow in {path}")]
    CountOverflow { path: String },

    #[error("Failed to fetch baseline profile: {0}")]
    Fetch(String),

    #[error("`{command}` failed: {output}")]
    Render { command: String, output: String },

    #[error("Failed to publish report: {0}")]
    Publish(String),

    #[error("Failed to build coverage link: {0}")]
    Link(String),

    #[error("{0}")]
    Other(String),
}

impl CovgateError {
    /// True for malformed, empty, or unaggregatable profile input.
    #[must_use]
    pub fn is_profile_parse(&self) -> bool {
        matches!(
            self,
            CovgateError::ProfileParse { .. }
                | CovgateError::EmptyProfile
                | CovgateError::CountOverflow { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, CovgateError>;
