// src/name.rs

//! Index names
//!
//! Indexes are addressed as `user/index`. Both components are restricted to
//! ASCII letters, digits and the symbols `-`, `.`, `@` and `_`; staging
//! indexes additionally carry the `+pr-` prefix in front of their name.

use std::fmt;
use std::str::FromStr;

/// Prefix every staging index name starts with
pub const PR_PREFIX: &str = "+pr-";

/// Check a user or index name against the character rules
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '@' | '_'))
}

/// Fully qualified index name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexName {
    pub user: String,
    pub index: String,
}

impl IndexName {
    pub fn new(user: impl Into<String>, index: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            index: index.into(),
        }
    }

    /// Parse `user/index`
    pub fn parse(s: &str) -> Result<Self, NameParseError> {
        let (user, index) = s
            .split_once('/')
            .ok_or_else(|| NameParseError::MissingSlash(s.to_string()))?;

        if user.is_empty() {
            return Err(NameParseError::EmptyUser(s.to_string()));
        }
        if index.is_empty() {
            return Err(NameParseError::EmptyIndex(s.to_string()));
        }
        if index.contains('/') {
            return Err(NameParseError::TooManyComponents(s.to_string()));
        }
        if !is_valid_name(user) {
            return Err(NameParseError::InvalidUser(user.to_string()));
        }

        Ok(Self::new(user, index))
    }

    /// Resolve a push request name given on the command line
    ///
    /// `USER/NAME` is taken as is; a bare `NAME` belongs to `default_user`.
    /// The `+pr-` prefix is added when missing.
    pub fn for_push_request(name: &str, default_user: &str) -> Result<Self, NameParseError> {
        let (user, index) = match name.split_once('/') {
            Some((user, index)) => {
                if index.contains('/') {
                    return Err(NameParseError::TooManyComponents(name.to_string()));
                }
                (user, index)
            }
            None => (default_user, name),
        };
        if user.is_empty() {
            return Err(NameParseError::EmptyUser(name.to_string()));
        }
        if index.is_empty() {
            return Err(NameParseError::EmptyIndex(name.to_string()));
        }
        let index = if index.starts_with(PR_PREFIX) {
            index.to_string()
        } else {
            format!("{PR_PREFIX}{index}")
        };
        Ok(Self::new(user, index))
    }

    /// Whether this names a staging index
    pub fn is_push_request(&self) -> bool {
        self.index.starts_with(PR_PREFIX)
    }
}

impl fmt::Display for IndexName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.user, self.index)
    }
}

impl FromStr for IndexName {
    type Err = NameParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IndexName::parse(s)
    }
}

/// Errors that can occur when parsing an index name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameParseError {
    /// Missing / separator
    MissingSlash(String),
    /// More than one / separator
    TooManyComponents(String),
    /// Empty user component
    EmptyUser(String),
    /// Empty index component
    EmptyIndex(String),
    /// Invalid characters in the user name
    InvalidUser(String),
}

impl fmt::Display for NameParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameParseError::MissingSlash(s) => {
                write!(f, "Index name '{}' must be of the form USER/NAME", s)
            }
            NameParseError::TooManyComponents(s) => write!(f, "Invalid index name: {}", s),
            NameParseError::EmptyUser(s) => write!(f, "Empty user in index name: {}", s),
            NameParseError::EmptyIndex(s) => write!(f, "Empty index in index name: {}", s),
            NameParseError::InvalidUser(s) => write!(f, "Invalid user name: {}", s),
        }
    }
}

impl std::error::Error for NameParseError {}

impl From<NameParseError> for crate::error::Error {
    fn from(err: NameParseError) -> Self {
        crate::error::Error::InvalidIndexName(err.to_string())
    }
}
