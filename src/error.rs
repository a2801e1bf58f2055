//! Error taxonomy for group reconciliation.
//!
//! Every variant is terminal for an invocation. None of them ever carries a
//! credential value in its message.

use thiserror::Error;

type BoxedCause = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum GroupError {
    /// Invalid or unsupported parameter combination, caught before the store is touched.
    #[error("{0}")]
    Configuration(String),

    /// The container or key file is missing, or no group matched.
    #[error("{message}")]
    NotFound {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Could not open the database, as the credentials are wrong.")]
    Authentication,

    #[error(
        "Could not open the database, as the checksum of the database is wrong. \
         This could be caused by a corrupt database. ({0})"
    )]
    Corruption(String),

    #[error("More than one group found in Database ({count} groups named '{name}')")]
    AmbiguousMatch { name: String, count: usize },

    #[error("{message}")]
    Persistence {
        message: String,
        #[source]
        source: Option<BoxedCause>,
    },
}

impl GroupError {
    pub fn configuration(message: impl Into<String>) -> Self {
        GroupError::Configuration(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        GroupError::NotFound {
            message: message.into(),
            source: None,
        }
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        GroupError::Persistence {
            message: message.into(),
            source: None,
        }
    }

    /// Wraps a lower-level failure that happened after the store was opened.
    pub fn persistence_caused_by<E>(message: impl Into<String>, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        GroupError::Persistence {
            message: message.into(),
            source: Some(Box::new(cause)),
        }
    }

    /// Stable class name, used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            GroupError::Configuration(_) => "configuration",
            GroupError::NotFound { .. } => "not_found",
            GroupError::Authentication => "authentication",
            GroupError::Corruption(_) => "corruption",
            GroupError::AmbiguousMatch { .. } => "ambiguous_match",
            GroupError::Persistence { .. } => "persistence",
        }
    }

    /// Renders the chain of underlying causes, if there are any.
    pub fn cause_chain(&self) -> Option<String> {
        let mut current = std::error::Error::source(self)?;
        let mut chain = current.to_string();
        while let Some(next) = current.source() {
            chain.push_str(": ");
            chain.push_str(&next.to_string());
            current = next;
        }
        Some(chain)
    }
}

pub type Result<T> = std::result::Result<T, GroupError>;
