//! 💀 The error taxonomy — four ways a conversation with the tracker can go wrong.
//!
//! Everything that talks to a tracker returns [`TrackerError`]. The variant decides
//! the blast radius: an `Authentication` failure ends the invocation, a `Query`
//! failure is shrugged off as "no issues", a `RemoteLookup` failure is hard during
//! fetch and soft during transitions, and a `Configuration` failure skips the goal.
//!
//! Above the tracker boundary we go back to `anyhow`, like the rest of the crate.
//! 🦆

use thiserror::Error;

/// 🏷️ What went wrong, and which remote operation it went wrong in.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// 🔒 Could not establish a session. Bad credentials, or the server is a ghost.
    #[error("authentication against {server} failed: {reason}")]
    Authentication { server: String, reason: String },

    /// 🔍 The tracker rejected the query. Syntax, unknown field, unknown version.
    #[error("query rejected by tracker: {reason} (query: {query})")]
    Query { query: String, reason: String },

    /// 📡 A lookup, comment fetch, transition, or version call failed.
    #[error("remote operation '{operation}' failed: {reason}")]
    RemoteLookup { operation: String, reason: String },

    /// 🔧 Something the goal needs was never configured.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl TrackerError {
    pub fn lookup(operation: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::RemoteLookup {
            operation: operation.into(),
            reason: reason.to_string(),
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

pub type TrackerResult<T> = std::result::Result<T, TrackerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_every_message_names_the_failing_operation() {
        let the_lookup = TrackerError::lookup("getPriorities", "HTTP 500");
        assert_eq!(
            the_lookup.to_string(),
            "remote operation 'getPriorities' failed: HTTP 500"
        );

        let the_query = TrackerError::Query {
            query: "project = 'X'".to_string(),
            reason: "Field 'fixVersion' is unknown".to_string(),
        };
        assert!(the_query.to_string().contains("project = 'X'"));
        assert!(!the_query.is_configuration());
        assert!(TrackerError::Configuration("no transition".into()).is_configuration());
    }
}
