//! Error types for checkout reconciliation.
//!
//! The first four variants are precondition failures, raised before any
//! mutating action. Under dry-run they are downgraded to advisories and
//! never constructed.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by precondition checks and external command execution.
#[derive(Debug, Error)]
pub enum Error {
    /// The destination's enclosing directory does not exist
    #[error(
        "cannot create checkout at {destination}: enclosing directory {parent} does not exist"
    )]
    MissingParentDirectory {
        destination: PathBuf,
        parent: PathBuf,
    },

    /// A configured SSH private key is absent from disk
    #[error("the SSH key file {0} does not exist; specify a valid private key file")]
    MissingSshKey(PathBuf),

    /// Neither a recognized hash/keyword nor a named branch
    #[error(
        "invalid Mercurial revision {revision:?}: expected a hex hash, tip, HEAD, default, or a named branch"
    )]
    InvalidRevision { revision: String },

    /// Repository URL scheme is unsupported
    #[error(
        "invalid Mercurial repository {url:?}: supported repositories begin with ssh://, http:// or https://"
    )]
    InvalidRepository { url: String },

    /// External command exited outside its accepted status set
    #[error("command `{command}` exited with status {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: i32,
        stderr: String,
    },

    /// A user/group override does not name a known identity
    #[error("unknown user or group: {0}")]
    UnknownIdentity(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for reconciliation operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_failed_display_includes_status_and_stderr() {
        let err = Error::CommandFailed {
            command: "hg pull".to_string(),
            status: 1,
            stderr: "abort: no suitable response".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("hg pull"));
        assert!(msg.contains("status 1"));
        assert!(msg.contains("abort"));
    }

    #[test]
    fn invalid_repository_display_names_supported_schemes() {
        let err = Error::InvalidRepository {
            url: "git@example.com:repo.git".to_string(),
        };
        assert!(err.to_string().contains("ssh://"));
    }
}
