//! Checkout resource descriptor and outcome types.
//!
//! An [`HgCheckout`] declares the desired state of one Mercurial working
//! copy. It is a pure data holder: built once (from CLI arguments or a
//! manifest entry), then only read by the provider.

use serde::Deserialize;
use std::path::PathBuf;

fn default_revision() -> String {
    "default".to_string()
}

fn default_true() -> bool {
    true
}

/// Desired state of a Mercurial working copy.
#[derive(Debug, Clone, Deserialize)]
pub struct HgCheckout {
    /// Repository URL (ssh://, http:// or https://)
    pub repository: String,

    /// Absolute path for the working copy
    pub destination: PathBuf,

    /// Target revision: hex hash, HEAD/default, or a branch name
    #[serde(default = "default_revision")]
    pub revision: String,

    /// Interpret `revision` as a named branch rather than a hash/tip
    #[serde(default = "default_true")]
    pub branch: bool,

    /// SSH private key passed to the transport wrapper (empty = none)
    #[serde(default)]
    pub ssh_key: String,

    /// Disable host-key verification and tolerate insecure transports
    #[serde(default)]
    pub ssh_ignore: bool,

    /// Override for the SSH transport wrapper command
    #[serde(default)]
    pub ssh_wrapper: Option<String>,

    /// Run hg as this user
    #[serde(default)]
    pub user: Option<String>,

    /// Run hg as this group
    #[serde(default)]
    pub group: Option<String>,
}

impl HgCheckout {
    /// New descriptor with construction-time defaults: named-branch mode on
    /// the `default` branch, no SSH customization.
    pub fn new(repository: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            repository: repository.into(),
            destination: destination.into(),
            revision: default_revision(),
            branch: true,
            ssh_key: String::new(),
            ssh_ignore: false,
            ssh_wrapper: None,
            user: None,
            group: None,
        }
    }

    /// Identifier used in log lines and outcome reports.
    pub fn id(&self) -> String {
        format!("hg:{}", self.destination.display())
    }

    pub fn revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = revision.into();
        self
    }

    pub fn named_branch(mut self, branch: bool) -> Self {
        self.branch = branch;
        self
    }

    pub fn ssh_key(mut self, key: impl Into<String>) -> Self {
        self.ssh_key = key.into();
        self
    }

    pub fn ssh_ignore(mut self, ignore: bool) -> Self {
        self.ssh_ignore = ignore;
        self
    }

    pub fn ssh_wrapper(mut self, wrapper: impl Into<String>) -> Self {
        self.ssh_wrapper = Some(wrapper.into());
        self
    }

    pub fn run_as(mut self, user: Option<String>, group: Option<String>) -> Self {
        self.user = user;
        self.group = group;
        self
    }

    /// Expand `~` in the destination and SSH key paths.
    pub fn expand_paths(&mut self) {
        let dest = self.destination.to_string_lossy().into_owned();
        self.destination = PathBuf::from(shellexpand::tilde(&dest).into_owned());
        if !self.ssh_key.is_empty() {
            self.ssh_key = shellexpand::tilde(&self.ssh_key).into_owned();
        }
    }
}

/// Outcome of one reconciliation operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyResult {
    /// Observed state already matched the declared target
    NoChange,
    /// A fresh checkout was cloned
    Created,
    /// The working copy moved to a new identity
    Modified,
    /// Mercurial metadata was stripped from the tree
    Removed,
    /// Dry run - the action was reported, not executed
    Skipped { reason: String },
}

impl ApplyResult {
    /// Whether the operation converged observed state toward the target.
    pub fn is_change(&self) -> bool {
        matches!(self, Self::Created | Self::Modified | Self::Removed)
    }
}
