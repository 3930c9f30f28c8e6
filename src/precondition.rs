//! Named precondition checks evaluated before any mutating action.
//!
//! Each check pairs a predicate with an error kind and a human-readable
//! advisory. Under dry-run a failed check logs the advisory and planning
//! continues as if the assumption held.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};
use crate::provider::{is_hg_hash, resolve_target_revision};
use crate::resource::HgCheckout;

static REPO_URL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(ssh|https?)://.+$").unwrap());

struct Check {
    name: &'static str,
    advisory: String,
    /// `None` when the predicate holds
    outcome: Option<Error>,
}

impl Check {
    fn passing(name: &'static str) -> Self {
        Self {
            name,
            advisory: String::new(),
            outcome: None,
        }
    }

    fn failing(name: &'static str, advisory: String, error: Error) -> Self {
        Self {
            name,
            advisory,
            outcome: Some(error),
        }
    }
}

fn enforce(checks: Vec<Check>, dry_run: bool) -> Result<()> {
    for check in checks {
        if let Some(error) = check.outcome {
            if dry_run {
                log::warn!(
                    "precondition {} not met: {} Assuming it holds for planning purposes.",
                    check.name,
                    check.advisory
                );
            } else {
                return Err(error);
            }
        }
    }
    Ok(())
}

fn parent_directory(resource: &HgCheckout) -> Check {
    let parent = resource
        .destination
        .parent()
        .map_or_else(PathBuf::new, Path::to_path_buf);
    if parent.is_dir() {
        Check::passing("parent-directory")
    } else {
        Check::failing(
            "parent-directory",
            format!(
                "enclosing directory {} does not exist; this run would fail unless it is created first.",
                parent.display()
            ),
            Error::MissingParentDirectory {
                destination: resource.destination.clone(),
                parent,
            },
        )
    }
}

fn ssh_key(resource: &HgCheckout) -> Check {
    if resource.ssh_key.is_empty() || Path::new(&resource.ssh_key).exists() {
        Check::passing("ssh-key")
    } else {
        Check::failing(
            "ssh-key",
            format!("the configured SSH key file {} does not exist.", resource.ssh_key),
            Error::MissingSshKey(PathBuf::from(&resource.ssh_key)),
        )
    }
}

fn target_revision(resource: &HgCheckout) -> Check {
    let resolved = resolve_target_revision(resource);
    if resource.branch || resolved == "tip" || is_hg_hash(&resolved) {
        Check::passing("target-revision")
    } else {
        Check::failing(
            "target-revision",
            format!(
                "{:?} is not a valid Mercurial revision; expected a hex hash, tip, HEAD, default, or a named branch.",
                resource.revision
            ),
            Error::InvalidRevision {
                revision: resource.revision.clone(),
            },
        )
    }
}

fn repository_url(resource: &HgCheckout) -> Check {
    if REPO_URL.is_match(&resource.repository) {
        Check::passing("repository-url")
    } else {
        Check::failing(
            "repository-url",
            format!(
                "{:?} is not a supported Mercurial repository; URLs must begin with ssh://, http:// or https://.",
                resource.repository
            ),
            Error::InvalidRepository {
                url: resource.repository.clone(),
            },
        )
    }
}

/// Full check set for `sync`/`checkout`: parent directory, SSH key,
/// target revision, repository URL.
pub fn ensure_checkout(resource: &HgCheckout, dry_run: bool) -> Result<()> {
    enforce(
        vec![
            parent_directory(resource),
            ssh_key(resource),
            target_revision(resource),
            repository_url(resource),
        ],
        dry_run,
    )
}

/// Repository URL check alone; applies to every operation, including export.
pub fn ensure_repository(resource: &HgCheckout, dry_run: bool) -> Result<()> {
    enforce(vec![repository_url(resource)], dry_run)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_resource(dir: &Path) -> HgCheckout {
        HgCheckout::new("https://hg.example.com/repo", dir.join("checkout"))
    }

    #[test]
    fn all_checks_pass_for_a_valid_descriptor() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(ensure_checkout(&valid_resource(tmp.path()), false).is_ok());
    }

    #[test]
    fn missing_parent_directory_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let resource = HgCheckout::new(
            "https://hg.example.com/repo",
            tmp.path().join("absent").join("checkout"),
        );
        let err = ensure_checkout(&resource, false).unwrap_err();
        assert!(matches!(err, Error::MissingParentDirectory { .. }));
    }

    #[test]
    fn missing_parent_directory_is_advisory_under_dry_run() {
        let tmp = tempfile::tempdir().unwrap();
        let resource = HgCheckout::new(
            "https://hg.example.com/repo",
            tmp.path().join("absent").join("checkout"),
        );
        assert!(ensure_checkout(&resource, true).is_ok());
    }

    #[test]
    fn configured_ssh_key_must_exist() {
        let tmp = tempfile::tempdir().unwrap();
        let resource = valid_resource(tmp.path()).ssh_key("/definitely/not/a/key");
        let err = ensure_checkout(&resource, false).unwrap_err();
        assert!(matches!(err, Error::MissingSshKey(_)));
    }

    #[test]
    fn empty_ssh_key_is_not_checked() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(ensure_checkout(&valid_resource(tmp.path()).ssh_key(""), false).is_ok());
    }

    #[test]
    fn scheme_less_repository_fails_before_any_action() {
        let tmp = tempfile::tempdir().unwrap();
        let mut resource = valid_resource(tmp.path());
        resource.repository = "git@example.com:repo.git".to_string();
        let err = ensure_checkout(&resource, false).unwrap_err();
        assert!(matches!(err, Error::InvalidRepository { .. }));
        // export runs the same check
        let err = ensure_repository(&resource, false).unwrap_err();
        assert!(matches!(err, Error::InvalidRepository { .. }));
    }

    #[test]
    fn supported_schemes_are_accepted() {
        for url in [
            "ssh://hg.example.com/repo",
            "http://hg.example.com/repo",
            "https://hg.example.com/repo",
        ] {
            let tmp = tempfile::tempdir().unwrap();
            let mut resource = valid_resource(tmp.path());
            resource.repository = url.to_string();
            assert!(ensure_checkout(&resource, false).is_ok(), "{url}");
        }
    }

    #[test]
    fn invalid_hash_in_revision_mode_resolves_to_tip_and_passes() {
        let tmp = tempfile::tempdir().unwrap();
        let resource = valid_resource(tmp.path())
            .revision("not-a-hash")
            .named_branch(false);
        assert!(ensure_checkout(&resource, false).is_ok());
    }
}
