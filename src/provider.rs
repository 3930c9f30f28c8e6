//! Reconciliation engine for Mercurial checkouts.
//!
//! A [`Reconciler`] inspects the declared destination, decides which hg
//! operations (clone, pull, checkout-to-revision) are needed to converge it
//! to the descriptor's target, executes them, and reports whether the tree
//! actually changed. Each top-level operation loads a fresh [`Session`];
//! nothing is carried across invocations.

use std::fs;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::Result;
use crate::hg::{self, HgCmd, NOT_A_REPO, RunAs};
use crate::precondition;
use crate::resource::{ApplyResult, HgCheckout};

static HG_HASH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9a-f]{6,40}$").unwrap());

/// True for strings hg accepts as a concrete revision: the `HEAD`/`default`
/// keywords or a lowercase hex hash of 6 to 40 characters.
pub fn is_hg_hash(revision: &str) -> bool {
    revision == "HEAD" || revision == "default" || HG_HASH.is_match(revision)
}

/// Target revision for a descriptor. Branch mode passes the declared
/// revision through verbatim (branch names are free-form, empty included);
/// otherwise anything that is not a valid hash/keyword falls back to `tip`.
pub fn resolve_target_revision(resource: &HgCheckout) -> String {
    if resource.branch || is_hg_hash(&resource.revision) {
        resource.revision.clone()
    } else {
        "tip".to_string()
    }
}

/// Assembled SSH transport command for clone/pull, or `None` when it is
/// just the bare default and hg can be left alone. The value is a single
/// argv element for `-e`; hg hands it to its own shell.
pub fn build_ssh_wrapper(resource: &HgCheckout) -> Option<String> {
    let mut wrapper = resource
        .ssh_wrapper
        .clone()
        .unwrap_or_else(|| "ssh".to_string());
    if resource.ssh_ignore {
        wrapper.push_str(" -o StrictHostKeyChecking=no");
    }
    if !resource.ssh_key.is_empty() {
        wrapper.push_str(" -i ");
        wrapper.push_str(&resource.ssh_key);
    }
    (wrapper != "ssh").then_some(wrapper)
}

/// Working-copy facts gathered at the start of one operation.
#[derive(Debug)]
struct Session {
    current_revision: Option<String>,
    current_branch: Option<String>,
    target_revision: String,
    is_branch: bool,
}

/// Reconciles one checkout descriptor against the filesystem.
pub struct Reconciler<'a> {
    resource: &'a HgCheckout,
    run_as: RunAs,
    dry_run: bool,
}

impl<'a> Reconciler<'a> {
    pub fn new(resource: &'a HgCheckout, dry_run: bool) -> Self {
        let run_as = RunAs {
            user: resource.user.clone(),
            group: resource.group.clone(),
        };
        Self {
            resource,
            run_as,
            dry_run,
        }
    }

    /// Converge an existing-or-new checkout to the declared target.
    pub fn sync(&self) -> Result<ApplyResult> {
        precondition::ensure_checkout(self.resource, self.dry_run)?;
        let session = self.load_session()?;
        if self.existing_checkout() {
            log::debug!(
                "{}: existing tree, branch/revision {:?}/{:?}, target {}{}",
                self.resource.id(),
                session.current_branch,
                session.current_revision,
                session.target_revision,
                if session.is_branch { " (named branch)" } else { "" }
            );
            if self.dry_run {
                return Ok(ApplyResult::Skipped {
                    reason: format!(
                        "would pull into {} and check out {}",
                        self.resource.destination.display(),
                        session.target_revision
                    ),
                });
            }
            self.pull()?;
            self.select_branch_or_revision(&session)
        } else {
            self.checkout_with(&session)
        }
    }

    /// Create a checkout only if the destination is new, empty, or not yet
    /// a Mercurial checkout. Never overwrites an existing tree.
    pub fn checkout(&self) -> Result<ApplyResult> {
        precondition::ensure_checkout(self.resource, self.dry_run)?;
        let session = self.load_session()?;
        self.checkout_with(&session)
    }

    fn checkout_with(&self, session: &Session) -> Result<ApplyResult> {
        if self.target_dir_missing_or_empty()? && !self.existing_checkout() {
            if self.dry_run {
                return Ok(ApplyResult::Skipped {
                    reason: format!(
                        "would clone {} into {} and check out {}",
                        self.resource.repository,
                        self.resource.destination.display(),
                        session.target_revision
                    ),
                });
            }
            self.clone_repo()?;
            self.select_branch_or_revision(session)?;
            // A clone always changes state, whatever the selection step saw.
            Ok(ApplyResult::Created)
        } else {
            log::debug!(
                "{}: destination already exists or is a non-empty directory, nothing to do",
                self.resource.id()
            );
            Ok(ApplyResult::NoChange)
        }
    }

    /// Strip Mercurial metadata (`.hg`, `.hgignore`) from the tree to leave
    /// a clean source export. Only acts when metadata is present.
    pub fn export(&self) -> Result<ApplyResult> {
        precondition::ensure_repository(self.resource, self.dry_run)?;
        let hg_dir = self.resource.destination.join(".hg");
        let hgignore = self.resource.destination.join(".hgignore");
        if !hg_dir.exists() && !hgignore.exists() {
            return Ok(ApplyResult::NoChange);
        }
        if self.dry_run {
            return Ok(ApplyResult::Skipped {
                reason: format!(
                    "would remove Mercurial metadata from {}",
                    self.resource.destination.display()
                ),
            });
        }
        if hg_dir.exists() {
            fs::remove_dir_all(&hg_dir)?;
        }
        if hgignore.exists() {
            fs::remove_file(&hgignore)?;
        }
        log::info!("{}: removed Mercurial metadata after checkout", self.resource.id());
        Ok(ApplyResult::Removed)
    }

    fn load_session(&self) -> Result<Session> {
        Ok(Session {
            current_revision: self.find_current_revision()?,
            current_branch: self.find_current_branch()?,
            target_revision: resolve_target_revision(self.resource),
            is_branch: self.resource.branch,
        })
    }

    fn existing_checkout(&self) -> bool {
        self.resource.destination.join(".hg").is_dir()
    }

    fn target_dir_missing_or_empty(&self) -> Result<bool> {
        let dest = &self.resource.destination;
        if !dest.is_dir() {
            return Ok(true);
        }
        Ok(fs::read_dir(dest)?.next().is_none())
    }

    /// Working copy identity, `None` when the destination is not a checkout
    /// or the identity does not resolve to a valid hash. The metadata gate
    /// keeps us from running a query in a non-repository directory.
    fn find_current_revision(&self) -> Result<Option<String>> {
        if !self.existing_checkout() {
            return Ok(None);
        }
        let out = HgCmd::new(["id", "-i"])
            .cwd(&self.resource.destination)
            .accept(&[0, NOT_A_REPO])
            .run_as(&self.run_as)
            .run()?;
        if out.code == NOT_A_REPO {
            return Ok(None);
        }
        // A trailing '+' marks uncommitted local changes.
        let identity = out.stdout.trim().trim_end_matches('+').to_string();
        Ok(is_hg_hash(&identity).then_some(identity))
    }

    fn find_current_branch(&self) -> Result<Option<String>> {
        if !self.existing_checkout() {
            return Ok(None);
        }
        let out = HgCmd::new(["id", "-b"])
            .cwd(&self.resource.destination)
            .accept(&[0, NOT_A_REPO])
            .run_as(&self.run_as)
            .run()?;
        if out.code == NOT_A_REPO {
            return Ok(None);
        }
        let branch = out.stdout.trim().to_string();
        Ok((!branch.is_empty()).then_some(branch))
    }

    /// `--insecure` is only understood by hg >= 2.0.
    fn insecure_transport(&self) -> Result<bool> {
        if !self.resource.ssh_ignore {
            return Ok(false);
        }
        Ok(hg::hg_version()? >= (2, 0))
    }

    fn transport_args(&self) -> Result<Vec<String>> {
        let mut args = Vec::new();
        if let Some(wrapper) = build_ssh_wrapper(self.resource) {
            args.push("-e".to_string());
            args.push(wrapper);
        }
        if self.insecure_transport()? {
            args.push("--insecure".to_string());
        }
        Ok(args)
    }

    fn clone_repo(&self) -> Result<()> {
        log::info!(
            "{}: cloning {} into {}",
            self.resource.id(),
            self.resource.repository,
            self.resource.destination.display()
        );
        let mut args = vec!["clone".to_string()];
        args.extend(self.transport_args()?);
        args.push(self.resource.repository.clone());
        args.push(self.resource.destination.to_string_lossy().into_owned());
        HgCmd::new(args)
            .run_as(&self.run_as)
            .stream(true)
            .run()?;
        Ok(())
    }

    fn pull(&self) -> Result<()> {
        log::info!("{}: fetching updates", self.resource.id());
        let mut args = vec!["pull".to_string()];
        args.extend(self.transport_args()?);
        HgCmd::new(args)
            .cwd(&self.resource.destination)
            .run_as(&self.run_as)
            .stream(true)
            .run()?;
        // Discard local modifications so the selection step starts clean.
        HgCmd::new(["revert", "-a", "-C"])
            .cwd(&self.resource.destination)
            .run_as(&self.run_as)
            .run()?;
        Ok(())
    }

    /// Force-checkout the target branch or revision, then report convergence
    /// only if the tree actually moved to a new identity.
    fn select_branch_or_revision(&self, session: &Session) -> Result<ApplyResult> {
        log::info!(
            "{}: checking out branch/revision {}",
            self.resource.id(),
            session.target_revision
        );
        let args: Vec<&str> = if session.is_branch {
            vec!["checkout", "-C", &session.target_revision]
        } else {
            vec!["checkout", "-C", "-r", &session.target_revision]
        };
        HgCmd::new(args)
            .cwd(&self.resource.destination)
            .run_as(&self.run_as)
            .run()?;

        let after = self.find_current_revision()?;
        if after == session.current_revision {
            Ok(ApplyResult::NoChange)
        } else {
            Ok(ApplyResult::Modified)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(destination: &std::path::Path) -> HgCheckout {
        HgCheckout::new("https://hg.example.com/repo", destination)
    }

    #[test]
    fn hash_test_accepts_keywords_and_lowercase_hex() {
        assert!(is_hg_hash("HEAD"));
        assert!(is_hg_hash("default"));
        assert!(is_hg_hash("abc123"));
        assert!(is_hg_hash(&"a1b2c3d4".repeat(5))); // 40 chars
    }

    #[test]
    fn hash_test_rejects_malformed_input() {
        assert!(!is_hg_hash(""));
        assert!(!is_hg_hash("ABC123")); // uppercase
        assert!(!is_hg_hash("abc12")); // 5 chars
        assert!(!is_hg_hash(&"a".repeat(41))); // 41 chars
        assert!(!is_hg_hash("tip"));
        assert!(!is_hg_hash("head"));
        assert!(!is_hg_hash("not-a-hash"));
    }

    #[test]
    fn branch_mode_passes_revision_through_verbatim() {
        let tmp = tempfile::tempdir().unwrap();
        let named = resource(tmp.path()).revision("stable-1.x");
        assert_eq!(resolve_target_revision(&named), "stable-1.x");
        // Empty branch names are intentionally permitted.
        let empty = resource(tmp.path()).revision("");
        assert_eq!(resolve_target_revision(&empty), "");
    }

    #[test]
    fn revision_mode_falls_back_to_tip_for_invalid_hashes() {
        let tmp = tempfile::tempdir().unwrap();
        let bad = resource(tmp.path()).revision("not-a-hash").named_branch(false);
        assert_eq!(resolve_target_revision(&bad), "tip");
        let good = resource(tmp.path()).revision("abc123").named_branch(false);
        assert_eq!(resolve_target_revision(&good), "abc123");
        let keyword = resource(tmp.path()).revision("HEAD").named_branch(false);
        assert_eq!(resolve_target_revision(&keyword), "HEAD");
    }

    #[test]
    fn resolve_target_revision_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let res = resource(tmp.path()).revision("not-a-hash").named_branch(false);
        assert_eq!(resolve_target_revision(&res), resolve_target_revision(&res));
    }

    #[test]
    fn bare_default_wrapper_is_omitted() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(build_ssh_wrapper(&resource(tmp.path())), None);
    }

    #[test]
    fn wrapper_accumulates_host_key_and_identity_options() {
        let tmp = tempfile::tempdir().unwrap();
        let res = resource(tmp.path())
            .ssh_ignore(true)
            .ssh_key("/etc/keys/deploy");
        assert_eq!(
            build_ssh_wrapper(&res).as_deref(),
            Some("ssh -o StrictHostKeyChecking=no -i /etc/keys/deploy")
        );
    }

    #[test]
    fn custom_wrapper_is_used_even_without_options() {
        let tmp = tempfile::tempdir().unwrap();
        let res = resource(tmp.path()).ssh_wrapper("ssh -p 2222");
        assert_eq!(build_ssh_wrapper(&res).as_deref(), Some("ssh -p 2222"));
    }

    #[test]
    fn checkout_never_overwrites_a_non_empty_destination() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("tree");
        std::fs::create_dir(&dest).unwrap();
        std::fs::write(dest.join("README"), "existing content").unwrap();

        let res = resource(&dest);
        let outcome = Reconciler::new(&res, false).checkout().unwrap();
        assert_eq!(outcome, ApplyResult::NoChange);
        assert_eq!(
            std::fs::read_to_string(dest.join("README")).unwrap(),
            "existing content"
        );
    }

    #[test]
    fn sync_on_fresh_destination_plans_a_clone() {
        let tmp = tempfile::tempdir().unwrap();
        let res = resource(&tmp.path().join("fresh"))
            .revision("abc123")
            .named_branch(false);
        // dry run: same decision path as checkout, no commands executed
        let outcome = Reconciler::new(&res, true).sync().unwrap();
        match outcome {
            ApplyResult::Skipped { reason } => {
                assert!(reason.contains("clone"));
                assert!(reason.contains("abc123"));
            }
            other => panic!("expected Skipped, got {other:?}"),
        }
    }

    #[test]
    fn export_strips_metadata_and_reports_convergence() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("tree");
        std::fs::create_dir_all(dest.join(".hg")).unwrap();
        std::fs::write(dest.join(".hg").join("requires"), "store\n").unwrap();
        std::fs::write(dest.join(".hgignore"), "target/\n").unwrap();
        std::fs::write(dest.join("src.rs"), "fn main() {}\n").unwrap();

        let res = resource(&dest);
        let outcome = Reconciler::new(&res, false).export().unwrap();
        assert_eq!(outcome, ApplyResult::Removed);
        assert!(!dest.join(".hg").exists());
        assert!(!dest.join(".hgignore").exists());
        assert!(dest.join("src.rs").exists());
    }

    #[test]
    fn export_without_metadata_is_a_noop() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("tree");
        std::fs::create_dir(&dest).unwrap();
        std::fs::write(dest.join("src.rs"), "fn main() {}\n").unwrap();

        let res = resource(&dest);
        let outcome = Reconciler::new(&res, false).export().unwrap();
        assert_eq!(outcome, ApplyResult::NoChange);
        assert!(dest.join("src.rs").exists());
    }

    #[test]
    fn export_dry_run_leaves_metadata_in_place() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("tree");
        std::fs::create_dir_all(dest.join(".hg")).unwrap();
        std::fs::write(dest.join(".hgignore"), "target/\n").unwrap();

        let res = resource(&dest);
        let outcome = Reconciler::new(&res, true).export().unwrap();
        assert!(matches!(outcome, ApplyResult::Skipped { .. }));
        assert!(dest.join(".hg").exists());
        assert!(dest.join(".hgignore").exists());
    }

    #[test]
    fn session_resolves_nothing_outside_a_checkout() {
        let tmp = tempfile::tempdir().unwrap();
        let res = resource(&tmp.path().join("fresh"));
        let reconciler = Reconciler::new(&res, false);
        // The metadata gate answers without invoking hg at all.
        assert_eq!(reconciler.find_current_revision().unwrap(), None);
        assert_eq!(reconciler.find_current_branch().unwrap(), None);
    }
}
