use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

use crate::resource::HgCheckout;

#[derive(Parser)]
#[command(name = "hgsync")]
#[command(version)]
#[command(about = "Declarative Mercurial checkouts - converge working copies to a desired state", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Report intended actions and precondition failures without executing
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Converge an existing-or-new checkout to the declared target
    Sync(CheckoutArgs),

    /// Create a checkout only if the destination is new, empty, or not yet
    /// a Mercurial checkout
    #[command(visible_alias = "clone")]
    Checkout(CheckoutArgs),

    /// Strip Mercurial metadata from a checked-out tree
    Export(ExportArgs),

    /// Reconcile every checkout declared in a manifest file
    Apply(ApplyArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
pub struct CheckoutArgs {
    /// Repository URL (ssh://, http:// or https://)
    pub repository: String,

    /// Destination path for the working copy
    pub destination: PathBuf,

    /// Target revision: hex hash, HEAD/default, or a branch name
    #[arg(short, long, default_value = "default")]
    pub revision: String,

    /// Treat the revision as a hash/tip instead of a named branch
    #[arg(long)]
    pub no_branch: bool,

    /// SSH private key for the transport wrapper
    #[arg(long, value_name = "FILE")]
    pub ssh_key: Option<String>,

    /// Disable SSH host-key verification and allow insecure transports
    #[arg(long)]
    pub ssh_ignore: bool,

    /// Override the SSH transport wrapper command
    #[arg(long, value_name = "CMD")]
    pub ssh_wrapper: Option<String>,

    /// Run hg as this user
    #[arg(long)]
    pub user: Option<String>,

    /// Run hg as this group
    #[arg(long)]
    pub group: Option<String>,
}

impl CheckoutArgs {
    pub fn into_resource(self) -> HgCheckout {
        let mut resource = HgCheckout::new(self.repository, self.destination)
            .revision(self.revision)
            .named_branch(!self.no_branch)
            .ssh_key(self.ssh_key.unwrap_or_default())
            .ssh_ignore(self.ssh_ignore)
            .run_as(self.user, self.group);
        if let Some(wrapper) = self.ssh_wrapper {
            resource = resource.ssh_wrapper(wrapper);
        }
        resource.expand_paths();
        resource
    }
}

#[derive(Args)]
pub struct ExportArgs {
    /// Repository URL the tree was checked out from
    pub repository: String,

    /// Path of the tree to strip
    pub destination: PathBuf,
}

impl ExportArgs {
    pub fn into_resource(self) -> HgCheckout {
        let mut resource = HgCheckout::new(self.repository, self.destination);
        resource.expand_paths();
        resource
    }
}

#[derive(Args)]
pub struct ApplyArgs {
    /// Manifest file (defaults to ~/.config/hgsync/checkouts.toml)
    #[arg(short, long, value_name = "FILE", env = "HGSYNC_MANIFEST")]
    pub manifest: Option<PathBuf>,
}
