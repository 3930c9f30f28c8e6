//! Declarative manifest of checkout resources.
//!
//! A TOML file lists the checkouts a machine should carry; `hgsync apply`
//! reconciles each one in order. Example:
//!
//! ```toml
//! [[checkout]]
//! repository = "https://hg.example.com/vendor"
//! destination = "~/src/vendor"
//!
//! [[checkout]]
//! repository = "ssh://hg.example.com/site"
//! destination = "/srv/www/site"
//! revision = "stable"
//! ssh_key = "~/.ssh/deploy"
//! operation = "sync"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::resource::HgCheckout;

/// Default manifest location: `~/.config/hgsync/checkouts.toml`
pub fn default_path() -> Result<PathBuf> {
    let home = dirs::home_dir().context("could not determine home directory")?;
    Ok(home.join(".config").join("hgsync").join("checkouts.toml"))
}

/// Reconciliation operation requested for one manifest entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    #[default]
    Sync,
    Checkout,
    Export,
}

#[derive(Debug, Deserialize)]
pub struct Entry {
    #[serde(flatten)]
    pub checkout: HgCheckout,
    #[serde(default)]
    pub operation: Operation,
}

#[derive(Debug, Default, Deserialize)]
pub struct Manifest {
    #[serde(default, rename = "checkout")]
    pub checkouts: Vec<Entry>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("could not read {}", path.display()))?;
        let mut manifest: Self = toml::from_str(&content)
            .with_context(|| format!("invalid manifest {}", path.display()))?;
        for entry in &mut manifest.checkouts {
            entry.checkout.expand_paths();
        }
        Ok(manifest)
    }
}
