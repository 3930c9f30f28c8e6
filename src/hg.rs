//! Structured runner for the external `hg` client.
//!
//! Every invocation is an argument vector handed straight to the process,
//! never a shell string, so repository URLs, revisions and paths are not
//! shell-interpreted. Each command carries its accepted exit-code set;
//! anything outside it is a fatal [`Error::CommandFailed`].

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};

/// hg exits 255 when invoked outside a repository. Other failure modes can
/// share this code; identity/branch queries treat it as "not a repo" anyway.
pub const NOT_A_REPO: i32 = 255;

/// Process identity applied to spawned hg commands.
#[derive(Debug, Clone, Default)]
pub struct RunAs {
    pub user: Option<String>,
    pub group: Option<String>,
}

impl RunAs {
    pub fn is_default(&self) -> bool {
        self.user.is_none() && self.group.is_none()
    }
}

/// Captured result of one hg invocation.
pub struct CmdOutput {
    pub code: i32,
    pub stdout: String,
}

/// One hg invocation: argv, working directory, accepted exit codes,
/// process identity and optional live output streaming.
pub struct HgCmd {
    args: Vec<String>,
    cwd: Option<PathBuf>,
    accept: Vec<i32>,
    run_as: RunAs,
    stream: bool,
}

impl HgCmd {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            cwd: None,
            accept: vec![0],
            run_as: RunAs::default(),
            stream: false,
        }
    }

    pub fn cwd(mut self, dir: &Path) -> Self {
        self.cwd = Some(dir.to_path_buf());
        self
    }

    /// Exit codes treated as success (default: just 0).
    pub fn accept(mut self, codes: &[i32]) -> Self {
        self.accept = codes.to_vec();
        self
    }

    pub fn run_as(mut self, identity: &RunAs) -> Self {
        self.run_as = identity.clone();
        self
    }

    /// Attach the command to the terminal when interactive. Streamed runs
    /// do not capture stdout.
    pub fn stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn run(self) -> Result<CmdOutput> {
        let display = format!("hg {}", self.args.join(" "));
        log::debug!("running {display}");

        let mut cmd = Command::new("hg");
        cmd.args(&self.args);
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        apply_identity(&mut cmd, &self.run_as)?;

        // Live streaming only in an interactive, info-logging context.
        let interactive = self.stream
            && std::io::stdout().is_terminal()
            && log::log_enabled!(log::Level::Info);

        let (code, stdout, stderr) = if interactive {
            cmd.stdin(Stdio::inherit())
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit());
            let status = cmd.status()?;
            (status.code().unwrap_or(-1), String::new(), String::new())
        } else {
            let output = cmd.output()?;
            (
                output.status.code().unwrap_or(-1),
                String::from_utf8_lossy(&output.stdout).into_owned(),
                String::from_utf8_lossy(&output.stderr).into_owned(),
            )
        };

        if !self.accept.contains(&code) {
            return Err(Error::CommandFailed {
                command: display,
                status: code,
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(CmdOutput { code, stdout })
    }
}

#[cfg(unix)]
fn apply_identity(cmd: &mut Command, run_as: &RunAs) -> Result<()> {
    use std::os::unix::process::CommandExt;

    if run_as.is_default() {
        return Ok(());
    }
    if let Some(name) = &run_as.user {
        let user = nix::unistd::User::from_name(name)
            .map_err(|errno| Error::Io(std::io::Error::from_raw_os_error(errno as i32)))?
            .ok_or_else(|| Error::UnknownIdentity(name.clone()))?;
        cmd.uid(user.uid.as_raw());
    }
    if let Some(name) = &run_as.group {
        let group = nix::unistd::Group::from_name(name)
            .map_err(|errno| Error::Io(std::io::Error::from_raw_os_error(errno as i32)))?
            .ok_or_else(|| Error::UnknownIdentity(name.clone()))?;
        cmd.gid(group.gid.as_raw());
    }
    Ok(())
}

#[cfg(not(unix))]
fn apply_identity(_cmd: &mut Command, run_as: &RunAs) -> Result<()> {
    if !run_as.is_default() {
        log::warn!("user/group overrides are ignored on this platform");
    }
    Ok(())
}

static VERSION_BANNER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"version ([0-9]+)\.([0-9]+)").unwrap());

/// Installed Mercurial client version as (major, minor), discovered from
/// the first line of `hg --version`.
pub fn hg_version() -> Result<(u32, u32)> {
    let out = HgCmd::new(["--version"]).run()?;
    parse_version(&out.stdout).ok_or_else(|| Error::CommandFailed {
        command: "hg --version".to_string(),
        status: 0,
        stderr: format!(
            "unrecognized version banner: {}",
            out.stdout.lines().next().unwrap_or_default()
        ),
    })
}

fn parse_version(banner: &str) -> Option<(u32, u32)> {
    let caps = VERSION_BANNER.captures(banner.lines().next()?)?;
    Some((caps[1].parse().ok()?, caps[2].parse().ok()?))
}
