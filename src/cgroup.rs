// SPDX-License-Identifier: GPL-2.0-or-later
//
// sockbind - Pin cgroup sockets to a network device with eBPF
// Copyright (C) 2026  The sockbind authors
//
// Oct. 19, 2026  The sockbind authors  Created this.

//! Helpers for the cgroup v2 hierarchy the programs are attached to.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use lazy_static::lazy_static;
use regex::Regex;

/// Get the cgroup v2 path of the current task, relative to the hierarchy root.
pub fn current_cgroup() -> Result<PathBuf> {
    let contents =
        fs::read_to_string("/proc/self/cgroup").context("Failed to read /proc/self/cgroup")?;

    parse_cgroup_v2(&contents)
}

/// Parse the unified hierarchy entry (`0::<path>`) out of a `/proc/<pid>/cgroup` file.
pub fn parse_cgroup_v2(contents: &str) -> Result<PathBuf> {
    // Compile regex exactly once
    lazy_static! {
        static ref CGROUP_V2_RE: Regex =
            Regex::new(r"(?m)^0::(/.*)$").expect("Failed to compile regex");
    }

    let caps = CGROUP_V2_RE
        .captures(contents)
        .context("No cgroup v2 entry found. Is the unified hierarchy mounted?")?;
    let path: &str = caps
        .get(1)
        .context("Failed to parse cgroup v2 path")?
        .into();

    Ok(PathBuf::from(path))
}

/// Resolve `path`, relative to the hierarchy root, under the mount point `root`.
pub fn resolve(root: &Path, path: &Path) -> PathBuf {
    root.join(path.strip_prefix("/").unwrap_or(path))
}

/// An open cgroup directory. Programs are attached through its file descriptor.
#[derive(Debug)]
pub struct Cgroup {
    path: PathBuf,
    dir: File,
}

impl Cgroup {
    /// Open the cgroup directory at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let dir =
            File::open(&path).with_context(|| format!("Failed to open cgroup {}", path.display()))?;

        if !dir.metadata()?.is_dir() {
            bail!("{} is not a cgroup directory", path.display());
        }

        Ok(Self { path, dir })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open `cgroup.procs` for writing, so a process can move itself in.
    pub fn procs(&self) -> Result<File> {
        let path = self.path.join("cgroup.procs");
        OpenOptions::new()
            .write(true)
            .open(&path)
            .with_context(|| format!("Failed to open {}", path.display()))
    }
}

impl AsRawFd for Cgroup {
    fn as_raw_fd(&self) -> RawFd {
        self.dir.as_raw_fd()
    }
}

/// Move the calling process into the cgroup whose `cgroup.procs` is `procs`.
///
/// Only makes a single `write(2)` call, so it is safe to use between fork and
/// exec.
pub fn enter(procs: RawFd) -> io::Result<()> {
    nix::unistd::write(procs, b"0")?;
    Ok(())
}

/// A child cgroup that is removed again when dropped.
#[derive(Debug)]
pub struct TempCgroup {
    cgroup: Cgroup,
}

impl TempCgroup {
    /// Create the cgroup `name` under `base`, which is relative to the
    /// hierarchy mounted at `root`.
    pub fn create(root: &Path, base: &Path, name: &str) -> Result<Self> {
        let path = resolve(root, base).join(name);

        fs::create_dir(&path)
            .with_context(|| format!("Failed to create cgroup {}", path.display()))?;
        log::debug!("Created cgroup {}", path.display());

        let cgroup = match Cgroup::open(&path) {
            Ok(cgroup) => cgroup,
            Err(e) => {
                let _ = fs::remove_dir(&path);
                return Err(e);
            }
        };

        Ok(Self { cgroup })
    }

    pub fn cgroup(&self) -> &Cgroup {
        &self.cgroup
    }
}

impl AsRawFd for TempCgroup {
    fn as_raw_fd(&self) -> RawFd {
        self.cgroup.as_raw_fd()
    }
}

impl Drop for TempCgroup {
    fn drop(&mut self) {
        let path = self.cgroup.path();
        match fs::remove_dir(path) {
            Ok(_) => log::debug!("Removed cgroup {}", path.display()),
            Err(e) => log::warn!("Failed to remove cgroup {}: {}", path.display(), e),
        }
    }
}
