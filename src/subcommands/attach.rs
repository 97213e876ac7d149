// SPDX-License-Identifier: GPL-2.0-or-later
//
// sockbind - Pin cgroup sockets to a network device with eBPF
// Copyright (C) 2026  The sockbind authors
//
// Oct. 19, 2026  The sockbind authors  Created this.

//! The `attach` subcommand.

use std::path::{Path, PathBuf};
use std::sync::mpsc;

use anyhow::{Context as _, Result};

use crate::bpf_program::Enforcer;
use crate::cgroup::{self, Cgroup};
use crate::config::Settings;
use crate::policy::PolicyConfig;

/// Attach `policy` to an existing cgroup and keep it attached until interrupted.
pub fn main(settings: &Settings, policy: &PolicyConfig, path: &Path) -> Result<i32> {
    let globals = policy.globals()?;

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .context("Failed to install signal handler")?;

    let mut enforcer = Enforcer::load(&globals).context("Failed to load BPF programs")?;

    let cgroup = Cgroup::open(cgroup_path(Path::new(&settings.cgroup.root), path))?;
    let attachment = enforcer
        .attach(&cgroup)
        .context("Failed to attach programs to cgroup")?;
    log::info!(
        "Attached policy to {}, interrupt to detach",
        cgroup.path().display()
    );

    rx.recv().context("Signal handler went away")?;

    drop(attachment);
    log::info!("Detached policy from {}", cgroup.path().display());

    Ok(0)
}

/// Accept either a path on the cgroup filesystem or one relative to its root.
fn cgroup_path(root: &Path, path: &Path) -> PathBuf {
    if path.starts_with(root) {
        path.to_path_buf()
    } else {
        cgroup::resolve(root, path)
    }
}
