// SPDX-License-Identifier: GPL-2.0-or-later
//
// sockbind - Pin cgroup sockets to a network device with eBPF
// Copyright (C) 2026  The sockbind authors
//
// Oct. 19, 2026  The sockbind authors  Created this.

//! The `run` subcommand.

use std::os::unix::io::AsRawFd;
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

use crate::bpf_program::Enforcer;
use crate::cgroup::{self, Cgroup, TempCgroup};
use crate::config::Settings;
use crate::policy::PolicyConfig;

/// Sent to the child when sockbind receives SIGINT or SIGTERM. `ctrlc` does
/// not say which of the two arrived.
const FORWARDED_SIGNAL: Signal = Signal::SIGINT;

/// Tracks the child between signal handler and main thread.
///
/// An interrupt that arrives before the child is running is kept pending.
/// Exactly one of [`ChildSignals::on_signal`] and [`ChildSignals::started`]
/// claims it, so the child is signalled once.
#[derive(Debug, Default)]
struct ChildSignals {
    pid: AtomicI32,
    pending: AtomicBool,
}

impl ChildSignals {
    /// Called from the signal handler. Returns the pid to forward the signal to.
    fn on_signal(&self) -> Option<i32> {
        self.pending.store(true, Ordering::SeqCst);
        let pid = self.pid.load(Ordering::SeqCst);
        if pid > 0 && self.pending.swap(false, Ordering::SeqCst) {
            Some(pid)
        } else {
            None
        }
    }

    /// Whether an interrupt arrived that no child has received yet.
    fn interrupted(&self) -> bool {
        self.pending.load(Ordering::SeqCst)
    }

    /// Publish the child's pid. Returns true if an interrupt raced with the
    /// spawn and the caller must forward it.
    fn started(&self, pid: i32) -> bool {
        self.pid.store(pid, Ordering::SeqCst);
        self.pending.swap(false, Ordering::SeqCst)
    }

    fn exited(&self) {
        self.pid.store(0, Ordering::SeqCst);
    }
}

/// Run `command` in a fresh cgroup with `policy` attached, returning its exit
/// code.
pub fn main(
    settings: &Settings,
    policy: &PolicyConfig,
    cgroup_base: Option<&Path>,
    command: &[String],
) -> Result<i32> {
    let globals = policy.globals()?;
    log::debug!("Loading programs with {:?}", globals);

    // Forward SIGINT/SIGTERM to the child once it is running
    let signals = Arc::new(ChildSignals::default());
    {
        let signals = signals.clone();
        ctrlc::set_handler(move || {
            if let Some(pid) = signals.on_signal() {
                let _ = kill(Pid::from_raw(pid), FORWARDED_SIGNAL);
            }
        })
        .context("Failed to install signal handler")?;
    }

    let mut enforcer = Enforcer::load(&globals).context("Failed to load BPF programs")?;

    let base = match cgroup_base {
        Some(base) => base.to_path_buf(),
        None => match &settings.cgroup.base {
            Some(base) => PathBuf::from(base),
            None => cgroup::current_cgroup().context("Failed to find current cgroup")?,
        },
    };
    let name = cgroup_name(settings.policy.interface.as_deref(), std::process::id());

    // Declared before the attachment so the programs are detached first
    let cgroup = TempCgroup::create(Path::new(&settings.cgroup.root), &base, &name)?;
    let _attachment = enforcer
        .attach(&cgroup)
        .context("Failed to attach programs to cgroup")?;
    log::info!("Attached policy to {}", cgroup.cgroup().path().display());

    let status = match spawn_in_cgroup(cgroup.cgroup(), command, &signals)? {
        Some(status) => status,
        None => {
            log::warn!("Interrupted before {} was started", command[0]);
            return Ok(128 + FORWARDED_SIGNAL as i32);
        }
    };
    log::info!("{} exited with {}", command[0], status);

    Ok(exit_code(status))
}

/// Name of the temporary cgroup for a `run` invocation.
fn cgroup_name(interface: Option<&str>, pid: u32) -> String {
    format!("{}_{}", interface.unwrap_or("sockbind"), pid)
}

/// Spawn `command` inside `cgroup` and wait for it. Returns `None` without
/// spawning if an interrupt is already pending.
fn spawn_in_cgroup(
    cgroup: &Cgroup,
    command: &[String],
    signals: &ChildSignals,
) -> Result<Option<ExitStatus>> {
    let (program, args) = command.split_first().context("No command given")?;

    let procs = cgroup.procs()?;
    let procs_fd = procs.as_raw_fd();

    let mut cmd = Command::new(program);
    cmd.args(args);
    unsafe {
        // The child joins the cgroup before exec, so every socket it creates is
        // seen by the programs
        cmd.pre_exec(move || cgroup::enter(procs_fd));
    }

    if signals.interrupted() {
        return Ok(None);
    }

    let mut child = cmd
        .spawn()
        .with_context(|| format!("Failed to run {}", program))?;
    let pid = child.id() as i32;
    if signals.started(pid) {
        let _ = kill(Pid::from_raw(pid), FORWARDED_SIGNAL);
    }

    let status = child.wait();
    signals.exited();

    status
        .map(Some)
        .with_context(|| format!("Failed to wait for {}", program))
}

/// Shell-style exit code: the exit status, or 128 plus the terminating signal.
fn exit_code(status: ExitStatus) -> i32 {
    match (status.code(), status.signal()) {
        (Some(code), _) => code,
        (None, Some(signal)) => 128 + signal,
        (None, None) => 1,
    }
}
