// SPDX-License-Identifier: GPL-2.0-or-later
//
// sockbind - Pin cgroup sockets to a network device with eBPF
// Copyright (C) 2026  The sockbind authors
//
// Oct. 19, 2026  The sockbind authors  Created this.

//! Loading the socket programs and attaching them to cgroups.

use std::os::unix::io::AsRawFd;

use anyhow::{Context, Result};
use libbpf_rs::skel::{OpenSkel as _, SkelBuilder as _};
use libbpf_rs::Link;
use nix::sys::resource::{setrlimit, Resource};

use crate::bpf::{OpenSockSkel, SockSkel, SockSkelBuilder};
use crate::policy::BpfGlobals;

/// Memlock limit needed to load the programs on kernels without memcg accounting.
const MEMLOCK_LIMIT: libc::rlim_t = 128 << 20;

/// The loaded `sock_create` and `setsockopt` programs.
pub struct Enforcer<'a> {
    skel: SockSkel<'a>,
}

/// Keeps both programs attached to a cgroup until dropped.
pub struct Attachment {
    _sock_create: Link,
    _setsockopt: Link,
}

impl<'a> Enforcer<'a> {
    /// Open the skeleton, set its read-only globals from `globals`, and load it
    /// into the kernel.
    pub fn load(globals: &BpfGlobals) -> Result<Self> {
        log::debug!("Initializing BPF objects...");

        let mut builder = SockSkelBuilder::default();
        if log::log_enabled!(log::Level::Trace) {
            builder.obj_builder.debug(true);
        }

        log::debug!("Bumping memlock...");
        bump_memlock_rlimit().context("Failed bumping memlock limit")?;

        log::debug!("Opening eBPF objects...");
        let mut open_skel = builder.open().context("Failed to open skeleton")?;

        initialize_bpf_globals(&mut open_skel, globals);

        log::debug!("Loading eBPF objects into kernel...");
        let skel = open_skel.load().context("Failed to load skeleton")?;

        Ok(Self { skel })
    }

    /// Attach both programs to `cgroup`. Sockets created in the cgroup after this
    /// returns are bound.
    pub fn attach<C: AsRawFd>(&mut self, cgroup: &C) -> Result<Attachment> {
        let fd = cgroup.as_raw_fd();

        log::debug!("Attaching sock_create to cgroup fd {}...", fd);
        let sock_create = self
            .skel
            .progs_mut()
            .sock_create()
            .attach_cgroup(fd)
            .context("Failed to attach sock_create")?;

        log::debug!("Attaching setsockopt to cgroup fd {}...", fd);
        let setsockopt = self
            .skel
            .progs_mut()
            .setsockopt()
            .attach_cgroup(fd)
            .context("Failed to attach setsockopt")?;

        Ok(Attachment {
            _sock_create: sock_create,
            _setsockopt: setsockopt,
        })
    }
}

/// Set BPF global variables
fn initialize_bpf_globals(open_skel: &mut OpenSockSkel, globals: &BpfGlobals) {
    let rodata = open_skel.rodata();

    rodata.bound_dev_if = globals.bound_dev_if;
    rodata.sock_mark = globals.sock_mark;
    rodata.force_dev_if = globals.force_dev_if as u8;
    rodata.guarded_optnames = globals.guarded_optnames;
    rodata.deny_guarded = globals.deny_guarded as u8;
}

/// Bump the rlimit for memlock up to [`MEMLOCK_LIMIT`].
fn bump_memlock_rlimit() -> Result<()> {
    setrlimit(Resource::RLIMIT_MEMLOCK, MEMLOCK_LIMIT, MEMLOCK_LIMIT)
        .context("Failed to increase rlimit")
}
