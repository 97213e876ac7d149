// SPDX-License-Identifier: GPL-2.0-or-later
//
// sockbind - Pin cgroup sockets to a network device with eBPF
// Copyright (C) 2026  The sockbind authors
//
// Oct. 19, 2026  The sockbind authors  Created this.

//! Host-side mirror of the programs in [sock.bpf.c](src/bpf/sock.bpf.c).
//!
//! These functions make the same decisions as the BPF programs over plain
//! structs, so a policy can be checked without loading anything into the
//! kernel. Like the programs, they are straight-line and never allocate.
//!
//! # Warning
//!
//! Keep this in sync with [sock.bpf.c](src/bpf/sock.bpf.c)

use serde::Serialize;

use crate::policy::{BpfGlobals, MAX_OPTNAME};

/// Length written into a guarded `setsockopt` call.
pub const REJECTED_OPTLEN: i32 = -1;

/// Return value of a cgroup socket program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Reject = 0,
    Allow = 1,
}

/// The writable part of `struct bpf_sock` at socket creation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SockAttrs {
    pub bound_dev_if: u32,
    pub mark: u32,
}

/// The part of `struct bpf_sockopt` the guard looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SockoptCtx {
    pub level: i32,
    pub optname: i32,
    pub optlen: i32,
}

impl SockoptCtx {
    pub fn new(level: i32, optname: i32, optlen: i32) -> Self {
        Self {
            level,
            optname,
            optlen,
        }
    }

    /// Whether the option will reach the kernel's own handler unchanged.
    pub fn passes_through(&self, verdict: Verdict) -> bool {
        verdict == Verdict::Allow && self.optlen != REJECTED_OPTLEN
    }
}

/// Mirrors the `cgroup/sock_create` program.
pub fn sock_create(globals: &BpfGlobals, sk: &mut SockAttrs) -> Verdict {
    if globals.bound_dev_if != 0 || globals.force_dev_if {
        sk.bound_dev_if = globals.bound_dev_if;
    }

    if globals.sock_mark != 0 {
        sk.mark = globals.sock_mark;
    }

    Verdict::Allow
}

/// Mirrors the `cgroup/setsockopt` program.
pub fn setsockopt(globals: &BpfGlobals, ctx: &mut SockoptCtx) -> Verdict {
    let optname = ctx.optname;

    if !(0..MAX_OPTNAME).contains(&optname) {
        return Verdict::Allow;
    }

    if globals.guarded_optnames & (1 << optname) == 0 {
        return Verdict::Allow;
    }

    if globals.deny_guarded {
        return Verdict::Reject;
    }

    ctx.optlen = REJECTED_OPTLEN;

    Verdict::Allow
}
