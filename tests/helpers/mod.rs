// SPDX-License-Identifier: GPL-2.0-or-later
//
// sockbind - Pin cgroup sockets to a network device with eBPF
// Copyright (C) 2026  The sockbind authors
//
// Oct. 19, 2026  The sockbind authors  Created this.

use std::mem::size_of;
use std::os::unix::io::AsRawFd;
use std::path::Path;

use anyhow::{bail, Result};
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{fork, ForkResult};
use sockbind::bpf_program::{Attachment, Enforcer};
use sockbind::cgroup::{self, TempCgroup};
use sockbind::policy::PolicyConfig;

/// A temporary cgroup with a policy attached.
pub struct PolicedCgroup {
    // Field order matters: detach before removing the cgroup
    _attachment: Attachment,
    _enforcer: Enforcer<'static>,
    pub cgroup: TempCgroup,
}

impl PolicedCgroup {
    pub fn new(policy: &PolicyConfig, name: &str) -> Result<Self> {
        let mut enforcer = Enforcer::load(&policy.globals()?)?;
        let base = cgroup::current_cgroup()?;
        let cgroup = TempCgroup::create(Path::new("/sys/fs/cgroup"), &base, name)?;
        let attachment = enforcer.attach(&cgroup)?;

        Ok(Self {
            _attachment: attachment,
            _enforcer: enforcer,
            cgroup,
        })
    }

    /// Run `f` in a forked child that has joined the cgroup, returning its exit
    /// code. `f` must only make async-signal-safe calls.
    pub fn run_in<F: FnOnce() -> i32>(&self, f: F) -> Result<i32> {
        let procs = self.cgroup.cgroup().procs()?;

        match unsafe { fork()? } {
            ForkResult::Child => {
                let code = match cgroup::enter(procs.as_raw_fd()) {
                    Ok(()) => f(),
                    Err(_) => 100,
                };
                unsafe { libc::_exit(code) }
            }
            ForkResult::Parent { child } => match waitpid(child, None)? {
                WaitStatus::Exited(_, code) => Ok(code),
                status => bail!("Child did not exit cleanly: {:?}", status),
            },
        }
    }
}

/// A UDP socket, or -1.
pub fn udp_socket() -> i32 {
    unsafe { libc::socket(libc::AF_INET, libc::SOCK_DGRAM, 0) }
}

/// Read an integer `SOL_SOCKET` option, or -1 on failure.
pub fn get_int(fd: i32, optname: i32) -> i64 {
    let mut value: libc::c_int = 0;
    let mut len = size_of::<libc::c_int>() as libc::socklen_t;
    let ret = unsafe {
        libc::getsockopt(
            fd,
            libc::SOL_SOCKET,
            optname,
            &mut value as *mut libc::c_int as *mut libc::c_void,
            &mut len,
        )
    };
    if ret == 0 {
        value as i64
    } else {
        -1
    }
}

/// Set an integer `SOL_SOCKET` option, returning the raw `setsockopt(2)` result.
pub fn set_int(fd: i32, optname: i32, value: libc::c_int) -> i32 {
    unsafe {
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            optname,
            &value as *const libc::c_int as *const libc::c_void,
            size_of::<libc::c_int>() as libc::socklen_t,
        )
    }
}

/// The errno of the last failed call in this process.
pub fn errno() -> i32 {
    nix::errno::errno()
}
