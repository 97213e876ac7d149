// SPDX-License-Identifier: GPL-2.0-or-later
//
// sockbind - Pin cgroup sockets to a network device with eBPF
// Copyright (C) 2026  The sockbind authors
//
// Oct. 19, 2026  The sockbind authors  Created this.

//! Live tests against the kernel. These need root and a cgroup v2 hierarchy,
//! so run them with `cargo test -- --ignored`.

use anyhow::Result;
use sockbind::policy::{resolve_interface, PolicyConfig, Rejection};

use crate::helpers::{errno, get_int, set_int, udp_socket, PolicedCgroup};

#[test]
#[ignore]
fn new_sockets_are_bound() -> Result<()> {
    let lo = resolve_interface("lo")?;
    let cgroup = PolicedCgroup::new(&PolicyConfig::new(lo, 77), "sockbind_test_bound")?;

    let code = cgroup.run_in(|| {
        let fd = udp_socket();
        if fd < 0 {
            return 1;
        }
        if get_int(fd, libc::SO_BINDTOIFINDEX) != lo as i64 {
            return 2;
        }
        if get_int(fd, libc::SO_MARK) != 77 {
            return 3;
        }
        0
    })?;

    assert_eq!(code, 0);

    Ok(())
}

#[test]
#[ignore]
fn poisoned_options_do_not_change_binding() -> Result<()> {
    let lo = resolve_interface("lo")?;
    let cgroup = PolicedCgroup::new(&PolicyConfig::new(lo, 77), "sockbind_test_poison")?;

    let code = cgroup.run_in(|| {
        let fd = udp_socket();
        if fd < 0 {
            return 1;
        }
        // A poisoned length reports success to the caller
        if set_int(fd, libc::SO_MARK, 1) != 0 {
            return 2;
        }
        if get_int(fd, libc::SO_MARK) != 77 {
            return 3;
        }
        if set_int(fd, libc::SO_BINDTOIFINDEX, 0) != 0 {
            return 4;
        }
        if get_int(fd, libc::SO_BINDTOIFINDEX) != lo as i64 {
            return 5;
        }
        // Unguarded options still work
        if set_int(fd, libc::SO_REUSEADDR, 1) != 0 || get_int(fd, libc::SO_REUSEADDR) != 1 {
            return 6;
        }
        0
    })?;

    assert_eq!(code, 0);

    Ok(())
}

#[test]
#[ignore]
fn denied_options_fail_with_eperm() -> Result<()> {
    let lo = resolve_interface("lo")?;
    let mut policy = PolicyConfig::new(lo, 0);
    policy.rejection = Rejection::Deny;
    let cgroup = PolicedCgroup::new(&policy, "sockbind_test_deny")?;

    let code = cgroup.run_in(|| {
        let fd = udp_socket();
        if fd < 0 {
            return 1;
        }
        if set_int(fd, libc::SO_BINDTOIFINDEX, 0) != -1 || errno() != libc::EPERM {
            return 2;
        }
        if set_int(fd, libc::SO_REUSEADDR, 1) != 0 {
            return 3;
        }
        0
    })?;

    assert_eq!(code, 0);

    Ok(())
}
