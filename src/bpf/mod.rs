// SPDX-License-Identifier: GPL-2.0-or-later
//
// sockbind - Pin cgroup sockets to a network device with eBPF
// Copyright (C) 2026  The sockbind authors
//
// Oct. 19, 2026  The sockbind authors  Created this.

//! Skeleton generated from [sock.bpf.c](src/bpf/sock.bpf.c) by `build.rs`.

#[allow(clippy::all)]
#[allow(non_camel_case_types)]
#[allow(dead_code)]
mod skel {
    include!(concat!(env!("OUT_DIR"), "/sock.skel.rs"));
}

pub use skel::*;
