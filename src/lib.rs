// SPDX-License-Identifier: GPL-2.0-or-later
//
// sockbind - Pin cgroup sockets to a network device with eBPF
// Copyright (C) 2026  The sockbind authors
//
// Oct. 19, 2026  The sockbind authors  Created this.

//! Library functions for sockbind.

pub mod bpf;
pub mod bpf_program;
pub mod cgroup;
pub mod cli;
pub mod config;
pub mod hooks;
pub mod log;
pub mod policy;
pub mod subcommands;
