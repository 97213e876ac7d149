// SPDX-License-Identifier: GPL-2.0-or-later
//
// sockbind - Pin cgroup sockets to a network device with eBPF
// Copyright (C) 2026  The sockbind authors
//
// Oct. 19, 2026  The sockbind authors  Created this.

use std::env;
use std::path::PathBuf;

use libbpf_cargo::SkeletonBuilder;

const SRC: &str = "src/bpf/sock.bpf.c";
const HEADERS: &[&str] = &["src/bpf/uapi.h"];

fn main() {
    // Re-run build if the BPF program or its header(s) have changed
    println!("cargo:rerun-if-changed={}", SRC);
    for header in HEADERS {
        println!("cargo:rerun-if-changed={}", header);
    }

    let mut out =
        PathBuf::from(env::var_os("OUT_DIR").expect("OUT_DIR must be set in build script"));
    out.push("sock.skel.rs");

    // Compile the BPF object and generate its skeleton
    SkeletonBuilder::new()
        .source(SRC)
        .build_and_generate(&out)
        .expect("Failed to build BPF skeleton");
}
