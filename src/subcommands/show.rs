// SPDX-License-Identifier: GPL-2.0-or-later
//
// sockbind - Pin cgroup sockets to a network device with eBPF
// Copyright (C) 2026  The sockbind authors
//
// Oct. 19, 2026  The sockbind authors  Created this.

//! The `show` subcommand.

use anyhow::{Context as _, Result};
use serde::Serialize;

use crate::hooks::{self, SockAttrs, SockoptCtx, Verdict};
use crate::policy::{BpfGlobals, GuardScope, GuardedOption, PolicyConfig, Rejection};

/// What a policy does, as computed without touching the kernel.
#[derive(Debug, Serialize)]
pub struct Report {
    pub device_index: u32,
    pub mark: u32,
    pub force_device: bool,
    pub guard_scope: GuardScope,
    pub rejection: Rejection,
    pub globals: BpfGlobals,
    /// Attributes of a socket created with default attributes.
    pub new_socket: SockAttrs,
    pub options: Vec<OptionReport>,
}

/// Outcome of setting one of the guardable options.
#[derive(Debug, Serialize)]
pub struct OptionReport {
    pub option: GuardedOption,
    pub optname: i32,
    pub verdict: Verdict,
    pub optlen: i32,
    pub passes_through: bool,
}

impl Report {
    pub fn new(policy: &PolicyConfig) -> Result<Self> {
        let globals = policy.globals()?;

        let mut new_socket = SockAttrs::default();
        hooks::sock_create(&globals, &mut new_socket);

        let options = GuardedOption::ALL
            .iter()
            .map(|&option| {
                let mut ctx = SockoptCtx::new(libc::SOL_SOCKET, option.optname(), 0);
                let verdict = hooks::setsockopt(&globals, &mut ctx);
                OptionReport {
                    option,
                    optname: ctx.optname,
                    verdict,
                    optlen: ctx.optlen,
                    passes_through: ctx.passes_through(verdict),
                }
            })
            .collect();

        Ok(Self {
            device_index: globals.bound_dev_if,
            mark: globals.sock_mark,
            force_device: policy.force_device,
            guard_scope: policy.guard_scope,
            rejection: policy.rejection,
            globals,
            new_socket,
            options,
        })
    }
}

/// Print the resolved policy as JSON.
pub fn main(policy: &PolicyConfig) -> Result<i32> {
    let report = Report::new(policy)?;
    let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;

    println!("{}", json);

    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_for_device_policy() -> Result<()> {
        let mut policy = PolicyConfig::new(4, 0);
        policy.guard_scope = GuardScope::Enforced;

        let report = Report::new(&policy)?;
        assert_eq!(report.new_socket, SockAttrs { bound_dev_if: 4, mark: 0 });

        for option in report.options.iter() {
            let guarded = option.option != GuardedOption::Mark;
            assert_eq!(option.passes_through, !guarded, "{:?}", option.option);
            assert_eq!(option.verdict, Verdict::Allow);
        }

        Ok(())
    }

    #[test]
    fn report_serializes() -> Result<()> {
        let report = Report::new(&PolicyConfig::new(0, 77))?;
        let value = serde_json::to_value(&report)?;

        assert_eq!(value["mark"], 77);
        assert_eq!(value["new_socket"]["mark"], 77);
        assert_eq!(value["guard_scope"], "always");
        assert_eq!(value["options"][0]["option"], "bind_to_device");

        Ok(())
    }
}
