// SPDX-License-Identifier: GPL-2.0-or-later
//
// sockbind - Pin cgroup sockets to a network device with eBPF
// Copyright (C) 2026  The sockbind authors
//
// Oct. 19, 2026  The sockbind authors  Created this.

//! sockbind's CLI

use std::path::PathBuf;

use anyhow::Result;
use clap_derive::{Args, Parser, Subcommand};

use crate::config::{PolicySettings, Settings};
use crate::policy::{GuardScope, PolicyConfig, Rejection};
use crate::subcommands;

/// The sockbind CLI
#[derive(Parser, Debug)]
#[clap(
    author,
    version,
    about = "Pin the sockets of a cgroup to a network device and mark with eBPF",
    arg_required_else_help(true)
)]
pub struct Cli {
    /// The subcommand to run
    #[clap(subcommand)]
    subcommand: Cmd,
    /// Verbosity level for log messages (-1 or lower is silent, 0 is quiet, 1 is info,
    /// 2 is debug, 3 is trace). Defaults to value defined in sockbind configs.
    #[clap(global = true, long, short, allow_hyphen_values = true)]
    verbose: Option<i8>,
    /// Config file to read from. Defaults to /etc/sockbind.yml if it exists.
    #[clap(global = true, long, short)]
    config: Option<PathBuf>,
}

impl Cli {
    /// Run the selected subcommand, returning the process exit code.
    pub fn run(&self) -> Result<i32> {
        let mut config = Settings::new(self.config.as_deref())?;

        if let Some(verbose) = self.verbose {
            config.verbosity = crate::log::verbosity_to_level(verbose);
        }

        crate::log::configure(config.verbosity, config.log_file.as_deref())?;

        log::trace!("CLI arguments: {:#?}", self);

        self.subcommand.run(config)
    }
}

/// sockbind subcommand
#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Run a command with its sockets pinned by the policy
    #[clap(display_order(1))]
    Run {
        #[clap(flatten)]
        policy: PolicyArgs,
        /// Parent of the temporary cgroup, relative to the cgroup root. Defaults
        /// to the cgroup sockbind runs in
        #[clap(long)]
        cgroup_base: Option<PathBuf>,
        /// The command to run and its arguments
        #[clap(last(true), required(true))]
        command: Vec<String>,
    },
    /// Attach the policy to an existing cgroup until interrupted
    #[clap(display_order(2))]
    Attach {
        #[clap(flatten)]
        policy: PolicyArgs,
        /// The cgroup to attach to
        #[clap(long)]
        cgroup: PathBuf,
    },
    /// Print the resolved policy and its effect on sockets
    #[clap(display_order(3))]
    Show {
        #[clap(flatten)]
        policy: PolicyArgs,
    },
}

impl Cmd {
    pub(crate) fn run(&self, mut config: Settings) -> Result<i32> {
        match self {
            Cmd::Run {
                policy,
                cgroup_base,
                command,
            } => {
                let policy = policy.resolve(&mut config.policy)?;
                subcommands::run::main(&config, &policy, cgroup_base.as_deref(), command)
            }
            Cmd::Attach { policy, cgroup } => {
                let policy = policy.resolve(&mut config.policy)?;
                subcommands::attach::main(&config, &policy, cgroup)
            }
            Cmd::Show { policy } => {
                let policy = policy.resolve(&mut config.policy)?;
                subcommands::show::main(&policy)
            }
        }
    }
}

/// Policy flags shared by every subcommand. These override the config file.
#[derive(Args, Debug, Default)]
pub struct PolicyArgs {
    /// Network interface to pin sockets to
    #[clap(short, long)]
    interface: Option<String>,
    /// Index of the network device to pin sockets to
    #[clap(long)]
    ifindex: Option<u32>,
    /// Mark to stamp on new sockets
    #[clap(short, long)]
    mark: Option<u32>,
    /// Write the device index even when it is 0
    #[clap(long)]
    force_device: bool,
    /// Only guard options for attributes that are actually enforced
    #[clap(long)]
    guard_enforced: bool,
    /// Fail guarded socket options with EPERM instead of poisoning their length
    #[clap(long)]
    deny: bool,
}

impl PolicyArgs {
    /// Apply these flags on top of `settings`.
    pub fn apply(&self, settings: &mut PolicySettings) {
        if let Some(interface) = &self.interface {
            settings.interface = Some(interface.clone());
            settings.ifindex = self.ifindex.unwrap_or(0);
        } else if let Some(ifindex) = self.ifindex {
            settings.interface = None;
            settings.ifindex = ifindex;
        }
        if let Some(mark) = self.mark {
            settings.mark = mark;
        }
        if self.force_device {
            settings.force_device = true;
        }
        if self.guard_enforced {
            settings.guard_scope = GuardScope::Enforced;
        }
        if self.deny {
            settings.rejection = Rejection::Deny;
        }
    }

    /// Apply these flags on top of `settings` and resolve the result.
    pub fn resolve(&self, settings: &mut PolicySettings) -> Result<PolicyConfig> {
        self.apply(settings);
        let policy = PolicyConfig::from_settings(settings)?;
        log::debug!("Resolved policy: {:?}", policy);
        Ok(policy)
    }
}
