// SPDX-License-Identifier: GPL-2.0-or-later
//
// sockbind - Pin cgroup sockets to a network device with eBPF
// Copyright (C) 2026  The sockbind authors
//
// Oct. 19, 2026  The sockbind authors  Created this.

//! The socket binding policy and its BPF-side representation.

use std::collections::HashSet;
use std::num::NonZeroU32;

use anyhow::{bail, Context as _, Result};
use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::config::PolicySettings;

/// Option codes must fit in the 64-bit mask read by the `setsockopt` program.
///
/// # Warning
///
/// Keep this in sync with `SOCKBIND_MAX_OPTNAME` in [uapi.h](src/bpf/uapi.h)
pub const MAX_OPTNAME: libc::c_int = 64;

/// A socket option that would let a confined process change its binding.
#[derive(Debug, Hash, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum GuardedOption {
    /// `SO_BINDTODEVICE`: rebind to a device by name.
    #[serde(alias = "so_bindtodevice")]
    BindToDevice,
    /// `SO_BINDTOIFINDEX`: rebind to a device by index.
    #[serde(alias = "so_bindtoifindex")]
    BindToIfindex,
    /// `SO_MARK`: change the socket mark.
    #[serde(alias = "so_mark")]
    Mark,
}

impl GuardedOption {
    pub const ALL: [GuardedOption; 3] = [Self::BindToDevice, Self::BindToIfindex, Self::Mark];

    /// The platform's `SOL_SOCKET` option code.
    pub fn optname(self) -> libc::c_int {
        match self {
            Self::BindToDevice => libc::SO_BINDTODEVICE,
            Self::BindToIfindex => libc::SO_BINDTOIFINDEX,
            Self::Mark => libc::SO_MARK,
        }
    }
}

bitflags! {
    /// A set of [`GuardedOption`]s.
    #[derive(Default)]
    pub struct GuardedOptions: u8 {
        const BIND_TO_DEVICE  = 1 << 0;
        const BIND_TO_IFINDEX = 1 << 1;
        const MARK            = 1 << 2;
        const DEVICE = Self::BIND_TO_DEVICE.bits | Self::BIND_TO_IFINDEX.bits;
    }
}

impl From<GuardedOption> for GuardedOptions {
    fn from(option: GuardedOption) -> Self {
        match option {
            GuardedOption::BindToDevice => Self::BIND_TO_DEVICE,
            GuardedOption::BindToIfindex => Self::BIND_TO_IFINDEX,
            GuardedOption::Mark => Self::MARK,
        }
    }
}

impl From<&GuardedOptionSet> for GuardedOptions {
    fn from(set: &GuardedOptionSet) -> Self {
        set.0
            .iter()
            .fold(Self::empty(), |acc, &option| acc | option.into())
    }
}

impl GuardedOptions {
    /// Iterate over the options in this set, in a stable order.
    pub fn iter(self) -> impl Iterator<Item = GuardedOption> {
        let all: &'static [GuardedOption] = &GuardedOption::ALL;
        all.iter()
            .copied()
            .filter(move |&option| self.contains(option.into()))
    }

    /// Bitmask of option codes, bit `n` standing for option code `n`.
    pub fn optname_mask(self) -> Result<u64> {
        let mut mask = 0u64;

        for option in self.iter() {
            let optname = option.optname();
            if !(0..MAX_OPTNAME).contains(&optname) {
                bail!(
                    "Option code {} for {:?} does not fit in the guard mask",
                    optname,
                    option
                );
            }
            mask |= 1 << optname;
        }

        Ok(mask)
    }
}

/// A wrapper around a `HashSet` of [`GuardedOption`]s.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GuardedOptionSet(HashSet<GuardedOption>);

impl<'de> Deserialize<'de> for GuardedOptionSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum HashSetOrSingle {
            HashSet(HashSet<GuardedOption>),
            Single(GuardedOption),
        }

        // Allows a set to be deserialized from a single item or a sequence of items.
        let hash_set = match HashSetOrSingle::deserialize(deserializer)? {
            HashSetOrSingle::HashSet(set) => set,
            HashSetOrSingle::Single(option) => {
                let mut s = HashSet::with_capacity(1);
                s.insert(option);
                s
            }
        };

        Ok(GuardedOptionSet(hash_set))
    }
}

impl Serialize for GuardedOptionSet {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut options: Vec<_> = self.0.iter().collect();
        options.sort();
        serializer.collect_seq(options)
    }
}

/// When a guarded option is actually intercepted.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GuardScope {
    /// Guard every configured option, whether or not its attribute is enforced.
    Always,
    /// Guard device options only while a device is enforced, and the mark option
    /// only while a mark is enforced.
    Enforced,
}

impl Default for GuardScope {
    fn default() -> Self {
        Self::Always
    }
}

/// How the `setsockopt` program refuses a guarded option.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    /// Overwrite the option length with -1 and allow the call.
    PoisonLength,
    /// Reject the call outright; the caller sees `EPERM`.
    Deny,
}

impl Default for Rejection {
    fn default() -> Self {
        Self::PoisonLength
    }
}

/// Immutable policy, fixed when the programs are loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyConfig {
    /// Device index stamped on new sockets.
    pub device_index: Option<NonZeroU32>,
    /// Mark stamped on new sockets.
    pub mark: Option<NonZeroU32>,
    /// Write the device index even when it is unset.
    pub force_device: bool,
    pub guarded: GuardedOptions,
    pub guard_scope: GuardScope,
    pub rejection: Rejection,
}

impl PolicyConfig {
    /// A policy enforcing `device_index` and `mark` (0 disables either) that
    /// guards every option.
    pub fn new(device_index: u32, mark: u32) -> Self {
        Self {
            device_index: NonZeroU32::new(device_index),
            mark: NonZeroU32::new(mark),
            force_device: false,
            guarded: GuardedOptions::all(),
            guard_scope: GuardScope::default(),
            rejection: Rejection::default(),
        }
    }

    /// Resolve a policy from settings, looking up the interface if one is named.
    pub fn from_settings(settings: &PolicySettings) -> Result<Self> {
        let device_index = match &settings.interface {
            Some(name) => {
                let index = resolve_interface(name)?;
                if settings.ifindex != 0 && settings.ifindex != index {
                    bail!(
                        "Interface {} has index {}, which conflicts with ifindex {}",
                        name,
                        index,
                        settings.ifindex
                    );
                }
                index
            }
            None => settings.ifindex,
        };

        Ok(Self {
            device_index: NonZeroU32::new(device_index),
            mark: NonZeroU32::new(settings.mark),
            force_device: settings.force_device,
            guarded: GuardedOptions::from(&settings.guard),
            guard_scope: settings.guard_scope,
            rejection: settings.rejection,
        })
    }

    /// Whether new sockets get their bound device written.
    pub fn device_enforced(&self) -> bool {
        self.device_index.is_some() || self.force_device
    }

    /// Whether new sockets get their mark written.
    pub fn mark_enforced(&self) -> bool {
        self.mark.is_some()
    }

    /// The options intercepted once `guard_scope` is taken into account.
    pub fn effective_guard(&self) -> GuardedOptions {
        match self.guard_scope {
            GuardScope::Always => self.guarded,
            GuardScope::Enforced => {
                let mut guarded = self.guarded;
                if !self.device_enforced() {
                    guarded.remove(GuardedOptions::DEVICE);
                }
                if !self.mark_enforced() {
                    guarded.remove(GuardedOptions::MARK);
                }
                guarded
            }
        }
    }

    /// Flatten into the globals read by the BPF programs.
    pub fn globals(&self) -> Result<BpfGlobals> {
        Ok(BpfGlobals {
            bound_dev_if: self.device_index.map_or(0, NonZeroU32::get),
            sock_mark: self.mark.map_or(0, NonZeroU32::get),
            force_dev_if: self.force_device,
            guarded_optnames: self
                .effective_guard()
                .optname_mask()
                .context("Failed to build guarded option mask")?,
            deny_guarded: self.rejection == Rejection::Deny,
        })
    }
}

/// Read-only globals of the BPF programs.
///
/// # Warning
///
/// Keep this in sync with [sock.bpf.c](src/bpf/sock.bpf.c)
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BpfGlobals {
    pub bound_dev_if: u32,
    pub sock_mark: u32,
    pub force_dev_if: bool,
    pub guarded_optnames: u64,
    pub deny_guarded: bool,
}

/// Look up the index of the network interface `name`.
pub fn resolve_interface(name: &str) -> Result<u32> {
    nix::net::if_::if_nametoindex(name)
        .with_context(|| format!("Failed to resolve interface {}", name))
}
