// SPDX-License-Identifier: GPL-2.0-or-later
//
// sockbind - Pin cgroup sockets to a network device with eBPF
// Copyright (C) 2026  The sockbind authors
//
// Oct. 19, 2026  The sockbind authors  Created this.

//! Layered settings: built-in defaults, a config file, then the environment.

use std::path::Path;

use anyhow::{Context as _, Result};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

use crate::policy::{GuardScope, GuardedOptionSet, Rejection};

/// Global settings file, read when no file is given on the command line.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/sockbind.yml";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Cgroup {
    /// Mount point of the cgroup v2 hierarchy.
    pub root: String,
    /// Parent cgroup for temporary cgroups, relative to `root`.
    pub base: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicySettings {
    #[serde(alias = "iface")]
    pub interface: Option<String>,
    #[serde(alias = "dev_if")]
    pub ifindex: u32,
    pub mark: u32,
    pub force_device: bool,
    pub guard: GuardedOptionSet,
    pub guard_scope: GuardScope,
    pub rejection: Rejection,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub verbosity: log::LevelFilter,
    #[serde(alias = "logfile")]
    pub log_file: Option<String>,
    pub cgroup: Cgroup,
    pub policy: PolicySettings,
}

impl Settings {
    /// Build settings, reading `path` if it is given and the global config file
    /// otherwise.
    pub fn new(path: Option<&Path>) -> Result<Self> {
        let mut s = Config::new();

        // Set defaults
        s.merge(File::from_str(
            include_str!("../config/default.yml"),
            FileFormat::Yaml,
        ))
        .context("Failed to apply default settings")?;

        // Merge in config files
        match path {
            // User-supplied config file
            Some(path) => s.merge(
                File::from(path)
                    .format(FileFormat::Yaml)
                    .required(true),
            ),
            // Global config file
            None => s.merge(
                File::with_name(DEFAULT_CONFIG_PATH)
                    .format(FileFormat::Yaml)
                    .required(false),
            ),
        }
        .context("Error reading config file")?;

        // Read in from environment variables, e.g. SOCKBIND_POLICY__MARK=7
        s.merge(Environment::with_prefix("SOCKBIND").separator("__"))
            .context("Error reading settings from environment")?;

        s.try_into().context("Failed to deserialize settings")
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Mutex;

    use lazy_static::lazy_static;

    use super::*;
    use crate::policy::GuardedOptions;

    lazy_static! {
        /// Held by tests that read or change `SOCKBIND_*` variables.
        static ref ENV_LOCK: Mutex<()> = Mutex::new(());
    }

    fn env_lock() -> std::sync::MutexGuard<'static, ()> {
        ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[test]
    fn default_smoke_test() {
        let _env = env_lock();
        let settings = Settings::new(None).expect("Failed to set default settings");

        assert_eq!(settings.cgroup.root, "/sys/fs/cgroup");
        assert_eq!(settings.policy.mark, 0);
        assert_eq!(settings.policy.guard_scope, GuardScope::Always);
        assert_eq!(settings.policy.rejection, Rejection::PoisonLength);
        assert_eq!(GuardedOptions::from(&settings.policy.guard), GuardedOptions::all());
    }

    #[test]
    fn user_file_overrides_defaults() -> Result<()> {
        let _env = env_lock();
        let mut file = tempfile::Builder::new().suffix(".yml").tempfile()?;
        writeln!(
            file,
            "policy:\n  ifindex: 4\n  mark: 77\n  guard: mark\n  guard_scope: enforced\n  rejection: deny"
        )?;

        let settings = Settings::new(Some(file.path()))?;

        assert_eq!(settings.policy.ifindex, 4);
        assert_eq!(settings.policy.mark, 77);
        assert_eq!(GuardedOptions::from(&settings.policy.guard), GuardedOptions::MARK);
        assert_eq!(settings.policy.guard_scope, GuardScope::Enforced);
        assert_eq!(settings.policy.rejection, Rejection::Deny);
        // Untouched sections keep their defaults
        assert_eq!(settings.cgroup.root, "/sys/fs/cgroup");

        Ok(())
    }

    #[test]
    fn missing_user_file_is_an_error() {
        let path = Path::new("/nonexistent/sockbind.yml");
        assert!(Settings::new(Some(path)).is_err());
    }

    /// Sets environment variables for the duration of a test.
    struct EnvVars(&'static [(&'static str, &'static str)]);

    impl EnvVars {
        fn set(vars: &'static [(&'static str, &'static str)]) -> Self {
            for (key, value) in vars {
                std::env::set_var(key, value);
            }
            Self(vars)
        }
    }

    impl Drop for EnvVars {
        fn drop(&mut self) {
            for (key, _) in self.0 {
                std::env::remove_var(key);
            }
        }
    }

    #[test]
    fn environment_overrides_files() -> Result<()> {
        let _env = env_lock();
        let _vars = EnvVars::set(&[
            ("SOCKBIND_POLICY__MARK", "7"),
            ("SOCKBIND_POLICY__GUARD_SCOPE", "enforced"),
        ]);

        let settings = Settings::new(None)?;
        assert_eq!(settings.policy.mark, 7);
        assert_eq!(settings.policy.guard_scope, GuardScope::Enforced);

        let mut file = tempfile::Builder::new().suffix(".yml").tempfile()?;
        writeln!(file, "policy:\n  mark: 77\n  guard_scope: always")?;

        let settings = Settings::new(Some(file.path()))?;
        assert_eq!(settings.policy.mark, 7);
        assert_eq!(settings.policy.guard_scope, GuardScope::Enforced);

        Ok(())
    }
}
