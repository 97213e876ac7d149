// SPDX-License-Identifier: GPL-2.0-or-later
//
// sockbind - Pin cgroup sockets to a network device with eBPF
// Copyright (C) 2026  The sockbind authors
//
// Oct. 19, 2026  The sockbind authors  Created this.

use anyhow::{Context as _, Result};
use log::LevelFilter;
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;

const STDERR_PATTERN: &str = "[{d(%Y-%m-%d %H:%M:%S)}] {h([{l}])}: {m}\n";
const FILE_PATTERN: &str = "[{d(%Y-%m-%d %H:%M:%S)}] [{l}] {P}: {m}\n";

/// Map a `-v` count onto a level filter. Anything below zero silences logging.
pub fn verbosity_to_level(verbose: i8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        3..=i8::MAX => LevelFilter::Trace,
        _ => LevelFilter::Off,
    }
}

/// Configure logging to stderr and, if `log_file` is given, to a file.
pub fn configure(log_level: LevelFilter, log_file: Option<&str>) -> Result<()> {
    let stderr = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(STDERR_PATTERN)))
        .target(Target::Stderr)
        .build();
    let mut config_builder =
        Config::builder().appender(Appender::builder().build("stderr", Box::new(stderr)));
    let mut root_builder = Root::builder().appender("stderr");

    if let Some(log_file) = log_file {
        let file = FileAppender::builder()
            .encoder(Box::new(PatternEncoder::new(FILE_PATTERN)))
            .build(log_file)
            .with_context(|| format!("Failed to configure logging to {}", log_file))?;
        config_builder = config_builder.appender(Appender::builder().build("file", Box::new(file)));
        root_builder = root_builder.appender("file");
    }

    let config = config_builder
        .build(root_builder.build(log_level))
        .context("Failed to create logging configuration object")?;

    log4rs::init_config(config).context("Failed to configure logging")?;

    Ok(())
}
