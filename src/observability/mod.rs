// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observability module for structured logging and tracing.
//!
//! Message types follow a struct-based pattern with `Display` and
//! [`messages::StructuredLog`] implementations so log text lives in one place
//! and every event carries typed fields.
//!
//! # Architecture
//!
//! Messages are organized by subsystem:
//! * `messages::engine` - run lifecycle, stage hooks, extraction
//! * `messages::graph` - graph assembly and override binding
//! * `messages::registry` - stage registration and plugin loading
//!
//! [`init_tracing`] installs the process-wide subscriber used by the binary.

pub mod messages;

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Install a `tracing-subscriber` fmt subscriber.
///
/// `RUST_LOG` wins over `level` when set. With a `log_file` the output is
/// appended to that file without ANSI colors, otherwise it goes to stderr.
/// Installing twice is not an error; the first subscriber stays active.
pub fn init_tracing(
    level: &str,
    log_file: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init();
        }
        None => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .try_init();
        }
    }
    Ok(())
}
