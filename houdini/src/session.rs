// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Logging setup for inference runs.

use crate::InferenceOptions;
use std::str::FromStr;
use tracing::warn;
use tracing_subscriber::{filter::Directive, layer::SubscriberExt, EnvFilter, Registry};
use tracing_tree::HierarchicalLayer;

/// Environment variable used to control log tracing.
pub const LOG_ENV_VAR: &str = "HOUDINI_LOG";

/// Install the global logger, filtered by `HOUDINI_LOG` and `log_level`.
///
/// Only the first call installs a subscriber; later calls leave it in place.
pub fn init_logger(options: &InferenceOptions) {
    let filter = EnvFilter::from_env(LOG_ENV_VAR);
    let mut rejected = None;
    let filter = match options.log_level.as_deref().map(Directive::from_str) {
        Some(Ok(directive)) => filter.add_directive(directive),
        Some(Err(err)) => {
            rejected = Some(err);
            filter
        }
        None => filter,
    };

    let installed = if options.json_logs { json_logs(filter) } else { hier_logs(filter) };
    if let (true, Some(err)) = (installed, rejected) {
        warn!(%err, "ignoring invalid log level");
    }
}

/// Configure global logger to use a json logger.
fn json_logs(filter: EnvFilter) -> bool {
    use tracing_subscriber::fmt::layer;
    let subscriber = Registry::default().with(filter).with(layer().json());
    tracing::subscriber::set_global_default(subscriber).is_ok()
}

/// Configure global logger to use a hierarchical view.
fn hier_logs(filter: EnvFilter) -> bool {
    let subscriber = Registry::default().with(filter);
    let subscriber = subscriber.with(
        HierarchicalLayer::default()
            .with_writer(std::io::stdout)
            .with_indent_lines(true)
            .with_ansi(false)
            .with_targets(true)
            .with_verbose_exit(true)
            .with_indent_amount(4),
    );
    tracing::subscriber::set_global_default(subscriber).is_ok()
}
