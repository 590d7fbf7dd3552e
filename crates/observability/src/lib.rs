// crates/observability/src/lib.rs
//! Logging for the backup controller.
//!
//! One `tracing` subscriber per process: an `EnvFilter` behind a reload handle
//! (so a config reload can change `log.level` in place) and a compact or JSON
//! formatter chosen by `log.format`.

use anyhow::Context;
use backup_controller_core::config::{LogConfig, LogFormat};
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, reload, EnvFilter, Layer, Registry};

/// Handle returned by [`init_tracing`] for adjusting the filter later.
#[derive(Debug, Clone)]
pub struct LogHandle {
    filter: reload::Handle<EnvFilter, Registry>,
    /// `RUST_LOG` was set at startup; config changes do not override it.
    pinned_by_env: bool,
}

impl LogHandle {
    /// Swap in the filter described by `config`.
    ///
    /// Returns `false` when `RUST_LOG` pins the filter and nothing changed.
    pub fn apply(&self, config: &LogConfig) -> anyhow::Result<bool> {
        if self.pinned_by_env {
            tracing::debug!(level = %config.level, "RUST_LOG is set, keeping current log filter");
            return Ok(false);
        }
        let filter = build_filter(&config.level)?;
        self.filter
            .reload(filter)
            .context("failed to reload log filter")?;
        tracing::info!(level = %config.level, "log filter updated");
        Ok(true)
    }

    /// Directives of the filter in effect, `None` once the subscriber is gone.
    pub fn current_filter(&self) -> Option<String> {
        self.filter.with_current(|f| f.to_string()).ok()
    }
}

/// Wrap `filter` so it can be swapped later. Keep the layer alive for as
/// long as the handle is used.
pub fn reloadable(filter: EnvFilter, pinned_by_env: bool) -> (reload::Layer<EnvFilter, Registry>, LogHandle) {
    let (layer, handle) = reload::Layer::new(filter);
    (
        layer,
        LogHandle {
            filter: handle,
            pinned_by_env,
        },
    )
}

/// Parse a filter directive such as `info,backup_controller_server=debug`.
pub fn build_filter(level: &str) -> anyhow::Result<EnvFilter> {
    EnvFilter::try_new(level).with_context(|| format!("invalid log level {level:?}"))
}

/// Install the global subscriber. `RUST_LOG`, when set, wins over `log.level`.
pub fn init_tracing(config: &LogConfig) -> anyhow::Result<LogHandle> {
    let (filter, pinned_by_env) = match EnvFilter::try_from_default_env() {
        Ok(filter) => (filter, true),
        Err(_) => (build_filter(&config.level)?, false),
    };
    let (filter_layer, handle) = reloadable(filter, pinned_by_env);

    let fmt_layer = match config.format {
        LogFormat::Text => fmt::layer().compact().with_target(true).boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(false)
            .flatten_event(true)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .try_init()
        .context("a global tracing subscriber is already installed")?;

    Ok(handle)
}

/// Request tracing for the HTTP router: one span per request, response
/// status and latency at INFO.
pub fn http_trace_layer() -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>> {
    TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_filter() {
        assert!(build_filter("info").is_ok());
        assert!(build_filter("warn,backup_controller_server=debug").is_ok());
        assert!(build_filter("info,foo=[").is_err());
    }

    #[test]
    fn test_apply_reloads_level() {
        let (layer, filter) = reload::Layer::new(build_filter("warn").unwrap());
        let subscriber = tracing_subscriber::registry().with(layer);
        let handle = LogHandle {
            filter,
            pinned_by_env: false,
        };

        tracing::subscriber::with_default(subscriber, || {
            assert!(!tracing::enabled!(Level::INFO));
            let changed = handle
                .apply(&LogConfig {
                    level: "debug".into(),
                    ..LogConfig::default()
                })
                .unwrap();
            assert!(changed);
            assert!(tracing::enabled!(Level::DEBUG));
        });
    }

    #[test]
    fn test_apply_is_noop_when_pinned() {
        let (_layer, handle) = reloadable(build_filter("warn").unwrap(), true);
        assert!(!handle.apply(&LogConfig::default()).unwrap());
        assert!(handle.current_filter().unwrap().contains("warn"));
    }
}
