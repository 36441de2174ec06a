//! Tracing subscriber for the mock API server: console output gated by the
//! configured [`LogLevel`], plus an optional rolling file that receives only
//! the access-log target.

use mockapi_core::{AccessLogConfig, LogLevel, LogRotation};
use once_cell::sync::OnceCell;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::Targets;
use tracing_subscriber::{
    fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
    EnvFilter, Registry,
};

/// Target used by the HTTP access-log middleware.
pub const ACCESS_LOG_TARGET: &str = "http.access";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

static ACCESS_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

/// Filter for the console sink: `RUST_LOG` when set, otherwise `level`.
pub fn env_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_filter_directive()))
}

pub fn rotation(rotation: LogRotation) -> Rotation {
    match rotation {
        LogRotation::Minutely => Rotation::MINUTELY,
        LogRotation::Hourly => Rotation::HOURLY,
        LogRotation::Daily => Rotation::DAILY,
        LogRotation::Never => Rotation::NEVER,
    }
}

/// Install the global subscriber. Returns `false` when one was already
/// installed, in which case nothing changes.
pub fn init(level: LogLevel, access: &AccessLogConfig) -> bool {
    let (file_layer, file_error) = if ACCESS_GUARD.get().is_some() {
        (None, None)
    } else {
        match access_file_layer(access) {
            Ok(Some((layer, guard))) => {
                let _ = ACCESS_GUARD.set(guard);
                (Some(layer), None)
            }
            Ok(None) => (None, None),
            Err(err) => (None, Some(err)),
        }
    };

    let installed = tracing_subscriber::registry()
        .with(file_layer)
        .with(fmt::layer().with_filter(env_filter(level)))
        .try_init()
        .is_ok();
    if let Some(err) = file_error {
        tracing::warn!(error = %err, "access log file disabled");
    }
    installed
}

/// Rolling-file layer for access lines, when access logging is enabled and a
/// directory is configured.
fn access_file_layer(
    access: &AccessLogConfig,
) -> Result<Option<(BoxedLayer, WorkerGuard)>, String> {
    let Some(dir) = access.directory.as_deref().filter(|_| access.enabled) else {
        return Ok(None);
    };
    let appender = RollingFileAppender::builder()
        .rotation(rotation(access.rotation))
        .filename_prefix(access.file_prefix.as_str())
        .build(dir)
        .map_err(|err| format!("{}: {err}", dir.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let layer = fmt::layer()
        .with_ansi(false)
        .with_target(false)
        .with_writer(writer)
        .with_filter(Targets::new().with_target(ACCESS_LOG_TARGET, tracing::Level::INFO))
        .boxed();
    Ok(Some((layer, guard)))
}
