/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use serde::Deserialize;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_subscriber::{layer::SubscriberExt, EnvFilter};

#[derive(Debug, Deserialize, Clone, Copy)]
#[allow(clippy::upper_case_acronyms)]
pub enum LogLevel {
    TRACE,
    DEBUG,
    INFO,
    WARN,
    ERROR,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggerConfig {
    pub level: LogLevel,
    pub log_to_file: bool,
}

/// Installs the global tracing subscriber. Returns the appender guard when
/// file logging is enabled; the caller must hold it for the process lifetime.
pub fn setup_tracing(logger_cfg: LoggerConfig) -> Option<WorkerGuard> {
    let level = match logger_cfg.level {
        LogLevel::TRACE => "trace",
        LogLevel::DEBUG => "debug",
        LogLevel::INFO => "info",
        LogLevel::WARN => "warn",
        LogLevel::ERROR => "error",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Bridge `log` events from dependencies into tracing. Fails only when a
    // logger is already installed, which is fine in tests.
    let _ = tracing_log::LogTracer::init();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(JsonStorageLayer);

    if logger_cfg.log_to_file {
        let file_appender = tracing_appender::rolling::daily("logs", "notification-client.log");
        let (writer, guard) = tracing_appender::non_blocking(file_appender);
        let subscriber =
            registry.with(BunyanFormattingLayer::new("notification_client".into(), writer));
        let _ = tracing::subscriber::set_global_default(subscriber);
        Some(guard)
    } else {
        let subscriber = registry.with(BunyanFormattingLayer::new(
            "notification_client".into(),
            std::io::stdout,
        ));
        let _ = tracing::subscriber::set_global_default(subscriber);
        None
    }
}
