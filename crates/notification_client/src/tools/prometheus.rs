/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
#![allow(clippy::expect_used)]

use actix_web_prom::{PrometheusMetrics, PrometheusMetricsBuilder};
use prometheus::{
    opts, register_histogram_vec, register_int_counter, register_int_counter_vec,
    register_int_gauge, HistogramVec, IntCounter, IntCounterVec, IntGauge,
};

pub static RECEIVED_NOTIFICATIONS: once_cell::sync::Lazy<IntCounter> =
    once_cell::sync::Lazy::new(|| {
        register_int_counter!("received_notifications", "Received Notifications")
            .expect("Failed to register received notifications metrics")
    });

pub static TOASTED_NOTIFICATIONS: once_cell::sync::Lazy<IntCounterVec> =
    once_cell::sync::Lazy::new(|| {
        register_int_counter_vec!(
            opts!("toasted_notifications", "Toasted Notifications"),
            &["kind"]
        )
        .expect("Failed to register toasted notifications metrics")
    });

pub static UNREAD_NOTIFICATIONS: once_cell::sync::Lazy<IntGauge> =
    once_cell::sync::Lazy::new(|| {
        register_int_gauge!("unread_notifications", "Unread Notifications")
            .expect("Failed to register unread notifications metrics")
    });

pub static RECONNECT_ATTEMPTS: once_cell::sync::Lazy<IntCounter> =
    once_cell::sync::Lazy::new(|| {
        register_int_counter!("reconnect_attempts", "Reconnect Attempts")
            .expect("Failed to register reconnect attempts metrics")
    });

pub static CONNECT_FAILURES: once_cell::sync::Lazy<IntCounter> = once_cell::sync::Lazy::new(|| {
    register_int_counter!("connect_failures", "Connect Failures")
        .expect("Failed to register connect failures metrics")
});

pub static CALL_EXTERNAL_API: once_cell::sync::Lazy<HistogramVec> =
    once_cell::sync::Lazy::new(|| {
        register_histogram_vec!(
            opts!("external_request_duration", "Call external API requests").into(),
            &["method", "host", "service", "status"]
        )
        .expect("Failed to register call external API metrics")
    });

#[macro_export]
macro_rules! call_external_api {
    ($method:expr, $host:expr, $path:expr, $status:expr, $start:expr) => {
        let duration = $start.elapsed().as_secs_f64();
        CALL_EXTERNAL_API
            .with_label_values(&[$method, $host, $path, $status])
            .observe(duration);
    };
}

/// Initializes the `PrometheusMetrics` instance wrapped around the actix app,
/// exposing `/metrics` for scraping with every subsystem collector attached.
pub fn prometheus_metrics() -> PrometheusMetrics {
    let prometheus = PrometheusMetricsBuilder::new("api")
        .endpoint("/metrics")
        .buckets(&[
            0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
        ])
        .build()
        .expect("Failed to create Prometheus Metrics");

    prometheus
        .registry
        .register(Box::new(RECEIVED_NOTIFICATIONS.to_owned()))
        .expect("Failed to register received notifications metrics");

    prometheus
        .registry
        .register(Box::new(TOASTED_NOTIFICATIONS.to_owned()))
        .expect("Failed to register toasted notifications metrics");

    prometheus
        .registry
        .register(Box::new(UNREAD_NOTIFICATIONS.to_owned()))
        .expect("Failed to register unread notifications metrics");

    prometheus
        .registry
        .register(Box::new(RECONNECT_ATTEMPTS.to_owned()))
        .expect("Failed to register reconnect attempts metrics");

    prometheus
        .registry
        .register(Box::new(CONNECT_FAILURES.to_owned()))
        .expect("Failed to register connect failures metrics");

    prometheus
        .registry
        .register(Box::new(CALL_EXTERNAL_API.to_owned()))
        .expect("Failed to register call external API metrics");

    prometheus
}
