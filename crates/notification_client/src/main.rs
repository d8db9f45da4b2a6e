/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use actix_web::{web, App, HttpResponse, HttpServer};
use anyhow::{Context, Result};
use notification_client::{
    common::types::Token,
    environment::{AppConfig, AppState},
    tools::{logger::setup_tracing, prometheus::prometheus_metrics},
};
use std::{env::var, net::Ipv4Addr};
use tokio::{
    signal::unix::{signal, SignalKind},
    sync::oneshot,
};
use tracing::*;

#[tokio::main]
async fn main() -> Result<()> {
    let dhall_config_path = var("DHALL_CONFIG")
        .unwrap_or_else(|_| "./dhall-configs/dev/notification_client.dhall".to_string());
    let app_config = serde_dhall::from_file(dhall_config_path).parse::<AppConfig>()?;

    let _guard = setup_tracing(app_config.logger_cfg.clone());

    std::panic::set_hook(Box::new(|panic_info| {
        error!("Panic Occured : {:?}", panic_info);
    }));

    let token = Token(var("AUTH_TOKEN").context("AUTH_TOKEN is not set")?);

    let app_state = AppState::new(app_config)?;
    app_state.gateway.set_auth_token(Some(token.clone()));
    app_state.store.subscribe(&app_state.transport);
    app_state.transport.connect(token);

    let (signal_tx, signal_rx) = oneshot::channel();
    tokio::spawn(async move {
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(err) => {
                error!("failed to install SIGTERM handler : {err}");
                return;
            }
        };
        let mut sigint = match signal(SignalKind::interrupt()) {
            Ok(sigint) => sigint,
            Err(err) => {
                error!("failed to install SIGINT handler : {err}");
                return;
            }
        };
        tokio::select! {
            _ = sigterm.recv() => {
                error!("SIGTERM received: shutting down");
            },
            _ = sigint.recv() => {
                error!("SIGINT received: shutting down");
            }
        }
        let _ = signal_tx.send(());
    });

    let prometheus = prometheus_metrics();
    let http_server = HttpServer::new(move || {
        App::new().wrap(prometheus.clone()).route(
            "/health",
            web::get()
                .to(|| Box::pin(async { HttpResponse::Ok().body("Notification Client Is Up!") })),
        )
    })
    .bind((Ipv4Addr::UNSPECIFIED, app_state.http_server_port))?
    .shutdown_timeout(60)
    .run();

    tokio::select! {
        res = http_server => {
            error!("[HTTP_SERVER_ENDED] : {:?}", res);
            res?;
        }
        _ = signal_rx => {
            error!("[Graceful Shutting Down] => Disconnecting transport");
            app_state.transport.disconnect();
        }
    }

    Ok(())
}
