/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use crate::{
    outbound::gateway::{GatewayConfig, RestNotificationGateway},
    store::notifications::NotificationStore,
    toast::TracingToast,
    tools::{error::AppError, logger::LoggerConfig},
    transport::client::{TransportClient, TransportConfig},
};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub http_server_port: u16,
    pub transport_cfg: TransportConfig,
    pub gateway_cfg: GatewayConfig,
    pub logger_cfg: LoggerConfig,
}

pub struct AppState {
    pub transport: TransportClient,
    pub store: Arc<NotificationStore>,
    pub gateway: Arc<RestNotificationGateway>,
    pub http_server_port: u16,
}

impl AppState {
    pub fn new(app_config: AppConfig) -> Result<AppState, AppError> {
        let gateway = Arc::new(RestNotificationGateway::new(&app_config.gateway_cfg)?);
        let store = Arc::new(NotificationStore::new(
            gateway.clone(),
            Arc::new(TracingToast),
        ));
        let transport = TransportClient::new(app_config.transport_cfg);

        Ok(AppState {
            transport,
            store,
            gateway,
            http_server_port: app_config.http_server_port,
        })
    }
}
