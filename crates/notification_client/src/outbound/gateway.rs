/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use crate::{
    common::types::{NotificationId, RawNotification, Token},
    tools::{callapi::call_api, error::AppError},
};
use parking_lot::RwLock;
use reqwest::{Client, Method, Url};
use serde::Deserialize;
use tracing::error;

/// Durable notification surface of the console API. The store depends on this
/// trait, never on HTTP specifics, so tests can substitute a scripted
/// implementation.
#[tonic::async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn fetch_all(&self) -> Result<Vec<RawNotification>, AppError>;
    async fn fetch_unread(&self) -> Result<Vec<RawNotification>, AppError>;
    async fn unread_count(&self) -> Result<u64, AppError>;
    async fn mark_as_read(&self, notification_id: &NotificationId) -> Result<(), AppError>;
    async fn mark_all_as_read(&self) -> Result<(), AppError>;
}

#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize)]
struct UnreadCountResponse {
    count: u64,
}

pub struct RestNotificationGateway {
    client: Client,
    base_url: Url,
    auth_token: RwLock<Option<Token>>,
}

impl RestNotificationGateway {
    pub fn new(gateway_cfg: &GatewayConfig) -> Result<Self, AppError> {
        let base_url = Url::parse(gateway_cfg.base_url.as_str()).map_err(|err| {
            AppError::InvalidConfiguration(format!("failed to parse gateway base_url : {err}"))
        })?;
        Ok(RestNotificationGateway {
            client: Client::new(),
            base_url,
            auth_token: RwLock::new(None),
        })
    }

    /// Reapplied whenever the session's authentication state changes; `None`
    /// drops the credential.
    pub fn set_auth_token(&self, token: Option<Token>) {
        *self.auth_token.write() = token;
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, AppError> {
        let mut url = self.base_url.clone();
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                AppError::InvalidConfiguration("gateway base_url cannot be a base".to_string())
            })?;
            path.pop_if_empty();
            path.extend(["api", "notifications"]);
            path.extend(segments);
        }
        Ok(url)
    }

    fn bearer(&self) -> Result<String, AppError> {
        match self.auth_token.read().as_ref() {
            Some(Token(token)) => Ok(format!("Bearer {token}")),
            None => {
                error!("gateway call attempted without an auth token");
                Err(AppError::MissingAuthToken)
            }
        }
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, segments: &[&str]) -> Result<T, AppError> {
        let url = self.endpoint(segments)?;
        let bearer = self.bearer()?;
        Ok(call_api::<T, ()>(
            &self.client,
            Method::GET,
            &url,
            vec![
                ("content-type", "application/json"),
                ("authorization", bearer.as_str()),
            ],
            None,
        )
        .await?)
    }

    async fn patch(&self, segments: &[&str]) -> Result<(), AppError> {
        let url = self.endpoint(segments)?;
        let bearer = self.bearer()?;
        // Acknowledgment body shape is not part of the contract; decode
        // loosely and discard.
        let _: serde_json::Value = call_api::<serde_json::Value, ()>(
            &self.client,
            Method::PATCH,
            &url,
            vec![
                ("content-type", "application/json"),
                ("authorization", bearer.as_str()),
            ],
            None,
        )
        .await?;
        Ok(())
    }
}

#[tonic::async_trait]
impl NotificationGateway for RestNotificationGateway {
    async fn fetch_all(&self) -> Result<Vec<RawNotification>, AppError> {
        self.get(&[]).await
    }

    async fn fetch_unread(&self) -> Result<Vec<RawNotification>, AppError> {
        self.get(&["unread"]).await
    }

    async fn unread_count(&self) -> Result<u64, AppError> {
        let response: UnreadCountResponse = self.get(&["unread", "count"]).await?;
        Ok(response.count)
    }

    async fn mark_as_read(&self, notification_id: &NotificationId) -> Result<(), AppError> {
        let NotificationId(notification_id) = notification_id;
        self.patch(&[notification_id.as_str(), "read"]).await
    }

    async fn mark_all_as_read(&self) -> Result<(), AppError> {
        self.patch(&["read-all"]).await
    }
}
