/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use chrono::Utc;
use notification_client::{
    common::types::{NotificationId, NotificationKind, RawNotification},
    outbound::gateway::NotificationGateway,
    store::notifications::NotificationStore,
    toast::ToastSink,
    tools::error::AppError,
};
use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

/// Scriptable gateway double. `fail_mutations` makes every durable mutation
/// fail so rollback paths can be exercised.
#[derive(Default)]
pub struct StubGateway {
    pub history: Mutex<Vec<RawNotification>>,
    pub fail_mutations: AtomicBool,
    pub fetch_all_calls: AtomicU64,
    pub mark_as_read_calls: AtomicU64,
    pub mark_all_as_read_calls: AtomicU64,
}

impl StubGateway {
    pub fn with_history(history: Vec<RawNotification>) -> Self {
        let gateway = StubGateway::default();
        *gateway.history.lock().unwrap() = history;
        gateway
    }

    pub fn failing() -> Self {
        let gateway = StubGateway::default();
        gateway.fail_mutations.store(true, Ordering::SeqCst);
        gateway
    }
}

#[tonic::async_trait]
impl NotificationGateway for StubGateway {
    async fn fetch_all(&self) -> Result<Vec<RawNotification>, AppError> {
        self.fetch_all_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.history.lock().unwrap().clone())
    }

    async fn fetch_unread(&self) -> Result<Vec<RawNotification>, AppError> {
        Ok(self
            .history
            .lock()
            .unwrap()
            .iter()
            .filter(|raw| !raw.is_read.unwrap_or(false))
            .cloned()
            .collect())
    }

    async fn unread_count(&self) -> Result<u64, AppError> {
        Ok(self
            .history
            .lock()
            .unwrap()
            .iter()
            .filter(|raw| !raw.is_read.unwrap_or(false))
            .count() as u64)
    }

    async fn mark_as_read(&self, _notification_id: &NotificationId) -> Result<(), AppError> {
        self.mark_as_read_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_mutations.load(Ordering::SeqCst) {
            Err(AppError::InternalError(
                "injected gateway failure".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    async fn mark_all_as_read(&self) -> Result<(), AppError> {
        self.mark_all_as_read_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_mutations.load(Ordering::SeqCst) {
            Err(AppError::InternalError(
                "injected gateway failure".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

#[derive(Default)]
pub struct RecordingToast {
    pub toasts: Mutex<Vec<(NotificationKind, String, u64)>>,
}

impl ToastSink for RecordingToast {
    fn toast(&self, kind: NotificationKind, message: &str, duration_ms: u64) {
        self.toasts
            .lock()
            .unwrap()
            .push((kind, message.to_string(), duration_ms));
    }
}

pub fn store_with(
    gateway: Arc<StubGateway>,
    toast: Arc<RecordingToast>,
) -> Arc<NotificationStore> {
    Arc::new(NotificationStore::new(gateway, toast))
}

pub fn raw_notification(id: &str, category: &str, message: &str) -> RawNotification {
    RawNotification {
        id: Some(id.to_string()),
        category: Some(category.to_string()),
        title: Some("Payment".to_string()),
        message: Some(message.to_string()),
        created_at: Some(Utc::now()),
        is_read: Some(false),
    }
}

/// The core invariant: the unread count always equals the number of unread
/// entries in the list.
pub fn assert_count_invariant(store: &NotificationStore) {
    let unread = store
        .notifications()
        .iter()
        .filter(|notification| !notification.read)
        .count() as u64;
    assert_eq!(store.unread_count(), unread, "unread count drifted from list");
}

/// Polls `condition` for up to two seconds.
pub async fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
