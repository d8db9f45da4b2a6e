/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use crate::{
    common::{
        types::{Notification, NotificationId, RawNotification},
        utils::map_raw_notification,
    },
    outbound::gateway::NotificationGateway,
    store::optimistic::optimistic_mutation,
    toast::{toast_duration_ms, ToastSink},
    tools::{
        error::AppError,
        prometheus::{TOASTED_NOTIFICATIONS, UNREAD_NOTIFICATIONS},
    },
    transport::{
        client::TransportClient,
        events::{EventKind, TransportEvent},
    },
};
use parking_lot::Mutex;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tracing::*;

#[derive(Debug, Default)]
struct StoreInner {
    // Reverse chronological: newest first, mutations never reorder.
    notifications: Vec<Notification>,
    unread_count: u64,
}

impl StoreInner {
    fn publish_unread(&self) {
        UNREAD_NOTIFICATIONS.set(self.unread_count as i64);
    }
}

struct MarkReadSnapshot {
    notification_id: NotificationId,
}

struct MarkAllSnapshot {
    notifications: Vec<Notification>,
    unread_count: u64,
}

/// Single source of truth for the session's notification list and unread
/// count. Reacts to transport events and to direct user actions; durable
/// read-state changes go through the gateway with optimistic local updates.
pub struct NotificationStore {
    inner: Mutex<StoreInner>,
    gateway: Arc<dyn NotificationGateway>,
    toast: Arc<dyn ToastSink>,
    local_id_seq: AtomicU64,
}

impl NotificationStore {
    pub fn new(gateway: Arc<dyn NotificationGateway>, toast: Arc<dyn ToastSink>) -> Self {
        NotificationStore {
            inner: Mutex::new(StoreInner::default()),
            gateway,
            toast,
            local_id_seq: AtomicU64::new(0),
        }
    }

    /// Registers this store on the transport's event vocabulary. The history
    /// refresh runs as its own task since it suspends on the gateway.
    pub fn subscribe(self: &Arc<Self>, transport: &TransportClient) {
        let store = Arc::clone(self);
        transport.on(EventKind::Connect, move |_| {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                if let Err(err) = store.refresh().await {
                    error!("failed to refresh notification history : {err}");
                }
            });
        });

        let store = Arc::clone(self);
        transport.on(EventKind::NewNotification, move |event| {
            if let TransportEvent::NewNotification(raw) = event {
                store.on_new_notification(raw);
            }
        });

        let store = Arc::clone(self);
        transport.on(EventKind::UnreadCount, move |event| {
            if let TransportEvent::UnreadCount(count) = event {
                store.on_unread_count(count);
            }
        });
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.inner.lock().notifications.clone()
    }

    pub fn unread_count(&self) -> u64 {
        self.inner.lock().unread_count
    }

    /// Replaces the whole list with the gateway's history and recomputes the
    /// count from the fetched set. A full replace, never a merge.
    pub async fn refresh(&self) -> Result<(), AppError> {
        let history = self.gateway.fetch_all().await?;
        let notifications: Vec<Notification> = history
            .into_iter()
            .map(|raw| map_raw_notification(raw, || self.next_local_id()))
            .collect();
        let unread_count = notifications.iter().filter(|n| !n.read).count() as u64;

        let mut inner = self.inner.lock();
        inner.notifications = notifications;
        inner.unread_count = unread_count;
        inner.publish_unread();
        info!(
            total = inner.notifications.len(),
            unread = inner.unread_count,
            "notification history refreshed"
        );
        Ok(())
    }

    /// Prepends a pushed notification and surfaces it as a toast. Never
    /// fails; malformed fields have already degraded to defaults.
    pub fn on_new_notification(&self, raw: RawNotification) {
        let notification = map_raw_notification(raw, || self.next_local_id());
        {
            let mut inner = self.inner.lock();
            if !notification.read {
                inner.unread_count += 1;
            }
            inner.notifications.insert(0, notification.clone());
            inner.publish_unread();
        }

        TOASTED_NOTIFICATIONS
            .with_label_values(&[notification.kind.to_string().as_str()])
            .inc();
        self.toast.toast(
            notification.kind,
            notification.body.as_str(),
            toast_duration_ms(notification.kind),
        );
    }

    /// Server-supplied drift correction.
    pub fn on_unread_count(&self, count: u64) {
        let mut inner = self.inner.lock();
        inner.unread_count = count;
        inner.publish_unread();
    }

    /// Optimistically marks one notification read, then persists. Absent or
    /// already-read entries are a no-op without a gateway call. On gateway
    /// failure the prior flag and count are restored, unless a newer mutation
    /// already moved the entry on.
    pub async fn mark_as_read(&self, notification_id: &NotificationId) -> Result<(), AppError> {
        optimistic_mutation(
            &self.inner,
            |inner| {
                let entry = inner
                    .notifications
                    .iter_mut()
                    .find(|n| &n.id == notification_id)?;
                if entry.read {
                    return None;
                }
                entry.read = true;
                inner.unread_count = inner.unread_count.saturating_sub(1);
                inner.publish_unread();
                Some(MarkReadSnapshot {
                    notification_id: notification_id.clone(),
                })
            },
            || self.gateway.mark_as_read(notification_id),
            |inner, snapshot| {
                // Restore the known-good value only while our optimistic
                // write is still in place; a cleared entry stays cleared.
                if let Some(entry) = inner
                    .notifications
                    .iter_mut()
                    .find(|n| n.id == snapshot.notification_id)
                {
                    if entry.read {
                        entry.read = false;
                        inner.unread_count += 1;
                    }
                }
                inner.publish_unread();
            },
        )
        .await
        .map(|_| ())
    }

    /// Optimistically marks everything read, then persists. On gateway
    /// failure the snapshotted list and count are restored in full.
    pub async fn mark_all_as_read(&self) -> Result<(), AppError> {
        optimistic_mutation(
            &self.inner,
            |inner| {
                let snapshot = MarkAllSnapshot {
                    notifications: inner.notifications.clone(),
                    unread_count: inner.unread_count,
                };
                for notification in inner.notifications.iter_mut() {
                    notification.read = true;
                }
                inner.unread_count = 0;
                inner.publish_unread();
                Some(snapshot)
            },
            || self.gateway.mark_all_as_read(),
            |inner, snapshot| {
                inner.notifications = snapshot.notifications;
                inner.unread_count = snapshot.unread_count;
                inner.publish_unread();
            },
        )
        .await
        .map(|_| ())
    }

    /// Local-only removal; no durable delete is issued.
    pub fn clear_notification(&self, notification_id: &NotificationId) {
        let mut inner = self.inner.lock();
        if let Some(position) = inner
            .notifications
            .iter()
            .position(|n| &n.id == notification_id)
        {
            let removed = inner.notifications.remove(position);
            if !removed.read {
                inner.unread_count = inner.unread_count.saturating_sub(1);
            }
            inner.publish_unread();
        }
    }

    /// Local-only removal of everything.
    pub fn clear_all_notifications(&self) {
        let mut inner = self.inner.lock();
        inner.notifications.clear();
        inner.unread_count = 0;
        inner.publish_unread();
    }

    // Session-scoped fallback for records the server pushed without an id.
    fn next_local_id(&self) -> NotificationId {
        let sequence = self.local_id_seq.fetch_add(1, Ordering::Relaxed) + 1;
        NotificationId(format!("local-{sequence}"))
    }
}
