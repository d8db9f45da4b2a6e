/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use crate::{common::types::*, NotificationPayload};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Maps a raw server record to the client projection. Missing fields default:
/// unknown category becomes `Generic`, a missing read flag means unread, a
/// missing timestamp means "now", and a missing id is replaced with the value
/// produced by `fallback_id` (a session-scoped monotonic counter upstream).
pub fn map_raw_notification(
    raw: RawNotification,
    fallback_id: impl FnOnce() -> NotificationId,
) -> Notification {
    Notification {
        id: raw
            .id
            .filter(|id| !id.is_empty())
            .map(NotificationId)
            .unwrap_or_else(fallback_id),
        kind: raw
            .category
            .as_deref()
            .map(NotificationKind::from_category)
            .unwrap_or(NotificationKind::Generic),
        title: raw.title.unwrap_or_default(),
        body: raw.message.unwrap_or_default(),
        created_at: Timestamp(raw.created_at.unwrap_or_else(Utc::now)),
        read: raw.is_read.unwrap_or(false),
    }
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

impl From<NotificationPayload> for RawNotification {
    fn from(payload: NotificationPayload) -> Self {
        let non_empty = |value: String| if value.is_empty() { None } else { Some(value) };
        RawNotification {
            created_at: parse_timestamp(&payload.created_at),
            id: non_empty(payload.id),
            category: non_empty(payload.category),
            title: non_empty(payload.title),
            message: non_empty(payload.body),
            is_read: Some(payload.is_read),
        }
    }
}

/// Delay before the Nth reconnect attempt (1-based): `min(base * 2^(N-1), cap)`.
pub fn backoff_delay(base: Duration, cap: Duration, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    base.saturating_mul(2u32.saturating_pow(exponent)).min(cap)
}
