/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use crate::common::types::NotificationKind;
use tracing::*;

/// Transient toast invocation the presentation layer consumes. Rejections get
/// a longer display window than routine notifications.
pub fn toast_duration_ms(kind: NotificationKind) -> u64 {
    match kind {
        NotificationKind::Approval => 5000,
        NotificationKind::Rejection => 6000,
        NotificationKind::Reminder => 5000,
        NotificationKind::Generic => 4000,
    }
}

pub trait ToastSink: Send + Sync {
    fn toast(&self, kind: NotificationKind, message: &str, duration_ms: u64);
}

/// Headless sink used by the relay daemon: toasts land in the structured log
/// instead of on screen.
pub struct TracingToast;

impl ToastSink for TracingToast {
    fn toast(&self, kind: NotificationKind, message: &str, duration_ms: u64) {
        match kind {
            NotificationKind::Rejection => {
                warn!(tag = "[TOAST]", kind = %kind, duration_ms, "{message}")
            }
            _ => info!(tag = "[TOAST]", kind = %kind, duration_ms, "{message}"),
        }
    }
}
