/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

#[derive(Deserialize, Serialize, Clone, Debug, Eq, PartialEq)]
pub struct Token(pub String);

#[derive(Deserialize, Serialize, Clone, Debug, Eq, Hash, PartialEq)]
pub struct SessionId(pub String);

#[derive(Deserialize, Serialize, Clone, Debug, Eq, Hash, PartialEq)]
pub struct NotificationId(pub String);

#[derive(Deserialize, Serialize, Clone, Copy, Debug, Eq, PartialEq, PartialOrd)]
pub struct Timestamp(pub DateTime<Utc>);

/// Closed taxonomy of notification categories rendered by the console.
/// Anything the server sends outside the payment vocabulary degrades to
/// `Generic` rather than being dropped.
#[derive(
    Debug, Clone, Copy, EnumString, EnumIter, Display, Serialize, Deserialize, Eq, Hash, PartialEq,
)]
pub enum NotificationKind {
    Approval,
    Rejection,
    Reminder,
    Generic,
}

impl NotificationKind {
    pub fn from_category(category: &str) -> Self {
        match category {
            "PAYMENT_APPROVED" => NotificationKind::Approval,
            "PAYMENT_REJECTED" => NotificationKind::Rejection,
            "PAYMENT_REMINDER" => NotificationKind::Reminder,
            _ => NotificationKind::Generic,
        }
    }
}

/// Raw notification record as the server ships it, either in a history fetch
/// response or inside a pushed event. Every field is optional so that a
/// malformed record degrades instead of failing deserialization.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RawNotification {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub category: Option<String>,
    pub title: Option<String>,
    pub message: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub is_read: Option<bool>,
}

/// Client-side projection of a notification. `read` is the only field the
/// store mutates after construction.
#[derive(Deserialize, Serialize, Clone, Debug, Eq, PartialEq)]
pub struct Notification {
    pub id: NotificationId,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub created_at: Timestamp,
    pub read: bool,
}
