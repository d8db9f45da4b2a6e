/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use crate::common::types::RawNotification;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use strum_macros::{Display, EnumString};

/// Internal event vocabulary the transport translates raw connection activity
/// into. Subscribers never see transport specifics, only these events.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    Connect,
    Disconnect { reason: String },
    NewNotification(RawNotification),
    UnreadCount(u64),
    ConnectError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
    Connect,
    Disconnect,
    NewNotification,
    UnreadCount,
    ConnectError,
}

impl TransportEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            TransportEvent::Connect => EventKind::Connect,
            TransportEvent::Disconnect { .. } => EventKind::Disconnect,
            TransportEvent::NewNotification(_) => EventKind::NewNotification,
            TransportEvent::UnreadCount(_) => EventKind::UnreadCount,
            TransportEvent::ConnectError { .. } => EventKind::ConnectError,
        }
    }
}

pub type EventHandler = Arc<dyn Fn(TransportEvent) + Send + Sync>;

/// Opaque handle returned by `on`, used to remove a single handler. Closures
/// have no identity, so removal is keyed by this id instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// Local subscription registry keyed by event kind. Multiple independent
/// subscribers per kind are dispatched in registration order.
#[derive(Default)]
pub struct EventBus {
    handlers: Mutex<FxHashMap<EventKind, Vec<(HandlerId, EventHandler)>>>,
    next_handler_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(
        &self,
        event: EventKind,
        handler: impl Fn(TransportEvent) + Send + Sync + 'static,
    ) -> HandlerId {
        let handler_id = HandlerId(self.next_handler_id.fetch_add(1, Ordering::Relaxed));
        self.handlers
            .lock()
            .entry(event)
            .or_default()
            .push((handler_id, Arc::new(handler)));
        handler_id
    }

    /// Removes one handler, or every handler for the event when `handler_id`
    /// is `None`.
    pub fn off(&self, event: EventKind, handler_id: Option<HandlerId>) {
        let mut handlers = self.handlers.lock();
        match handler_id {
            Some(handler_id) => {
                if let Some(registered) = handlers.get_mut(&event) {
                    registered.retain(|(id, _)| *id != handler_id);
                }
            }
            None => {
                handlers.remove(&event);
            }
        }
    }

    pub fn clear(&self) {
        self.handlers.lock().clear();
    }

    pub fn emit(&self, event: TransportEvent) {
        // Handlers are cloned out before invocation so a handler may call
        // on/off without deadlocking the registry.
        let registered: Vec<EventHandler> = self
            .handlers
            .lock()
            .get(&event.kind())
            .map(|handlers| handlers.iter().map(|(_, handler)| handler.clone()).collect())
            .unwrap_or_default();

        for handler in registered {
            handler(event.clone());
        }
    }
}
