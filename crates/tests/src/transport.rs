/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use crate::support::*;
use notification_client::{
    common::types::{NotificationId, RawNotification, Token},
    notification_server::{Notification, NotificationServer},
    server_event::Event,
    transport::{
        client::{ConnectionState, TransportClient, TransportConfig},
        events::{EventKind, TransportEvent},
    },
    Connected, NotificationPayload, ServerEvent, SubscribeRequest, UnreadCount,
};
use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::{net::TcpListener, sync::mpsc, time::timeout};
use tokio_stream::wrappers::{ReceiverStream, TcpListenerStream};
use tonic::{transport::Server, Request, Response, Status};

type ClientTx = mpsc::Sender<Result<ServerEvent, Status>>;

/// In-process push endpoint. Every accepted subscription hands its sender to
/// the test through `connections_tx` so events can be scripted.
struct PushService {
    connections_tx: mpsc::UnboundedSender<ClientTx>,
}

#[tonic::async_trait]
impl Notification for PushService {
    type SubscribeStream = ReceiverStream<Result<ServerEvent, Status>>;

    async fn subscribe(
        &self,
        request: Request<SubscribeRequest>,
    ) -> Result<Response<Self::SubscribeStream>, Status> {
        let token = request
            .metadata()
            .get("token")
            .and_then(|token| token.to_str().ok())
            .ok_or_else(|| Status::unauthenticated("token (token - Header) not found"))?
            .to_string();

        let SubscribeRequest { channel } = request.into_inner();
        if channel != "notifications" {
            return Err(Status::invalid_argument("unknown channel"));
        }

        let (client_tx, client_rx) = mpsc::channel(64);
        let _ = client_tx
            .send(Ok(ServerEvent {
                event: Some(Event::Connected(Connected {
                    session_id: format!("session-{token}"),
                })),
            }))
            .await;
        self.connections_tx
            .send(client_tx)
            .map_err(|_| Status::internal("test harness dropped"))?;

        Ok(Response::new(ReceiverStream::new(client_rx)))
    }
}

async fn spawn_push_server() -> (SocketAddr, mpsc::UnboundedReceiver<ClientTx>) {
    let (connections_tx, connections_rx) = mpsc::unbounded_channel();
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind loopback");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(
        Server::builder()
            .add_service(NotificationServer::new(PushService { connections_tx }))
            .serve_with_incoming(TcpListenerStream::new(listener)),
    );
    (addr, connections_rx)
}

fn transport_config(addr: SocketAddr, reconnect_delay_ms: u64) -> TransportConfig {
    TransportConfig {
        endpoint: format!("http://{addr}"),
        channel: "notifications".to_string(),
        reconnect_delay_ms,
        max_reconnect_delay_ms: 1000,
        max_reconnect_attempts: 3,
    }
}

fn notification_event(id: &str, category: &str) -> ServerEvent {
    ServerEvent {
        event: Some(Event::Notification(NotificationPayload {
            id: id.to_string(),
            category: category.to_string(),
            title: "Payment".to_string(),
            body: "Approved".to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            is_read: false,
        })),
    }
}

#[tokio::test]
async fn connect_delivers_pushed_events_in_order() {
    let (addr, mut connections_rx) = spawn_push_server().await;
    let client = TransportClient::new(transport_config(addr, 50));

    let received: Arc<Mutex<Vec<RawNotification>>> = Arc::new(Mutex::new(Vec::new()));
    let received_sink = received.clone();
    client.on(EventKind::NewNotification, move |event| {
        if let TransportEvent::NewNotification(raw) = event {
            received_sink.lock().unwrap().push(raw);
        }
    });
    let counts: Arc<Mutex<Vec<u64>>> = Arc::new(Mutex::new(Vec::new()));
    let counts_sink = counts.clone();
    client.on(EventKind::UnreadCount, move |event| {
        if let TransportEvent::UnreadCount(count) = event {
            counts_sink.lock().unwrap().push(count);
        }
    });

    client.connect(Token(uuid::Uuid::new_v4().to_string()));
    let connection = timeout(Duration::from_secs(2), connections_rx.recv())
        .await
        .expect("subscription within deadline")
        .expect("server running");
    assert!(wait_for(|| client.is_connected()).await);

    connection
        .send(Ok(notification_event("n1", "PAYMENT_APPROVED")))
        .await
        .expect("push first event");
    connection
        .send(Ok(notification_event("n2", "PAYMENT_REJECTED")))
        .await
        .expect("push second event");
    connection
        .send(Ok(ServerEvent {
            event: Some(Event::UnreadCount(UnreadCount { count: 2 })),
        }))
        .await
        .expect("push count event");

    assert!(wait_for(|| counts.lock().unwrap().len() == 1).await);
    let received = received.lock().unwrap();
    assert_eq!(received.len(), 2);
    assert_eq!(received[0].id.as_deref(), Some("n1"));
    assert_eq!(received[0].category.as_deref(), Some("PAYMENT_APPROVED"));
    assert_eq!(received[1].id.as_deref(), Some("n2"));
    assert_eq!(counts.lock().unwrap()[0], 2);
}

#[tokio::test]
async fn connect_is_idempotent_while_active() {
    let (addr, mut connections_rx) = spawn_push_server().await;
    let client = TransportClient::new(transport_config(addr, 50));

    client.connect(Token("tenant-1".to_string()));
    client.connect(Token("tenant-1".to_string()));
    assert!(wait_for(|| client.is_connected()).await);
    client.connect(Token("tenant-1".to_string()));

    let _first = timeout(Duration::from_secs(2), connections_rx.recv())
        .await
        .expect("first subscription")
        .expect("server running");
    let second = timeout(Duration::from_millis(300), connections_rx.recv()).await;
    assert!(second.is_err(), "repeated connect must not open a second stream");
}

#[tokio::test]
async fn unexpected_close_schedules_a_reconnect() {
    let (addr, mut connections_rx) = spawn_push_server().await;
    let client = TransportClient::new(transport_config(addr, 200));

    let disconnects = Arc::new(Mutex::new(0u32));
    let disconnects_sink = disconnects.clone();
    client.on(EventKind::Disconnect, move |_| {
        *disconnects_sink.lock().unwrap() += 1;
    });

    client.connect(Token("tenant-1".to_string()));
    let first = timeout(Duration::from_secs(2), connections_rx.recv())
        .await
        .expect("first subscription")
        .expect("server running");
    assert!(wait_for(|| client.is_connected()).await);

    // Server-side close: the stream ends and the client enters the backoff
    // window, where the attempt counter is observable.
    drop(first);
    assert!(wait_for(|| client.reconnect_attempts() == 1).await);
    assert!(!client.is_connected());

    let _second = timeout(Duration::from_secs(2), connections_rx.recv())
        .await
        .expect("reconnect within deadline")
        .expect("server running");
    assert!(wait_for(|| client.is_connected()).await);
    assert_eq!(client.reconnect_attempts(), 0, "success resets the counter");
    assert!(*disconnects.lock().unwrap() >= 1);
}

#[tokio::test]
async fn manual_disconnect_suppresses_reconnect() {
    let (addr, mut connections_rx) = spawn_push_server().await;
    let client = TransportClient::new(transport_config(addr, 50));

    client.connect(Token("tenant-1".to_string()));
    let connection = timeout(Duration::from_secs(2), connections_rx.recv())
        .await
        .expect("subscription")
        .expect("server running");
    assert!(wait_for(|| client.is_connected()).await);

    client.disconnect();
    assert_eq!(client.state(), ConnectionState::Idle);
    assert!(!client.is_connected());

    drop(connection);
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(
        connections_rx.try_recv().is_err(),
        "no reconnect after a manual disconnect"
    );
    assert_eq!(client.state(), ConnectionState::Idle);
}

#[tokio::test]
async fn exhausted_retry_budget_fires_connect_error_once() {
    // Bind and immediately drop so the port refuses connections.
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind loopback");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);

    let client = TransportClient::new(transport_config(addr, 10));
    let connect_errors = Arc::new(Mutex::new(0u32));
    let connect_errors_sink = connect_errors.clone();
    client.on(EventKind::ConnectError, move |_| {
        *connect_errors_sink.lock().unwrap() += 1;
    });

    client.connect(Token("tenant-1".to_string()));

    assert!(wait_for(|| client.state() == ConnectionState::Failed).await);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(*connect_errors.lock().unwrap(), 1);
    assert_eq!(client.reconnect_attempts(), 3);
}

#[tokio::test]
async fn store_follows_the_transport_end_to_end() {
    let (addr, mut connections_rx) = spawn_push_server().await;
    let client = TransportClient::new(transport_config(addr, 50));

    let gateway = Arc::new(StubGateway::with_history(vec![raw_notification(
        "h1",
        "PAYMENT_REMINDER",
        "Rent due",
    )]));
    let toast = Arc::new(RecordingToast::default());
    let store = store_with(gateway, toast.clone());
    store.subscribe(&client);

    client.connect(Token("tenant-1".to_string()));
    let connection = timeout(Duration::from_secs(2), connections_rx.recv())
        .await
        .expect("subscription")
        .expect("server running");

    // The connect handler replaces the list with the fetched history.
    assert!(wait_for(|| store.notifications().len() == 1).await);
    assert_eq!(store.unread_count(), 1);

    connection
        .send(Ok(notification_event("n2", "PAYMENT_APPROVED")))
        .await
        .expect("push event");

    assert!(wait_for(|| store.notifications().len() == 2).await);
    let notifications = store.notifications();
    assert_eq!(notifications[0].id, NotificationId("n2".to_string()));
    assert_eq!(store.unread_count(), 2);
    assert_count_invariant(&store);

    // Only pushed events toast; the history fetch stays silent.
    let toasts = toast.toasts.lock().unwrap();
    assert_eq!(toasts.len(), 1);
    assert_eq!(toasts[0].2, 5000);
}
