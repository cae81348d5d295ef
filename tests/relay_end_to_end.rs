//! End-to-end tests: a real server on an ephemeral port, WebSocket clients
//! on `/rc`, events fed straight into the ingestor.

#![allow(clippy::panic, missing_docs)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use rcstream_relay::api;
use rcstream_relay::app_state::Relay;
use rcstream_relay::domain::{ChangeEvent, ConnectionRegistry};
use rcstream_relay::service::{Broadcaster, DeliveryReport, InboundMessage, Ingestor};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

struct Harness {
    addr: SocketAddr,
    ingestor: Ingestor,
    broadcaster: Broadcaster,
    registry: Arc<ConnectionRegistry>,
}

async fn start() -> Harness {
    let Relay {
        state,
        ingestor,
        broadcaster,
        events,
    } = Relay::new(64, 64);
    tokio::spawn(broadcaster.clone().run(events));
    let registry = Arc::clone(state.lifecycle.registry());

    let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
        panic!("bind failed");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("no local addr");
    };
    let app = api::build_app(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    Harness {
        addr,
        ingestor,
        broadcaster,
        registry,
    }
}

impl Harness {
    async fn connect(&self) -> Client {
        let url = format!("ws://{}/rc", self.addr);
        let Ok((client, _)) = connect_async(url).await else {
            panic!("ws connect failed");
        };
        client
    }

    async fn publish(&self, payload: Value) {
        let message = InboundMessage::new("rc.test", payload.to_string());
        let Ok(true) = self.ingestor.ingest(message).await else {
            panic!("event should be forwarded");
        };
    }

    async fn status(&self) -> Value {
        let url = format!("http://{}/rcstream_status", self.addr);
        let Ok(response) = reqwest::get(url).await else {
            panic!("status request failed");
        };
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let Ok(body) = response.json::<Value>().await else {
            panic!("status body is not json");
        };
        body
    }

    /// Waits until the live connections hold `total` patterns in total.
    async fn wait_for_patterns(&self, total: usize) {
        let deadline = tokio::time::Instant::now() + WAIT;
        loop {
            let mut held = 0;
            for entry in self.registry.snapshot().await {
                held += entry.patterns().await.len();
            }
            if held == total {
                return;
            }
            if tokio::time::Instant::now() > deadline {
                panic!("expected {total} patterns, found {held}");
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    async fn wait_for_clients(&self, count: usize) {
        let deadline = tokio::time::Instant::now() + WAIT;
        while self.registry.len().await != count {
            if tokio::time::Instant::now() > deadline {
                panic!("expected {count} connected clients");
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

async fn send(client: &mut Client, frame: Value) {
    if client.send(Message::text(frame.to_string())).await.is_err() {
        panic!("ws send failed");
    }
}

async fn next_json(client: &mut Client) -> Value {
    loop {
        let Ok(Some(Ok(message))) = tokio::time::timeout(WAIT, client.next()).await else {
            panic!("no message received");
        };
        if !message.is_text() {
            continue;
        }
        let Ok(text) = message.to_text() else {
            panic!("text frame");
        };
        let Ok(value) = serde_json::from_str(text) else {
            panic!("server sent invalid json: {text}");
        };
        return value;
    }
}

#[tokio::test]
async fn change_reaches_matching_clients_only() {
    let relay = start().await;
    let mut en = relay.connect().await;
    let mut de = relay.connect().await;

    send(&mut en, json!({"event": "subscribe", "data": ["en*"]})).await;
    send(&mut de, json!({"event": "subscribe", "data": "de*"})).await;
    relay.wait_for_patterns(2).await;

    let enwiki = json!({"server_name": "enwiki", "title": "Foo"});
    let dewiki = json!({"server_name": "dewiki", "title": "Bar"});
    relay.publish(enwiki.clone()).await;
    relay.publish(dewiki.clone()).await;

    assert_eq!(next_json(&mut en).await, json!({"event": "change", "data": enwiki}));
    // Events are delivered in upstream order, so the first thing the `de*`
    // client sees must be the dewiki change.
    assert_eq!(next_json(&mut de).await, json!({"event": "change", "data": dewiki}));
}

#[tokio::test]
async fn eleventh_pattern_triggers_subscribe_error() {
    let relay = start().await;
    let mut client = relay.connect().await;

    let ten: Vec<String> = (0..10).map(|i| format!("site{i}")).collect();
    send(&mut client, json!({"event": "subscribe", "data": ten})).await;
    send(&mut client, json!({"event": "subscribe", "data": "site10"})).await;

    let reply = next_json(&mut client).await;
    assert_eq!(reply["event"], "subscribe_error");
    assert_eq!(reply["data"]["limit"], 10);
    relay.wait_for_patterns(10).await;
}

#[tokio::test]
async fn unsubscribe_stops_delivery() {
    let relay = start().await;
    let mut client = relay.connect().await;

    send(&mut client, json!({"event": "subscribe", "data": ["en*", "fr*"]})).await;
    relay.wait_for_patterns(2).await;
    send(&mut client, json!({"event": "unsubscribe", "data": ["en*", "zz*"]})).await;
    relay.wait_for_patterns(1).await;

    relay.publish(json!({"server_name": "enwiki"})).await;
    relay.publish(json!({"server_name": "frwiki"})).await;

    let reply = next_json(&mut client).await;
    assert_eq!(reply["data"]["server_name"], "frwiki");
}

#[tokio::test]
async fn malformed_frames_and_events_are_ignored() {
    let relay = start().await;
    let mut client = relay.connect().await;

    if client.send(Message::text("not json".to_string())).await.is_err() {
        panic!("ws send failed");
    }
    send(&mut client, json!({"event": "subscribe", "data": [1, null, "*"]})).await;
    relay.wait_for_patterns(1).await;

    let dropped = relay
        .ingestor
        .ingest(InboundMessage::new("rc.test", "{broken"))
        .await;
    assert!(matches!(dropped, Ok(false)));
    relay.publish(json!({"server_name": "commonswiki"})).await;

    let reply = next_json(&mut client).await;
    assert_eq!(reply["data"]["server_name"], "commonswiki");
}

#[tokio::test]
async fn status_tracks_connects_and_disconnects() {
    let relay = start().await;
    let mut first = relay.connect().await;
    let _second = relay.connect().await;
    let _third = relay.connect().await;
    relay.wait_for_clients(3).await;

    send(&mut first, json!({"event": "subscribe", "data": "en*"})).await;
    relay.wait_for_patterns(1).await;
    if first.close(None).await.is_err() {
        panic!("close failed");
    }
    relay.wait_for_clients(2).await;

    let status = relay.status().await;
    assert_eq!(status["connected_clients"], 2);

    // The only `en*` subscriber is gone, so nobody is even attempted.
    let Ok(event) = ChangeEvent::from_value(json!({"server_name": "enwiki"})) else {
        panic!("valid event");
    };
    assert_eq!(relay.broadcaster.broadcast(&event).await, DeliveryReport::default());
}
