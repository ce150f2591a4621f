//! Minimal Chrome DevTools Protocol client.
//!
//! One websocket connection per page target. Commands are id-correlated
//! request/response pairs; protocol events are fanned out on a broadcast
//! channel so callers can await navigation and readiness signals instead
//! of polling page state.

use anyhow::{anyhow, Context, Result};
use futures_util::stream::{SplitSink, StreamExt};
use futures_util::SinkExt;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

const EVENT_CHANNEL_CAPACITY: usize = 256;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value, String>>>>>;

/// A protocol event such as `Page.loadEventFired` or `Runtime.bindingCalled`.
#[derive(Debug, Clone)]
pub struct CdpEvent {
    pub method: String,
    pub params: Value,
}

/// Either half of a decoded protocol message.
enum Incoming {
    Response {
        id: u64,
        result: Result<Value, String>,
    },
    Event(CdpEvent),
}

pub struct CdpClient {
    next_id: AtomicU64,
    pending: PendingMap,
    events: broadcast::Sender<CdpEvent>,
    sink: Mutex<WsSink>,
    reader: JoinHandle<()>,
}

impl CdpClient {
    pub async fn connect(ws_url: &str) -> Result<Self> {
        let (stream, _) = connect_async(ws_url)
            .await
            .with_context(|| format!("Failed to connect to DevTools at {ws_url}"))?;
        let (sink, mut source) = stream.split();

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let reader_pending = Arc::clone(&pending);
        let reader_events = events.clone();
        let reader = tokio::spawn(async move {
            while let Some(message) = source.next().await {
                let text = match message {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(_)) | Err(_) => break,
                    Ok(_) => continue,
                };

                match decode(&text) {
                    Some(Incoming::Response { id, result }) => {
                        if let Some(tx) = reader_pending.lock().await.remove(&id) {
                            let _ = tx.send(result);
                        }
                    }
                    Some(Incoming::Event(event)) => {
                        let _ = reader_events.send(event);
                    }
                    None => debug!("Unparseable DevTools message: {}", text),
                }
            }
            // Connection gone: fail every in-flight command.
            reader_pending.lock().await.clear();
        });

        Ok(Self {
            next_id: AtomicU64::new(1),
            pending,
            events,
            sink: Mutex::new(sink),
            reader,
        })
    }

    /// Send one command and wait for its response. Callers bound this
    /// with `tokio::time::timeout`.
    pub async fn send(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let payload = json!({ "id": id, "method": method, "params": params }).to_string();
        let sent = self.sink.lock().await.send(Message::Text(payload)).await;
        if let Err(e) = sent {
            self.pending.lock().await.remove(&id);
            return Err(anyhow!("Failed to send {method}: {e}"));
        }

        match rx.await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(message)) => Err(anyhow!("{method} failed: {message}")),
            Err(_) => Err(anyhow!("DevTools connection closed while awaiting {method}")),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CdpEvent> {
        self.events.subscribe()
    }

    /// Close the websocket and stop the reader task.
    pub async fn close(&self) {
        if let Err(e) = self.sink.lock().await.close().await {
            debug!("DevTools websocket close failed: {}", e);
        }
        self.reader.abort();
    }
}

impl Drop for CdpClient {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

fn decode(text: &str) -> Option<Incoming> {
    let value: Value = serde_json::from_str(text).ok()?;

    if let Some(id) = value.get("id").and_then(Value::as_u64) {
        let result = match value.get("error") {
            Some(error) => {
                let message = error
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown protocol error")
                    .to_string();
                Err(message)
            }
            None => Ok(value.get("result").cloned().unwrap_or(Value::Null)),
        };
        return Some(Incoming::Response { id, result });
    }

    let method = value.get("method")?.as_str()?.to_string();
    let params = value.get("params").cloned().unwrap_or(Value::Null);
    Some(Incoming::Event(CdpEvent { method, params }))
}

/// Wait on an event stream until `predicate` matches. The caller bounds
/// the whole wait with a timeout.
pub async fn wait_for_event(
    rx: &mut broadcast::Receiver<CdpEvent>,
    mut predicate: impl FnMut(&CdpEvent) -> bool,
) -> Result<CdpEvent> {
    loop {
        match rx.recv().await {
            Ok(event) if predicate(&event) => return Ok(event),
            Ok(_) => continue,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("DevTools event stream lagged, {} events dropped", skipped);
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => {
                return Err(anyhow!("DevTools connection closed"));
            }
        }
    }
}
