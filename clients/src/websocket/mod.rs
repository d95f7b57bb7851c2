use crate::rpc::{parse_frame, subscription_id, RpcFrame, RpcRequest};
use dashmap::DashMap;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt, TryFutureExt};
use log::{debug, error, info, trace, warn};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::io::{Error, ErrorKind};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::select;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::{oneshot, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type PendingMap = DashMap<u64, oneshot::Sender<Result<Value, Error>>>;

const MAX_ORPHANED_NOTIFICATIONS: usize = 32;

/// Routes notifications to subscribers. Notifications that arrive before the
/// subscribe response has been processed are held until the subscriber registers.
#[derive(Default)]
struct SubscriptionTable {
    senders: HashMap<String, UnboundedSender<Value>>,
    orphans: HashMap<String, Vec<Value>>,
}
impl SubscriptionTable {
    fn route(&mut self, subscription: String, value: Value) {
        if let Some(sender) = self.senders.get(&subscription) {
            if sender.send(value).is_err() {
                debug!("Subscriber for {subscription} has gone away");
                self.senders.remove(&subscription);
            }
        } else {
            let orphans = self.orphans.entry(subscription).or_default();
            if orphans.len() < MAX_ORPHANED_NOTIFICATIONS {
                orphans.push(value);
            }
        }
    }
    fn register(&mut self, subscription: String, sender: UnboundedSender<Value>) {
        for value in self.orphans.remove(&subscription).unwrap_or_default() {
            let _ = sender.send(value);
        }
        self.senders.insert(subscription, sender);
    }
}

pub async fn get_connection(
    url: &str,
    request_timeout: Duration,
) -> Result<(RpcConnection, ReadStream), Error> {
    let (stream, resp) = connect_async(url).await.map_err(|e| {
        Error::new(
            ErrorKind::ConnectionRefused,
            format!("Error Connecting to {url}: {e}"),
        )
    })?;
    debug!("Client Connect Resp: {:?}", resp.status());
    Ok(RpcConnection::new(stream, request_timeout))
}

pub struct ReadStream {
    read: SplitStream<WsStream>,
    pending: Arc<PendingMap>,
    subscriptions: Arc<Mutex<SubscriptionTable>>,
    open: Arc<AtomicBool>,
}
impl ReadStream {
    pub async fn run(&mut self, run: Arc<AtomicBool>) {
        loop {
            select! {
                msg = self.read.next() => {
                    match msg {
                        Some(Ok(msg)) => {
                            match msg {
                                Message::Text(text) => self.dispatch(&text).await,
                                Message::Binary(bin_data) => match String::from_utf8(bin_data) {
                                    Ok(text) => self.dispatch(&text).await,
                                    Err(e) => error!("Invalid Message: {:?}", e),
                                },
                                Message::Ping(_) | Message::Pong(_) => {
                                    trace!("Keepalive from node");
                                }
                                Message::Close(reason) => {
                                    info!("Received Close: {:?}", reason);
                                    break;
                                }
                                _ => {
                                    error!("Invalid Message: {:?}", msg);
                                }
                            }
                        }
                        Some(Err(msg)) => {
                            info!("Client Stream Error: {:?}", msg);
                            break;
                        }
                        None => {
                            info!("End of client read Stream");
                            break;
                        }
                    }
                }
                _ = async {
                    loop {
                        if !run.load(Ordering::Relaxed) {
                            debug!("Client is exiting");
                            return;
                        } else {
                            tokio::time::sleep(Duration::from_secs(1)).await
                        }
                    }
                } => {
                    break;
                }
            }
        }
        self.close_all().await;
    }

    async fn dispatch(&self, text: &str) {
        match parse_frame(text) {
            Ok(RpcFrame::Response { id, result }) => match self.pending.remove(&id) {
                Some((_, tx)) => {
                    let _ = tx.send(result.map_err(Error::from));
                }
                None => warn!("Response for unknown request id {id}"),
            },
            Ok(RpcFrame::Notification {
                subscription,
                result,
            }) => {
                self.subscriptions.lock().await.route(subscription, result);
            }
            Err(e) => error!("Invalid Message: {:?}", e),
        }
    }

    async fn close_all(&self) {
        self.open.store(false, Ordering::Relaxed);
        let ids: Vec<u64> = self.pending.iter().map(|e| *e.key()).collect();
        for id in ids {
            if let Some((_, tx)) = self.pending.remove(&id) {
                let _ = tx.send(Err(Error::new(
                    ErrorKind::ConnectionAborted,
                    "Connection closed before response received",
                )));
            }
        }
        let mut table = self.subscriptions.lock().await;
        table.senders.clear();
        table.orphans.clear();
    }
}

pub struct RpcConnection {
    write: Mutex<SplitSink<WsStream, Message>>,
    pending: Arc<PendingMap>,
    subscriptions: Arc<Mutex<SubscriptionTable>>,
    next_id: AtomicU64,
    open: Arc<AtomicBool>,
    request_timeout: Duration,
}
impl RpcConnection {
    pub fn new(stream: WsStream, request_timeout: Duration) -> (Self, ReadStream) {
        let (write, read) = stream.split();
        let pending = Arc::new(PendingMap::new());
        let subscriptions = Arc::new(Mutex::new(SubscriptionTable::default()));
        let open = Arc::new(AtomicBool::new(true));
        let connection = RpcConnection {
            write: Mutex::new(write),
            pending: pending.clone(),
            subscriptions: subscriptions.clone(),
            next_id: AtomicU64::new(1),
            open: open.clone(),
            request_timeout,
        };
        let stream = ReadStream {
            read,
            pending,
            subscriptions,
            open,
        };
        (connection, stream)
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Relaxed)
    }

    async fn send(&self, msg: Message) -> Result<(), Error> {
        trace!("Sending Request: {:?}", &msg);
        self.write
            .lock()
            .await
            .send(msg)
            .map_err(|e| Error::new(ErrorKind::BrokenPipe, e))
            .await
    }

    pub async fn request_value(&self, method: &str, params: Value) -> Result<Value, Error> {
        if !self.is_open() {
            return Err(Error::new(
                ErrorKind::NotConnected,
                format!("Connection closed, cannot call {method}"),
            ));
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);
        let body = serde_json::to_string(&RpcRequest::new(id, method, params))
            .map_err(|e| Error::new(ErrorKind::InvalidInput, e))?;
        if let Err(e) = self.send(Message::Text(body)).await {
            self.pending.remove(&id);
            return Err(e);
        }
        select!(
            _ = tokio::time::sleep(self.request_timeout) => {
                self.pending.remove(&id);
                Err(Error::new(
                    ErrorKind::TimedOut,
                    format!("Timeout before {method} completed"),
                ))
            }
            res = rx => {
                res.map_err(|_| Error::new(
                    ErrorKind::ConnectionAborted,
                    "Channel Closed before response received",
                ))?
            }
        )
    }

    pub async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, Error> {
        let value = self.request_value(method, params).await?;
        serde_json::from_value(value.clone()).map_err(|e| {
            Error::new(
                ErrorKind::InvalidData,
                format!("Failed to Parse {method} response {value},\r\n {e}"),
            )
        })
    }

    /// Subscribes and returns the server side subscription id and the notification stream.
    pub async fn subscribe(
        &self,
        method: &str,
        params: Value,
    ) -> Result<(String, UnboundedReceiver<Value>), Error> {
        let id = subscription_id(&self.request_value(method, params).await?);
        let (tx, rx) = unbounded_channel();
        self.subscriptions.lock().await.register(id.clone(), tx);
        Ok((id, rx))
    }

    pub async fn unsubscribe(&self, method: &str, subscription: &str) -> Result<bool, Error> {
        self.subscriptions.lock().await.senders.remove(subscription);
        let res: Value = self
            .request_value(method, Value::Array(vec![Value::String(subscription.to_string())]))
            .await?;
        Ok(res.as_bool().unwrap_or(false))
    }

    pub async fn close(&self) -> Result<(), Error> {
        self.open.store(false, Ordering::Relaxed);
        self.subscriptions.lock().await.senders.clear();
        self.write
            .lock()
            .await
            .close()
            .map_err(|e| Error::new(ErrorKind::Other, e))
            .await
    }
}
