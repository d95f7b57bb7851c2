pub mod node;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{Error, ErrorKind};

pub const JSONRPC_VERSION: &str = "2.0";

pub const CHAIN_GET_BLOCK: &str = "chain_getBlock";
pub const CHAIN_GET_BLOCK_HASH: &str = "chain_getBlockHash";
pub const CHAIN_SUBSCRIBE_NEW_HEADS: &str = "chain_subscribeNewHeads";
pub const CHAIN_UNSUBSCRIBE_NEW_HEADS: &str = "chain_unsubscribeNewHeads";
pub const SYSTEM_SYNC_STATE: &str = "system_syncState";
pub const SYSTEM_HEALTH: &str = "system_health";
pub const SYSTEM_PEERS: &str = "system_peers";
pub const STATE_GET_STORAGE: &str = "state_getStorage";

/// Storage key of `System.Events`: twox128("System") ++ twox128("Events").
pub const SYSTEM_EVENTS_KEY: &str =
    "0x26aa394eea5630e07c48ae0c9558cef780d41e5e16056765bc8461851072c9d7";

#[derive(Debug, Clone, Serialize)]
pub struct RpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: Value,
}
impl<'a> RpcRequest<'a> {
    pub fn new(id: u64, method: &'a str, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            method,
            params,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}
impl From<RpcError> for Error {
    fn from(value: RpcError) -> Self {
        Error::new(
            ErrorKind::Other,
            format!("RPC error {}: {}", value.code, value.message),
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionParams {
    pub subscription: Value,
    #[serde(default)]
    pub result: Value,
}

/// Any frame the node sends: a response to one of our requests or a subscription notification.
#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcError>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub params: Option<SubscriptionParams>,
}

#[derive(Debug, Clone)]
pub enum RpcFrame {
    Response {
        id: u64,
        result: Result<Value, RpcError>,
    },
    Notification {
        subscription: String,
        result: Value,
    },
}
impl TryFrom<IncomingMessage> for RpcFrame {
    type Error = Error;
    fn try_from(value: IncomingMessage) -> Result<Self, Self::Error> {
        match (value.id, value.params) {
            (Some(id), _) => Ok(RpcFrame::Response {
                id,
                result: match value.error {
                    Some(e) => Err(e),
                    None => Ok(value.result.unwrap_or(Value::Null)),
                },
            }),
            (None, Some(params)) => Ok(RpcFrame::Notification {
                subscription: subscription_id(&params.subscription),
                result: params.result,
            }),
            _ => Err(Error::new(
                ErrorKind::InvalidData,
                format!("Unrecognised RPC frame for method {:?}", value.method),
            )),
        }
    }
}

pub fn parse_frame(text: &str) -> Result<RpcFrame, Error> {
    let msg: IncomingMessage = serde_json::from_str(text).map_err(|e| {
        Error::new(
            ErrorKind::InvalidData,
            format!("Failed to Parse Json {text},\r\n {e}"),
        )
    })?;
    RpcFrame::try_from(msg)
}

/// Subscription ids are strings on substrate nodes but some servers send numbers.
pub fn subscription_id(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
