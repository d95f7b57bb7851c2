use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::io::Error;
use std::time::{Duration, SystemTime};

pub const START_NODE_FAILED: &str = "startNodeFailed";
pub const START_FARMER_FAILED: &str = "startFarmerFailed";
pub const CONFIG_UPDATE_FAILED: &str = "configUpdateFailed";
pub const CONFIG_READ_FAILED: &str = "configReadFailed";
pub const START_NODE_MISSING_PARAMS: &str = "startNodeMissingParams";
pub const NODE_CONNECTION_LOST: &str = "nodeConnectionLost";

/// User facing error slot. An empty title and message means no error.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug, Default)]
pub struct ErrorRecord {
    pub title: String,
    pub message: String,
}
impl ErrorRecord {
    pub fn new<T: Into<String>, M: Into<String>>(title: T, message: M) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
        }
    }
    pub fn is_set(&self) -> bool {
        !self.title.is_empty() || !self.message.is_empty()
    }
}

#[derive(Debug)]
pub enum FarmingError {
    Config(Error),
    Connection(Error),
    ProcessStart(Error),
    Subscription(Error),
}
impl FarmingError {
    pub fn inner(&self) -> &Error {
        match self {
            FarmingError::Config(e)
            | FarmingError::Connection(e)
            | FarmingError::ProcessStart(e)
            | FarmingError::Subscription(e) => e,
        }
    }
    /// Converts into the record shown to the user under `title`.
    pub fn into_record(self, title: &str) -> ErrorRecord {
        ErrorRecord::new(title, self.inner().to_string())
    }
}
impl fmt::Display for FarmingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FarmingError::Config(e) => write!(f, "Config error: {e}"),
            FarmingError::Connection(e) => write!(f, "Connection error: {e}"),
            FarmingError::ProcessStart(e) => write!(f, "Process start error: {e}"),
            FarmingError::Subscription(e) => write!(f, "Subscription error: {e}"),
        }
    }
}
impl std::error::Error for FarmingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.inner())
    }
}

/// Bounded list of recent errors, newest first, dropping entries older than the cache duration.
#[derive(Default, Clone, Debug)]
pub struct RecentErrors<T: Clone + Serialize> {
    depth: usize,
    cache_duration: Duration,
    errors: VecDeque<(T, SystemTime)>,
}
impl<T: Clone + Serialize> RecentErrors<T> {
    pub fn new(depth: usize, cache_duration: Duration) -> Self {
        Self {
            depth,
            cache_duration,
            errors: VecDeque::with_capacity(depth),
        }
    }
    pub fn add(&mut self, t: T) {
        self.errors.push_front((t, SystemTime::now()));
        self.trim();
    }
    pub fn get(&mut self) -> Vec<(T, SystemTime)> {
        self.trim();
        self.errors.iter().cloned().collect()
    }
    pub fn len(&self) -> usize {
        self.errors.len()
    }
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
    pub fn trim(&mut self) {
        self.errors.truncate(self.depth);
        let max_age = self.cache_duration;
        self.errors.retain(|(_, d)| {
            matches!(SystemTime::now().duration_since(*d), Ok(age) if age < max_age)
        });
    }
}
