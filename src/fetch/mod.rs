//! Fetching raw sensor records from the greenhouse backend.

mod http;

pub use http::*;

use crate::pipeline::NormalizeError;

use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Fetch error types.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Network(String),
    #[error("not authorized (HTTP {0})")]
    Unauthorized(u16),
    #[error("unexpected HTTP status {0}")]
    Status(u16),
    #[error("invalid response body: {0}")]
    Decode(String),
    #[error(transparent)]
    Malformed(#[from] NormalizeError),
}

/// A source of raw sensor records for one feed.
pub trait SensorSource: Send + Sync + 'static {
    fn fetch(&self) -> impl Future<Output = Result<Vec<Value>, FetchError>> + Send;
}

#[cfg(test)]
pub mod testing {
    //! Scripted sources for driving the poller in tests.

    use super::{FetchError, SensorSource};

    use serde_json::Value;
    use std::collections::VecDeque;
    use std::future::Future;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::sync::Notify;

    /// One scripted response. A gate holds the response back until notified.
    pub struct Step {
        pub gate: Option<Arc<Notify>>,
        pub result: Result<Vec<Value>, FetchError>,
    }

    impl Step {
        pub fn ok(records: Vec<Value>) -> Self {
            Self { gate: None, result: Ok(records) }
        }

        pub fn err(e: FetchError) -> Self {
            Self { gate: None, result: Err(e) }
        }

        pub fn gated(mut self, gate: Arc<Notify>) -> Self {
            self.gate = Some(gate);
            self
        }
    }

    /// Replays steps in order; fails once the script runs out.
    pub struct ScriptedSource {
        steps: Mutex<VecDeque<Step>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        pub fn new(steps: Vec<Step>) -> Self {
            Self {
                steps: Mutex::new(steps.into()),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl SensorSource for ScriptedSource {
        fn fetch(&self) -> impl Future<Output = Result<Vec<Value>, FetchError>> + Send {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let step = self.steps.lock().unwrap().pop_front();

            async move {
                match step {
                    Some(step) => {
                        if let Some(gate) = step.gate {
                            gate.notified().await;
                        }
                        step.result
                    }
                    None => Err(FetchError::Network("script exhausted".to_string())),
                }
            }
        }
    }
}
