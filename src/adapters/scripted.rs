//! Scripted smartctl Adapter
//!
//! In-memory `SmartController` for tests and dry runs. Responses are keyed
//! by the space-joined argument list; unscripted invocations fail the way a
//! missing device would.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};

use crate::domain::ports::SmartController;
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
enum Response {
    Output(Bytes),
    Failure(String),
}

/// Canned smartctl responses with an invocation log.
#[derive(Debug, Default)]
pub struct ScriptedSmartctl {
    responses: RwLock<HashMap<String, Response>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedSmartctl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `payload` when invoked with `args`.
    pub fn respond(self, args: &str, payload: impl Into<Bytes>) -> Self {
        self.set_response(args, payload);
        self
    }

    /// Fail with an execution error when invoked with `args`.
    pub fn fail(self, args: &str, reason: impl Into<String>) -> Self {
        self.set_failure(args, reason);
        self
    }

    pub fn set_response(&self, args: &str, payload: impl Into<Bytes>) {
        self.responses
            .write()
            .insert(args.to_string(), Response::Output(payload.into()));
    }

    pub fn set_failure(&self, args: &str, reason: impl Into<String>) {
        self.responses
            .write()
            .insert(args.to_string(), Response::Failure(reason.into()));
    }

    /// All invocations so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Number of invocations with exactly `args`.
    pub fn call_count(&self, args: &str) -> usize {
        self.calls.lock().iter().filter(|c| *c == args).count()
    }
}

#[async_trait]
impl SmartController for ScriptedSmartctl {
    async fn execute(&self, args: &[&str]) -> Result<Bytes> {
        let key = args.join(" ");
        self.calls.lock().push(key.clone());

        let response = self.responses.read().get(&key).cloned();
        match response {
            Some(Response::Output(payload)) => Ok(payload),
            Some(Response::Failure(reason)) => Err(Error::execution(args, reason)),
            None => Err(Error::execution(args, "no scripted response")),
        }
    }
}
