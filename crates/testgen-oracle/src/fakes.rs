//! Scripted in-memory oracle (testing only)
//!
//! `ScriptedOracle` answers from a queue of canned replies, falling back to
//! an optional responder closure, and records every request it receives.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::client::OracleClient;
use crate::error::OracleError;

type Responder = Box<dyn Fn(&str, &str) -> Result<String, OracleError> + Send + Sync>;

/// One recorded `transform` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleCall {
    pub source: String,
    pub instruction: String,
}

/// Oracle fake driven by a reply script.
#[derive(Default)]
pub struct ScriptedOracle {
    replies: Mutex<VecDeque<Result<String, OracleError>>>,
    responder: Option<Responder>,
    calls: Mutex<Vec<OracleCall>>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer calls in order with the given replies.
    pub fn with_replies<I>(replies: I) -> Self
    where
        I: IntoIterator<Item = Result<String, OracleError>>,
    {
        ScriptedOracle {
            replies: Mutex::new(replies.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Answer every call not covered by queued replies with `responder`.
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&str, &str) -> Result<String, OracleError> + Send + Sync + 'static,
    {
        ScriptedOracle {
            responder: Some(Box::new(responder)),
            ..Self::default()
        }
    }

    pub fn push_reply(&self, reply: Result<String, OracleError>) {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(reply);
    }

    /// All requests received so far, in order.
    pub fn calls(&self) -> Vec<OracleCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl OracleClient for ScriptedOracle {
    async fn transform(&self, source: &str, instruction: &str) -> Result<String, OracleError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(OracleCall {
                source: source.to_string(),
                instruction: instruction.to_string(),
            });

        let queued = self
            .replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        if let Some(reply) = queued {
            return reply;
        }

        match &self.responder {
            Some(responder) => responder(source, instruction),
            None => Err(OracleError::Transport("oracle script exhausted".to_string())),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn model_info(&self) -> Option<String> {
        Some("scripted-model".to_string())
    }
}

impl std::fmt::Debug for ScriptedOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedOracle")
            .field("calls", &self.call_count())
            .field("has_responder", &self.responder.is_some())
            .finish()
    }
}
