//! In-memory gateway for service tests

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use super::{SearchGateway, SearchResponse};
use crate::error::{Error, Result};
use crate::query::QueryDocument;

/// A query the stub received
#[derive(Debug, Clone)]
pub(crate) struct RecordedSearch {
    pub index: String,
    pub body: Value,
    pub timeout: Duration,
}

type Responder = Box<dyn Fn(&str, &Value) -> Result<SearchResponse> + Send + Sync>;

/// Answers from a queue of canned responses, or from a responder function
pub(crate) struct StubGateway {
    queue: Mutex<VecDeque<Result<SearchResponse>>>,
    responder: Option<Responder>,
    calls: Mutex<Vec<RecordedSearch>>,
}

impl StubGateway {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            responder: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answer every search with `f(index, body)`
    pub fn with_responder(
        f: impl Fn(&str, &Value) -> Result<SearchResponse> + Send + Sync + 'static,
    ) -> Self {
        Self {
            responder: Some(Box::new(f)),
            ..Self::new()
        }
    }

    /// Queue a raw `_search` body
    pub fn push_body(&self, body: Value) -> &Self {
        self.queue.lock().push_back(SearchResponse::from_body(body));
        self
    }

    pub fn push_error(&self, error: Error) -> &Self {
        self.queue.lock().push_back(Err(error));
        self
    }

    pub fn calls(&self) -> Vec<RecordedSearch> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl SearchGateway for StubGateway {
    async fn search(
        &self,
        index: &str,
        query: &QueryDocument,
        timeout: Duration,
    ) -> Result<SearchResponse> {
        let body = query.to_body()?;
        self.calls.lock().push(RecordedSearch {
            index: index.to_string(),
            body: body.clone(),
            timeout,
        });

        if let Some(responder) = &self.responder {
            return responder(index, &body);
        }
        self.queue
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(Error::internal("stub gateway has no queued response")))
    }
}
