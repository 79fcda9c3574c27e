//! Scripted in-memory [`ApiClient`] for unit tests

use super::client::{ApiClient, ApiResponse, TransportError, TransportResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum Reply {
    Status(u16, String),
    NetworkError(String),
}

struct Rule {
    pattern: String,
    replies: VecDeque<Reply>,
}

/// A recorded request
#[derive(Debug, Clone)]
pub struct Call {
    pub method: &'static str,
    pub url: String,
    pub body: Option<Value>,
}

/// Answers requests by matching the URL path against scripted rules.
///
/// The first rule whose pattern appears in the URL (query string ignored)
/// answers. A rule with several replies pops them in order and repeats the
/// last one. Unmatched requests get a 404.
#[derive(Default)]
pub struct ScriptedClient {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<Call>>,
    delay: Option<Duration>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, pattern: &str, status: u16, body: &str) -> Self {
        self.push(pattern, Reply::Status(status, body.to_string()))
    }

    pub fn fail(self, pattern: &str, message: &str) -> Self {
        self.push(pattern, Reply::NetworkError(message.to_string()))
    }

    /// Delay every request, to open race windows
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn push(self, pattern: &str, reply: Reply) -> Self {
        {
            let mut rules = self.rules.lock();
            match rules.iter_mut().find(|r| r.pattern == pattern) {
                Some(rule) => rule.replies.push_back(reply),
                None => rules.push(Rule {
                    pattern: pattern.to_string(),
                    replies: VecDeque::from([reply]),
                }),
            }
        }
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    /// URLs requested so far, in order
    pub fn urls(&self) -> Vec<String> {
        self.calls.lock().iter().map(|c| c.url.clone()).collect()
    }

    async fn answer(
        &self,
        method: &'static str,
        url: &str,
        body: Option<Value>,
    ) -> TransportResult<ApiResponse> {
        self.calls.lock().push(Call {
            method,
            url: url.to_string(),
            body,
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let path = url.split('?').next().unwrap_or(url);
        let reply = {
            let mut rules = self.rules.lock();
            rules
                .iter_mut()
                .find(|r| path.contains(&r.pattern))
                .and_then(|rule| {
                    if rule.replies.len() > 1 {
                        rule.replies.pop_front()
                    } else {
                        rule.replies.front().cloned()
                    }
                })
        };

        match reply {
            Some(Reply::Status(status, body)) => Ok(ApiResponse::new(status, body)),
            Some(Reply::NetworkError(message)) => Err(TransportError::InvalidResponse(message)),
            None => Ok(ApiResponse::new(404, "not found")),
        }
    }
}

#[async_trait]
impl ApiClient for ScriptedClient {
    async fn head(&self, url: &str) -> TransportResult<u16> {
        self.answer("HEAD", url, None).await.map(|r| r.status)
    }

    async fn get(&self, url: &str) -> TransportResult<ApiResponse> {
        self.answer("GET", url, None).await
    }

    async fn post_json(&self, url: &str, body: &Value) -> TransportResult<ApiResponse> {
        self.answer("POST", url, Some(body.clone())).await
    }
}
