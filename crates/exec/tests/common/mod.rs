//! Scripted transport shared by the controller and workbench tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use apiprobe_core::RequestSpec;
use apiprobe_exec::{HttpResponse, HttpTransport, TransportError};
use async_trait::async_trait;
use tokio::sync::Notify;

/// Answers requests from a script, recording every request it receives.
///
/// Once the script runs out, the `repeat` response (if any) is returned for
/// every further request. A gated transport holds each call open until
/// `release` is notified, so tests can act while a call is in flight.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    repeat: Option<HttpResponse>,
    sent: Mutex<Vec<RequestSpec>>,
    gated: bool,
    pub entered: Notify,
    pub release: Notify,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gated() -> Self {
        ScriptedTransport {
            gated: true,
            ..Self::default()
        }
    }

    pub fn respond(self, response: HttpResponse) -> Self {
        self.script.lock().unwrap().push_back(Ok(response));
        self
    }

    pub fn fail(self, error: TransportError) -> Self {
        self.script.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn repeating(mut self, response: HttpResponse) -> Self {
        self.repeat = Some(response);
        self
    }

    pub fn sent(&self) -> Vec<RequestSpec> {
        self.sent.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: &RequestSpec) -> Result<HttpResponse, TransportError> {
        self.sent.lock().unwrap().push(request.clone());
        self.entered.notify_one();
        if self.gated {
            self.release.notified().await;
        }
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(answer) => answer,
            None => self
                .repeat
                .clone()
                .ok_or_else(|| TransportError::Network("script exhausted".to_string())),
        }
    }
}
