//! In-memory transport for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use serde_json::Value;

use crate::transport::{Method, Request, Response, Transport, TransportFailure};

enum Scripted {
    Respond(Response),
    Fail(TransportFailure),
}

/// Scripted responses per `(method, uri)`. Each route replays its queue in
/// order and then keeps repeating the last entry. Unknown routes answer 404.
#[derive(Default)]
pub(crate) struct MockTransport {
    routes: Mutex<HashMap<(Method, String), VecDeque<Scripted>>>,
    log: Mutex<Vec<Request>>,
    delay: Option<Duration>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// An `application/hal+json` response.
    pub(crate) fn json(status: u16, body: Value) -> Response {
        Response::new(status, body.to_string()).with_header("Content-Type", "application/hal+json")
    }

    /// Serve `body` for `GET uri`.
    pub(crate) fn hal(self, uri: &str, body: Value) -> Self {
        self.respond(Method::Get, uri, Self::json(200, body))
    }

    pub(crate) fn respond(self, method: Method, uri: &str, response: Response) -> Self {
        self.script(method, uri, Scripted::Respond(response))
    }

    pub(crate) fn fail(self, method: Method, uri: &str, failure: TransportFailure) -> Self {
        self.script(method, uri, Scripted::Fail(failure))
    }

    /// Sleep this long inside every request.
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn script(self, method: Method, uri: &str, entry: Scripted) -> Self {
        self.routes
            .lock()
            .unwrap()
            .entry((method, uri.to_string()))
            .or_default()
            .push_back(entry);
        self
    }

    pub(crate) fn calls(&self, method: Method, uri: &str) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method && r.uri == uri)
            .count()
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.log.lock().unwrap().len()
    }

    pub(crate) fn last_request(&self) -> Option<Request> {
        self.log.lock().unwrap().last().cloned()
    }
}

impl Transport for MockTransport {
    fn request(&self, request: &Request) -> Result<Response, TransportFailure> {
        self.log.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        let mut routes = self.routes.lock().unwrap();
        let Some(queue) = routes.get_mut(&(request.method, request.uri.clone())) else {
            return Ok(Self::json(404, serde_json::json!({"message": "no route"})));
        };
        let entry = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().map(|e| match e {
                Scripted::Respond(r) => Scripted::Respond(r.clone()),
                Scripted::Fail(f) => Scripted::Fail(f.clone()),
            })
        };
        match entry {
            Some(Scripted::Respond(response)) => Ok(response),
            Some(Scripted::Fail(failure)) => Err(failure),
            None => Ok(Self::json(404, serde_json::json!({}))),
        }
    }
}
