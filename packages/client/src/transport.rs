//! `reqwest::blocking` implementation of [`halnav::Transport`].

use halnav::{Credentials, FailureKind, Method, Request, Response, Transport, TransportFailure};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::redirect;
use tracing::debug;

use crate::config::ClientConfig;

/// Sends requests with `reqwest`.
///
/// GETs follow redirects. Writes do not, so that a `302`/`303` with a
/// `Location` header reaches the navigator intact.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    follow: Client,
    no_redirect: Client,
}

impl ReqwestTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, reqwest::Error> {
        let follow = Client::builder().timeout(config.timeout).build()?;
        let no_redirect = Client::builder()
            .timeout(config.timeout)
            .redirect(redirect::Policy::none())
            .build()?;
        Ok(Self { follow, no_redirect })
    }

    fn builder(&self, request: &Request) -> RequestBuilder {
        let (client, method) = match request.method {
            Method::Get => (&self.follow, reqwest::Method::GET),
            Method::Post => (&self.no_redirect, reqwest::Method::POST),
            Method::Put => (&self.no_redirect, reqwest::Method::PUT),
            Method::Patch => (&self.no_redirect, reqwest::Method::PATCH),
            Method::Delete => (&self.no_redirect, reqwest::Method::DELETE),
        };
        let mut builder = client.request(method, &request.uri);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }
        match &request.credentials {
            Some(Credentials::Basic { username, password }) => builder.basic_auth(username, password.as_deref()),
            Some(Credentials::Bearer(token)) => builder.bearer_auth(token),
            Some(Credentials::Header { name, value }) => builder.header(name.as_str(), value.as_str()),
            None => builder,
        }
    }
}

impl Transport for ReqwestTransport {
    fn request(&self, request: &Request) -> Result<Response, TransportFailure> {
        debug!("http: {} {}", request.method, request.uri);
        let response = self.builder(request).send().map_err(failure)?;

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response.bytes().map_err(failure)?.to_vec();
        debug!("http: {} {} -> {}", request.method, request.uri, status.as_u16());

        Ok(Response {
            status: status.as_u16(),
            reason: status.canonical_reason().map(str::to_string),
            headers,
            body,
        })
    }
}

fn failure(e: reqwest::Error) -> TransportFailure {
    let kind = if e.is_timeout() {
        FailureKind::Timeout
    } else if e.is_connect() {
        FailureKind::Connect
    } else {
        FailureKind::Other
    };
    TransportFailure::new(kind, e.to_string())
}
