//! Scripted fetcher for exercising the batch protocol without a network.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use http::{HeaderValue, StatusCode, header};

use crate::Error;
use crate::fetch::Fetcher;
use crate::message::{CacheRequest, CacheResponse};

#[derive(Clone)]
pub(crate) enum Reply {
    Respond(CacheResponse),
    NetworkError,
}

#[derive(Default)]
pub(crate) struct StubFetcher {
    routes: HashMap<String, (Duration, Reply)>,
    pub(crate) started: Arc<AtomicUsize>,
    pub(crate) finished: Arc<AtomicUsize>,
}

impl StubFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn route(mut self, url: &str, reply: Reply) -> Self {
        self.routes.insert(url.to_string(), (Duration::ZERO, reply));
        self
    }

    pub(crate) fn slow_route(mut self, url: &str, delay: Duration, reply: Reply) -> Self {
        self.routes.insert(url.to_string(), (delay, reply));
        self
    }

    pub(crate) fn ok(body: &str) -> Reply {
        Reply::Respond(CacheResponse::new(StatusCode::OK).with_body(body.to_string()))
    }

    pub(crate) fn status(status: StatusCode) -> Reply {
        Reply::Respond(CacheResponse::new(status))
    }

    pub(crate) fn vary(value: &'static str) -> Reply {
        Reply::Respond(
            CacheResponse::new(StatusCode::OK)
                .with_header(header::VARY, HeaderValue::from_static(value))
                .with_body("varied"),
        )
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, request: &CacheRequest) -> Result<CacheResponse, Error> {
        self.started.fetch_add(1, Ordering::SeqCst);

        let (delay, reply) = self
            .routes
            .get(request.url.as_str())
            .cloned()
            .unwrap_or((Duration::ZERO, Self::status(StatusCode::NOT_FOUND)));

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.finished.fetch_add(1, Ordering::SeqCst);
        match reply {
            Reply::Respond(response) => Ok(response),
            Reply::NetworkError => Err(Error::Network(format!("connection refused: {}", request.url))),
        }
    }
}
