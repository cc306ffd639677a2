use async_trait::async_trait;
use reqwest::header::LOCATION;
use reqwest::redirect;
use reqwest::Client;

use crate::error::NetworkError;
use crate::error::TransportError;
use crate::error::Unreachable;
use crate::network::HttpRequest;
use crate::network::HttpResponse;
use crate::network::Method;
use crate::network::Transport;
use crate::Config;

/// [`Transport`] over HTTP, backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    inner: Client,
}

impl ReqwestTransport {
    pub fn new(config: &Config) -> Result<Self, NetworkError> {
        let inner = Client::builder()
            .redirect(redirect::Policy::none())
            .connect_timeout(config.connect_timeout())
            .no_proxy()
            .build()
            .map_err(|e| NetworkError::new(&e))?;

        Ok(Self { inner })
    }
}

fn to_transport_error(e: reqwest::Error) -> TransportError {
    if e.is_connect() || e.is_timeout() {
        TransportError::Unreachable(Unreachable::new(&e))
    } else {
        TransportError::Network(NetworkError::new(&e))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, req: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = match req.method {
            Method::Get => self.inner.get(&req.url),
            Method::Post => self.inner.post(&req.url),
            Method::Delete => self.inner.delete(&req.url),
        };

        if !req.query.is_empty() {
            builder = builder.query(&req.query);
        }

        if let Some(body) = &req.body {
            builder = builder.json(body);
        }

        if let Some(timeout) = req.timeout {
            builder = builder.timeout(timeout);
        }

        let resp = builder.send().await.map_err(to_transport_error)?;

        let status = resp.status().as_u16();
        let location = resp.headers().get(LOCATION).and_then(|v| v.to_str().ok()).map(|s| s.to_string());
        let body = resp.text().await.map_err(to_transport_error)?;

        tracing::trace!(method = %req.method, url = %req.url, status, "http exchange");

        Ok(HttpResponse { status, location, body })
    }
}
