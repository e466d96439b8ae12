//! Remote blob service photo backend.
//!
//! Speaks a plain object protocol: `PUT`, `GET` and `DELETE` on
//! `{base_url}/{name}`, with an optional bearer token.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::{header, Client, Method, RequestBuilder, StatusCode};

use super::{content_type_for, PhotoBackend, PhotoStream};
use crate::errors::AppError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Photos kept in a remote blob service.
#[derive(Debug, Clone)]
pub struct HttpPhotoBackend {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpPhotoBackend {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, AppError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn request(&self, method: Method, name: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}/{}", self.base_url, name));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

#[async_trait]
impl PhotoBackend for HttpPhotoBackend {
    fn kind(&self) -> &'static str {
        "http"
    }

    async fn put(&self, name: &str, data: Bytes) -> Result<(), AppError> {
        self.request(Method::PUT, name)
            .header(header::CONTENT_TYPE, content_type_for(name))
            .body(data)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn open(&self, name: &str) -> Result<PhotoStream, AppError> {
        let response = self.request(Method::GET, name).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(format!("Photo {} not found", name)));
        }
        let response = response.error_for_status()?;

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| content_type_for(name).to_string());
        let content_length = response.content_length();
        let body = response.bytes_stream().map(|chunk| chunk.map_err(std::io::Error::other));

        Ok(PhotoStream {
            body: Box::pin(body),
            content_type,
            content_length,
        })
    }

    async fn remove(&self, name: &str) -> Result<(), AppError> {
        let response = self.request(Method::DELETE, name).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        response.error_for_status()?;
        Ok(())
    }
}
