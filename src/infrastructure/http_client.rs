use std::path::Path;

use async_trait::async_trait;

use crate::domain::DomainError;

/// HTTP methods used by the platform API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
    Delete,
}

/// Trait for HTTP client operations (for mocking)
#[async_trait]
pub trait HttpClientTrait: Send + Sync + std::fmt::Debug {
    async fn get_json(
        &self,
        url: &str,
        headers: Vec<(&str, &str)>,
    ) -> Result<serde_json::Value, DomainError>;

    async fn post_json(
        &self,
        url: &str,
        headers: Vec<(&str, &str)>,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, DomainError>;

    async fn patch_json(
        &self,
        url: &str,
        headers: Vec<(&str, &str)>,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, DomainError>;

    async fn delete(&self, url: &str, headers: Vec<(&str, &str)>) -> Result<(), DomainError>;

    /// Uploads a file as the `file` part of a multipart form
    async fn post_file(
        &self,
        url: &str,
        headers: Vec<(&str, &str)>,
        path: &Path,
    ) -> Result<serde_json::Value, DomainError>;
}

/// Real HTTP client using reqwest
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub fn with_timeout(timeout: std::time::Duration) -> Result<Self, DomainError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                DomainError::configuration(format!("Failed to build HTTP client: {}", e))
            })?;
        Ok(Self { client })
    }

    async fn send(
        &self,
        method: HttpMethod,
        url: &str,
        headers: Vec<(&str, &str)>,
        body: Option<&serde_json::Value>,
    ) -> Result<reqwest::Response, DomainError> {
        let mut request = match method {
            HttpMethod::Get => self.client.get(url),
            HttpMethod::Post => self.client.post(url),
            HttpMethod::Patch => self.client.patch(url),
            HttpMethod::Delete => self.client.delete(url),
        };

        for (key, value) in headers {
            request = request.header(key, value);
        }

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| DomainError::client(0, format!("Request failed: {}", e)))?;

        check_status(response).await
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, DomainError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let error_body = response.text().await.unwrap_or_default();
    Err(DomainError::client(
        status.as_u16(),
        format!("HTTP {}: {}", status, error_body),
    ))
}

async fn read_json(response: reqwest::Response) -> Result<serde_json::Value, DomainError> {
    let text = response
        .text()
        .await
        .map_err(|e| DomainError::client(0, format!("Failed to read response: {}", e)))?;

    if text.trim().is_empty() {
        return Ok(serde_json::Value::Null);
    }

    serde_json::from_str(&text)
        .map_err(|e| DomainError::client(0, format!("Failed to parse response: {}", e)))
}

#[async_trait]
impl HttpClientTrait for HttpClient {
    async fn get_json(
        &self,
        url: &str,
        headers: Vec<(&str, &str)>,
    ) -> Result<serde_json::Value, DomainError> {
        let response = self.send(HttpMethod::Get, url, headers, None).await?;
        read_json(response).await
    }

    async fn post_json(
        &self,
        url: &str,
        headers: Vec<(&str, &str)>,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, DomainError> {
        let response = self.send(HttpMethod::Post, url, headers, Some(body)).await?;
        read_json(response).await
    }

    async fn patch_json(
        &self,
        url: &str,
        headers: Vec<(&str, &str)>,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, DomainError> {
        let response = self.send(HttpMethod::Patch, url, headers, Some(body)).await?;
        read_json(response).await
    }

    async fn delete(&self, url: &str, headers: Vec<(&str, &str)>) -> Result<(), DomainError> {
        self.send(HttpMethod::Delete, url, headers, None).await?;
        Ok(())
    }

    async fn post_file(
        &self,
        url: &str,
        headers: Vec<(&str, &str)>,
        path: &Path,
    ) -> Result<serde_json::Value, DomainError> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            DomainError::io(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let mime = mime_guess::from_path(path).first_or_octet_stream();

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(mime.as_ref())
            .map_err(|e| DomainError::client(0, format!("Invalid content type: {}", e)))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let mut request = self.client.post(url);
        for (key, value) in headers {
            request = request.header(key, value);
        }

        let response = request
            .multipart(form)
            .send()
            .await
            .map_err(|e| DomainError::client(0, format!("Request failed: {}", e)))?;

        read_json(check_status(response).await?).await
    }
}
