//! [`RegistryApi`] over the Confluent schema registry REST API.

use crate::api::{RegisteredSchema, RegistryApi};
use crate::error::{Error, Result};
use reqwest::{header, Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const CONTENT_TYPE: &str = "application/vnd.schemaregistry.v1+json";

#[derive(Serialize)]
struct RegisterRequest<'a> {
    schema: &'a str,
}

#[derive(Deserialize)]
struct RegisterResponse {
    id: u32,
}

#[derive(Deserialize)]
struct SchemaResponse {
    schema: String,
}

#[derive(Deserialize)]
struct VersionResponse {
    subject: String,
    id: u32,
    version: u32,
    schema: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error_code: i64,
    message: String,
}

/// HTTP client for a Confluent-compatible schema registry.
#[derive(Debug, Clone)]
pub struct HttpRegistry {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRegistry {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Connection(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, self.url(path))
            .header(header::ACCEPT, CONTENT_TYPE)
    }

    fn register_request(&self, subject: &str, schema: &str, normalize: bool) -> RequestBuilder {
        let mut path = format!("/subjects/{subject}/versions");
        if normalize {
            path.push_str("?normalize=true");
        }
        self.request(Method::POST, &path)
            .header(header::CONTENT_TYPE, CONTENT_TYPE)
            .json(&RegisterRequest { schema })
    }

    fn schema_request(&self, id: u32) -> RequestBuilder {
        self.request(Method::GET, &format!("/schemas/ids/{id}"))
    }

    fn latest_version_request(&self, subject: &str) -> RequestBuilder {
        self.request(Method::GET, &format!("/subjects/{subject}/versions/latest"))
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::Connection(format!("Request to {} failed: {e}", self.base_url)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(Error::Http {
            status: status.as_u16(),
            message: error_message(status, &body),
        })
    }
}

/// Render a registry error body (`{"error_code": .., "message": ..}`) or fall back to the raw text.
fn error_message(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(err) => format!("{} (error code {})", err.message, err.error_code),
        Err(_) if body.is_empty() => status.to_string(),
        Err(_) => body.to_string(),
    }
}

#[async_trait::async_trait]
impl RegistryApi for HttpRegistry {
    async fn check_connection(&self) -> Result<()> {
        self.execute(self.request(Method::GET, "/subjects")).await?;
        Ok(())
    }

    async fn register(&self, subject: &str, schema: &str, normalize: bool) -> Result<u32> {
        let request = self.register_request(subject, schema, normalize);
        let response = self.execute(request).await.map_err(|e| Error::Registration {
            subject: subject.to_string(),
            message: e.to_string(),
        })?;
        let body: RegisterResponse = response.json().await.map_err(|e| Error::Registration {
            subject: subject.to_string(),
            message: format!("Malformed response: {e}"),
        })?;
        Ok(body.id)
    }

    async fn schema_by_id(&self, id: u32) -> Result<String> {
        let response = self
            .execute(self.schema_request(id))
            .await
            .map_err(|e| Error::Lookup(format!("schema id {id}: {e}")))?;
        let body: SchemaResponse = response
            .json()
            .await
            .map_err(|e| Error::Lookup(format!("schema id {id}: malformed response: {e}")))?;
        Ok(body.schema)
    }

    async fn latest_version(&self, subject: &str) -> Result<RegisteredSchema> {
        let response = self
            .execute(self.latest_version_request(subject))
            .await
            .map_err(|e| Error::Lookup(format!("latest version of '{subject}': {e}")))?;
        let body: VersionResponse = response.json().await.map_err(|e| {
            Error::Lookup(format!("latest version of '{subject}': malformed response: {e}"))
        })?;
        Ok(RegisteredSchema {
            subject: body.subject,
            id: body.id,
            version: body.version,
            schema: body.schema,
        })
    }
}
