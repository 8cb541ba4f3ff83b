use log::{debug, trace};
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::core::BuildkiteClient;
use crate::error::{BuildkiteError, Result};

const APPLICATION_JSON: &str = "application/json";

impl BuildkiteClient {
    pub(crate) async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let body = self.rest_request::<()>(Method::GET, path, None).await?;
        decode_body(&body)
    }

    pub(crate) async fn post<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize,
    {
        let body = self.rest_request(Method::POST, path, Some(body)).await?;
        decode_body(&body)
    }

    pub(crate) async fn patch<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize,
    {
        let body = self.rest_request(Method::PATCH, path, Some(body)).await?;
        decode_body(&body)
    }

    /// Issues a DELETE and discards whatever the API sends back.
    pub(crate) async fn delete(&self, path: &str) -> Result<()> {
        self.rest_request::<()>(Method::DELETE, path, None).await?;
        Ok(())
    }

    async fn rest_request<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Vec<u8>> {
        debug!("Buildkite request {method} {path}");

        // Relative join, so a base like `https://host/buildkite/` keeps its prefix.
        let url = self.rest_url.join(path.trim_start_matches('/'))?;
        let mut request = self.transport.request(method, url);

        if let Some(body) = body {
            let payload = serde_json::to_vec(body)?;
            request = request.header(CONTENT_TYPE, APPLICATION_JSON).body(payload);
        }

        let response = self.transport.send(request).await?;
        let bytes = response.bytes().await?;
        trace!(
            "Buildkite response body {}",
            String::from_utf8_lossy(&bytes)
        );

        Ok(bytes.to_vec())
    }
}

/// Decodes a buffered JSON body, keeping the raw text for diagnostics.
pub(crate) fn decode_body<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|source| BuildkiteError::Decode {
        source,
        length: bytes.len(),
        body: String::from_utf8_lossy(bytes).into_owned(),
    })
}
