use std::time::Duration;

use log::trace;
use reqwest::header::USER_AGENT;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use url::Url;

use crate::auth::Token;
use crate::error::{BuildkiteError, Result};

/// Value sent in the `User-Agent` header of every request.
pub const DEFAULT_USER_AGENT: &str = concat!(
    "terraform-provider-buildkite/",
    env!("CARGO_PKG_VERSION")
);

/// HTTP transport shared by the REST codec and the GraphQL dispatcher.
///
/// Every request leaving through [`AuthTransport::send`] carries the bearer
/// token and the provider's user agent, and every response is classified
/// here: 404 becomes [`BuildkiteError::NotFound`], any other non-2xx status
/// becomes [`BuildkiteError::HttpStatus`] with the body attached.
pub struct AuthTransport {
    http: Client,
    token: Token,
    user_agent: String,
}

impl AuthTransport {
    pub fn new(token: Token, timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            token,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        })
    }

    pub fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http.request(method, url)
    }

    pub async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request
            .header(USER_AGENT, &self.user_agent)
            .bearer_auth(self.token.as_str())
            .send()
            .await?;

        classify(response).await
    }
}

async fn classify(response: Response) -> Result<Response> {
    let status = response.status();
    trace!("Buildkite response status {status} for {}", response.url());

    if status == StatusCode::NOT_FOUND {
        return Err(BuildkiteError::NotFound(response.url().path().to_string()));
    }

    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());
        return Err(BuildkiteError::HttpStatus {
            status: status.as_u16(),
            body,
        });
    }

    Ok(response)
}
