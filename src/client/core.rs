use std::time::Duration;

use url::Url;

use super::organization::OrganizationIds;
use super::transport::AuthTransport;
use crate::auth::Token;
use crate::error::{BuildkiteError, Result};

pub const DEFAULT_REST_URL: &str = "https://api.buildkite.com/";
pub const DEFAULT_GRAPHQL_URL: &str = "https://graphql.buildkite.com/v1";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Everything needed to build a [`BuildkiteClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub organization: String,
    pub api_token: Token,
    pub rest_url: String,
    pub graphql_url: String,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(organization: impl Into<String>, api_token: impl Into<Token>) -> Self {
        Self {
            organization: organization.into(),
            api_token: api_token.into(),
            rest_url: DEFAULT_REST_URL.to_string(),
            graphql_url: DEFAULT_GRAPHQL_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Client for one Buildkite organization, speaking both REST and GraphQL.
///
/// Safe to share between concurrent tasks; the only mutable state is the
/// organization ID cache, which is scoped to this instance.
pub struct BuildkiteClient {
    pub(super) transport: AuthTransport,
    pub(super) rest_url: Url,
    pub(super) graphql_url: Url,
    pub(super) org_slug: String,
    pub(super) org_ids: OrganizationIds,
}

impl BuildkiteClient {
    /// Builds a client for `config.organization`.
    ///
    /// # Errors
    ///
    /// Returns [`BuildkiteError::Invalid`] for a blank organization or token,
    /// and [`BuildkiteError::Url`] when either endpoint does not parse.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        if config.organization.trim().is_empty() {
            return Err(BuildkiteError::Invalid(
                "organization slug must not be empty".into(),
            ));
        }

        if config.api_token.is_empty() {
            return Err(BuildkiteError::Invalid("API token must not be empty".into()));
        }

        let transport = AuthTransport::new(config.api_token.clone(), config.timeout)?;
        let rest_url = Url::parse(&with_trailing_slash(&config.rest_url))?;
        let graphql_url = Url::parse(&config.graphql_url)?;

        Ok(Self {
            transport,
            rest_url,
            graphql_url,
            org_slug: config.organization.clone(),
            org_ids: OrganizationIds::default(),
        })
    }

    pub fn organization(&self) -> &str {
        &self.org_slug
    }

    /// Path of the organization's pipeline collection, or of one pipeline.
    pub(super) fn pipelines_path(&self, slug: Option<&str>) -> String {
        match slug {
            Some(slug) => format!("/v2/organizations/{}/pipelines/{}", self.org_slug, slug),
            None => format!("/v2/organizations/{}/pipelines", self.org_slug),
        }
    }
}

/// REST paths are joined onto the base, so a base with a path prefix must end
/// in `/` or its last segment is replaced.
fn with_trailing_slash(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{url}/")
    }
}
