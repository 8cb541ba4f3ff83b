use std::collections::HashMap;

use log::debug;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::core::BuildkiteClient;
use super::graphql::graphql_operation;
use super::types::Node;
use crate::error::{BuildkiteError, Result, ResultExt};

/// Organization slug → GraphQL ID, memoized for the life of one client.
///
/// Organization IDs never change, so entries are never evicted. The lock is
/// held across the lookup, which means concurrent misses wait for the first
/// fetch instead of issuing their own.
#[derive(Default)]
pub struct OrganizationIds {
    ids: Mutex<HashMap<String, String>>,
}

#[derive(Serialize)]
pub(crate) struct OrganizationVariables {
    #[serde(rename = "orgSlug")]
    org_slug: String,
}

#[derive(Deserialize)]
pub(crate) struct OrganizationData {
    organization: Option<Node>,
}

graphql_operation!(
    Organization,
    r#"
query Organization($orgSlug: ID!) {
  organization(slug: $orgSlug) {
    id
  }
}"#,
    OrganizationVariables => OrganizationData
);

impl BuildkiteClient {
    /// Resolves an organization slug to its GraphQL ID.
    pub async fn organization_id(&self, slug: &str) -> Result<String> {
        let mut ids = self.org_ids.ids.lock().await;

        if let Some(id) = ids.get(slug) {
            return Ok(id.clone());
        }

        let id = self
            .fetch_organization_id(slug)
            .await
            .with_context(|| format!("could not fetch organization id for {slug}"))?;

        debug!("Resolved organization {slug} to {id}");
        ids.insert(slug.to_string(), id.clone());
        Ok(id)
    }

    async fn fetch_organization_id(&self, slug: &str) -> Result<String> {
        let data = self
            .graphql::<Organization>(OrganizationVariables {
                org_slug: slug.to_string(),
            })
            .await?;

        data.organization
            .map(|node| node.id)
            .ok_or_else(|| BuildkiteError::NotFound(format!("organization {slug}")))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::client::core::test_support::{client_for, operation};
    use crate::error::ErrorKind;
    use mockito::Matcher;
    use serde_json::json;

    #[tokio::test]
    async fn test_organization_id_is_fetched_once() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/graphql")
            .match_body(Matcher::AllOf(vec![
                operation("Organization"),
                Matcher::PartialJson(json!({"variables": {"orgSlug": "acme"}})),
            ]))
            .with_status(200)
            .with_body(r#"{"data": {"organization": {"id": "T3JnYW5pemF0aW9uLS0tMQ=="}}}"#)
            .expect(1)
            .create_async()
            .await;

        let client = Arc::new(client_for(&server));
        let first = client.organization_id("acme").await.unwrap();
        assert_eq!(first, "T3JnYW5pemF0aW9uLS0tMQ==");

        let calls = (0..100).map(|_| {
            let client = Arc::clone(&client);
            async move { client.organization_id("acme").await }
        });
        let results = futures::future::join_all(calls).await;

        assert!(results.into_iter().all(|r| r.unwrap() == first));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_concurrent_first_misses_share_one_fetch() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/graphql")
            .with_status(200)
            .with_body(r#"{"data": {"organization": {"id": "org-1"}}}"#)
            .expect(1)
            .create_async()
            .await;

        let client = Arc::new(client_for(&server));
        let handles: Vec<_> = (0..20)
            .map(|_| {
                let client = Arc::clone(&client);
                tokio::spawn(async move { client.organization_id("acme").await })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "org-1");
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unknown_organization_is_not_found_and_not_cached() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/graphql")
            .with_status(200)
            .with_body(r#"{"data": {"organization": null}}"#)
            .expect(2)
            .create_async()
            .await;

        let client = client_for(&server);
        for _ in 0..2 {
            let err = client.organization_id("ghost").await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::NotFound);
        }
        mock.assert_async().await;
    }
}
