use indexmap::IndexMap;
use log::{debug, info};
use serde_json::{Map, Value};

use super::{found, required_str, str_or, string_list, string_map, ResourceData};
use crate::client::{BuildkiteClient, Pipeline, Step};
use crate::error::{BuildkiteError, Result};

const DEFAULT_BRANCH: &str = "master";

const GITHUB_SETTINGS: &[&str] = &[
    "trigger_mode",
    "build_pull_requests",
    "pull_request_branch_filter_enabled",
    "pull_request_branch_filter_configuration",
    "skip_pull_request_builds_for_existing_commits",
    "build_pull_request_forks",
    "prefix_pull_request_fork_branch_names",
    "build_tags",
    "publish_commit_status",
    "publish_commit_status_per_step",
    "publish_blocked_as_pending",
    "separate_pull_request_statuses",
    "filter_enabled",
];

const BITBUCKET_SETTINGS: &[&str] = &[
    "trigger_mode",
    "build_pull_requests",
    "pull_request_branch_filter_enabled",
    "pull_request_branch_filter_configuration",
    "skip_pull_request_builds_for_existing_commits",
    "prefix_pull_request_fork_branch_names",
    "build_tags",
    "publish_commit_status",
    "publish_commit_status_per_step",
];

/// Provider settings the API reports but that are not user-settable.
const EXCLUDED_SETTINGS: &[&str] = &["repository", "account"];

pub(super) async fn create<D: ResourceData>(client: &BuildkiteClient, data: &mut D) -> Result<()> {
    let desired = desired(data)?;
    let created = client.create_pipeline(&desired).await?;
    write(data, &created)
}

pub(super) async fn read<D: ResourceData>(client: &BuildkiteClient, data: &mut D) -> Result<()> {
    let slug = data.id().to_string();
    match found(data, client.get_pipeline(&slug).await)? {
        Some(pipeline) => write(data, &pipeline),
        None => Ok(()),
    }
}

pub(super) async fn update<D: ResourceData>(client: &BuildkiteClient, data: &mut D) -> Result<()> {
    let desired = desired(data)?;
    let updated = client.update_pipeline(&desired).await?;
    write(data, &updated)
}

pub(super) async fn delete<D: ResourceData>(client: &BuildkiteClient, data: &mut D) -> Result<()> {
    client.delete_pipeline(data.id()).await
}

fn desired<D: ResourceData>(data: &D) -> Result<Pipeline> {
    let steps = match data.get("step") {
        Some(steps) => serde_json::from_value::<Vec<Step>>(steps.clone())
            .map_err(|e| BuildkiteError::Invalid(format!("invalid step: {e}")))?,
        None => Vec::new(),
    };

    let slug = if data.id().is_empty() {
        str_or(data, "slug", "")
    } else {
        data.id().to_string()
    };

    Ok(Pipeline {
        slug,
        name: required_str(data, "name")?,
        repository: required_str(data, "repository")?,
        description: str_or(data, "description", ""),
        default_branch: str_or(data, "default_branch", DEFAULT_BRANCH),
        branch_configuration: str_or(data, "branch_configuration", ""),
        environment: data.get_string_map("env"),
        configuration: str_or(data, "configuration", ""),
        team_uuids: data.get_string_list("team_uuids"),
        steps,
        provider_settings: provider_settings(data)?,
        ..Default::default()
    })
}

/// Settings block to send, taken from whichever of `github_settings` or
/// `bitbucket_settings` is set.
fn provider_settings<D: ResourceData>(data: &D) -> Result<IndexMap<String, Value>> {
    let github = data.get("github_settings").and_then(Value::as_object);
    let bitbucket = data.get("bitbucket_settings").and_then(Value::as_object);

    let block = match (github, bitbucket) {
        (Some(_), Some(_)) => {
            return Err(BuildkiteError::Invalid(
                "github_settings and bitbucket_settings are mutually exclusive".into(),
            ))
        }
        (Some(block), None) | (None, Some(block)) => block,
        (None, None) => return Ok(IndexMap::new()),
    };

    Ok(block
        .iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect())
}

fn write<D: ResourceData>(data: &mut D, pipeline: &Pipeline) -> Result<()> {
    data.set_id(pipeline.slug.clone());
    info!("Pipeline ID: {}", pipeline.slug);

    data.set("slug", Value::from(pipeline.slug.as_str()));
    data.set("name", Value::from(pipeline.name.as_str()));
    data.set("repository", Value::from(pipeline.repository.as_str()));
    data.set("description", Value::from(pipeline.description.as_str()));
    data.set("default_branch", Value::from(pipeline.default_branch.as_str()));
    data.set("branch_configuration", Value::from(pipeline.branch_configuration.as_str()));
    data.set("configuration", Value::from(pipeline.configuration.as_str()));
    data.set("env", string_map(&pipeline.environment));
    data.set("team_uuids", string_list(&pipeline.team_uuids));
    data.set("step", serde_json::to_value(&pipeline.steps)?);
    data.set("web_url", Value::from(pipeline.web_url.as_str()));
    data.set("builds_url", Value::from(pipeline.builds_url.as_str()));
    data.set("url", Value::from(pipeline.url.as_str()));
    data.set("badge_url", Value::from(pipeline.badge_url.as_str()));
    data.set("created_at", Value::from(pipeline.created_at.as_str()));
    data.set("webhook_url", Value::from(pipeline.provider.webhook_url.as_str()));

    data.set("github_settings", Value::Null);
    data.set("bitbucket_settings", Value::Null);

    let settings = &pipeline.provider.settings;
    match pipeline.provider.id.as_str() {
        "github" => data.set(
            "github_settings",
            Value::Object(known_settings(GITHUB_SETTINGS, settings)),
        ),
        "bitbucket" => data.set(
            "bitbucket_settings",
            Value::Object(known_settings(BITBUCKET_SETTINGS, settings)),
        ),
        other => debug!("No settings block for repository provider {other:?}"),
    }

    Ok(())
}

/// Keeps only the settings a block can express.
fn known_settings(known: &[&str], settings: &IndexMap<String, Value>) -> Map<String, Value> {
    settings
        .iter()
        .filter(|(k, _)| {
            if EXCLUDED_SETTINGS.contains(&k.as_str()) {
                return false;
            }
            if !known.contains(&k.as_str()) {
                debug!("Provider setting {k} has no attribute");
                return false;
            }
            true
        })
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::core::test_support::client_for;
    use crate::client::RepositoryProvider;
    use crate::error::ErrorKind;
    use crate::provider::test_support::state;
    use crate::provider::ResourceType;
    use mockito::Matcher;
    use serde_json::json;

    #[test]
    fn test_desired_applies_schema_defaults() {
        let data = state(
            "",
            json!({
                "name": "Web",
                "repository": "git@github.com:acme/web.git",
                "step": [{"type": "script", "command": "make", "timeout_in_minutes": 10}]
            }),
        );

        let pipeline = desired(&data).unwrap();

        assert_eq!(pipeline.default_branch, "master");
        assert_eq!(pipeline.steps.len(), 1);
        assert_eq!(pipeline.steps[0].timeout_in_minutes, Some(10));
        assert!(pipeline.provider_settings.is_empty());
    }

    #[test]
    fn test_desired_requires_name() {
        let data = state("", json!({"repository": "git@github.com:acme/web.git"}));
        assert_eq!(desired(&data).unwrap_err().kind(), ErrorKind::Invalid);
    }

    #[test]
    fn test_settings_blocks_are_exclusive() {
        let data = state(
            "",
            json!({
                "name": "Web",
                "repository": "git@github.com:acme/web.git",
                "github_settings": {"build_tags": true},
                "bitbucket_settings": {"build_tags": true}
            }),
        );
        assert_eq!(desired(&data).unwrap_err().kind(), ErrorKind::Invalid);
    }

    #[test]
    fn test_read_back_keeps_only_known_settings() {
        let pipeline = Pipeline {
            slug: "web".into(),
            provider: RepositoryProvider {
                id: "bitbucket".into(),
                settings: IndexMap::from([
                    ("repository".to_string(), json!("acme/web")),
                    ("account".to_string(), json!("acme")),
                    ("build_tags".to_string(), json!(true)),
                    ("separate_pull_request_statuses".to_string(), json!(true)),
                ]),
                webhook_url: "https://webhook.buildbox.io/deliver/abc".into(),
            },
            ..Default::default()
        };

        let mut data = state("", json!({}));
        write(&mut data, &pipeline).unwrap();

        assert_eq!(data.id(), "web");
        assert_eq!(data.get("bitbucket_settings"), Some(&json!({"build_tags": true})));
        assert!(data.get("github_settings").is_none());
        assert_eq!(
            data.get_str("webhook_url"),
            Some("https://webhook.buildbox.io/deliver/abc")
        );
    }

    #[tokio::test]
    async fn test_create_sends_settings_and_records_slug() {
        let mut server = mockito::Server::new_async().await;
        let post = server
            .mock("POST", "/v2/organizations/acme/pipelines")
            .match_body(Matcher::PartialJson(json!({
                "default_branch": "master",
                "provider_settings": {"build_tags": true}
            })))
            .with_status(201)
            .with_body(
                json!({
                    "slug": "web",
                    "name": "Web",
                    "repository": "git@github.com:acme/web.git",
                    "default_branch": "master",
                    "provider": {
                        "id": "github",
                        "settings": {"build_tags": true, "repository": "acme/web"}
                    }
                })
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;

        let client = client_for(&server);
        let mut data = state(
            "",
            json!({
                "name": "Web",
                "repository": "git@github.com:acme/web.git",
                "github_settings": {"build_tags": true}
            }),
        );
        ResourceType::Pipeline.create(&client, &mut data).await.unwrap();

        assert_eq!(data.id(), "web");
        assert_eq!(data.get("github_settings"), Some(&json!({"build_tags": true})));
        post.assert_async().await;
    }
}
