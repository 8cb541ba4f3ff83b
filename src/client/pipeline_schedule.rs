use std::collections::BTreeMap;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use super::core::BuildkiteClient;
use super::graphql::graphql_operation;
use super::ids::{org_scoped_slug, split_schedule_key};
use super::types::{null_as_default, IdInput, MutationInput, Node};
use crate::error::{BuildkiteError, Result, ResultExt};

/// A cron-triggered build of a pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineSchedule {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub uuid: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub pipeline: Node,
    #[serde(default, deserialize_with = "null_as_default")]
    pub label: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cronline: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub commit: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub branch: String,
    /// `KEY=VALUE` entries
    #[serde(default, deserialize_with = "null_as_default")]
    pub env: Vec<String>,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub created_at: String,
}

impl PipelineSchedule {
    /// Composite key used to read the schedule back.
    pub fn key(&self) -> String {
        format!("{}/{}", self.pipeline.slug(), self.uuid)
    }
}

/// Flattens an env map into sorted `KEY=VALUE` entries.
pub fn env_map_to_list(env: &BTreeMap<String, String>) -> Vec<String> {
    env.iter().map(|(k, v)| format!("{k}={v}")).collect()
}

/// Inverse of [`env_map_to_list`]. Values may themselves contain `=`.
pub fn env_list_to_map(env: &[String]) -> BTreeMap<String, String> {
    env.iter()
        .filter_map(|entry| match entry.split_once('=') {
            Some((key, value)) => Some((key.to_string(), value.to_string())),
            None => {
                warn!("Ignoring schedule env entry without '=': {entry}");
                None
            }
        })
        .collect()
}

#[derive(Serialize)]
pub(crate) struct ScheduleSlugVariables {
    slug: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GetPipelineScheduleData {
    pipeline_schedule: Option<PipelineSchedule>,
}

graphql_operation!(
    GetPipelineSchedule,
    r#"
query GetPipelineSchedule($slug: ID!) {
  pipelineSchedule(slug: $slug) {
    id
    uuid
    label
    cronline
    message
    commit
    branch
    env
    enabled
    createdAt
    pipeline {
      id
      slug
    }
  }
}"#,
    ScheduleSlugVariables => GetPipelineScheduleData
);

#[derive(Serialize)]
pub(crate) struct PipelineScheduleCreateInput {
    #[serde(rename = "pipelineID")]
    pipeline_id: String,
    label: String,
    cronline: String,
    message: String,
    commit: String,
    branch: String,
    env: String,
    enabled: bool,
}

#[derive(Deserialize)]
pub(crate) struct ScheduleEdge {
    node: PipelineSchedule,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PipelineScheduleCreatePayload {
    pipeline_schedule_edge: ScheduleEdge,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PipelineScheduleCreateData {
    pipeline_schedule_create: Option<PipelineScheduleCreatePayload>,
}

graphql_operation!(
    PipelineScheduleCreate,
    r#"
mutation PipelineScheduleCreate($input: PipelineScheduleCreateInput!) {
  pipelineScheduleCreate(input: $input) {
    pipelineScheduleEdge {
      node {
        id
        uuid
        label
        cronline
        message
        commit
        branch
        env
        enabled
        createdAt
        pipeline {
          id
          slug
        }
      }
    }
  }
}"#,
    MutationInput<PipelineScheduleCreateInput> => PipelineScheduleCreateData
);

#[derive(Serialize)]
pub(crate) struct PipelineScheduleUpdateInput {
    id: String,
    label: String,
    cronline: String,
    message: String,
    commit: String,
    branch: String,
    env: String,
    enabled: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PipelineScheduleUpdatePayload {
    pipeline_schedule: PipelineSchedule,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PipelineScheduleUpdateData {
    pipeline_schedule_update: Option<PipelineScheduleUpdatePayload>,
}

graphql_operation!(
    PipelineScheduleUpdate,
    r#"
mutation PipelineScheduleUpdate($input: PipelineScheduleUpdateInput!) {
  pipelineScheduleUpdate(input: $input) {
    pipelineSchedule {
      id
      uuid
      label
      cronline
      message
      commit
      branch
      env
      enabled
      createdAt
      pipeline {
        id
        slug
      }
    }
  }
}"#,
    MutationInput<PipelineScheduleUpdateInput> => PipelineScheduleUpdateData
);

#[derive(Deserialize)]
pub(crate) struct PipelineScheduleDeletePayload {
    #[serde(rename = "deletedPipelineScheduleID")]
    #[allow(dead_code)]
    deleted_pipeline_schedule_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PipelineScheduleDeleteData {
    pipeline_schedule_delete: Option<PipelineScheduleDeletePayload>,
}

graphql_operation!(
    PipelineScheduleDelete,
    r#"
mutation PipelineScheduleDelete($input: PipelineScheduleDeleteInput!) {
  pipelineScheduleDelete(input: $input) {
    deletedPipelineScheduleID
  }
}"#,
    MutationInput<IdInput> => PipelineScheduleDeleteData
);

impl BuildkiteClient {
    /// Reads a schedule by its `<pipeline slug>/<schedule uuid>` key.
    pub async fn get_pipeline_schedule(&self, key: &str) -> Result<PipelineSchedule> {
        let (pipeline, uuid) = split_schedule_key(key).ok_or_else(|| {
            BuildkiteError::Invalid(format!(
                "schedule key {key} is not of the form <pipeline slug>/<schedule uuid>"
            ))
        })?;

        let data = self
            .graphql::<GetPipelineSchedule>(ScheduleSlugVariables {
                slug: org_scoped_slug(&self.org_slug, &format!("{pipeline}/{uuid}")),
            })
            .await
            .with_context(|| format!("failed to get pipeline schedule {key}"))?;

        data.pipeline_schedule
            .ok_or_else(|| BuildkiteError::NotFound(format!("pipeline schedule {key}")))
    }

    /// Creates a schedule on `desired.pipeline`. The pipeline is addressed by
    /// node ID when known, otherwise by slug.
    pub async fn create_pipeline_schedule(
        &self,
        desired: &PipelineSchedule,
    ) -> Result<PipelineSchedule> {
        let pipeline_id = if desired.pipeline.id.is_empty() {
            self.pipeline_node_id(desired.pipeline.slug()).await?
        } else {
            desired.pipeline.id.clone()
        };

        let data = self
            .graphql::<PipelineScheduleCreate>(MutationInput::new(
                PipelineScheduleCreateInput {
                    pipeline_id,
                    label: desired.label.clone(),
                    cronline: desired.cronline.clone(),
                    message: desired.message.clone(),
                    commit: desired.commit.clone(),
                    branch: desired.branch.clone(),
                    env: desired.env.join("\n"),
                    enabled: desired.enabled,
                },
            ))
            .await
            .with_context(|| {
                format!(
                    "failed to create schedule {} on pipeline {}",
                    desired.label,
                    desired.pipeline.slug()
                )
            })?;

        let created = data
            .pipeline_schedule_create
            .map(|payload| payload.pipeline_schedule_edge.node)
            .ok_or(BuildkiteError::NoResponseData("PipelineScheduleCreate"))?;

        info!("Created pipeline schedule {}", created.key());
        Ok(created)
    }

    /// Updates a schedule addressed by its node ID.
    pub async fn update_pipeline_schedule(
        &self,
        desired: &PipelineSchedule,
    ) -> Result<PipelineSchedule> {
        let data = self
            .graphql::<PipelineScheduleUpdate>(MutationInput::new(
                PipelineScheduleUpdateInput {
                    id: desired.id.clone(),
                    label: desired.label.clone(),
                    cronline: desired.cronline.clone(),
                    message: desired.message.clone(),
                    commit: desired.commit.clone(),
                    branch: desired.branch.clone(),
                    env: desired.env.join("\n"),
                    enabled: desired.enabled,
                },
            ))
            .await
            .with_context(|| format!("failed to update pipeline schedule {}", desired.id))?;

        data.pipeline_schedule_update
            .map(|payload| payload.pipeline_schedule)
            .ok_or(BuildkiteError::NoResponseData("PipelineScheduleUpdate"))
    }

    /// Deletes a schedule by node ID.
    pub async fn delete_pipeline_schedule(&self, id: &str) -> Result<()> {
        let data = self
            .graphql::<PipelineScheduleDelete>(MutationInput::new(IdInput::new(id)))
            .await
            .with_context(|| format!("failed to delete pipeline schedule {id}"))?;

        data.pipeline_schedule_delete
            .map(|_| ())
            .ok_or(BuildkiteError::NoResponseData("PipelineScheduleDelete"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::core::test_support::{client_for, operation};
    use crate::error::ErrorKind;
    use mockito::Matcher;
    use serde_json::json;

    fn schedule_json() -> serde_json::Value {
        json!({
            "id": "UGlwZWxpbmVTY2hlZHVsZS0tLTE=",
            "uuid": "5c3f",
            "label": "Nightly",
            "cronline": "0 0 * * *",
            "message": "Scheduled build",
            "commit": "HEAD",
            "branch": "main",
            "env": ["FOO=bar", "URL=https://x.test/?a=b"],
            "enabled": true,
            "createdAt": "2024-01-01T00:00:00Z",
            "pipeline": {"id": "UGlwZWxpbmUtLS0x", "slug": "web"}
        })
    }

    fn desired() -> PipelineSchedule {
        PipelineSchedule {
            pipeline: Node::with_slug("web"),
            label: "Nightly".into(),
            cronline: "0 0 * * *".into(),
            message: "Scheduled build".into(),
            commit: "HEAD".into(),
            branch: "main".into(),
            env: vec!["FOO=bar".into(), "URL=https://x.test/?a=b".into()],
            enabled: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_env_list_round_trip() {
        let env = BTreeMap::from([
            ("B".to_string(), "two".to_string()),
            ("A".to_string(), "x=y".to_string()),
        ]);
        let list = env_map_to_list(&env);
        assert_eq!(list, vec!["A=x=y", "B=two"]);
        assert_eq!(env_list_to_map(&list), env);
    }

    #[test]
    fn test_env_entry_without_separator_is_dropped() {
        let map = env_list_to_map(&["NOPE".to_string(), "K=".to_string()]);
        assert_eq!(map, BTreeMap::from([("K".to_string(), String::new())]));
    }

    #[tokio::test]
    async fn test_get_schedule_uses_org_scoped_slug() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/graphql")
            .match_body(Matcher::AllOf(vec![
                operation("GetPipelineSchedule"),
                Matcher::PartialJson(json!({"variables": {"slug": "acme/web/5c3f"}})),
            ]))
            .with_status(200)
            .with_body(json!({"data": {"pipelineSchedule": schedule_json()}}).to_string())
            .expect(1)
            .create_async()
            .await;

        let client = client_for(&server);
        let schedule = client.get_pipeline_schedule("web/5c3f").await.unwrap();

        assert_eq!(schedule.key(), "web/5c3f");
        assert_eq!(schedule.env.len(), 2);
        assert!(schedule.enabled);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_missing_schedule_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/graphql")
            .with_status(200)
            .with_body(r#"{"data": {"pipelineSchedule": null}}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client.get_pipeline_schedule("web/5c3f").await.unwrap_err();

        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_malformed_key_is_invalid() {
        let server = mockito::Server::new_async().await;
        let client = client_for(&server);

        let err = client.get_pipeline_schedule("5c3f").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Invalid);
    }

    #[tokio::test]
    async fn test_create_resolves_pipeline_and_joins_env() {
        let mut server = mockito::Server::new_async().await;
        let lookup = server
            .mock("POST", "/graphql")
            .match_body(Matcher::AllOf(vec![
                operation("GetPipelineId"),
                Matcher::PartialJson(json!({"variables": {"pipelineSlug": "acme/web"}})),
            ]))
            .with_status(200)
            .with_body(r#"{"data": {"pipeline": {"id": "UGlwZWxpbmUtLS0x"}}}"#)
            .expect(1)
            .create_async()
            .await;
        let create = server
            .mock("POST", "/graphql")
            .match_body(Matcher::AllOf(vec![
                operation("PipelineScheduleCreate"),
                Matcher::PartialJson(json!({"variables": {"input": {
                    "pipelineID": "UGlwZWxpbmUtLS0x",
                    "label": "Nightly",
                    "env": "FOO=bar\nURL=https://x.test/?a=b",
                    "enabled": true
                }}})),
            ]))
            .with_status(200)
            .with_body(
                json!({"data": {"pipelineScheduleCreate": {
                    "pipelineScheduleEdge": {"node": schedule_json()}
                }}})
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;

        let client = client_for(&server);
        let created = client.create_pipeline_schedule(&desired()).await.unwrap();

        assert_eq!(created.uuid, "5c3f");
        assert_eq!(created.env, desired().env);
        lookup.assert_async().await;
        create.assert_async().await;
    }

    #[tokio::test]
    async fn test_update_is_idempotent() {
        let mut server = mockito::Server::new_async().await;
        let update = server
            .mock("POST", "/graphql")
            .match_body(Matcher::AllOf(vec![
                operation("PipelineScheduleUpdate"),
                Matcher::PartialJson(json!({"variables": {"input": {
                    "id": "UGlwZWxpbmVTY2hlZHVsZS0tLTE=",
                    "cronline": "0 0 * * *"
                }}})),
            ]))
            .with_status(200)
            .with_body(
                json!({"data": {"pipelineScheduleUpdate": {"pipelineSchedule": schedule_json()}}})
                    .to_string(),
            )
            .expect(2)
            .create_async()
            .await;

        let mut desired = desired();
        desired.id = "UGlwZWxpbmVTY2hlZHVsZS0tLTE=".into();

        let client = client_for(&server);
        let first = client.update_pipeline_schedule(&desired).await.unwrap();
        let second = client.update_pipeline_schedule(&desired).await.unwrap();

        assert_eq!(first, second);
        update.assert_async().await;
    }

    #[tokio::test]
    async fn test_delete_then_read_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        let delete = server
            .mock("POST", "/graphql")
            .match_body(operation("PipelineScheduleDelete"))
            .with_status(200)
            .with_body(
                json!({"data": {"pipelineScheduleDelete": {
                    "deletedPipelineScheduleID": "UGlwZWxpbmVTY2hlZHVsZS0tLTE="
                }}})
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;
        server
            .mock("POST", "/graphql")
            .match_body(operation("GetPipelineSchedule"))
            .with_status(200)
            .with_body(r#"{"data": {"pipelineSchedule": null}}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        client
            .delete_pipeline_schedule("UGlwZWxpbmVTY2hlZHVsZS0tLTE=")
            .await
            .unwrap();
        let err = client.get_pipeline_schedule("web/5c3f").await.unwrap_err();

        assert!(err.is_not_found());
        delete.assert_async().await;
    }
}
