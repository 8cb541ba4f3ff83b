use log::info;
use serde::{Deserialize, Serialize};

use super::core::BuildkiteClient;
use super::graphql::graphql_operation;
use super::types::{null_as_default, string_enum, IdInput, MutationInput, Node};
use crate::error::{BuildkiteError, Result, ResultExt};

string_enum!(
    /// What a team may do with a pipeline.
    TeamPipelineAccessLevel {
        ReadOnly => "READ_ONLY",
        BuildAndRead => "BUILD_AND_READ",
        ManageBuildAndRead => "MANAGE_BUILD_AND_READ",
    }
);

impl Default for TeamPipelineAccessLevel {
    fn default() -> Self {
        Self::ReadOnly
    }
}

/// Grant of a pipeline to a team. New grants always start as
/// [`TeamPipelineAccessLevel::ReadOnly`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamPipeline {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub access_level: TeamPipelineAccessLevel,
    #[serde(default, deserialize_with = "null_as_default")]
    pub team: Node,
    /// Carries the slug as well as the ID
    #[serde(default, deserialize_with = "null_as_default")]
    pub pipeline: Node,
    #[serde(default, deserialize_with = "null_as_default")]
    pub created_at: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GetTeamPipelineData {
    team_pipeline: Option<TeamPipeline>,
}

graphql_operation!(
    GetTeamPipeline,
    r#"
query GetTeamPipeline($id: ID!) {
  teamPipeline: node(id: $id) {
    ... on TeamPipeline {
      id
      uuid
      accessLevel
      createdAt
      team {
        id
      }
      pipeline {
        id
        slug
      }
    }
  }
}"#,
    IdInput => GetTeamPipelineData
);

#[derive(Serialize)]
pub(crate) struct TeamPipelineCreateInput {
    #[serde(rename = "teamID")]
    team_id: String,
    #[serde(rename = "pipelineID")]
    pipeline_id: String,
}

#[derive(Deserialize)]
pub(crate) struct TeamPipelineEdge {
    node: TeamPipeline,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TeamPipelineCreatePayload {
    team_pipeline_edge: TeamPipelineEdge,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TeamPipelineCreateData {
    team_pipeline_create: Option<TeamPipelineCreatePayload>,
}

graphql_operation!(
    TeamPipelineCreate,
    r#"
mutation TeamPipelineCreate($input: TeamPipelineCreateInput!) {
  teamPipelineCreate(input: $input) {
    teamPipelineEdge {
      node {
        id
        uuid
        accessLevel
        createdAt
        team {
          id
        }
        pipeline {
          id
          slug
        }
      }
    }
  }
}"#,
    MutationInput<TeamPipelineCreateInput> => TeamPipelineCreateData
);

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TeamPipelineUpdateInput {
    id: String,
    access_level: TeamPipelineAccessLevel,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TeamPipelineUpdatePayload {
    team_pipeline: TeamPipeline,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TeamPipelineUpdateData {
    team_pipeline_update: Option<TeamPipelineUpdatePayload>,
}

graphql_operation!(
    TeamPipelineUpdate,
    r#"
mutation TeamPipelineUpdate($input: TeamPipelineUpdateInput!) {
  teamPipelineUpdate(input: $input) {
    teamPipeline {
      id
      uuid
      accessLevel
      createdAt
      team {
        id
      }
      pipeline {
        id
        slug
      }
    }
  }
}"#,
    MutationInput<TeamPipelineUpdateInput> => TeamPipelineUpdateData
);

#[derive(Deserialize)]
pub(crate) struct TeamPipelineDeletePayload {
    #[serde(rename = "deletedTeamPipelineID")]
    #[allow(dead_code)]
    deleted_team_pipeline_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TeamPipelineDeleteData {
    team_pipeline_delete: Option<TeamPipelineDeletePayload>,
}

graphql_operation!(
    TeamPipelineDelete,
    r#"
mutation TeamPipelineDelete($input: TeamPipelineDeleteInput!) {
  teamPipelineDelete(input: $input) {
    deletedTeamPipelineID
  }
}"#,
    MutationInput<IdInput> => TeamPipelineDeleteData
);

impl BuildkiteClient {
    /// Fetches a team's access to a pipeline by node ID.
    pub async fn get_team_pipeline(&self, id: &str) -> Result<TeamPipeline> {
        let data = self
            .graphql::<GetTeamPipeline>(IdInput::new(id))
            .await
            .with_context(|| format!("failed to get team pipeline {id}"))?;

        data.team_pipeline
            .filter(|grant| !grant.id.is_empty())
            .ok_or_else(|| BuildkiteError::NotFound(format!("team pipeline {id}")))
    }

    /// Grants `desired.pipeline` to `desired.team`, then raises the access
    /// level if the desired one is above read-only.
    pub async fn create_team_pipeline(&self, desired: &TeamPipeline) -> Result<TeamPipeline> {
        let pipeline_id = if desired.pipeline.id.is_empty() {
            self.pipeline_node_id(desired.pipeline.slug()).await?
        } else {
            desired.pipeline.id.clone()
        };

        let data = self
            .graphql::<TeamPipelineCreate>(MutationInput::new(TeamPipelineCreateInput {
                team_id: desired.team.id.clone(),
                pipeline_id,
            }))
            .await
            .with_context(|| {
                format!(
                    "failed to add pipeline {} to team {}",
                    desired.pipeline.slug(),
                    desired.team.id
                )
            })?;

        let created = data
            .team_pipeline_create
            .map(|payload| payload.team_pipeline_edge.node)
            .ok_or(BuildkiteError::NoResponseData("TeamPipelineCreate"))?;
        info!("Created team pipeline {}", created.id);

        if desired.access_level == created.access_level {
            return Ok(created);
        }

        self.set_team_pipeline_access(&created.id, desired.access_level)
            .await
            .with_context(|| {
                format!(
                    "team pipeline {} was created but could not be given access {}",
                    created.id, desired.access_level
                )
            })
    }

    /// Changes the access level of a grant, addressed by its node ID.
    pub async fn update_team_pipeline(&self, desired: &TeamPipeline) -> Result<TeamPipeline> {
        self.set_team_pipeline_access(&desired.id, desired.access_level)
            .await
            .with_context(|| format!("failed to update team pipeline {}", desired.id))
    }

    /// Revokes a team's access to a pipeline by node ID.
    pub async fn delete_team_pipeline(&self, id: &str) -> Result<()> {
        let data = self
            .graphql::<TeamPipelineDelete>(MutationInput::new(IdInput::new(id)))
            .await
            .with_context(|| format!("failed to delete team pipeline {id}"))?;

        data.team_pipeline_delete
            .map(|_| ())
            .ok_or(BuildkiteError::NoResponseData("TeamPipelineDelete"))
    }

    async fn set_team_pipeline_access(
        &self,
        id: &str,
        access_level: TeamPipelineAccessLevel,
    ) -> Result<TeamPipeline> {
        let data = self
            .graphql::<TeamPipelineUpdate>(MutationInput::new(TeamPipelineUpdateInput {
                id: id.to_string(),
                access_level,
            }))
            .await?;

        data.team_pipeline_update
            .map(|payload| payload.team_pipeline)
            .ok_or(BuildkiteError::NoResponseData("TeamPipelineUpdate"))
    }
}
