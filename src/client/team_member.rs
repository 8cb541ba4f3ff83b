use log::info;
use serde::{Deserialize, Serialize};

use super::core::BuildkiteClient;
use super::graphql::graphql_operation;
use super::types::{null_as_default, string_enum, IdInput, MutationInput, Node};
use crate::error::{BuildkiteError, Result, ResultExt};

string_enum!(
    /// Role of a user within a team.
    TeamMemberRole {
        Member => "MEMBER",
        Maintainer => "MAINTAINER",
    }
);

impl Default for TeamMemberRole {
    fn default() -> Self {
        Self::Member
    }
}

/// Membership of a user in a team. New memberships always start as
/// [`TeamMemberRole::Member`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub role: TeamMemberRole,
    #[serde(default, deserialize_with = "null_as_default")]
    pub team: Node,
    #[serde(default, deserialize_with = "null_as_default")]
    pub user: Node,
    #[serde(default, deserialize_with = "null_as_default")]
    pub created_at: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GetTeamMemberData {
    team_member: Option<TeamMember>,
}

graphql_operation!(
    GetTeamMember,
    r#"
query GetTeamMember($id: ID!) {
  teamMember: node(id: $id) {
    ... on TeamMember {
      id
      uuid
      role
      createdAt
      team {
        id
      }
      user {
        id
      }
    }
  }
}"#,
    IdInput => GetTeamMemberData
);

#[derive(Serialize)]
pub(crate) struct TeamMemberCreateInput {
    #[serde(rename = "teamID")]
    team_id: String,
    #[serde(rename = "userID")]
    user_id: String,
}

#[derive(Deserialize)]
pub(crate) struct TeamMemberEdge {
    node: TeamMember,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TeamMemberCreatePayload {
    team_member_edge: TeamMemberEdge,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TeamMemberCreateData {
    team_member_create: Option<TeamMemberCreatePayload>,
}

graphql_operation!(
    TeamMemberCreate,
    r#"
mutation TeamMemberCreate($input: TeamMemberCreateInput!) {
  teamMemberCreate(input: $input) {
    teamMemberEdge {
      node {
        id
        uuid
        role
        createdAt
        team {
          id
        }
        user {
          id
        }
      }
    }
  }
}"#,
    MutationInput<TeamMemberCreateInput> => TeamMemberCreateData
);

#[derive(Serialize)]
pub(crate) struct TeamMemberUpdateInput {
    id: String,
    role: TeamMemberRole,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TeamMemberUpdatePayload {
    team_member: TeamMember,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TeamMemberUpdateData {
    team_member_update: Option<TeamMemberUpdatePayload>,
}

graphql_operation!(
    TeamMemberUpdate,
    r#"
mutation TeamMemberUpdate($input: TeamMemberUpdateInput!) {
  teamMemberUpdate(input: $input) {
    teamMember {
      id
      uuid
      role
      createdAt
      team {
        id
      }
      user {
        id
      }
    }
  }
}"#,
    MutationInput<TeamMemberUpdateInput> => TeamMemberUpdateData
);

#[derive(Deserialize)]
pub(crate) struct TeamMemberDeletePayload {
    #[serde(rename = "deletedTeamMemberID")]
    #[allow(dead_code)]
    deleted_team_member_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TeamMemberDeleteData {
    team_member_delete: Option<TeamMemberDeletePayload>,
}

graphql_operation!(
    TeamMemberDelete,
    r#"
mutation TeamMemberDelete($input: TeamMemberDeleteInput!) {
  teamMemberDelete(input: $input) {
    deletedTeamMemberID
  }
}"#,
    MutationInput<IdInput> => TeamMemberDeleteData
);

impl BuildkiteClient {
    /// Fetches a team membership by node ID.
    pub async fn get_team_member(&self, id: &str) -> Result<TeamMember> {
        let data = self
            .graphql::<GetTeamMember>(IdInput::new(id))
            .await
            .with_context(|| format!("failed to get team member {id}"))?;

        // A node of another type comes back as an empty object.
        data.team_member
            .filter(|member| !member.id.is_empty())
            .ok_or_else(|| BuildkiteError::NotFound(format!("team member {id}")))
    }

    /// Adds `desired.user` to `desired.team`, then raises the role if the
    /// desired one is above the default.
    pub async fn create_team_member(&self, desired: &TeamMember) -> Result<TeamMember> {
        let data = self
            .graphql::<TeamMemberCreate>(MutationInput::new(TeamMemberCreateInput {
                team_id: desired.team.id.clone(),
                user_id: desired.user.id.clone(),
            }))
            .await
            .with_context(|| {
                format!(
                    "failed to add user {} to team {}",
                    desired.user.id, desired.team.id
                )
            })?;

        let created = data
            .team_member_create
            .map(|payload| payload.team_member_edge.node)
            .ok_or(BuildkiteError::NoResponseData("TeamMemberCreate"))?;
        info!("Created team member {}", created.id);

        if desired.role == created.role {
            return Ok(created);
        }

        self.set_team_member_role(&created.id, desired.role)
            .await
            .with_context(|| {
                format!(
                    "team member {} was created but could not be given role {}",
                    created.id, desired.role
                )
            })
    }

    /// Changes a membership's role, addressed by its node ID.
    pub async fn update_team_member(&self, desired: &TeamMember) -> Result<TeamMember> {
        self.set_team_member_role(&desired.id, desired.role)
            .await
            .with_context(|| format!("failed to update team member {}", desired.id))
    }

    /// Removes a team membership by node ID.
    pub async fn delete_team_member(&self, id: &str) -> Result<()> {
        let data = self
            .graphql::<TeamMemberDelete>(MutationInput::new(IdInput::new(id)))
            .await
            .with_context(|| format!("failed to delete team member {id}"))?;

        data.team_member_delete
            .map(|_| ())
            .ok_or(BuildkiteError::NoResponseData("TeamMemberDelete"))
    }

    async fn set_team_member_role(&self, id: &str, role: TeamMemberRole) -> Result<TeamMember> {
        let data = self
            .graphql::<TeamMemberUpdate>(MutationInput::new(TeamMemberUpdateInput {
                id: id.to_string(),
                role,
            }))
            .await?;

        data.team_member_update
            .map(|payload| payload.team_member)
            .ok_or(BuildkiteError::NoResponseData("TeamMemberUpdate"))
    }
}
