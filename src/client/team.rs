use log::info;
use serde::{Deserialize, Serialize};

use super::core::BuildkiteClient;
use super::graphql::graphql_operation;
use super::ids::org_scoped_slug;
use super::team_member::TeamMemberRole;
use super::types::{null_as_default, string_enum, IdInput, MutationInput};
use crate::error::{BuildkiteError, Result, ResultExt};

string_enum!(
    /// Who can see a team.
    TeamPrivacy {
        Visible => "VISIBLE",
        Secret => "SECRET",
    }
);

impl Default for TeamPrivacy {
    fn default() -> Self {
        Self::Visible
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub slug: String,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    pub privacy: TeamPrivacy,
    pub default_member_role: TeamMemberRole,
    #[serde(default)]
    pub is_default_team: bool,
    #[serde(default)]
    pub members_can_create_pipelines: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub created_at: String,
}

#[derive(Serialize)]
pub(crate) struct TeamSlugVariables {
    slug: String,
}

#[derive(Deserialize)]
pub(crate) struct GetTeamData {
    team: Option<Team>,
}

graphql_operation!(
    GetTeam,
    r#"
query GetTeam($slug: ID!) {
  team(slug: $slug) {
    id
    uuid
    slug
    name
    description
    privacy
    defaultMemberRole
    isDefaultTeam
    membersCanCreatePipelines
    createdAt
  }
}"#,
    TeamSlugVariables => GetTeamData
);

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TeamCreateInput {
    #[serde(rename = "organizationID")]
    organization_id: String,
    name: String,
    description: String,
    is_default_team: bool,
    default_member_role: TeamMemberRole,
    members_can_create_pipelines: bool,
    privacy: TeamPrivacy,
}

#[derive(Deserialize)]
pub(crate) struct TeamEdge {
    node: Team,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TeamCreatePayload {
    team_edge: TeamEdge,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TeamCreateData {
    team_create: Option<TeamCreatePayload>,
}

graphql_operation!(
    TeamCreate,
    r#"
mutation TeamCreate($input: TeamCreateInput!) {
  teamCreate(input: $input) {
    teamEdge {
      node {
        id
        uuid
        slug
        name
        description
        privacy
        defaultMemberRole
        isDefaultTeam
        membersCanCreatePipelines
        createdAt
      }
    }
  }
}"#,
    MutationInput<TeamCreateInput> => TeamCreateData
);

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TeamUpdateInput {
    id: String,
    name: String,
    description: String,
    is_default_team: bool,
    default_member_role: TeamMemberRole,
    members_can_create_pipelines: bool,
    privacy: TeamPrivacy,
}

#[derive(Deserialize)]
pub(crate) struct TeamUpdatePayload {
    team: Team,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TeamUpdateData {
    team_update: Option<TeamUpdatePayload>,
}

graphql_operation!(
    TeamUpdate,
    r#"
mutation TeamUpdate($input: TeamUpdateInput!) {
  teamUpdate(input: $input) {
    team {
      id
      uuid
      slug
      name
      description
      privacy
      defaultMemberRole
      isDefaultTeam
      membersCanCreatePipelines
      createdAt
    }
  }
}"#,
    MutationInput<TeamUpdateInput> => TeamUpdateData
);

#[derive(Deserialize)]
pub(crate) struct TeamDeletePayload {
    #[serde(rename = "deletedTeamID")]
    #[allow(dead_code)]
    deleted_team_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TeamDeleteData {
    team_delete: Option<TeamDeletePayload>,
}

graphql_operation!(
    TeamDelete,
    r#"
mutation TeamDelete($input: TeamDeleteInput!) {
  teamDelete(input: $input) {
    deletedTeamID
  }
}"#,
    MutationInput<IdInput> => TeamDeleteData
);

impl BuildkiteClient {
    /// Fetches a team by slug.
    pub async fn get_team(&self, slug: &str) -> Result<Team> {
        let data = self
            .graphql::<GetTeam>(TeamSlugVariables {
                slug: org_scoped_slug(&self.org_slug, slug),
            })
            .await
            .with_context(|| format!("failed to get team {slug}"))?;

        data.team
            .ok_or_else(|| BuildkiteError::NotFound(format!("team {slug}")))
    }

    /// Creates a team in the client's organization.
    pub async fn create_team(&self, desired: &Team) -> Result<Team> {
        let organization_id = self.organization_id(&self.org_slug).await?;

        let data = self
            .graphql::<TeamCreate>(MutationInput::new(TeamCreateInput {
                organization_id,
                name: desired.name.clone(),
                description: desired.description.clone(),
                is_default_team: desired.is_default_team,
                default_member_role: desired.default_member_role,
                members_can_create_pipelines: desired.members_can_create_pipelines,
                privacy: desired.privacy,
            }))
            .await
            .with_context(|| format!("failed to create team {}", desired.name))?;

        let team = data
            .team_create
            .map(|payload| payload.team_edge.node)
            .ok_or(BuildkiteError::NoResponseData("TeamCreate"))?;

        info!("Created team {} ({})", team.slug, team.id);
        Ok(team)
    }

    /// Updates a team addressed by its node ID.
    pub async fn update_team(&self, desired: &Team) -> Result<Team> {
        let data = self
            .graphql::<TeamUpdate>(MutationInput::new(TeamUpdateInput {
                id: desired.id.clone(),
                name: desired.name.clone(),
                description: desired.description.clone(),
                is_default_team: desired.is_default_team,
                default_member_role: desired.default_member_role,
                members_can_create_pipelines: desired.members_can_create_pipelines,
                privacy: desired.privacy,
            }))
            .await
            .with_context(|| format!("failed to update team {}", desired.slug))?;

        data.team_update
            .map(|payload| payload.team)
            .ok_or(BuildkiteError::NoResponseData("TeamUpdate"))
    }

    /// Deletes a team by node ID.
    pub async fn delete_team(&self, id: &str) -> Result<()> {
        let data = self
            .graphql::<TeamDelete>(MutationInput::new(IdInput::new(id)))
            .await
            .with_context(|| format!("failed to delete team {id}"))?;

        data.team_delete
            .map(|_| ())
            .ok_or(BuildkiteError::NoResponseData("TeamDelete"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::core::test_support::{client_for, operation};
    use crate::error::ErrorKind;
    use mockito::Matcher;
    use serde_json::json;

    fn team_json() -> serde_json::Value {
        json!({
            "id": "VGVhbS0tLTFiMmM=",
            "uuid": "1b2c",
            "slug": "platform",
            "name": "Platform",
            "description": null,
            "privacy": "SECRET",
            "defaultMemberRole": "MAINTAINER",
            "isDefaultTeam": false,
            "membersCanCreatePipelines": true,
            "createdAt": "2024-01-01T00:00:00Z"
        })
    }

    fn desired() -> Team {
        Team {
            name: "Platform".into(),
            privacy: TeamPrivacy::Secret,
            default_member_role: TeamMemberRole::Maintainer,
            members_can_create_pipelines: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_uses_cached_organization_id() {
        let mut server = mockito::Server::new_async().await;
        let org = server
            .mock("POST", "/graphql")
            .match_body(operation("Organization"))
            .with_status(200)
            .with_body(r#"{"data": {"organization": {"id": "org-1"}}}"#)
            .expect(1)
            .create_async()
            .await;
        let create = server
            .mock("POST", "/graphql")
            .match_body(Matcher::AllOf(vec![
                operation("TeamCreate"),
                Matcher::PartialJson(json!({"variables": {"input": {
                    "organizationID": "org-1",
                    "name": "Platform",
                    "privacy": "SECRET",
                    "defaultMemberRole": "MAINTAINER",
                    "membersCanCreatePipelines": true
                }}})),
            ]))
            .with_status(200)
            .with_body(
                json!({"data": {"teamCreate": {"teamEdge": {"node": team_json()}}}}).to_string(),
            )
            .expect(2)
            .create_async()
            .await;

        let client = client_for(&server);
        let first = client.create_team(&desired()).await.unwrap();
        let second = client.create_team(&desired()).await.unwrap();

        assert_eq!(first.slug, "platform");
        assert_eq!(first.description, "");
        assert_eq!(first, second);
        org.assert_async().await;
        create.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_team_round_trips_fields() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/graphql")
            .match_body(Matcher::AllOf(vec![
                operation("GetTeam"),
                Matcher::PartialJson(json!({"variables": {"slug": "acme/platform"}})),
            ]))
            .with_status(200)
            .with_body(json!({"data": {"team": team_json()}}).to_string())
            .create_async()
            .await;

        let client = client_for(&server);
        let team = client.get_team("platform").await.unwrap();

        assert_eq!(team.privacy, TeamPrivacy::Secret);
        assert_eq!(team.default_member_role, TeamMemberRole::Maintainer);
        assert!(team.members_can_create_pipelines);
    }

    #[tokio::test]
    async fn test_update_is_idempotent() {
        let mut server = mockito::Server::new_async().await;
        let update = server
            .mock("POST", "/graphql")
            .match_body(Matcher::AllOf(vec![
                operation("TeamUpdate"),
                Matcher::PartialJson(json!({"variables": {"input": {"id": "VGVhbS0tLTFiMmM="}}})),
            ]))
            .with_status(200)
            .with_body(json!({"data": {"teamUpdate": {"team": team_json()}}}).to_string())
            .expect(2)
            .create_async()
            .await;

        let mut desired = desired();
        desired.id = "VGVhbS0tLTFiMmM=".into();

        let client = client_for(&server);
        let first = client.update_team(&desired).await.unwrap();
        let second = client.update_team(&desired).await.unwrap();

        assert_eq!(first, second);
        update.assert_async().await;
    }

    #[tokio::test]
    async fn test_delete_then_read_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/graphql")
            .match_body(operation("TeamDelete"))
            .with_status(200)
            .with_body(r#"{"data": {"teamDelete": {"deletedTeamID": "VGVhbS0tLTFiMmM="}}}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/graphql")
            .match_body(operation("GetTeam"))
            .with_status(200)
            .with_body(r#"{"data": {"team": null}}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        client.delete_team("VGVhbS0tLTFiMmM=").await.unwrap();
        let err = client.get_team("platform").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_null_mutation_payload_is_not_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/graphql")
            .with_status(200)
            .with_body(r#"{"data": {"teamDelete": null}}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client.delete_team("VGVhbS0tLTFiMmM=").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Decode);
    }
}
