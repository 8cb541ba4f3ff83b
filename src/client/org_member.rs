use serde::{Deserialize, Serialize};

use super::core::BuildkiteClient;
use super::graphql::graphql_operation;
use super::ids::org_scoped_slug;
use super::types::{null_as_default, string_enum, IdInput, MutationInput};
use crate::error::{BuildkiteError, Result, ResultExt};

string_enum!(
    /// Role of a user within the organization.
    OrganizationMemberRole {
        Member => "MEMBER",
        Admin => "ADMIN",
    }
);

impl Default for OrganizationMemberRole {
    fn default() -> Self {
        Self::Member
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub email: String,
}

/// Membership of a user in the organization. Memberships are created by
/// inviting users, never through this client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationMember {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub role: OrganizationMemberRole,
    #[serde(default, deserialize_with = "null_as_default")]
    pub user: User,
    #[serde(default, deserialize_with = "null_as_default")]
    pub created_at: String,
}

#[derive(Serialize)]
pub(crate) struct MemberSlugVariables {
    slug: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GetOrganizationMemberData {
    organization_member: Option<OrganizationMember>,
}

graphql_operation!(
    GetOrganizationMember,
    r#"
query GetOrganizationMember($slug: ID!) {
  organizationMember(slug: $slug) {
    id
    uuid
    role
    createdAt
    user {
      id
      name
      email
    }
  }
}"#,
    MemberSlugVariables => GetOrganizationMemberData
);

#[derive(Serialize)]
pub(crate) struct OrganizationMemberUpdateInput {
    id: String,
    role: OrganizationMemberRole,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OrganizationMemberUpdatePayload {
    organization_member: OrganizationMember,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OrganizationMemberUpdateData {
    organization_member_update: Option<OrganizationMemberUpdatePayload>,
}

graphql_operation!(
    OrganizationMemberUpdate,
    r#"
mutation OrganizationMemberUpdate($input: OrganizationMemberUpdateInput!) {
  organizationMemberUpdate(input: $input) {
    organizationMember {
      id
      uuid
      role
      createdAt
      user {
        id
        name
        email
      }
    }
  }
}"#,
    MutationInput<OrganizationMemberUpdateInput> => OrganizationMemberUpdateData
);

#[derive(Deserialize)]
pub(crate) struct OrganizationMemberDeletePayload {
    #[serde(rename = "deletedOrganizationMemberID")]
    #[allow(dead_code)]
    deleted_organization_member_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OrganizationMemberDeleteData {
    organization_member_delete: Option<OrganizationMemberDeletePayload>,
}

graphql_operation!(
    OrganizationMemberDelete,
    r#"
mutation OrganizationMemberDelete($input: OrganizationMemberDeleteInput!) {
  organizationMemberDelete(input: $input) {
    deletedOrganizationMemberID
  }
}"#,
    MutationInput<IdInput> => OrganizationMemberDeleteData
);

impl BuildkiteClient {
    /// Fetches an organization member by user UUID.
    pub async fn get_organization_member(&self, uuid: &str) -> Result<OrganizationMember> {
        let data = self
            .graphql::<GetOrganizationMember>(MemberSlugVariables {
                slug: org_scoped_slug(&self.org_slug, uuid),
            })
            .await
            .with_context(|| format!("failed to get organization member {uuid}"))?;

        data.organization_member
            .ok_or_else(|| BuildkiteError::NotFound(format!("organization member {uuid}")))
    }

    /// Always fails: users join an organization by accepting an invitation.
    pub async fn create_organization_member(
        &self,
        desired: &OrganizationMember,
    ) -> Result<OrganizationMember> {
        Err(BuildkiteError::Unsupported(format!(
            "organization member {} cannot be created; invite the user instead",
            desired.user.email
        )))
    }

    /// Sets the member's role, addressed by its node ID.
    pub async fn update_organization_member(
        &self,
        desired: &OrganizationMember,
    ) -> Result<OrganizationMember> {
        let data = self
            .graphql::<OrganizationMemberUpdate>(MutationInput::new(
                OrganizationMemberUpdateInput {
                    id: desired.id.clone(),
                    role: desired.role,
                },
            ))
            .await
            .with_context(|| format!("failed to update organization member {}", desired.uuid))?;

        data.organization_member_update
            .map(|payload| payload.organization_member)
            .ok_or(BuildkiteError::NoResponseData("OrganizationMemberUpdate"))
    }

    /// Removes a member from the organization by node ID.
    pub async fn delete_organization_member(&self, id: &str) -> Result<()> {
        let data = self
            .graphql::<OrganizationMemberDelete>(MutationInput::new(IdInput::new(id)))
            .await
            .with_context(|| format!("failed to delete organization member {id}"))?;

        data.organization_member_delete
            .map(|_| ())
            .ok_or(BuildkiteError::NoResponseData("OrganizationMemberDelete"))
    }
}
