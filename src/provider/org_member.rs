use log::info;
use serde_json::Value;

use super::{enum_or_default, found, required_str, str_or, ResourceData};
use crate::client::{BuildkiteClient, OrganizationMember, User};
use crate::error::Result;

/// Organization members cannot be created; import them by UUID instead.
pub(super) async fn create<D: ResourceData>(client: &BuildkiteClient, data: &mut D) -> Result<()> {
    let desired = desired(data)?;
    let created = client.create_organization_member(&desired).await?;
    write(data, &created);
    Ok(())
}

pub(super) async fn read<D: ResourceData>(client: &BuildkiteClient, data: &mut D) -> Result<()> {
    let uuid = data.id().to_string();
    if let Some(member) = found(data, client.get_organization_member(&uuid).await)? {
        write(data, &member);
    }
    Ok(())
}

pub(super) async fn update<D: ResourceData>(client: &BuildkiteClient, data: &mut D) -> Result<()> {
    let desired = desired(data)?;
    let updated = client.update_organization_member(&desired).await?;
    write(data, &updated);
    Ok(())
}

pub(super) async fn delete<D: ResourceData>(client: &BuildkiteClient, data: &mut D) -> Result<()> {
    let id = required_str(data, "member_id")?;
    client.delete_organization_member(&id).await
}

fn desired<D: ResourceData>(data: &D) -> Result<OrganizationMember> {
    Ok(OrganizationMember {
        id: str_or(data, "member_id", ""),
        uuid: data.id().to_string(),
        role: enum_or_default(data, "role")?,
        user: User {
            id: str_or(data, "user_id", ""),
            name: str_or(data, "user_name", ""),
            email: str_or(data, "user_email", ""),
        },
        created_at: String::new(),
    })
}

fn write<D: ResourceData>(data: &mut D, member: &OrganizationMember) {
    data.set_id(member.uuid.clone());
    info!("Organization member ID: {}", member.uuid);

    data.set("member_id", Value::from(member.id.as_str()));
    data.set("uuid", Value::from(member.uuid.as_str()));
    data.set("role", Value::from(member.role.as_str()));
    data.set("user_id", Value::from(member.user.id.as_str()));
    data.set("user_name", Value::from(member.user.name.as_str()));
    data.set("user_email", Value::from(member.user.email.as_str()));
    data.set("created_at", Value::from(member.created_at.as_str()));
}
