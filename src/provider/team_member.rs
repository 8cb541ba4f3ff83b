use log::info;
use serde_json::Value;

use super::{enum_or_default, found, required_str, str_or, ResourceData};
use crate::client::{BuildkiteClient, Node, TeamMember};
use crate::error::Result;

pub(super) async fn create<D: ResourceData>(client: &BuildkiteClient, data: &mut D) -> Result<()> {
    let desired = desired(data)?;
    let created = client.create_team_member(&desired).await?;
    write(data, &created);
    Ok(())
}

pub(super) async fn read<D: ResourceData>(client: &BuildkiteClient, data: &mut D) -> Result<()> {
    let id = data.id().to_string();
    if let Some(member) = found(data, client.get_team_member(&id).await)? {
        write(data, &member);
    }
    Ok(())
}

pub(super) async fn update<D: ResourceData>(client: &BuildkiteClient, data: &mut D) -> Result<()> {
    let desired = desired(data)?;
    let updated = client.update_team_member(&desired).await?;
    write(data, &updated);
    Ok(())
}

pub(super) async fn delete<D: ResourceData>(client: &BuildkiteClient, data: &mut D) -> Result<()> {
    client.delete_team_member(data.id()).await
}

fn desired<D: ResourceData>(data: &D) -> Result<TeamMember> {
    Ok(TeamMember {
        id: data.id().to_string(),
        uuid: str_or(data, "uuid", ""),
        role: enum_or_default(data, "role")?,
        team: Node::with_id(required_str(data, "team_id")?),
        user: Node::with_id(required_str(data, "user_id")?),
        created_at: String::new(),
    })
}

fn write<D: ResourceData>(data: &mut D, member: &TeamMember) {
    data.set_id(member.id.clone());
    info!("Team member ID: {}", member.id);

    data.set("uuid", Value::from(member.uuid.as_str()));
    data.set("role", Value::from(member.role.as_str()));
    data.set("team_id", Value::from(member.team.id.as_str()));
    data.set("user_id", Value::from(member.user.id.as_str()));
    data.set("created_at", Value::from(member.created_at.as_str()));
}
