use log::info;
use serde_json::Value;

use super::{enum_or_default, found, required_str, str_or, ResourceData};
use crate::client::{BuildkiteClient, Team};
use crate::error::Result;

pub(super) async fn create<D: ResourceData>(client: &BuildkiteClient, data: &mut D) -> Result<()> {
    let desired = desired(data)?;
    let created = client.create_team(&desired).await?;
    write(data, &created);
    Ok(())
}

pub(super) async fn read<D: ResourceData>(client: &BuildkiteClient, data: &mut D) -> Result<()> {
    let slug = data.id().to_string();
    if let Some(team) = found(data, client.get_team(&slug).await)? {
        write(data, &team);
    }
    Ok(())
}

pub(super) async fn update<D: ResourceData>(client: &BuildkiteClient, data: &mut D) -> Result<()> {
    let desired = desired(data)?;
    let updated = client.update_team(&desired).await?;
    write(data, &updated);
    Ok(())
}

pub(super) async fn delete<D: ResourceData>(client: &BuildkiteClient, data: &mut D) -> Result<()> {
    let id = required_str(data, "team_id")?;
    client.delete_team(&id).await
}

fn desired<D: ResourceData>(data: &D) -> Result<Team> {
    Ok(Team {
        id: str_or(data, "team_id", ""),
        uuid: str_or(data, "uuid", ""),
        slug: data.id().to_string(),
        name: required_str(data, "name")?,
        description: str_or(data, "description", ""),
        privacy: enum_or_default(data, "privacy")?,
        default_member_role: enum_or_default(data, "default_member_role")?,
        is_default_team: data.get_bool("is_default_team").unwrap_or(false),
        members_can_create_pipelines: data
            .get_bool("members_can_create_pipelines")
            .unwrap_or(false),
        created_at: String::new(),
    })
}

fn write<D: ResourceData>(data: &mut D, team: &Team) {
    data.set_id(team.slug.clone());
    info!("Team ID: {}", team.slug);

    data.set("team_id", Value::from(team.id.as_str()));
    data.set("uuid", Value::from(team.uuid.as_str()));
    data.set("slug", Value::from(team.slug.as_str()));
    data.set("name", Value::from(team.name.as_str()));
    data.set("description", Value::from(team.description.as_str()));
    data.set("privacy", Value::from(team.privacy.as_str()));
    data.set("default_member_role", Value::from(team.default_member_role.as_str()));
    data.set("is_default_team", Value::from(team.is_default_team));
    data.set(
        "members_can_create_pipelines",
        Value::from(team.members_can_create_pipelines),
    );
    data.set("created_at", Value::from(team.created_at.as_str()));
}
