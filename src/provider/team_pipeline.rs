use log::info;
use serde_json::Value;

use super::{enum_or_default, found, required_str, str_or, ResourceData};
use crate::client::{BuildkiteClient, Node, TeamPipeline};
use crate::error::Result;

pub(super) async fn create<D: ResourceData>(client: &BuildkiteClient, data: &mut D) -> Result<()> {
    let desired = desired(data)?;
    let created = client.create_team_pipeline(&desired).await?;
    write(data, &created);
    Ok(())
}

pub(super) async fn read<D: ResourceData>(client: &BuildkiteClient, data: &mut D) -> Result<()> {
    let id = data.id().to_string();
    if let Some(grant) = found(data, client.get_team_pipeline(&id).await)? {
        write(data, &grant);
    }
    Ok(())
}

pub(super) async fn update<D: ResourceData>(client: &BuildkiteClient, data: &mut D) -> Result<()> {
    let desired = desired(data)?;
    let updated = client.update_team_pipeline(&desired).await?;
    write(data, &updated);
    Ok(())
}

pub(super) async fn delete<D: ResourceData>(client: &BuildkiteClient, data: &mut D) -> Result<()> {
    client.delete_team_pipeline(data.id()).await
}

fn desired<D: ResourceData>(data: &D) -> Result<TeamPipeline> {
    Ok(TeamPipeline {
        id: data.id().to_string(),
        uuid: str_or(data, "uuid", ""),
        access_level: enum_or_default(data, "access_level")?,
        team: Node::with_id(required_str(data, "team_id")?),
        pipeline: Node {
            id: str_or(data, "pipeline_id", ""),
            slug: Some(required_str(data, "pipeline_slug")?),
        },
        created_at: String::new(),
    })
}

fn write<D: ResourceData>(data: &mut D, grant: &TeamPipeline) {
    data.set_id(grant.id.clone());
    info!("Team pipeline ID: {}", grant.id);

    data.set("uuid", Value::from(grant.uuid.as_str()));
    data.set("access_level", Value::from(grant.access_level.as_str()));
    data.set("team_id", Value::from(grant.team.id.as_str()));
    data.set("pipeline_id", Value::from(grant.pipeline.id.as_str()));
    data.set("pipeline_slug", Value::from(grant.pipeline.slug()));
    data.set("created_at", Value::from(grant.created_at.as_str()));
}
