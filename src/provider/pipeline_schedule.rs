use log::info;
use serde_json::Value;

use super::{found, required_str, str_or, string_map, ResourceData};
use crate::client::{env_list_to_map, env_map_to_list, BuildkiteClient, Node, PipelineSchedule};
use crate::error::Result;

pub(super) async fn create<D: ResourceData>(client: &BuildkiteClient, data: &mut D) -> Result<()> {
    let desired = desired(data)?;
    let created = client.create_pipeline_schedule(&desired).await?;
    write(data, &created);
    Ok(())
}

pub(super) async fn read<D: ResourceData>(client: &BuildkiteClient, data: &mut D) -> Result<()> {
    let key = data.id().to_string();
    if let Some(schedule) = found(data, client.get_pipeline_schedule(&key).await)? {
        write(data, &schedule);
    }
    Ok(())
}

pub(super) async fn update<D: ResourceData>(client: &BuildkiteClient, data: &mut D) -> Result<()> {
    let desired = desired(data)?;
    let updated = client.update_pipeline_schedule(&desired).await?;
    write(data, &updated);
    Ok(())
}

pub(super) async fn delete<D: ResourceData>(client: &BuildkiteClient, data: &mut D) -> Result<()> {
    let id = required_str(data, "schedule_id")?;
    client.delete_pipeline_schedule(&id).await
}

fn desired<D: ResourceData>(data: &D) -> Result<PipelineSchedule> {
    let pipeline = Node {
        id: str_or(data, "pipeline_id", ""),
        slug: Some(required_str(data, "pipeline_slug")?),
    };

    Ok(PipelineSchedule {
        id: str_or(data, "schedule_id", ""),
        pipeline,
        label: required_str(data, "label")?,
        cronline: required_str(data, "cron_schedule")?,
        message: str_or(data, "message", "Scheduled build"),
        commit: str_or(data, "commit", "HEAD"),
        branch: str_or(data, "branch", "master"),
        env: env_map_to_list(&data.get_string_map("env")),
        enabled: data.get_bool("enabled").unwrap_or(true),
        ..Default::default()
    })
}

fn write<D: ResourceData>(data: &mut D, schedule: &PipelineSchedule) {
    data.set_id(schedule.key());
    info!("Pipeline schedule ID: {}", schedule.key());

    data.set("schedule_id", Value::from(schedule.id.as_str()));
    data.set("pipeline_id", Value::from(schedule.pipeline.id.as_str()));
    data.set("pipeline_slug", Value::from(schedule.pipeline.slug()));
    data.set("label", Value::from(schedule.label.as_str()));
    data.set("cron_schedule", Value::from(schedule.cronline.as_str()));
    data.set("message", Value::from(schedule.message.as_str()));
    data.set("commit", Value::from(schedule.commit.as_str()));
    data.set("branch", Value::from(schedule.branch.as_str()));
    data.set("env", string_map(&env_list_to_map(&schedule.env)));
    data.set("enabled", Value::from(schedule.enabled));
    data.set("created_at", Value::from(schedule.created_at.as_str()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::core::test_support::{client_for, operation};
    use crate::provider::test_support::state;
    use crate::provider::ResourceType;
    use mockito::Matcher;
    use serde_json::json;

    #[test]
    fn test_desired_applies_schema_defaults() {
        let data = state(
            "",
            json!({
                "pipeline_slug": "web",
                "label": "Nightly",
                "cron_schedule": "0 0 * * *",
                "env": {"B": "2", "A": "1"}
            }),
        );

        let schedule = desired(&data).unwrap();

        assert_eq!(schedule.message, "Scheduled build");
        assert_eq!(schedule.commit, "HEAD");
        assert_eq!(schedule.branch, "master");
        assert!(schedule.enabled);
        assert_eq!(schedule.env, vec!["A=1", "B=2"]);
        assert_eq!(schedule.pipeline.slug(), "web");
    }

    #[tokio::test]
    async fn test_create_records_composite_id() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/graphql")
            .match_body(operation("GetPipelineId"))
            .with_status(200)
            .with_body(r#"{"data": {"pipeline": {"id": "UGlwZWxpbmUtLS0x"}}}"#)
            .create_async()
            .await;
        let create = server
            .mock("POST", "/graphql")
            .match_body(Matcher::AllOf(vec![
                operation("PipelineScheduleCreate"),
                Matcher::PartialJson(json!({"variables": {"input": {
                    "message": "Scheduled build",
                    "enabled": true,
                    "env": "A=1"
                }}})),
            ]))
            .with_status(200)
            .with_body(
                json!({"data": {"pipelineScheduleCreate": {"pipelineScheduleEdge": {"node": {
                    "id": "UGlwZWxpbmVTY2hlZHVsZS0tLTE=",
                    "uuid": "5c3f",
                    "label": "Nightly",
                    "cronline": "0 0 * * *",
                    "message": "Scheduled build",
                    "commit": "HEAD",
                    "branch": "master",
                    "env": ["A=1"],
                    "enabled": true,
                    "createdAt": "2024-01-01T00:00:00Z",
                    "pipeline": {"id": "UGlwZWxpbmUtLS0x", "slug": "web"}
                }}}}})
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;

        let client = client_for(&server);
        let mut data = state(
            "",
            json!({
                "pipeline_slug": "web",
                "label": "Nightly",
                "cron_schedule": "0 0 * * *",
                "env": {"A": "1"}
            }),
        );
        ResourceType::PipelineSchedule
            .create(&client, &mut data)
            .await
            .unwrap();

        assert_eq!(data.id(), "web/5c3f");
        assert_eq!(data.get_str("schedule_id"), Some("UGlwZWxpbmVTY2hlZHVsZS0tLTE="));
        assert_eq!(data.get("env"), Some(&json!({"A": "1"})));
        create.assert_async().await;
    }

    #[tokio::test]
    async fn test_delete_clears_id() {
        let mut server = mockito::Server::new_async().await;
        server
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

        let client = client_for(&server);
        let mut data = state(
            "web/5c3f",
            json!({"schedule_id": "UGlwZWxpbmVTY2hlZHVsZS0tLTE="}),
        );
        ResourceType::PipelineSchedule
            .delete(&client, &mut data)
            .await
            .unwrap();

        assert_eq!(data.id(), "");
    }
}
