use std::collections::BTreeMap;
use std::fmt;

use indexmap::IndexMap;
use log::{debug, info, trace};
use serde::{Deserialize, Serialize};

use super::core::BuildkiteClient;
use super::graphql::graphql_operation;
use super::ids::{org_scoped_slug, team_node_id};
use super::team_pipeline::TeamPipelineAccessLevel;
use super::types::{null_as_default, Node};
use crate::error::{BuildkiteError, Result, ResultExt};

/// A Buildkite pipeline as returned by the REST API.
///
/// A pipeline is configured either through `steps` or through a YAML
/// `configuration`, never both. `team_uuids` is only honoured on create;
/// later changes go through team pipelines.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub slug: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub repository: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub default_branch: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub branch_configuration: String,
    #[serde(rename = "env", default, deserialize_with = "null_as_default")]
    pub environment: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub steps: Vec<Step>,
    /// YAML pipeline definition; only writable through GraphQL
    #[serde(default, deserialize_with = "null_as_default")]
    pub configuration: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub provider: RepositoryProvider,
    /// Provider settings to send on create/update; the API echoes them back
    /// under `provider.settings`
    #[serde(default, deserialize_with = "null_as_default")]
    pub provider_settings: IndexMap<String, serde_json::Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub team_uuids: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub web_url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub builds_url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub badge_url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub created_at: String,
}

/// A legacy build step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Step {
    #[serde(rename = "type")]
    pub step_type: String,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub name: String,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub command: String,
    #[serde(rename = "env", default, deserialize_with = "null_as_default")]
    pub environment: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_in_minutes: Option<u32>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub agent_query_rules: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub branch_configuration: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub artifact_paths: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallelism: Option<u32>,
}

/// Source control integration of a pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepositoryProvider {
    /// `github`, `bitbucket`, `gitlab`, `beanstalk`, ...
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub settings: IndexMap<String, serde_json::Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub webhook_url: String,
}

/// REST request body for pipeline create and update.
#[derive(Debug, Serialize)]
struct PipelineBody {
    name: String,
    repository: String,
    description: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    default_branch: String,
    branch_configuration: String,
    env: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    steps: Vec<Step>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    provider_settings: IndexMap<String, serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    team_uuids: Option<Vec<String>>,
}

impl PipelineBody {
    fn for_create(pipeline: &Pipeline) -> Self {
        let mut body = Self::for_update(pipeline);
        if !pipeline.team_uuids.is_empty() {
            body.team_uuids = Some(pipeline.team_uuids.clone());
        }
        body
    }

    /// Teams are never sent on update.
    fn for_update(pipeline: &Pipeline) -> Self {
        Self {
            name: pipeline.name.clone(),
            repository: pipeline.repository.clone(),
            description: pipeline.description.clone(),
            default_branch: pipeline.default_branch.clone(),
            branch_configuration: pipeline.branch_configuration.clone(),
            env: pipeline.environment.clone(),
            steps: pipeline.steps.clone(),
            provider_settings: pipeline.provider_settings.clone(),
            team_uuids: None,
        }
    }
}

/// How a pipeline gets created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreatePlan {
    /// One REST POST carrying the legacy steps.
    NoConfig,
    /// GraphQL create carrying the YAML, REST PATCH, then the YAML written
    /// again through GraphQL.
    YamlConfig,
}

impl CreatePlan {
    pub fn for_pipeline(pipeline: &Pipeline) -> Result<Self> {
        if pipeline.configuration.is_empty() {
            return Ok(Self::NoConfig);
        }

        if !pipeline.steps.is_empty() {
            return Err(BuildkiteError::Invalid(format!(
                "pipeline {} sets both configuration and steps",
                pipeline.name
            )));
        }

        serde_yaml::from_str::<serde_yaml::Value>(&pipeline.configuration).map_err(|e| {
            BuildkiteError::Invalid(format!(
                "pipeline {} configuration is not valid YAML: {e}",
                pipeline.name
            ))
        })?;

        Ok(Self::YamlConfig)
    }
}

/// Phases of a YAML pipeline create, named in errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreatePhase {
    Create,
    Patch,
    SetYaml,
}

impl fmt::Display for CreatePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Create => "create",
            Self::Patch => "patch",
            Self::SetYaml => "set yaml",
        };
        f.write_str(name)
    }
}

#[derive(Serialize)]
pub(crate) struct YamlSteps {
    yaml: String,
}

#[derive(Serialize)]
pub(crate) struct RepositoryInput {
    url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TeamAccessInput {
    id: String,
    access_level: TeamPipelineAccessLevel,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PipelineCreateInput {
    organization_id: String,
    name: String,
    repository: RepositoryInput,
    steps: YamlSteps,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    teams: Vec<TeamAccessInput>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PipelineCreateVariables {
    pipeline_create_input: PipelineCreateInput,
}

#[derive(Deserialize)]
pub(crate) struct SlugOnly {
    slug: String,
}

#[derive(Deserialize)]
pub(crate) struct PipelineCreatePayload {
    pipeline: SlugOnly,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PipelineCreateData {
    pipeline_create: Option<PipelineCreatePayload>,
}

graphql_operation!(
    PipelineCreate,
    r#"
mutation PipelineCreate($pipelineCreateInput: PipelineCreateInput!) {
  pipelineCreate(input: $pipelineCreateInput) {
    pipeline {
      slug
    }
  }
}"#,
    PipelineCreateVariables => PipelineCreateData
);

#[derive(Serialize)]
pub(crate) struct PipelineUpdateInput {
    id: String,
    steps: YamlSteps,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PipelineUpdateVariables {
    pipeline_update_input: PipelineUpdateInput,
}

#[derive(Deserialize)]
pub(crate) struct StepsYaml {
    #[allow(dead_code)]
    yaml: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct PipelineSteps {
    #[allow(dead_code)]
    steps: Option<StepsYaml>,
}

#[derive(Deserialize)]
pub(crate) struct PipelineUpdatePayload {
    #[allow(dead_code)]
    pipeline: PipelineSteps,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PipelineUpdateData {
    pipeline_update: Option<PipelineUpdatePayload>,
}

graphql_operation!(
    PipelineUpdate,
    r#"
mutation PipelineUpdate($pipelineUpdateInput: PipelineUpdateInput!) {
  pipelineUpdate(input: $pipelineUpdateInput) {
    pipeline {
      steps {
        yaml
      }
    }
  }
}"#,
    PipelineUpdateVariables => PipelineUpdateData
);

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PipelineSlugVariables {
    pipeline_slug: String,
}

#[derive(Deserialize)]
pub(crate) struct PipelineIdData {
    pipeline: Option<Node>,
}

graphql_operation!(
    GetPipelineId,
    r#"
query GetPipelineId($pipelineSlug: ID!) {
  pipeline(slug: $pipelineSlug) {
    id
  }
}"#,
    PipelineSlugVariables => PipelineIdData
);

#[derive(Deserialize)]
pub(crate) struct TeamUuid {
    uuid: String,
}

#[derive(Deserialize)]
pub(crate) struct TeamEdgeNode {
    team: TeamUuid,
}

#[derive(Deserialize)]
pub(crate) struct TeamEdge {
    node: TeamEdgeNode,
}

#[derive(Deserialize)]
pub(crate) struct TeamConnection {
    #[serde(default)]
    edges: Vec<TeamEdge>,
}

#[derive(Deserialize)]
pub(crate) struct PipelineWithTeams {
    teams: Option<TeamConnection>,
}

#[derive(Deserialize)]
pub(crate) struct PipelineTeamsData {
    pipeline: Option<PipelineWithTeams>,
}

graphql_operation!(
    PipelineTeams,
    r#"
query PipelineTeams($pipelineSlug: ID!) {
  pipeline(slug: $pipelineSlug) {
    teams(first: 100) {
      edges {
        node {
          team {
            uuid
          }
        }
      }
    }
  }
}"#,
    PipelineSlugVariables => PipelineTeamsData
);

impl BuildkiteClient {
    /// Reads a pipeline over REST and merges in its owning teams from GraphQL.
    pub async fn get_pipeline(&self, slug: &str) -> Result<Pipeline> {
        let path = self.pipelines_path(Some(slug));

        // REST decides whether the pipeline exists, so its error wins.
        let (pipeline, team_uuids) =
            futures::join!(self.get::<Pipeline>(&path), self.pipeline_team_uuids(slug));
        let mut pipeline = pipeline.with_context(|| format!("failed to get pipeline {slug}"))?;
        let team_uuids =
            team_uuids.with_context(|| format!("failed to get teams of pipeline {slug}"))?;

        if !pipeline.configuration.is_empty() {
            pipeline.steps.clear();
            pipeline.environment.clear();
        }

        pipeline.team_uuids = team_uuids;
        Ok(pipeline)
    }

    /// Creates a pipeline from its desired state.
    ///
    /// # Errors
    ///
    /// Returns [`BuildkiteError::Invalid`] before any request when the pipeline
    /// sets both `configuration` and `steps`, or when the YAML does not parse.
    pub async fn create_pipeline(&self, desired: &Pipeline) -> Result<Pipeline> {
        match CreatePlan::for_pipeline(desired)? {
            CreatePlan::NoConfig => {
                let path = self.pipelines_path(None);
                let mut created: Pipeline = self
                    .post(&path, &PipelineBody::for_create(desired))
                    .await
                    .with_context(|| format!("failed to create pipeline {}", desired.name))?;

                info!("Created pipeline {}", created.slug);
                created.team_uuids = desired.team_uuids.clone();
                Ok(created)
            }
            CreatePlan::YamlConfig => self.create_yaml_pipeline(desired).await,
        }
    }

    /// Three-phase create for YAML pipelines. Nothing is rolled back: a
    /// failure after the first phase leaves the new pipeline in place, and
    /// the error names the phase and slug.
    async fn create_yaml_pipeline(&self, desired: &Pipeline) -> Result<Pipeline> {
        let slug = self
            .create_graphql_pipeline(desired)
            .await
            .map_err(|e| phase_error(e, CreatePhase::Create, &desired.name))?;
        info!("Created pipeline {slug} from YAML");

        let path = self.pipelines_path(Some(&slug));
        let mut result: Pipeline = self
            .patch(&path, &PipelineBody::for_update(desired))
            .await
            .map_err(|e| phase_error(e, CreatePhase::Patch, &slug))?;

        self.save_pipeline_yaml(&slug, &desired.configuration)
            .await
            .map_err(|e| phase_error(e, CreatePhase::SetYaml, &slug))?;

        result.configuration = desired.configuration.clone();
        result.steps.clear();
        result.environment.clear();
        result.team_uuids = desired.team_uuids.clone();
        Ok(result)
    }

    /// Creates the pipeline with its real YAML, so a failure in a later phase
    /// never leaves it running placeholder steps.
    async fn create_graphql_pipeline(&self, desired: &Pipeline) -> Result<String> {
        let organization_id = self.organization_id(&self.org_slug).await?;

        // Initial owners get full access; later changes go through team pipelines.
        let teams = desired
            .team_uuids
            .iter()
            .map(|uuid| TeamAccessInput {
                id: team_node_id(uuid),
                access_level: TeamPipelineAccessLevel::ManageBuildAndRead,
            })
            .collect();

        let variables = PipelineCreateVariables {
            pipeline_create_input: PipelineCreateInput {
                organization_id,
                name: desired.name.clone(),
                repository: RepositoryInput {
                    url: desired.repository.clone(),
                },
                steps: YamlSteps {
                    yaml: desired.configuration.clone(),
                },
                teams,
            },
        };

        let data = self.graphql::<PipelineCreate>(variables).await?;
        data.pipeline_create
            .map(|payload| payload.pipeline.slug)
            .ok_or(BuildkiteError::NoResponseData("PipelineCreate"))
    }

    /// Updates a pipeline over REST, then its YAML steps over GraphQL.
    ///
    /// Owning teams are not sent; the desired `team_uuids` are carried into
    /// the result because REST does not report them.
    pub async fn update_pipeline(&self, desired: &Pipeline) -> Result<Pipeline> {
        CreatePlan::for_pipeline(desired)?;

        let path = self.pipelines_path(Some(&desired.slug));
        let mut result: Pipeline = self
            .patch(&path, &PipelineBody::for_update(desired))
            .await
            .with_context(|| format!("failed to update pipeline {}", desired.slug))?;

        if !desired.configuration.is_empty() {
            self.save_pipeline_yaml(&desired.slug, &desired.configuration)
                .await
                .with_context(|| format!("failed to update pipeline {} steps", desired.slug))?;
            result.configuration = desired.configuration.clone();
            result.steps.clear();
            result.environment.clear();
        }

        result.team_uuids = desired.team_uuids.clone();
        Ok(result)
    }

    /// Deletes a pipeline by slug.
    pub async fn delete_pipeline(&self, slug: &str) -> Result<()> {
        self.delete(&self.pipelines_path(Some(slug)))
            .await
            .with_context(|| format!("failed to delete pipeline {slug}"))
    }

    /// GraphQL ID of a pipeline, looked up by slug.
    pub async fn pipeline_node_id(&self, slug: &str) -> Result<String> {
        let data = self
            .graphql::<GetPipelineId>(PipelineSlugVariables {
                pipeline_slug: org_scoped_slug(&self.org_slug, slug),
            })
            .await
            .with_context(|| format!("failed to get GraphQL node id for {slug}"))?;

        data.pipeline
            .map(|node| node.id)
            .ok_or_else(|| BuildkiteError::NotFound(format!("pipeline {slug}")))
    }

    async fn save_pipeline_yaml(&self, slug: &str, yaml: &str) -> Result<()> {
        let id = self.pipeline_node_id(slug).await?;
        debug!("Setting YAML steps of pipeline {slug} ({id})");

        let data = self
            .graphql::<PipelineUpdate>(PipelineUpdateVariables {
                pipeline_update_input: PipelineUpdateInput {
                    id,
                    steps: YamlSteps {
                        yaml: yaml.to_string(),
                    },
                },
            })
            .await?;

        data.pipeline_update
            .map(|_| ())
            .ok_or(BuildkiteError::NoResponseData("PipelineUpdate"))
    }

    async fn pipeline_team_uuids(&self, slug: &str) -> Result<Vec<String>> {
        let data = self
            .graphql::<PipelineTeams>(PipelineSlugVariables {
                pipeline_slug: org_scoped_slug(&self.org_slug, slug),
            })
            .await?;

        let uuids: Vec<String> = data
            .pipeline
            .and_then(|pipeline| pipeline.teams)
            .map(|teams| teams.edges)
            .unwrap_or_default()
            .into_iter()
            .map(|edge| edge.node.team.uuid)
            .collect();

        trace!("Pipeline {slug} team uuids: {uuids:?}");
        Ok(uuids)
    }
}

fn phase_error(error: BuildkiteError, phase: CreatePhase, pipeline: &str) -> BuildkiteError {
    error.context(format!("pipeline create failed at {phase} phase for {pipeline}"))
}
