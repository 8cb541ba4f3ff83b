//! Resource adapters.
//!
//! Each adapter turns host-managed attributes into a desired entity, runs the
//! matching reconciler, and writes the result back. Attribute names follow
//! the Terraform schema of the `buildkite_*` resources.

mod org_member;
mod pipeline;
mod pipeline_schedule;
mod team;
mod team_member;
mod team_pipeline;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::client::BuildkiteClient;
use crate::error::{BuildkiteError, Result};

/// Host-managed state of one resource instance.
///
/// An empty ID means the resource does not exist (or no longer exists).
pub trait ResourceData {
    fn id(&self) -> &str;

    fn set_id(&mut self, id: String);

    fn get(&self, key: &str) -> Option<&Value>;

    fn set(&mut self, key: &str, value: Value);

    fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    fn get_u32(&self, key: &str) -> Option<u32> {
        self.get(key)
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
    }

    /// String-valued entries of an object attribute; other values are skipped.
    fn get_string_map(&self, key: &str) -> BTreeMap<String, String> {
        self.get(key)
            .and_then(Value::as_object)
            .map(|object| {
                object
                    .iter()
                    .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn get_string_list(&self, key: &str) -> Vec<String> {
        self.get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// JSON-backed [`ResourceData`], as read and written by the CLI.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl ResourceState {
    pub fn new(attributes: Map<String, Value>) -> Self {
        Self {
            id: String::new(),
            attributes,
        }
    }
}

impl ResourceData for ResourceState {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key).filter(|v| !v.is_null())
    }

    fn set(&mut self, key: &str, value: Value) {
        self.attributes.insert(key.to_string(), value);
    }
}

/// The resource types this provider manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Pipeline,
    PipelineSchedule,
    Team,
    TeamMember,
    TeamPipeline,
    OrgMember,
}

impl ResourceType {
    pub const ALL: [ResourceType; 6] = [
        Self::OrgMember,
        Self::Pipeline,
        Self::PipelineSchedule,
        Self::Team,
        Self::TeamMember,
        Self::TeamPipeline,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Pipeline => "buildkite_pipeline",
            Self::PipelineSchedule => "buildkite_pipeline_schedule",
            Self::Team => "buildkite_team",
            Self::TeamMember => "buildkite_team_member",
            Self::TeamPipeline => "buildkite_team_pipeline",
            Self::OrgMember => "buildkite_org_member",
        }
    }

    pub async fn create<D: ResourceData>(
        &self,
        client: &BuildkiteClient,
        data: &mut D,
    ) -> Result<()> {
        match self {
            Self::Pipeline => pipeline::create(client, data).await,
            Self::PipelineSchedule => pipeline_schedule::create(client, data).await,
            Self::Team => team::create(client, data).await,
            Self::TeamMember => team_member::create(client, data).await,
            Self::TeamPipeline => team_pipeline::create(client, data).await,
            Self::OrgMember => org_member::create(client, data).await,
        }
    }

    /// Refreshes `data` from the backend. A resource that no longer exists
    /// gets its ID cleared instead of failing the read.
    pub async fn read<D: ResourceData>(
        &self,
        client: &BuildkiteClient,
        data: &mut D,
    ) -> Result<()> {
        match self {
            Self::Pipeline => pipeline::read(client, data).await,
            Self::PipelineSchedule => pipeline_schedule::read(client, data).await,
            Self::Team => team::read(client, data).await,
            Self::TeamMember => team_member::read(client, data).await,
            Self::TeamPipeline => team_pipeline::read(client, data).await,
            Self::OrgMember => org_member::read(client, data).await,
        }
    }

    pub async fn update<D: ResourceData>(
        &self,
        client: &BuildkiteClient,
        data: &mut D,
    ) -> Result<()> {
        match self {
            Self::Pipeline => pipeline::update(client, data).await,
            Self::PipelineSchedule => pipeline_schedule::update(client, data).await,
            Self::Team => team::update(client, data).await,
            Self::TeamMember => team_member::update(client, data).await,
            Self::TeamPipeline => team_pipeline::update(client, data).await,
            Self::OrgMember => org_member::update(client, data).await,
        }
    }

    pub async fn delete<D: ResourceData>(
        &self,
        client: &BuildkiteClient,
        data: &mut D,
    ) -> Result<()> {
        let deleted = match self {
            Self::Pipeline => pipeline::delete(client, data).await,
            Self::PipelineSchedule => pipeline_schedule::delete(client, data).await,
            Self::Team => team::delete(client, data).await,
            Self::TeamMember => team_member::delete(client, data).await,
            Self::TeamPipeline => team_pipeline::delete(client, data).await,
            Self::OrgMember => org_member::delete(client, data).await,
        };
        deleted?;
        data.set_id(String::new());
        Ok(())
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ResourceType {
    type Err = BuildkiteError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| BuildkiteError::Invalid(format!("unknown resource type {s:?}")))
    }
}

/// Value of a required string attribute.
fn required_str<D: ResourceData>(data: &D, key: &str) -> Result<String> {
    match data.get_str(key) {
        Some(value) if !value.is_empty() => Ok(value.to_string()),
        _ => Err(BuildkiteError::Invalid(format!(
            "missing required attribute {key}"
        ))),
    }
}

/// Value of a string attribute, or its schema default when unset.
fn str_or<D: ResourceData>(data: &D, key: &str, default: &str) -> String {
    data.get_str(key).unwrap_or(default).to_string()
}

/// Parses an enum attribute, falling back to its default when unset.
fn enum_or_default<D, T>(data: &D, key: &str) -> Result<T>
where
    D: ResourceData,
    T: FromStr<Err = BuildkiteError> + Default,
{
    match data.get_str(key) {
        Some(value) => value.parse(),
        None => Ok(T::default()),
    }
}

/// Turns a not-found read into `None` and clears the ID.
fn found<D: ResourceData, T>(data: &mut D, result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => {
            warn!("{} no longer exists, removing it from state: {e}", data.id());
            data.set_id(String::new());
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

fn string_list(items: &[String]) -> Value {
    Value::from(items.to_vec())
}

fn string_map(entries: &BTreeMap<String, String>) -> Value {
    Value::Object(
        entries
            .iter()
            .map(|(k, v)| (k.clone(), Value::from(v.as_str())))
            .collect(),
    )
}
