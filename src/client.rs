//! Buildkite API client.
//!
//! The REST API covers pipelines; everything else (teams, members, schedules,
//! team access) only exists in GraphQL, so most resources live there.

pub mod core;
pub mod graphql;
pub mod ids;
pub mod org_member;
pub mod organization;
pub mod pipeline;
pub mod pipeline_schedule;
pub mod rest;
pub mod team;
pub mod team_member;
pub mod team_pipeline;
pub mod transport;
pub mod types;

pub use self::core::{BuildkiteClient, ClientConfig};
pub use org_member::{OrganizationMember, OrganizationMemberRole, User};
pub use pipeline::{Pipeline, RepositoryProvider, Step};
pub use pipeline_schedule::{env_list_to_map, env_map_to_list, PipelineSchedule};
pub use team::{Team, TeamPrivacy};
pub use team_member::{TeamMember, TeamMemberRole};
pub use team_pipeline::{TeamPipeline, TeamPipelineAccessLevel};
pub use types::Node;
