//! Translation between REST slugs/UUIDs and GraphQL identifiers.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// GraphQL lookups by slug take `<org>/<slug>`.
pub fn org_scoped_slug(org: &str, slug: &str) -> String {
    format!("{org}/{slug}")
}

/// GraphQL global ID of a team, derived from its UUID.
///
/// Neither API looks teams up by UUID; Buildkite's global IDs are
/// `base64("Team---" + uuid)`, so the ID is built the same way here.
pub fn team_node_id(uuid: &str) -> String {
    STANDARD.encode(format!("Team---{uuid}"))
}

/// Splits a schedule key of the form `<pipeline slug>/<schedule uuid>`.
pub fn split_schedule_key(key: &str) -> Option<(&str, &str)> {
    let (pipeline, uuid) = key.split_once('/')?;
    if pipeline.is_empty() || uuid.is_empty() || uuid.contains('/') {
        return None;
    }
    Some((pipeline, uuid))
}
