//! Endpoint dispatch for the dashboard contract. Transport-agnostic: a
//! web layer (or the CLI) passes a path and JSON body and gets back a
//! status code with a JSON body.

use crate::actions::Orchestrator;
use crate::collectors::{btrfs, diskstats, lsblk, raid, snapper};
use crate::config::ActionsConfig;
use crate::error::ActionError;
use crate::exec::Executor;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Everything a request needs. Shared by reference across concurrent
/// requests; holds no mutable state.
pub struct Context<'a> {
    pub exec:    &'a dyn Executor,
    pub actions: &'a ActionsConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body:   Value,
}

impl ApiResponse {
    fn ok(body: Value) -> Self { Self { status: 200, body } }

    fn message(msg: String) -> Self { Self::ok(json!({ "message": msg })) }

    fn error(status: u16, msg: impl Into<String>) -> Self {
        Self { status, body: json!({ "error": msg.into() }) }
    }

    pub fn is_success(&self) -> bool { (200..300).contains(&self.status) }
}

impl From<ActionError> for ApiResponse {
    fn from(e: ActionError) -> Self {
        ApiResponse::error(e.status(), e.to_string())
    }
}

pub const READ_ENDPOINTS: [&str; 5] = ["/api/btrfs", "/api/devices", "/api/raid", "/api/snapshots", "/api/io"];

pub fn get(ctx: &Context, path: &str) -> ApiResponse {
    tracing::debug!(path, "GET");
    match path {
        "/api/btrfs"     => list(btrfs::read_filesystems(ctx.exec)),
        "/api/devices"   => list(lsblk::read_devices(ctx.exec)),
        "/api/raid"      => list(raid::read_profiles(ctx.exec)),
        "/api/snapshots" => list(snapper::read_snapshots(ctx.exec)),
        "/api/io"        => list(diskstats::read_io_stats()),
        _                => ApiResponse::error(404, format!("unknown endpoint {path}")),
    }
}

fn list<T: Serialize>(items: Vec<T>) -> ApiResponse {
    match serde_json::to_value(items) {
        Ok(v)  => ApiResponse::ok(v),
        Err(e) => ApiResponse::error(500, e.to_string()),
    }
}

// ── Write endpoints ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct MountRequest {
    pub uuid: String,
}

#[derive(Debug, Deserialize)]
pub struct AddDeviceRequest {
    pub device:  String,
    pub fs_uuid: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangeRaidRequest {
    /// Mount point of the filesystem to convert.
    pub filesystem: String,
    pub profile:    String,
}

#[derive(Debug, Deserialize)]
pub struct CreateFilesystemRequest {
    pub device: String,
    #[serde(default)]
    pub label:  Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSnapshotRequest {
    pub config:      String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteSnapshotRequest {
    pub config: String,
    pub id:     SnapshotId,
}

/// Snapshot ids arrive as strings or numbers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SnapshotId {
    Number(u64),
    Text(String),
}

impl SnapshotId {
    fn into_string(self) -> String {
        match self {
            SnapshotId::Number(n) => n.to_string(),
            SnapshotId::Text(s)   => s,
        }
    }
}

pub fn post(ctx: &Context, path: &str, body: &Value) -> ApiResponse {
    tracing::debug!(path, "POST");
    let o = Orchestrator::new(ctx.exec, ctx.actions);
    let result = match path {
        "/api/mount" => parse::<MountRequest>(body).map(|r| o.mount(&r.uuid)),
        "/api/umount" => parse::<MountRequest>(body).map(|r| o.unmount(&r.uuid)),
        "/api/add-device" => {
            parse::<AddDeviceRequest>(body).map(|r| o.add_device(&r.device, &r.fs_uuid))
        }
        "/api/change-raid" => {
            parse::<ChangeRaidRequest>(body).map(|r| o.change_raid(&r.filesystem, &r.profile))
        }
        "/api/create-btrfs" => {
            parse::<CreateFilesystemRequest>(body).map(|r| o.create_filesystem(&r.device, r.label.as_deref()))
        }
        "/api/create-snapshot" => {
            parse::<CreateSnapshotRequest>(body).map(|r| o.create_snapshot(&r.config, r.description.as_deref()))
        }
        "/api/delete-snapshot" => {
            parse::<DeleteSnapshotRequest>(body).map(|r| o.delete_snapshot(&r.config, &r.id.into_string()))
        }
        _ => return ApiResponse::error(404, format!("unknown endpoint {path}")),
    };

    match result {
        Ok(Ok(msg)) => ApiResponse::message(msg),
        Ok(Err(e))  => e.into(),
        Err(bad)    => bad,
    }
}

fn parse<T: DeserializeOwned>(body: &Value) -> Result<T, ApiResponse> {
    T::deserialize(body).map_err(|e| ApiResponse::error(400, format!("invalid request body: {e}")))
}
