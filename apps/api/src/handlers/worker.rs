use axum::Json;
use axum::extract::{Extension, State};
use axum::http::StatusCode;

use nodeconductor_application::WorkerHeartbeatInput;
use nodeconductor_domain::TaskName;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::middleware::WorkerIdentity;
use crate::state::AppState;

mod claim;
mod heartbeat;


pub use claim::claim_tasks_handler;
pub use heartbeat::worker_heartbeat_handler;
