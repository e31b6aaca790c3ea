use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::ServerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Region {
    Asia,
    Europe,
    UsNorth,
}

/// A SimRail server as mirrored by the server collector (spec §3, §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    pub id: ServerId,
    pub upstream_id: String,
    pub code: String,
    pub region: Region,
    /// Absent for servers whose name does not encode a spoken language.
    pub language: Option<String>,
    pub tags: Vec<String>,
    pub online: bool,
    pub scenery: String,
    pub utc_offset_seconds: i32,
    /// Decoded from the upstream object id's embedded timestamp.
    pub registered_at: DateTime<Utc>,
    pub deleted: bool,
}
