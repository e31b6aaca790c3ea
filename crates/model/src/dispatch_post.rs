use serde::{Deserialize, Serialize};

use crate::ids::{DispatchPostId, ServerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserPlatform {
    Steam,
    Xbox,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatcherUser {
    pub platform: UserPlatform,
    pub platform_id: String,
}

/// A dispatch post reconciled by the dispatch post collector (spec §3, §4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchPost {
    pub id: DispatchPostId,
    pub upstream_id: String,
    pub server_id: ServerId,
    pub name: String,
    pub difficulty_level: u8,
    pub lat: f64,
    pub lon: f64,
    pub point_id: Option<String>,
    pub image_urls: Vec<String>,
    pub dispatcher: Option<DispatcherUser>,
    /// Tombstoned rather than removed outright (spec §3 invariant).
    pub deleted: bool,
}

/// Corrected position for the one upstream post with known-bad coordinates
/// (spec §4.9). Kept as a named constant so it's easy to drop once the
/// upstream data is fixed.
pub const POSITION_OVERRIDE_UPSTREAM_ID: &str = "675330d44337b38ac4027545";
pub const POSITION_OVERRIDE: (f64, f64) = (50.06773, 19.94498);
