//! JSON shapes of the two upstream API groups (spec §6).

use serde::Deserialize;

/// The uniform `{ success, entries[] }` envelope every panel endpoint uses.
#[derive(Debug, Default, Deserialize)]
pub struct PanelEnvelope<T> {
    pub success: bool,
    #[serde(default, rename = "data")]
    pub entries: Vec<T>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ServerEntry {
    pub id: String,
    pub code: String,
    pub name: String,
    #[serde(default, rename = "isActive")]
    pub is_active: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct TrainEntry {
    pub id: String,
    #[serde(rename = "runId")]
    pub run_id: String,
    #[serde(rename = "trainNoLocal")]
    pub train_no_local: String,
    #[serde(rename = "trainName")]
    pub train_name: String,
    #[serde(rename = "vehicles", default)]
    pub vehicles: Vec<String>,
    #[serde(rename = "trainData")]
    pub train_data: TrainDataEntry,
}

#[derive(Debug, Default, Deserialize)]
pub struct TrainDataEntry {
    pub velocity: f64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(rename = "controlledBySteamID")]
    pub controlled_by_steam_id: Option<String>,
    #[serde(rename = "controlledByXboxID")]
    pub controlled_by_xbox_id: Option<String>,
    #[serde(rename = "signalInFront")]
    pub signal_in_front: Option<String>,
    #[serde(rename = "distanceToSignalInFront")]
    pub distance_to_signal_in_front: Option<f64>,
    #[serde(rename = "signalInFrontSpeed")]
    pub signal_in_front_speed: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PositionEntry {
    #[serde(rename = "runId")]
    pub run_id: String,
    pub velocity: f64,
    #[serde(rename = "latitude")]
    pub lat: f64,
    #[serde(rename = "longitude")]
    pub lon: f64,
}

#[derive(Debug, Default, Deserialize)]
pub struct DispatchPostEntry {
    pub id: String,
    pub name: String,
    #[serde(rename = "difficultyLevel")]
    pub difficulty_level: u8,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(rename = "imageUrl", default)]
    pub image_urls: Vec<String>,
    #[serde(rename = "dispatchedBy", default)]
    pub dispatched_by: Vec<DispatcherEntry>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DispatcherEntry {
    #[serde(rename = "steamId")]
    pub steam_id: Option<String>,
    #[serde(rename = "xboxId")]
    pub xbox_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TimetableEntry {
    #[serde(rename = "pointId")]
    pub point_id: String,
    #[serde(rename = "arrivalTime")]
    pub arrival_time: Option<String>,
    #[serde(rename = "departureTime")]
    pub departure_time: Option<String>,
    #[serde(rename = "stopType")]
    pub stop_type: String,
    pub track: Option<String>,
    pub platform: Option<String>,
    #[serde(rename = "stationCategory")]
    pub station_category: Option<String>,
    #[serde(rename = "trainType")]
    pub train_type: String,
    #[serde(rename = "trainNumber")]
    pub train_number: String,
    #[serde(rename = "maxSpeed")]
    pub max_speed: u32,
}

#[derive(Debug, Default, Deserialize)]
pub struct TrainRunEntry {
    #[serde(rename = "runId")]
    pub run_id: String,
    #[serde(rename = "trainNoLocal")]
    pub train_no_local: String,
    pub timetable: Vec<TimetableEntry>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ServerTimeMillis {
    #[serde(rename = "timestamp")]
    pub epoch_millis: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct ServerTimeOffset {
    #[serde(rename = "utcOffsetHours")]
    pub utc_offset_hours: i32,
}
