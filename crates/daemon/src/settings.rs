use std::env;

use database::DatabaseConnectionInfo;

/// Everything the daemon needs before it can start a single collector,
/// loaded from environment variables the same way [`DatabaseConnectionInfo`]
/// is (spec §1 "Configuration"): every field is required, so a missing one
/// fails loudly at startup rather than silently falling back to a default.
pub struct Settings {
    pub database: DatabaseConnectionInfo,
    pub nats_url: String,
    pub panel_base_url: String,
    pub aws_base_url: String,
    /// Optional path to a JSON reference-data seed (points, borders,
    /// platform signals, scenery overrides). Reference-data ingestion is out
    /// of scope for this process (spec Non-goals) -- this is just the
    /// bootstrap for whatever the operator already has on hand.
    pub reference_data_path: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("missing or invalid required environment variable: {0}")]
    MissingVar(&'static str),
}

impl Settings {
    pub fn from_env() -> Result<Self, SettingsError> {
        let database = DatabaseConnectionInfo::from_env().ok_or(SettingsError::MissingVar("DATABASE_*"))?;
        let nats_url = env::var("NATS_URL").map_err(|_| SettingsError::MissingVar("NATS_URL"))?;
        let panel_base_url = env::var("PANEL_BASE_URL").map_err(|_| SettingsError::MissingVar("PANEL_BASE_URL"))?;
        let aws_base_url = env::var("AWS_BASE_URL").map_err(|_| SettingsError::MissingVar("AWS_BASE_URL"))?;
        let reference_data_path = env::var("REFERENCE_DATA_PATH").ok();

        Ok(Self {
            database,
            nats_url,
            panel_base_url,
            aws_base_url,
            reference_data_path,
        })
    }
}
