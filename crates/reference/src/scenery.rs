/// Maps a server code to its scenery tag, falling back to a fixed default
/// when the server is unrecognized (spec §4.5a).
pub trait SceneryProvider: Send + Sync {
    fn scenery_for(&self, server_code: &str) -> String;
}

pub struct FixedSceneryProvider {
    default_scenery: String,
    overrides: std::collections::HashMap<String, String>,
}

impl FixedSceneryProvider {
    pub fn new(default_scenery: impl Into<String>) -> Self {
        Self {
            default_scenery: default_scenery.into(),
            overrides: std::collections::HashMap::new(),
        }
    }

    pub fn with_override(mut self, server_code: impl Into<String>, scenery: impl Into<String>) -> Self {
        self.overrides.insert(server_code.into(), scenery.into());
        self
    }
}

impl SceneryProvider for FixedSceneryProvider {
    fn scenery_for(&self, server_code: &str) -> String {
        self.overrides
            .get(server_code)
            .cloned()
            .unwrap_or_else(|| self.default_scenery.clone())
    }
}
