/// The track/platform a given signal at a given point sits on (spec §4.4,
/// §4.8.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformSignalInfo {
    pub track: String,
    pub platform: String,
}

#[async_trait::async_trait]
pub trait PlatformSignalProvider: Send + Sync {
    async fn lookup(&self, point_id: &str, signal_name: &str) -> Option<PlatformSignalInfo>;
}

pub struct InMemoryPlatformSignalProvider {
    entries: std::collections::HashMap<(String, String), PlatformSignalInfo>,
}

impl InMemoryPlatformSignalProvider {
    pub fn new(entries: Vec<(String, String, PlatformSignalInfo)>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|(point, signal, info)| ((point, signal), info))
                .collect(),
        }
    }
}

#[async_trait::async_trait]
impl PlatformSignalProvider for InMemoryPlatformSignalProvider {
    async fn lookup(&self, point_id: &str, signal_name: &str) -> Option<PlatformSignalInfo> {
        self.entries
            .get(&(point_id.to_string(), signal_name.to_string()))
            .cloned()
    }
}
