use std::collections::HashMap;

use serde::Deserialize;

use reference::border::{BorderPoint, InMemoryBorderPointProvider};
use reference::platform_signal::{InMemoryPlatformSignalProvider, PlatformSignalInfo};
use reference::point::{InMemoryPointProvider, Point};
use reference::scenery::FixedSceneryProvider;
use utility::geo::BoundingBox;

/// On-disk shape of the reference-data seed file. Reference-data ingestion
/// itself is out of scope (spec Non-goals) -- this only covers loading a
/// pre-built seed into the in-memory providers the collectors read from.
#[derive(Deserialize)]
struct ReferenceDataSeed {
    points: Vec<PointSeed>,
    #[serde(default)]
    borders: Vec<BorderSeed>,
    #[serde(default)]
    signals: Vec<SignalSeed>,
    default_scenery: String,
    #[serde(default)]
    scenery_overrides: HashMap<String, String>,
}

#[derive(Deserialize)]
struct PointSeed {
    id: String,
    name: String,
    #[serde(default)]
    sim_rail_point_ids: Vec<String>,
    lat: f64,
    lon: f64,
    radius_km: f64,
    #[serde(default)]
    has_schedulable_prefix: bool,
}

#[derive(Deserialize)]
struct BorderSeed {
    point_id: String,
    #[serde(default)]
    required_next_point_ids: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct SignalSeed {
    point_id: String,
    signal_name: String,
    track: String,
    platform: String,
}

pub struct ReferenceData {
    pub points: InMemoryPointProvider,
    pub borders: InMemoryBorderPointProvider,
    pub signals: InMemoryPlatformSignalProvider,
    pub scenery: FixedSceneryProvider,
}

impl ReferenceData {
    fn empty() -> Self {
        Self {
            points: InMemoryPointProvider::new(Vec::new()),
            borders: InMemoryBorderPointProvider::new(Vec::new()),
            signals: InMemoryPlatformSignalProvider::new(Vec::new()),
            scenery: FixedSceneryProvider::new("default"),
        }
    }

    /// Loads the seed file at `path`, if given; falls back to empty
    /// providers (and a warning) otherwise, since the daemon can still run
    /// -- it just won't resolve any point/border/signal lookups.
    pub async fn load(path: Option<&str>) -> Self {
        let Some(path) = path else {
            tracing::warn!("no REFERENCE_DATA_PATH set, starting with empty reference providers");
            return Self::empty();
        };

        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(why) => {
                tracing::error!(error = %why, path, "failed reading reference data seed, starting empty");
                return Self::empty();
            }
        };

        let seed: ReferenceDataSeed = match serde_json::from_str(&raw) {
            Ok(seed) => seed,
            Err(why) => {
                tracing::error!(error = %why, path, "failed parsing reference data seed, starting empty");
                return Self::empty();
            }
        };

        let points = seed
            .points
            .into_iter()
            .map(|p| Point {
                id: p.id,
                name: p.name,
                sim_rail_point_ids: p.sim_rail_point_ids,
                bounds: BoundingBox::around(p.lat, p.lon, p.radius_km),
                has_schedulable_prefix: p.has_schedulable_prefix,
            })
            .collect();

        let borders = seed
            .borders
            .into_iter()
            .map(|b| BorderPoint {
                point_id: b.point_id,
                required_next_point_ids: b.required_next_point_ids,
            })
            .collect();

        let signals = seed
            .signals
            .into_iter()
            .map(|s| {
                (
                    s.point_id,
                    s.signal_name,
                    PlatformSignalInfo {
                        track: s.track,
                        platform: s.platform,
                    },
                )
            })
            .collect();

        let scenery = seed
            .scenery_overrides
            .into_iter()
            .fold(FixedSceneryProvider::new(seed.default_scenery), |provider, (code, scenery)| {
                provider.with_override(code, scenery)
            });

        Self {
            points: InMemoryPointProvider::new(points),
            borders: InMemoryBorderPointProvider::new(borders),
            signals: InMemoryPlatformSignalProvider::new(signals),
            scenery,
        }
    }
}
