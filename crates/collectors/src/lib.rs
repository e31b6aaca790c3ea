pub mod dispatch_posts;
pub mod maintenance;
pub mod realtime_trains;
pub mod server;
pub mod timetable;
pub mod updater_actor;

use std::sync::Arc;

use actors::actor_ref::ActorRef;
use platform::PlatformClient;
use reference::border::BorderPointProvider;
use reference::platform_signal::PlatformSignalProvider;
use reference::point::PointProvider;
use reference::scenery::SceneryProvider;
use upstream::aws::AwsApiClient;
use upstream::panel::PanelApiClient;

use updater_actor::UpdaterActor;

/// Everything every collector needs to reach the outside world: the upstream
/// HTTP clients, the reference-data providers, and the platform client
/// bundling cache/bus/store (spec §4.3, §4.4, §9).
#[derive(Clone)]
pub struct CollectorContext {
    pub platform: PlatformClient,
    pub panel: PanelApiClient,
    pub aws: AwsApiClient,
    pub points: Arc<dyn PointProvider>,
    pub borders: Arc<dyn BorderPointProvider>,
    pub signals: Arc<dyn PlatformSignalProvider>,
    pub scenery: Arc<dyn SceneryProvider>,
    pub updater: ActorRef<UpdaterActor>,
}

impl CollectorContext {
    /// Spawns the realtime-event-updater actor and wires it into a fresh
    /// context. There is exactly one of these per process (spec §9
    /// "single-writer queue").
    pub fn new(
        platform: PlatformClient,
        panel: PanelApiClient,
        aws: AwsApiClient,
        points: Arc<dyn PointProvider>,
        borders: Arc<dyn BorderPointProvider>,
        signals: Arc<dyn PlatformSignalProvider>,
        scenery: Arc<dyn SceneryProvider>,
    ) -> Self {
        let updater = {
            let platform = platform.clone();
            let signals = signals.clone();
            actors::run(move || UpdaterActor::new(platform.clone(), signals.clone()))
        };
        Self {
            platform,
            panel,
            aws,
            points,
            borders,
            signals,
            scenery,
            updater,
        }
    }
}
