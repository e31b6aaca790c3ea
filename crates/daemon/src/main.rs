mod bootstrap;
mod settings;

use std::sync::Arc;

use database::PgStore;
use eventbus::EventBus;
use platform::PlatformClient;
use upstream::aws::AwsApiClient;
use upstream::panel::PanelApiClient;

use bootstrap::ReferenceData;
use collectors::dispatch_posts::{DispatchPostCollector, DispatchPostCollectorState};
use collectors::maintenance::{CancellationCollector, DatabaseCleanupCollector, DatabaseCleanupState};
use collectors::realtime_trains::{RealtimeTrainsCollector, RealtimeTrainsState};
use collectors::server::{ServerCollector, ServerCollectorState};
use collectors::timetable::{TimetableCollector, TimetableCollectorState};
use collectors::CollectorContext;
use settings::Settings;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let settings = Settings::from_env().expect("invalid daemon configuration");

    let db = PgStore::connect(settings.database)
        .await
        .expect("could not connect to database");
    let bus = EventBus::connect(&settings.nats_url)
        .await
        .expect("could not connect to event bus");

    let platform = PlatformClient::new(db, bus);
    tracing::info!("rehydrating snapshot caches from durable store");
    platform.rehydrate().await;

    let reference = ReferenceData::load(settings.reference_data_path.as_deref()).await;

    let panel = PanelApiClient::new(settings.panel_base_url);
    let aws = AwsApiClient::new(settings.aws_base_url);

    let context = CollectorContext::new(
        platform,
        panel,
        aws,
        Arc::new(reference.points),
        Arc::new(reference.borders),
        Arc::new(reference.signals),
        Arc::new(reference.scenery),
    );

    platform::collector::run::<ServerCollector, _>(|| ServerCollector, context.clone(), ServerCollectorState::default());
    platform::collector::run::<TimetableCollector, _>(|| TimetableCollector, context.clone(), TimetableCollectorState::default());
    platform::collector::run::<RealtimeTrainsCollector, _>(
        RealtimeTrainsCollector::new,
        context.clone(),
        RealtimeTrainsState::default(),
    );
    platform::collector::run::<DispatchPostCollector, _>(
        || DispatchPostCollector,
        context.clone(),
        DispatchPostCollectorState::default(),
    );
    platform::collector::run::<CancellationCollector, _>(|| CancellationCollector, context.clone(), ());
    platform::collector::run::<DatabaseCleanupCollector, _>(
        DatabaseCleanupCollector::new,
        context.clone(),
        DatabaseCleanupState::default(),
    );

    tracing::info!("all collectors started, awaiting shutdown signal");
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received, exiting");
}
