use std::sync::Arc;
use std::time::Duration;

use cache::{SnapshotBackingStore, SnapshotCache};
use chrono::Utc;
use database::PgStore;
use eventbus::EventBus;
use model::dispatch_post::DispatchPost;
use model::ids::{JourneyId, ServerId};
use model::server::Server;
use model::snapshot::{
    dispatch_post_frame_id, FrameId, RemovalFrame, SnapshotFrame, SnapshotPayload,
};

use crate::{PlatformError, PlatformResult};

const SERVER_TTL: Duration = Duration::from_secs(12 * 3600);
const DISPATCH_POST_TTL: Duration = Duration::from_secs(12 * 3600);
const JOURNEY_TTL: Duration = Duration::from_secs(6 * 3600);

/// Bundles the durable store, event bus and the three per-entity-kind
/// snapshot caches collectors write through. Every write follows the same
/// order: persist, then cache, then publish (spec §4.1, §9).
#[derive(Clone)]
pub struct PlatformClient {
    pub db: Arc<PgStore>,
    pub bus: EventBus,
    pub servers: Arc<SnapshotCache>,
    pub journeys: Arc<SnapshotCache>,
    pub dispatch_posts: Arc<SnapshotCache>,
}

impl PlatformClient {
    pub fn new(db: PgStore, bus: EventBus) -> Self {
        Self {
            db: Arc::new(db),
            bus,
            servers: Arc::new(SnapshotCache::new(SERVER_TTL)),
            journeys: Arc::new(SnapshotCache::new(JOURNEY_TTL)),
            dispatch_posts: Arc::new(SnapshotCache::new(DISPATCH_POST_TTL)),
        }
    }

    /// Rehydrates all three caches from the durable store. Must run to
    /// completion before the event bus is subscribed to (spec §9).
    pub async fn rehydrate(&self) {
        for frame in self.db.load_all().await {
            match &frame.payload {
                SnapshotPayload::Server(_) => self.servers.set(frame),
                SnapshotPayload::DispatchPost(_) => self.dispatch_posts.set(frame),
                SnapshotPayload::Journey(_) => self.journeys.set(frame),
            }
        }
    }

    fn server_frame(server: &Server) -> SnapshotFrame {
        SnapshotFrame {
            id: FrameId {
                primary: server.id.raw().to_string(),
                server_id: Some(server.id),
                secondary: server.upstream_id.clone(),
            },
            base_timestamp: Utc::now(),
            payload: SnapshotPayload::Server(Box::new(server.clone())),
        }
    }

    pub async fn publish_server_update(&self, server: &Server) -> PlatformResult<()> {
        self.db.upsert_server(server).await?;
        let frame = Self::server_frame(server);
        self.servers.set(frame.clone());
        self.bus
            .publish_update(eventbus::subject::server_subject(server.id), &frame)
            .await?;
        Ok(())
    }

    pub async fn publish_server_removal(&self, server: &Server) -> PlatformResult<()> {
        let frame_id = Self::server_frame(server).id;
        self.servers.remove_by_primary(&frame_id.primary);
        let removal = RemovalFrame {
            id: frame_id,
            base_timestamp: Utc::now(),
        };
        self.bus
            .publish_removal(eventbus::subject::server_subject(server.id), &removal)
            .await?;
        Ok(())
    }

    fn dispatch_post_frame(post: &DispatchPost) -> SnapshotFrame {
        SnapshotFrame {
            id: dispatch_post_frame_id(post.id, post.server_id, &post.upstream_id),
            base_timestamp: Utc::now(),
            payload: SnapshotPayload::DispatchPost(Box::new(post.clone())),
        }
    }

    pub async fn publish_dispatch_post_update(&self, post: &DispatchPost) -> PlatformResult<()> {
        self.db.upsert_dispatch_post(post).await?;
        let frame = Self::dispatch_post_frame(post);
        self.dispatch_posts.set(frame.clone());
        self.bus
            .publish_update(
                eventbus::subject::dispatch_post_subject(post.server_id, post.id),
                &frame,
            )
            .await?;
        Ok(())
    }

    pub async fn publish_dispatch_post_removal(&self, post: &DispatchPost) -> PlatformResult<()> {
        let frame_id = Self::dispatch_post_frame(post).id;
        self.dispatch_posts.remove_by_primary(&frame_id.primary);
        let removal = RemovalFrame {
            id: frame_id,
            base_timestamp: Utc::now(),
        };
        self.bus
            .publish_removal(
                eventbus::subject::dispatch_post_subject(post.server_id, post.id),
                &removal,
            )
            .await?;
        Ok(())
    }

    /// Journeys are never persisted as a standing "current state" row --
    /// only the event list is durable (spec §9). The cache is the only
    /// place a journey's live speed/position lives.
    pub async fn publish_journey_update(&self, frame: SnapshotFrame) -> PlatformResult<()> {
        let subject = match &frame.payload {
            SnapshotPayload::Journey(data) => {
                eventbus::subject::journey_subject(data.server_id, data.journey_id)
            }
            _ => return Err(PlatformError::NotFound),
        };
        self.journeys.set(frame.clone());
        self.bus.publish_update(subject, &frame).await?;
        Ok(())
    }

    pub async fn publish_journey_removal(
        &self,
        primary_key: &str,
        server_id: ServerId,
        journey_id: JourneyId,
    ) -> PlatformResult<()> {
        self.journeys.remove_by_primary(primary_key);
        let removal = RemovalFrame {
            id: FrameId {
                primary: primary_key.to_string(),
                server_id: Some(server_id),
                secondary: journey_id.raw().to_string(),
            },
            base_timestamp: Utc::now(),
        };
        self.bus
            .publish_removal(eventbus::subject::journey_subject(server_id, journey_id), &removal)
            .await?;
        Ok(())
    }
}
