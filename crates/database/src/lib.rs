use std::env;

use async_trait::async_trait;
use cache::SnapshotBackingStore;
use chrono::Utc;
use model::ids::{JourneyId, ServerId};
use model::journey::Journey;
use model::journey_event::JourneyEvent;
use model::snapshot::{dispatch_post_frame_id, FrameId, SnapshotFrame, SnapshotPayload};

pub mod error;
pub mod queries;

pub use error::{DatabaseError, Result};

/// Mirrors the teacher's `DatabaseConnectionInfo::from_env` shape (spec §1
/// "Configuration"): every field is a required environment variable, so a
/// missing one fails loudly at startup rather than connecting to a bogus
/// default.
pub struct DatabaseConnectionInfo {
    pub username: String,
    pub password: String,
    pub hostname: String,
    pub port: u16,
    pub database: String,
}

impl DatabaseConnectionInfo {
    pub fn from_env() -> Option<Self> {
        Some(Self {
            username: env::var("DATABASE_USER").ok()?,
            password: env::var("DATABASE_PASSWORD").ok()?,
            hostname: env::var("DATABASE_HOST").ok()?,
            port: env::var("DATABASE_PORT").ok()?.parse().ok()?,
            database: env::var("DATABASE_NAME").ok()?,
        })
    }

    fn postgres_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.hostname, self.port, self.database
        )
    }
}

/// The durable store (spec §6): servers, journeys, journey events, dispatch
/// posts, journey vehicles.
#[derive(Clone)]
pub struct PgStore {
    pool: sqlx::PgPool,
}

impl PgStore {
    pub async fn connect(info: DatabaseConnectionInfo) -> Result<Self> {
        let pool = sqlx::postgres::PgPool::connect(&info.postgres_url())
            .await
            .map_err(error::convert_error)?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|why| DatabaseError::Sql(sqlx::Error::Migrate(Box::new(why))))?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &sqlx::PgPool {
        &self.pool
    }

    pub async fn upsert_server(&self, server: &model::server::Server) -> Result<()> {
        queries::servers::upsert(&self.pool, server).await
    }

    pub async fn mark_servers_deleted_not_in(&self, seen_upstream_ids: &[String]) -> Result<u64> {
        queries::servers::mark_deleted_not_in(&self.pool, seen_upstream_ids).await
    }

    pub async fn journey_by_server_and_run(
        &self,
        server_id: ServerId,
        upstream_run_id: &str,
    ) -> Result<Option<Journey>> {
        queries::journeys::by_server_and_run(&self.pool, server_id, upstream_run_id).await
    }

    pub async fn insert_journey_if_absent(&self, journey: &Journey) -> Result<()> {
        queries::journeys::insert_if_absent(&self.pool, journey).await
    }

    pub async fn wipe_journey(&self, journey_id: JourneyId) -> Result<()> {
        queries::journeys::wipe(&self.pool, journey_id).await
    }

    pub async fn mark_journey_first_seen(&self, journey_id: JourneyId) -> Result<()> {
        queries::journeys::mark_first_seen(&self.pool, journey_id, Utc::now()).await
    }

    pub async fn mark_journey_last_seen(&self, journey_id: JourneyId) -> Result<()> {
        queries::journeys::mark_last_seen(&self.pool, journey_id, Utc::now()).await
    }

    pub async fn events_for_journey(&self, journey_id: JourneyId) -> Result<Vec<JourneyEvent>> {
        queries::journey_events::for_journey(&self.pool, journey_id).await
    }

    pub async fn replace_events(&self, journey_id: JourneyId, events: &[JourneyEvent]) -> Result<()> {
        queries::journey_events::delete_for_journey(&self.pool, journey_id).await?;
        queries::journey_events::insert_batch(&self.pool, events).await
    }

    /// Runs the realtime updater's confirm-and-re-predict write in one
    /// transaction, retrying up to 5 times on a transient error (spec §4.8,
    /// §7 "Transient persistence error").
    pub async fn save_events_transactionally(&self, events: &[JourneyEvent]) -> Result<()> {
        const MAX_ATTEMPTS: u32 = 5;
        let mut last_error = None;
        for attempt in 1..=MAX_ATTEMPTS {
            let mut tx = self.pool.begin().await.map_err(error::convert_error)?;
            match queries::journey_events::save_in_transaction(&mut tx, events).await {
                Ok(()) => {
                    tx.commit().await.map_err(error::convert_error)?;
                    return Ok(());
                }
                Err(why) => {
                    tracing::warn!(attempt, error = %why, "retrying realtime event update");
                    last_error = Some(why);
                }
            }
        }
        Err(last_error.expect("loop ran at least once"))
    }

    pub async fn mark_journey_cancelled(&self, journey_id: JourneyId) -> Result<()> {
        queries::journeys::mark_cancelled(&self.pool, journey_id, Utc::now()).await
    }

    pub async fn journeys_never_spawned_before(
        &self,
        server_id: ServerId,
        cutoff: chrono::DateTime<Utc>,
    ) -> Result<Vec<JourneyId>> {
        queries::journeys::never_spawned_before(&self.pool, server_id, cutoff).await
    }

    pub async fn journeys_without_update_since(
        &self,
        cutoff: chrono::DateTime<Utc>,
    ) -> Result<Vec<JourneyId>> {
        queries::journeys::without_update_since(&self.pool, cutoff).await
    }

    pub async fn delete_journey_cascade(&self, journey_id: JourneyId) -> Result<()> {
        queries::maintenance::delete_journey_cascade(&self.pool, journey_id).await
    }

    pub async fn upsert_dispatch_post(&self, post: &model::dispatch_post::DispatchPost) -> Result<()> {
        queries::dispatch_posts::upsert(&self.pool, post).await
    }

    pub async fn mark_dispatch_posts_deleted_not_in(
        &self,
        server_id: ServerId,
        seen_upstream_ids: &[String],
    ) -> Result<u64> {
        queries::dispatch_posts::mark_deleted_not_in(&self.pool, server_id, seen_upstream_ids).await
    }

    pub async fn servers(&self) -> Result<Vec<model::server::Server>> {
        queries::servers::all(&self.pool).await
    }

    pub async fn dispatch_posts_for_server(
        &self,
        server_id: ServerId,
    ) -> Result<Vec<model::dispatch_post::DispatchPost>> {
        queries::dispatch_posts::for_server(&self.pool, server_id).await
    }
}

/// Rehydrates the snapshot cache from durable state at startup (spec §9).
/// Only servers and dispatch posts have meaningful persisted "current
/// state" -- journey speed/position are ephemeral and never written to the
/// relational store, so they are reconstructed fresh by the next realtime
/// cycle instead.
#[async_trait]
impl SnapshotBackingStore for PgStore {
    async fn load_all(&self) -> Vec<SnapshotFrame> {
        let now = Utc::now();
        let mut frames = Vec::new();

        if let Ok(servers) = self.servers().await {
            for server in servers {
                frames.push(SnapshotFrame {
                    id: FrameId {
                        primary: server.id.raw().to_string(),
                        server_id: Some(server.id),
                        secondary: server.upstream_id.clone(),
                    },
                    base_timestamp: now,
                    payload: SnapshotPayload::Server(Box::new(server)),
                });
            }
        }

        if let Ok(servers) = self.servers().await {
            for server in servers {
                if let Ok(posts) = self.dispatch_posts_for_server(server.id).await {
                    for post in posts {
                        let id = dispatch_post_frame_id(post.id, server.id, &post.upstream_id);
                        frames.push(SnapshotFrame {
                            id,
                            base_timestamp: now,
                            payload: SnapshotPayload::DispatchPost(Box::new(post)),
                        });
                    }
                }
            }
        }

        frames
    }
}
