//! Dispatch post collector (spec §4.9). Polls far more often than it writes:
//! the dirty-field publish happens on every fresh fetch, but resolving each
//! post's reference point and sweeping deletions from the durable store only
//! happens on a slower gated cadence.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;

use model::dirty::{DirtyField, DirtyGroup};
use model::dispatch_post::{
    DispatchPost, DispatcherUser, UserPlatform, POSITION_OVERRIDE, POSITION_OVERRIDE_UPSTREAM_ID,
};
use model::ids::{dispatch_post_id, ServerId};
use model::server::Server;
use model::snapshot::{dispatch_post_secondary_key, SnapshotPayload};
use platform::{Collector, Continuation, SupervisionStrategy};
use upstream::client::ConditionalResponse;
use upstream::dto::DispatcherEntry;

use crate::CollectorContext;

/// Spec §4.9: the durable-store sweep and point-resolution pass happen
/// roughly every 10 seconds even though the upstream endpoint is polled
/// every 2 seconds.
const PERSIST_EVERY_N_TICKS: u64 = 5;

/// First of the upstream `dispatchedBy` list wins, Steam preferred over
/// Xbox when (implausibly) both are present on the same entry.
fn dispatcher_from(entries: &[DispatcherEntry]) -> Option<DispatcherUser> {
    let first = entries.first()?;
    if let Some(steam) = &first.steam_id {
        Some(DispatcherUser {
            platform: UserPlatform::Steam,
            platform_id: steam.clone(),
        })
    } else {
        first.xbox_id.as_ref().map(|xbox| DispatcherUser {
            platform: UserPlatform::Xbox,
            platform_id: xbox.clone(),
        })
    }
}

/// Spec §4.9: one upstream post has known-bad coordinates; everything else
/// passes through unchanged.
fn resolved_position(upstream_id: &str, lat: f64, lon: f64) -> (f64, f64) {
    if upstream_id == POSITION_OVERRIDE_UPSTREAM_ID {
        POSITION_OVERRIDE
    } else {
        (lat, lon)
    }
}

#[derive(Clone)]
struct DispatchPostHolder {
    dirty: DirtyGroup,
    name: DirtyField<String>,
    difficulty_level: DirtyField<u8>,
    position: DirtyField<(f64, f64)>,
    image_urls: DirtyField<Vec<String>>,
    dispatcher: DirtyField<Option<DispatcherUser>>,
    point_id: DirtyField<Option<String>>,
    upstream_id: String,
    server_code: String,
    server_id: ServerId,
}

impl DispatchPostHolder {
    fn new(upstream_id: String, server_code: String, server_id: ServerId) -> Self {
        Self {
            dirty: DirtyGroup::new(),
            name: DirtyField::new(String::new(), 0),
            difficulty_level: DirtyField::new(0, 1),
            position: DirtyField::new((0.0, 0.0), 2),
            image_urls: DirtyField::new(Vec::new(), 3),
            dispatcher: DirtyField::new(None, 4),
            point_id: DirtyField::new(None, 5),
            upstream_id,
            server_code,
            server_id,
        }
    }

    fn to_model(&self) -> DispatchPost {
        let (lat, lon) = *self.position.get();
        DispatchPost {
            id: dispatch_post_id(&self.server_code, &self.upstream_id),
            upstream_id: self.upstream_id.clone(),
            server_id: self.server_id,
            name: self.name.get().clone(),
            difficulty_level: *self.difficulty_level.get(),
            lat,
            lon,
            point_id: self.point_id.get().clone(),
            image_urls: self.image_urls.get().clone(),
            dispatcher: self.dispatcher.get().clone(),
            deleted: false,
        }
    }
}

#[derive(Default, Clone)]
pub struct DispatchPostCollectorState {
    etags: HashMap<ServerId, Option<String>>,
    holders: HashMap<(ServerId, String), DispatchPostHolder>,
    iteration: u64,
}

pub struct DispatchPostCollector;

#[async_trait]
impl Collector for DispatchPostCollector {
    type Error = ();
    type Context = CollectorContext;
    type State = DispatchPostCollectorState;

    fn unique_id() -> &'static str {
        "dispatch-post-collector"
    }

    fn tick(&self) -> Option<Duration> {
        Some(Duration::from_secs(2))
    }

    async fn run(
        &mut self,
        context: &Self::Context,
        mut state: Self::State,
    ) -> Result<(Continuation, Self::State), Self::Error> {
        let servers: Vec<Server> = context
            .platform
            .servers
            .snapshot()
            .into_iter()
            .filter_map(|frame| match frame.payload {
                SnapshotPayload::Server(server) => Some(*server),
                _ => None,
            })
            .filter(|server| !server.deleted)
            .collect();

        let should_persist = state.iteration % PERSIST_EVERY_N_TICKS == 0;

        for server in &servers {
            let etag = state.etags.get(&server.id).cloned().flatten();
            let response = context.panel.dispatch_posts(&server.code, etag.as_deref()).await;
            let ConditionalResponse::Fresh { body, etag: new_etag } = response else {
                continue;
            };
            state.etags.insert(server.id, new_etag);
            if body.is_empty() {
                continue;
            }

            let mut seen_upstream_ids = HashSet::new();
            for entry in &body {
                seen_upstream_ids.insert(entry.id.clone());
                let key = (server.id, entry.id.clone());
                let holder = state
                    .holders
                    .entry(key)
                    .or_insert_with(|| DispatchPostHolder::new(entry.id.clone(), server.code.clone(), server.id));

                holder.name.set(&holder.dirty, entry.name.clone());
                holder.difficulty_level.set(&holder.dirty, entry.difficulty_level);
                let (lat, lon) = resolved_position(&entry.id, entry.latitude, entry.longitude);
                holder.position.set(&holder.dirty, (lat, lon));
                holder.image_urls.set(&holder.dirty, entry.image_urls.clone());
                holder.dispatcher.set(&holder.dirty, dispatcher_from(&entry.dispatched_by));

                if should_persist {
                    match context.points.by_name(&entry.name).await {
                        Some(point) => holder.point_id.set(&holder.dirty, Some(point.id)),
                        None => tracing::warn!(name = %entry.name, "no reference point match for dispatch post"),
                    }
                }

                if holder.dirty.consume_any_dirty() {
                    let post = holder.to_model();
                    if let Err(why) = context.platform.publish_dispatch_post_update(&post).await {
                        tracing::error!(error = %why, "failed publishing dispatch post update");
                    }
                }
            }

            let known_secondary: HashSet<String> = seen_upstream_ids
                .iter()
                .map(|id| dispatch_post_secondary_key(server.id, id))
                .collect();
            for frame in context.platform.dispatch_posts.find_by_secondary_not_in(&known_secondary) {
                let SnapshotPayload::DispatchPost(post) = &frame.payload else {
                    continue;
                };
                if post.server_id != server.id {
                    continue;
                }
                if let Err(why) = context.platform.publish_dispatch_post_removal(post).await {
                    tracing::error!(error = %why, "failed publishing dispatch post removal");
                }
                state.holders.remove(&(server.id, post.upstream_id.clone()));
            }
        }

        if should_persist {
            for server in &servers {
                let seen: Vec<String> = state
                    .holders
                    .keys()
                    .filter(|(sid, _)| *sid == server.id)
                    .map(|(_, upstream_id)| upstream_id.clone())
                    .collect();
                if let Err(why) = context.platform.db.mark_dispatch_posts_deleted_not_in(server.id, &seen).await {
                    tracing::error!(error = %why, "failed marking absent dispatch posts deleted");
                }
            }
        }

        state.iteration = state.iteration.wrapping_add(1);
        Ok((Continuation::Continue, state))
    }

    fn on_error(&self, _error: Self::Error) -> SupervisionStrategy {
        SupervisionStrategy::Resume
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatcher_prefers_steam_over_xbox_on_the_same_entry() {
        let entries = vec![DispatcherEntry {
            steam_id: Some("76500000000000001".to_string()),
            xbox_id: Some("xbox1".to_string()),
        }];
        let dispatcher = dispatcher_from(&entries).unwrap();
        assert_eq!(dispatcher.platform, UserPlatform::Steam);
    }

    #[test]
    fn dispatcher_falls_back_to_xbox() {
        let entries = vec![DispatcherEntry {
            steam_id: None,
            xbox_id: Some("xbox1".to_string()),
        }];
        let dispatcher = dispatcher_from(&entries).unwrap();
        assert_eq!(dispatcher.platform, UserPlatform::Xbox);
    }

    #[test]
    fn dispatcher_absent_when_no_dispatchers() {
        assert!(dispatcher_from(&[]).is_none());
    }

    #[test]
    fn known_bad_position_is_overridden() {
        assert_eq!(resolved_position(POSITION_OVERRIDE_UPSTREAM_ID, 0.0, 0.0), POSITION_OVERRIDE);
        assert_eq!(resolved_position("other", 1.0, 2.0), (1.0, 2.0));
    }
}
