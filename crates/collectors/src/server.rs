//! Server collector (spec §4.5). Refreshes the server list every 30s and,
//! on every even run, re-derives each server's UTC offset from the upstream
//! time endpoint.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use regex::Regex;

use model::dirty::{DirtyField, DirtyGroup};
use model::ids::server_id;
use model::server::{Region, Server};
use platform::{Collector, Continuation, SupervisionStrategy};
use upstream::dto::ServerEntry;

use crate::CollectorContext;

/// The upstream id is a Mongo-ObjectId-style 24-hex-char string whose leading
/// 4 bytes are a big-endian unix-seconds timestamp. Falls back to now() for
/// malformed ids rather than failing the whole collector over it.
fn registered_at_from_upstream_id(upstream_id: &str) -> chrono::DateTime<Utc> {
    upstream_id
        .get(0..8)
        .and_then(|prefix| u32::from_str_radix(prefix, 16).ok())
        .and_then(|seconds| Utc.timestamp_opt(seconds as i64, 0).single())
        .unwrap_or_else(Utc::now)
}

fn region_for_code(code: &str) -> Region {
    let lower = code.to_lowercase();
    if lower.starts_with("as") {
        Region::Asia
    } else if lower.starts_with("us") {
        Region::UsNorth
    } else {
        Region::Europe
    }
}

fn name_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^.+ \((?P<lang>.+?)\)\s*(\[(?P<tags>.+)\])?$").unwrap())
}

/// Spec §4.5a: Xbox codes (prefix `xbx`) take the second whitespace token as
/// language; everything else is parsed from the trailing `(lang) [tags]`.
/// "International" (any case) collapses language to absent.
fn parse_name(code: &str, name: &str) -> (Option<String>, Vec<String>) {
    if code.to_lowercase().starts_with("xbx") {
        let lang = name.split_whitespace().nth(1).map(str::to_string);
        return (lang, Vec::new());
    }

    let Some(caps) = name_pattern().captures(name) else {
        return (None, Vec::new());
    };
    let lang = caps.name("lang").map(|m| m.as_str().to_string());
    let tags = caps
        .name("tags")
        .map(|m| {
            m.as_str()
                .split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let lang = match lang {
        Some(l) if l.eq_ignore_ascii_case("international") => None,
        other => other,
    };
    (lang, tags)
}

#[derive(Clone)]
struct ServerHolder {
    dirty: DirtyGroup,
    online: DirtyField<bool>,
    scenery: DirtyField<String>,
    language: DirtyField<Option<String>>,
    tags: DirtyField<Vec<String>>,
    utc_offset_seconds: DirtyField<i32>,
    upstream_id: String,
    code: String,
    region: Region,
    registered_at: chrono::DateTime<Utc>,
}

impl ServerHolder {
    fn new(upstream_id: String, code: String) -> Self {
        Self {
            dirty: DirtyGroup::new(),
            online: DirtyField::new(false, 0),
            scenery: DirtyField::new(String::new(), 1),
            language: DirtyField::new(None, 2),
            tags: DirtyField::new(Vec::new(), 3),
            utc_offset_seconds: DirtyField::new(0, 4),
            region: region_for_code(&code),
            registered_at: registered_at_from_upstream_id(&upstream_id),
            upstream_id,
            code,
        }
    }

    fn to_server(&self, id: model::ids::ServerId) -> Server {
        Server {
            id,
            upstream_id: self.upstream_id.clone(),
            code: self.code.clone(),
            region: self.region,
            language: self.language.get().clone(),
            tags: self.tags.get().clone(),
            online: *self.online.get(),
            scenery: self.scenery.get().clone(),
            utc_offset_seconds: *self.utc_offset_seconds.get(),
            registered_at: self.registered_at,
            deleted: false,
        }
    }
}

#[derive(Default, Clone)]
pub struct ServerCollectorState {
    holders: HashMap<String, ServerHolder>,
    iteration: u64,
}

pub struct ServerCollector;

async fn derive_offset(context: &CollectorContext, code: &str) -> Option<i32> {
    if let Some((millis, date)) = context.aws.server_time_millis(code).await {
        let server_instant = Utc.timestamp_millis_opt(millis).single()?;
        return Some((server_instant - date).num_seconds() as i32);
    }
    context.aws.server_time_offset(code).await
}

#[async_trait]
impl Collector for ServerCollector {
    type Error = ();
    type Context = CollectorContext;
    type State = ServerCollectorState;

    fn unique_id() -> &'static str {
        "server-collector"
    }

    fn tick(&self) -> Option<Duration> {
        Some(Duration::from_secs(30))
    }

    async fn run(
        &mut self,
        context: &Self::Context,
        mut state: Self::State,
    ) -> Result<(Continuation, Self::State), Self::Error> {
        let entries: Vec<ServerEntry> = match context.panel.servers().await {
            Some(entries) if !entries.is_empty() => entries,
            _ => return Ok((Continuation::Continue, state)),
        };

        let is_full_cadence = state.iteration % 2 == 0;
        let mut seen_upstream_ids = HashSet::new();

        for (i, entry) in entries.iter().enumerate() {
            seen_upstream_ids.insert(entry.id.clone());

            let is_new = !state.holders.contains_key(&entry.id);
            let holder = state
                .holders
                .entry(entry.id.clone())
                .or_insert_with(|| ServerHolder::new(entry.id.clone(), entry.code.clone()));

            holder.online.set(&holder.dirty, entry.is_active);
            let scenery = context.scenery.scenery_for(&entry.code);
            holder.scenery.set(&holder.dirty, scenery);
            let (language, tags) = parse_name(&entry.code, &entry.name);
            holder.language.set(&holder.dirty, language);
            holder.tags.set(&holder.dirty, tags);

            if is_full_cadence || is_new {
                if let Some(offset) = derive_offset(context, &entry.code).await {
                    holder.utc_offset_seconds.set(&holder.dirty, offset);
                }
            }

            if holder.dirty.consume_any_dirty() {
                let id = server_id(&entry.code, &entry.id);
                let server = holder.to_server(id);
                if let Err(why) = context.platform.publish_server_update(&server).await {
                    tracing::error!(code = %entry.code, error = %why, "failed publishing server update");
                }
            }

            if i % 5 == 4 {
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }

        if is_full_cadence {
            let ids: Vec<String> = seen_upstream_ids.iter().cloned().collect();
            if let Err(why) = context.platform.db.mark_servers_deleted_not_in(&ids).await {
                tracing::error!(error = %why, "failed marking absent servers deleted");
            }
            state.holders.retain(|id, _| seen_upstream_ids.contains(id));
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
    fn xbox_code_takes_second_token_as_language() {
        let (lang, tags) = parse_name("xbx1", "SimRail Xbox PL [Timetables]");
        assert_eq!(lang.as_deref(), Some("Xbox"));
        assert!(tags.is_empty());
    }

    #[test]
    fn parses_language_and_tags() {
        let (lang, tags) = parse_name("en1", "EN1 (English) [Timetables, SL4]");
        assert_eq!(lang.as_deref(), Some("English"));
        assert_eq!(tags, vec!["Timetables".to_string(), "SL4".to_string()]);
    }

    #[test]
    fn international_collapses_to_absent_language() {
        let (lang, _) = parse_name("int1", "INT1 (International)");
        assert!(lang.is_none());
    }

    #[test]
    fn region_derived_from_code_prefix() {
        assert_eq!(region_for_code("as1"), Region::Asia);
        assert_eq!(region_for_code("us1"), Region::UsNorth);
        assert_eq!(region_for_code("en1"), Region::Europe);
    }

    #[test]
    fn registered_at_decoded_from_object_id_prefix() {
        let timestamp = registered_at_from_upstream_id("675330d44337b38ac4027545");
        assert_eq!(timestamp, Utc.timestamp_opt(0x675330d4, 0).unwrap());
    }

    #[test]
    fn registered_at_falls_back_to_now_for_malformed_id() {
        let before = Utc::now();
        let timestamp = registered_at_from_upstream_id("not-hex");
        assert!(timestamp >= before);
    }
}
