use model::dispatch_post::{DispatchPost, DispatcherUser, UserPlatform};
use model::ids::{DispatchPostId, ServerId};
use sqlx::PgExecutor;

use crate::error::{convert_error, Result};

fn platform_str(p: UserPlatform) -> &'static str {
    match p {
        UserPlatform::Steam => "STEAM",
        UserPlatform::Xbox => "XBOX",
    }
}
fn parse_platform(s: &str) -> UserPlatform {
    match s {
        "XBOX" => UserPlatform::Xbox,
        _ => UserPlatform::Steam,
    }
}

#[derive(sqlx::FromRow)]
struct DispatchPostRow {
    id: uuid::Uuid,
    upstream_id: String,
    server_id: uuid::Uuid,
    name: String,
    difficulty_level: i16,
    lat: f64,
    lon: f64,
    point_id: Option<String>,
    image_urls: Vec<String>,
    dispatcher_platform: Option<String>,
    dispatcher_platform_id: Option<String>,
    deleted: bool,
}

impl From<DispatchPostRow> for DispatchPost {
    fn from(row: DispatchPostRow) -> Self {
        DispatchPost {
            id: DispatchPostId::new(row.id),
            upstream_id: row.upstream_id,
            server_id: ServerId::new(row.server_id),
            name: row.name,
            difficulty_level: row.difficulty_level as u8,
            lat: row.lat,
            lon: row.lon,
            point_id: row.point_id,
            image_urls: row.image_urls,
            dispatcher: row.dispatcher_platform.map(|p| DispatcherUser {
                platform: parse_platform(&p),
                platform_id: row.dispatcher_platform_id.unwrap_or_default(),
            }),
            deleted: row.deleted,
        }
    }
}

/// Persists base information, as done on the gated ~5 minute cadence (spec
/// §4.9), not every cycle.
pub async fn upsert<'e>(executor: impl PgExecutor<'e>, post: &DispatchPost) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO dispatch_posts
            (id, upstream_id, server_id, name, difficulty_level, lat, lon, point_id,
             image_urls, dispatcher_platform, dispatcher_platform_id, deleted)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        ON CONFLICT (id) DO UPDATE SET
            name = EXCLUDED.name,
            difficulty_level = EXCLUDED.difficulty_level,
            lat = EXCLUDED.lat,
            lon = EXCLUDED.lon,
            point_id = EXCLUDED.point_id,
            image_urls = EXCLUDED.image_urls,
            dispatcher_platform = EXCLUDED.dispatcher_platform,
            dispatcher_platform_id = EXCLUDED.dispatcher_platform_id,
            deleted = EXCLUDED.deleted
        "#,
    )
    .bind(post.id.raw())
    .bind(&post.upstream_id)
    .bind(post.server_id.raw())
    .bind(&post.name)
    .bind(post.difficulty_level as i16)
    .bind(post.lat)
    .bind(post.lon)
    .bind(&post.point_id)
    .bind(&post.image_urls)
    .bind(post.dispatcher.as_ref().map(|d| platform_str(d.platform)))
    .bind(post.dispatcher.as_ref().map(|d| d.platform_id.clone()))
    .bind(post.deleted)
    .execute(executor)
    .await
    .map_err(convert_error)?;
    Ok(())
}

/// Tombstones posts absent from the given server's latest upstream ids
/// (spec §3, §4.9).
pub async fn mark_deleted_not_in<'e>(
    executor: impl PgExecutor<'e>,
    server_id: ServerId,
    seen_upstream_ids: &[String],
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE dispatch_posts SET deleted = true \
         WHERE server_id = $1 AND NOT (upstream_id = ANY($2)) AND deleted = false",
    )
    .bind(server_id.raw())
    .bind(seen_upstream_ids)
    .execute(executor)
    .await
    .map_err(convert_error)?;
    Ok(result.rows_affected())
}

pub async fn for_server<'e>(executor: impl PgExecutor<'e>, server_id: ServerId) -> Result<Vec<DispatchPost>> {
    let rows: Vec<DispatchPostRow> = sqlx::query_as("SELECT * FROM dispatch_posts WHERE server_id = $1")
        .bind(server_id.raw())
        .fetch_all(executor)
        .await
        .map_err(convert_error)?;
    Ok(rows.into_iter().map(DispatchPost::from).collect())
}
