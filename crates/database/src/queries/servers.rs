use chrono::{DateTime, Utc};
use model::ids::ServerId;
use model::server::{Region, Server};
use sqlx::PgExecutor;

use crate::error::{convert_error, Result};

fn region_str(region: Region) -> &'static str {
    match region {
        Region::Asia => "ASIA",
        Region::Europe => "EUROPE",
        Region::UsNorth => "US_NORTH",
    }
}

fn parse_region(value: &str) -> Region {
    match value {
        "ASIA" => Region::Asia,
        "US_NORTH" => Region::UsNorth,
        _ => Region::Europe,
    }
}

#[derive(sqlx::FromRow)]
struct ServerRow {
    id: uuid::Uuid,
    upstream_id: String,
    code: String,
    region: String,
    language: Option<String>,
    tags: Vec<String>,
    online: bool,
    scenery: String,
    utc_offset_seconds: i32,
    registered_at: DateTime<Utc>,
    deleted: bool,
}

impl From<ServerRow> for Server {
    fn from(row: ServerRow) -> Self {
        Server {
            id: ServerId::new(row.id),
            upstream_id: row.upstream_id,
            code: row.code,
            region: parse_region(&row.region),
            language: row.language,
            tags: row.tags,
            online: row.online,
            scenery: row.scenery,
            utc_offset_seconds: row.utc_offset_seconds,
            registered_at: row.registered_at,
            deleted: row.deleted,
        }
    }
}

/// Upsert-by-id with optimistic identity generation (spec §6): the id is
/// derived deterministically up front, so this is a plain `ON CONFLICT`
/// upsert, never a read-then-decide.
pub async fn upsert<'e>(executor: impl PgExecutor<'e>, server: &Server) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO servers
            (id, upstream_id, code, region, language, tags, online, scenery, utc_offset_seconds, registered_at, deleted)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ON CONFLICT (id) DO UPDATE SET
            code = EXCLUDED.code,
            region = EXCLUDED.region,
            language = EXCLUDED.language,
            tags = EXCLUDED.tags,
            online = EXCLUDED.online,
            scenery = EXCLUDED.scenery,
            utc_offset_seconds = EXCLUDED.utc_offset_seconds,
            deleted = EXCLUDED.deleted
        "#,
    )
    .bind(server.id.raw())
    .bind(&server.upstream_id)
    .bind(&server.code)
    .bind(region_str(server.region))
    .bind(&server.language)
    .bind(&server.tags)
    .bind(server.online)
    .bind(&server.scenery)
    .bind(server.utc_offset_seconds)
    .bind(server.registered_at)
    .bind(server.deleted)
    .execute(executor)
    .await
    .map_err(convert_error)?;
    Ok(())
}

/// Marks every server whose upstream id is not in `seen_upstream_ids` as
/// deleted (spec §4.5 step 3). Only called on a full collection cycle.
pub async fn mark_deleted_not_in<'e>(
    executor: impl PgExecutor<'e>,
    seen_upstream_ids: &[String],
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE servers SET deleted = true WHERE NOT (upstream_id = ANY($1)) AND deleted = false",
    )
    .bind(seen_upstream_ids)
    .execute(executor)
    .await
    .map_err(convert_error)?;
    Ok(result.rows_affected())
}

pub async fn all<'e>(executor: impl PgExecutor<'e>) -> Result<Vec<Server>> {
    let rows: Vec<ServerRow> = sqlx::query_as("SELECT * FROM servers")
        .fetch_all(executor)
        .await
        .map_err(convert_error)?;
    Ok(rows.into_iter().map(Server::from).collect())
}
