//! Feature table writes

use atlas_core::error::Result;
use atlas_core::models::{Category, StoreRecord, UpsertOutcome};
use sqlx::PgPool;

use super::classify_sqlx_error;

const UPSERT_KEYED: &str = r#"
    INSERT INTO features (category, natural_key, name, attributes, raw, geometry, imported_at)
    VALUES ($1, $2, $3, $4, $5, ST_SetSRID(ST_GeomFromGeoJSON($6), $7), now())
    ON CONFLICT (category, natural_key) DO UPDATE SET
        name = EXCLUDED.name,
        attributes = EXCLUDED.attributes,
        raw = EXCLUDED.raw,
        geometry = EXCLUDED.geometry,
        imported_at = EXCLUDED.imported_at
    RETURNING (xmax = 0) AS inserted
"#;

const INSERT_UNKEYED: &str = r#"
    INSERT INTO features (category, natural_key, name, attributes, raw, geometry, imported_at)
    VALUES ($1, NULL, $2, $3, $4, ST_SetSRID(ST_GeomFromGeoJSON($5), $6), now())
"#;

pub(crate) async fn upsert(pool: &PgPool, record: &StoreRecord) -> Result<UpsertOutcome> {
    let geometry = serde_json::to_string(&record.geometry.to_geojson())?;
    let attributes = serde_json::Value::Object(record.attributes.clone());
    let raw = serde_json::Value::Object(record.raw.clone());
    let srid = record.srid() as i32;

    match &record.natural_key {
        Some(key) => {
            let (inserted,): (bool,) = sqlx::query_as(UPSERT_KEYED)
                .bind(record.category.as_str())
                .bind(key)
                .bind(&record.name)
                .bind(attributes)
                .bind(raw)
                .bind(geometry)
                .bind(srid)
                .fetch_one(pool)
                .await
                .map_err(classify_sqlx_error)?;

            Ok(if inserted { UpsertOutcome::Inserted } else { UpsertOutcome::Updated })
        }
        None => {
            sqlx::query(INSERT_UNKEYED)
                .bind(record.category.as_str())
                .bind(&record.name)
                .bind(attributes)
                .bind(raw)
                .bind(geometry)
                .bind(srid)
                .execute(pool)
                .await
                .map_err(classify_sqlx_error)?;

            Ok(UpsertOutcome::Inserted)
        }
    }
}

pub(crate) async fn clear(pool: &PgPool, categories: &[Category]) -> Result<u64> {
    let names: Vec<&str> = categories.iter().map(|c| c.as_str()).collect();
    let result = sqlx::query("DELETE FROM features WHERE category = ANY($1)")
        .bind(&names)
        .execute(pool)
        .await
        .map_err(classify_sqlx_error)?;
    Ok(result.rows_affected())
}

pub(crate) async fn count(pool: &PgPool, category: Category) -> Result<u64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM features WHERE category = $1")
        .bind(category.as_str())
        .fetch_one(pool)
        .await
        .map_err(classify_sqlx_error)?;
    Ok(count.max(0) as u64)
}
