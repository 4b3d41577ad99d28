use anyhow::{Context, Result};
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{
    helpers::{conversion_error, parse_datetime, to_u64},
    Database,
};
use crate::models::MeterSettings;

fn row_to_settings(row: &Row) -> Result<MeterSettings, rusqlite::Error> {
    let segments: i64 = row.get("segments")?;
    let updated_at_str: String = row.get("updated_at")?;

    Ok(MeterSettings {
        name: row.get("name")?,
        segments: to_u64(segments, "segments").map_err(conversion_error)? as usize,
        max_flow_rate: row.get("max_flow_rate")?,
        updated_at: parse_datetime(&updated_at_str, "updated_at").map_err(conversion_error)?,
    })
}

impl Database {
    pub async fn upsert_meter_settings(&self, settings: &MeterSettings) -> Result<()> {
        let record = settings.clone();

        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO meter_settings (name, segments, max_flow_rate, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(name) DO UPDATE SET
                     segments = excluded.segments,
                     max_flow_rate = excluded.max_flow_rate,
                     updated_at = excluded.updated_at",
                params![
                    record.name,
                    record.segments as i64,
                    record.max_flow_rate,
                    record.updated_at.to_rfc3339(),
                ],
            )
            .with_context(|| "failed to upsert meter settings")?;
            Ok(())
        })
        .await
    }

    pub async fn get_meter_settings(&self, name: &str) -> Result<Option<MeterSettings>> {
        let name = name.to_string();

        self.execute(move |conn| {
            let settings = conn
                .query_row(
                    "SELECT name, segments, max_flow_rate, updated_at
                     FROM meter_settings
                     WHERE name = ?1",
                    params![name],
                    row_to_settings,
                )
                .optional()?;
            Ok(settings)
        })
        .await
    }
}
