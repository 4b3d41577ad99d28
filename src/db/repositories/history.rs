use anyhow::{Context, Result};
use rusqlite::{params, Row, Transaction};

use crate::db::{
    helpers::{conversion_error, limit_to_i64, parse_datetime, to_i64, to_u64},
    Database,
};
use crate::models::{HistoryEntry, MeterHistory, Reading};

fn row_to_entry(row: &Row) -> Result<HistoryEntry, rusqlite::Error> {
    let value: i64 = row.get("value")?;
    let timestamp_str: String = row.get("timestamp")?;

    Ok(HistoryEntry {
        id: row.get("id")?,
        name: row.get("name")?,
        reading: Reading {
            value: to_u64(value, "value").map_err(conversion_error)?,
            timestamp: parse_datetime(&timestamp_str, "timestamp").map_err(conversion_error)?,
            confidence: row.get("confidence")?,
            manual: row.get("manual")?,
        },
    })
}

/// Inserts a reading and trims the meter's history to the newest `max_history`
/// entries. At least the new reading is always kept.
pub(super) fn append_reading(
    tx: &Transaction<'_>,
    name: &str,
    reading: &Reading,
    max_history: usize,
) -> Result<i64> {
    let keep = limit_to_i64(max_history.max(1))?;

    tx.execute(
        "INSERT INTO history (name, value, confidence, timestamp, manual)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            name,
            to_i64(reading.value)?,
            reading.confidence,
            reading.timestamp.to_rfc3339(),
            reading.manual,
        ],
    )
    .with_context(|| "failed to insert history entry")?;
    let id = tx.last_insert_rowid();

    tx.execute(
        "DELETE FROM history
         WHERE name = ?1
         AND id NOT IN (
             SELECT id FROM history
             WHERE name = ?1
             ORDER BY id DESC
             LIMIT ?2
         )",
        params![name, keep],
    )
    .with_context(|| "failed to trim history")?;

    Ok(id)
}

impl Database {
    /// Appends a reading and trims the history in one transaction.
    pub async fn insert_reading(
        &self,
        name: &str,
        reading: &Reading,
        max_history: usize,
    ) -> Result<i64> {
        let name = name.to_string();
        let record = reading.clone();

        self.execute(move |conn| {
            let tx = conn.transaction()?;
            let id = append_reading(&tx, &name, &record, max_history)?;
            tx.commit()?;
            Ok(id)
        })
        .await
    }

    /// Newest readings first, in insertion order.
    pub async fn recent_readings(&self, name: &str, limit: usize) -> Result<Vec<Reading>> {
        let name = name.to_string();
        let limit = limit_to_i64(limit)?;

        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, value, confidence, timestamp, manual
                 FROM history
                 WHERE name = ?1
                 ORDER BY id DESC
                 LIMIT ?2",
            )?;

            let entries = stmt
                .query_map(params![name, limit], row_to_entry)?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(entries.into_iter().map(|entry| entry.reading).collect())
        })
        .await
    }

    /// The window the correction engine needs.
    pub async fn last_two_readings(&self, name: &str) -> Result<MeterHistory> {
        let recent = self.recent_readings(name, 2).await?;
        Ok(MeterHistory::from_recent(recent))
    }

    /// Full stored history of a meter, oldest first.
    pub async fn list_history(&self, name: &str) -> Result<Vec<HistoryEntry>> {
        let name = name.to_string();

        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, value, confidence, timestamp, manual
                 FROM history
                 WHERE name = ?1
                 ORDER BY id ASC",
            )?;

            let entries = stmt
                .query_map(params![name], row_to_entry)?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(entries)
        })
        .await
    }

    /// Deletes every reading of a meter and returns how many were removed.
    pub async fn clear_history(&self, name: &str) -> Result<usize> {
        let name = name.to_string();

        self.execute(move |conn| {
            let removed = conn
                .execute("DELETE FROM history WHERE name = ?1", params![name])
                .with_context(|| "failed to clear history")?;
            Ok(removed)
        })
        .await
    }
}
