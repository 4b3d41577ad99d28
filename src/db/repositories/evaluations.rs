use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Row, Transaction};

use super::history::append_reading;
use crate::correction::CorrectionOutcome;
use crate::db::{
    helpers::{conversion_error, limit_to_i64, parse_datetime},
    Database,
};
use crate::models::{EvaluationRecord, Observation, Reading};

fn row_to_evaluation(row: &Row) -> Result<EvaluationRecord, rusqlite::Error> {
    let observed_at_str: String = row.get("observed_at")?;
    let outcome_json: String = row.get("outcome_json")?;
    let predictions_json: String = row.get("predictions_json")?;
    let created_at_str: String = row.get("created_at")?;

    Ok(EvaluationRecord {
        id: row.get("id")?,
        name: row.get("name")?,
        observed_at: parse_datetime(&observed_at_str, "observed_at").map_err(conversion_error)?,
        outcome: serde_json::from_str(&outcome_json)
            .map_err(|e| conversion_error(anyhow::Error::new(e)))?,
        predictions: serde_json::from_str(&predictions_json)
            .map_err(|e| conversion_error(anyhow::Error::new(e)))?,
        created_at: parse_datetime(&created_at_str, "created_at").map_err(conversion_error)?,
    })
}

/// Serialized form of one evaluation, built before moving onto the database thread.
struct PendingEvaluation {
    observed_at: DateTime<Utc>,
    outcome_json: String,
    predictions_json: String,
}

impl PendingEvaluation {
    fn new(observation: &Observation, outcome: &CorrectionOutcome) -> Result<Self> {
        Ok(Self {
            observed_at: observation.timestamp(),
            outcome_json: serde_json::to_string(outcome)
                .context("failed to serialize evaluation outcome")?,
            predictions_json: serde_json::to_string(observation.positions())
                .context("failed to serialize evaluation predictions")?,
        })
    }
}

fn append_evaluation(
    tx: &Transaction<'_>,
    name: &str,
    pending: &PendingEvaluation,
    max_evaluations: usize,
) -> Result<()> {
    let keep = limit_to_i64(max_evaluations)?;

    tx.execute(
        "INSERT INTO evaluations (name, observed_at, outcome_json, predictions_json, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            name,
            pending.observed_at.to_rfc3339(),
            pending.outcome_json,
            pending.predictions_json,
            Utc::now().to_rfc3339(),
        ],
    )
    .with_context(|| "failed to insert evaluation")?;

    tx.execute(
        "DELETE FROM evaluations
         WHERE name = ?1
         AND id NOT IN (
             SELECT id FROM evaluations
             WHERE name = ?1
             ORDER BY id DESC
             LIMIT ?2
         )",
        params![name, keep],
    )
    .with_context(|| "failed to trim evaluations")?;

    Ok(())
}

impl Database {
    /// Logs the outcome of one evaluation, keeping the newest `max_evaluations` per meter.
    pub async fn insert_evaluation(
        &self,
        name: &str,
        observation: &Observation,
        outcome: &CorrectionOutcome,
        max_evaluations: usize,
    ) -> Result<()> {
        let name = name.to_string();
        let pending = PendingEvaluation::new(observation, outcome)?;

        self.execute(move |conn| {
            let tx = conn.transaction()?;
            append_evaluation(&tx, &name, &pending, max_evaluations)?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    /// Stores the accepted reading (if any) and the evaluation log entry atomically.
    ///
    /// Either both rows land or neither does, so a failed call can be retried without
    /// duplicating the reading.
    pub async fn record_outcome(
        &self,
        name: &str,
        observation: &Observation,
        outcome: &CorrectionOutcome,
        accepted: Option<&Reading>,
        max_history: usize,
        max_evaluations: usize,
    ) -> Result<()> {
        let name = name.to_string();
        let pending = PendingEvaluation::new(observation, outcome)?;
        let accepted = accepted.cloned();

        self.execute(move |conn| {
            let tx = conn.transaction()?;
            if let Some(reading) = &accepted {
                append_reading(&tx, &name, reading, max_history)?;
            }
            append_evaluation(&tx, &name, &pending, max_evaluations)?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    /// Newest evaluations first.
    pub async fn recent_evaluations(
        &self,
        name: &str,
        limit: usize,
    ) -> Result<Vec<EvaluationRecord>> {
        let name = name.to_string();
        let limit = limit_to_i64(limit)?;

        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, observed_at, outcome_json, predictions_json, created_at
                 FROM evaluations
                 WHERE name = ?1
                 ORDER BY id DESC
                 LIMIT ?2",
            )?;

            let records = stmt
                .query_map(params![name, limit], row_to_evaluation)?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(records)
        })
        .await
    }
}
