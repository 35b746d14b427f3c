//! Diff-based synchronization against the relational store.
//!
//! The extraction side gives at-least-once delivery at best (a crash between
//! reading and archiving an export re-processes it), so this layer is the
//! safety net: the delta computation makes re-delivery a no-op instead of a
//! duplicate insert.

use std::collections::HashSet;

use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::BotError;
use crate::ingest::Record;

/// One table per bot: fixed column schema, natural-key columns a subset of
/// `columns` and efficiently queryable for the anti-join.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSchema {
    pub table: String,
    pub columns: Vec<String>,
    pub key: Vec<String>,
}

/// The two commit policies are genuinely different business requirements for
/// different reports; they stay named and separate instead of being unified
/// by guesswork.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncPolicy {
    /// Append-only: insert the delta, never update or delete.
    Incremental,
    /// Truncate the table and reload the entire candidate set, tagging each
    /// row with a positional id and a load timestamp.
    FullRefresh,
}

pub struct SyncEngine {
    schema: TableSchema,
}

impl SyncEngine {
    pub fn new(schema: TableSchema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Read query scoped to the natural-key columns.
    pub fn persisted_keys(&self, conn: &Connection) -> Result<HashSet<Vec<String>>, BotError> {
        let sql = format!(
            "SELECT {} FROM \"{}\"",
            quoted(&self.schema.key),
            self.schema.table
        );
        let mut statement = conn.prepare(&sql)?;
        let mut rows = statement.query([])?;
        let mut keys = HashSet::new();
        while let Some(row) = rows.next()? {
            let mut key = Vec::with_capacity(self.schema.key.len());
            for index in 0..self.schema.key.len() {
                key.push(row.get::<_, String>(index)?);
            }
            keys.insert(key);
        }
        Ok(keys)
    }

    /// Left-anti-join by natural key: every candidate whose key is absent
    /// from the persisted set. Duplicate keys within `candidates` keep the
    /// first occurrence in input order.
    pub fn compute_delta<'a>(
        &self,
        candidates: &'a [Record],
        persisted: &HashSet<Vec<String>>,
    ) -> Vec<&'a Record> {
        let mut seen = HashSet::new();
        candidates
            .iter()
            .filter(|record| match record.natural_key(&self.schema.key) {
                Some(key) => !persisted.contains(&key) && seen.insert(key),
                None => false,
            })
            .collect()
    }

    /// Commit one run's worth of records in a single transaction, released
    /// (committed or rolled back) on every exit path. Returns the number of
    /// rows inserted.
    pub fn commit(
        &self,
        conn: &mut Connection,
        candidates: &[Record],
        policy: SyncPolicy,
    ) -> Result<usize, BotError> {
        match policy {
            SyncPolicy::Incremental => self.commit_incremental(conn, candidates),
            SyncPolicy::FullRefresh => self.commit_full_refresh(conn, candidates),
        }
    }

    fn commit_incremental(
        &self,
        conn: &mut Connection,
        candidates: &[Record],
    ) -> Result<usize, BotError> {
        let persisted = self.persisted_keys(conn)?;
        let tx = conn.transaction()?;
        let inserted = {
            let delta = self.compute_delta(candidates, &persisted);
            let sql = insert_sql(&self.schema.table, &self.schema.columns);
            let mut statement = tx.prepare(&sql)?;
            for record in &delta {
                let values = self.schema.columns.iter().map(|column| {
                    Value::Text(record.get(column).unwrap_or_default().to_string())
                });
                statement.execute(params_from_iter(values))?;
            }
            delta.len()
        };
        tx.commit()?;
        info!(table = %self.schema.table, inserted, "incremental sync committed");
        Ok(inserted)
    }

    fn commit_full_refresh(
        &self,
        conn: &mut Connection,
        candidates: &[Record],
    ) -> Result<usize, BotError> {
        let loaded_at = Utc::now().to_rfc3339();
        let tx = conn.transaction()?;
        {
            tx.execute(&format!("DELETE FROM \"{}\"", self.schema.table), [])?;
            let mut columns = self.schema.columns.clone();
            columns.push("id".to_string());
            columns.push("inserted_at".to_string());
            let sql = insert_sql(&self.schema.table, &columns);
            let mut statement = tx.prepare(&sql)?;
            for (position, record) in candidates.iter().enumerate() {
                let mut values: Vec<Value> = self
                    .schema
                    .columns
                    .iter()
                    .map(|column| Value::Text(record.get(column).unwrap_or_default().to_string()))
                    .collect();
                values.push(Value::Integer(position as i64));
                values.push(Value::Text(loaded_at.clone()));
                statement.execute(params_from_iter(values))?;
            }
        }
        tx.commit()?;
        info!(
            table = %self.schema.table,
            rows = candidates.len(),
            "full refresh committed"
        );
        Ok(candidates.len())
    }
}

fn quoted(columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| format!("\"{c}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

fn insert_sql(table: &str, columns: &[String]) -> String {
    let placeholders = (1..=columns.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO \"{table}\" ({}) VALUES ({placeholders})",
        quoted(columns)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn record(pairs: &[(&str, &str)]) -> Record {
        Record::new(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
        )
    }

    fn engine() -> SyncEngine {
        SyncEngine::new(TableSchema {
            table: "t".into(),
            columns: vec!["emissao".into(), "documento".into(), "valor".into()],
            key: vec!["emissao".into(), "documento".into()],
        })
    }

    #[test]
    fn delta_is_anti_join_by_key() {
        let candidates = vec![
            record(&[("emissao", "01/01"), ("documento", "1"), ("valor", "10")]),
            record(&[("emissao", "01/01"), ("documento", "2"), ("valor", "20")]),
        ];
        let persisted: HashSet<Vec<String>> =
            [vec!["01/01".to_string(), "1".to_string()]].into_iter().collect();
        let delta = engine().compute_delta(&candidates, &persisted);
        assert_eq!(delta.len(), 1);
        assert_eq!(delta[0].get("documento"), Some("2"));
    }

    #[test]
    fn duplicate_candidate_keys_keep_first_occurrence() {
        let candidates = vec![
            record(&[("emissao", "01/01"), ("documento", "1"), ("valor", "first")]),
            record(&[("emissao", "01/01"), ("documento", "1"), ("valor", "second")]),
        ];
        let delta = engine().compute_delta(&candidates, &HashSet::new());
        assert_eq!(delta.len(), 1);
        assert_eq!(delta[0].get("valor"), Some("first"));
    }

    #[test]
    fn keyless_candidates_never_enter_the_delta() {
        let candidates = vec![record(&[
            ("emissao", "01/01"),
            ("documento", ""),
            ("valor", "10"),
        ])];
        let delta = engine().compute_delta(&candidates, &HashSet::new());
        assert!(delta.is_empty());
    }

    #[test]
    fn insert_sql_quotes_identifiers() {
        let sql = insert_sql("t", &["a".into(), "b".into()]);
        assert_eq!(sql, "INSERT INTO \"t\" (\"a\", \"b\") VALUES (?1, ?2)");
    }
}
