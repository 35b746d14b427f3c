//! Turns a raw captured grid into normalized, typed-by-name records.
//!
//! Export layouts are not fixed: the true header sits at an unknown depth,
//! preceded by report banners and followed by summary junk. The header is
//! found dynamically by its marker sentinel, promoted to column names, and
//! the surviving rows are renamed and filtered per bot-supplied rules. Cells
//! stay strings; typed parsing is the consumer's problem (locale-dependent
//! numeric formats do not belong at this layer).

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::BotError;

/// An untyped grid captured from an export: ordered rows of ordered cells.
#[derive(Debug, Clone, Default)]
pub struct RawGrid {
    rows: Vec<Vec<String>>,
}

impl RawGrid {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    /// Load a CSV export; every cell is read as text, rows may be ragged.
    pub fn from_csv_path(path: &Path) -> Result<Self, BotError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)
            .map_err(|e| BotError::SchemaMismatch(format!("{}: {e}", path.display())))?;
        let mut rows = Vec::new();
        for record in reader.records() {
            let record =
                record.map_err(|e| BotError::SchemaMismatch(format!("{}: {e}", path.display())))?;
            rows.push(record.iter().map(str::to_string).collect());
        }
        Ok(Self::new(rows))
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }
}

/// Source header → canonical field name, in table column order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMap {
    pub source: String,
    pub canonical: String,
}

impl ColumnMap {
    pub fn new(source: impl Into<String>, canonical: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            canonical: canonical.into(),
        }
    }
}

/// Keep only rows whose value in `column` is in `allowed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncludeFilter {
    pub column: String,
    pub allowed: BTreeSet<String>,
}

/// Per-bot normalization rules; the mechanism below is shared by all bots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRules {
    /// Sentinel value in column 0 marking the true header row.
    pub header_marker: String,
    /// Fixed count of trailing footer/summary rows to discard.
    pub trailing_rows: usize,
    pub columns: Vec<ColumnMap>,
    pub include: Option<IncludeFilter>,
    /// Canonical column that must be non-empty for a row to survive.
    pub required: Option<String>,
    /// Canonical columns forming the record identity.
    pub natural_key: Vec<String>,
}

/// A normalized record: canonical field name → string value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    fields: BTreeMap<String, String>,
}

impl Record {
    pub fn new(fields: BTreeMap<String, String>) -> Self {
        Self { fields }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    /// The record's natural key, or `None` when any component is empty.
    /// Such records are dropped before delta computation, never persisted.
    pub fn natural_key(&self, key_columns: &[String]) -> Option<Vec<String>> {
        let mut key = Vec::with_capacity(key_columns.len());
        for column in key_columns {
            match self.fields.get(column) {
                Some(value) if !value.is_empty() => key.push(value.clone()),
                _ => return None,
            }
        }
        Some(key)
    }
}

/// Normalize a raw export grid per the bot's rules.
pub fn normalize(grid: &RawGrid, rules: &IngestRules) -> Result<Vec<Record>, BotError> {
    for key_column in &rules.natural_key {
        if !rules.columns.iter().any(|c| &c.canonical == key_column) {
            return Err(BotError::SchemaMismatch(format!(
                "natural key column '{key_column}' is not mapped"
            )));
        }
    }

    let rows = grid.rows();
    let marker_rows: Vec<usize> = rows
        .iter()
        .enumerate()
        .filter(|(_, row)| row.first().map(String::as_str) == Some(rules.header_marker.as_str()))
        .map(|(i, _)| i)
        .collect();
    let header_row = match marker_rows.as_slice() {
        [index] => *index,
        [] => {
            return Err(BotError::SchemaMismatch(format!(
                "header marker '{}' not found",
                rules.header_marker
            )))
        }
        many => {
            return Err(BotError::SchemaMismatch(format!(
                "header marker '{}' is ambiguous: rows {many:?}",
                rules.header_marker
            )))
        }
    };

    let header = &rows[header_row];
    let mut mapped: Vec<(usize, &str)> = Vec::with_capacity(rules.columns.len());
    for column in &rules.columns {
        let position = header
            .iter()
            .position(|cell| cell.trim() == column.source)
            .ok_or_else(|| {
                BotError::SchemaMismatch(format!("column '{}' absent from header", column.source))
            })?;
        mapped.push((position, column.canonical.as_str()));
    }

    let data_end = rows.len().saturating_sub(rules.trailing_rows);
    let data_start = header_row + 1;
    let mut records = Vec::new();
    for row in rows.iter().take(data_end).skip(data_start) {
        let mut fields = BTreeMap::new();
        for (position, canonical) in &mapped {
            let value = row
                .get(*position)
                .map(|cell| cell.trim().to_string())
                .unwrap_or_default();
            fields.insert((*canonical).to_string(), value);
        }
        let record = Record::new(fields);

        if let Some(filter) = &rules.include {
            let value = record.get(&filter.column).unwrap_or_default();
            if !filter.allowed.contains(value) {
                debug!(column = %filter.column, value, "row excluded by filter");
                continue;
            }
        }
        if let Some(required) = &rules.required {
            if record.get(required).unwrap_or_default().is_empty() {
                debug!(column = %required, "row dropped: required column empty");
                continue;
            }
        }
        if record.natural_key(&rules.natural_key).is_none() {
            warn!(key = ?rules.natural_key, "row dropped: incomplete natural key");
            continue;
        }
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> IngestRules {
        IngestRules {
            header_marker: "PDV".into(),
            trailing_rows: 0,
            columns: vec![
                ColumnMap::new("PDV", "pdv"),
                ColumnMap::new("Documento", "documento"),
                ColumnMap::new("Hora", "hora"),
            ],
            include: None,
            required: None,
            natural_key: vec!["documento".into(), "hora".into()],
        }
    }

    fn grid_with_header_at(k: usize) -> RawGrid {
        let mut rows: Vec<Vec<String>> = (0..k)
            .map(|i| vec![format!("banner {i}"), String::new(), String::new()])
            .collect();
        rows.push(vec!["PDV".into(), "Documento".into(), "Hora".into()]);
        rows.push(vec!["1".into(), "123".into(), "08:00".into()]);
        rows.push(vec!["2".into(), "456".into(), "09:30".into()]);
        RawGrid::new(rows)
    }

    #[test]
    fn header_found_at_any_depth() {
        for k in [0usize, 1, 4, 9] {
            let records = normalize(&grid_with_header_at(k), &rules()).unwrap();
            assert_eq!(records.len(), 2, "header at row {k}");
            assert_eq!(records[0].get("documento"), Some("123"));
        }
    }

    #[test]
    fn missing_marker_is_schema_mismatch() {
        let grid = RawGrid::new(vec![vec!["banner".into()], vec!["1".into(), "2".into()]]);
        match normalize(&grid, &rules()) {
            Err(BotError::SchemaMismatch(msg)) => assert!(msg.contains("not found")),
            other => panic!("expected SchemaMismatch, got {other:?}"),
        }
    }

    #[test]
    fn duplicated_marker_is_schema_mismatch() {
        let mut grid = grid_with_header_at(1);
        let mut rows = grid.rows().to_vec();
        rows.push(vec!["PDV".into(), "Documento".into(), "Hora".into()]);
        grid = RawGrid::new(rows);
        match normalize(&grid, &rules()) {
            Err(BotError::SchemaMismatch(msg)) => assert!(msg.contains("ambiguous")),
            other => panic!("expected SchemaMismatch, got {other:?}"),
        }
    }

    #[test]
    fn missing_mapped_column_is_schema_mismatch() {
        let mut r = rules();
        r.columns.push(ColumnMap::new("CCF", "ccf"));
        match normalize(&grid_with_header_at(0), &r) {
            Err(BotError::SchemaMismatch(msg)) => assert!(msg.contains("CCF")),
            other => panic!("expected SchemaMismatch, got {other:?}"),
        }
    }

    #[test]
    fn trailing_rows_are_trimmed() {
        let mut rows = grid_with_header_at(2).rows().to_vec();
        rows.push(vec!["Total".into(), "999".into(), "23:59".into()]);
        rows.push(vec![String::new(), String::new(), String::new()]);
        let mut r = rules();
        r.trailing_rows = 2;
        let records = normalize(&RawGrid::new(rows), &r).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|rec| rec.get("documento") != Some("999")));
    }

    #[test]
    fn inclusion_filter_keeps_allowed_values_only() {
        let rows = vec![
            vec!["Código".into(), "Loja".into(), "Doc".into()],
            vec!["a".into(), "1".into(), "d1".into()],
            vec!["b".into(), "2".into(), "d2".into()],
            vec!["c".into(), "3".into(), "d3".into()],
            vec!["d".into(), "4".into(), "d4".into()],
            vec!["e".into(), "PDV".into(), "d5".into()],
        ];
        let r = IngestRules {
            header_marker: "Código".into(),
            trailing_rows: 0,
            columns: vec![
                ColumnMap::new("Código", "sku"),
                ColumnMap::new("Loja", "loja"),
                ColumnMap::new("Doc", "documento"),
            ],
            include: Some(IncludeFilter {
                column: "loja".into(),
                allowed: ["1", "2", "3"].into_iter().map(String::from).collect(),
            }),
            required: None,
            natural_key: vec!["documento".into()],
        };
        let records = normalize(&RawGrid::new(rows), &r).unwrap();
        assert_eq!(records.len(), 3);
        let lojas: Vec<_> = records.iter().map(|r| r.get("loja").unwrap()).collect();
        assert_eq!(lojas, vec!["1", "2", "3"]);
    }

    #[test]
    fn rows_with_empty_required_column_are_dropped() {
        let mut rows = grid_with_header_at(0).rows().to_vec();
        rows.push(vec!["3".into(), String::new(), "10:00".into()]);
        let mut r = rules();
        r.required = Some("documento".into());
        let records = normalize(&RawGrid::new(rows), &r).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn surviving_records_have_fully_populated_keys() {
        let mut rows = grid_with_header_at(0).rows().to_vec();
        rows.push(vec!["3".into(), "789".into(), String::new()]);
        let r = rules();
        let records = normalize(&RawGrid::new(rows), &r).unwrap();
        assert_eq!(records.len(), 2);
        for record in &records {
            let key = record.natural_key(&r.natural_key).unwrap();
            assert!(key.iter().all(|part| !part.is_empty()));
        }
    }

    #[test]
    fn unmapped_natural_key_is_rejected_up_front() {
        let mut r = rules();
        r.natural_key.push("emissao".into());
        assert!(matches!(
            normalize(&grid_with_header_at(0), &r),
            Err(BotError::SchemaMismatch(_))
        ));
    }
}
