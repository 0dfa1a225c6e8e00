use crate::categorizer::categorize;
use crate::errors::{DashboardError, Result};
use crate::types::{
    Column, ColumnKind, Dataset, RawTable, Record, Schema, COL_AMOUNT, COL_CATEGORY, COL_LABEL,
    COL_PER_CAPITA, COL_REGION, COL_YEAR,
};
use crate::util::{parse_f64_safe, parse_i32_safe};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

/// Identifier and display-ordering columns with no analytical value.
pub const DROP_COLUMNS: [&str; 16] = [
    "agregat_niveau",
    "ordre_analyse1_section1",
    "ordre_analyse1_section2",
    "ordre_analyse1_section3",
    "ordre_analyse2_section1",
    "ordre_analyse2_section2",
    "ordre_analyse2_section3",
    "ordre_analyse3_section1",
    "ordre_analyse3_section2",
    "ordre_analyse3_section3",
    "ordre_analyse4_section1",
    "ordre_affichage",
    "ident",
    "nomen",
    "siren",
    "cbudg",
];

#[derive(Debug, Clone)]
pub struct PrepareReport {
    pub loaded_at: DateTime<Utc>,
    pub total_rows: usize,
    pub kept_rows: usize,
    pub non_positive_amounts: usize,
    pub parse_errors: usize,
    pub missing_drop_columns: Vec<String>,
}

/// Clean a raw table into the categorized [`Dataset`].
///
/// Rows whose `montant` is missing, non-numeric, zero or negative are dropped
/// silently, as are rows without an integer `exer`. Drop-list columns that
/// are absent from the source are skipped and reported rather than rejected.
pub fn prepare(raw: &RawTable) -> Result<(Dataset, PrepareReport)> {
    let required = |name: &str| {
        raw.column_index(name)
            .ok_or_else(|| DashboardError::MissingColumn(name.to_string()))
    };
    let year_idx = required(COL_YEAR)?;
    let region_idx = required(COL_REGION)?;
    let amount_idx = required(COL_AMOUNT)?;
    let label_idx = required(COL_LABEL)?;
    let per_capita_idx = raw.column_index(COL_PER_CAPITA);

    let (mut retained, missing_drop_columns) = prune_columns(&raw.headers);
    // The derived category replaces any source column of the same name.
    retained.retain(|&i| raw.headers[i] != COL_CATEGORY);

    // Source indices of the columns carried verbatim on each record.
    let extra_sources: Vec<usize> = retained
        .iter()
        .copied()
        .filter(|&i| ![year_idx, region_idx, amount_idx, label_idx].contains(&i))
        .filter(|&i| Some(i) != per_capita_idx)
        .collect();

    let mut non_positive_amounts = 0usize;
    let mut parse_errors = 0usize;
    let mut records = Vec::with_capacity(raw.rows.len());

    for row in &raw.rows {
        let amount = match parse_f64_safe(row.get(amount_idx)) {
            Some(v) if v > 0.0 => v,
            _ => {
                non_positive_amounts += 1;
                continue;
            }
        };
        let Some(year) = parse_i32_safe(row.get(year_idx)) else {
            parse_errors += 1;
            continue;
        };
        let aggregate_label = row.get(label_idx).unwrap_or_default().to_string();
        let category = categorize(&aggregate_label);

        records.push(Record {
            year,
            region_name: row.get(region_idx).unwrap_or_default().trim().to_string(),
            amount,
            category,
            aggregate_label,
            amount_per_capita: per_capita_idx.and_then(|i| parse_f64_safe(row.get(i))),
            extra: extra_sources
                .iter()
                .map(|&i| row.get(i).unwrap_or_default().to_string())
                .collect(),
        });
    }

    let schema = build_schema(raw, &retained, &extra_sources, &records, per_capita_idx);

    let report = PrepareReport {
        loaded_at: Utc::now(),
        total_rows: raw.rows.len(),
        kept_rows: records.len(),
        non_positive_amounts,
        parse_errors,
        missing_drop_columns,
    };
    info!(
        total = report.total_rows,
        kept = report.kept_rows,
        non_positive = report.non_positive_amounts,
        parse_errors = report.parse_errors,
        "prepared dataset"
    );
    Ok((Dataset { schema, records }, report))
}

/// Indices of the headers that survive the drop-list, and the drop-list
/// names that were not present.
pub fn prune_columns(headers: &[String]) -> (Vec<usize>, Vec<String>) {
    let missing: Vec<String> = DROP_COLUMNS
        .iter()
        .filter(|name| !headers.iter().any(|h| h == *name))
        .map(|name| name.to_string())
        .collect();
    for name in &missing {
        debug!(column = %name, "drop-list column not present in source");
    }
    let retained = headers
        .iter()
        .enumerate()
        .filter(|(_, h)| !DROP_COLUMNS.contains(&h.as_str()))
        .map(|(i, _)| i)
        .collect();
    (retained, missing)
}

fn build_schema(
    raw: &RawTable,
    retained: &[usize],
    extra_sources: &[usize],
    records: &[Record],
    per_capita_idx: Option<usize>,
) -> Schema {
    let mut columns: Vec<Column> = retained
        .iter()
        .map(|&i| {
            let name = raw.headers[i].clone();
            let kind = match name.as_str() {
                COL_YEAR => ColumnKind::Year,
                COL_REGION => ColumnKind::Region,
                COL_AMOUNT => ColumnKind::Amount,
                COL_LABEL => ColumnKind::Label,
                _ if Some(i) == per_capita_idx => ColumnKind::PerCapita,
                _ => {
                    let index = extra_sources.iter().position(|&s| s == i).unwrap_or(0);
                    ColumnKind::Extra {
                        index,
                        numeric: is_numeric_column(records, index),
                    }
                }
            };
            Column { name, kind }
        })
        .collect();
    columns.push(Column {
        name: COL_CATEGORY.to_string(),
        kind: ColumnKind::Category,
    });
    Schema { columns }
}

fn is_numeric_column(records: &[Record], index: usize) -> bool {
    let mut seen = false;
    for r in records {
        let cell = r.extra.get(index).map(|s| s.trim()).unwrap_or_default();
        if cell.is_empty() {
            continue;
        }
        if parse_f64_safe(Some(cell)).is_none() {
            return false;
        }
        seen = true;
    }
    seen
}
