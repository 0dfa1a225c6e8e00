use crate::categorizer::Category;
use serde::Serialize;
use std::fmt;
use tabled::Tabled;

pub const COL_YEAR: &str = "exer";
pub const COL_REGION: &str = "reg_name";
pub const COL_AMOUNT: &str = "montant";
pub const COL_LABEL: &str = "agregat";
pub const COL_PER_CAPITA: &str = "euros_par_habitant";
pub const COL_CATEGORY: &str = "categorie";

/// The payload as parsed: header row plus untyped rows.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<csv::StringRecord>,
}

impl RawTable {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }
}

/// How a schema column is stored on a [`Record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Year,
    Region,
    Amount,
    Label,
    PerCapita,
    Category,
    /// Index into `Record::extra`; `numeric` when every non-empty cell parses.
    Extra { index: usize, numeric: bool },
}

impl ColumnKind {
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            ColumnKind::Year | ColumnKind::Amount | ColumnKind::PerCapita
        ) || matches!(self, ColumnKind::Extra { numeric: true, .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

/// Retained columns in source order, with the derived category last.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    pub columns: Vec<Column>,
}

impl Schema {
    pub fn find(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn has_per_capita(&self) -> bool {
        self.columns.iter().any(|c| c.kind == ColumnKind::PerCapita)
    }
}

/// One prepared row. `amount` is always strictly positive.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub year: i32,
    pub region_name: String,
    pub amount: f64,
    pub aggregate_label: String,
    pub amount_per_capita: Option<f64>,
    pub category: Category,
    pub extra: Vec<String>,
}

impl Record {
    pub fn field(&self, kind: ColumnKind) -> FieldValue<'_> {
        match kind {
            ColumnKind::Year => FieldValue::Int(i64::from(self.year)),
            ColumnKind::Region => FieldValue::Text(&self.region_name),
            ColumnKind::Amount => FieldValue::Float(self.amount),
            ColumnKind::Label => FieldValue::Text(&self.aggregate_label),
            ColumnKind::PerCapita => self
                .amount_per_capita
                .map(FieldValue::Float)
                .unwrap_or(FieldValue::Missing),
            ColumnKind::Category => FieldValue::Text(self.category.label()),
            ColumnKind::Extra { index, .. } => match self.extra.get(index) {
                Some(s) if !s.is_empty() => FieldValue::Text(s),
                _ => FieldValue::Missing,
            },
        }
    }

    /// Numeric view of a column, `None` for text or missing cells.
    pub fn number(&self, kind: ColumnKind) -> Option<f64> {
        match self.field(kind) {
            FieldValue::Int(i) => Some(i as f64),
            FieldValue::Float(f) => Some(f),
            FieldValue::Text(s) if kind.is_numeric() => crate::util::parse_f64_safe(Some(s)),
            _ => None,
        }
    }
}

/// A single cell with its string conversion.
///
/// Search, column projection and export all go through `Display` so the three
/// agree on how a value reads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Int(i64),
    Float(f64),
    Text(&'a str),
    Missing,
}

impl fmt::Display for FieldValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Missing => Ok(()),
        }
    }
}

/// The prepared, categorized table. Built once, read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub schema: Schema,
    pub records: Vec<Record>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn fields<'a>(&'a self, record: &'a Record) -> impl Iterator<Item = FieldValue<'a>> + 'a {
        self.schema.columns.iter().map(move |c| record.field(c.kind))
    }
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct YearRegionAmount {
    #[serde(rename = "exer")]
    #[tabled(rename = "Year")]
    pub year: i32,
    #[serde(rename = "reg_name")]
    #[tabled(rename = "Region")]
    pub region: String,
    #[serde(rename = "montant")]
    #[tabled(rename = "Amount", display_with = "display_amount")]
    pub amount: f64,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct RegionAverage {
    #[serde(rename = "reg_name")]
    #[tabled(rename = "Region")]
    pub region: String,
    #[serde(rename = "euros_par_habitant")]
    #[tabled(rename = "AvgPerCapita", display_with = "display_amount")]
    pub average: f64,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct AggregateAmount {
    #[serde(rename = "agregat")]
    #[tabled(rename = "Aggregate")]
    pub label: String,
    #[serde(rename = "montant")]
    #[tabled(rename = "Amount", display_with = "display_amount")]
    pub amount: f64,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct RegionAggregateAmount {
    #[serde(rename = "reg_name")]
    #[tabled(rename = "Region")]
    pub region: String,
    #[serde(rename = "agregat")]
    #[tabled(rename = "Aggregate")]
    pub label: String,
    #[serde(rename = "montant")]
    #[tabled(rename = "Amount", display_with = "display_amount")]
    pub amount: f64,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct DensityPoint {
    #[serde(rename = "reg_name")]
    #[tabled(rename = "Region")]
    pub region: String,
    #[tabled(rename = "Value", display_with = "display_amount")]
    pub value: f64,
    #[tabled(rename = "Density")]
    pub density: f64,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct CategoryTotal {
    pub category: Category,
    pub total: f64,
}

#[derive(Debug, Serialize, Clone)]
pub struct DatasetSummary {
    pub loaded_at: chrono::DateTime<chrono::Utc>,
    pub total_rows: usize,
    pub kept_rows: usize,
    pub total_regions: usize,
    pub first_year: Option<i32>,
    pub last_year: Option<i32>,
    pub category_totals: Vec<CategoryTotal>,
}

fn display_amount(v: &f64) -> String {
    crate::util::format_number(*v, 2)
}
