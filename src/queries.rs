// Aggregations behind each dashboard view.
//
// Every function here is a pure read of the dataset plus explicit parameters,
// so views can be recomputed in any order.
use crate::categorizer::Category;
use crate::preparer::PrepareReport;
use crate::types::{
    AggregateAmount, CategoryTotal, ColumnKind, Dataset, DatasetSummary, DensityPoint, Record,
    RegionAggregateAmount, RegionAverage, YearRegionAmount,
};
use crate::util::{average, pearson, std_dev};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Widget value standing for "every region".
pub const ALL_REGIONS: &str = "Toutes les régions";
/// Label of the bucket collecting everything outside the top aggregates.
pub const OTHER_BUCKET: &str = "Autre";
pub const TOP_AGGREGATES: usize = 10;
pub const DEFAULT_COLUMNS: [&str; 4] = ["exer", "reg_name", "montant", "agregat"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dimension {
    Region,
    Category,
    Year,
    Label,
    /// Any schema column by name, e.g. the source's `categ`.
    Column(String),
}

pub fn count_by(dataset: &Dataset, dimension: &Dimension) -> BTreeMap<String, usize> {
    let kind = match dimension {
        Dimension::Region => ColumnKind::Region,
        Dimension::Category => ColumnKind::Category,
        Dimension::Year => ColumnKind::Year,
        Dimension::Label => ColumnKind::Label,
        Dimension::Column(name) => match dataset.schema.find(name) {
            Some(col) => col.kind,
            None => return BTreeMap::new(),
        },
    };
    let mut counts = BTreeMap::new();
    for r in &dataset.records {
        *counts.entry(r.field(kind).to_string()).or_insert(0) += 1;
    }
    counts
}

pub fn sum_by_year(dataset: &Dataset, category: Category) -> BTreeMap<i32, f64> {
    let mut totals = BTreeMap::new();
    for r in dataset.records.iter().filter(|r| r.category == category) {
        *totals.entry(r.year).or_insert(0.0) += r.amount;
    }
    totals
}

pub fn sum_by_category(dataset: &Dataset) -> BTreeMap<Category, f64> {
    let mut totals = BTreeMap::new();
    for r in &dataset.records {
        *totals.entry(r.category).or_insert(0.0) += r.amount;
    }
    totals
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionSelection {
    All,
    Only(BTreeSet<String>),
}

impl RegionSelection {
    /// Build from raw widget choices; the [`ALL_REGIONS`] sentinel wins.
    pub fn from_choices<I, S>(choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let choices: BTreeSet<String> = choices.into_iter().map(Into::into).collect();
        if choices.contains(ALL_REGIONS) {
            RegionSelection::All
        } else {
            RegionSelection::Only(choices)
        }
    }

    pub fn contains(&self, region: &str) -> bool {
        match self {
            RegionSelection::All => true,
            RegionSelection::Only(set) => set.contains(region),
        }
    }
}

/// Summed amounts per (year, region) for one category, ordered by year then
/// region. Empty when no year or no region is selected.
pub fn year_region_series(
    dataset: &Dataset,
    category: Category,
    years: &BTreeSet<i32>,
    regions: &RegionSelection,
) -> Vec<YearRegionAmount> {
    let mut totals: BTreeMap<(i32, &str), f64> = BTreeMap::new();
    for r in &dataset.records {
        if r.category == category && years.contains(&r.year) && regions.contains(&r.region_name) {
            *totals.entry((r.year, r.region_name.as_str())).or_insert(0.0) += r.amount;
        }
    }
    totals
        .into_iter()
        .map(|((year, region), amount)| YearRegionAmount {
            year,
            region: region.to_string(),
            amount,
        })
        .collect()
}

/// Mean per-capita amount per region, highest first.
pub fn per_capita_ranking(dataset: &Dataset, category: Category) -> Vec<RegionAverage> {
    let mut by_region: HashMap<&str, Vec<f64>> = HashMap::new();
    for r in dataset.records.iter().filter(|r| r.category == category) {
        if let Some(v) = r.amount_per_capita {
            by_region.entry(r.region_name.as_str()).or_default().push(v);
        }
    }
    let mut rows: Vec<RegionAverage> = by_region
        .into_iter()
        .map(|(region, values)| RegionAverage {
            region: region.to_string(),
            average: average(&values),
        })
        .collect();
    rows.sort_by(|a, b| {
        b.average
            .partial_cmp(&a.average)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.region.cmp(&b.region))
    });
    rows
}

#[derive(Debug, Clone, PartialEq)]
pub struct TopAggregates {
    pub region: String,
    pub top: Vec<AggregateAmount>,
    /// Sum of every label outside `top`; 0 when nothing is left over.
    pub other: f64,
}

impl TopAggregates {
    pub fn total(&self) -> f64 {
        self.top.iter().map(|a| a.amount).sum::<f64>() + self.other
    }

    /// `top` followed by the synthetic [`OTHER_BUCKET`] row.
    pub fn rows(&self) -> Vec<AggregateAmount> {
        let mut rows = self.top.clone();
        rows.push(AggregateAmount {
            label: OTHER_BUCKET.to_string(),
            amount: self.other,
        });
        rows
    }
}

/// The `n` largest aggregates of a region, the rest folded into `other`.
///
/// Labels are ranked with a stable sort on descending amount over the
/// alphabetically ordered sums, so equal amounts keep label order.
pub fn top_aggregates(dataset: &Dataset, region: &str, n: usize) -> TopAggregates {
    let mut by_label: BTreeMap<&str, f64> = BTreeMap::new();
    for r in dataset.records.iter().filter(|r| r.region_name == region) {
        *by_label.entry(r.aggregate_label.as_str()).or_insert(0.0) += r.amount;
    }
    let mut sums: Vec<AggregateAmount> = by_label
        .into_iter()
        .map(|(label, amount)| AggregateAmount {
            label: label.to_string(),
            amount,
        })
        .collect();
    sums.sort_by(|a, b| b.amount.partial_cmp(&a.amount).unwrap_or(Ordering::Equal));
    let rest = if sums.len() > n { sums.split_off(n) } else { Vec::new() };
    TopAggregates {
        region: region.to_string(),
        top: sums,
        other: rest.iter().map(|a| a.amount).sum(),
    }
}

/// Records where `term` occurs, ignoring case, in any column's text.
///
/// An empty term matches every record.
pub fn search<'a>(dataset: &'a Dataset, term: &str) -> Vec<&'a Record> {
    let needle = term.to_lowercase();
    if needle.is_empty() {
        return dataset.records.iter().collect();
    }
    dataset
        .records
        .iter()
        .filter(|r| {
            dataset
                .fields(r)
                .any(|v| v.to_string().to_lowercase().contains(&needle))
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    pub values: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.columns.iter().position(|c| c == a)?;
        let j = self.columns.iter().position(|c| c == b)?;
        Some(self.values[i][j])
    }
}

/// Pairwise Pearson coefficients over the numeric columns.
///
/// Each pair uses the rows where both cells are present. Pairs without two
/// such rows, or without variance, are NaN. The diagonal is always 1.
pub fn correlation_matrix(dataset: &Dataset) -> CorrelationMatrix {
    let numeric: Vec<(&str, ColumnKind)> = dataset
        .schema
        .columns
        .iter()
        .filter(|c| c.kind.is_numeric())
        .map(|c| (c.name.as_str(), c.kind))
        .collect();
    if numeric.len() < 2 || dataset.len() < 2 {
        return CorrelationMatrix::default();
    }

    let series: Vec<Vec<Option<f64>>> = numeric
        .iter()
        .map(|(_, kind)| dataset.records.iter().map(|r| r.number(*kind)).collect())
        .collect();

    let k = numeric.len();
    let mut values = vec![vec![f64::NAN; k]; k];
    for i in 0..k {
        values[i][i] = 1.0;
        for j in (i + 1)..k {
            let (xs, ys): (Vec<f64>, Vec<f64>) = series[i]
                .iter()
                .zip(&series[j])
                .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
                .unzip();
            let r = pearson(&xs, &ys);
            values[i][j] = r;
            values[j][i] = r;
        }
    }
    CorrelationMatrix {
        columns: numeric.iter().map(|(name, _)| name.to_string()).collect(),
        values,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterOptions {
    pub years: Vec<i32>,
    /// Sorted region names, led by [`ALL_REGIONS`].
    pub regions: Vec<String>,
}

pub fn filter_options(dataset: &Dataset, category: Category) -> FilterOptions {
    let rows = dataset.records.iter().filter(|r| r.category == category);
    let years: BTreeSet<i32> = rows.clone().map(|r| r.year).collect();
    let regions: BTreeSet<&str> = rows.map(|r| r.region_name.as_str()).collect();
    FilterOptions {
        years: years.into_iter().collect(),
        regions: std::iter::once(ALL_REGIONS.to_string())
            .chain(regions.into_iter().map(str::to_string))
            .collect(),
    }
}

pub fn sum_by_label(dataset: &Dataset) -> BTreeMap<String, f64> {
    let mut totals = BTreeMap::new();
    for r in &dataset.records {
        *totals.entry(r.aggregate_label.clone()).or_insert(0.0) += r.amount;
    }
    totals
}

pub fn sum_by_region(dataset: &Dataset) -> BTreeMap<String, f64> {
    let mut totals = BTreeMap::new();
    for r in &dataset.records {
        *totals.entry(r.region_name.clone()).or_insert(0.0) += r.amount;
    }
    totals
}

/// Every (region, aggregate) total, largest first.
pub fn region_aggregate_ranking(dataset: &Dataset) -> Vec<RegionAggregateAmount> {
    let mut totals: BTreeMap<(&str, &str), f64> = BTreeMap::new();
    for r in &dataset.records {
        *totals
            .entry((r.region_name.as_str(), r.aggregate_label.as_str()))
            .or_insert(0.0) += r.amount;
    }
    let mut rows: Vec<RegionAggregateAmount> = totals
        .into_iter()
        .map(|((region, label), amount)| RegionAggregateAmount {
            region: region.to_string(),
            label: label.to_string(),
            amount,
        })
        .collect();
    // BTreeMap order already breaks ties by (region, label); sort is stable.
    rows.sort_by(|a, b| b.amount.partial_cmp(&a.amount).unwrap_or(Ordering::Equal));
    rows
}

/// First `n` rows of [`region_aggregate_ranking`] for each region.
pub fn top_per_region(dataset: &Dataset, n: usize) -> Vec<RegionAggregateAmount> {
    let mut taken: HashMap<String, usize> = HashMap::new();
    region_aggregate_ranking(dataset)
        .into_iter()
        .filter(|row| {
            let count = taken.entry(row.region.clone()).or_insert(0);
            *count += 1;
            *count <= n
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Data preview restricted to the named columns; unknown names are skipped.
pub fn select_columns(dataset: &Dataset, names: &[&str]) -> Projection {
    let columns: Vec<_> = names
        .iter()
        .filter_map(|name| dataset.schema.find(name))
        .collect();
    Projection {
        headers: columns.iter().map(|c| c.name.clone()).collect(),
        rows: dataset
            .records
            .iter()
            .map(|r| columns.iter().map(|c| r.field(c.kind).to_string()).collect())
            .collect(),
    }
}

/// Gaussian kernel density of `montant` per region.
///
/// Bandwidth follows Scott's rule per region; every region is evaluated on the
/// same `steps` points spanning the overall amount range. Regions with fewer
/// than two records or no spread are left out.
pub fn amount_density(dataset: &Dataset, steps: usize) -> Vec<DensityPoint> {
    if dataset.is_empty() || steps < 2 {
        return Vec::new();
    }
    let (lo, hi) = dataset
        .records
        .iter()
        .fold((f64::MAX, f64::MIN), |(lo, hi), r| (lo.min(r.amount), hi.max(r.amount)));
    let step = (hi - lo) / (steps - 1) as f64;

    let mut by_region: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for r in &dataset.records {
        by_region.entry(r.region_name.as_str()).or_default().push(r.amount);
    }

    let norm = (2.0 * std::f64::consts::PI).sqrt();
    let mut points = Vec::new();
    for (region, values) in by_region {
        let Some(sd) = std_dev(&values).filter(|sd| *sd > 0.0) else {
            continue;
        };
        let n = values.len() as f64;
        let bandwidth = sd * n.powf(-0.2);
        for i in 0..steps {
            let x = lo + step * i as f64;
            let density = values
                .iter()
                .map(|v| (-0.5 * ((x - v) / bandwidth).powi(2)).exp())
                .sum::<f64>()
                / (n * bandwidth * norm);
            points.push(DensityPoint {
                region: region.to_string(),
                value: x,
                density,
            });
        }
    }
    points
}

pub fn summarize(dataset: &Dataset, report: Option<&PrepareReport>) -> DatasetSummary {
    let regions: BTreeSet<&str> = dataset.records.iter().map(|r| r.region_name.as_str()).collect();
    let years: BTreeSet<i32> = dataset.records.iter().map(|r| r.year).collect();
    DatasetSummary {
        loaded_at: report.map(|r| r.loaded_at).unwrap_or_else(chrono::Utc::now),
        total_rows: report.map(|r| r.total_rows).unwrap_or(dataset.len()),
        kept_rows: dataset.len(),
        total_regions: regions.len(),
        first_year: years.first().copied(),
        last_year: years.last().copied(),
        category_totals: sum_by_category(dataset)
            .into_iter()
            .map(|(category, total)| CategoryTotal { category, total })
            .collect(),
    }
}
