use crate::categorizer::Category;
use crate::loader::{Source, DEFAULT_URL};
use crate::queries::{RegionSelection, TOP_AGGREGATES};
use clap::Parser;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

/// Regional accounts 2012-2022: load, categorize and report.
#[derive(Debug, Clone, Parser)]
#[command(version, about)]
pub struct Config {
    /// Dataset URL (semicolon-delimited CSV)
    #[arg(long, default_value = DEFAULT_URL)]
    pub url: String,

    /// Read a local copy instead of fetching `--url`
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// HTTP timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,

    /// Directory receiving report files
    #[arg(long, default_value = ".")]
    pub out_dir: PathBuf,

    /// Category for the year/region series (Dépenses, Recettes, Autres)
    #[arg(long, default_value = "Dépenses", value_parser = parse_category)]
    pub category: Category,

    /// Years for the year/region series; empty selects none
    #[arg(long, value_delimiter = ',')]
    pub years: Vec<i32>,

    /// Regions for the year/region series; "Toutes les régions" selects all
    #[arg(long, value_delimiter = ',')]
    pub regions: Vec<String>,

    /// Region for the top-aggregates breakdown (first region when omitted)
    #[arg(long)]
    pub region: Option<String>,

    /// Number of aggregates kept before folding into "Autre"
    #[arg(long, default_value_t = TOP_AGGREGATES)]
    pub top: usize,
}

impl Config {
    pub fn source(&self) -> Source {
        match &self.input {
            Some(path) => Source::File(path.clone()),
            None => Source::Http {
                url: self.url.clone(),
                timeout: Duration::from_secs(self.timeout_secs),
            },
        }
    }

    pub fn year_selection(&self) -> BTreeSet<i32> {
        self.years.iter().copied().collect()
    }

    pub fn region_selection(&self) -> RegionSelection {
        RegionSelection::from_choices(self.regions.iter().cloned())
    }
}

fn parse_category(s: &str) -> Result<Category, String> {
    Category::parse(s).ok_or_else(|| format!("unknown category '{}'", s))
}
