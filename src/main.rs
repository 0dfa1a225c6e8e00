// Entry point and interactive menu.
//
// - Option [1] fetches and prepares the dataset once, printing diagnostics.
// - Option [2] runs every dashboard query, previews it and saves CSV files
//   plus a JSON summary.
// - Option [3] searches all columns for a term.
// - Option [4] writes the full prepared dataset as CSV.
use anyhow::{Context, Result};
use clap::Parser;
use regional_accounts::config::Config;
use regional_accounts::output::{self, EXPORT_FILE_NAME};
use regional_accounts::queries::{self, Dimension, DEFAULT_COLUMNS};
use regional_accounts::types::{AggregateAmount, RegionAggregateAmount};
use regional_accounts::util::{format_int, format_number};
use regional_accounts::{Category, DatasetCache};
use std::io::{self, BufRead, Write};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

struct App {
    config: Config,
    cache: DatasetCache,
}

/// Read a single trimmed line after printing `prompt`. `None` once input is
/// closed or unreadable.
fn read_line_from<R: BufRead>(input: &mut R, prompt: &str) -> Option<String> {
    print!("{}", prompt);
    let _ = io::stdout().flush();
    let mut buf = String::new();
    match input.read_line(&mut buf) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(buf.trim().to_string()),
    }
}

fn read_line(prompt: &str) -> Option<String> {
    read_line_from(&mut io::stdin().lock(), prompt)
}

/// Ask whether to return to the menu. `true` for `Y`; `false` for `N` or
/// closed input.
fn prompt_back_to_menu_from<R: BufRead>(input: &mut R) -> bool {
    loop {
        let Some(answer) = read_line_from(input, "Back to Report Selection (Y/N): ") else {
            return false;
        };
        match answer.to_uppercase().as_str() {
            "Y" => return true,
            "N" => return false,
            _ => println!("Invalid choice. Please enter Y or N."),
        }
    }
}

fn prompt_back_to_menu() -> bool {
    prompt_back_to_menu_from(&mut io::stdin().lock())
}

/// Handle option [1]. A second call reuses the cached dataset.
fn handle_load(app: &App) -> Result<()> {
    if app.cache.is_loaded() {
        println!("Dataset already loaded.\n");
        return Ok(());
    }
    let loaded = app.cache.get().context("failed to load dataset")?;
    if let Some(report) = &loaded.report {
        println!(
            "Processing dataset... ({} rows read, {} kept)",
            format_int(report.total_rows),
            format_int(report.kept_rows)
        );
        println!(
            "Note: {} rows dropped for a missing or non-positive amount, {} for an invalid year.",
            format_int(report.non_positive_amounts),
            format_int(report.parse_errors)
        );
        if !report.missing_drop_columns.is_empty() {
            println!(
                "Info: {} drop-list columns absent from source.",
                report.missing_drop_columns.len()
            );
        }
    }
    println!();
    Ok(())
}

/// Handle option [2]: every view of the dashboard, as previews and files.
fn handle_generate_reports(app: &App) -> Result<()> {
    if !app.cache.is_loaded() {
        println!("Error: No data loaded. Please load the dataset first (option 1).\n");
        return Ok(());
    }
    let loaded = app.cache.get()?;
    let data = loaded.dataset.as_ref();
    let cfg = &app.config;
    std::fs::create_dir_all(&cfg.out_dir)
        .with_context(|| format!("cannot create {}", cfg.out_dir.display()))?;
    let path = |name: &str| cfg.out_dir.join(name);

    println!("Data preview ({} columns)\n", DEFAULT_COLUMNS.len());
    let preview = queries::select_columns(data, &DEFAULT_COLUMNS);
    output::preview_grid(&preview.headers, &preview.rows, 5);

    println!("Entries per region:");
    for (region, count) in queries::count_by(data, &Dimension::Region) {
        println!("  {:<40} {}", region, format_int(count));
    }
    println!("Entries per collectivity type:");
    for (categ, count) in queries::count_by(data, &Dimension::Column("categ".into())) {
        println!("  {:<40} {}", categ, format_int(count));
    }
    println!();

    println!("Spend and revenue per year:");
    let spend = queries::sum_by_year(data, Category::Spend);
    let revenue = queries::sum_by_year(data, Category::Revenue);
    for year in spend.keys().chain(revenue.keys()).collect::<std::collections::BTreeSet<_>>() {
        println!(
            "  {}  {:>22}  {:>22}",
            year,
            format_number(spend.get(year).copied().unwrap_or(0.0), 2),
            format_number(revenue.get(year).copied().unwrap_or(0.0), 2)
        );
    }
    println!("Totals per category:");
    for (category, total) in queries::sum_by_category(data) {
        println!("  {:<10} {:>22}", category, format_number(total, 2));
    }
    println!();

    let series = queries::year_region_series(
        data,
        cfg.category,
        &cfg.year_selection(),
        &cfg.region_selection(),
    );
    output::write_csv(&path("year_region_series.csv"), &series)?;
    println!("{} per year and region", cfg.category);
    output::preview_table_rows(&series, 10);

    let per_capita = queries::per_capita_ranking(data, Category::Spend);
    output::write_csv(&path("spend_per_capita.csv"), &per_capita)?;
    println!("Average spend per inhabitant by region");
    output::preview_table_rows(&per_capita, 5);

    let region = match &cfg.region {
        Some(r) => r.clone(),
        None => queries::filter_options(data, Category::Spend)
            .regions
            .into_iter()
            .nth(1)
            .unwrap_or_default(),
    };
    let top = queries::top_aggregates(data, &region, cfg.top);
    let top_rows: Vec<AggregateAmount> = top.rows();
    output::write_csv(&path("top_aggregates.csv"), &top_rows)?;
    println!("Aggregates by amount - {}", top.region);
    output::preview_table_rows(&top_rows, cfg.top + 1);

    let label_totals: Vec<AggregateAmount> = queries::sum_by_label(data)
        .into_iter()
        .map(|(label, amount)| AggregateAmount { label, amount })
        .collect();
    output::write_csv(&path("aggregate_totals.csv"), &label_totals)?;

    let ranking: Vec<RegionAggregateAmount> = queries::region_aggregate_ranking(data);
    output::write_csv(&path("region_aggregate_ranking.csv"), &ranking)?;
    println!("Most expensive aggregates per region");
    output::preview_table_rows(&queries::top_per_region(data, 5), 10);

    println!("Amount share per region:");
    let by_region = queries::sum_by_region(data);
    let grand_total: f64 = by_region.values().sum();
    for (region, total) in &by_region {
        let share = if grand_total > 0.0 { total / grand_total * 100.0 } else { 0.0 };
        println!("  {:<40} {:>6}%", region, format_number(share, 1));
    }
    println!();

    let density = queries::amount_density(data, 100);
    output::write_csv(&path("amount_density.csv"), &density)?;

    let matrix = queries::correlation_matrix(data);
    println!("Correlation between numeric columns");
    if matrix.is_empty() {
        println!("(not enough numeric data)\n");
    } else {
        let rows: Vec<Vec<String>> = matrix
            .columns
            .iter()
            .zip(&matrix.values)
            .map(|(name, values)| {
                std::iter::once(name.clone())
                    .chain(values.iter().map(|v| format!("{:.2}", v)))
                    .collect()
            })
            .collect();
        let headers: Vec<String> = std::iter::once(String::new())
            .chain(matrix.columns.iter().cloned())
            .collect();
        output::preview_grid(&headers, &rows, rows.len());
    }

    let summary = queries::summarize(data, loaded.report.as_ref());
    output::write_json(&path("summary.json"), &summary)?;
    println!("Summary Stats (summary.json):");
    println!(
        "{{\"regions\": {}, \"years\": \"{}-{}\", \"records\": {}}}\n",
        summary.total_regions,
        summary.first_year.unwrap_or_default(),
        summary.last_year.unwrap_or_default(),
        format_int(summary.kept_rows)
    );
    info!(out_dir = %cfg.out_dir.display(), "reports written");
    Ok(())
}

/// Handle option [3]: substring search over every column.
fn handle_search(app: &App) -> Result<()> {
    let data = app.cache.dataset().context("failed to load dataset")?;
    let Some(term) = read_line("Search term: ") else {
        return Ok(());
    };
    let hits = queries::search(&data, &term);
    if hits.is_empty() {
        println!("No result found for the search.\n");
        return Ok(());
    }
    println!("{} matching records", format_int(hits.len()));
    let headers: Vec<String> = data.schema.names().map(str::to_string).collect();
    let rows: Vec<Vec<String>> = hits
        .iter()
        .map(|r| data.fields(r).map(|v| v.to_string()).collect())
        .collect();
    output::preview_grid(&headers, &rows, 20);
    Ok(())
}

/// Handle option [4]: write the prepared dataset for download.
fn handle_export(app: &App) -> Result<()> {
    let data = app.cache.dataset().context("failed to load dataset")?;
    let blob = output::to_csv_blob(&data)?;
    let path = app.config.out_dir.join(EXPORT_FILE_NAME);
    std::fs::write(&path, blob).with_context(|| format!("cannot write {}", path.display()))?;
    println!("Dataset exported to {}\n", path.display());
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::parse();
    let app = App {
        cache: DatasetCache::new(config.source()),
        config,
    };

    loop {
        println!("Regional accounts 2012-2022");
        println!("[1] Load the dataset");
        println!("[2] Generate Reports");
        println!("[3] Search records");
        println!("[4] Export dataset\n");
        let Some(choice) = read_line("Enter choice: ") else {
            println!("\nExiting the program.");
            break;
        };
        let outcome = match choice.as_str() {
            "1" => handle_load(&app),
            "2" => {
                println!();
                let result = handle_generate_reports(&app);
                if result.is_ok() && !prompt_back_to_menu() {
                    println!("Exiting the program.");
                    break;
                }
                result
            }
            "3" => handle_search(&app),
            "4" => handle_export(&app),
            _ => {
                println!("Invalid choice. Please enter 1, 2, 3 or 4.\n");
                Ok(())
            }
        };
        if let Err(e) = outcome {
            error!("{:#}", e);
        }
    }
}
