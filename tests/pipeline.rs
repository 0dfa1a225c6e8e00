use regional_accounts::loader::{load, parse_table, Source};
use regional_accounts::output::to_csv_blob;
use regional_accounts::preparer::prepare;
use regional_accounts::queries::{
    self, Dimension, RegionSelection, ALL_REGIONS, OTHER_BUCKET, TOP_AGGREGATES,
};
use regional_accounts::{categorize, Category, Dataset, DatasetCache};
use std::collections::BTreeSet;
use std::io::Write;
use std::sync::Arc;

fn dataset_from(csv: &str) -> Dataset {
    let raw = parse_table(csv.as_bytes(), "fixture").unwrap();
    prepare(&raw).unwrap().0
}

/// A slice of the real layout: identifiers, ordering hints and a few
/// regions with more than ten aggregates each.
fn realistic_csv() -> String {
    let labels = [
        "Frais de personnel",
        "Achats et charges externes",
        "Charges financières",
        "Dépenses d'intervention",
        "Annuité de la dette",
        "Impôts locaux",
        "TVA",
        "TICPE",
        "Cartes grises",
        "CVAE",
        "FCTVA",
        "DRES",
        "Autre chose",
    ];
    let mut out = String::from(
        "exer;ident;reg_code;reg_name;siren;nomen;cbudg;categ;agregat;montant;euros_par_habitant;ordre_affichage;agregat_niveau\n",
    );
    for (y, year) in [2015, 2016, 2017].iter().enumerate() {
        for (r, region) in ["Bretagne", "Corse", "Île-de-France"].iter().enumerate() {
            for (l, label) in labels.iter().enumerate() {
                let amount = (l as f64 + 1.0) * 1000.0 + (r * 10 + y) as f64;
                let per_capita = amount / ((r + 1) as f64 * 100.0);
                out.push_str(&format!(
                    "{year};{r};{r}{r};{region};23000000{r};M57;1;Region;{label};{amount};{per_capita};{l};2\n"
                ));
            }
        }
        out.push_str(&format!("{year};9;99;Corse;0;M57;1;CTU;TVA;0;0;1;2\n"));
        out.push_str(&format!("{year};9;99;Corse;0;M57;1;CTU;TVA;-12;-1;1;2\n"));
    }
    out
}

#[test]
fn three_record_scenario() {
    let ds = dataset_from(
        "exer;reg_name;montant;agregat\n\
2020;A;100;Impôts locaux\n\
2020;A;50;Frais de personnel\n\
2021;B;200;Impôts locaux\n",
    );
    let categories: Vec<Category> = ds.records.iter().map(|r| r.category).collect();
    assert_eq!(categories, vec![Category::Revenue, Category::Spend, Category::Revenue]);

    let totals = queries::sum_by_category(&ds);
    assert_eq!(totals.len(), 2);
    assert_eq!(totals[&Category::Revenue], 300.0);
    assert_eq!(totals[&Category::Spend], 50.0);

    let revenue = queries::sum_by_year(&ds, Category::Revenue);
    assert_eq!(revenue.into_iter().collect::<Vec<_>>(), vec![(2020, 100.0), (2021, 200.0)]);
}

#[test]
fn prepared_records_hold_the_invariants() {
    let ds = dataset_from(&realistic_csv());
    assert_eq!(ds.len(), 3 * 3 * 13);
    for r in &ds.records {
        assert!(r.amount > 0.0);
        assert_eq!(r.category, categorize(&r.aggregate_label));
    }
    for dropped in ["ident", "siren", "nomen", "cbudg", "ordre_affichage", "agregat_niveau"] {
        assert!(ds.schema.find(dropped).is_none(), "{dropped} should be pruned");
    }
    assert!(ds.schema.find("reg_code").is_some());
}

#[test]
fn category_totals_match_amount_weighted_counts() {
    let ds = dataset_from(&realistic_csv());
    let totals = queries::sum_by_category(&ds);
    let counts = queries::count_by(&ds, &Dimension::Category);
    for category in Category::ALL {
        let weighted: f64 = ds
            .records
            .iter()
            .filter(|r| r.category == category)
            .map(|r| r.amount)
            .sum();
        let total = totals.get(&category).copied().unwrap_or(0.0);
        assert!((total - weighted).abs() < 1e-6);
        let count = counts.get(category.label()).copied().unwrap_or(0);
        assert_eq!(count, ds.records.iter().filter(|r| r.category == category).count());
    }
}

#[test]
fn top_ten_plus_other_equals_region_total() {
    let ds = dataset_from(&realistic_csv());
    let region_totals = queries::sum_by_region(&ds);
    for (region, total) in &region_totals {
        let top = queries::top_aggregates(&ds, region, TOP_AGGREGATES);
        assert_eq!(top.top.len(), TOP_AGGREGATES);
        assert!(top.other > 0.0);
        assert!((top.total() - total).abs() < 1e-6);
        assert!(top.top.windows(2).all(|w| w[0].amount >= w[1].amount));
        assert_eq!(top.rows().last().unwrap().label, OTHER_BUCKET);
    }
}

#[test]
fn all_regions_series_matches_yearly_category_total() {
    let ds = dataset_from(&realistic_csv());
    let years = BTreeSet::from([2015]);
    let all = RegionSelection::from_choices([ALL_REGIONS]);
    for category in [Category::Spend, Category::Revenue] {
        let series = queries::year_region_series(&ds, category, &years, &all);
        assert_eq!(series.len(), 3);
        let sum: f64 = series.iter().map(|r| r.amount).sum();
        let expected = queries::sum_by_year(&ds, category)[&2015];
        assert!((sum - expected).abs() < 1e-6);
    }
}

#[test]
fn search_finds_unique_region_and_nothing_for_absent_term() {
    let ds = dataset_from(
        "exer;reg_name;montant;agregat\n2020;Guadeloupe;10;TVA\n2020;Bretagne;20;TVA\n2021;Corse;30;TVA\n",
    );
    let hits = queries::search(&ds, "guadeLOUPE");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].region_name, "Guadeloupe");
    assert!(queries::search(&ds, "Mayotte").is_empty());
}

#[test]
fn correlation_matrix_is_symmetric() {
    let ds = dataset_from(&realistic_csv());
    let m = queries::correlation_matrix(&ds);
    assert!(m.columns.contains(&"montant".to_string()));
    assert!(m.columns.contains(&"reg_code".to_string()));
    for i in 0..m.columns.len() {
        assert_eq!(m.values[i][i], 1.0);
        for j in 0..i {
            assert_eq!(m.values[i][j].to_bits(), m.values[j][i].to_bits());
        }
    }
    let r = m.get("montant", "euros_par_habitant").unwrap();
    assert!(r > 0.0 && r <= 1.0);
}

#[test]
fn export_round_trips_row_count() {
    let ds = dataset_from(&realistic_csv());
    let blob = to_csv_blob(&ds).unwrap();
    let mut rdr = csv::Reader::from_reader(blob.as_bytes());
    let headers = rdr.headers().unwrap().clone();
    assert_eq!(headers.iter().last(), Some("categorie"));
    assert_eq!(rdr.records().count(), ds.len());
}

#[test]
fn cache_over_file_source_is_shared() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(realistic_csv().as_bytes()).unwrap();
    let source = Source::File(file.path().to_path_buf());
    let (direct, report) = load(&source).unwrap();
    assert_eq!(report.non_positive_amounts, 6);

    let cache = DatasetCache::new(source);
    let a = cache.dataset().unwrap();
    let b = cache.dataset().unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(*a, direct);

    // Queries are plain reads; running them from several threads is fine.
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let ds = Arc::clone(&a);
            std::thread::spawn(move || queries::sum_by_category(&ds))
        })
        .collect();
    let first = queries::sum_by_category(&a);
    for h in handles {
        assert_eq!(h.join().unwrap(), first);
    }
}
