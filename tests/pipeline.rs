mod common;

use std::fs;

use common::{TestWorkspace, YEAR_HEADER};
use encoding_rs::UTF_8;
use irs_trend::{
    align,
    config::{MissingColumnPolicy, PipelineConfig},
    discover,
    error::PipelineError,
    pipeline::{self, YearInputs},
};

fn two_metric_config() -> PipelineConfig {
    PipelineConfig {
        metrics: vec!["N1".to_string(), "A00100".to_string()],
        ..PipelineConfig::default()
    }
}

fn write_three_years(ws: &TestWorkspace) {
    ws.write_year(
        "17zpallagi.csv",
        YEAR_HEADER,
        &[
            "6,CA,0,1,1000,9000",
            "6,CA,90001,1,100,500",
            "6,CA,90001,2,300,1500",
            "6,CA,90002,1,50,",
            "6,CA,90002,1,50,",
        ],
    );
    ws.write_year(
        "16zpallagi.csv",
        YEAR_HEADER,
        &["6,CA,90001,1,80,400", "6,CA,90001,2,120,", "6,CA,90002,1,0,100"],
    );
    ws.write_year(
        "15zpallagi.csv",
        "STATE,ZIPCODE,AGI_STUB,N1,A00100",
        &["CA,90001,1,40,200", "CA,90002,1,40,50"],
    );
}

fn load(ws: &TestWorkspace, config: &PipelineConfig) -> YearInputs {
    let inputs = discover::discover_inputs(&ws.input_dir(), &config.anchor_file).expect("discover");
    pipeline::load_years(&inputs, config, None, UTF_8).expect("load years")
}

#[test]
fn master_table_keeps_anchor_keys_minus_invalid_and_duplicates() {
    let ws = TestWorkspace::new();
    write_three_years(&ws);
    let config = two_metric_config();
    let years = load(&ws, &config);

    let (master, stats) = align::align(&years.anchor, &years.historical, config.invalid_zone);

    assert_eq!(stats.anchor_keys, 4);
    assert_eq!(stats.invalid_zone_rows, 1);
    assert_eq!(stats.duplicate_rows, 1);
    assert_eq!(
        master.row_count(),
        stats.anchor_keys - stats.invalid_zone_rows - stats.duplicate_rows
    );
    assert_eq!(
        master.headers(),
        vec!["n1", "A00100", "n1_16", "A00100_16", "n1_15", "A00100_15"]
    );
    assert!(master.rows.iter().all(|row| row.key.zone != 0));
    assert_eq!(
        master.rows[0].values,
        vec![Some(100.0), Some(500.0), Some(80.0), Some(400.0), Some(40.0), Some(200.0)]
    );
}

#[test]
fn pivoted_output_carries_values_shares_and_trends() {
    let ws = TestWorkspace::new();
    write_three_years(&ws);
    let config = two_metric_config();
    let (pivoted, summary) = pipeline::build(load(&ws, &config), &config).expect("build");

    assert_eq!(pivoted.zone_column, "ZIPCODE");
    assert_eq!(pivoted.zones, vec![90001, 90002]);
    // 2 metrics x (value, trend, share, share trend) x 2 brackets
    assert_eq!(pivoted.headers.len(), 16);
    assert_eq!(summary.output_columns, 17);

    assert_eq!(pivoted.value(90001, "n1_1"), Some(100.0));
    assert_eq!(pivoted.value(90001, "n1_trend_1"), Some(0.625));
    assert_eq!(pivoted.value(90001, "n1_trend_2"), Some(1.5));
    assert_eq!(pivoted.value(90001, "A00100_trend_2"), Some(0.0));
    assert_eq!(pivoted.value(90001, "n1_perc_1"), Some(25.0));
    assert_eq!(pivoted.value(90001, "n1_perc_2"), Some(75.0));
    assert_eq!(pivoted.value(90001, "n1_perc_trend_2"), Some(0.25));
    let perc_trend = pivoted.value(90001, "n1_perc_trend_1").expect("share trend");
    assert!((perc_trend + 0.4875).abs() < 1e-12);

    // 50, 0, 40 newest first: both transitions touch a zero.
    assert_eq!(pivoted.value(90002, "n1_trend_1"), Some(0.0));
    // Absent anchor value, then 100 and 50.
    assert_eq!(pivoted.value(90002, "A00100_1"), Some(0.0));
    assert_eq!(pivoted.value(90002, "A00100_trend_1"), Some(1.0));
    // Zone 90002 has no bracket 2 row.
    assert_eq!(pivoted.value(90002, "n1_2"), None);

    assert_eq!(summary.raw_trends.gap_cells, 1);
}

#[test]
fn shares_sum_to_one_hundred_within_each_zone() {
    let ws = TestWorkspace::new();
    write_three_years(&ws);
    let config = two_metric_config();
    let (pivoted, _) = pipeline::build(load(&ws, &config), &config).expect("build");

    for zone in [90001, 90002] {
        for metric in ["n1", "A00100"] {
            let total: f64 = [1, 2]
                .iter()
                .filter_map(|b| pivoted.value(zone, &format!("{metric}_perc_{b}")))
                .sum();
            let zone_total: f64 = [1, 2]
                .iter()
                .filter_map(|b| pivoted.value(zone, &format!("{metric}_{b}")))
                .sum();
            if zone_total == 0.0 {
                assert_eq!(total, 0.0, "{metric} in {zone}");
            } else {
                assert!((total - 100.0).abs() < 1e-9, "{metric} in {zone}: {total}");
            }
        }
    }
}

#[test]
fn missing_metric_column_follows_policy() {
    let ws = TestWorkspace::new();
    ws.write_year("17zpallagi.csv", YEAR_HEADER, &["6,CA,90001,1,100,500"]);
    ws.write_year("16zpallagi.csv", "STATE,ZIPCODE,AGI_STUB,N1", &["CA,90001,1,80"]);

    let config = two_metric_config();
    let years = load(&ws, &config);
    assert_eq!(years.historical[0].metrics, vec!["n1"]);

    let strict = PipelineConfig {
        missing_columns: MissingColumnPolicy::Fail,
        ..two_metric_config()
    };
    let inputs = discover::discover_inputs(&ws.input_dir(), &strict.anchor_file).expect("discover");
    let err = pipeline::load_years(&inputs, &strict, None, UTF_8).unwrap_err();
    let typed = err.downcast_ref::<PipelineError>().expect("pipeline error");
    assert!(matches!(typed, PipelineError::MissingColumn { column, .. } if column == "A00100"));
}

#[test]
fn malformed_file_aborts_the_run() {
    let ws = TestWorkspace::new();
    ws.write_year("17zpallagi.csv", YEAR_HEADER, &["6,CA,90001,1,100,500"]);
    ws.write_year("16zpallagi.csv", YEAR_HEADER, &["6,CA,90001,1,80"]);

    let config = two_metric_config();
    let inputs = discover::discover_inputs(&ws.input_dir(), &config.anchor_file).expect("discover");
    let err = pipeline::load_years(&inputs, &config, None, UTF_8).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PipelineError>(),
        Some(PipelineError::UnparseableFile { .. })
    ));
}

#[test]
fn anchor_only_metrics_drive_trends_and_output() {
    let ws = TestWorkspace::new();
    ws.write_year("17zpallagi.csv", "STATE,ZIPCODE,AGI_STUB,N1", &["CA,90001,1,100"]);
    ws.write_year("16zpallagi.csv", YEAR_HEADER, &["6,CA,90001,1,80,400"]);
    let config = two_metric_config();
    let years = load(&ws, &config);

    let (master, _) = align::align(&years.anchor, &years.historical, config.invalid_zone);
    assert_eq!(master.headers(), vec!["n1", "n1_16", "A00100_16"]);
    assert!(master.series.iter().all(|series| series.metric != "A00100"));

    let (pivoted, _) = pipeline::build(years, &config).expect("build");
    assert!(
        pivoted.headers.iter().all(|h| !h.starts_with("A00100")),
        "{:?}",
        pivoted.headers
    );
    assert_eq!(pivoted.headers, vec!["n1_1", "n1_trend_1", "n1_perc_1", "n1_perc_trend_1"]);
    assert_eq!(pivoted.value(90001, "n1_trend_1"), Some(0.25));
}

#[test]
fn unselected_columns_are_not_decoded() {
    let ws = TestWorkspace::new();
    let mut contents = b"STATE,ZIPCODE,AGI_STUB,NOTES,N1,A00100\n".to_vec();
    contents.extend_from_slice(b"CA,90001,1,caf\xe9,100,500\n");
    fs::write(ws.input_dir().join("17zpallagi.csv"), &contents).expect("write anchor");

    let config = two_metric_config();
    let years = load(&ws, &config);
    assert_eq!(years.anchor.metrics, vec!["n1", "A00100"]);
    assert_eq!(years.anchor.records[0].values, vec![Some(100.0), Some(500.0)]);

    let mut contents = b"STATE,ZIPCODE,AGI_STUB,N1,A00100\n".to_vec();
    contents.extend_from_slice(b"CA,90001,1,1\xe90,500\n");
    fs::write(ws.input_dir().join("16zpallagi.csv"), &contents).expect("write year");
    let inputs = discover::discover_inputs(&ws.input_dir(), &config.anchor_file).expect("discover");
    let err = pipeline::load_years(&inputs, &config, None, UTF_8).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PipelineError>(),
        Some(PipelineError::UnparseableFile { .. })
    ));
}

#[test]
fn year_newer_than_anchor_stops_discovery() {
    let ws = TestWorkspace::new();
    ws.write_year("17zpallagi.csv", YEAR_HEADER, &["6,CA,90001,1,100,500"]);
    ws.write_year("18zpallagi.csv", YEAR_HEADER, &["6,CA,90001,1,200,500"]);

    let err = discover::discover_inputs(&ws.input_dir(), "17zpallagi.csv").unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PipelineError>(),
        Some(PipelineError::YearAfterAnchor { year, .. }) if year == "18"
    ));
}
