use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use draft_oracle::champion_table::ChampionAttributeTable;
use draft_oracle::dataset::{Dataset, FeatureMap, FeatureRow, NON_FEATURE_COLUMNS};
use draft_oracle::error::DraftError;
use draft_oracle::gbdt::BoosterParams;
use draft_oracle::lane_stats::LaneStatsTable;
use draft_oracle::match_record::{DraftContext, MatchRecord, TeamDraft};
use draft_oracle::match_store;
use draft_oracle::model::{DraftScorer, TrainedModel};
use draft_oracle::normalize::OutcomePolicy;
use draft_oracle::roles::Role;
use draft_oracle::trainer::{SplitStrategy, TrainConfig, train_model};

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

fn quick_config() -> TrainConfig {
    TrainConfig {
        booster: BoosterParams {
            n_trees: 40,
            learning_rate: 0.1,
            ..BoosterParams::default()
        },
        version: Some("test-model".to_string()),
        ..TrainConfig::default()
    }
}

fn synthetic_rows(n: usize) -> Vec<FeatureRow> {
    (0..n)
        .map(|i| {
            let x = (i as f64 - n as f64 / 2.0) / n as f64;
            let noise = ((i * 37) % 17) as f64 / 17.0;
            FeatureRow {
                match_id: format!("m{i}"),
                patch: if i % 3 == 0 { "14.8" } else { "14.7" }.to_string(),
                blue_win: x > 0.0,
                features: FeatureMap::from([
                    ("poke_diff".to_string(), x * 4.0),
                    ("siege_diff".to_string(), noise),
                ]),
            }
        })
        .collect()
}

fn draft_error(err: &anyhow::Error) -> Option<&DraftError> {
    err.downcast_ref::<DraftError>()
}

#[test]
fn learns_separable_signal_and_reports_metrics() {
    let dataset = Dataset::from_rows(synthetic_rows(300));
    let (model, report) = train_model(&dataset, &quick_config()).unwrap();

    assert_eq!(report.n_train + report.n_val, 300);
    assert_eq!(report.n_val, 60);
    assert_eq!(report.metrics.samples, 60);
    assert!(report.metrics.auc.unwrap() > 0.9);
    assert!(report.metrics.brier < 0.15);
    assert_eq!(report.calibration.len(), 10);

    assert_eq!(model.version, "test-model");
    assert_eq!(model.feature_names, vec!["poke_diff", "siege_diff"]);
    assert!(
        !model
            .feature_names
            .iter()
            .any(|n| NON_FEATURE_COLUMNS.contains(&n.as_str()))
    );
}

#[test]
fn patch_holdout_validates_on_latest_patch() {
    let dataset = Dataset::from_rows(synthetic_rows(300));
    let config = TrainConfig {
        split: SplitStrategy::PatchHoldout,
        ..quick_config()
    };
    let (_, report) = train_model(&dataset, &config).unwrap();
    assert_eq!(report.n_val, 100);
    assert_eq!(report.split, SplitStrategy::PatchHoldout);
}

#[test]
fn training_rejects_degenerate_datasets() {
    let err = train_model(&Dataset::default(), &quick_config()).unwrap_err();
    assert_eq!(draft_error(&err), Some(&DraftError::EmptyDataset));

    let mut rows = synthetic_rows(50);
    rows.iter_mut().for_each(|r| r.blue_win = true);
    let err = train_model(&Dataset::from_rows(rows), &quick_config()).unwrap_err();
    assert_eq!(draft_error(&err), Some(&DraftError::SingleClass { class: true }));

    let mut rows = synthetic_rows(50);
    rows.iter_mut().for_each(|r| r.blue_win = false);
    rows[0].blue_win = true;
    let err = train_model(&Dataset::from_rows(rows), &quick_config()).unwrap_err();
    assert_eq!(
        draft_error(&err),
        Some(&DraftError::TooFewClassMembers {
            class: true,
            count: 1
        })
    );
}

#[test]
fn training_rejects_rows_without_features() {
    let rows: Vec<FeatureRow> = synthetic_rows(40)
        .into_iter()
        .map(|r| FeatureRow {
            features: FeatureMap::new(),
            ..r
        })
        .collect();
    let dataset = Dataset::from_rows(rows);
    assert!(dataset.feature_names.is_empty());
    let err = train_model(&dataset, &quick_config()).unwrap_err();
    assert_eq!(draft_error(&err), Some(&DraftError::NoFeatures));
}

#[test]
fn scorer_enforces_exact_feature_set() {
    let dataset = Dataset::from_rows(synthetic_rows(200));
    let (model, _) = train_model(&dataset, &quick_config()).unwrap();
    let scorer = DraftScorer::new(model);

    let ok = FeatureMap::from([
        ("poke_diff".to_string(), 1.5),
        ("siege_diff".to_string(), 0.2),
    ]);
    let p = scorer.score(&ok).unwrap();
    assert!((0.0..=1.0).contains(&p));
    assert!(p > 0.5);

    let missing = FeatureMap::from([("poke_diff".to_string(), 1.5)]);
    assert_eq!(
        scorer.score(&missing),
        Err(DraftError::FeatureSetMismatch {
            missing: vec!["siege_diff".to_string()],
            unexpected: vec![],
        })
    );

    let mut extra = ok.clone();
    extra.insert("blue_win".to_string(), 1.0);
    assert_eq!(
        scorer.score(&extra),
        Err(DraftError::FeatureSetMismatch {
            missing: vec![],
            unexpected: vec!["blue_win".to_string()],
        })
    );
}

#[test]
fn artifact_round_trip_preserves_predictions() {
    let dataset = Dataset::from_rows(synthetic_rows(200));
    let (model, _) = train_model(&dataset, &quick_config()).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.json");
    model.save(&path).unwrap();

    let loaded = TrainedModel::load(&path).unwrap();
    assert_eq!(loaded.feature_names, model.feature_names);
    assert_eq!(loaded.version, model.version);

    let before = DraftScorer::new(model);
    let after = DraftScorer::load(&path).unwrap();
    for row in dataset.rows.iter().take(20) {
        assert_eq!(
            before.score(&row.features).unwrap(),
            after.score(&row.features).unwrap()
        );
    }
}

fn team(picks: [&str; 5]) -> TeamDraft {
    [Role::Top, Role::Jungle, Role::Mid, Role::BotCarry, Role::Support]
        .into_iter()
        .zip(picks)
        .map(|(r, c)| (r, c.to_string()))
        .collect()
}

fn comp_a() -> TeamDraft {
    team(["Darius", "LeeSin", "Ahri", "Jinx", "Thresh"])
}

fn comp_b() -> TeamDraft {
    team(["Garen", "Vi", "Zed", "Caitlyn", "Lux"])
}

#[test]
fn draft_prediction_respects_side_flag() {
    // Comp A wins from either side.
    let records: Vec<MatchRecord> = (0..120)
        .map(|i| {
            let a_blue = i % 2 == 0;
            let (blue, red) = if a_blue {
                (comp_a(), comp_b())
            } else {
                (comp_b(), comp_a())
            };
            MatchRecord {
                match_id: format!("KR_{i}"),
                patch: "14.7".to_string(),
                blue_win: a_blue,
                blue_team: blue,
                red_team: red,
                blue_runes: BTreeMap::new(),
                red_runes: BTreeMap::new(),
                blue_summoners: BTreeMap::new(),
                red_summoners: BTreeMap::new(),
                bans_blue: vec![],
                bans_red: vec![],
                region: None,
                queue: None,
            }
        })
        .collect();
    let champions = ChampionAttributeTable::from_json_str(&read_fixture("champions.json")).unwrap();
    let lanes = LaneStatsTable::build(&records);
    let dataset = Dataset::build(&records, &champions, &lanes);
    let (model, _) = train_model(&dataset, &quick_config()).unwrap();
    let scorer = DraftScorer::new(model);

    let mut draft = DraftContext {
        patch: "14.7".to_string(),
        blue_side: true,
        blue_team: comp_a(),
        red_team: comp_b(),
        runes_by_role: BTreeMap::new(),
        summoners_by_role: BTreeMap::new(),
    };
    let blue = scorer.predict_draft(&draft, &champions, &lanes).unwrap();
    assert!(blue.probability > 0.8);
    assert_eq!(blue.model_version, "test-model");
    let blue_p = blue.probability;

    draft.blue_side = false;
    let red = scorer.predict_draft(&draft, &champions, &lanes).unwrap();
    assert!((red.probability - (1.0 - blue_p)).abs() < 1e-12);
    assert_eq!(red.blue_probability, blue_p);

    // A partial draft still scores: absent lanes take the neutral fill.
    draft.blue_side = true;
    draft.red_team.remove(&Role::Support);
    let partial = scorer.predict_draft(&draft, &champions, &lanes).unwrap();
    assert!((0.0..=1.0).contains(&partial.probability));
}

#[test]
fn ingest_directory_into_store_and_reload() {
    let raw_dir = tempfile::tempdir().unwrap();
    let nested = raw_dir.path().join("kr");
    fs::create_dir_all(&nested).unwrap();
    fs::write(nested.join("a.json"), read_fixture("match_full.json")).unwrap();
    fs::write(
        raw_dir.path().join("b.json"),
        read_fixture("match_ambiguous_role.json"),
    )
    .unwrap();
    fs::write(
        raw_dir.path().join("c.json"),
        read_fixture("match_missing_blue.json"),
    )
    .unwrap();
    fs::write(raw_dir.path().join("broken.json"), "[1, 2").unwrap();
    fs::write(raw_dir.path().join("notes.txt"), "ignored").unwrap();

    let db_dir = tempfile::tempdir().unwrap();
    let db_path = db_dir.path().join("matches.sqlite");
    let mut conn = match_store::open_db(&db_path).unwrap();
    let summary = match_store::ingest_raw_dir(
        &mut conn,
        db_path.clone(),
        raw_dir.path(),
        OutcomePolicy::Reject,
    )
    .unwrap();

    assert_eq!(summary.files_total, 4);
    assert_eq!(summary.matches_upserted, 2);
    assert_eq!(summary.report.malformed, 1);
    assert_eq!(summary.report.missing_outcome, 1);

    // Re-ingesting upserts instead of duplicating.
    match_store::ingest_raw_dir(&mut conn, db_path, raw_dir.path(), OutcomePolicy::Reject).unwrap();
    assert_eq!(match_store::count_matches(&conn).unwrap(), 2);

    let records = match_store::load_records(&conn, None).unwrap();
    let full = records
        .iter()
        .find(|r| r.match_id == "KR_7012345678")
        .unwrap();
    assert_eq!(full.blue_team.len(), 5);
    assert_eq!(full.bans_blue, vec!["266".to_string(), "55".to_string()]);
    assert_eq!(
        match_store::load_records(&conn, Some("14.8")).unwrap().len(),
        1
    );

    let parquet = db_dir.path().join("matches.parquet");
    assert_eq!(match_store::write_matches_parquet(&records, &parquet).unwrap(), 2);
    assert_eq!(match_store::read_matches_parquet(&parquet).unwrap(), records);
}
