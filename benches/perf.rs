use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use draft_oracle::champion_table::ChampionAttributeTable;
use draft_oracle::dataset::{Dataset, FeatureMap, FeatureRow, FillPolicy};
use draft_oracle::gbdt::{BoosterParams, GradientBoostedTrees};
use draft_oracle::lane_stats::LaneStatsTable;
use draft_oracle::match_record::MatchRecord;
use draft_oracle::normalize::{OutcomePolicy, normalize_match_json};

const CHAMPS: [&str; 10] = [
    "Darius", "Garen", "LeeSin", "Vi", "Ahri", "Zed", "Jinx", "Caitlyn", "Thresh", "Lux",
];

fn sample_records(n: usize) -> Vec<MatchRecord> {
    let base = normalize_match_json(MATCH_FULL_JSON, OutcomePolicy::AssumeLoss)
        .expect("valid fixture json")
        .record;
    (0..n)
        .map(|i| {
            let mut m = base.clone();
            m.match_id = format!("KR_{i}");
            m.blue_win = i % 3 != 0;
            for (k, champ) in m.blue_team.values_mut().enumerate() {
                *champ = CHAMPS[(i + k) % CHAMPS.len()].to_string();
            }
            for (k, champ) in m.red_team.values_mut().enumerate() {
                *champ = CHAMPS[(i * 7 + k) % CHAMPS.len()].to_string();
            }
            m
        })
        .collect()
}

fn bench_normalize(c: &mut Criterion) {
    c.bench_function("normalize_match", |b| {
        b.iter(|| {
            let n = normalize_match_json(black_box(MATCH_FULL_JSON), OutcomePolicy::AssumeLoss)
                .unwrap();
            black_box(n.record.blue_team.len());
        })
    });
}

fn bench_lane_stats_build(c: &mut Criterion) {
    let records = sample_records(5_000);
    c.bench_function("lane_stats_build", |b| {
        b.iter(|| {
            let table = LaneStatsTable::build(black_box(&records));
            black_box(table.len());
        })
    });
}

fn bench_dataset_build(c: &mut Criterion) {
    let records = sample_records(2_000);
    let champions = ChampionAttributeTable::from_json_str(CHAMPIONS_JSON).unwrap();
    let lanes = LaneStatsTable::build(&records);
    c.bench_function("dataset_build", |b| {
        b.iter(|| {
            let dataset = Dataset::build(black_box(&records), &champions, &lanes);
            black_box(dataset.matrix(FillPolicy::Neutral).len());
        })
    });
}

fn bench_booster_fit(c: &mut Criterion) {
    let rows: Vec<FeatureRow> = (0..2_000)
        .map(|i| {
            let x = ((i * 7919) % 1000) as f64 / 1000.0;
            FeatureRow {
                match_id: i.to_string(),
                patch: "14.7".to_string(),
                blue_win: x > 0.45,
                features: FeatureMap::from([
                    ("poke_diff".to_string(), x),
                    ("dive_diff".to_string(), ((i * 31) % 97) as f64),
                ]),
            }
        })
        .collect();
    let dataset = Dataset::from_rows(rows);
    let matrix = dataset.matrix(FillPolicy::Neutral);
    let labels = dataset.labels();
    let params = BoosterParams {
        n_trees: 20,
        ..BoosterParams::default()
    };
    c.bench_function("booster_fit_20_trees", |b| {
        b.iter(|| {
            let model = GradientBoostedTrees::fit(black_box(&matrix), &labels, &params).unwrap();
            black_box(model.trees.len());
        })
    });
}

criterion_group!(
    perf,
    bench_normalize,
    bench_lane_stats_build,
    bench_dataset_build,
    bench_booster_fit
);
criterion_main!(perf);

static MATCH_FULL_JSON: &str = include_str!("../tests/fixtures/match_full.json");
static CHAMPIONS_JSON: &str = include_str!("../tests/fixtures/champions.json");
