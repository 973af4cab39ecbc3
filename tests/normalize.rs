use std::fs;
use std::path::PathBuf;

use draft_oracle::champion_table::ChampionAttributeTable;
use draft_oracle::error::DraftError;
use draft_oracle::match_record::{KEYSTONE_SLOT, Side};
use draft_oracle::normalize::{
    OutcomePolicy, ParticipantOutcome, RejectReason, normalize_batch, normalize_match_json,
};
use draft_oracle::roles::Role;
use draft_oracle::side_features::side_feature_diff;

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

#[test]
fn normalizes_full_match() {
    let raw = read_fixture("match_full.json");
    let n = normalize_match_json(&raw, OutcomePolicy::AssumeLoss).expect("fixture should parse");
    let r = &n.record;

    assert_eq!(r.match_id, "KR_7012345678");
    assert_eq!(r.patch, "14.7");
    assert!(r.blue_win);
    assert_eq!(r.region.as_deref(), Some("KR"));
    assert_eq!(r.queue, Some(420));
    assert_eq!(r.blue_team.len(), 5);
    assert_eq!(r.red_team.len(), 5);
    assert_eq!(r.blue_team[&Role::BotCarry], "Jinx");
    assert_eq!(r.blue_team[&Role::Support], "Thresh");
    // Empty team label falls back to the individual one.
    assert_eq!(r.red_team[&Role::Support], "Lux");
    assert!(!n.is_degraded());
    assert_eq!(n.rejected().count(), 0);
}

#[test]
fn keeps_keystone_summoners_and_non_null_bans() {
    let raw = read_fixture("match_full.json");
    let r = normalize_match_json(&raw, OutcomePolicy::AssumeLoss)
        .unwrap()
        .record;

    assert_eq!(
        r.blue_runes[&Role::Top].get(KEYSTONE_SLOT).map(String::as_str),
        Some("8010")
    );
    assert!(!r.blue_runes.contains_key(&Role::Jungle));
    assert_eq!(r.blue_summoners[&Role::Top], ["4".to_string(), "12".to_string()]);
    assert_eq!(r.bans_blue, vec!["266".to_string(), "55".to_string()]);
    assert_eq!(r.bans_red, vec!["238".to_string()]);
}

#[test]
fn ambiguous_role_is_omitted_and_reported() {
    let raw = read_fixture("match_ambiguous_role.json");
    let n = normalize_match_json(&raw, OutcomePolicy::AssumeLoss).unwrap();
    let r = &n.record;

    assert_eq!(r.patch, "14.8");
    assert!(!r.blue_win);
    assert_eq!(
        r.blue_team.keys().copied().collect::<Vec<_>>(),
        vec![Role::Top, Role::BotCarry]
    );
    assert!(!r.blue_team.values().any(|c| c == "Ahri"));
    // First participant seen in a role keeps it.
    assert_eq!(r.red_team[&Role::Mid], "Zed");
    assert!(!r.red_team.values().any(|c| c == "Garen"));
    assert!(r.red_runes.is_empty());

    let rejected: Vec<RejectReason> = n.rejected().collect();
    assert_eq!(
        rejected,
        vec![
            RejectReason::UnknownRole,
            RejectReason::DuplicateRole(Side::Red, Role::Mid),
            RejectReason::UnknownSide,
        ]
    );
    assert_eq!(
        n.participants[0],
        ParticipantOutcome::Accepted {
            side: Side::Blue,
            role: Role::Top
        }
    );
    assert!(n.is_degraded());

    // Incomplete mappings are fine downstream.
    let champions = ChampionAttributeTable::from_json_str(&read_fixture("champions.json")).unwrap();
    let diff = side_feature_diff(&r.blue_team, &r.red_team, &champions);
    assert!(diff.iter().all(|(_, v)| v.is_finite()));
}

#[test]
fn missing_blue_team_follows_outcome_policy() {
    let raw = read_fixture("match_missing_blue.json");

    let n = normalize_match_json(&raw, OutcomePolicy::AssumeLoss).unwrap();
    assert!(!n.record.blue_win);
    assert!(n.outcome_defaulted);
    assert!(n.is_degraded());
    assert_eq!(n.record.patch, "13.24");
    assert!(n.record.bans_blue.is_empty());
    assert_eq!(n.record.bans_red, vec!["1".to_string()]);

    let err = normalize_match_json(&raw, OutcomePolicy::Reject).unwrap_err();
    assert_eq!(
        err,
        DraftError::MissingOutcome {
            match_id: "NA1_42".to_string()
        }
    );
}

#[test]
fn batch_counts_quality_and_never_aborts() {
    let full = read_fixture("match_full.json");
    let ambiguous = read_fixture("match_ambiguous_role.json");
    let missing = read_fixture("match_missing_blue.json");
    let docs = vec![
        ("full", full.as_str()),
        ("broken", "{not json"),
        ("ambiguous", ambiguous.as_str()),
        ("missing", missing.as_str()),
    ];

    let (records, report) = normalize_batch(docs.clone(), OutcomePolicy::AssumeLoss);
    assert_eq!(records.len(), 3);
    assert_eq!(report.documents, 4);
    assert_eq!(report.accepted, 3);
    assert_eq!(report.malformed, 1);
    assert_eq!(report.degraded, 2);
    assert_eq!(report.outcome_defaulted, 1);
    assert_eq!(report.rejected_unknown_role, 1);
    assert_eq!(report.rejected_duplicate_role, 1);
    assert_eq!(report.rejected_unknown_side, 1);
    assert_eq!(report.rejected_participants(), 3);
    assert_eq!(report.participants_accepted, 10 + 4 + 2);
    assert!(report.errors[0].starts_with("broken:"));

    let (records, report) = normalize_batch(docs, OutcomePolicy::Reject);
    assert_eq!(records.len(), 2);
    assert_eq!(report.missing_outcome, 1);
    assert_eq!(report.skipped(), 2);
}
