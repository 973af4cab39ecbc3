//! Dataset assembly: one feature row per match, plus the aligned matrix the
//! trainer consumes.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::champion_table::ChampionAttributeTable;
use crate::lane_stats::{LaneStatsTable, NEUTRAL_WIN_RATE};
use crate::match_record::{MatchRecord, TeamDraft};
use crate::matchup_features::{lane_feature_names, lane_matchup_features};
use crate::parquet_io::{self, Column, ColumnData};
use crate::side_features::{SIDE_FEATURE_NAMES, side_feature_diff};

pub const TARGET_COLUMN: &str = "blue_win";
pub const MATCH_ID_COLUMN: &str = "match_id";
pub const PATCH_COLUMN: &str = "patch";
pub const NON_FEATURE_COLUMNS: [&str; 3] = [TARGET_COLUMN, MATCH_ID_COLUMN, PATCH_COLUMN];

/// Named numeric features of one draft.
pub type FeatureMap = BTreeMap<String, f64>;

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub match_id: String,
    pub patch: String,
    pub blue_win: bool,
    pub features: FeatureMap,
}

/// Value used for a feature column a row does not carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillPolicy {
    /// Same value as an unseen matchup: win rate 0.5, advantage 0.
    #[default]
    Neutral,
    Zero,
}

impl FillPolicy {
    pub fn fill_value(self, feature: &str) -> f64 {
        match self {
            FillPolicy::Neutral if feature.ends_with("_blue_wr") => NEUTRAL_WIN_RATE,
            _ => 0.0,
        }
    }
}

impl FromStr for FillPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "neutral" => Ok(Self::Neutral),
            "zero" => Ok(Self::Zero),
            other => Err(format!("unknown fill policy: {other}")),
        }
    }
}

impl fmt::Display for FillPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Neutral => f.write_str("neutral"),
            Self::Zero => f.write_str("zero"),
        }
    }
}

/// Side differentials plus whatever lane matchups both teams fill.
pub fn draft_features(
    blue: &TeamDraft,
    red: &TeamDraft,
    patch: &str,
    champions: &ChampionAttributeTable,
    lanes: &LaneStatsTable,
) -> FeatureMap {
    let mut features: FeatureMap = side_feature_diff(blue, red, champions)
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect();
    features.extend(lane_matchup_features(blue, red, patch, lanes));
    features
}

pub fn feature_row(
    record: &MatchRecord,
    champions: &ChampionAttributeTable,
    lanes: &LaneStatsTable,
) -> FeatureRow {
    FeatureRow {
        match_id: record.match_id.clone(),
        patch: record.patch.clone(),
        blue_win: record.blue_win,
        features: draft_features(
            &record.blue_team,
            &record.red_team,
            &record.patch,
            champions,
            lanes,
        ),
    }
}

/// Training feature table. Rows keep their own sparse feature maps; the
/// column list is the union seen across rows, in canonical order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub feature_names: Vec<String>,
    pub rows: Vec<FeatureRow>,
}

impl Dataset {
    /// One row per record; no record is dropped however few roles resolved.
    pub fn build(
        records: &[MatchRecord],
        champions: &ChampionAttributeTable,
        lanes: &LaneStatsTable,
    ) -> Self {
        let rows: Vec<FeatureRow> = records
            .iter()
            .map(|r| feature_row(r, champions, lanes))
            .collect();
        let dataset = Self::from_rows(rows);
        info!(
            rows = dataset.rows.len(),
            features = dataset.feature_names.len(),
            "training dataset assembled"
        );
        dataset
    }

    pub fn from_rows(rows: Vec<FeatureRow>) -> Self {
        let feature_names = canonical_columns(rows.iter().flat_map(|r| r.features.keys()));
        Self {
            feature_names,
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn labels(&self) -> Vec<bool> {
        self.rows.iter().map(|r| r.blue_win).collect()
    }

    /// Dense row-major matrix over `feature_names`, absent cells filled by
    /// `fill`.
    pub fn matrix(&self, fill: FillPolicy) -> Vec<Vec<f64>> {
        self.rows
            .iter()
            .map(|row| align_features(&row.features, &self.feature_names, fill))
            .collect()
    }

    /// Feature columns are written as optional doubles so that an absent
    /// matchup stays distinguishable from a neutral one.
    pub fn write_parquet(&self, path: &Path) -> Result<usize> {
        let mut columns = Vec::with_capacity(self.feature_names.len() + 3);
        for name in &self.feature_names {
            columns.push(Column::new(
                name.clone(),
                ColumnData::OptDouble(
                    self.rows
                        .iter()
                        .map(|r| r.features.get(name).copied())
                        .collect(),
                ),
            ));
        }
        columns.push(Column::new(
            PATCH_COLUMN,
            ColumnData::Utf8(self.rows.iter().map(|r| r.patch.clone()).collect()),
        ));
        columns.push(Column::new(
            TARGET_COLUMN,
            ColumnData::Bool(self.rows.iter().map(|r| r.blue_win).collect()),
        ));
        columns.push(Column::new(
            MATCH_ID_COLUMN,
            ColumnData::Utf8(self.rows.iter().map(|r| r.match_id.clone()).collect()),
        ));
        parquet_io::write_table(path, "training_features", &columns)
            .with_context(|| format!("write training dataset {}", path.display()))
    }

    /// Every column other than the target, id and patch is a feature.
    pub fn read_parquet(path: &Path) -> Result<Self> {
        let table = parquet_io::read_rows(path)?;
        let mut rows = Vec::with_capacity(table.len());
        for row in &table {
            let match_id = parquet_io::field_str(row, MATCH_ID_COLUMN)
                .ok_or_else(|| anyhow!("training row missing {MATCH_ID_COLUMN}"))?;
            let patch = parquet_io::field_str(row, PATCH_COLUMN).unwrap_or_default();
            let blue_win = parquet_io::field_bool(row, TARGET_COLUMN)
                .ok_or_else(|| anyhow!("training row {match_id} missing {TARGET_COLUMN}"))?;
            let features = row
                .get_column_iter()
                .filter(|(name, _)| !NON_FEATURE_COLUMNS.contains(&name.as_str()))
                .filter_map(|(name, f)| parquet_io::field_as_f64(f).map(|v| (name.clone(), v)))
                .collect();
            rows.push(FeatureRow {
                match_id,
                patch,
                blue_win,
                features,
            });
        }
        let mut dataset = Self::from_rows(rows);
        // Keep columns that are null in every row so the table shape survives.
        if let Some(first) = table.first() {
            let all: Vec<&String> = first
                .get_column_iter()
                .map(|(name, _)| name)
                .filter(|name| !NON_FEATURE_COLUMNS.contains(&name.as_str()))
                .collect();
            dataset.feature_names = canonical_columns(all);
        }
        info!(path = %path.display(), rows = dataset.len(), "training dataset loaded");
        Ok(dataset)
    }
}

/// Values of `names` in order; names missing from `features` take the fill
/// value.
pub fn align_features(features: &FeatureMap, names: &[String], fill: FillPolicy) -> Vec<f64> {
    names
        .iter()
        .map(|name| {
            features
                .get(name)
                .copied()
                .unwrap_or_else(|| fill.fill_value(name))
        })
        .collect()
}

/// Side features first, then lane features by role, then anything else
/// alphabetically.
pub fn canonical_columns<'a, I>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a String>,
{
    let seen: BTreeSet<&str> = names.into_iter().map(String::as_str).collect();
    let mut out: Vec<String> = Vec::with_capacity(seen.len());
    let known = SIDE_FEATURE_NAMES
        .iter()
        .map(|s| s.to_string())
        .chain(lane_feature_names());
    for name in known {
        if seen.contains(name.as_str()) {
            out.push(name);
        }
    }
    for name in &seen {
        if !out.iter().any(|o| o == name) && !NON_FEATURE_COLUMNS.contains(name) {
            out.push(name.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neutral_fill_matches_unseen_matchup() {
        assert_eq!(FillPolicy::Neutral.fill_value("lane_mid_blue_wr"), 0.5);
        assert_eq!(FillPolicy::Neutral.fill_value("lane_mid_counter_adv"), 0.0);
        assert_eq!(FillPolicy::Zero.fill_value("lane_mid_blue_wr"), 0.0);
    }

    #[test]
    fn columns_follow_canonical_order() {
        let names = vec![
            "lane_top_blue_wr".to_string(),
            "zzz_extra".to_string(),
            "poke_diff".to_string(),
            "ad_share_diff".to_string(),
            "patch".to_string(),
        ];
        assert_eq!(
            canonical_columns(&names),
            vec!["ad_share_diff", "poke_diff", "lane_top_blue_wr", "zzz_extra"]
        );
    }
}
