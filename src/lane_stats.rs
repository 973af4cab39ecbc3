//! Lane-matchup win rates keyed by (patch, role, blue champion, red champion).
//!
//! `(blue=X, red=Y)` and `(blue=Y, red=X)` are independent keys: the side
//! advantage is part of what the table measures.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::match_record::MatchRecord;
use crate::parquet_io::{self, Column, ColumnData};
use crate::roles::Role;

/// Win rate reported for a matchup with no observed samples.
pub const NEUTRAL_WIN_RATE: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LaneKey {
    pub patch: String,
    pub role: Role,
    pub blue: String,
    pub red: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaneStatEntry {
    pub samples: u32,
    pub blue_wins: u32,
}

impl LaneStatEntry {
    pub fn win_rate(&self) -> f64 {
        if self.samples == 0 {
            return NEUTRAL_WIN_RATE;
        }
        f64::from(self.blue_wins) / f64::from(self.samples)
    }

    /// Additive prior of `strength` pseudo-games at 50%. A strength of zero is
    /// the raw rate (and the neutral rate for an empty entry).
    pub fn shrunk_win_rate(&self, strength: f64) -> f64 {
        let k = strength.max(0.0);
        let n = f64::from(self.samples) + k;
        if n <= 0.0 {
            return NEUTRAL_WIN_RATE;
        }
        (f64::from(self.blue_wins) + NEUTRAL_WIN_RATE * k) / n
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LaneStatRow {
    pub key: LaneKey,
    pub entry: LaneStatEntry,
}

/// Built once per training run, then read-only.
#[derive(Debug, Clone, Default)]
pub struct LaneStatsTable {
    entries: HashMap<LaneKey, LaneStatEntry>,
    prior_strength: f64,
}

impl LaneStatsTable {
    /// Single pass over `records`. The result does not depend on their order.
    pub fn build<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a MatchRecord>,
    {
        let mut entries: HashMap<LaneKey, LaneStatEntry> = HashMap::new();
        let mut matches = 0usize;
        for record in records {
            matches += 1;
            for (role, blue, red) in record.contested_roles() {
                let entry = entries
                    .entry(LaneKey {
                        patch: record.patch.clone(),
                        role,
                        blue: blue.to_string(),
                        red: red.to_string(),
                    })
                    .or_default();
                entry.samples += 1;
                if record.blue_win {
                    entry.blue_wins += 1;
                }
            }
        }
        info!(matches, keys = entries.len(), "lane stats built");
        Self {
            entries,
            prior_strength: 0.0,
        }
    }

    pub fn with_prior_strength(mut self, strength: f64) -> Self {
        self.prior_strength = strength.max(0.0);
        self
    }

    pub fn prior_strength(&self) -> f64 {
        self.prior_strength
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, patch: &str, role: Role, blue: &str, red: &str) -> Option<&LaneStatEntry> {
        self.entries.get(&LaneKey {
            patch: patch.to_string(),
            role,
            blue: blue.to_string(),
            red: red.to_string(),
        })
    }

    /// Never fails: an unseen key reads as [`NEUTRAL_WIN_RATE`].
    pub fn blue_win_rate(&self, patch: &str, role: Role, blue: &str, red: &str) -> f64 {
        self.entry(patch, role, blue, red)
            .copied()
            .unwrap_or_default()
            .shrunk_win_rate(self.prior_strength)
    }

    /// Rows sorted by key, for stable artifacts.
    pub fn rows(&self) -> Vec<LaneStatRow> {
        let mut rows: Vec<LaneStatRow> = self
            .entries
            .iter()
            .map(|(key, entry)| LaneStatRow {
                key: key.clone(),
                entry: *entry,
            })
            .collect();
        rows.sort_by(|a, b| a.key.cmp(&b.key));
        rows
    }

    /// Columns: `patch, role, blue, red, n, wins, wr_blue`.
    pub fn write_parquet(&self, path: &Path) -> Result<usize> {
        let rows = self.rows();
        let columns = vec![
            Column::new(
                "patch",
                ColumnData::Utf8(rows.iter().map(|r| r.key.patch.clone()).collect()),
            ),
            Column::new(
                "role",
                ColumnData::Utf8(rows.iter().map(|r| r.key.role.key().to_string()).collect()),
            ),
            Column::new(
                "blue",
                ColumnData::Utf8(rows.iter().map(|r| r.key.blue.clone()).collect()),
            ),
            Column::new(
                "red",
                ColumnData::Utf8(rows.iter().map(|r| r.key.red.clone()).collect()),
            ),
            Column::new(
                "n",
                ColumnData::Int64(rows.iter().map(|r| i64::from(r.entry.samples)).collect()),
            ),
            Column::new(
                "wins",
                ColumnData::Int64(rows.iter().map(|r| i64::from(r.entry.blue_wins)).collect()),
            ),
            Column::new(
                "wr_blue",
                ColumnData::Double(rows.iter().map(|r| r.entry.win_rate()).collect()),
            ),
        ];
        parquet_io::write_table(path, "lane_stats", &columns)
            .with_context(|| format!("write lane stats {}", path.display()))
    }

    /// Reloads a table written by [`Self::write_parquet`]. When the `wins`
    /// column is absent it is reconstructed from `n * wr_blue`.
    pub fn read_parquet(path: &Path) -> Result<Self> {
        let rows = parquet_io::read_rows(path)?;
        let mut entries = HashMap::with_capacity(rows.len());
        for row in &rows {
            let patch = parquet_io::field_str(row, "patch")
                .ok_or_else(|| anyhow!("lane stats row missing patch"))?;
            let role = parquet_io::field_str(row, "role")
                .ok_or_else(|| anyhow!("lane stats row missing role"))?
                .parse::<Role>()?;
            let blue = parquet_io::field_str(row, "blue")
                .ok_or_else(|| anyhow!("lane stats row missing blue"))?;
            let red = parquet_io::field_str(row, "red")
                .ok_or_else(|| anyhow!("lane stats row missing red"))?;
            let samples = parquet_io::field_i64(row, "n")
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| anyhow!("lane stats row missing n"))?;
            let blue_wins = match parquet_io::field_i64(row, "wins") {
                Some(w) => u32::try_from(w).context("negative win count")?,
                None => {
                    let wr = parquet_io::field_f64(row, "wr_blue").unwrap_or(NEUTRAL_WIN_RATE);
                    (wr * f64::from(samples)).round() as u32
                }
            };
            entries.insert(
                LaneKey {
                    patch,
                    role,
                    blue,
                    red,
                },
                LaneStatEntry { samples, blue_wins },
            );
        }
        info!(path = %path.display(), keys = entries.len(), "lane stats loaded");
        Ok(Self {
            entries,
            prior_strength: 0.0,
        })
    }
}
