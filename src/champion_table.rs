use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::parquet_io;

pub const ATTRIBUTE_COLUMNS: [&str; 13] = [
    "ad_weight",
    "ap_weight",
    "true_weight",
    "hard_cc",
    "soft_cc",
    "engage",
    "poke",
    "siege",
    "dive",
    "split",
    "early",
    "mid",
    "late",
];

const ID_COLUMNS: [&str; 4] = ["champion", "champion_name", "name", "id"];

/// Fixed numeric profile of one champion. Absent columns read as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChampionAttributes {
    pub ad_weight: f64,
    pub ap_weight: f64,
    pub true_weight: f64,
    pub hard_cc: f64,
    pub soft_cc: f64,
    pub engage: f64,
    pub poke: f64,
    pub siege: f64,
    pub dive: f64,
    pub split: f64,
    pub early: f64,
    pub mid: f64,
    pub late: f64,
}

impl ChampionAttributes {
    fn set(&mut self, column: &str, value: f64) {
        match column {
            "ad_weight" => self.ad_weight = value,
            "ap_weight" => self.ap_weight = value,
            "true_weight" => self.true_weight = value,
            "hard_cc" => self.hard_cc = value,
            "soft_cc" => self.soft_cc = value,
            "engage" => self.engage = value,
            "poke" => self.poke = value,
            "siege" => self.siege = value,
            "dive" => self.dive = value,
            "split" => self.split = value,
            "early" => self.early = value,
            "mid" => self.mid = value,
            "late" => self.late = value,
            _ => {}
        }
    }
}

/// Read-only lookup from champion identifier to its attribute vector.
#[derive(Debug, Clone, Default)]
pub struct ChampionAttributeTable {
    by_champion: HashMap<String, ChampionAttributes>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TableFile {
    Map(HashMap<String, ChampionAttributes>),
    Rows(Vec<TableRow>),
}

#[derive(Debug, Deserialize)]
struct TableRow {
    #[serde(alias = "champion_name", alias = "name", alias = "id")]
    champion: String,
    #[serde(flatten)]
    attributes: ChampionAttributes,
}

impl ChampionAttributeTable {
    pub fn new(by_champion: HashMap<String, ChampionAttributes>) -> Self {
        Self { by_champion }
    }

    pub fn get(&self, champion: &str) -> Option<&ChampionAttributes> {
        self.by_champion.get(champion)
    }

    pub fn len(&self) -> usize {
        self.by_champion.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_champion.is_empty()
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let parsed = serde_json::from_str::<TableFile>(raw).context("invalid champion table json")?;
        let by_champion = match parsed {
            TableFile::Map(map) => map,
            TableFile::Rows(rows) => rows
                .into_iter()
                .map(|row| (row.champion, row.attributes))
                .collect(),
        };
        Ok(Self { by_champion })
    }

    /// Loads a `.json` or `.parquet` table, chosen by file extension.
    pub fn load(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        let table = match ext.as_str() {
            "parquet" => Self::from_parquet(path)?,
            "json" => {
                let raw = fs::read_to_string(path)
                    .with_context(|| format!("read champion table {}", path.display()))?;
                Self::from_json_str(&raw)
                    .with_context(|| format!("parse champion table {}", path.display()))?
            }
            other => {
                return Err(anyhow!(
                    "unsupported champion table format '{other}' ({})",
                    path.display()
                ));
            }
        };
        info!(path = %path.display(), champions = table.len(), "champion table loaded");
        Ok(table)
    }

    fn from_parquet(path: &Path) -> Result<Self> {
        let rows = parquet_io::read_rows(path)?;
        let mut by_champion = HashMap::with_capacity(rows.len());
        for row in &rows {
            let Some(champion) = ID_COLUMNS
                .iter()
                .find_map(|col| parquet_io::field_str(row, col))
            else {
                return Err(anyhow!(
                    "champion table row without an id column ({})",
                    ID_COLUMNS.join("/")
                ));
            };
            let mut attrs = ChampionAttributes::default();
            for column in ATTRIBUTE_COLUMNS {
                if let Some(value) = parquet_io::field_f64(row, column) {
                    attrs.set(column, value);
                }
            }
            by_champion.insert(champion, attrs);
        }
        Ok(Self { by_champion })
    }
}

impl FromIterator<(String, ChampionAttributes)> for ChampionAttributeTable {
    fn from_iter<T: IntoIterator<Item = (String, ChampionAttributes)>>(iter: T) -> Self {
        Self {
            by_champion: iter.into_iter().collect(),
        }
    }
}
