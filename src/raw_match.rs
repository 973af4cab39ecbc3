//! Typed view of a provider match document.
//!
//! Only the fields the normalizer reads are modelled. Every field is optional
//! and defaults at deserialization time, so a sparse document still parses;
//! only a structurally wrong document (e.g. `participants` not being a list)
//! is rejected.

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;

pub const BLUE_TEAM_ID: i64 = 100;
pub const RED_TEAM_ID: i64 = 200;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawMatch {
    pub metadata: RawMetadata,
    pub info: RawInfo,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawMetadata {
    pub match_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawInfo {
    pub game_version: Option<String>,
    pub platform_id: Option<String>,
    pub queue_id: Option<i64>,
    #[serde(deserialize_with = "null_as_default")]
    pub teams: Vec<RawTeam>,
    #[serde(deserialize_with = "null_as_default")]
    pub participants: Vec<RawParticipant>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawTeam {
    pub team_id: Option<i64>,
    pub win: Option<bool>,
    #[serde(deserialize_with = "null_as_default")]
    pub bans: Vec<RawBan>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawBan {
    pub champion_id: Option<Value>,
    pub pick_turn: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawParticipant {
    pub team_id: Option<i64>,
    pub team_position: Option<String>,
    pub individual_position: Option<String>,
    pub champion_name: Option<String>,
    pub perks: Option<RawPerks>,
    pub summoner1_id: Option<Value>,
    pub summoner2_id: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawPerks {
    #[serde(deserialize_with = "null_as_default")]
    pub styles: Vec<RawPerkStyle>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawPerkStyle {
    #[serde(deserialize_with = "null_as_default")]
    pub selections: Vec<RawPerkSelection>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawPerkSelection {
    pub perk: Option<Value>,
}

impl RawMatch {
    pub fn team(&self, team_id: i64) -> Option<&RawTeam> {
        self.info.teams.iter().find(|t| t.team_id == Some(team_id))
    }
}

impl RawParticipant {
    /// Primary style's first selection. Missing blocks, empty lists and
    /// non-numeric values all mean "no keystone known".
    pub fn keystone(&self) -> Option<i64> {
        let perk = self
            .perks
            .as_ref()?
            .styles
            .first()?
            .selections
            .first()?
            .perk
            .as_ref()?;
        as_i64_any(perk)
    }

    pub fn summoner_spells(&self) -> [String; 2] {
        [
            value_label(self.summoner1_id.as_ref()),
            value_label(self.summoner2_id.as_ref()),
        ]
    }
}

pub fn parse_raw_match_json(raw: &str) -> Result<RawMatch> {
    let trimmed = raw.trim();
    if trimmed == "null" {
        return Ok(RawMatch::default());
    }
    serde_json::from_str::<RawMatch>(trimmed).context("invalid match json")
}

/// Accepts integer ids sent either as JSON numbers or numeric strings.
pub fn as_i64_any(v: &Value) -> Option<i64> {
    if let Some(n) = v.as_i64() {
        return Some(n);
    }
    v.as_str()?.trim().parse::<i64>().ok()
}

/// Renders an id the way it appears in persisted tables; absent ids become
/// `"None"` so the spell pair always has two slots.
pub fn value_label(v: Option<&Value>) -> String {
    match v {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "None".to_string(),
        Some(other) => other.to_string(),
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    let opt = Option::<T>::deserialize(deserializer)?;
    Ok(opt.unwrap_or_default())
}
