use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::roles::Role;

/// Role → champion identifier for one side. May hold 0 to 5 entries.
pub type TeamDraft = BTreeMap<Role, String>;

/// Role → rune slot → selected rune id.
pub type TeamRunes = BTreeMap<Role, BTreeMap<String, String>>;

/// Role → ordered pair of summoner spell ids.
pub type TeamSummoners = BTreeMap<Role, [String; 2]>;

pub const KEYSTONE_SLOT: &str = "keystone";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Blue,
    Red,
}

/// One normalized match. Built once by the normalizer and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub match_id: String,
    pub patch: String,
    pub blue_win: bool,
    pub blue_team: TeamDraft,
    pub red_team: TeamDraft,
    #[serde(default)]
    pub blue_runes: TeamRunes,
    #[serde(default)]
    pub red_runes: TeamRunes,
    #[serde(default)]
    pub blue_summoners: TeamSummoners,
    #[serde(default)]
    pub red_summoners: TeamSummoners,
    #[serde(default)]
    pub bans_blue: Vec<String>,
    #[serde(default)]
    pub bans_red: Vec<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub queue: Option<i64>,
}

impl MatchRecord {
    pub fn team(&self, side: Side) -> &TeamDraft {
        match side {
            Side::Blue => &self.blue_team,
            Side::Red => &self.red_team,
        }
    }

    /// Roles filled on both sides, in canonical order.
    pub fn contested_roles(&self) -> impl Iterator<Item = (Role, &str, &str)> + '_ {
        crate::roles::ROLES.into_iter().filter_map(|role| {
            let blue = self.blue_team.get(&role)?;
            let red = self.red_team.get(&role)?;
            Some((role, blue.as_str(), red.as_str()))
        })
    }
}

/// Draft input at scoring time: champion-by-role for both sides plus the
/// optional loadout the serving layer receives. The loadout is carried for
/// callers and is not a model input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftContext {
    pub patch: String,
    #[serde(default = "default_blue_side")]
    pub blue_side: bool,
    pub blue_team: TeamDraft,
    pub red_team: TeamDraft,
    #[serde(default)]
    pub runes_by_role: TeamRunes,
    #[serde(default)]
    pub summoners_by_role: TeamSummoners,
}

fn default_blue_side() -> bool {
    true
}
