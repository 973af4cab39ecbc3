//! Per-side composition totals and their blue-minus-red differentials.
//!
//! Every quantity is a plain sum over the champions present on a side. There
//! is no positional weighting and no synergy term; champions missing from the
//! attribute table contribute nothing.

use crate::champion_table::ChampionAttributeTable;
use crate::match_record::TeamDraft;

pub const SIDE_FEATURE_NAMES: [&str; 14] = [
    "ad_share_diff",
    "ap_share_diff",
    "true_share_diff",
    "hard_cc_diff",
    "soft_cc_diff",
    "engage_tools_diff",
    "early_diff",
    "mid_diff",
    "late_diff",
    "engage_diff",
    "poke_diff",
    "siege_diff",
    "dive_diff",
    "split_diff",
];

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DamageProfile {
    pub ad: f64,
    pub ap: f64,
    pub true_dmg: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SideProfile {
    pub damage: DamageProfile,
    pub hard_cc: f64,
    pub soft_cc: f64,
    pub engage_tools: f64,
    pub engage: f64,
    pub poke: f64,
    pub siege: f64,
    pub dive: f64,
    pub split: f64,
    pub early: f64,
    pub mid: f64,
    pub late: f64,
    /// Champions on the side that were found in the attribute table.
    pub known: usize,
}

/// Damage-type shares. They sum to 1 when any weight is nonzero and are all
/// zero otherwise.
pub fn damage_profile(team: &TeamDraft, champions: &ChampionAttributeTable) -> DamageProfile {
    let mut raw = DamageProfile::default();
    for attrs in team.values().filter_map(|c| champions.get(c)) {
        raw.ad += attrs.ad_weight;
        raw.ap += attrs.ap_weight;
        raw.true_dmg += attrs.true_weight;
    }
    let total = raw.ad + raw.ap + raw.true_dmg;
    if total == 0.0 {
        return DamageProfile::default();
    }
    DamageProfile {
        ad: raw.ad / total,
        ap: raw.ap / total,
        true_dmg: raw.true_dmg / total,
    }
}

pub fn side_profile(team: &TeamDraft, champions: &ChampionAttributeTable) -> SideProfile {
    let mut out = SideProfile {
        damage: damage_profile(team, champions),
        ..Default::default()
    };
    for attrs in team.values().filter_map(|c| champions.get(c)) {
        out.hard_cc += attrs.hard_cc;
        out.soft_cc += attrs.soft_cc;
        out.engage_tools += attrs.engage;
        out.engage += attrs.engage;
        out.poke += attrs.poke;
        out.siege += attrs.siege;
        out.dive += attrs.dive;
        out.split += attrs.split;
        out.early += attrs.early;
        out.mid += attrs.mid;
        out.late += attrs.late;
        out.known += 1;
    }
    out
}

impl SideProfile {
    /// Values in [`SIDE_FEATURE_NAMES`] order.
    pub fn values(&self) -> [f64; 14] {
        [
            self.damage.ad,
            self.damage.ap,
            self.damage.true_dmg,
            self.hard_cc,
            self.soft_cc,
            self.engage_tools,
            self.early,
            self.mid,
            self.late,
            self.engage,
            self.poke,
            self.siege,
            self.dive,
            self.split,
        ]
    }
}

/// Blue minus red for every side quantity, paired with its feature name.
pub fn side_feature_diff(
    blue: &TeamDraft,
    red: &TeamDraft,
    champions: &ChampionAttributeTable,
) -> [(&'static str, f64); 14] {
    let b = side_profile(blue, champions).values();
    let r = side_profile(red, champions).values();
    std::array::from_fn(|i| (SIDE_FEATURE_NAMES[i], b[i] - r[i]))
}
