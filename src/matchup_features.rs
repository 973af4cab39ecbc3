use crate::lane_stats::{LaneStatsTable, NEUTRAL_WIN_RATE};
use crate::match_record::TeamDraft;
use crate::roles::{ROLES, Role};

pub fn lane_wr_feature(role: Role) -> String {
    format!("lane_{}_blue_wr", role.key())
}

pub fn lane_adv_feature(role: Role) -> String {
    format!("lane_{}_counter_adv", role.key())
}

/// Both lane feature names for every role, in canonical order.
pub fn lane_feature_names() -> Vec<String> {
    ROLES
        .iter()
        .flat_map(|r| [lane_wr_feature(*r), lane_adv_feature(*r)])
        .collect()
}

/// Per-role counter-pick features. Roles without a champion on both sides are
/// left out entirely.
pub fn lane_matchup_features(
    blue: &TeamDraft,
    red: &TeamDraft,
    patch: &str,
    lanes: &LaneStatsTable,
) -> Vec<(String, f64)> {
    let mut out = Vec::with_capacity(ROLES.len() * 2);
    for role in ROLES {
        let (Some(b), Some(r)) = (blue.get(&role), red.get(&role)) else {
            continue;
        };
        let wr = lanes.blue_win_rate(patch, role, b, r);
        out.push((lane_wr_feature(role), wr));
        out.push((lane_adv_feature(role), wr - NEUTRAL_WIN_RATE));
    }
    out
}
