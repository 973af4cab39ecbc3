//! Raw match document → `MatchRecord`.
//!
//! Best-effort: missing pieces degrade to defaults (no
//! keystone, no role, loss outcome) and every degradation is surfaced in a
//! [`NormalizeReport`] instead of aborting the batch.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::DraftError;
use crate::match_record::{KEYSTONE_SLOT, MatchRecord, Side, TeamDraft, TeamRunes, TeamSummoners};
use crate::raw_match::{BLUE_TEAM_ID, RED_TEAM_ID, RawMatch, as_i64_any, parse_raw_match_json};
use crate::roles::{Role, resolve_role};

/// What to do when the blue team entry is absent from `info.teams`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomePolicy {
    /// Record the match as a blue loss and count it as degraded.
    #[default]
    AssumeLoss,
    /// Refuse the record with [`DraftError::MissingOutcome`].
    Reject,
}

impl FromStr for OutcomePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "assume_loss" | "loss" => Ok(Self::AssumeLoss),
            "reject" | "error" => Ok(Self::Reject),
            other => Err(format!("unknown outcome policy: {other}")),
        }
    }
}

impl fmt::Display for OutcomePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AssumeLoss => f.write_str("assume_loss"),
            Self::Reject => f.write_str("reject"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    UnknownRole,
    DuplicateRole(Side, Role),
    UnknownSide,
    MissingChampion,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParticipantOutcome {
    Accepted { side: Side, role: Role },
    Rejected { index: usize, reason: RejectReason },
}

#[derive(Debug, Clone)]
pub struct Normalized {
    pub record: MatchRecord,
    pub participants: Vec<ParticipantOutcome>,
    pub outcome_defaulted: bool,
}

impl Normalized {
    pub fn rejected(&self) -> impl Iterator<Item = RejectReason> + '_ {
        self.participants.iter().filter_map(|p| match p {
            ParticipantOutcome::Rejected { reason, .. } => Some(*reason),
            ParticipantOutcome::Accepted { .. } => None,
        })
    }

    pub fn is_degraded(&self) -> bool {
        self.outcome_defaulted || self.rejected().next().is_some()
    }
}

/// Data-quality counters for one normalization batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizeReport {
    pub documents: usize,
    pub accepted: usize,
    pub degraded: usize,
    pub malformed: usize,
    pub missing_outcome: usize,
    pub outcome_defaulted: usize,
    pub participants_accepted: usize,
    pub rejected_unknown_role: usize,
    pub rejected_duplicate_role: usize,
    pub rejected_unknown_side: usize,
    pub rejected_missing_champion: usize,
    pub errors: Vec<String>,
}

impl NormalizeReport {
    pub fn rejected_participants(&self) -> usize {
        self.rejected_unknown_role
            + self.rejected_duplicate_role
            + self.rejected_unknown_side
            + self.rejected_missing_champion
    }

    pub fn skipped(&self) -> usize {
        self.malformed + self.missing_outcome
    }

    pub fn observe(&mut self, label: &str, result: &Result<Normalized, DraftError>) {
        self.documents += 1;
        match result {
            Ok(normalized) => {
                self.accepted += 1;
                if normalized.is_degraded() {
                    self.degraded += 1;
                }
                if normalized.outcome_defaulted {
                    self.outcome_defaulted += 1;
                }
                for p in &normalized.participants {
                    match p {
                        ParticipantOutcome::Accepted { .. } => self.participants_accepted += 1,
                        ParticipantOutcome::Rejected { reason, .. } => match reason {
                            RejectReason::UnknownRole => self.rejected_unknown_role += 1,
                            RejectReason::DuplicateRole(..) => self.rejected_duplicate_role += 1,
                            RejectReason::UnknownSide => self.rejected_unknown_side += 1,
                            RejectReason::MissingChampion => self.rejected_missing_champion += 1,
                        },
                    }
                }
            }
            Err(DraftError::MissingOutcome { .. }) => {
                self.missing_outcome += 1;
                self.errors.push(format!("{label}: missing blue outcome"));
            }
            Err(err) => {
                self.malformed += 1;
                self.errors.push(format!("{label}: {err}"));
            }
        }
    }
}

/// Buckets a full game version into its `major.minor` patch.
/// `"14.7.456.1234"` → `"14.7"`; a single-component string is returned as is.
pub fn extract_patch(game_version: &str) -> String {
    let mut parts = game_version.split('.');
    match (parts.next(), parts.next()) {
        (Some(major), Some(minor)) => format!("{major}.{minor}"),
        _ => game_version.to_string(),
    }
}

/// Sort key that orders "14.10" after "14.9". Non-numeric components sort
/// before numeric ones and fall back to text.
pub fn patch_order_key(patch: &str) -> Vec<(u64, String)> {
    patch
        .split('.')
        .map(|part| match part.parse::<u64>() {
            Ok(n) => (n + 1, String::new()),
            Err(_) => (0, part.to_string()),
        })
        .collect()
}

pub fn normalize_match_json(raw: &str, policy: OutcomePolicy) -> Result<Normalized, DraftError> {
    let parsed = parse_raw_match_json(raw).map_err(|err| DraftError::MalformedMatch {
        reason: format!("{err:#}"),
    })?;
    normalize_match(&parsed, policy)
}

pub fn normalize_match(raw: &RawMatch, policy: OutcomePolicy) -> Result<Normalized, DraftError> {
    let match_id = raw
        .metadata
        .match_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| DraftError::MalformedMatch {
            reason: "missing metadata.matchId".to_string(),
        })?
        .to_string();

    let patch = extract_patch(raw.info.game_version.as_deref().unwrap_or_default());

    // A blue entry without a win flag carries no outcome either.
    let (blue_win, outcome_defaulted) = match raw.team(BLUE_TEAM_ID).and_then(|team| team.win) {
        Some(win) => (win, false),
        None => match policy {
            OutcomePolicy::AssumeLoss => (false, true),
            OutcomePolicy::Reject => return Err(DraftError::MissingOutcome { match_id }),
        },
    };

    let mut blue = SideBuilder::default();
    let mut red = SideBuilder::default();
    let mut participants = Vec::with_capacity(raw.info.participants.len());

    for (index, p) in raw.info.participants.iter().enumerate() {
        let side = match p.team_id {
            Some(BLUE_TEAM_ID) => Side::Blue,
            Some(RED_TEAM_ID) => Side::Red,
            _ => {
                participants.push(ParticipantOutcome::Rejected {
                    index,
                    reason: RejectReason::UnknownSide,
                });
                continue;
            }
        };
        let Some(role) = resolve_role(p.team_position.as_deref(), p.individual_position.as_deref())
        else {
            debug!(%match_id, index, "participant role unresolved");
            participants.push(ParticipantOutcome::Rejected {
                index,
                reason: RejectReason::UnknownRole,
            });
            continue;
        };
        let Some(champion) = p
            .champion_name
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
        else {
            participants.push(ParticipantOutcome::Rejected {
                index,
                reason: RejectReason::MissingChampion,
            });
            continue;
        };

        let builder = match side {
            Side::Blue => &mut blue,
            Side::Red => &mut red,
        };
        // First participant seen in a role keeps it; later ones are reported.
        if builder.team.contains_key(&role) {
            debug!(%match_id, index, %role, "duplicate role on one side");
            participants.push(ParticipantOutcome::Rejected {
                index,
                reason: RejectReason::DuplicateRole(side, role),
            });
            continue;
        }
        builder.team.insert(role, champion.to_string());
        if let Some(keystone) = p.keystone() {
            builder.runes.insert(
                role,
                BTreeMap::from([(KEYSTONE_SLOT.to_string(), keystone.to_string())]),
            );
        }
        builder.summoners.insert(role, p.summoner_spells());
        participants.push(ParticipantOutcome::Accepted { side, role });
    }

    if outcome_defaulted {
        warn!(%match_id, "blue outcome missing, recording a blue loss");
    }

    let record = MatchRecord {
        match_id,
        patch,
        blue_win,
        blue_team: blue.team,
        red_team: red.team,
        blue_runes: blue.runes,
        red_runes: red.runes,
        blue_summoners: blue.summoners,
        red_summoners: red.summoners,
        bans_blue: ban_list(raw, BLUE_TEAM_ID),
        bans_red: ban_list(raw, RED_TEAM_ID),
        region: raw.info.platform_id.clone(),
        queue: raw.info.queue_id,
    };

    Ok(Normalized {
        record,
        participants,
        outcome_defaulted,
    })
}

/// Normalizes a batch of `(label, json)` documents. Failures are counted in the
/// report and never stop the batch.
pub fn normalize_batch<'a, I>(documents: I, policy: OutcomePolicy) -> (Vec<MatchRecord>, NormalizeReport)
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut report = NormalizeReport::default();
    let mut records = Vec::new();
    for (label, raw) in documents {
        let result = normalize_match_json(raw, policy);
        report.observe(label, &result);
        if let Ok(normalized) = result {
            records.push(normalized.record);
        }
    }
    (records, report)
}

#[derive(Default)]
struct SideBuilder {
    team: TeamDraft,
    runes: TeamRunes,
    summoners: TeamSummoners,
}

fn ban_list(raw: &RawMatch, team_id: i64) -> Vec<String> {
    let Some(team) = raw.team(team_id) else {
        return Vec::new();
    };
    team.bans
        .iter()
        .filter_map(|ban| match ban.champion_id.as_ref()? {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => as_i64_any(other)
                .map(|id| id.to_string())
                .or_else(|| Some(other.to_string())),
        })
        .collect()
}
