use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DraftError;

/// Canonical five-role vocabulary. Ordering follows the map from top lane to
/// support and drives every role-ordered output (features, tables).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Top,
    Jungle,
    Mid,
    #[serde(rename = "bot", alias = "adc")]
    BotCarry,
    #[serde(alias = "sup")]
    Support,
}

pub const ROLES: [Role; 5] = [
    Role::Top,
    Role::Jungle,
    Role::Mid,
    Role::BotCarry,
    Role::Support,
];

impl Role {
    pub fn key(self) -> &'static str {
        match self {
            Role::Top => "top",
            Role::Jungle => "jungle",
            Role::Mid => "mid",
            Role::BotCarry => "bot",
            Role::Support => "support",
        }
    }

    /// Maps one provider positional label. `UTILITY` is what the match-v5
    /// feed actually emits for supports; `SUPPORT` is accepted as well.
    pub fn from_provider_label(label: &str) -> Option<Self> {
        match label {
            "TOP" => Some(Role::Top),
            "JUNGLE" => Some(Role::Jungle),
            "MIDDLE" => Some(Role::Mid),
            "BOTTOM" => Some(Role::BotCarry),
            "UTILITY" | "SUPPORT" => Some(Role::Support),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Role {
    type Err = DraftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "top" => Ok(Role::Top),
            "jungle" | "jg" => Ok(Role::Jungle),
            "mid" | "middle" => Ok(Role::Mid),
            "bot" | "adc" | "bottom" => Ok(Role::BotCarry),
            "support" | "sup" | "utility" => Ok(Role::Support),
            _ => Err(DraftError::UnknownRole(s.to_string())),
        }
    }
}

/// Resolves a participant's role from the team-assigned label, falling back to
/// the individually computed label only when the first is absent or not
/// recognized. `None` means the participant is excluded from role-keyed data.
pub fn resolve_role(team_position: Option<&str>, individual_position: Option<&str>) -> Option<Role> {
    team_position
        .and_then(Role::from_provider_label)
        .or_else(|| individual_position.and_then(Role::from_provider_label))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn team_label_wins_over_individual() {
        assert_eq!(resolve_role(Some("TOP"), Some("MIDDLE")), Some(Role::Top));
        assert_eq!(resolve_role(Some("UTILITY"), Some("Invalid")), Some(Role::Support));
    }

    #[test]
    fn falls_back_when_team_label_missing_or_unknown() {
        assert_eq!(resolve_role(None, Some("JUNGLE")), Some(Role::Jungle));
        assert_eq!(resolve_role(Some(""), Some("BOTTOM")), Some(Role::BotCarry));
        assert_eq!(resolve_role(Some("Invalid"), Some("MIDDLE")), Some(Role::Mid));
    }

    #[test]
    fn unresolvable_pair_is_none() {
        assert_eq!(resolve_role(Some("Invalid"), Some("NONE")), None);
        assert_eq!(resolve_role(None, None), None);
    }

    #[test]
    fn role_keys_round_trip() {
        for role in ROLES {
            assert_eq!(role.key().parse::<Role>().unwrap(), role);
        }
        assert_eq!("adc".parse::<Role>().unwrap(), Role::BotCarry);
        assert!("carry".parse::<Role>().is_err());
    }
}
