//! Diplomatic state: alliances between faction pairs, wars and their
//! participants, and pending faction-join handshakes.

use crate::ids::{CharacterId, FactionId, OrderId, WarId};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Status of an alliance row. The two pending states name the faction
/// whose agreement is still outstanding.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AllianceStatus {
    /// Waiting for faction A (the lexicographically smaller id) to agree.
    PendingFactionA,
    /// Waiting for faction B to agree.
    PendingFactionB,
    Active,
}

/// An alliance between two factions. The pair is canonical:
/// `faction_a < faction_b`, enforced at construction. At most one row per
/// pair exists per tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alliance {
    pub faction_a: FactionId,
    pub faction_b: FactionId,
    pub status: AllianceStatus,
    pub initiated_by: FactionId,
    #[serde(default)]
    pub activated_turn: Option<u32>,
}

impl Alliance {
    /// Start a proposal from `initiator` toward `target`. The resulting
    /// status names the target as the side whose agreement is awaited.
    pub fn propose(initiator: FactionId, target: FactionId) -> Alliance {
        let (a, b) = canonical_pair(initiator.clone(), target.clone());
        let status = if target == a {
            AllianceStatus::PendingFactionA
        } else {
            AllianceStatus::PendingFactionB
        };
        Alliance {
            faction_a: a,
            faction_b: b,
            status,
            initiated_by: initiator,
            activated_turn: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == AllianceStatus::Active
    }

    /// The faction whose agreement is still outstanding, if any.
    pub fn awaiting(&self) -> Option<&FactionId> {
        match self.status {
            AllianceStatus::PendingFactionA => Some(&self.faction_a),
            AllianceStatus::PendingFactionB => Some(&self.faction_b),
            AllianceStatus::Active => None,
        }
    }

    pub fn involves(&self, faction: &FactionId) -> bool {
        &self.faction_a == faction || &self.faction_b == faction
    }

    /// The far side of the alliance from `faction`.
    pub fn partner_of(&self, faction: &FactionId) -> Option<&FactionId> {
        if &self.faction_a == faction {
            Some(&self.faction_b)
        } else if &self.faction_b == faction {
            Some(&self.faction_a)
        } else {
            None
        }
    }
}

/// Order a faction pair canonically.
pub fn canonical_pair(x: FactionId, y: FactionId) -> (FactionId, FactionId) {
    if x <= y {
        (x, y)
    } else {
        (y, x)
    }
}

/// A war. The objective is unique per tenant, compared case-insensitively:
/// a second declaration with the same objective joins the existing war.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct War {
    pub war_id: WarId,
    pub objective: String,
    pub declared_turn: u32,
}

impl War {
    /// The normalized form used for the case-insensitive uniqueness rule.
    pub fn normalized_objective(&self) -> String {
        normalize_objective(&self.objective)
    }
}

pub fn normalize_objective(objective: &str) -> String {
    objective.trim().to_lowercase()
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarSide {
    SideA,
    SideB,
}

impl WarSide {
    pub fn opposite(self) -> WarSide {
        match self {
            WarSide::SideA => WarSide::SideB,
            WarSide::SideB => WarSide::SideA,
        }
    }
}

/// A faction's participation in a war. A faction appears at most once per
/// war.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarParticipant {
    pub war_id: WarId,
    pub faction_id: FactionId,
    pub side: WarSide,
    pub joined_turn: u32,
    pub is_original_declarer: bool,
}

/// One recorded half of the two-sided faction-join handshake. The resolver
/// marries a character-submitted half with a leader-submitted half.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRequest {
    pub character_id: CharacterId,
    pub faction_id: FactionId,
    pub submitted_by_leader: bool,
    /// The order that recorded this half, completed when the halves marry.
    pub order_id: OrderId,
}

#[cfg(test)]
mod test {
    use super::{normalize_objective, Alliance, AllianceStatus};
    use crate::ids::FactionId;

    #[test]
    fn proposal_waits_for_the_target() {
        let alliance = Alliance::propose(FactionId::from("zulu"), FactionId::from("alpha"));
        assert_eq!(alliance.faction_a.as_str(), "alpha");
        assert_eq!(alliance.faction_b.as_str(), "zulu");
        // Target "alpha" sorts first, so the row waits on faction A.
        assert_eq!(alliance.status, AllianceStatus::PendingFactionA);
        assert_eq!(alliance.awaiting().unwrap().as_str(), "alpha");
        assert_eq!(alliance.initiated_by.as_str(), "zulu");
    }

    #[test]
    fn objectives_compare_case_insensitively() {
        assert_eq!(
            normalize_objective("Restore Peace"),
            normalize_objective("restore peace")
        );
    }
}
