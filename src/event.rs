//! The append-only turn log and the sink resolvers emit through.

use crate::ids::CharacterId;
use crate::order::Phase;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum_macros::{Display, EnumString};

/// Every event type the engine emits.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    // Diplomacy.
    FactionJoinPending,
    FactionMemberJoined,
    FactionMemberLeft,
    FactionMemberKicked,
    AlliancePending,
    AllianceFormed,
    AllianceDissolved,
    WarDeclared,
    WarJoined,
    WarProductionBonus,
    CommanderAssigned,

    // Movement.
    TransitComplete,
    MovementComplete,
    EngagementDetected,
    UnitsEmbarked,
    UnitsDisembarked,
    UnitEncircled,

    // Combat.
    CombatActionConflict,
    CombatEnded,
    CombatMaxRounds,
    CombatRetreat,
    TerritoryCaptured,
    BuildingCombatDamage,
    BuildingSiegeDamage,
    NavalCombatResolved,
    TransportCargoDestroyed,
    UnitDisbanded,

    // Economy.
    ResourceTransferExecuted,
    TransferDeficit,
    CharacterProduction,
    BuildingUpkeepPaid,
    BuildingUpkeepDeficit,
    UpkeepPaid,
    UpkeepDeficit,
    BuildingDestroyed,
    NexusDamaged,
    NexusRepaired,

    // Construction and victory.
    UnitMobilized,
    BuildingConstructed,
    VictoryPointsAssigned,

    // Orchestration.
    OrderFailed,
}

/// What kind of entity an event is about.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Territory,
    Unit,
    Building,
    Character,
    Faction,
    Alliance,
    War,
    Nexus,
    Order,
}

/// One record in the turn log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub turn_number: u32,
    pub phase: Phase,
    pub kind: EventKind,
    pub entity_kind: EntityKind,
    pub entity_id: String,
    /// Free-form payload the presentation layer renders.
    pub data: Value,
    /// Characters who should be shown this event. `None` marks a GM-only
    /// event that carries no audience at all.
    pub audience: Option<Vec<CharacterId>>,
}

impl Event {
    pub fn new(
        turn_number: u32,
        phase: Phase,
        kind: EventKind,
        entity_kind: EntityKind,
        entity_id: impl Into<String>,
    ) -> Event {
        Event {
            turn_number,
            phase,
            kind,
            entity_kind,
            entity_id: entity_id.into(),
            data: Value::Object(Map::new()),
            audience: Some(Vec::new()),
        }
    }

    /// Attach a payload field.
    pub fn with(mut self, key: &str, value: impl Serialize) -> Event {
        if let Value::Object(map) = &mut self.data {
            if let Ok(v) = serde_json::to_value(value) {
                map.insert(key.to_string(), v);
            }
        }
        self
    }

    /// Set the audience, deduplicated and sorted for determinism.
    pub fn for_audience(mut self, audience: impl IntoIterator<Item = CharacterId>) -> Event {
        let mut list: Vec<CharacterId> = audience.into_iter().collect();
        list.sort();
        list.dedup();
        self.audience = Some(list);
        self
    }

    /// Mark the event GM-only: no audience list at all.
    pub fn gm_only(mut self) -> Event {
        self.audience = None;
        self
    }
}

/// Receives events as the orchestrator appends them to the turn log.
/// Tests swap in a capturing sink; production hosts forward to their
/// presentation pipeline.
pub trait EventSink {
    fn accept(&mut self, event: &Event);
}

/// A sink that drops everything.
#[derive(Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn accept(&mut self, _event: &Event) {}
}

/// A sink that records every event, for tests and replay.
#[derive(Debug, Default)]
pub struct CapturingSink {
    pub events: Vec<Event>,
}

impl EventSink for CapturingSink {
    fn accept(&mut self, event: &Event) {
        self.events.push(event.clone());
    }
}

#[cfg(test)]
mod test {
    use super::{EntityKind, Event, EventKind};
    use crate::order::Phase;

    #[test]
    fn audience_is_sorted_and_deduplicated() {
        let event = Event::new(1, Phase::Combat, EventKind::CombatEnded, EntityKind::Territory, "t1")
            .for_audience(vec!["zed".into(), "abe".into(), "zed".into()]);
        let audience = event.audience.unwrap();
        assert_eq!(audience.len(), 2);
        assert_eq!(audience[0].as_str(), "abe");
    }

    #[test]
    fn gm_events_carry_no_audience() {
        let event = Event::new(1, Phase::Organization, EventKind::NexusDamaged, EntityKind::Nexus, "n")
            .gm_only();
        assert!(event.audience.is_none());
    }

    #[test]
    fn kinds_serialize_as_uppercase() {
        assert_eq!(EventKind::AllianceFormed.to_string(), "ALLIANCE_FORMED");
        assert_eq!(EventKind::OrderFailed.to_string(), "ORDER_FAILED");
    }
}
