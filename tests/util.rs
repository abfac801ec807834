#![allow(dead_code)]
#![cfg(test)]

use wargame::character::Character;
use wargame::config::WargameConfig;
use wargame::diplo::{Alliance, AllianceStatus, War, WarParticipant, WarSide};
use wargame::event::{CapturingSink, Event, EventKind};
use wargame::faction::{Faction, FactionMember};
use wargame::geo::{Adjacency, Controller, Terrain, Territory};
use wargame::ids::{CharacterId, FactionId, GuildId, TerritoryId, UnitId, WarId};
use wargame::intake::{submit_order, OrderRequest, SubmitOutcome};
use wargame::order::OrderData;
use wargame::resources::ResourcePool;
use wargame::store::{MemoryStore, Store};
use wargame::unit::{Unit, UnitStatus};
use wargame::Party;

pub const GUILD: GuildId = GuildId(42);

/// Incrementally builds a tenant world inside a `MemoryStore`.
pub struct GameBuilder {
    pub store: MemoryStore,
    turn: u32,
}

impl GameBuilder {
    pub fn new() -> Self {
        GameBuilder {
            store: MemoryStore::new(),
            turn: 0,
        }
    }

    pub fn at_turn(mut self, turn: u32) -> Self {
        self.turn = turn;
        self
    }

    /// A plains territory with no production and no controller.
    pub fn territory(self, id: &str) -> Self {
        self.territory_of(id, Terrain::Plains)
    }

    pub fn territory_of(mut self, id: &str, terrain: Terrain) -> Self {
        self.store
            .upsert_territory(GUILD, &plain_territory(id, terrain))
            .unwrap();
        self
    }

    pub fn territory_with(mut self, territory: Territory) -> Self {
        self.store.upsert_territory(GUILD, &territory).unwrap();
        self
    }

    /// Territories in a line, creating any that do not exist yet.
    pub fn chain(mut self, ids: &[&str]) -> Self {
        for id in ids {
            if self
                .store
                .fetch_territory(GUILD, &TerritoryId::from(*id))
                .unwrap()
                .is_none()
            {
                self = self.territory(id);
            }
        }
        for pair in ids.windows(2) {
            self.store
                .insert_adjacency(
                    GUILD,
                    Adjacency::between(TerritoryId::from(pair[0]), TerritoryId::from(pair[1])),
                )
                .unwrap();
        }
        self
    }

    pub fn connect(mut self, a: &str, b: &str) -> Self {
        self.store
            .insert_adjacency(
                GUILD,
                Adjacency::between(TerritoryId::from(a), TerritoryId::from(b)),
            )
            .unwrap();
        self
    }

    pub fn character(mut self, id: &str) -> Self {
        self.store
            .upsert_character(GUILD, &plain_character(id))
            .unwrap();
        self
    }

    /// A faction whose leader is a fresh character who represents it.
    pub fn faction_led_by(mut self, faction_id: &str, leader_id: &str) -> Self {
        self.store
            .upsert_character(
                GUILD,
                &Character {
                    represented_faction_id: Some(FactionId::from(faction_id)),
                    ..plain_character(leader_id)
                },
            )
            .unwrap();
        self.store
            .upsert_faction(
                GUILD,
                &Faction {
                    faction_id: FactionId::from(faction_id),
                    name: faction_id.to_string(),
                    nation: None,
                    leader: Some(CharacterId::from(leader_id)),
                    has_declared_war: false,
                    created_turn: 0,
                    spending: ResourcePool::default(),
                },
            )
            .unwrap();
        self.store
            .insert_member(
                GUILD,
                FactionMember {
                    faction_id: FactionId::from(faction_id),
                    character_id: CharacterId::from(leader_id),
                    joined_turn: 0,
                },
            )
            .unwrap();
        self
    }

    /// Add an existing character to an existing faction.
    pub fn member(mut self, faction_id: &str, character_id: &str, joined_turn: u32) -> Self {
        self.store
            .insert_member(
                GUILD,
                FactionMember {
                    faction_id: FactionId::from(faction_id),
                    character_id: CharacterId::from(character_id),
                    joined_turn,
                },
            )
            .unwrap();
        self
    }

    pub fn unit(mut self, unit: Unit) -> Self {
        self.store.upsert_unit(GUILD, &unit).unwrap();
        self
    }

    /// An ACTIVE alliance inserted directly, bypassing the handshake.
    pub fn allied(mut self, a: &str, b: &str) -> Self {
        let mut alliance = Alliance::propose(FactionId::from(a), FactionId::from(b));
        alliance.status = AllianceStatus::Active;
        alliance.activated_turn = Some(0);
        self.store.upsert_alliance(GUILD, &alliance).unwrap();
        self
    }

    /// A war inserted directly, with the first faction on side A and the
    /// rest on side B.
    pub fn at_war(mut self, war_id: &str, side_a: &str, side_b: &str) -> Self {
        self.store
            .insert_war(
                GUILD,
                War {
                    war_id: WarId::from(war_id),
                    objective: war_id.to_string(),
                    declared_turn: 0,
                },
            )
            .unwrap();
        for (faction, side) in [(side_a, WarSide::SideA), (side_b, WarSide::SideB)] {
            self.store
                .insert_war_participant(
                    GUILD,
                    WarParticipant {
                        war_id: WarId::from(war_id),
                        faction_id: FactionId::from(faction),
                        side,
                        joined_turn: 0,
                        is_original_declarer: side == WarSide::SideA,
                    },
                )
                .unwrap();
        }
        self
    }

    pub fn resources(mut self, character_id: &str, pool: ResourcePool) -> Self {
        self.store
            .set_player_resources(GUILD, &CharacterId::from(character_id), pool)
            .unwrap();
        self
    }

    pub fn build(mut self) -> MemoryStore {
        self.store
            .upsert_config(
                GUILD,
                &WargameConfig {
                    current_turn: self.turn,
                    ..WargameConfig::default()
                },
            )
            .unwrap();
        self.store
    }
}

pub fn plain_territory(id: &str, terrain: Terrain) -> Territory {
    Territory {
        territory_id: TerritoryId::from(id),
        name: None,
        terrain,
        production: ResourcePool::default(),
        controller: None,
        original_nation: None,
        victory_points: 0,
        siege_defense: 0,
        keywords: Default::default(),
    }
}

pub fn plain_character(id: &str) -> Character {
    Character {
        character_id: CharacterId::from(id),
        name: id.to_string(),
        user_id: None,
        production: ResourcePool::default(),
        victory_points: 0,
        represented_faction_id: None,
        representation_changed_turn: None,
    }
}

/// An infantry unit with sensible defaults: movement 3, attack and
/// defense 5, organization 10 of 10, no upkeep.
pub fn infantry(id: &str, owner: &str, faction: Option<&str>, territory: &str) -> Unit {
    Unit {
        unit_id: UnitId::from(id),
        name: None,
        unit_type_id: String::from("infantry"),
        current_territory: Some(TerritoryId::from(territory)),
        owner: Party::Character(CharacterId::from(owner)),
        commander: None,
        commander_assigned_turn: None,
        faction_id: faction.map(FactionId::from),
        status: UnitStatus::Active,
        movement: 3,
        attack: 5,
        defense: 5,
        siege_attack: 0,
        siege_defense: 0,
        size: 1,
        capacity: 0,
        organization: 10,
        max_organization: 10,
        upkeep: ResourcePool::default(),
        keywords: [String::from("infantry")].into_iter().collect(),
    }
}

/// A naval unit with the `naval` keyword, ready for water orders.
pub fn warship(id: &str, owner: &str, faction: Option<&str>, territory: &str) -> Unit {
    let mut unit = infantry(id, owner, faction, territory);
    unit.unit_type_id = String::from("warship");
    unit.keywords = [String::from("naval")].into_iter().collect();
    unit
}

/// A territory controlled by a character.
pub fn held_by(mut territory: Territory, character: &str) -> Territory {
    territory.controller = Some(Controller::Character(CharacterId::from(character)));
    territory
}

/// Advance one turn and return the emitted events.
pub fn advance(store: &mut MemoryStore, from_turn: u32) -> Vec<Event> {
    let mut sink = CapturingSink::default();
    let outcome = wargame::advance_turn(store, &mut sink, GUILD, from_turn)
        .expect("turn should resolve");
    outcome.emitted_events
}

/// Submit an order, asserting acceptance, and return its id.
pub fn submit(
    store: &mut MemoryStore,
    submitter: &str,
    units: &[&str],
    data: OrderData,
) -> wargame::ids::OrderId {
    let request =
        OrderRequest::new(data).with_units(units.iter().map(|u| UnitId::from(*u)));
    match submit_order(store, GUILD, &CharacterId::from(submitter), request)
        .expect("submission should not error")
    {
        SubmitOutcome::Accepted { order_id } => order_id,
        other => panic!("submission was not accepted: {:?}", other),
    }
}

/// A transit order payload along the given path.
pub fn transit(path: &[&str]) -> OrderData {
    unit_action(wargame::order::UnitAction::Transit, path)
}

pub fn unit_action(action: wargame::order::UnitAction, path: &[&str]) -> OrderData {
    OrderData::UnitAction {
        action,
        path: path.iter().map(|t| TerritoryId::from(*t)).collect(),
        speed: None,
        water_path: None,
        coast_territory: None,
        disembark_territory: None,
    }
}

pub fn events_of<'a>(events: &'a [Event], kind: EventKind) -> Vec<&'a Event> {
    events.iter().filter(|e| e.kind == kind).collect()
}

pub fn has_event(events: &[Event], kind: EventKind) -> bool {
    !events_of(events, kind).is_empty()
}
