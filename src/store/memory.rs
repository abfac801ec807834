//! In-memory store adapter.
//!
//! The reference implementation of the [`Store`] contract, used by the
//! test suite and by hosts that want an ephemeral world. Phase
//! transactions are implemented by snapshotting the tenant's state at
//! `begin_phase` and restoring it on rollback.

use super::{Store, StoreError, StoreResult};
use crate::building::{Building, BuildingType};
use crate::character::Character;
use crate::config::WargameConfig;
use crate::diplo::{canonical_pair, Alliance, JoinRequest, War, WarParticipant};
use crate::event::Event;
use crate::faction::{Faction, FactionMember, FactionPermission};
use crate::geo::{Adjacency, Territory};
use crate::ids::{
    BuildingId, CharacterId, FactionId, GuildId, NexusId, OrderId, TerritoryId, UnitId, WarId,
};
use crate::nexus::SpiritNexus;
use crate::order::{Order, OrderStatus, OrderType, Phase};
use crate::resources::ResourcePool;
use crate::unit::{Unit, UnitType};
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Debug, Clone, Default)]
struct GuildState {
    config: Option<WargameConfig>,
    orders: BTreeMap<OrderId, Order>,
    order_seq: u64,
    territories: BTreeMap<TerritoryId, Territory>,
    adjacencies: BTreeSet<Adjacency>,
    units: BTreeMap<UnitId, Unit>,
    unit_types: BTreeMap<String, UnitType>,
    naval_positions: BTreeMap<UnitId, BTreeSet<TerritoryId>>,
    characters: BTreeMap<CharacterId, Character>,
    factions: BTreeMap<FactionId, Faction>,
    members: Vec<FactionMember>,
    permissions: Vec<FactionPermission>,
    player_resources: BTreeMap<CharacterId, ResourcePool>,
    faction_resources: BTreeMap<FactionId, ResourcePool>,
    alliances: BTreeMap<(FactionId, FactionId), Alliance>,
    wars: BTreeMap<WarId, War>,
    war_participants: Vec<WarParticipant>,
    buildings: BTreeMap<BuildingId, Building>,
    building_types: BTreeMap<String, BuildingType>,
    nexuses: BTreeMap<NexusId, SpiritNexus>,
    join_requests: Vec<JoinRequest>,
    encircled: BTreeSet<UnitId>,
    events: Vec<Event>,
}

/// An in-memory [`Store`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    guilds: HashMap<GuildId, GuildState>,
    snapshots: HashMap<GuildId, GuildState>,
    /// Test hook: the next N phase commits fail with `Transient`.
    commit_failures: u32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` `commit_phase` calls fail with a transient
    /// error, to exercise the orchestrator's retry path.
    pub fn inject_commit_failures(&mut self, count: u32) {
        self.commit_failures = count;
    }

    fn state(&self, guild: GuildId) -> Option<&GuildState> {
        self.guilds.get(&guild)
    }

    fn state_mut(&mut self, guild: GuildId) -> &mut GuildState {
        self.guilds.entry(guild).or_default()
    }
}

impl Store for MemoryStore {
    fn fetch_config(&self, guild: GuildId) -> StoreResult<WargameConfig> {
        Ok(self
            .state(guild)
            .and_then(|s| s.config.clone())
            .unwrap_or_default())
    }

    fn upsert_config(&mut self, guild: GuildId, config: &WargameConfig) -> StoreResult<()> {
        self.state_mut(guild).config = Some(config.clone());
        Ok(())
    }

    fn insert_order(&mut self, guild: GuildId, mut order: Order) -> StoreResult<Order> {
        let state = self.state_mut(guild);
        if state.orders.contains_key(&order.order_id) {
            return Err(StoreError::Conflict(format!(
                "order {} already exists",
                order.order_id
            )));
        }
        state.order_seq += 1;
        order.submitted_at = state.order_seq;
        state.orders.insert(order.order_id.clone(), order.clone());
        Ok(order)
    }

    fn update_order(&mut self, guild: GuildId, order: &Order) -> StoreResult<()> {
        let state = self.state_mut(guild);
        let existing = state
            .orders
            .get(&order.order_id)
            .ok_or_else(|| StoreError::not_found("order", &order.order_id))?;
        if existing.status.is_terminal() {
            return Err(StoreError::Conflict(format!(
                "order {} is already {} and cannot change",
                order.order_id, existing.status
            )));
        }
        if existing.status != order.status && !existing.status.can_transition_to(order.status) {
            return Err(StoreError::Conflict(format!(
                "order {} cannot move from {} to {}",
                order.order_id, existing.status, order.status
            )));
        }
        state.orders.insert(order.order_id.clone(), order.clone());
        Ok(())
    }

    fn fetch_order(&self, guild: GuildId, order_id: &OrderId) -> StoreResult<Option<Order>> {
        Ok(self
            .state(guild)
            .and_then(|s| s.orders.get(order_id).cloned()))
    }

    fn orders_for_phase(
        &self,
        guild: GuildId,
        turn: u32,
        phase: Phase,
        statuses: &[OrderStatus],
    ) -> StoreResult<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .state(guild)
            .map(|s| {
                s.orders
                    .values()
                    .filter(|o| {
                        o.phase == phase
                            && o.turn_number <= turn
                            && statuses.contains(&o.status)
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        orders.sort_by_key(|o| (o.priority, o.submitted_at));
        Ok(orders)
    }

    fn orders_for_units(
        &self,
        guild: GuildId,
        unit_ids: &[UnitId],
        statuses: &[OrderStatus],
    ) -> StoreResult<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .state(guild)
            .map(|s| {
                s.orders
                    .values()
                    .filter(|o| {
                        statuses.contains(&o.status)
                            && o.unit_ids.iter().any(|u| unit_ids.contains(u))
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        orders.sort_by_key(|o| (o.priority, o.submitted_at));
        Ok(orders)
    }

    fn orders_by_character_and_type(
        &self,
        guild: GuildId,
        character_id: &CharacterId,
        order_type: OrderType,
        statuses: &[OrderStatus],
    ) -> StoreResult<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .state(guild)
            .map(|s| {
                s.orders
                    .values()
                    .filter(|o| {
                        o.order_type == order_type
                            && &o.character_id == character_id
                            && statuses.contains(&o.status)
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        orders.sort_by_key(|o| o.submitted_at);
        Ok(orders)
    }

    fn count_orders(&self, guild: GuildId) -> StoreResult<u64> {
        Ok(self.state(guild).map(|s| s.orders.len() as u64).unwrap_or(0))
    }

    fn fetch_territory(
        &self,
        guild: GuildId,
        territory_id: &TerritoryId,
    ) -> StoreResult<Option<Territory>> {
        Ok(self
            .state(guild)
            .and_then(|s| s.territories.get(territory_id).cloned()))
    }

    fn upsert_territory(&mut self, guild: GuildId, territory: &Territory) -> StoreResult<()> {
        self.state_mut(guild)
            .territories
            .insert(territory.territory_id.clone(), territory.clone());
        Ok(())
    }

    fn all_territories(&self, guild: GuildId) -> StoreResult<Vec<Territory>> {
        Ok(self
            .state(guild)
            .map(|s| s.territories.values().cloned().collect())
            .unwrap_or_default())
    }

    fn insert_adjacency(&mut self, guild: GuildId, edge: Adjacency) -> StoreResult<()> {
        if edge.territory_a >= edge.territory_b {
            return Err(StoreError::Conflict(format!(
                "adjacency ({}, {}) is not canonical",
                edge.territory_a, edge.territory_b
            )));
        }
        let state = self.state_mut(guild);
        if !state.adjacencies.insert(edge.clone()) {
            return Err(StoreError::Conflict(format!(
                "adjacency ({}, {}) already exists",
                edge.territory_a, edge.territory_b
            )));
        }
        Ok(())
    }

    fn all_adjacencies(&self, guild: GuildId) -> StoreResult<Vec<Adjacency>> {
        Ok(self
            .state(guild)
            .map(|s| s.adjacencies.iter().cloned().collect())
            .unwrap_or_default())
    }

    fn adjacent_to(
        &self,
        guild: GuildId,
        territory_id: &TerritoryId,
    ) -> StoreResult<Vec<TerritoryId>> {
        Ok(self
            .state(guild)
            .map(|s| {
                s.adjacencies
                    .iter()
                    .filter_map(|e| e.other_side(territory_id).cloned())
                    .collect()
            })
            .unwrap_or_default())
    }

    fn fetch_unit(&self, guild: GuildId, unit_id: &UnitId) -> StoreResult<Option<Unit>> {
        Ok(self.state(guild).and_then(|s| s.units.get(unit_id).cloned()))
    }

    fn upsert_unit(&mut self, guild: GuildId, unit: &Unit) -> StoreResult<()> {
        self.state_mut(guild)
            .units
            .insert(unit.unit_id.clone(), unit.clone());
        Ok(())
    }

    fn all_units(&self, guild: GuildId) -> StoreResult<Vec<Unit>> {
        Ok(self
            .state(guild)
            .map(|s| s.units.values().cloned().collect())
            .unwrap_or_default())
    }

    fn units_in_territory(
        &self,
        guild: GuildId,
        territory_id: &TerritoryId,
    ) -> StoreResult<Vec<Unit>> {
        Ok(self
            .state(guild)
            .map(|s| {
                s.units
                    .values()
                    .filter(|u| u.current_territory.as_ref() == Some(territory_id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn fetch_unit_type(&self, guild: GuildId, type_id: &str) -> StoreResult<Option<UnitType>> {
        Ok(self
            .state(guild)
            .and_then(|s| s.unit_types.get(type_id).cloned()))
    }

    fn upsert_unit_type(&mut self, guild: GuildId, unit_type: &UnitType) -> StoreResult<()> {
        self.state_mut(guild)
            .unit_types
            .insert(unit_type.unit_type_id.clone(), unit_type.clone());
        Ok(())
    }

    fn all_unit_types(&self, guild: GuildId) -> StoreResult<Vec<UnitType>> {
        Ok(self
            .state(guild)
            .map(|s| s.unit_types.values().cloned().collect())
            .unwrap_or_default())
    }

    fn naval_positions(
        &self,
        guild: GuildId,
        unit_id: &UnitId,
    ) -> StoreResult<BTreeSet<TerritoryId>> {
        Ok(self
            .state(guild)
            .and_then(|s| s.naval_positions.get(unit_id).cloned())
            .unwrap_or_default())
    }

    fn set_naval_positions(
        &mut self,
        guild: GuildId,
        unit_id: &UnitId,
        territories: BTreeSet<TerritoryId>,
    ) -> StoreResult<()> {
        let state = self.state_mut(guild);
        if territories.is_empty() {
            state.naval_positions.remove(unit_id);
        } else {
            state.naval_positions.insert(unit_id.clone(), territories);
        }
        Ok(())
    }

    fn naval_units_occupying(
        &self,
        guild: GuildId,
        territory_id: &TerritoryId,
    ) -> StoreResult<Vec<UnitId>> {
        Ok(self
            .state(guild)
            .map(|s| {
                s.naval_positions
                    .iter()
                    .filter(|(_, set)| set.contains(territory_id))
                    .map(|(unit, _)| unit.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    fn all_naval_positions(
        &self,
        guild: GuildId,
    ) -> StoreResult<Vec<(UnitId, BTreeSet<TerritoryId>)>> {
        Ok(self
            .state(guild)
            .map(|s| {
                s.naval_positions
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn fetch_character(
        &self,
        guild: GuildId,
        character_id: &CharacterId,
    ) -> StoreResult<Option<Character>> {
        Ok(self
            .state(guild)
            .and_then(|s| s.characters.get(character_id).cloned()))
    }

    fn upsert_character(&mut self, guild: GuildId, character: &Character) -> StoreResult<()> {
        self.state_mut(guild)
            .characters
            .insert(character.character_id.clone(), character.clone());
        Ok(())
    }

    fn all_characters(&self, guild: GuildId) -> StoreResult<Vec<Character>> {
        Ok(self
            .state(guild)
            .map(|s| s.characters.values().cloned().collect())
            .unwrap_or_default())
    }

    fn fetch_faction(
        &self,
        guild: GuildId,
        faction_id: &FactionId,
    ) -> StoreResult<Option<Faction>> {
        Ok(self
            .state(guild)
            .and_then(|s| s.factions.get(faction_id).cloned()))
    }

    fn upsert_faction(&mut self, guild: GuildId, faction: &Faction) -> StoreResult<()> {
        self.state_mut(guild)
            .factions
            .insert(faction.faction_id.clone(), faction.clone());
        Ok(())
    }

    fn all_factions(&self, guild: GuildId) -> StoreResult<Vec<Faction>> {
        Ok(self
            .state(guild)
            .map(|s| s.factions.values().cloned().collect())
            .unwrap_or_default())
    }

    fn members_of(
        &self,
        guild: GuildId,
        faction_id: &FactionId,
    ) -> StoreResult<Vec<FactionMember>> {
        let mut members: Vec<FactionMember> = self
            .state(guild)
            .map(|s| {
                s.members
                    .iter()
                    .filter(|m| &m.faction_id == faction_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        members.sort_by(|a, b| a.character_id.cmp(&b.character_id));
        Ok(members)
    }

    fn memberships_of(
        &self,
        guild: GuildId,
        character_id: &CharacterId,
    ) -> StoreResult<Vec<FactionMember>> {
        let mut memberships: Vec<FactionMember> = self
            .state(guild)
            .map(|s| {
                s.members
                    .iter()
                    .filter(|m| &m.character_id == character_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        memberships.sort_by(|a, b| a.faction_id.cmp(&b.faction_id));
        Ok(memberships)
    }

    fn insert_member(&mut self, guild: GuildId, member: FactionMember) -> StoreResult<()> {
        let state = self.state_mut(guild);
        if state
            .members
            .iter()
            .any(|m| m.faction_id == member.faction_id && m.character_id == member.character_id)
        {
            return Err(StoreError::Conflict(format!(
                "{} is already a member of {}",
                member.character_id, member.faction_id
            )));
        }
        state.members.push(member);
        Ok(())
    }

    fn remove_member(
        &mut self,
        guild: GuildId,
        faction_id: &FactionId,
        character_id: &CharacterId,
    ) -> StoreResult<()> {
        let state = self.state_mut(guild);
        let before = state.members.len();
        state
            .members
            .retain(|m| !(&m.faction_id == faction_id && &m.character_id == character_id));
        if state.members.len() == before {
            return Err(StoreError::not_found(
                "faction member",
                format!("{}/{}", faction_id, character_id),
            ));
        }
        Ok(())
    }

    fn permissions_of(
        &self,
        guild: GuildId,
        faction_id: &FactionId,
    ) -> StoreResult<Vec<FactionPermission>> {
        let mut grants: Vec<FactionPermission> = self
            .state(guild)
            .map(|s| {
                s.permissions
                    .iter()
                    .filter(|p| &p.faction_id == faction_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        grants.sort_by(|a, b| {
            (&a.character_id, a.permission.to_string())
                .cmp(&(&b.character_id, b.permission.to_string()))
        });
        Ok(grants)
    }

    fn grant_permission(&mut self, guild: GuildId, grant: FactionPermission) -> StoreResult<()> {
        let state = self.state_mut(guild);
        if !state.permissions.contains(&grant) {
            state.permissions.push(grant);
        }
        Ok(())
    }

    fn player_resources(
        &self,
        guild: GuildId,
        character_id: &CharacterId,
    ) -> StoreResult<ResourcePool> {
        Ok(self
            .state(guild)
            .and_then(|s| s.player_resources.get(character_id).copied())
            .unwrap_or_default())
    }

    fn set_player_resources(
        &mut self,
        guild: GuildId,
        character_id: &CharacterId,
        resources: ResourcePool,
    ) -> StoreResult<()> {
        self.state_mut(guild)
            .player_resources
            .insert(character_id.clone(), resources);
        Ok(())
    }

    fn all_player_resources(
        &self,
        guild: GuildId,
    ) -> StoreResult<Vec<(CharacterId, ResourcePool)>> {
        Ok(self
            .state(guild)
            .map(|s| {
                s.player_resources
                    .iter()
                    .map(|(k, v)| (k.clone(), *v))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn faction_resources(
        &self,
        guild: GuildId,
        faction_id: &FactionId,
    ) -> StoreResult<ResourcePool> {
        Ok(self
            .state(guild)
            .and_then(|s| s.faction_resources.get(faction_id).copied())
            .unwrap_or_default())
    }

    fn set_faction_resources(
        &mut self,
        guild: GuildId,
        faction_id: &FactionId,
        resources: ResourcePool,
    ) -> StoreResult<()> {
        self.state_mut(guild)
            .faction_resources
            .insert(faction_id.clone(), resources);
        Ok(())
    }

    fn all_faction_resources(
        &self,
        guild: GuildId,
    ) -> StoreResult<Vec<(FactionId, ResourcePool)>> {
        Ok(self
            .state(guild)
            .map(|s| {
                s.faction_resources
                    .iter()
                    .map(|(k, v)| (k.clone(), *v))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn find_alliance(
        &self,
        guild: GuildId,
        x: &FactionId,
        y: &FactionId,
    ) -> StoreResult<Option<Alliance>> {
        let key = canonical_pair(x.clone(), y.clone());
        Ok(self.state(guild).and_then(|s| s.alliances.get(&key).cloned()))
    }

    fn upsert_alliance(&mut self, guild: GuildId, alliance: &Alliance) -> StoreResult<()> {
        if alliance.faction_a >= alliance.faction_b {
            return Err(StoreError::Conflict(format!(
                "alliance ({}, {}) is not canonical",
                alliance.faction_a, alliance.faction_b
            )));
        }
        self.state_mut(guild).alliances.insert(
            (alliance.faction_a.clone(), alliance.faction_b.clone()),
            alliance.clone(),
        );
        Ok(())
    }

    fn remove_alliance(
        &mut self,
        guild: GuildId,
        x: &FactionId,
        y: &FactionId,
    ) -> StoreResult<()> {
        let key = canonical_pair(x.clone(), y.clone());
        if self.state_mut(guild).alliances.remove(&key).is_none() {
            return Err(StoreError::not_found(
                "alliance",
                format!("({}, {})", key.0, key.1),
            ));
        }
        Ok(())
    }

    fn alliances_of(&self, guild: GuildId, faction_id: &FactionId) -> StoreResult<Vec<Alliance>> {
        Ok(self
            .state(guild)
            .map(|s| {
                s.alliances
                    .values()
                    .filter(|a| a.involves(faction_id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn all_alliances(&self, guild: GuildId) -> StoreResult<Vec<Alliance>> {
        Ok(self
            .state(guild)
            .map(|s| s.alliances.values().cloned().collect())
            .unwrap_or_default())
    }

    fn all_wars(&self, guild: GuildId) -> StoreResult<Vec<War>> {
        Ok(self
            .state(guild)
            .map(|s| s.wars.values().cloned().collect())
            .unwrap_or_default())
    }

    fn insert_war(&mut self, guild: GuildId, war: War) -> StoreResult<()> {
        let state = self.state_mut(guild);
        if state.wars.contains_key(&war.war_id) {
            return Err(StoreError::Conflict(format!(
                "war {} already exists",
                war.war_id
            )));
        }
        state.wars.insert(war.war_id.clone(), war);
        Ok(())
    }

    fn war_participants(
        &self,
        guild: GuildId,
        war_id: &WarId,
    ) -> StoreResult<Vec<WarParticipant>> {
        let mut participants: Vec<WarParticipant> = self
            .state(guild)
            .map(|s| {
                s.war_participants
                    .iter()
                    .filter(|p| &p.war_id == war_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        participants.sort_by(|a, b| a.faction_id.cmp(&b.faction_id));
        Ok(participants)
    }

    fn insert_war_participant(
        &mut self,
        guild: GuildId,
        participant: WarParticipant,
    ) -> StoreResult<()> {
        let state = self.state_mut(guild);
        if state
            .war_participants
            .iter()
            .any(|p| p.war_id == participant.war_id && p.faction_id == participant.faction_id)
        {
            return Err(StoreError::Conflict(format!(
                "{} already participates in war {}",
                participant.faction_id, participant.war_id
            )));
        }
        state.war_participants.push(participant);
        Ok(())
    }

    fn participations_of(
        &self,
        guild: GuildId,
        faction_id: &FactionId,
    ) -> StoreResult<Vec<WarParticipant>> {
        let mut participations: Vec<WarParticipant> = self
            .state(guild)
            .map(|s| {
                s.war_participants
                    .iter()
                    .filter(|p| &p.faction_id == faction_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        participations.sort_by(|a, b| a.war_id.cmp(&b.war_id));
        Ok(participations)
    }

    fn fetch_building(
        &self,
        guild: GuildId,
        building_id: &BuildingId,
    ) -> StoreResult<Option<Building>> {
        Ok(self
            .state(guild)
            .and_then(|s| s.buildings.get(building_id).cloned()))
    }

    fn upsert_building(&mut self, guild: GuildId, building: &Building) -> StoreResult<()> {
        if building.is_active() {
            let state = self.state_mut(guild);
            let duplicate = state.buildings.values().any(|b| {
                b.building_id != building.building_id
                    && b.is_active()
                    && b.territory_id == building.territory_id
                    && b.building_type_id == building.building_type_id
            });
            if duplicate {
                return Err(StoreError::Conflict(format!(
                    "territory {} already has an active {}",
                    building.territory_id, building.building_type_id
                )));
            }
        }
        self.state_mut(guild)
            .buildings
            .insert(building.building_id.clone(), building.clone());
        Ok(())
    }

    fn buildings_in_territory(
        &self,
        guild: GuildId,
        territory_id: &TerritoryId,
    ) -> StoreResult<Vec<Building>> {
        Ok(self
            .state(guild)
            .map(|s| {
                s.buildings
                    .values()
                    .filter(|b| &b.territory_id == territory_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn all_buildings(&self, guild: GuildId) -> StoreResult<Vec<Building>> {
        Ok(self
            .state(guild)
            .map(|s| s.buildings.values().cloned().collect())
            .unwrap_or_default())
    }

    fn fetch_building_type(
        &self,
        guild: GuildId,
        type_id: &str,
    ) -> StoreResult<Option<BuildingType>> {
        Ok(self
            .state(guild)
            .and_then(|s| s.building_types.get(type_id).cloned()))
    }

    fn upsert_building_type(
        &mut self,
        guild: GuildId,
        building_type: &BuildingType,
    ) -> StoreResult<()> {
        self.state_mut(guild)
            .building_types
            .insert(building_type.building_type_id.clone(), building_type.clone());
        Ok(())
    }

    fn all_building_types(&self, guild: GuildId) -> StoreResult<Vec<BuildingType>> {
        Ok(self
            .state(guild)
            .map(|s| s.building_types.values().cloned().collect())
            .unwrap_or_default())
    }

    fn fetch_nexus(
        &self,
        guild: GuildId,
        nexus_id: &NexusId,
    ) -> StoreResult<Option<SpiritNexus>> {
        Ok(self
            .state(guild)
            .and_then(|s| s.nexuses.get(nexus_id).cloned()))
    }

    fn upsert_nexus(&mut self, guild: GuildId, nexus: &SpiritNexus) -> StoreResult<()> {
        self.state_mut(guild)
            .nexuses
            .insert(nexus.nexus_id.clone(), nexus.clone());
        Ok(())
    }

    fn all_nexuses(&self, guild: GuildId) -> StoreResult<Vec<SpiritNexus>> {
        Ok(self
            .state(guild)
            .map(|s| s.nexuses.values().cloned().collect())
            .unwrap_or_default())
    }

    fn join_requests_for(
        &self,
        guild: GuildId,
        character_id: &CharacterId,
        faction_id: &FactionId,
    ) -> StoreResult<Vec<JoinRequest>> {
        Ok(self
            .state(guild)
            .map(|s| {
                s.join_requests
                    .iter()
                    .filter(|r| {
                        &r.character_id == character_id && &r.faction_id == faction_id
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn insert_join_request(&mut self, guild: GuildId, request: JoinRequest) -> StoreResult<()> {
        self.state_mut(guild).join_requests.push(request);
        Ok(())
    }

    fn delete_join_requests(
        &mut self,
        guild: GuildId,
        character_id: &CharacterId,
        faction_id: &FactionId,
    ) -> StoreResult<()> {
        self.state_mut(guild).join_requests.retain(|r| {
            !(&r.character_id == character_id && &r.faction_id == faction_id)
        });
        Ok(())
    }

    fn set_encircled(
        &mut self,
        guild: GuildId,
        unit_id: &UnitId,
        encircled: bool,
    ) -> StoreResult<()> {
        let state = self.state_mut(guild);
        if encircled {
            state.encircled.insert(unit_id.clone());
        } else {
            state.encircled.remove(unit_id);
        }
        Ok(())
    }

    fn clear_encircled(&mut self, guild: GuildId) -> StoreResult<()> {
        self.state_mut(guild).encircled.clear();
        Ok(())
    }

    fn is_encircled(&self, guild: GuildId, unit_id: &UnitId) -> StoreResult<bool> {
        Ok(self
            .state(guild)
            .map(|s| s.encircled.contains(unit_id))
            .unwrap_or(false))
    }

    fn encircled_units(&self, guild: GuildId) -> StoreResult<Vec<UnitId>> {
        Ok(self
            .state(guild)
            .map(|s| s.encircled.iter().cloned().collect())
            .unwrap_or_default())
    }

    fn insert_event(&mut self, guild: GuildId, event: &Event) -> StoreResult<()> {
        self.state_mut(guild).events.push(event.clone());
        Ok(())
    }

    fn events_for_turn(&self, guild: GuildId, turn: u32) -> StoreResult<Vec<Event>> {
        Ok(self
            .state(guild)
            .map(|s| {
                s.events
                    .iter()
                    .filter(|e| e.turn_number == turn)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn begin_phase(&mut self, guild: GuildId) -> StoreResult<()> {
        let snapshot = self.state_mut(guild).clone();
        self.snapshots.insert(guild, snapshot);
        Ok(())
    }

    fn commit_phase(&mut self, guild: GuildId) -> StoreResult<()> {
        if self.commit_failures > 0 {
            self.commit_failures -= 1;
            return Err(StoreError::Transient(String::from(
                "injected commit failure",
            )));
        }
        self.snapshots.remove(&guild);
        Ok(())
    }

    fn rollback_phase(&mut self, guild: GuildId) -> StoreResult<()> {
        if let Some(snapshot) = self.snapshots.remove(&guild) {
            self.guilds.insert(guild, snapshot);
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::MemoryStore;
    use crate::geo::Adjacency;
    use crate::ids::{GuildId, TerritoryId};
    use crate::order::{Order, OrderData, OrderStatus, OrderType, Phase, UnitAction};
    use crate::store::{Store, StoreError};

    const GUILD: GuildId = GuildId(1);

    fn transit_order(id: &str) -> Order {
        Order {
            order_id: id.into(),
            order_type: OrderType::Unit,
            unit_ids: vec!["u1".into()],
            character_id: "c1".into(),
            turn_number: 1,
            phase: Phase::Movement,
            priority: 10,
            status: OrderStatus::Pending,
            data: OrderData::UnitAction {
                action: UnitAction::Transit,
                path: vec![TerritoryId::from("a"), TerritoryId::from("b")],
                speed: None,
                water_path: None,
                coast_territory: None,
                disembark_territory: None,
            },
            result: Default::default(),
            submitted_at: 0,
            updated_turn: None,
        }
    }

    #[test]
    fn submission_sequence_is_monotonic() {
        let mut store = MemoryStore::new();
        let first = store.insert_order(GUILD, transit_order("o1")).unwrap();
        let second = store.insert_order(GUILD, transit_order("o2")).unwrap();
        assert!(second.submitted_at > first.submitted_at);
    }

    #[test]
    fn terminal_orders_never_mutate() {
        let mut store = MemoryStore::new();
        let mut order = store.insert_order(GUILD, transit_order("o1")).unwrap();
        order.status = OrderStatus::Success;
        store.update_order(GUILD, &order).unwrap();

        order.status = OrderStatus::Failed;
        assert!(matches!(
            store.update_order(GUILD, &order),
            Err(StoreError::Conflict(_))
        ));
    }

    #[test]
    fn non_canonical_adjacency_is_rejected() {
        let mut store = MemoryStore::new();
        let backwards = Adjacency {
            territory_a: TerritoryId::from("b"),
            territory_b: TerritoryId::from("a"),
        };
        assert!(matches!(
            store.insert_adjacency(GUILD, backwards),
            Err(StoreError::Conflict(_))
        ));
    }

    #[test]
    fn rollback_restores_the_snapshot() {
        let mut store = MemoryStore::new();
        store.insert_order(GUILD, transit_order("o1")).unwrap();
        store.begin_phase(GUILD).unwrap();
        store.insert_order(GUILD, transit_order("o2")).unwrap();
        store.rollback_phase(GUILD).unwrap();
        assert_eq!(store.count_orders(GUILD).unwrap(), 1);
    }

    #[test]
    fn orders_sort_by_priority_then_submission() {
        let mut store = MemoryStore::new();
        let mut low_priority = transit_order("o1");
        low_priority.priority = 20;
        store.insert_order(GUILD, low_priority).unwrap();
        store.insert_order(GUILD, transit_order("o2")).unwrap();

        let fetched = store
            .orders_for_phase(GUILD, 1, Phase::Movement, &[OrderStatus::Pending])
            .unwrap();
        assert_eq!(fetched[0].order_id.as_str(), "o2");
        assert_eq!(fetched[1].order_id.as_str(), "o1");
    }
}
