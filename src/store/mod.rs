//! The persistence contract the engine requires of its host.
//!
//! A concrete SQL adapter is an external collaborator; the engine ships
//! only the contract and an in-memory adapter used by tests. Every
//! accessor is scoped by tenant and all mutations within a phase are
//! committed as one unit, so a crash between phases leaves state
//! consistent at a phase boundary.

mod memory;

pub use self::memory::MemoryStore;

use crate::building::{Building, BuildingType};
use crate::character::Character;
use crate::config::WargameConfig;
use crate::diplo::{Alliance, JoinRequest, War, WarParticipant};
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
use std::collections::BTreeSet;
use thiserror::Error;

/// Store failure taxonomy. Resolvers propagate `Transient` to the
/// orchestrator, which retries the whole phase once before marking the
/// turn errored; everything else is handled where it occurs.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// A unique-key or state-machine violation.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Retry-eligible failure (lock timeout, connection loss).
    #[error("transient store failure: {0}")]
    Transient(String),

    /// Non-retryable failure. The turn is aborted at the last committed
    /// phase boundary.
    #[error("fatal store failure: {0}")]
    Fatal(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, key: impl ToString) -> StoreError {
        StoreError::NotFound {
            entity,
            key: key.to_string(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Typed, tenant-scoped accessors over durable world state.
///
/// Collection accessors return rows in a deterministic order (primary
/// identifier, or the documented sort for orders) so resolution is
/// reproducible.
pub trait Store {
    // -- configuration -----------------------------------------------------

    /// Tenant configuration; defaults apply when none has been written.
    fn fetch_config(&self, guild: GuildId) -> StoreResult<WargameConfig>;
    fn upsert_config(&mut self, guild: GuildId, config: &WargameConfig) -> StoreResult<()>;

    // -- orders ------------------------------------------------------------

    /// Persist a new order, stamping its submission sequence. Fails with
    /// `Conflict` when the order id is already taken.
    fn insert_order(&mut self, guild: GuildId, order: Order) -> StoreResult<Order>;

    /// Overwrite an existing order. Fails with `Conflict` when the stored
    /// row is already in a terminal status.
    fn update_order(&mut self, guild: GuildId, order: &Order) -> StoreResult<()>;

    fn fetch_order(&self, guild: GuildId, order_id: &OrderId) -> StoreResult<Option<Order>>;

    /// Orders routed to `phase` that take effect on or before `turn`, in
    /// `(priority asc, submitted_at asc)` order.
    fn orders_for_phase(
        &self,
        guild: GuildId,
        turn: u32,
        phase: Phase,
        statuses: &[OrderStatus],
    ) -> StoreResult<Vec<Order>>;

    /// Orders that list any of the given units.
    fn orders_for_units(
        &self,
        guild: GuildId,
        unit_ids: &[UnitId],
        statuses: &[OrderStatus],
    ) -> StoreResult<Vec<Order>>;

    fn orders_by_character_and_type(
        &self,
        guild: GuildId,
        character_id: &CharacterId,
        order_type: OrderType,
        statuses: &[OrderStatus],
    ) -> StoreResult<Vec<Order>>;

    fn count_orders(&self, guild: GuildId) -> StoreResult<u64>;

    // -- territories and adjacency -----------------------------------------

    fn fetch_territory(
        &self,
        guild: GuildId,
        territory_id: &TerritoryId,
    ) -> StoreResult<Option<Territory>>;
    fn upsert_territory(&mut self, guild: GuildId, territory: &Territory) -> StoreResult<()>;
    fn all_territories(&self, guild: GuildId) -> StoreResult<Vec<Territory>>;

    /// Record an undirected border. Fails with `Conflict` when the pair is
    /// not canonical or already present.
    fn insert_adjacency(&mut self, guild: GuildId, edge: Adjacency) -> StoreResult<()>;
    fn all_adjacencies(&self, guild: GuildId) -> StoreResult<Vec<Adjacency>>;
    fn adjacent_to(&self, guild: GuildId, territory_id: &TerritoryId)
        -> StoreResult<Vec<TerritoryId>>;

    // -- units -------------------------------------------------------------

    fn fetch_unit(&self, guild: GuildId, unit_id: &UnitId) -> StoreResult<Option<Unit>>;
    fn upsert_unit(&mut self, guild: GuildId, unit: &Unit) -> StoreResult<()>;
    fn all_units(&self, guild: GuildId) -> StoreResult<Vec<Unit>>;
    fn units_in_territory(
        &self,
        guild: GuildId,
        territory_id: &TerritoryId,
    ) -> StoreResult<Vec<Unit>>;

    fn fetch_unit_type(&self, guild: GuildId, type_id: &str) -> StoreResult<Option<UnitType>>;
    fn upsert_unit_type(&mut self, guild: GuildId, unit_type: &UnitType) -> StoreResult<()>;
    fn all_unit_types(&self, guild: GuildId) -> StoreResult<Vec<UnitType>>;

    // -- naval multi-territory occupancy ------------------------------------

    fn naval_positions(&self, guild: GuildId, unit_id: &UnitId)
        -> StoreResult<BTreeSet<TerritoryId>>;
    fn set_naval_positions(
        &mut self,
        guild: GuildId,
        unit_id: &UnitId,
        territories: BTreeSet<TerritoryId>,
    ) -> StoreResult<()>;
    fn naval_units_occupying(
        &self,
        guild: GuildId,
        territory_id: &TerritoryId,
    ) -> StoreResult<Vec<UnitId>>;
    fn all_naval_positions(
        &self,
        guild: GuildId,
    ) -> StoreResult<Vec<(UnitId, BTreeSet<TerritoryId>)>>;

    // -- characters and factions --------------------------------------------

    fn fetch_character(
        &self,
        guild: GuildId,
        character_id: &CharacterId,
    ) -> StoreResult<Option<Character>>;
    fn upsert_character(&mut self, guild: GuildId, character: &Character) -> StoreResult<()>;
    fn all_characters(&self, guild: GuildId) -> StoreResult<Vec<Character>>;

    fn fetch_faction(&self, guild: GuildId, faction_id: &FactionId)
        -> StoreResult<Option<Faction>>;
    fn upsert_faction(&mut self, guild: GuildId, faction: &Faction) -> StoreResult<()>;
    fn all_factions(&self, guild: GuildId) -> StoreResult<Vec<Faction>>;

    fn members_of(&self, guild: GuildId, faction_id: &FactionId)
        -> StoreResult<Vec<FactionMember>>;
    fn memberships_of(
        &self,
        guild: GuildId,
        character_id: &CharacterId,
    ) -> StoreResult<Vec<FactionMember>>;
    /// Fails with `Conflict` when the membership already exists.
    fn insert_member(&mut self, guild: GuildId, member: FactionMember) -> StoreResult<()>;
    fn remove_member(
        &mut self,
        guild: GuildId,
        faction_id: &FactionId,
        character_id: &CharacterId,
    ) -> StoreResult<()>;

    fn permissions_of(
        &self,
        guild: GuildId,
        faction_id: &FactionId,
    ) -> StoreResult<Vec<FactionPermission>>;
    fn grant_permission(&mut self, guild: GuildId, grant: FactionPermission) -> StoreResult<()>;

    // -- resource inventories -----------------------------------------------

    /// A character's inventory; zero for characters with no row yet.
    fn player_resources(
        &self,
        guild: GuildId,
        character_id: &CharacterId,
    ) -> StoreResult<ResourcePool>;
    fn set_player_resources(
        &mut self,
        guild: GuildId,
        character_id: &CharacterId,
        resources: ResourcePool,
    ) -> StoreResult<()>;
    fn all_player_resources(&self, guild: GuildId)
        -> StoreResult<Vec<(CharacterId, ResourcePool)>>;

    fn faction_resources(
        &self,
        guild: GuildId,
        faction_id: &FactionId,
    ) -> StoreResult<ResourcePool>;
    fn set_faction_resources(
        &mut self,
        guild: GuildId,
        faction_id: &FactionId,
        resources: ResourcePool,
    ) -> StoreResult<()>;
    fn all_faction_resources(&self, guild: GuildId)
        -> StoreResult<Vec<(FactionId, ResourcePool)>>;

    // -- alliances ----------------------------------------------------------

    /// Find the alliance row for a pair, in either argument order.
    fn find_alliance(
        &self,
        guild: GuildId,
        x: &FactionId,
        y: &FactionId,
    ) -> StoreResult<Option<Alliance>>;
    /// Fails with `Conflict` when the row's pair is not canonical.
    fn upsert_alliance(&mut self, guild: GuildId, alliance: &Alliance) -> StoreResult<()>;
    fn remove_alliance(&mut self, guild: GuildId, x: &FactionId, y: &FactionId)
        -> StoreResult<()>;
    fn alliances_of(&self, guild: GuildId, faction_id: &FactionId) -> StoreResult<Vec<Alliance>>;
    fn all_alliances(&self, guild: GuildId) -> StoreResult<Vec<Alliance>>;

    // -- wars ---------------------------------------------------------------

    fn all_wars(&self, guild: GuildId) -> StoreResult<Vec<War>>;
    fn insert_war(&mut self, guild: GuildId, war: War) -> StoreResult<()>;
    fn war_participants(&self, guild: GuildId, war_id: &WarId)
        -> StoreResult<Vec<WarParticipant>>;
    /// Fails with `Conflict` when the faction is already in the war.
    fn insert_war_participant(
        &mut self,
        guild: GuildId,
        participant: WarParticipant,
    ) -> StoreResult<()>;
    fn participations_of(
        &self,
        guild: GuildId,
        faction_id: &FactionId,
    ) -> StoreResult<Vec<WarParticipant>>;

    // -- buildings ----------------------------------------------------------

    fn fetch_building(
        &self,
        guild: GuildId,
        building_id: &BuildingId,
    ) -> StoreResult<Option<Building>>;
    fn upsert_building(&mut self, guild: GuildId, building: &Building) -> StoreResult<()>;
    fn buildings_in_territory(
        &self,
        guild: GuildId,
        territory_id: &TerritoryId,
    ) -> StoreResult<Vec<Building>>;
    fn all_buildings(&self, guild: GuildId) -> StoreResult<Vec<Building>>;

    fn fetch_building_type(
        &self,
        guild: GuildId,
        type_id: &str,
    ) -> StoreResult<Option<BuildingType>>;
    fn upsert_building_type(
        &mut self,
        guild: GuildId,
        building_type: &BuildingType,
    ) -> StoreResult<()>;
    fn all_building_types(&self, guild: GuildId) -> StoreResult<Vec<BuildingType>>;

    // -- spirit nexuses -----------------------------------------------------

    fn fetch_nexus(&self, guild: GuildId, nexus_id: &NexusId)
        -> StoreResult<Option<SpiritNexus>>;
    fn upsert_nexus(&mut self, guild: GuildId, nexus: &SpiritNexus) -> StoreResult<()>;
    fn all_nexuses(&self, guild: GuildId) -> StoreResult<Vec<SpiritNexus>>;

    // -- faction-join handshake ----------------------------------------------

    fn join_requests_for(
        &self,
        guild: GuildId,
        character_id: &CharacterId,
        faction_id: &FactionId,
    ) -> StoreResult<Vec<JoinRequest>>;
    fn insert_join_request(&mut self, guild: GuildId, request: JoinRequest) -> StoreResult<()>;
    fn delete_join_requests(
        &mut self,
        guild: GuildId,
        character_id: &CharacterId,
        faction_id: &FactionId,
    ) -> StoreResult<()>;

    // -- encirclement flags --------------------------------------------------

    fn set_encircled(&mut self, guild: GuildId, unit_id: &UnitId, encircled: bool)
        -> StoreResult<()>;
    fn clear_encircled(&mut self, guild: GuildId) -> StoreResult<()>;
    fn is_encircled(&self, guild: GuildId, unit_id: &UnitId) -> StoreResult<bool>;
    fn encircled_units(&self, guild: GuildId) -> StoreResult<Vec<UnitId>>;

    // -- turn log ------------------------------------------------------------

    fn insert_event(&mut self, guild: GuildId, event: &Event) -> StoreResult<()>;
    fn events_for_turn(&self, guild: GuildId, turn: u32) -> StoreResult<Vec<Event>>;

    // -- phase transactions ---------------------------------------------------

    /// Open the per-phase unit of work.
    fn begin_phase(&mut self, guild: GuildId) -> StoreResult<()>;
    /// Commit everything written since `begin_phase`.
    fn commit_phase(&mut self, guild: GuildId) -> StoreResult<()>;
    /// Discard everything written since `begin_phase`.
    fn rollback_phase(&mut self, guild: GuildId) -> StoreResult<()>;
}
