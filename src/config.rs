//! Tenant configuration and the YAML import/export of a whole game state.
//!
//! Import is transactional and idempotent: every write is an upsert keyed
//! by the natural identifiers, and referential integrity is validated up
//! front so a bad document changes nothing.

use crate::building::{Building, BuildingType};
use crate::character::Character;
use crate::error::EngineError;
use crate::faction::{Faction, FactionPermission};
use crate::faction::FactionMember;
use crate::geo::{Adjacency, Territory};
use crate::ids::{CharacterId, FactionId, GuildId, TerritoryId};
use crate::nexus::SpiritNexus;
use crate::resources::ResourcePool;
use crate::store::Store;
use crate::unit::{Unit, UnitType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Engine configuration values recognized per tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WargameConfig {
    /// Monotonically increasing logical turn counter.
    pub current_turn: u32,
    /// When false, `advance_turn` is a no-op that returns an empty result.
    pub turn_resolution_enabled: bool,
    /// Caps unit base movement at creation.
    pub max_movement_stat: u32,
    /// Opaque routing hint for the presentation layer; passed through.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gm_reports_channel_id: Option<String>,
}

impl Default for WargameConfig {
    fn default() -> Self {
        WargameConfig {
            current_turn: 0,
            turn_resolution_enabled: true,
            max_movement_stat: 10,
            gm_reports_channel_id: None,
        }
    }
}

/// The `wargame` section of the document.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WargameSection {
    #[serde(default)]
    turn: u32,
    #[serde(default = "default_true")]
    turn_resolution_enabled: bool,
    #[serde(default = "default_max_movement")]
    max_movement_stat: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    gm_reports_channel_id: Option<String>,
}

impl Default for WargameSection {
    fn default() -> Self {
        let config = WargameConfig::default();
        WargameSection {
            turn: config.current_turn,
            turn_resolution_enabled: config.turn_resolution_enabled,
            max_movement_stat: config.max_movement_stat,
            gm_reports_channel_id: config.gm_reports_channel_id,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_movement() -> u32 {
    WargameConfig::default().max_movement_stat
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FactionEntry {
    #[serde(flatten)]
    faction: Faction,
    #[serde(default)]
    members: Vec<MemberEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MemberEntry {
    character_id: CharacterId,
    #[serde(default)]
    joined_turn: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TerritoryEntry {
    #[serde(flatten)]
    territory: Territory,
    #[serde(default)]
    adjacent: Vec<TerritoryId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PlayerResourcesEntry {
    character_id: CharacterId,
    #[serde(flatten)]
    resources: ResourcePool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FactionResourcesEntry {
    faction_id: FactionId,
    #[serde(flatten)]
    resources: ResourcePool,
}

/// The complete YAML document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct GameDocument {
    #[serde(default)]
    wargame: WargameSection,
    #[serde(default)]
    factions: Vec<FactionEntry>,
    #[serde(default)]
    player_resources: Vec<PlayerResourcesEntry>,
    #[serde(default)]
    characters: Vec<Character>,
    #[serde(default)]
    territories: Vec<TerritoryEntry>,
    #[serde(default)]
    unit_types: Vec<UnitType>,
    #[serde(default)]
    building_types: Vec<BuildingType>,
    #[serde(default)]
    buildings: Vec<Building>,
    #[serde(default)]
    units: Vec<Unit>,
    #[serde(default)]
    faction_resources: Vec<FactionResourcesEntry>,
    #[serde(default)]
    faction_permissions: Vec<FactionPermission>,
    #[serde(default)]
    spirit_nexuses: Vec<SpiritNexus>,
}

/// Counts of rows written by an import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub factions: usize,
    pub characters: usize,
    pub territories: usize,
    pub adjacencies: usize,
    pub unit_types: usize,
    pub building_types: usize,
    pub units: usize,
    pub buildings: usize,
    pub nexuses: usize,
}

/// Import a YAML document into a tenant. Validates referential integrity
/// before any write; the whole import commits or nothing does.
pub fn import_config(
    store: &mut dyn Store,
    guild: GuildId,
    yaml: &str,
) -> Result<ImportSummary, EngineError> {
    let doc: GameDocument =
        serde_yaml::from_str(yaml).map_err(|e| EngineError::Config(e.to_string()))?;

    validate_references(store, guild, &doc)?;

    store.begin_phase(guild)?;
    let written = write_document(store, guild, &doc);
    match written {
        Ok(summary) => {
            store.commit_phase(guild)?;
            Ok(summary)
        }
        Err(e) => {
            store.rollback_phase(guild)?;
            Err(e.into())
        }
    }
}

/// Export a tenant's state as a YAML document. Collections are sorted by
/// their natural identifiers so export → import → export is a fixed point.
pub fn export_config(store: &dyn Store, guild: GuildId) -> Result<String, EngineError> {
    let config = store.fetch_config(guild)?;

    let mut factions = Vec::new();
    for faction in store.all_factions(guild)? {
        let mut members: Vec<MemberEntry> = store
            .members_of(guild, &faction.faction_id)?
            .into_iter()
            .map(|m| MemberEntry {
                character_id: m.character_id,
                joined_turn: m.joined_turn,
            })
            .collect();
        members.sort_by(|a, b| a.character_id.cmp(&b.character_id));
        factions.push(FactionEntry { faction, members });
    }

    let mut territories = Vec::new();
    for territory in store.all_territories(guild)? {
        let adjacent = store.adjacent_to(guild, &territory.territory_id)?;
        territories.push(TerritoryEntry {
            territory,
            adjacent,
        });
    }

    let doc = GameDocument {
        wargame: WargameSection {
            turn: config.current_turn,
            turn_resolution_enabled: config.turn_resolution_enabled,
            max_movement_stat: config.max_movement_stat,
            gm_reports_channel_id: config.gm_reports_channel_id,
        },
        factions,
        player_resources: store
            .all_player_resources(guild)?
            .into_iter()
            .map(|(character_id, resources)| PlayerResourcesEntry {
                character_id,
                resources,
            })
            .collect(),
        characters: store.all_characters(guild)?,
        territories,
        unit_types: store.all_unit_types(guild)?,
        building_types: store.all_building_types(guild)?,
        buildings: store.all_buildings(guild)?,
        units: store.all_units(guild)?,
        faction_resources: store
            .all_faction_resources(guild)?
            .into_iter()
            .map(|(faction_id, resources)| FactionResourcesEntry {
                faction_id,
                resources,
            })
            .collect(),
        faction_permissions: {
            let mut grants = Vec::new();
            for faction in store.all_factions(guild)? {
                grants.extend(store.permissions_of(guild, &faction.faction_id)?);
            }
            grants
        },
        spirit_nexuses: store.all_nexuses(guild)?,
    };

    serde_yaml::to_string(&doc).map_err(|e| EngineError::Config(e.to_string()))
}

/// Check that every reference in the document points at an entity that is
/// either in the document or already stored. Reported before any write.
fn validate_references(
    store: &dyn Store,
    guild: GuildId,
    doc: &GameDocument,
) -> Result<(), EngineError> {
    let mut problems: Vec<String> = Vec::new();

    let mut characters: BTreeSet<CharacterId> = doc
        .characters
        .iter()
        .map(|c| c.character_id.clone())
        .collect();
    for existing in store.all_characters(guild).map_err(EngineError::from)? {
        characters.insert(existing.character_id);
    }

    let mut factions: BTreeSet<FactionId> = doc
        .factions
        .iter()
        .map(|f| f.faction.faction_id.clone())
        .collect();
    for existing in store.all_factions(guild).map_err(EngineError::from)? {
        factions.insert(existing.faction_id);
    }

    let mut territories: BTreeSet<TerritoryId> = doc
        .territories
        .iter()
        .map(|t| t.territory.territory_id.clone())
        .collect();
    for existing in store.all_territories(guild).map_err(EngineError::from)? {
        territories.insert(existing.territory_id);
    }

    let unit_types: BTreeSet<&str> = doc
        .unit_types
        .iter()
        .map(|t| t.unit_type_id.as_str())
        .collect();
    let building_types: BTreeSet<&str> = doc
        .building_types
        .iter()
        .map(|t| t.building_type_id.as_str())
        .collect();

    for entry in &doc.factions {
        if let Some(leader) = &entry.faction.leader {
            if !characters.contains(leader) {
                problems.push(format!(
                    "faction {} references missing leader {}",
                    entry.faction.faction_id, leader
                ));
            }
        }
        for member in &entry.members {
            if !characters.contains(&member.character_id) {
                problems.push(format!(
                    "faction {} references missing member {}",
                    entry.faction.faction_id, member.character_id
                ));
            }
        }
    }

    for character in &doc.characters {
        if let Some(faction) = &character.represented_faction_id {
            if !factions.contains(faction) {
                problems.push(format!(
                    "character {} represents missing faction {}",
                    character.character_id, faction
                ));
            }
        }
    }

    for entry in &doc.territories {
        use crate::geo::Controller;
        match &entry.territory.controller {
            Some(Controller::Character(c)) if !characters.contains(c) => problems.push(format!(
                "territory {} controlled by missing character {}",
                entry.territory.territory_id, c
            )),
            Some(Controller::Faction(f)) if !factions.contains(f) => problems.push(format!(
                "territory {} controlled by missing faction {}",
                entry.territory.territory_id, f
            )),
            _ => {}
        }
        for neighbor in &entry.adjacent {
            if !territories.contains(neighbor) {
                problems.push(format!(
                    "territory {} adjacent to missing territory {}",
                    entry.territory.territory_id, neighbor
                ));
            }
        }
    }

    for unit in &doc.units {
        if !unit_types.contains(unit.unit_type_id.as_str())
            && store
                .fetch_unit_type(guild, &unit.unit_type_id)
                .map_err(EngineError::from)?
                .is_none()
        {
            problems.push(format!(
                "unit {} references missing unit type {}",
                unit.unit_id, unit.unit_type_id
            ));
        }
        if let Some(territory) = &unit.current_territory {
            if !territories.contains(territory) {
                problems.push(format!(
                    "unit {} stands in missing territory {}",
                    unit.unit_id, territory
                ));
            }
        }
        match &unit.owner {
            crate::Party::Character(c) if !characters.contains(c) => problems.push(format!(
                "unit {} owned by missing character {}",
                unit.unit_id, c
            )),
            crate::Party::Faction(f) if !factions.contains(f) => {
                problems.push(format!("unit {} owned by missing faction {}", unit.unit_id, f))
            }
            _ => {}
        }
    }

    for building in &doc.buildings {
        if !territories.contains(&building.territory_id) {
            problems.push(format!(
                "building {} stands in missing territory {}",
                building.building_id, building.territory_id
            ));
        }
        if !building_types.contains(building.building_type_id.as_str())
            && store
                .fetch_building_type(guild, &building.building_type_id)
                .map_err(EngineError::from)?
                .is_none()
        {
            problems.push(format!(
                "building {} references missing building type {}",
                building.building_id, building.building_type_id
            ));
        }
    }

    for entry in &doc.player_resources {
        if !characters.contains(&entry.character_id) {
            problems.push(format!(
                "player resources reference missing character {}",
                entry.character_id
            ));
        }
    }
    for entry in &doc.faction_resources {
        if !factions.contains(&entry.faction_id) {
            problems.push(format!(
                "faction resources reference missing faction {}",
                entry.faction_id
            ));
        }
    }
    for grant in &doc.faction_permissions {
        if !factions.contains(&grant.faction_id) || !characters.contains(&grant.character_id) {
            problems.push(format!(
                "permission grant references missing faction {} or character {}",
                grant.faction_id, grant.character_id
            ));
        }
    }
    for nexus in &doc.spirit_nexuses {
        if !territories.contains(&nexus.territory_id) {
            problems.push(format!(
                "spirit nexus {} anchored to missing territory {}",
                nexus.nexus_id, nexus.territory_id
            ));
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(EngineError::Config(problems.join("; ")))
    }
}

fn write_document(
    store: &mut dyn Store,
    guild: GuildId,
    doc: &GameDocument,
) -> Result<ImportSummary, crate::store::StoreError> {
    let mut summary = ImportSummary::default();

    store.upsert_config(
        guild,
        &WargameConfig {
            current_turn: doc.wargame.turn,
            turn_resolution_enabled: doc.wargame.turn_resolution_enabled,
            max_movement_stat: doc.wargame.max_movement_stat,
            gm_reports_channel_id: doc.wargame.gm_reports_channel_id.clone(),
        },
    )?;

    for character in &doc.characters {
        store.upsert_character(guild, character)?;
        summary.characters += 1;
    }

    for entry in &doc.factions {
        store.upsert_faction(guild, &entry.faction)?;
        summary.factions += 1;
        let existing: BTreeSet<CharacterId> = store
            .members_of(guild, &entry.faction.faction_id)?
            .into_iter()
            .map(|m| m.character_id)
            .collect();
        for member in &entry.members {
            if !existing.contains(&member.character_id) {
                store.insert_member(
                    guild,
                    FactionMember {
                        faction_id: entry.faction.faction_id.clone(),
                        character_id: member.character_id.clone(),
                        joined_turn: member.joined_turn,
                    },
                )?;
            }
        }
    }

    let existing_edges: BTreeSet<Adjacency> =
        store.all_adjacencies(guild)?.into_iter().collect();
    for entry in &doc.territories {
        store.upsert_territory(guild, &entry.territory)?;
        summary.territories += 1;
        for neighbor in &entry.adjacent {
            let edge = Adjacency::between(
                entry.territory.territory_id.clone(),
                neighbor.clone(),
            );
            if !existing_edges.contains(&edge) {
                // Both directions appear in the document; only the first
                // sighting of a pair inserts.
                match store.insert_adjacency(guild, edge.clone()) {
                    Ok(()) => summary.adjacencies += 1,
                    Err(crate::store::StoreError::Conflict(_)) => {}
                    Err(e) => return Err(e),
                }
            }
        }
    }

    for unit_type in &doc.unit_types {
        store.upsert_unit_type(guild, unit_type)?;
        summary.unit_types += 1;
    }
    for building_type in &doc.building_types {
        store.upsert_building_type(guild, building_type)?;
        summary.building_types += 1;
    }
    for building in &doc.buildings {
        store.upsert_building(guild, building)?;
        summary.buildings += 1;
    }
    for unit in &doc.units {
        store.upsert_unit(guild, unit)?;
        summary.units += 1;
    }

    for entry in &doc.player_resources {
        store.set_player_resources(guild, &entry.character_id, entry.resources)?;
    }
    for entry in &doc.faction_resources {
        store.set_faction_resources(guild, &entry.faction_id, entry.resources)?;
    }
    for grant in &doc.faction_permissions {
        store.grant_permission(guild, grant.clone())?;
    }
    for nexus in &doc.spirit_nexuses {
        store.upsert_nexus(guild, nexus)?;
        summary.nexuses += 1;
    }

    Ok(summary)
}
