//! Relationship queries shared by the resolvers: alliance closure, war
//! hostility, permission checks and event audiences.

use crate::faction::Permission;
use crate::geo::{Controller, Territory};
use crate::ids::{CharacterId, FactionId, GuildId};
use crate::store::{Store, StoreResult};
use crate::unit::Unit;
use std::collections::BTreeSet;

/// Whether `character` leads `faction`.
pub fn is_leader(
    store: &dyn Store,
    guild: GuildId,
    faction_id: &FactionId,
    character_id: &CharacterId,
) -> StoreResult<bool> {
    Ok(store
        .fetch_faction(guild, faction_id)?
        .and_then(|f| f.leader)
        .as_ref()
        == Some(character_id))
}

/// Whether `character` holds `permission` in `faction`. The leader
/// implicitly holds every permission.
pub fn has_permission(
    store: &dyn Store,
    guild: GuildId,
    faction_id: &FactionId,
    character_id: &CharacterId,
    permission: Permission,
) -> StoreResult<bool> {
    if is_leader(store, guild, faction_id, character_id)? {
        return Ok(true);
    }
    Ok(store
        .permissions_of(guild, faction_id)?
        .iter()
        .any(|p| &p.character_id == character_id && p.permission == permission))
}

/// Whether two factions share an ACTIVE alliance.
pub fn are_allied(
    store: &dyn Store,
    guild: GuildId,
    x: &FactionId,
    y: &FactionId,
) -> StoreResult<bool> {
    if x == y {
        return Ok(true);
    }
    Ok(store
        .find_alliance(guild, x, y)?
        .map(|a| a.is_active())
        .unwrap_or(false))
}

/// The transitive closure of ACTIVE alliances containing `seed`. Always
/// includes `seed` itself.
pub fn allied_closure(
    store: &dyn Store,
    guild: GuildId,
    seed: &FactionId,
) -> StoreResult<BTreeSet<FactionId>> {
    let mut closure = BTreeSet::new();
    closure.insert(seed.clone());
    let mut frontier = vec![seed.clone()];
    while let Some(faction) = frontier.pop() {
        for alliance in store.alliances_of(guild, &faction)? {
            if !alliance.is_active() {
                continue;
            }
            if let Some(partner) = alliance.partner_of(&faction) {
                if closure.insert(partner.clone()) {
                    frontier.push(partner.clone());
                }
            }
        }
    }
    Ok(closure)
}

/// Whether two factions stand on opposite sides of any war.
pub fn are_at_war(
    store: &dyn Store,
    guild: GuildId,
    x: &FactionId,
    y: &FactionId,
) -> StoreResult<bool> {
    if x == y {
        return Ok(false);
    }
    for participation in store.participations_of(guild, x)? {
        for other in store.war_participants(guild, &participation.war_id)? {
            if &other.faction_id == y && other.side != participation.side {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

/// Every faction on the opposite side of any war `faction` fights in.
pub fn hostile_factions_to(
    store: &dyn Store,
    guild: GuildId,
    faction_id: &FactionId,
) -> StoreResult<BTreeSet<FactionId>> {
    let mut hostile = BTreeSet::new();
    for participation in store.participations_of(guild, faction_id)? {
        for other in store.war_participants(guild, &participation.war_id)? {
            if other.side != participation.side {
                hostile.insert(other.faction_id);
            }
        }
    }
    Ok(hostile)
}

/// The faction a territory effectively answers to: the controlling
/// faction, or the represented faction of the controlling character.
pub fn territory_faction(
    store: &dyn Store,
    guild: GuildId,
    territory: &Territory,
) -> StoreResult<Option<FactionId>> {
    match &territory.controller {
        Some(Controller::Faction(f)) => Ok(Some(f.clone())),
        Some(Controller::Character(c)) => Ok(store
            .fetch_character(guild, c)?
            .and_then(|ch| ch.represented_faction_id)),
        None => Ok(None),
    }
}

/// Characters who should hear about events touching a faction's military:
/// the leader plus every COMMAND permission holder.
pub fn command_audience(
    store: &dyn Store,
    guild: GuildId,
    faction_id: &FactionId,
) -> StoreResult<Vec<CharacterId>> {
    let mut audience = Vec::new();
    if let Some(faction) = store.fetch_faction(guild, faction_id)? {
        if let Some(leader) = faction.leader {
            audience.push(leader);
        }
    }
    for grant in store.permissions_of(guild, faction_id)? {
        if grant.permission == Permission::Command {
            audience.push(grant.character_id);
        }
    }
    Ok(audience)
}

/// Every member of a faction.
pub fn member_audience(
    store: &dyn Store,
    guild: GuildId,
    faction_id: &FactionId,
) -> StoreResult<Vec<CharacterId>> {
    Ok(store
        .members_of(guild, faction_id)?
        .into_iter()
        .map(|m| m.character_id)
        .collect())
}

/// Characters affected by events touching the given units: character
/// owners, commanders, and COMMAND holders of owning factions.
pub fn unit_audience(
    store: &dyn Store,
    guild: GuildId,
    units: &[Unit],
) -> StoreResult<Vec<CharacterId>> {
    let mut audience = Vec::new();
    let mut factions_seen = BTreeSet::new();
    for unit in units {
        match &unit.owner {
            crate::Party::Character(c) => audience.push(c.clone()),
            crate::Party::Faction(f) => {
                if factions_seen.insert(f.clone()) {
                    audience.extend(command_audience(store, guild, f)?);
                }
            }
        }
        if let Some(commander) = &unit.commander {
            audience.push(commander.clone());
        }
    }
    Ok(audience)
}

/// The faction a unit fights for. Reads the unit's own affiliation, which
/// may be stale relative to the owner's current representation; the rule
/// is kept as recorded.
pub fn unit_faction(unit: &Unit) -> Option<&FactionId> {
    unit.faction_id.as_ref()
}

/// Whether two unit groups are hostile for movement purposes: at war, or
/// carrying the `hostile` keyword without an alliance between them. Allied
/// groups are never hostile, and the keyword does not override alliance.
pub fn units_hostile(
    store: &dyn Store,
    guild: GuildId,
    side_a: &[Unit],
    side_b: &[Unit],
) -> StoreResult<bool> {
    let faction_a = side_a.first().and_then(|u| u.faction_id.clone());
    let faction_b = side_b.first().and_then(|u| u.faction_id.clone());

    if let (Some(a), Some(b)) = (&faction_a, &faction_b) {
        if are_allied(store, guild, a, b)? {
            return Ok(false);
        }
    }

    let keyword_hostile = side_a
        .iter()
        .chain(side_b.iter())
        .any(|u| u.has_keyword(crate::unit::keyword::HOSTILE));
    if keyword_hostile {
        return Ok(true);
    }

    match (&faction_a, &faction_b) {
        (Some(a), Some(b)) => are_at_war(store, guild, a, b),
        _ => Ok(false),
    }
}

#[cfg(test)]
mod test {
    use super::{allied_closure, are_at_war};
    use crate::diplo::{Alliance, AllianceStatus, War, WarParticipant, WarSide};
    use crate::ids::{FactionId, GuildId};
    use crate::store::{MemoryStore, Store};

    const GUILD: GuildId = GuildId(7);

    fn active_alliance(a: &str, b: &str) -> Alliance {
        let mut alliance = Alliance::propose(FactionId::from(a), FactionId::from(b));
        alliance.status = AllianceStatus::Active;
        alliance.activated_turn = Some(1);
        alliance
    }

    #[test]
    fn closure_is_transitive() {
        let mut store = MemoryStore::new();
        store.upsert_alliance(GUILD, &active_alliance("f1", "f2")).unwrap();
        store.upsert_alliance(GUILD, &active_alliance("f2", "f3")).unwrap();

        let closure = allied_closure(&store, GUILD, &FactionId::from("f1")).unwrap();
        assert!(closure.contains(&FactionId::from("f3")));
        assert_eq!(closure.len(), 3);
    }

    #[test]
    fn pending_alliances_do_not_count() {
        let mut store = MemoryStore::new();
        let pending = Alliance::propose(FactionId::from("f1"), FactionId::from("f2"));
        store.upsert_alliance(GUILD, &pending).unwrap();

        let closure = allied_closure(&store, GUILD, &FactionId::from("f1")).unwrap();
        assert_eq!(closure.len(), 1);
    }

    #[test]
    fn war_requires_opposite_sides() {
        let mut store = MemoryStore::new();
        store
            .insert_war(
                GUILD,
                War {
                    war_id: "w1".into(),
                    objective: "test".into(),
                    declared_turn: 1,
                },
            )
            .unwrap();
        for (faction, side) in [("f1", WarSide::SideA), ("f2", WarSide::SideB), ("f3", WarSide::SideA)] {
            store
                .insert_war_participant(
                    GUILD,
                    WarParticipant {
                        war_id: "w1".into(),
                        faction_id: faction.into(),
                        side,
                        joined_turn: 1,
                        is_original_declarer: side == WarSide::SideA && faction == "f1",
                    },
                )
                .unwrap();
        }

        assert!(are_at_war(&store, GUILD, &"f1".into(), &"f2".into()).unwrap());
        assert!(!are_at_war(&store, GUILD, &"f1".into(), &"f3".into()).unwrap());
    }
}
