//! The economy resolvers: resource transfers, collection, and the
//! organization/upkeep phase with its destruction cascade.

pub(crate) mod collection;
pub(crate) mod nexus_fx;
pub(crate) mod transfer;
pub(crate) mod upkeep;

use super::{relations, PhaseContext};
use crate::ids::CharacterId;
use crate::resources::ResourcePool;
use crate::store::StoreError;
use crate::Party;

/// Read a party's resource inventory.
pub(crate) fn party_resources(
    ctx: &PhaseContext<'_>,
    party: &Party,
) -> Result<ResourcePool, StoreError> {
    match party {
        Party::Character(c) => ctx.store.player_resources(ctx.guild, c),
        Party::Faction(f) => ctx.store.faction_resources(ctx.guild, f),
    }
}

/// Write a party's resource inventory.
pub(crate) fn set_party_resources(
    ctx: &mut PhaseContext<'_>,
    party: &Party,
    resources: ResourcePool,
) -> Result<(), StoreError> {
    match party {
        Party::Character(c) => ctx.store.set_player_resources(ctx.guild, c, resources),
        Party::Faction(f) => ctx.store.set_faction_resources(ctx.guild, f, resources),
    }
}

/// Characters who should hear about a party's economic events.
pub(crate) fn party_audience(
    ctx: &PhaseContext<'_>,
    party: &Party,
) -> Result<Vec<CharacterId>, StoreError> {
    match party {
        Party::Character(c) => Ok(vec![c.clone()]),
        Party::Faction(f) => relations::command_audience(ctx.store, ctx.guild, f),
    }
}
