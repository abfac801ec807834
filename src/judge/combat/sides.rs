//! Grouping co-located units into combat sides.

use super::super::{relations, PhaseContext};
use crate::ids::{FactionId, UnitId};
use crate::store::StoreError;
use crate::unit::{Unit, UnitStatus};
use std::collections::{BTreeMap, BTreeSet};

/// One belligerent group in a territory: a transitive-closure union of
/// allied factions, or a single unaffiliated unit.
#[derive(Debug)]
pub(crate) struct CombatSide {
    pub factions: BTreeSet<FactionId>,
    pub units: Vec<Unit>,
    /// The battlefield action this side is pursuing, read from its units'
    /// ongoing orders.
    pub action: Option<crate::order::UnitAction>,
    pub has_capture: bool,
}

impl CombatSide {
    pub fn active_units(&self) -> impl Iterator<Item = &Unit> {
        self.units
            .iter()
            .filter(|u| u.status == UnitStatus::Active && u.organization > 0)
    }

    pub fn total_attack(&self) -> i64 {
        self.active_units().map(|u| u.attack).sum()
    }

    pub fn total_defense(&self) -> i64 {
        self.active_units().map(|u| u.defense).sum()
    }

    pub fn has_keyword(&self, keyword: &str) -> bool {
        self.active_units().any(|u| u.has_keyword(keyword))
    }

    pub fn min_unit_id(&self) -> Option<&UnitId> {
        self.units.iter().map(|u| &u.unit_id).min()
    }

    /// Drop units that died this round.
    pub fn prune_dead(&mut self) {
        self.units
            .retain(|u| u.status == UnitStatus::Active && u.organization > 0);
    }

    /// The faction closure this side counts as friendly.
    pub fn friendly_closure(
        &self,
        ctx: &PhaseContext<'_>,
    ) -> Result<BTreeSet<FactionId>, StoreError> {
        let mut closure = BTreeSet::new();
        for faction in &self.factions {
            closure.extend(relations::allied_closure(ctx.store, ctx.guild, faction)?);
        }
        Ok(closure)
    }
}

/// Group units by faction, then union the faction groups along active
/// alliances. Unaffiliated units each form their own side.
pub(crate) fn group_into_sides(
    ctx: &mut PhaseContext<'_>,
    units: Vec<Unit>,
) -> Result<Vec<CombatSide>, StoreError> {
    let mut by_faction: BTreeMap<FactionId, Vec<Unit>> = BTreeMap::new();
    let mut sides: Vec<CombatSide> = Vec::new();

    for unit in units {
        match relations::unit_faction(&unit).cloned() {
            Some(faction) => by_faction.entry(faction).or_default().push(unit),
            None => sides.push(CombatSide {
                factions: BTreeSet::new(),
                units: vec![unit],
                action: None,
                has_capture: false,
            }),
        }
    }

    // Union faction groups whose closures intersect. The representative
    // of each union is the smallest faction id in the closure, which
    // keeps grouping deterministic.
    let mut by_representative: BTreeMap<FactionId, CombatSide> = BTreeMap::new();
    for (faction, group_units) in by_faction {
        let closure = relations::allied_closure(ctx.store, ctx.guild, &faction)?;
        let representative = closure
            .iter()
            .min()
            .cloned()
            .unwrap_or_else(|| faction.clone());
        let side = by_representative
            .entry(representative)
            .or_insert_with(|| CombatSide {
                factions: BTreeSet::new(),
                units: Vec::new(),
                action: None,
                has_capture: false,
            });
        side.factions.insert(faction);
        side.units.extend(group_units);
    }

    sides.extend(by_representative.into_values());
    Ok(sides)
}
