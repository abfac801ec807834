//! Submission-time validation for unit orders: authorization, co-location,
//! path geometry, and the per-action constraint table.

use super::{store_rejection, OrderRequest, Rejection, RejectionKind, Validation};
use crate::faction::Permission;
use crate::geo::Territory;
use crate::ids::{CharacterId, GuildId, TerritoryId};
use crate::judge::relations;
use crate::order::{OrderData, UnitAction};
use crate::store::Store;
use crate::unit::{keyword, Unit};
use crate::Party;

pub(super) fn validate(
    store: &dyn Store,
    guild: GuildId,
    submitter: &CharacterId,
    request: &OrderRequest,
) -> Validation<OrderData> {
    let OrderData::UnitAction {
        action,
        path,
        speed,
        ..
    } = &request.data
    else {
        unreachable!("unit action validation dispatched for a unit order");
    };

    if request.unit_ids.is_empty() {
        return Err(Rejection::new(
            RejectionKind::BadPath,
            "a unit order must address at least one unit",
        ));
    }

    let mut units = Vec::with_capacity(request.unit_ids.len());
    for unit_id in &request.unit_ids {
        let unit = store
            .fetch_unit(guild, unit_id)
            .map_err(store_rejection)?
            .ok_or_else(|| {
                Rejection::new(
                    RejectionKind::UnknownEntity,
                    format!("unit '{}' does not exist", unit_id),
                )
            })?;
        if !unit.is_active() {
            return Err(Rejection::new(
                RejectionKind::UnknownEntity,
                format!("unit '{}' is disbanded", unit_id),
            ));
        }
        authorize(store, guild, submitter, &unit)?;
        units.push(unit);
    }

    // Group moves require co-location.
    let origin = units[0].current_territory.clone().ok_or_else(|| {
        Rejection::new(
            RejectionKind::UnitsNotColocated,
            format!("unit '{}' is not positioned on the map", units[0].unit_id),
        )
    })?;
    for unit in &units[1..] {
        if unit.current_territory.as_ref() != Some(&origin) {
            return Err(Rejection::new(
                RejectionKind::UnitsNotColocated,
                format!("unit '{}' is not at {}", unit.unit_id, origin),
            ));
        }
    }

    if units.iter().any(|u| u.has_keyword(keyword::IMMOBILE)) {
        return Err(Rejection::new(
            RejectionKind::KeywordMismatch,
            "immobile units cannot be given movement orders",
        ));
    }

    let territories = fetch_path(store, guild, path, &origin)?;
    validate_action(store, guild, *action, &units, &territories, *speed)?;

    let mut data = request.data.clone();
    if *action == UnitAction::Transport {
        let (water_path, coast, disembark) = decompose_transport_path(&territories)?;
        if let OrderData::UnitAction {
            water_path: wp,
            coast_territory: ct,
            disembark_territory: dt,
            ..
        } = &mut data
        {
            *wp = Some(water_path);
            *ct = Some(coast);
            *dt = Some(disembark);
        }
    }
    Ok(data)
}

/// The submitter must be the owner or commander of every listed unit; for
/// faction-owned units COMMAND permission or commander status suffices.
fn authorize(
    store: &dyn Store,
    guild: GuildId,
    submitter: &CharacterId,
    unit: &Unit,
) -> Validation<()> {
    if unit.commander.as_ref() == Some(submitter) {
        return Ok(());
    }
    match &unit.owner {
        Party::Character(owner) if owner == submitter => Ok(()),
        Party::Faction(faction) => {
            if relations::has_permission(store, guild, faction, submitter, Permission::Command)
                .map_err(store_rejection)?
            {
                Ok(())
            } else {
                Err(Rejection::new(
                    RejectionKind::Unauthorized,
                    format!(
                        "commanding unit '{}' requires COMMAND permission in {}",
                        unit.unit_id, faction
                    ),
                ))
            }
        }
        _ => Err(Rejection::new(
            RejectionKind::Unauthorized,
            format!("you neither own nor command unit '{}'", unit.unit_id),
        )),
    }
}

/// Resolve the path to territories and check start and adjacency.
fn fetch_path(
    store: &dyn Store,
    guild: GuildId,
    path: &[TerritoryId],
    origin: &TerritoryId,
) -> Validation<Vec<Territory>> {
    if path.is_empty() {
        return Err(Rejection::new(RejectionKind::BadPath, "the path is empty"));
    }
    if &path[0] != origin {
        return Err(Rejection::new(
            RejectionKind::BadPath,
            format!("the path must start at {}, not {}", origin, path[0]),
        ));
    }
    let mut territories = Vec::with_capacity(path.len());
    for territory_id in path {
        let territory = store
            .fetch_territory(guild, territory_id)
            .map_err(store_rejection)?
            .ok_or_else(|| {
                Rejection::new(
                    RejectionKind::UnknownEntity,
                    format!("territory '{}' does not exist", territory_id),
                )
            })?;
        territories.push(territory);
    }
    for pair in path.windows(2) {
        let adjacent = store
            .adjacent_to(guild, &pair[0])
            .map_err(store_rejection)?
            .contains(&pair[1]);
        if !adjacent {
            return Err(Rejection::new(
                RejectionKind::BadPath,
                format!("{} and {} are not adjacent", pair[0], pair[1]),
            ));
        }
    }
    Ok(territories)
}

fn validate_action(
    store: &dyn Store,
    guild: GuildId,
    action: UnitAction,
    units: &[Unit],
    territories: &[Territory],
    speed: Option<u32>,
) -> Validation<()> {
    match action {
        UnitAction::Transit | UnitAction::Raid | UnitAction::Capture | UnitAction::Siege => {
            require_land_path(territories)?;
            if matches!(action, UnitAction::Raid | UnitAction::Capture) {
                for unit in units {
                    if unit.has_keyword(keyword::INFILTRATOR) || unit.is_aerial() {
                        return Err(Rejection::new(
                            RejectionKind::KeywordMismatch,
                            format!(
                                "unit '{}' cannot {} territory",
                                unit.unit_id, action
                            ),
                        ));
                    }
                }
            }
            if action == UnitAction::Siege {
                let last = territories.last().expect("path is non-empty");
                if last.terrain != crate::geo::Terrain::City {
                    return Err(Rejection::new(
                        RejectionKind::TerrainMismatch,
                        format!("siege target {} is not a city", last.territory_id),
                    ));
                }
            }
            Ok(())
        }
        UnitAction::Patrol => {
            require_land_path(territories)?;
            let distinct: std::collections::BTreeSet<&str> = territories
                .iter()
                .map(|t| t.territory_id.as_str())
                .collect();
            if distinct.len() < 2 {
                return Err(Rejection::new(
                    RejectionKind::BadPath,
                    "a patrol route needs at least two distinct territories",
                ));
            }
            if let Some(limit) = speed {
                if limit < 1 {
                    return Err(Rejection::new(
                        RejectionKind::BadSpeed,
                        "patrol speed must be at least 1",
                    ));
                }
            }
            Ok(())
        }
        UnitAction::Transport => {
            // The land-water-land decomposition is checked when the water
            // segment is extracted; here only the endpoints matter.
            let first = territories.first().expect("path is non-empty");
            let last = territories.last().expect("path is non-empty");
            if first.is_water() || last.is_water() {
                return Err(Rejection::new(
                    RejectionKind::BadPath,
                    "a transport route must begin and end on land",
                ));
            }
            Ok(())
        }
        UnitAction::AerialConvoy => {
            for unit in units {
                if !unit.has_keyword(keyword::AERIAL_TRANSPORT) {
                    return Err(Rejection::new(
                        RejectionKind::KeywordMismatch,
                        format!("unit '{}' is not an aerial transport", unit.unit_id),
                    ));
                }
            }
            let origin = &territories[0];
            if let Some(controller_faction) =
                relations::territory_faction(store, guild, origin).map_err(store_rejection)?
            {
                if let Some(unit_faction) = relations::unit_faction(&units[0]) {
                    if relations::are_at_war(store, guild, &controller_faction, unit_faction)
                        .map_err(store_rejection)?
                    {
                        return Err(Rejection::new(
                            RejectionKind::TerrainMismatch,
                            format!(
                                "convoy origin {} is held by the enemy",
                                origin.territory_id
                            ),
                        ));
                    }
                }
            }
            Ok(())
        }
        UnitAction::AerialScout => {
            for unit in units {
                if !unit.is_aerial() {
                    return Err(Rejection::new(
                        RejectionKind::KeywordMismatch,
                        format!("unit '{}' cannot fly", unit.unit_id),
                    ));
                }
            }
            let steps = territories.len().saturating_sub(1);
            let min_movement = units.iter().map(|u| u.movement).min().unwrap_or(0);
            if steps as u32 > min_movement {
                return Err(Rejection::new(
                    RejectionKind::BadPath,
                    format!(
                        "scout route of {} steps exceeds the wing's movement of {}",
                        steps, min_movement
                    ),
                ));
            }
            Ok(())
        }
        UnitAction::NavalTransit
        | UnitAction::NavalConvoy
        | UnitAction::NavalPatrol
        | UnitAction::NavalTransport => {
            for unit in units {
                if !unit.is_naval() {
                    return Err(Rejection::new(
                        RejectionKind::KeywordMismatch,
                        format!("unit '{}' is not a naval unit", unit.unit_id),
                    ));
                }
            }
            for territory in territories {
                if !territory.is_water() {
                    return Err(Rejection::new(
                        RejectionKind::TerrainMismatch,
                        format!("{} is not water terrain", territory.territory_id),
                    ));
                }
            }
            if action == UnitAction::NavalPatrol {
                if let Some(limit) = speed {
                    if limit < 1 {
                        return Err(Rejection::new(
                            RejectionKind::BadSpeed,
                            "patrol speed must be at least 1",
                        ));
                    }
                }
            }
            Ok(())
        }
    }
}

fn require_land_path(territories: &[Territory]) -> Validation<()> {
    for territory in territories {
        if territory.is_water() {
            return Err(Rejection::new(
                RejectionKind::TerrainMismatch,
                format!("{} is water terrain", territory.territory_id),
            ));
        }
    }
    Ok(())
}

/// Split a transport path into its land-water-land shape. The water
/// segment must be contiguous and strictly interior.
fn decompose_transport_path(
    territories: &[Territory],
) -> Validation<(Vec<TerritoryId>, TerritoryId, TerritoryId)> {
    let first_water = territories.iter().position(|t| t.is_water());
    let last_water = territories.iter().rposition(|t| t.is_water());
    let (start, end) = match (first_water, last_water) {
        (Some(s), Some(e)) => (s, e),
        _ => {
            return Err(Rejection::new(
                RejectionKind::BadPath,
                "a transport route must cross water",
            ))
        }
    };
    if start == 0 || end == territories.len() - 1 {
        return Err(Rejection::new(
            RejectionKind::BadPath,
            "a transport route must begin and end on land",
        ));
    }
    if territories[start..=end].iter().any(|t| !t.is_water()) {
        return Err(Rejection::new(
            RejectionKind::BadPath,
            "the water segment of a transport route must be contiguous",
        ));
    }
    let water_path = territories[start..=end]
        .iter()
        .map(|t| t.territory_id.clone())
        .collect();
    Ok((
        water_path,
        territories[start - 1].territory_id.clone(),
        territories[end + 1].territory_id.clone(),
    ))
}
