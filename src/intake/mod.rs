//! Order intake: transform a user-supplied request into a durable order
//! row, or reject it with a precise reason.
//!
//! Validation failures are data, not errors: they come back as
//! [`SubmitOutcome::Rejected`] so the caller can show the reason to the
//! player. Only store failures escape as [`EngineError`].

mod conflict;
mod unit_action;

pub use self::conflict::find_conflicting_orders;

use crate::config::WargameConfig;
use crate::error::EngineError;
use crate::faction::Permission;
use crate::ids::{CharacterId, GuildId, OrderId};
use crate::judge::relations;
use crate::order::{
    schedule_for, Order, OrderData, OrderStatus, OrderType, ResultData,
};
use crate::store::Store;
use crate::Party;
use std::fmt;

/// Reason category for a rejected submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum RejectionKind {
    Unauthorized,
    UnknownEntity,
    UnitsNotColocated,
    BadPath,
    TerrainMismatch,
    KeywordMismatch,
    BadSpeed,
    BadAmount,
    Duplicate,
    NotCancellable,
    NationMismatch,
    InvalidTarget,
}

impl fmt::Display for RejectionKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let text = match self {
            RejectionKind::Unauthorized => "not authorized",
            RejectionKind::UnknownEntity => "unknown entity",
            RejectionKind::UnitsNotColocated => "units are not together",
            RejectionKind::BadPath => "invalid path",
            RejectionKind::TerrainMismatch => "terrain mismatch",
            RejectionKind::KeywordMismatch => "unit kind mismatch",
            RejectionKind::BadSpeed => "invalid speed",
            RejectionKind::BadAmount => "invalid amount",
            RejectionKind::Duplicate => "duplicate order",
            RejectionKind::NotCancellable => "not cancellable",
            RejectionKind::NationMismatch => "nation mismatch",
            RejectionKind::InvalidTarget => "invalid target",
        };
        write!(f, "{}", text)
    }
}

/// A rejected submission: the kind of problem plus the specific detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub kind: RejectionKind,
    pub detail: String,
}

impl Rejection {
    pub fn new(kind: RejectionKind, detail: impl Into<String>) -> Self {
        Rejection {
            kind,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.detail)
    }
}

pub(crate) type Validation<T> = Result<T, Rejection>;

/// A user-supplied order request.
#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub data: OrderData,
    pub unit_ids: Vec<crate::ids::UnitId>,
    /// When true, conflicting PENDING/ONGOING orders for the same units
    /// are cancelled instead of blocking the submission.
    pub override_conflicts: bool,
}

impl OrderRequest {
    pub fn new(data: OrderData) -> Self {
        OrderRequest {
            data,
            unit_ids: Vec::new(),
            override_conflicts: false,
        }
    }

    pub fn with_units(
        mut self,
        unit_ids: impl IntoIterator<Item = crate::ids::UnitId>,
    ) -> Self {
        self.unit_ids = unit_ids.into_iter().collect();
        self
    }

    pub fn with_override(mut self) -> Self {
        self.override_conflicts = true;
        self
    }
}

/// The result of a submission attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Accepted {
        order_id: OrderId,
    },
    Rejected {
        message: String,
    },
    /// Conflicting orders exist; retry with the override flag to cancel
    /// them and proceed.
    ConfirmationNeeded {
        existing_orders: Vec<OrderId>,
    },
}

/// The result of a cancellation attempt. Cancelling an already-cancelled
/// order is a no-op that succeeds.
#[derive(Debug, Clone, PartialEq)]
pub enum CancelOutcome {
    Cancelled,
    AlreadyCancelled,
    Rejected { message: String },
}

/// Validate and persist an order submission.
pub fn submit_order(
    store: &mut dyn Store,
    guild: GuildId,
    submitter: &CharacterId,
    request: OrderRequest,
) -> Result<SubmitOutcome, EngineError> {
    let config = store.fetch_config(guild)?;

    if store.fetch_character(guild, submitter)?.is_none() {
        return Ok(SubmitOutcome::Rejected {
            message: Rejection::new(
                RejectionKind::UnknownEntity,
                format!("character '{}' does not exist", submitter),
            )
            .to_string(),
        });
    }

    match validate_request(store, guild, submitter, &request, &config) {
        Ok(data) => finalize_submission(store, guild, submitter, request, data, &config),
        Err(rejection) => Ok(SubmitOutcome::Rejected {
            message: rejection.to_string(),
        }),
    }
}

/// Cancel a PENDING or ONGOING order the submitter owns.
pub fn cancel_order(
    store: &mut dyn Store,
    guild: GuildId,
    submitter: &CharacterId,
    order_id: &OrderId,
) -> Result<CancelOutcome, EngineError> {
    let mut order = match store.fetch_order(guild, order_id)? {
        Some(order) => order,
        None => {
            return Ok(CancelOutcome::Rejected {
                message: Rejection::new(
                    RejectionKind::UnknownEntity,
                    format!("order '{}' does not exist", order_id),
                )
                .to_string(),
            })
        }
    };

    if &order.character_id != submitter {
        return Ok(CancelOutcome::Rejected {
            message: Rejection::new(
                RejectionKind::Unauthorized,
                "only the submitter may cancel an order",
            )
            .to_string(),
        });
    }

    match order.status {
        OrderStatus::Cancelled => return Ok(CancelOutcome::AlreadyCancelled),
        OrderStatus::Success | OrderStatus::Failed => {
            return Ok(CancelOutcome::Rejected {
                message: Rejection::new(
                    RejectionKind::NotCancellable,
                    format!("order is already {}", order.status),
                )
                .to_string(),
            })
        }
        OrderStatus::Pending | OrderStatus::Ongoing => {}
    }

    // Victory-point assignments must run for three turns before they can
    // be withdrawn; the cancellation turn itself counts as the third.
    if order.order_type == OrderType::AssignVictoryPoints
        && order.status == OrderStatus::Ongoing
    {
        let active = order.result.turns_active.unwrap_or(0);
        if active + 1 < 3 {
            return Ok(CancelOutcome::Rejected {
                message: Rejection::new(
                    RejectionKind::NotCancellable,
                    format!(
                        "victory point assignments run at least 3 turns; this one has run {}",
                        active
                    ),
                )
                .to_string(),
            });
        }
    }

    order.status = OrderStatus::Cancelled;
    order.result.cancelled_reason = Some(String::from("cancelled_by_player"));
    store.update_order(guild, &order)?;
    Ok(CancelOutcome::Cancelled)
}

/// Allocate the next order id for the tenant.
fn next_order_id(store: &dyn Store, guild: GuildId) -> Result<OrderId, EngineError> {
    let count = store.count_orders(guild)?;
    Ok(OrderId::new(format!("ORD-{:04}", count + 1)))
}

fn finalize_submission(
    store: &mut dyn Store,
    guild: GuildId,
    submitter: &CharacterId,
    request: OrderRequest,
    data: OrderData,
    config: &WargameConfig,
) -> Result<SubmitOutcome, EngineError> {
    let order_id = next_order_id(store, guild)?;

    // Conflict detection applies to orders addressing units.
    if !request.unit_ids.is_empty() {
        let conflicts = find_conflicting_orders(store, guild, &request.unit_ids)?;
        if !conflicts.is_empty() {
            if !request.override_conflicts {
                return Ok(SubmitOutcome::ConfirmationNeeded {
                    existing_orders: conflicts.iter().map(|o| o.order_id.clone()).collect(),
                });
            }
            for mut conflicting in conflicts {
                conflicting.status = OrderStatus::Cancelled;
                conflicting.result.cancelled_reason =
                    Some(String::from("overridden_by_new_order"));
                store.update_order(guild, &conflicting)?;
            }
        }
    }

    // A fresh victory-point assignment supersedes any earlier one from the
    // same character.
    if matches!(data, OrderData::AssignVictoryPoints { .. }) {
        let earlier = store.orders_by_character_and_type(
            guild,
            submitter,
            OrderType::AssignVictoryPoints,
            &[OrderStatus::Pending, OrderStatus::Ongoing],
        )?;
        for mut old in earlier {
            old.status = OrderStatus::Cancelled;
            old.result.cancelled_reason = Some(String::from("superseded_by_new_order"));
            old.result.superseded_by = Some(order_id.clone());
            store.update_order(guild, &old)?;
        }
    }

    let order_type = order_type_of(&data);
    let action = match &data {
        OrderData::UnitAction { action, .. } => Some(*action),
        _ => None,
    };
    let (phase, priority) = schedule_for(order_type, action);

    let order = Order {
        order_id: order_id.clone(),
        order_type,
        unit_ids: request.unit_ids,
        character_id: submitter.clone(),
        turn_number: config.current_turn + 1,
        phase,
        priority,
        status: OrderStatus::Pending,
        data,
        result: ResultData::default(),
        submitted_at: 0,
        updated_turn: None,
    };
    let order = store.insert_order(guild, order)?;

    log::info!(
        "guild {}: {} submitted {} order {}",
        guild,
        submitter,
        order.order_type,
        order.order_id
    );
    Ok(SubmitOutcome::Accepted {
        order_id: order.order_id,
    })
}

fn order_type_of(data: &OrderData) -> OrderType {
    match data {
        OrderData::UnitAction { .. } => OrderType::Unit,
        OrderData::JoinFaction { .. } => OrderType::JoinFaction,
        OrderData::LeaveFaction { .. } => OrderType::LeaveFaction,
        OrderData::KickFromFaction { .. } => OrderType::KickFromFaction,
        OrderData::MakeAlliance { .. } => OrderType::MakeAlliance,
        OrderData::DissolveAlliance { .. } => OrderType::DissolveAlliance,
        OrderData::DeclareWar { .. } => OrderType::DeclareWar,
        OrderData::AssignCommander { .. } => OrderType::AssignCommander,
        OrderData::AssignVictoryPoints { .. } => OrderType::AssignVictoryPoints,
        OrderData::ResourceTransfer { .. } => OrderType::ResourceTransfer,
        OrderData::CancelTransfer { .. } => OrderType::CancelTransfer,
        OrderData::Mobilization { .. } => OrderType::Mobilization,
        OrderData::Construction { .. } => OrderType::Construction,
    }
}

/// Route a request to its type-specific validation. Returns the validated
/// (and possibly enriched) order data.
fn validate_request(
    store: &dyn Store,
    guild: GuildId,
    submitter: &CharacterId,
    request: &OrderRequest,
    config: &WargameConfig,
) -> Validation<OrderData> {
    let _ = config;
    match &request.data {
        OrderData::UnitAction { .. } => {
            unit_action::validate(store, guild, submitter, request)
        }
        OrderData::JoinFaction {
            faction_id,
            target_character_id,
            ..
        } => {
            let faction = store
                .fetch_faction(guild, faction_id)
                .map_err(store_rejection)?
                .ok_or_else(|| {
                    Rejection::new(
                        RejectionKind::UnknownEntity,
                        format!("faction '{}' does not exist", faction_id),
                    )
                })?;
            if store
                .fetch_character(guild, target_character_id)
                .map_err(store_rejection)?
                .is_none()
            {
                return Err(Rejection::new(
                    RejectionKind::UnknownEntity,
                    format!("character '{}' does not exist", target_character_id),
                ));
            }
            if store
                .memberships_of(guild, target_character_id)
                .map_err(store_rejection)?
                .iter()
                .any(|m| &m.faction_id == faction_id)
            {
                return Err(Rejection::new(
                    RejectionKind::Duplicate,
                    format!("{} is already a member of {}", target_character_id, faction_id),
                ));
            }
            // The submitter fixes which half of the handshake this is: the
            // joining character, or someone who can admit on the faction's
            // behalf.
            let submitted_by_leader = if submitter == target_character_id {
                false
            } else if relations::has_permission(
                store,
                guild,
                faction_id,
                submitter,
                Permission::Membership,
            )
            .map_err(store_rejection)?
            {
                true
            } else {
                return Err(Rejection::new(
                    RejectionKind::Unauthorized,
                    format!(
                        "only {} or the leadership of {} may submit this join",
                        target_character_id, faction.name
                    ),
                ));
            };
            Ok(OrderData::JoinFaction {
                faction_id: faction_id.clone(),
                target_character_id: target_character_id.clone(),
                submitted_by_leader,
            })
        }
        OrderData::LeaveFaction { faction_id } => {
            let membership = store
                .memberships_of(guild, submitter)
                .map_err(store_rejection)?
                .into_iter()
                .any(|m| &m.faction_id == faction_id);
            if !membership {
                return Err(Rejection::new(
                    RejectionKind::UnknownEntity,
                    format!("you are not a member of '{}'", faction_id),
                ));
            }
            if relations::is_leader(store, guild, faction_id, submitter)
                .map_err(store_rejection)?
            {
                return Err(Rejection::new(
                    RejectionKind::Unauthorized,
                    "the faction leader cannot leave",
                ));
            }
            Ok(request.data.clone())
        }
        OrderData::KickFromFaction {
            faction_id,
            target_character_id,
        } => {
            if !relations::has_permission(
                store,
                guild,
                faction_id,
                submitter,
                Permission::Membership,
            )
            .map_err(store_rejection)?
            {
                return Err(Rejection::new(
                    RejectionKind::Unauthorized,
                    "kicking requires MEMBERSHIP permission",
                ));
            }
            if target_character_id == submitter {
                return Err(Rejection::new(
                    RejectionKind::InvalidTarget,
                    "you cannot kick yourself",
                ));
            }
            if relations::is_leader(store, guild, faction_id, target_character_id)
                .map_err(store_rejection)?
            {
                return Err(Rejection::new(
                    RejectionKind::InvalidTarget,
                    "the faction leader cannot be kicked",
                ));
            }
            let is_member = store
                .members_of(guild, faction_id)
                .map_err(store_rejection)?
                .iter()
                .any(|m| &m.character_id == target_character_id);
            if !is_member {
                return Err(Rejection::new(
                    RejectionKind::UnknownEntity,
                    format!(
                        "{} is not a member of {}",
                        target_character_id, faction_id
                    ),
                ));
            }
            Ok(request.data.clone())
        }
        OrderData::MakeAlliance { target_faction_id } => {
            let own_faction = leader_faction_of(store, guild, submitter)?;
            if &own_faction == target_faction_id {
                return Err(Rejection::new(
                    RejectionKind::InvalidTarget,
                    "a faction cannot ally with itself",
                ));
            }
            if store
                .fetch_faction(guild, target_faction_id)
                .map_err(store_rejection)?
                .is_none()
            {
                return Err(Rejection::new(
                    RejectionKind::UnknownEntity,
                    format!("faction '{}' does not exist", target_faction_id),
                ));
            }
            if let Some(alliance) = store
                .find_alliance(guild, &own_faction, target_faction_id)
                .map_err(store_rejection)?
            {
                if alliance.is_active() {
                    return Err(Rejection::new(
                        RejectionKind::Duplicate,
                        "the factions are already allied",
                    ));
                }
            }
            let duplicate = store
                .orders_by_character_and_type(
                    guild,
                    submitter,
                    OrderType::MakeAlliance,
                    &[OrderStatus::Pending, OrderStatus::Ongoing],
                )
                .map_err(store_rejection)?
                .into_iter()
                .any(|o| {
                    matches!(
                        &o.data,
                        OrderData::MakeAlliance { target_faction_id: t } if t == target_faction_id
                    )
                });
            if duplicate {
                return Err(Rejection::new(
                    RejectionKind::Duplicate,
                    "an identical alliance proposal is already pending",
                ));
            }
            Ok(request.data.clone())
        }
        OrderData::DissolveAlliance { target_faction_id } => {
            let own_faction = leader_faction_of(store, guild, submitter)?;
            let alliance = store
                .find_alliance(guild, &own_faction, target_faction_id)
                .map_err(store_rejection)?;
            match alliance {
                Some(a) if a.is_active() => Ok(request.data.clone()),
                _ => Err(Rejection::new(
                    RejectionKind::UnknownEntity,
                    format!("no active alliance with '{}'", target_faction_id),
                )),
            }
        }
        OrderData::DeclareWar {
            faction_id,
            target_faction_ids,
            objective,
        } => {
            if !relations::is_leader(store, guild, faction_id, submitter)
                .map_err(store_rejection)?
            {
                return Err(Rejection::new(
                    RejectionKind::Unauthorized,
                    "only the faction leader may declare war",
                ));
            }
            if target_faction_ids.is_empty() {
                return Err(Rejection::new(
                    RejectionKind::InvalidTarget,
                    "a war needs at least one target",
                ));
            }
            if objective.trim().is_empty() {
                return Err(Rejection::new(
                    RejectionKind::InvalidTarget,
                    "a war needs an objective",
                ));
            }
            for target in target_faction_ids {
                if target == faction_id {
                    return Err(Rejection::new(
                        RejectionKind::InvalidTarget,
                        "a faction cannot declare war on itself",
                    ));
                }
                if store
                    .fetch_faction(guild, target)
                    .map_err(store_rejection)?
                    .is_none()
                {
                    return Err(Rejection::new(
                        RejectionKind::UnknownEntity,
                        format!("faction '{}' does not exist", target),
                    ));
                }
            }
            Ok(request.data.clone())
        }
        OrderData::AssignCommander {
            unit_id,
            new_commander_id,
        } => {
            let unit = store
                .fetch_unit(guild, unit_id)
                .map_err(store_rejection)?
                .ok_or_else(|| {
                    Rejection::new(
                        RejectionKind::UnknownEntity,
                        format!("unit '{}' does not exist", unit_id),
                    )
                })?;
            match &unit.owner {
                Party::Character(owner) if owner == submitter => {}
                Party::Faction(faction) => {
                    if !relations::has_permission(
                        store,
                        guild,
                        faction,
                        submitter,
                        Permission::Command,
                    )
                    .map_err(store_rejection)?
                    {
                        return Err(Rejection::new(
                            RejectionKind::Unauthorized,
                            "assigning a commander requires COMMAND permission",
                        ));
                    }
                }
                _ => {
                    return Err(Rejection::new(
                        RejectionKind::Unauthorized,
                        "only the unit's owner may assign a commander",
                    ))
                }
            }
            if let Some(commander) = new_commander_id {
                if store
                    .fetch_character(guild, commander)
                    .map_err(store_rejection)?
                    .is_none()
                {
                    return Err(Rejection::new(
                        RejectionKind::UnknownEntity,
                        format!("character '{}' does not exist", commander),
                    ));
                }
            }
            Ok(request.data.clone())
        }
        OrderData::AssignVictoryPoints { target_faction_id } => {
            if store
                .fetch_faction(guild, target_faction_id)
                .map_err(store_rejection)?
                .is_none()
            {
                return Err(Rejection::new(
                    RejectionKind::UnknownEntity,
                    format!("faction '{}' does not exist", target_faction_id),
                ));
            }
            Ok(request.data.clone())
        }
        OrderData::ResourceTransfer {
            sender,
            recipient,
            amounts,
            ongoing,
            term,
        } => {
            if !amounts.is_non_negative() {
                return Err(Rejection::new(
                    RejectionKind::BadAmount,
                    "transfer amounts must be non-negative",
                ));
            }
            if amounts.is_empty() {
                return Err(Rejection::new(
                    RejectionKind::BadAmount,
                    "transfer must move at least one resource",
                ));
            }
            if sender == recipient {
                return Err(Rejection::new(
                    RejectionKind::InvalidTarget,
                    "sender and recipient are the same",
                ));
            }
            if !ongoing && term.is_some() {
                return Err(Rejection::new(
                    RejectionKind::BadAmount,
                    "a one-shot transfer has no term",
                ));
            }
            validate_party_exists(store, guild, sender)?;
            validate_party_exists(store, guild, recipient)?;
            match sender {
                Party::Character(c) => {
                    if c != submitter {
                        return Err(Rejection::new(
                            RejectionKind::Unauthorized,
                            "you can only send your own resources",
                        ));
                    }
                }
                Party::Faction(f) => {
                    if !relations::has_permission(
                        store,
                        guild,
                        f,
                        submitter,
                        Permission::Financial,
                    )
                    .map_err(store_rejection)?
                    {
                        return Err(Rejection::new(
                            RejectionKind::Unauthorized,
                            "spending faction resources requires FINANCIAL permission",
                        ));
                    }
                }
            }
            Ok(request.data.clone())
        }
        OrderData::CancelTransfer { target_order_id } => {
            let target = store
                .fetch_order(guild, target_order_id)
                .map_err(store_rejection)?
                .ok_or_else(|| {
                    Rejection::new(
                        RejectionKind::UnknownEntity,
                        format!("order '{}' does not exist", target_order_id),
                    )
                })?;
            if target.order_type != OrderType::ResourceTransfer {
                return Err(Rejection::new(
                    RejectionKind::InvalidTarget,
                    format!("order '{}' is not a resource transfer", target_order_id),
                ));
            }
            if &target.character_id != submitter {
                return Err(Rejection::new(
                    RejectionKind::Unauthorized,
                    "only the submitter may cancel a transfer",
                ));
            }
            if target.status.is_terminal() {
                return Err(Rejection::new(
                    RejectionKind::NotCancellable,
                    format!("transfer is already {}", target.status),
                ));
            }
            Ok(request.data.clone())
        }
        OrderData::Mobilization {
            unit_type_id,
            territory_id,
            faction_id,
            ..
        } => {
            let unit_type = store
                .fetch_unit_type(guild, unit_type_id)
                .map_err(store_rejection)?
                .ok_or_else(|| {
                    Rejection::new(
                        RejectionKind::UnknownEntity,
                        format!("unit type '{}' does not exist", unit_type_id),
                    )
                })?;
            let territory = store
                .fetch_territory(guild, territory_id)
                .map_err(store_rejection)?
                .ok_or_else(|| {
                    Rejection::new(
                        RejectionKind::UnknownEntity,
                        format!("territory '{}' does not exist", territory_id),
                    )
                })?;
            validate_sponsor(store, guild, submitter, faction_id.as_ref(), &territory)?;

            // Nation-restricted templates may only be fielded by matching
            // factions in their homeland. The wandering fifth nation builds
            // anywhere it controls.
            if let Some(required) = &unit_type.nation {
                let owner_faction = match faction_id {
                    Some(f) => Some(f.clone()),
                    None => store
                        .fetch_character(guild, submitter)
                        .map_err(store_rejection)?
                        .and_then(|c| c.represented_faction_id),
                };
                let owner_nation = match owner_faction {
                    Some(f) => store
                        .fetch_faction(guild, &f)
                        .map_err(store_rejection)?
                        .and_then(|f| f.nation),
                    None => None,
                };
                if owner_nation.as_ref() != Some(required) {
                    return Err(Rejection::new(
                        RejectionKind::NationMismatch,
                        format!("unit type '{}' requires nation '{}'", unit_type_id, required),
                    ));
                }
                let fifth_nation_exception = required.as_str() == "fifth-nation";
                if !fifth_nation_exception
                    && territory.original_nation.as_ref() != Some(required)
                {
                    return Err(Rejection::new(
                        RejectionKind::NationMismatch,
                        format!(
                            "unit type '{}' can only be mobilized in {} territory",
                            unit_type_id, required
                        ),
                    ));
                }
            }
            Ok(request.data.clone())
        }
        OrderData::Construction {
            building_type_id,
            territory_id,
            faction_id,
        } => {
            let building_type = store
                .fetch_building_type(guild, building_type_id)
                .map_err(store_rejection)?
                .ok_or_else(|| {
                    Rejection::new(
                        RejectionKind::UnknownEntity,
                        format!("building type '{}' does not exist", building_type_id),
                    )
                })?;
            let territory = store
                .fetch_territory(guild, territory_id)
                .map_err(store_rejection)?
                .ok_or_else(|| {
                    Rejection::new(
                        RejectionKind::UnknownEntity,
                        format!("territory '{}' does not exist", territory_id),
                    )
                })?;
            validate_sponsor(store, guild, submitter, faction_id.as_ref(), &territory)?;
            if building_type
                .keywords
                .contains(crate::building::keyword::FORTIFICATION)
                && territory.terrain != crate::geo::Terrain::City
            {
                return Err(Rejection::new(
                    RejectionKind::TerrainMismatch,
                    "fortifications may only stand in city territory",
                ));
            }
            let occupied = store
                .buildings_in_territory(guild, territory_id)
                .map_err(store_rejection)?
                .iter()
                .any(|b| b.is_active() && b.building_type_id == *building_type_id);
            if occupied {
                return Err(Rejection::new(
                    RejectionKind::Duplicate,
                    format!(
                        "territory '{}' already has an active {}",
                        territory_id, building_type_id
                    ),
                ));
            }
            Ok(request.data.clone())
        }
    }
}

/// The faction the submitter leads, required for leader-only diplomacy.
fn leader_faction_of(
    store: &dyn Store,
    guild: GuildId,
    submitter: &CharacterId,
) -> Validation<crate::ids::FactionId> {
    for membership in store.memberships_of(guild, submitter).map_err(store_rejection)? {
        if relations::is_leader(store, guild, &membership.faction_id, submitter)
            .map_err(store_rejection)?
        {
            return Ok(membership.faction_id);
        }
    }
    Err(Rejection::new(
        RejectionKind::Unauthorized,
        "this order requires faction leadership",
    ))
}

fn validate_party_exists(store: &dyn Store, guild: GuildId, party: &Party) -> Validation<()> {
    match party {
        Party::Character(c) => {
            if store.fetch_character(guild, c).map_err(store_rejection)?.is_none() {
                return Err(Rejection::new(
                    RejectionKind::UnknownEntity,
                    format!("character '{}' does not exist", c),
                ));
            }
        }
        Party::Faction(f) => {
            if store.fetch_faction(guild, f).map_err(store_rejection)?.is_none() {
                return Err(Rejection::new(
                    RejectionKind::UnknownEntity,
                    format!("faction '{}' does not exist", f),
                ));
            }
        }
    }
    Ok(())
}

/// Shared mobilization/construction sponsor check: spending faction
/// resources requires CONSTRUCTION permission and an accessible territory.
fn validate_sponsor(
    store: &dyn Store,
    guild: GuildId,
    submitter: &CharacterId,
    faction_id: Option<&crate::ids::FactionId>,
    territory: &crate::geo::Territory,
) -> Validation<()> {
    let Some(faction_id) = faction_id else {
        return Ok(());
    };
    if store
        .fetch_faction(guild, faction_id)
        .map_err(store_rejection)?
        .is_none()
    {
        return Err(Rejection::new(
            RejectionKind::UnknownEntity,
            format!("faction '{}' does not exist", faction_id),
        ));
    }
    if !relations::has_permission(store, guild, faction_id, submitter, Permission::Construction)
        .map_err(store_rejection)?
    {
        return Err(Rejection::new(
            RejectionKind::Unauthorized,
            "spending faction resources requires CONSTRUCTION permission",
        ));
    }

    // The territory must answer to the faction or one of its members.
    let accessible = match &territory.controller {
        Some(crate::geo::Controller::Faction(f)) => f == faction_id,
        Some(crate::geo::Controller::Character(c)) => store
            .memberships_of(guild, c)
            .map_err(store_rejection)?
            .iter()
            .any(|m| &m.faction_id == faction_id),
        None => false,
    };
    if !accessible {
        return Err(Rejection::new(
            RejectionKind::Unauthorized,
            format!(
                "territory '{}' is not controlled by {} or one of its members",
                territory.territory_id, faction_id
            ),
        ));
    }
    Ok(())
}

/// Collapse a store failure into a rejection so validation keeps its
/// simple error channel. Transient failures surface as rejections the
/// caller may retry.
pub(crate) fn store_rejection(error: crate::store::StoreError) -> Rejection {
    Rejection::new(RejectionKind::UnknownEntity, error.to_string())
}
