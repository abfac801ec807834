//! The Beginning phase: faction membership, alliances, wars and commander
//! assignments.

use super::{dispatch_order, relations, ExecError, ExecResult, PhaseContext};
use crate::character::Character;
use crate::diplo::{
    normalize_objective, Alliance, AllianceStatus, JoinRequest, War, WarParticipant, WarSide,
};
use crate::event::{EntityKind, EventKind};
use crate::faction::{FactionMember, Permission};
use crate::ids::{CharacterId, FactionId, WarId};
use crate::order::{Order, OrderData, OrderStatus, OrderType};
use crate::store::StoreError;
use crate::unit::UnitStatus;

/// Turns that must pass before kicks are allowed: into the game, after a
/// faction's creation, and after the target's join.
const KICK_COOLDOWN_TURNS: u32 = 3;
/// Alliances and the game itself must be this old before a dissolution.
const DISSOLVE_COOLDOWN_TURNS: u32 = 4;

pub(crate) fn run(ctx: &mut PhaseContext<'_>) -> Result<(), StoreError> {
    for order in ctx.unresolved_orders()? {
        match order.order_type {
            OrderType::JoinFaction => dispatch_order(ctx, &order, execute_join)?,
            OrderType::LeaveFaction => dispatch_order(ctx, &order, execute_leave)?,
            OrderType::KickFromFaction => dispatch_order(ctx, &order, execute_kick)?,
            OrderType::MakeAlliance => dispatch_order(ctx, &order, execute_make_alliance)?,
            OrderType::DissolveAlliance => {
                dispatch_order(ctx, &order, execute_dissolve_alliance)?
            }
            OrderType::DeclareWar => dispatch_order(ctx, &order, execute_declare_war)?,
            OrderType::AssignCommander => {
                dispatch_order(ctx, &order, execute_assign_commander)?
            }
            other => {
                ctx.fail_order(&order, format!("{} is not a Beginning-phase order", other))?
            }
        }
    }
    Ok(())
}

/// Execute one half of the join handshake. When the complementary half is
/// already recorded the membership is created atomically; otherwise this
/// half is recorded and the order waits.
fn execute_join(ctx: &mut PhaseContext<'_>, order: &mut Order) -> ExecResult<()> {
    let OrderData::JoinFaction {
        faction_id,
        target_character_id,
        submitted_by_leader,
    } = order.data.clone()
    else {
        return Err(ExecError::failed("malformed join order"));
    };

    let faction = ctx
        .store
        .fetch_faction(ctx.guild, &faction_id)?
        .ok_or_else(|| ExecError::failed(format!("faction '{}' no longer exists", faction_id)))?;
    let mut character = ctx
        .store
        .fetch_character(ctx.guild, &target_character_id)?
        .ok_or_else(|| {
            ExecError::failed(format!("character '{}' no longer exists", target_character_id))
        })?;
    if ctx
        .store
        .memberships_of(ctx.guild, &target_character_id)?
        .iter()
        .any(|m| m.faction_id == faction_id)
    {
        return Err(ExecError::failed(format!(
            "{} is already a member of {}",
            target_character_id, faction.name
        )));
    }

    let requests = ctx
        .store
        .join_requests_for(ctx.guild, &target_character_id, &faction_id)?;
    let complement = requests
        .iter()
        .find(|r| r.submitted_by_leader != submitted_by_leader)
        .cloned();

    match complement {
        Some(_) => {
            ctx.store.insert_member(
                ctx.guild,
                FactionMember {
                    faction_id: faction_id.clone(),
                    character_id: target_character_id.clone(),
                    joined_turn: ctx.resolving,
                },
            )?;

            if character.represented_faction_id.is_none() {
                character.represented_faction_id = Some(faction_id.clone());
                character.representation_changed_turn = Some(ctx.resolving);
                ctx.store.upsert_character(ctx.guild, &character)?;
                retag_character_units(ctx, &target_character_id, Some(faction_id.clone()))?;
            }

            // Close out every recorded half for this pair.
            for request in &requests {
                if let Some(mut half) = ctx.store.fetch_order(ctx.guild, &request.order_id)? {
                    if half.status.is_unresolved() && half.order_id != order.order_id {
                        half.status = OrderStatus::Success;
                        half.updated_turn = Some(ctx.resolving);
                        ctx.store.update_order(ctx.guild, &half)?;
                    }
                }
            }
            ctx.store
                .delete_join_requests(ctx.guild, &target_character_id, &faction_id)?;

            let mut audience = relations::member_audience(ctx.store, ctx.guild, &faction_id)?;
            audience.push(target_character_id.clone());
            let event = ctx
                .event(
                    EventKind::FactionMemberJoined,
                    EntityKind::Faction,
                    faction_id.as_str(),
                )
                .with("character_id", &target_character_id)
                .with("faction_name", &faction.name)
                .with("joined_turn", ctx.resolving)
                .for_audience(audience);
            ctx.push(event);
            order.status = OrderStatus::Success;
        }
        None => {
            // An ongoing half re-executes every turn while it waits; the
            // request row is only recorded once.
            let already_recorded = requests
                .iter()
                .any(|r| r.submitted_by_leader == submitted_by_leader);
            if !already_recorded {
                ctx.store.insert_join_request(
                    ctx.guild,
                    JoinRequest {
                        character_id: target_character_id.clone(),
                        faction_id: faction_id.clone(),
                        submitted_by_leader,
                        order_id: order.order_id.clone(),
                    },
                )?;
                let mut audience =
                    relations::command_audience(ctx.store, ctx.guild, &faction_id)?;
                audience.push(target_character_id.clone());
                let event = ctx
                    .event(
                        EventKind::FactionJoinPending,
                        EntityKind::Faction,
                        faction_id.as_str(),
                    )
                    .with("character_id", &target_character_id)
                    .with("waiting_for_leadership", !submitted_by_leader)
                    .for_audience(audience);
                ctx.push(event);
            }
            order.status = OrderStatus::Ongoing;
        }
    }
    Ok(())
}

fn execute_leave(ctx: &mut PhaseContext<'_>, order: &mut Order) -> ExecResult<()> {
    let OrderData::LeaveFaction { faction_id } = order.data.clone() else {
        return Err(ExecError::failed("malformed leave order"));
    };
    let character_id = order.character_id.clone();

    if relations::is_leader(ctx.store, ctx.guild, &faction_id, &character_id)? {
        return Err(ExecError::failed("the faction leader cannot leave"));
    }
    let is_member = ctx
        .store
        .memberships_of(ctx.guild, &character_id)?
        .iter()
        .any(|m| m.faction_id == faction_id);
    if !is_member {
        return Err(ExecError::failed(format!(
            "{} is not a member of {}",
            character_id, faction_id
        )));
    }

    ctx.store.remove_member(ctx.guild, &faction_id, &character_id)?;
    migrate_representation(ctx, &character_id, &faction_id, false)?;

    let mut audience = relations::member_audience(ctx.store, ctx.guild, &faction_id)?;
    audience.push(character_id.clone());
    let event = ctx
        .event(EventKind::FactionMemberLeft, EntityKind::Faction, faction_id.as_str())
        .with("character_id", &character_id)
        .for_audience(audience);
    ctx.push(event);
    order.status = OrderStatus::Success;
    Ok(())
}

fn execute_kick(ctx: &mut PhaseContext<'_>, order: &mut Order) -> ExecResult<()> {
    let OrderData::KickFromFaction {
        faction_id,
        target_character_id,
    } = order.data.clone()
    else {
        return Err(ExecError::failed("malformed kick order"));
    };

    if !relations::has_permission(
        ctx.store,
        ctx.guild,
        &faction_id,
        &order.character_id,
        Permission::Membership,
    )? {
        return Err(ExecError::failed("kicking requires MEMBERSHIP permission"));
    }
    if target_character_id == order.character_id {
        return Err(ExecError::failed("you cannot kick yourself"));
    }
    if relations::is_leader(ctx.store, ctx.guild, &faction_id, &target_character_id)? {
        return Err(ExecError::failed("the faction leader cannot be kicked"));
    }

    let faction = ctx
        .store
        .fetch_faction(ctx.guild, &faction_id)?
        .ok_or_else(|| ExecError::failed(format!("faction '{}' no longer exists", faction_id)))?;
    let membership = ctx
        .store
        .members_of(ctx.guild, &faction_id)?
        .into_iter()
        .find(|m| m.character_id == target_character_id)
        .ok_or_else(|| {
            ExecError::failed(format!(
                "{} is not a member of {}",
                target_character_id, faction.name
            ))
        })?;

    if ctx.resolving < KICK_COOLDOWN_TURNS {
        return Err(ExecError::failed("kicks are not allowed this early in the game"));
    }
    if ctx.resolving.saturating_sub(faction.created_turn) < KICK_COOLDOWN_TURNS {
        return Err(ExecError::failed(format!(
            "{} was founded too recently for kicks",
            faction.name
        )));
    }
    if ctx.resolving.saturating_sub(membership.joined_turn) < KICK_COOLDOWN_TURNS {
        return Err(ExecError::failed(format!(
            "{} joined too recently to be kicked",
            target_character_id
        )));
    }

    ctx.store
        .remove_member(ctx.guild, &faction_id, &target_character_id)?;
    migrate_representation(ctx, &target_character_id, &faction_id, true)?;

    let mut audience = relations::member_audience(ctx.store, ctx.guild, &faction_id)?;
    audience.push(target_character_id.clone());
    let event = ctx
        .event(EventKind::FactionMemberKicked, EntityKind::Faction, faction_id.as_str())
        .with("character_id", &target_character_id)
        .with("kicked_by", &order.character_id)
        .for_audience(audience);
    ctx.push(event);
    order.status = OrderStatus::Success;
    Ok(())
}

/// After losing a membership, repoint the character's representation if it
/// pointed at the lost faction (or was unset). The membership with the
/// highest join turn is promoted; kicks also reset the representation
/// cooldown, while auto-promotion alone does not.
fn migrate_representation(
    ctx: &mut PhaseContext<'_>,
    character_id: &CharacterId,
    lost_faction: &FactionId,
    was_kicked: bool,
) -> ExecResult<()> {
    let mut character: Character = ctx
        .store
        .fetch_character(ctx.guild, character_id)?
        .ok_or_else(|| ExecError::failed(format!("character '{}' no longer exists", character_id)))?;

    let needs_migration = match &character.represented_faction_id {
        Some(current) => current == lost_faction,
        None => true,
    };

    if needs_migration {
        let mut memberships = ctx.store.memberships_of(ctx.guild, character_id)?;
        memberships.sort_by(|a, b| {
            b.joined_turn
                .cmp(&a.joined_turn)
                .then_with(|| a.faction_id.cmp(&b.faction_id))
        });
        let promoted = memberships.first().map(|m| m.faction_id.clone());
        character.represented_faction_id = promoted.clone();
        retag_character_units(ctx, character_id, promoted)?;
    }
    if was_kicked {
        character.representation_changed_turn = Some(ctx.resolving);
    }
    ctx.store.upsert_character(ctx.guild, &character)?;
    Ok(())
}

/// Point every active unit owned by the character at their (new)
/// represented faction.
fn retag_character_units(
    ctx: &mut PhaseContext<'_>,
    character_id: &CharacterId,
    faction_id: Option<FactionId>,
) -> ExecResult<()> {
    for mut unit in ctx.store.all_units(ctx.guild)? {
        if unit.status != UnitStatus::Active {
            continue;
        }
        if unit.owning_character() == Some(character_id) {
            unit.faction_id = faction_id.clone();
            ctx.store.upsert_unit(ctx.guild, &unit)?;
        }
    }
    Ok(())
}

fn execute_make_alliance(ctx: &mut PhaseContext<'_>, order: &mut Order) -> ExecResult<()> {
    let OrderData::MakeAlliance { target_faction_id } = order.data.clone() else {
        return Err(ExecError::failed("malformed alliance order"));
    };
    let own_faction = leader_faction_of(ctx, &order.character_id)?;
    if ctx
        .store
        .fetch_faction(ctx.guild, &target_faction_id)?
        .is_none()
    {
        return Err(ExecError::failed(format!(
            "faction '{}' no longer exists",
            target_faction_id
        )));
    }

    let existing = ctx
        .store
        .find_alliance(ctx.guild, &own_faction, &target_faction_id)?;
    match existing {
        None => {
            let alliance = Alliance::propose(own_faction.clone(), target_faction_id.clone());
            ctx.store.upsert_alliance(ctx.guild, &alliance)?;
            let mut audience =
                relations::command_audience(ctx.store, ctx.guild, &own_faction)?;
            audience.extend(relations::command_audience(
                ctx.store,
                ctx.guild,
                &target_faction_id,
            )?);
            let event = ctx
                .event(
                    EventKind::AlliancePending,
                    EntityKind::Alliance,
                    format!("{}|{}", alliance.faction_a, alliance.faction_b),
                )
                .with("proposed_by", &own_faction)
                .with("waiting_for", &target_faction_id)
                .for_audience(audience);
            ctx.push(event);
            order.status = OrderStatus::Success;
        }
        Some(alliance) if alliance.is_active() => {
            return Err(ExecError::failed("the factions are already allied"));
        }
        Some(mut alliance) => {
            if alliance.awaiting() == Some(&own_faction) {
                alliance.status = AllianceStatus::Active;
                alliance.activated_turn = Some(ctx.resolving);
                ctx.store.upsert_alliance(ctx.guild, &alliance)?;

                let mut audience =
                    relations::member_audience(ctx.store, ctx.guild, &own_faction)?;
                audience.extend(relations::member_audience(
                    ctx.store,
                    ctx.guild,
                    &target_faction_id,
                )?);
                audience.extend(relations::command_audience(
                    ctx.store,
                    ctx.guild,
                    &own_faction,
                )?);
                audience.extend(relations::command_audience(
                    ctx.store,
                    ctx.guild,
                    &target_faction_id,
                )?);
                let event = ctx
                    .event(
                        EventKind::AllianceFormed,
                        EntityKind::Alliance,
                        format!("{}|{}", alliance.faction_a, alliance.faction_b),
                    )
                    .with("activated_turn", ctx.resolving)
                    .for_audience(audience);
                ctx.push(event);
                order.status = OrderStatus::Success;
            } else {
                return Err(ExecError::failed(
                    "an identical alliance proposal is already pending",
                ));
            }
        }
    }
    Ok(())
}

fn execute_dissolve_alliance(ctx: &mut PhaseContext<'_>, order: &mut Order) -> ExecResult<()> {
    let OrderData::DissolveAlliance { target_faction_id } = order.data.clone() else {
        return Err(ExecError::failed("malformed dissolution order"));
    };
    let own_faction = leader_faction_of(ctx, &order.character_id)?;
    let alliance = ctx
        .store
        .find_alliance(ctx.guild, &own_faction, &target_faction_id)?
        .filter(|a| a.is_active())
        .ok_or_else(|| {
            ExecError::failed(format!("no active alliance with '{}'", target_faction_id))
        })?;

    if ctx.resolving < DISSOLVE_COOLDOWN_TURNS {
        return Err(ExecError::failed(
            "alliances cannot be dissolved this early in the game",
        ));
    }
    let age = ctx
        .resolving
        .saturating_sub(alliance.activated_turn.unwrap_or(0));
    if age < DISSOLVE_COOLDOWN_TURNS {
        return Err(ExecError::failed(format!(
            "the alliance is only {} turns old; {} are required",
            age, DISSOLVE_COOLDOWN_TURNS
        )));
    }

    ctx.store
        .remove_alliance(ctx.guild, &own_faction, &target_faction_id)?;
    let mut audience = relations::member_audience(ctx.store, ctx.guild, &own_faction)?;
    audience.extend(relations::member_audience(
        ctx.store,
        ctx.guild,
        &target_faction_id,
    )?);
    let event = ctx
        .event(
            EventKind::AllianceDissolved,
            EntityKind::Alliance,
            format!("{}|{}", alliance.faction_a, alliance.faction_b),
        )
        .with("dissolved_by", &own_faction)
        .for_audience(audience);
    ctx.push(event);
    order.status = OrderStatus::Success;
    Ok(())
}

fn execute_declare_war(ctx: &mut PhaseContext<'_>, order: &mut Order) -> ExecResult<()> {
    let OrderData::DeclareWar {
        faction_id,
        target_faction_ids,
        objective,
    } = order.data.clone()
    else {
        return Err(ExecError::failed("malformed war declaration"));
    };
    if !relations::is_leader(ctx.store, ctx.guild, &faction_id, &order.character_id)? {
        return Err(ExecError::failed("only the faction leader may declare war"));
    }

    let normalized = normalize_objective(&objective);
    let existing = ctx
        .store
        .all_wars(ctx.guild)?
        .into_iter()
        .find(|w| w.normalized_objective() == normalized);

    let (war, declarer_side) = match existing {
        Some(war) => {
            let participants = ctx.store.war_participants(ctx.guild, &war.war_id)?;
            if participants.iter().any(|p| p.faction_id == faction_id) {
                return Err(ExecError::failed(format!(
                    "{} is already a party to the war '{}'",
                    faction_id, war.objective
                )));
            }
            // Join opposite whichever target is already present; SIDE_A
            // when none are.
            let declarer_side = target_faction_ids
                .iter()
                .find_map(|t| {
                    participants
                        .iter()
                        .find(|p| &p.faction_id == t)
                        .map(|p| p.side.opposite())
                })
                .unwrap_or(WarSide::SideA);
            ctx.store.insert_war_participant(
                ctx.guild,
                WarParticipant {
                    war_id: war.war_id.clone(),
                    faction_id: faction_id.clone(),
                    side: declarer_side,
                    joined_turn: ctx.resolving,
                    is_original_declarer: false,
                },
            )?;
            for target in &target_faction_ids {
                if participants.iter().any(|p| &p.faction_id == target) {
                    continue;
                }
                ctx.store.insert_war_participant(
                    ctx.guild,
                    WarParticipant {
                        war_id: war.war_id.clone(),
                        faction_id: target.clone(),
                        side: declarer_side.opposite(),
                        joined_turn: ctx.resolving,
                        is_original_declarer: false,
                    },
                )?;
            }
            let event = ctx
                .event(EventKind::WarJoined, EntityKind::War, war.war_id.as_str())
                .with("faction_id", &faction_id)
                .with("objective", &war.objective)
                .with("side", declarer_side)
                .for_audience(war_audience(ctx, &faction_id, &target_faction_ids)?);
            ctx.push(event);
            (war, declarer_side)
        }
        None => {
            let war_id = WarId::new(format!("WAR-{:03}", ctx.store.all_wars(ctx.guild)?.len() + 1));
            let war = War {
                war_id: war_id.clone(),
                objective: objective.clone(),
                declared_turn: ctx.resolving,
            };
            ctx.store.insert_war(ctx.guild, war.clone())?;
            ctx.store.insert_war_participant(
                ctx.guild,
                WarParticipant {
                    war_id: war_id.clone(),
                    faction_id: faction_id.clone(),
                    side: WarSide::SideA,
                    joined_turn: ctx.resolving,
                    is_original_declarer: true,
                },
            )?;
            for target in &target_faction_ids {
                ctx.store.insert_war_participant(
                    ctx.guild,
                    WarParticipant {
                        war_id: war_id.clone(),
                        faction_id: target.clone(),
                        side: WarSide::SideB,
                        joined_turn: ctx.resolving,
                        is_original_declarer: false,
                    },
                )?;
            }
            let event = ctx
                .event(EventKind::WarDeclared, EntityKind::War, war_id.as_str())
                .with("declared_by", &faction_id)
                .with("targets", &target_faction_ids)
                .with("objective", &objective)
                .for_audience(war_audience(ctx, &faction_id, &target_faction_ids)?);
            ctx.push(event);
            (war, WarSide::SideA)
        }
    };

    drag_in_mutual_allies(ctx, &war, &faction_id, declarer_side)?;

    let mut faction = ctx
        .store
        .fetch_faction(ctx.guild, &faction_id)?
        .ok_or_else(|| ExecError::failed(format!("faction '{}' no longer exists", faction_id)))?;
    if !faction.has_declared_war {
        faction.has_declared_war = true;
        ctx.store.upsert_faction(ctx.guild, &faction)?;
        let event = ctx
            .event(
                EventKind::WarProductionBonus,
                EntityKind::Faction,
                faction_id.as_str(),
            )
            .for_audience(relations::member_audience(ctx.store, ctx.guild, &faction_id)?);
        ctx.push(event);
    }

    order.status = OrderStatus::Success;
    Ok(())
}

/// Third parties actively allied with the declarer and with at least one
/// faction on the opposing side are pulled in, onto the opposing side.
fn drag_in_mutual_allies(
    ctx: &mut PhaseContext<'_>,
    war: &War,
    declarer: &FactionId,
    declarer_side: WarSide,
) -> ExecResult<()> {
    let declarer_allies: Vec<FactionId> = ctx
        .store
        .alliances_of(ctx.guild, declarer)?
        .into_iter()
        .filter(|a| a.is_active())
        .filter_map(|a| a.partner_of(declarer).cloned())
        .collect();

    let participants = ctx.store.war_participants(ctx.guild, &war.war_id)?;
    let opposing: Vec<FactionId> = participants
        .iter()
        .filter(|p| p.side != declarer_side)
        .map(|p| p.faction_id.clone())
        .collect();

    for ally in declarer_allies {
        let mut allied_with_opponent = false;
        for opponent in &opposing {
            if &ally != opponent
                && relations::are_allied(ctx.store, ctx.guild, &ally, opponent)?
            {
                allied_with_opponent = true;
                break;
            }
        }
        if !allied_with_opponent {
            continue;
        }
        if participants.iter().any(|p| p.faction_id == ally) {
            continue;
        }
        ctx.store.insert_war_participant(
            ctx.guild,
            WarParticipant {
                war_id: war.war_id.clone(),
                faction_id: ally.clone(),
                side: declarer_side.opposite(),
                joined_turn: ctx.resolving,
                is_original_declarer: false,
            },
        )?;
        let event = ctx
            .event(EventKind::WarJoined, EntityKind::War, war.war_id.as_str())
            .with("faction_id", &ally)
            .with("objective", &war.objective)
            .with("side", declarer_side.opposite())
            .with("dragged_in", true)
            .for_audience(relations::member_audience(ctx.store, ctx.guild, &ally)?);
        ctx.push(event);
    }
    Ok(())
}

fn war_audience(
    ctx: &PhaseContext<'_>,
    declarer: &FactionId,
    targets: &[FactionId],
) -> ExecResult<Vec<CharacterId>> {
    let mut audience = relations::member_audience(ctx.store, ctx.guild, declarer)?;
    for target in targets {
        audience.extend(relations::member_audience(ctx.store, ctx.guild, target)?);
    }
    Ok(audience)
}

fn execute_assign_commander(ctx: &mut PhaseContext<'_>, order: &mut Order) -> ExecResult<()> {
    let OrderData::AssignCommander {
        unit_id,
        new_commander_id,
    } = order.data.clone()
    else {
        return Err(ExecError::failed("malformed commander assignment"));
    };
    let mut unit = ctx
        .store
        .fetch_unit(ctx.guild, &unit_id)?
        .ok_or_else(|| ExecError::failed(format!("unit '{}' no longer exists", unit_id)))?;
    if !unit.is_active() {
        return Err(ExecError::failed(format!("unit '{}' is disbanded", unit_id)));
    }

    // The owner and the new commander must share a faction, or both be
    // faction-less.
    if let Some(commander_id) = &new_commander_id {
        let commander = ctx
            .store
            .fetch_character(ctx.guild, commander_id)?
            .ok_or_else(|| {
                ExecError::failed(format!("character '{}' no longer exists", commander_id))
            })?;
        let owner_faction = match &unit.owner {
            crate::Party::Faction(f) => Some(f.clone()),
            crate::Party::Character(c) => ctx
                .store
                .fetch_character(ctx.guild, c)?
                .and_then(|ch| ch.represented_faction_id),
        };
        if owner_faction != commander.represented_faction_id {
            return Err(ExecError::failed(format!(
                "{} is not in the unit owner's faction",
                commander_id
            )));
        }
    }

    let previous = unit.commander.clone();
    unit.commander = new_commander_id.clone();
    unit.commander_assigned_turn = Some(ctx.resolving);
    ctx.store.upsert_unit(ctx.guild, &unit)?;

    let mut audience: Vec<CharacterId> = Vec::new();
    if let crate::Party::Character(owner) = &unit.owner {
        audience.push(owner.clone());
    }
    audience.extend(new_commander_id.clone());
    audience.extend(previous.clone());
    let event = ctx
        .event(EventKind::CommanderAssigned, EntityKind::Unit, unit_id.as_str())
        .with("new_commander", &new_commander_id)
        .with("previous_commander", &previous)
        .for_audience(audience);
    ctx.push(event);
    order.status = OrderStatus::Success;
    Ok(())
}

/// The faction the order's submitter leads.
fn leader_faction_of(
    ctx: &PhaseContext<'_>,
    character_id: &CharacterId,
) -> ExecResult<FactionId> {
    for membership in ctx.store.memberships_of(ctx.guild, character_id)? {
        if relations::is_leader(ctx.store, ctx.guild, &membership.faction_id, character_id)? {
            return Ok(membership.faction_id);
        }
    }
    Err(ExecError::failed("this order requires faction leadership"))
}
