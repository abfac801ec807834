//! Contains the logic needed to resolve a turn.
//!
//! The orchestrator drives a single tenant's turn advance: for each phase
//! in the fixed sequence it loads the phase's orders, dispatches them to
//! the owning resolver, appends the emitted events to the turn log, and
//! commits the phase as one unit. Errors in a single order never abort a
//! phase; only transient store failures do, and those are retried once.

mod combat;
mod construction;
mod diplomacy;
mod economy;
mod movement;
pub mod relations;
mod victory;

pub use crate::order::Phase;

use crate::config::WargameConfig;
use crate::error::EngineError;
use crate::event::{EntityKind, Event, EventKind, EventSink};
use crate::ids::GuildId;
use crate::order::{Order, OrderStatus};
use crate::store::{Store, StoreError};

/// The result of advancing a tenant by one turn.
#[derive(Debug)]
pub struct TurnOutcome {
    pub new_turn: u32,
    pub emitted_events: Vec<Event>,
}

/// Execution-time failure of a single order. Store failures ride along so
/// the dispatcher can distinguish the retryable ones.
#[derive(Debug)]
pub(crate) enum ExecError {
    /// The order was valid at submission but its invariants broke by
    /// execution time. The order is marked FAILED.
    Failed(String),
    Store(StoreError),
}

impl ExecError {
    pub fn failed(message: impl Into<String>) -> Self {
        ExecError::Failed(message.into())
    }
}

impl From<StoreError> for ExecError {
    fn from(error: StoreError) -> Self {
        ExecError::Store(error)
    }
}

pub(crate) type ExecResult<T> = Result<T, ExecError>;

/// Everything a resolver needs while running one phase of one turn.
pub(crate) struct PhaseContext<'a> {
    pub store: &'a mut dyn Store,
    pub guild: GuildId,
    /// The turn being resolved.
    pub turn: u32,
    /// The turn players wake up to, `turn + 1`.
    pub resolving: u32,
    pub phase: Phase,
    pub events: Vec<Event>,
}

impl<'a> PhaseContext<'a> {
    /// Turn number stamped on this phase's events: the resolving turn for
    /// phases the player sees at the start of their next turn, the
    /// resolved turn for mid-turn effects.
    pub fn event_turn(&self) -> u32 {
        if self.phase.stamps_next_turn() {
            self.resolving
        } else {
            self.turn
        }
    }

    pub fn event(&self, kind: EventKind, entity_kind: EntityKind, entity_id: impl Into<String>) -> Event {
        Event::new(self.event_turn(), self.phase, kind, entity_kind, entity_id)
    }

    pub fn push(&mut self, event: Event) {
        self.events.push(event);
    }

    /// The unresolved orders routed to this phase, in execution order.
    pub fn unresolved_orders(&self) -> Result<Vec<Order>, StoreError> {
        self.store.orders_for_phase(
            self.guild,
            self.resolving,
            self.phase,
            &[OrderStatus::Pending, OrderStatus::Ongoing],
        )
    }

    /// Mark an order FAILED and emit `ORDER_FAILED` to the submitter.
    pub fn fail_order(&mut self, order: &Order, message: String) -> Result<(), StoreError> {
        log::warn!(
            "guild {}: order {} failed during {}: {}",
            self.guild,
            order.order_id,
            self.phase,
            message
        );
        let mut failed = order.clone();
        failed.status = OrderStatus::Failed;
        failed.result.error = Some(message.clone());
        failed.updated_turn = Some(self.resolving);
        self.store.update_order(self.guild, &failed)?;

        let event = self
            .event(EventKind::OrderFailed, EntityKind::Order, order.order_id.as_str())
            .with("order_type", order.order_type)
            .with("error", &message)
            .for_audience([order.character_id.clone()]);
        self.push(event);
        Ok(())
    }
}

/// Run a handler for one order, isolating its failures from the rest of
/// the phase. The handler mutates the passed order (status, result data);
/// the dispatcher persists it on success.
///
/// The order is re-read first: an earlier order in the same phase may have
/// already resolved it (a cancellation, or the other half of a handshake),
/// in which case there is nothing left to do.
pub(crate) fn dispatch_order<F>(
    ctx: &mut PhaseContext<'_>,
    order: &Order,
    handler: F,
) -> Result<(), StoreError>
where
    F: FnOnce(&mut PhaseContext<'_>, &mut Order) -> ExecResult<()>,
{
    let order = match ctx.store.fetch_order(ctx.guild, &order.order_id)? {
        Some(current) if current.status.is_unresolved() => current,
        _ => return Ok(()),
    };
    let order = &order;
    let mut working = order.clone();
    match handler(ctx, &mut working) {
        Ok(()) => {
            working.updated_turn = Some(ctx.resolving);
            ctx.store.update_order(ctx.guild, &working)
        }
        Err(ExecError::Failed(message)) => ctx.fail_order(order, message),
        Err(ExecError::Store(error)) => match error {
            StoreError::Transient(_) | StoreError::Fatal(_) => Err(error),
            recoverable => ctx.fail_order(order, recoverable.to_string()),
        },
    }
}

/// Advance a tenant from `from_turn` to the next turn, emitting events to
/// the sink as each phase commits.
///
/// Idempotent per turn number: a second call for the same turn fails with
/// [`EngineError::TurnMismatch`] because the tenant has already moved on.
/// When turn resolution is disabled for the tenant this is a no-op that
/// returns an empty outcome.
pub fn advance_turn(
    store: &mut dyn Store,
    sink: &mut dyn EventSink,
    guild: GuildId,
    from_turn: u32,
) -> Result<TurnOutcome, EngineError> {
    let config = store.fetch_config(guild)?;
    if config.current_turn != from_turn {
        return Err(EngineError::TurnMismatch {
            expected: from_turn,
            actual: config.current_turn,
        });
    }
    if !config.turn_resolution_enabled {
        log::info!("guild {}: turn resolution disabled, advance is a no-op", guild);
        return Ok(TurnOutcome {
            new_turn: from_turn,
            emitted_events: Vec::new(),
        });
    }

    let turn = from_turn;
    let resolving = turn + 1;
    log::info!("guild {}: resolving turn {}", guild, turn);

    let mut emitted = Vec::new();
    for phase in Phase::ALL {
        let events = run_phase_with_retry(store, guild, turn, resolving, phase)?;
        for event in &events {
            sink.accept(event);
        }
        emitted.extend(events);
    }

    let mut config = store.fetch_config(guild)?;
    config.current_turn = resolving;
    store.upsert_config(guild, &config)?;
    log::info!("guild {}: now at turn {}", guild, resolving);

    Ok(TurnOutcome {
        new_turn: resolving,
        emitted_events: emitted,
    })
}

/// Run one phase inside its transaction, retrying once on a transient
/// store failure.
fn run_phase_with_retry(
    store: &mut dyn Store,
    guild: GuildId,
    turn: u32,
    resolving: u32,
    phase: Phase,
) -> Result<Vec<Event>, EngineError> {
    let mut retried = false;
    loop {
        store.begin_phase(guild)?;
        match run_phase(store, guild, turn, resolving, phase) {
            Ok(events) => match store.commit_phase(guild) {
                Ok(()) => return Ok(events),
                Err(StoreError::Transient(reason)) if !retried => {
                    log::warn!(
                        "guild {}: transient failure committing {}, retrying: {}",
                        guild,
                        phase,
                        reason
                    );
                    retried = true;
                    store.rollback_phase(guild)?;
                }
                Err(error) => {
                    store.rollback_phase(guild)?;
                    return Err(error.into());
                }
            },
            Err(StoreError::Transient(reason)) if !retried => {
                log::warn!(
                    "guild {}: transient failure in {}, retrying: {}",
                    guild,
                    phase,
                    reason
                );
                retried = true;
                store.rollback_phase(guild)?;
            }
            Err(error) => {
                store.rollback_phase(guild)?;
                return Err(error.into());
            }
        }
    }
}

fn run_phase(
    store: &mut dyn Store,
    guild: GuildId,
    turn: u32,
    resolving: u32,
    phase: Phase,
) -> Result<Vec<Event>, StoreError> {
    let mut ctx = PhaseContext {
        store,
        guild,
        turn,
        resolving,
        phase,
        events: Vec::new(),
    };

    match phase {
        Phase::Beginning => diplomacy::run(&mut ctx)?,
        Phase::ResourceTransfer => economy::transfer::run(&mut ctx)?,
        Phase::ResourceCollection => economy::collection::run(&mut ctx)?,
        Phase::Movement => movement::run_land_movement(&mut ctx)?,
        Phase::NavalMovement => movement::run_naval_movement(&mut ctx)?,
        Phase::Encirclement => movement::run_encirclement(&mut ctx)?,
        Phase::Combat => combat::run_land_combat(&mut ctx)?,
        Phase::NavalCombat => combat::run_naval_combat(&mut ctx)?,
        Phase::Organization => economy::upkeep::run(&mut ctx)?,
        Phase::Construction => construction::run(&mut ctx)?,
        Phase::Victory => victory::run(&mut ctx)?,
    }

    let events = std::mem::take(&mut ctx.events);
    for event in &events {
        ctx.store.insert_event(guild, event)?;
    }
    Ok(events)
}

/// Load the phase-wide world map snapshot.
pub(crate) fn load_map(ctx: &PhaseContext<'_>) -> Result<crate::geo::WorldMap, StoreError> {
    Ok(crate::geo::WorldMap::new(
        ctx.store.all_territories(ctx.guild)?,
        ctx.store.all_adjacencies(ctx.guild)?,
    ))
}

/// Convenience: the active configuration for this tenant.
pub(crate) fn load_config(ctx: &PhaseContext<'_>) -> Result<WargameConfig, StoreError> {
    ctx.store.fetch_config(ctx.guild)
}
