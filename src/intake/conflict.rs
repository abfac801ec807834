//! Detection of existing orders that would contend for the same units.

use crate::ids::{GuildId, UnitId};
use crate::order::{Order, OrderStatus};
use crate::store::{Store, StoreResult};

/// All PENDING or ONGOING orders that address any of the given units. The
/// caller either reports them back for confirmation or cancels them when
/// the submission carries the override flag.
pub fn find_conflicting_orders(
    store: &dyn Store,
    guild: GuildId,
    unit_ids: &[UnitId],
) -> StoreResult<Vec<Order>> {
    store.orders_for_units(
        guild,
        unit_ids,
        &[OrderStatus::Pending, OrderStatus::Ongoing],
    )
}
