//! The six-resource economy vector shared by characters, factions,
//! territories, upkeep costs and transfer orders.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign};
use strum_macros::{Display, EnumIter, EnumString};

/// One of the six tradable resources.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
    EnumIter, EnumString,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Ore,
    Lumber,
    Coal,
    Rations,
    Cloth,
    Platinum,
}

impl Resource {
    /// All six resources in canonical order.
    pub const ALL: [Resource; 6] = [
        Resource::Ore,
        Resource::Lumber,
        Resource::Coal,
        Resource::Rations,
        Resource::Cloth,
        Resource::Platinum,
    ];
}

/// A quantity of each resource. Inventories are kept non-negative by the
/// accessors that spend from them; deltas and production values may use the
/// full signed range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResourcePool {
    #[serde(default)]
    pub ore: i64,
    #[serde(default)]
    pub lumber: i64,
    #[serde(default)]
    pub coal: i64,
    #[serde(default)]
    pub rations: i64,
    #[serde(default)]
    pub cloth: i64,
    #[serde(default)]
    pub platinum: i64,
}

impl ResourcePool {
    pub fn get(&self, resource: Resource) -> i64 {
        match resource {
            Resource::Ore => self.ore,
            Resource::Lumber => self.lumber,
            Resource::Coal => self.coal,
            Resource::Rations => self.rations,
            Resource::Cloth => self.cloth,
            Resource::Platinum => self.platinum,
        }
    }

    pub fn get_mut(&mut self, resource: Resource) -> &mut i64 {
        match resource {
            Resource::Ore => &mut self.ore,
            Resource::Lumber => &mut self.lumber,
            Resource::Coal => &mut self.coal,
            Resource::Rations => &mut self.rations,
            Resource::Cloth => &mut self.cloth,
            Resource::Platinum => &mut self.platinum,
        }
    }

    pub fn set(&mut self, resource: Resource, amount: i64) {
        *self.get_mut(resource) = amount;
    }

    /// Iterate over `(resource, amount)` pairs in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (Resource, i64)> + '_ {
        Resource::ALL.iter().map(move |&r| (r, self.get(r)))
    }

    /// True when every amount is zero.
    pub fn is_empty(&self) -> bool {
        self.iter().all(|(_, amount)| amount == 0)
    }

    /// True when every amount is zero or positive.
    pub fn is_non_negative(&self) -> bool {
        self.iter().all(|(_, amount)| amount >= 0)
    }

    /// True when this pool can fully cover `cost`.
    pub fn covers(&self, cost: &ResourcePool) -> bool {
        self.iter().all(|(r, have)| have >= cost.get(r))
    }

    /// Deduct as much of `cost` as is available, leaving no amount below
    /// zero. Returns the resources for which the full cost could not be
    /// paid.
    pub fn pay_up_to(&mut self, cost: &ResourcePool) -> Vec<Resource> {
        let mut short = Vec::new();
        for resource in Resource::ALL {
            let want = cost.get(resource);
            if want <= 0 {
                continue;
            }
            let have = self.get(resource);
            if have < want {
                short.push(resource);
            }
            self.set(resource, (have - want).max(0));
        }
        short
    }
}

impl Add for ResourcePool {
    type Output = ResourcePool;

    fn add(mut self, rhs: ResourcePool) -> ResourcePool {
        self += rhs;
        self
    }
}

impl AddAssign for ResourcePool {
    fn add_assign(&mut self, rhs: ResourcePool) {
        for resource in Resource::ALL {
            *self.get_mut(resource) += rhs.get(resource);
        }
    }
}

impl fmt::Display for ResourcePool {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut first = true;
        for (resource, amount) in self.iter() {
            if amount == 0 {
                continue;
            }
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{} {}", amount, resource)?;
            first = false;
        }
        if first {
            write!(f, "nothing")?;
        }
        Ok(())
    }
}
