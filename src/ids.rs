//! Newtype identifiers for every entity the engine tracks.
//!
//! Entities carry a human-visible string identifier that is unique within a
//! tenant; those strings are the keys the engine passes around. Tenancy
//! itself is a numeric [`GuildId`] and every store accessor is scoped by it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An isolated game instance. All durable state is keyed by this identifier
/// and cross-tenant references are forbidden.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GuildId(pub u64);

impl fmt::Display for GuildId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                $name(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(String::from(s))
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(s)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id! {
    /// Identifies a territory on the map.
    TerritoryId
}
string_id! {
    /// Identifies a military unit.
    UnitId
}
string_id! {
    /// Identifies a faction.
    FactionId
}
string_id! {
    /// Identifies a player character.
    CharacterId
}
string_id! {
    /// Identifies a building standing in a territory.
    BuildingId
}
string_id! {
    /// Identifies a spirit nexus.
    NexusId
}
string_id! {
    /// Identifies a submitted order.
    OrderId
}
string_id! {
    /// Identifies a war.
    WarId
}

/// A nation tag. Territories remember the nation that originally held them,
/// and unit or building templates may be restricted to one nation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Nation(String);

impl Nation {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Nation {
    fn from(s: &str) -> Self {
        Nation(String::from(s))
    }
}

impl From<String> for Nation {
    fn from(s: String) -> Self {
        Nation(s)
    }
}

impl fmt::Display for Nation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod test {
    use super::{FactionId, TerritoryId};

    #[test]
    fn ids_order_lexicographically() {
        assert!(FactionId::from("alpha") < FactionId::from("beta"));
        assert!(TerritoryId::from("a1") < TerritoryId::from("a2"));
    }

    #[test]
    fn ids_round_trip_serde() {
        let id = TerritoryId::from("omashu");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"omashu\"");
        assert_eq!(serde_json::from_str::<TerritoryId>(&json).unwrap(), id);
    }
}
