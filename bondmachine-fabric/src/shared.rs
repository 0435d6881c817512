//! Fabric-level shared objects.

use crate::error::FabricError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A shared resource connected to zero or more processors under an
/// arbitration discipline declared by its kind.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SharedObject {
    /// A single-word broadcast channel. Every connected processor reads
    /// the same value; when several write in one tick, the write of the
    /// highest-ordered domain wins (writes are applied in domain-id
    /// order).
    Channel,
}

impl SharedObject {
    /// The kind string matched against architecture shared constraints.
    pub fn kind(&self) -> &'static str {
        match self {
            SharedObject::Channel => "channel",
        }
    }

    /// Whether a processor may both read and write the object, making
    /// same-domain feedback legal.
    pub fn allows_self_loop(&self) -> bool {
        match self {
            SharedObject::Channel => true,
        }
    }

    /// Parses a kind string into an object of that kind.
    pub fn parse_kind(kind: &str) -> Result<Self, FabricError> {
        SharedObject::from_str(kind).map_err(|_| FabricError::UnknownSharedKind(kind.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_strings_round_trip() {
        let channel = SharedObject::parse_kind("channel").unwrap();
        assert_eq!(channel.kind(), "channel");
        assert!(SharedObject::parse_kind("semaphore").is_err());
    }
}
