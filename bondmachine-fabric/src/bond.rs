//! Wire endpoints and bonds.

use crate::error::FabricError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Port direction, from the port owner's point of view.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Data flows into the owner.
    Input,
    /// Data flows out of the owner.
    Output,
}

/// One attachment point of a wire: a domain port or a fabric-external
/// port. Textual form `d<N>.<direction>.<idx>` or `ext.<direction>.<idx>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Endpoint {
    /// A port of the domain with the given id.
    Processor {
        /// Domain id.
        domain: usize,
        /// Port direction.
        direction: Direction,
        /// Port index.
        index: usize,
    },
    /// A fabric-external port.
    External {
        /// Port direction.
        direction: Direction,
        /// Port index.
        index: usize,
    },
}

impl Endpoint {
    /// Whether this endpoint produces a value onto a wire. Processor
    /// outputs and fabric-external inputs are producers.
    pub fn is_producer(&self) -> bool {
        match self {
            Endpoint::Processor { direction, .. } => *direction == Direction::Output,
            Endpoint::External { direction, .. } => *direction == Direction::Input,
        }
    }

    /// The domain the endpoint is attached to, if any.
    pub fn domain(&self) -> Option<usize> {
        match self {
            Endpoint::Processor { domain, .. } => Some(*domain),
            Endpoint::External { .. } => None,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Processor {
                domain,
                direction,
                index,
            } => write!(f, "d{domain}.{direction}.{index}"),
            Endpoint::External { direction, index } => write!(f, "ext.{direction}.{index}"),
        }
    }
}

impl FromStr for Endpoint {
    type Err = FabricError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || FabricError::MalformedEndpoint(s.to_string());
        let mut parts = s.split('.');
        let site = parts.next().ok_or_else(bad)?;
        let direction = parts
            .next()
            .and_then(|d| Direction::from_str(d).ok())
            .ok_or_else(bad)?;
        let index = parts
            .next()
            .and_then(|i| i.parse::<usize>().ok())
            .ok_or_else(bad)?;
        if parts.next().is_some() {
            return Err(bad());
        }
        match site {
            "ext" => Ok(Endpoint::External { direction, index }),
            d if d.starts_with('d') => {
                let domain = d[1..].parse::<usize>().map_err(|_| bad())?;
                Ok(Endpoint::Processor {
                    domain,
                    direction,
                    index,
                })
            }
            _ => Err(bad()),
        }
    }
}

impl TryFrom<String> for Endpoint {
    type Error = FabricError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Endpoint> for String {
    fn from(e: Endpoint) -> Self {
        e.to_string()
    }
}

/// A wire between a producer endpoint and a consumer endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Bond {
    /// The producing endpoint (processor output or external input).
    pub from: Endpoint,
    /// The consuming endpoint (processor input or external output).
    pub to: Endpoint,
}

impl Bond {
    /// Normalizes an unordered endpoint pair into producer → consumer;
    /// rejects pairs without exactly one producer.
    pub fn new(a: Endpoint, b: Endpoint) -> Result<Self, FabricError> {
        match (a.is_producer(), b.is_producer()) {
            (true, false) => Ok(Bond { from: a, to: b }),
            (false, true) => Ok(Bond { from: b, to: a }),
            _ => Err(FabricError::IncompatibleBond {
                a: a.to_string(),
                b: b.to_string(),
            }),
        }
    }

    /// Whether either endpoint touches the given domain.
    pub fn references_domain(&self, id: usize) -> bool {
        self.from.domain() == Some(id) || self.to.domain() == Some(id)
    }
}

impl fmt::Display for Bond {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("d0.output.2")]
    #[case("ext.input.0")]
    #[case("d11.input.3")]
    fn endpoint_round_trip(#[case] text: &str) {
        let ep: Endpoint = text.parse().unwrap();
        assert_eq!(ep.to_string(), text);
    }

    #[rstest]
    #[case("d0.sideways.2")]
    #[case("q0.input.2")]
    #[case("d0.input")]
    #[case("d0.input.2.2")]
    #[case("dd.input.2")]
    fn endpoint_rejects_garbage(#[case] text: &str) {
        assert!(text.parse::<Endpoint>().is_err());
    }

    #[test]
    fn bonds_normalize_to_producer_first() {
        let consumer: Endpoint = "d1.input.0".parse().unwrap();
        let producer: Endpoint = "d0.output.0".parse().unwrap();
        let bond = Bond::new(consumer, producer).unwrap();
        assert_eq!(bond.from, producer);
        assert_eq!(bond.to, consumer);
    }

    #[test]
    fn two_producers_cannot_bond() {
        let a: Endpoint = "d0.output.0".parse().unwrap();
        let b: Endpoint = "ext.input.0".parse().unwrap();
        assert!(matches!(
            Bond::new(a, b),
            Err(FabricError::IncompatibleBond { .. })
        ));
    }
}
