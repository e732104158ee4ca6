//! Node roles.

use crate::error::TypesError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role of a node in the network.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    /// The trusted node that schedules forging rounds and receives stake bonds.
    Authority,
    /// Any other peer; eligible to forge.
    #[default]
    Regular,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Authority => "authority",
            Self::Regular => "regular",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeType {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "authority" => Ok(Self::Authority),
            "regular" => Ok(Self::Regular),
            other => Err(TypesError::UnknownNodeType(other.to_string())),
        }
    }
}
