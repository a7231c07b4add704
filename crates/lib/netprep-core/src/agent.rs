use std::fmt;
use std::fmt::Debug;
use std::str::FromStr;

use serde::Deserialize;

/// A unique ID for every entity that can appear in a position or link table,
/// whether it moves (vehicles) or not (roadside units, controllers).
#[derive(Deserialize, Default, Clone, Copy, PartialOrd, Ord, PartialEq, Eq, Hash)]
pub struct AgentId(u64);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Debug for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AgentId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = s.parse::<u64>()?;
        Ok(Self(id))
    }
}

impl From<u64> for AgentId {
    fn from(f: u64) -> Self {
        Self(f)
    }
}

impl AgentId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
    pub fn as_i64(&self) -> i64 {
        self.0 as i64
    }
}
