use std::fmt::{Debug, Display};
use std::ops::{Add, AddAssign, Sub};
use std::str::FromStr;

use serde::Deserialize;

/// Simulation time in milliseconds. All tables and settings use this unit.
#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeMS(pub u64);

impl Display for TimeMS {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TimeMS {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let time = s.parse::<u64>()?;
        Ok(Self(time))
    }
}

impl From<u64> for TimeMS {
    fn from(f: u64) -> Self {
        Self(f)
    }
}

impl From<i64> for TimeMS {
    fn from(f: i64) -> Self {
        Self(f as u64)
    }
}

impl TimeMS {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
    pub fn as_i64(&self) -> i64 {
        self.0 as i64
    }
    pub fn as_f64(&self) -> f64 {
        self.0 as f64
    }
}

impl Add for TimeMS {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for TimeMS {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for TimeMS {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}
