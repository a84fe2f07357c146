// src/types.rs
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// RandomX memory mode
///
/// Selects what the mining VMs read from. The choice trades memory for
/// hashrate and is fixed for the lifetime of a resource manager.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MiningMode {
    /// Cache-backed VMs (~256 MiB per cache)
    ///
    /// Slow but fits on almost any machine.
    #[default]
    #[clap(name = "light")]
    Light,

    /// Dataset-backed VMs (~2 GiB shared dataset)
    ///
    /// Several times faster; needs the whole dataset resident.
    #[clap(name = "fast")]
    Fast,
}

impl MiningMode {
    pub fn from_fast_flag(fast: bool) -> Self {
        if fast { MiningMode::Fast } else { MiningMode::Light }
    }

    pub fn is_fast(self) -> bool {
        self == MiningMode::Fast
    }
}

impl fmt::Display for MiningMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MiningMode::Light => write!(f, "light"),
            MiningMode::Fast => write!(f, "fast"),
        }
    }
}

impl FromStr for MiningMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "light" => Ok(MiningMode::Light),
            "fast" | "full" => Ok(MiningMode::Fast),
            _ => Err(format!("Unknown mining mode: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_round_trips_through_text() {
        for mode in [MiningMode::Light, MiningMode::Fast] {
            assert_eq!(mode.to_string().parse::<MiningMode>().unwrap(), mode);
        }
        assert_eq!("FULL".parse::<MiningMode>().unwrap(), MiningMode::Fast);
        assert!("turbo".parse::<MiningMode>().is_err());
    }
}
