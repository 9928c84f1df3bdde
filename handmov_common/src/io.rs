//! Electrical and logical signal types shared by pins and the input layer.

use serde::{Deserialize, Serialize};

/// Electrical level of a digital line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Low,
    High,
}

impl Level {
    #[inline]
    pub const fn from_bool(high: bool) -> Self {
        if high { Self::High } else { Self::Low }
    }

    #[inline]
    pub const fn is_high(self) -> bool {
        matches!(self, Self::High)
    }

    /// The opposite level.
    #[inline]
    pub const fn inverted(self) -> Self {
        match self {
            Self::Low => Self::High,
            Self::High => Self::Low,
        }
    }
}

/// Logical transition of a button, independent of wiring polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Edge {
    /// Contact closed.
    Pressed,
    /// Contact opened.
    Released,
}

impl Edge {
    /// Map an electrical level to a logical state given the asserted level.
    ///
    /// Returns `Pressed` when `level == active`.
    #[inline]
    pub const fn from_level(level: Level, active: Level) -> Self {
        if level as u8 == active as u8 { Self::Pressed } else { Self::Released }
    }

    #[inline]
    pub const fn is_pressed(self) -> bool {
        matches!(self, Self::Pressed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_low_mapping() {
        assert_eq!(Edge::from_level(Level::Low, Level::Low), Edge::Pressed);
        assert_eq!(Edge::from_level(Level::High, Level::Low), Edge::Released);
    }

    #[test]
    fn active_high_mapping() {
        assert_eq!(Edge::from_level(Level::High, Level::High), Edge::Pressed);
        assert_eq!(Edge::from_level(Level::Low, Level::High), Edge::Released);
    }

    #[test]
    fn level_helpers() {
        assert!(Level::from_bool(true).is_high());
        assert_eq!(Level::High.inverted(), Level::Low);
    }
}
