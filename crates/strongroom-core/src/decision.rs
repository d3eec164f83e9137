//! Access decisions.
//!
//! A decision is persisted as a single byte. Byte `0` means the rule holds no
//! opinion and is treated as if the rule were absent.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Outcome of a hierarchy rule or of a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Decision {
    Allowed,
    Denied,
}

impl Decision {
    /// Byte for a rule with no opinion.
    pub const NO_OPINION_BYTE: u8 = 0;
    /// Byte for DENY.
    pub const DENIED_BYTE: u8 = 1;
    /// Byte for ALLOW.
    pub const ALLOWED_BYTE: u8 = 2;

    /// Configuration value selecting DENY as the default rule.
    pub const DENY_SENTINEL: &'static str = "D";
    /// Configuration value selecting ALLOW as the default rule.
    pub const ALLOW_SENTINEL: &'static str = "A";

    /// Persisted byte for this decision.
    pub const fn to_byte(self) -> u8 {
        match self {
            Decision::Allowed => Self::ALLOWED_BYTE,
            Decision::Denied => Self::DENIED_BYTE,
        }
    }

    /// Decode a persisted byte. `Ok(None)` means no opinion.
    pub fn from_byte(byte: u8) -> Result<Option<Self>> {
        match byte {
            Self::NO_OPINION_BYTE => Ok(None),
            Self::DENIED_BYTE => Ok(Some(Decision::Denied)),
            Self::ALLOWED_BYTE => Ok(Some(Decision::Allowed)),
            other => Err(CoreError::UnknownDecision(other)),
        }
    }

    /// Interpret a configured default. Only the deny sentinel denies.
    pub fn from_config_value(value: Option<&str>) -> Self {
        match value {
            Some(Self::DENY_SENTINEL) => Decision::Denied,
            _ => Decision::Allowed,
        }
    }

    /// Configuration value for this decision.
    pub const fn config_value(self) -> &'static str {
        match self {
            Decision::Allowed => Self::ALLOW_SENTINEL,
            Decision::Denied => Self::DENY_SENTINEL,
        }
    }

    pub const fn is_allowed(self) -> bool {
        matches!(self, Decision::Allowed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_codes() {
        assert_eq!(Decision::from_byte(1).unwrap(), Some(Decision::Denied));
        assert_eq!(Decision::from_byte(2).unwrap(), Some(Decision::Allowed));
        assert_eq!(Decision::from_byte(0).unwrap(), None);
        assert_eq!(Decision::from_byte(7), Err(CoreError::UnknownDecision(7)));
    }

    #[test]
    fn test_config_default_only_denies_on_sentinel() {
        assert_eq!(Decision::from_config_value(None), Decision::Allowed);
        assert_eq!(Decision::from_config_value(Some("D")), Decision::Denied);
        assert_eq!(Decision::from_config_value(Some("A")), Decision::Allowed);
        assert_eq!(Decision::from_config_value(Some("deny")), Decision::Allowed);
        assert_eq!(Decision::from_config_value(Some("")), Decision::Allowed);
    }

    proptest::proptest! {
        #[test]
        fn test_only_three_bytes_decode(byte in proptest::prelude::any::<u8>()) {
            let decoded = Decision::from_byte(byte);
            proptest::prop_assert_eq!(decoded.is_ok(), byte <= Decision::ALLOWED_BYTE);
            if let Ok(Some(decision)) = decoded {
                proptest::prop_assert_eq!(decision.to_byte(), byte);
            }
        }
    }
}
