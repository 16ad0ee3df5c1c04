//! # Engine Configuration
//!
//! All balance knobs live in one TOML file, loaded once at startup and
//! replaced wholesale through the administrative setters afterwards.
//!
//! ```toml
//! ticket_price = 10_000_000_000_000_000   # 0.01 ETH
//! base_probability = 2_000_000            # 2% of SCALE
//! jackpot_probability = 100               # 1 in 1,000,000
//! referral_min_spent = 100_000_000_000_000_000
//!
//! [shares]
//! jackpot_bp = 500
//! referrer_commission_bp = 200
//! cashback_bp = 200
//!
//! [collectible]
//! limit = 10_000
//! step = 2_000
//! decay = 3
//! initial_probability = 10_000_000
//!
//! [oracle]
//! key_hash = "0x0000000000000000000000000000000000000000000000000000000000000000"
//! subscription_id = 0
//! request_confirmations = 3
//! callback_gas_limit = 500_000
//! ```
//!
//! TOML integers are signed 64-bit, so amounts written in the file must stay
//! below `i64::MAX` wei (about 9.2 ETH).

use std::path::Path;

use alloy_primitives::B256;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{EconomyError, EconomyResult};
use crate::fixed_point::{Probability, BASIS_POINTS, SCALE};
use crate::tiers::TierInputs;

/// Basis-point splits of every ticket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShareConfig {
    /// Share accrued into the jackpot.
    pub jackpot_bp: u32,
    /// Share paid to the buyer's referrer.
    pub referrer_commission_bp: u32,
    /// Share paid back to a referred buyer.
    pub cashback_bp: u32,
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            jackpot_bp: 500,
            referrer_commission_bp: 200,
            cashback_bp: 200,
        }
    }
}

/// Bonus collectible series parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CollectibleConfig {
    /// Series cap.
    pub limit: u64,
    /// Mints between probability decays.
    pub step: u64,
    /// Divisor applied every `step` mints.
    pub decay: u64,
    /// Odds for the first mint.
    pub initial_probability: Probability,
}

impl Default for CollectibleConfig {
    fn default() -> Self {
        Self {
            limit: 10_000,
            step: 2_000,
            decay: 3,
            initial_probability: Probability::new(SCALE / 10).unwrap_or(Probability::ZERO),
        }
    }
}

/// Oracle subscription settings, passed through to the coordinator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OracleSettings {
    /// Gas lane / key hash.
    pub key_hash: B256,
    /// Subscription paying for requests.
    pub subscription_id: u64,
    /// Blocks to wait before fulfilling.
    pub request_confirmations: u16,
    /// Gas available to the fulfillment callback.
    pub callback_gas_limit: u32,
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            key_hash: B256::ZERO,
            subscription_id: 0,
            request_confirmations: 3,
            callback_gas_limit: 500_000,
        }
    }
}

/// Complete engine configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Exact payment required per ticket, in wei.
    #[serde(deserialize_with = "deserialize_amount")]
    pub ticket_price: u128,
    /// Expected return of each pool and refund tier, as a probability.
    pub base_probability: Probability,
    /// Odds of the jackpot tier.
    pub jackpot_probability: Probability,
    /// Spend a player needs before they may refer others.
    #[serde(deserialize_with = "deserialize_amount")]
    pub referral_min_spent: u128,
    /// Ticket splits.
    pub shares: ShareConfig,
    /// Bonus collectible series.
    pub collectible: CollectibleConfig,
    /// Oracle subscription.
    pub oracle: OracleSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let ticket_price = 10_000_000_000_000_000; // 0.01 ETH
        Self {
            ticket_price,
            base_probability: Probability::new(2_000_000).unwrap_or(Probability::ZERO),
            jackpot_probability: Probability::new(100).unwrap_or(Probability::ZERO),
            referral_min_spent: ticket_price * 10,
            shares: ShareConfig::default(),
            collectible: CollectibleConfig::default(),
            oracle: OracleSettings::default(),
        }
    }
}

impl EngineConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` on a parse or validation failure.
    pub fn from_toml_str(source: &str) -> EconomyResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| EconomyError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the file cannot be read or is invalid.
    pub fn from_toml_file(path: impl AsRef<Path>) -> EconomyResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            EconomyError::InvalidConfig(format!("{}: {e}", path.display()))
        })?;
        Self::from_toml_str(&source)
    }

    /// Checks every value against its allowed range.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` naming the first offending field.
    pub fn validate(&self) -> EconomyResult<()> {
        if self.ticket_price == 0 {
            return Err(invalid("ticket_price must be non-zero"));
        }
        for (name, p) in [
            ("base_probability", self.base_probability),
            ("jackpot_probability", self.jackpot_probability),
            ("collectible.initial_probability", self.collectible.initial_probability),
        ] {
            if p.raw() > SCALE {
                return Err(EconomyError::InvalidConfig(format!(
                    "{name} {} exceeds scale {SCALE}",
                    p.raw()
                )));
            }
        }

        let shares = u128::from(self.shares.jackpot_bp)
            + u128::from(self.shares.referrer_commission_bp)
            + u128::from(self.shares.cashback_bp);
        if shares > BASIS_POINTS {
            return Err(EconomyError::InvalidConfig(format!(
                "shares total {shares} bp exceeds {BASIS_POINTS}"
            )));
        }

        if self.collectible.step == 0 {
            return Err(invalid("collectible.step must be at least 1"));
        }
        if self.collectible.decay < 2 {
            return Err(invalid("collectible.decay must be at least 2"));
        }
        Ok(())
    }

    /// Tier table inputs for the given pool averages.
    #[must_use]
    pub const fn tier_inputs(&self, pool_averages: [u128; 3]) -> TierInputs {
        TierInputs {
            ticket_price: self.ticket_price,
            base_probability: self.base_probability,
            jackpot_probability: self.jackpot_probability,
            pool_averages,
        }
    }
}

/// TOML has no 128-bit integers; amounts are read as `u64` and widened.
fn deserialize_amount<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
    u64::deserialize(deserializer).map(u128::from)
}

fn invalid(message: &str) -> EconomyError {
    EconomyError::InvalidConfig(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_parse_partial_toml() {
        let config = EngineConfig::from_toml_str(
            r#"
            ticket_price = 100
            base_probability = 1_000_000

            [shares]
            jackpot_bp = 500
            referrer_commission_bp = 200
            cashback_bp = 200

            [oracle]
            subscription_id = 77
            "#,
        )
        .unwrap();

        assert_eq!(config.ticket_price, 100);
        assert_eq!(config.base_probability.raw(), 1_000_000);
        assert_eq!(config.oracle.subscription_id, 77);
        assert_eq!(config.collectible, CollectibleConfig::default());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = EngineConfig::from_toml_str("ticket_prise = 100");
        assert!(matches!(result, Err(EconomyError::InvalidConfig(_))));
    }

    #[test]
    fn test_probability_above_scale_rejected() {
        let result = EngineConfig::from_toml_str("jackpot_probability = 100_000_001");
        assert!(matches!(result, Err(EconomyError::InvalidConfig(_))));
    }

    #[test]
    fn test_shares_over_100_percent_rejected() {
        let mut config = EngineConfig::default();
        config.shares.jackpot_bp = 9_700;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_price_rejected() {
        let mut config = EngineConfig::default();
        config.ticket_price = 0;
        assert!(config.validate().is_err());
    }
}
