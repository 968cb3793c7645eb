//! Validator registry and stake-weighted producer selection

use crate::crypto::Address;
use crate::error::ChainError;
use crate::transaction::Amount;
use rand::Rng;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Validator {
    pub address: Address,
    pub stake: Amount,
    pub is_active: bool,
    /// Registration time in milliseconds since the Unix epoch.
    pub joined_at: u64,
}

/// Validators in registration order. Only addresses holding at least the
/// minimum stake are present.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ValidatorRegistry {
    minimum_stake: Amount,
    validators: Vec<Validator>,
}

impl ValidatorRegistry {
    pub fn new(minimum_stake: Amount) -> Self {
        ValidatorRegistry {
            minimum_stake,
            validators: Vec::new(),
        }
    }

    pub fn minimum_stake(&self) -> Amount {
        self.minimum_stake
    }

    pub fn get(&self, address: &str) -> Option<&Validator> {
        self.validators.iter().find(|v| v.address == address)
    }

    pub fn is_validator(&self, address: &str) -> bool {
        self.get(address).is_some()
    }

    pub fn validators(&self) -> &[Validator] {
        &self.validators
    }

    pub fn active_validators(&self) -> impl Iterator<Item = &Validator> {
        self.validators.iter().filter(|v| v.is_active)
    }

    /// Active stake, saturating at [`Amount::MAX`].
    pub fn total_stake(&self) -> Amount {
        self.active_validators()
            .fold(Amount::ZERO, |total, v| total.saturating_add(v.stake))
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Records a deposit. Every single deposit must reach the minimum stake,
    /// including top-ups from an already registered validator.
    pub fn deposit(&mut self, address: &str, amount: Amount) -> Result<&Validator, ChainError> {
        if amount <= Amount::ZERO {
            return Err(ChainError::InvalidAmount(format!(
                "stake deposit must be positive, got {}",
                amount
            )));
        }
        if amount < self.minimum_stake {
            return Err(ChainError::StakeBelowMinimum {
                amount,
                minimum: self.minimum_stake,
            });
        }

        let pos = match self.validators.iter().position(|v| v.address == address) {
            Some(pos) => {
                let validator = &mut self.validators[pos];
                validator.stake = validator.stake.checked_add(amount).ok_or_else(|| {
                    ChainError::InvalidAmount(format!("stake of {} would overflow", address))
                })?;
                pos
            }
            None => {
                self.validators.push(Validator {
                    address: address.to_string(),
                    stake: amount,
                    is_active: true,
                    joined_at: chrono::Utc::now().timestamp_millis() as u64,
                });
                tracing::info!(validator = address, stake = %amount, "validator registered");
                self.validators.len() - 1
            }
        };
        Ok(&self.validators[pos])
    }

    /// Withdraws stake, dropping the validator once it falls below the minimum.
    /// Returns the remaining stake.
    pub fn withdraw(&mut self, address: &str, amount: Amount) -> Result<Amount, ChainError> {
        if amount <= Amount::ZERO {
            return Err(ChainError::InvalidAmount(format!(
                "unstake amount must be positive, got {}",
                amount
            )));
        }
        let pos = self
            .validators
            .iter()
            .position(|v| v.address == address)
            .ok_or_else(|| ChainError::UnknownValidator(address.to_string()))?;

        let validator = &mut self.validators[pos];
        if validator.stake < amount {
            return Err(ChainError::InsufficientStake {
                address: address.to_string(),
                staked: validator.stake,
                requested: amount,
            });
        }

        validator.stake -= amount;
        let remaining = validator.stake;
        if remaining < self.minimum_stake {
            self.validators.remove(pos);
            tracing::info!(validator = address, stake = %remaining, "validator removed below minimum stake");
        }
        Ok(remaining)
    }

    /// Single-draw weighted lottery: draws uniformly in `[0, total_stake)` and
    /// walks active validators in registration order until the running stake
    /// reaches the draw.
    pub fn select_with<R: Rng>(&self, rng: &mut R) -> Option<&Validator> {
        let mut active = self.active_validators().peekable();
        let first = *active.peek()?;

        // Summed in i128 so the cumulative walk cannot overflow.
        let total: i128 = self
            .active_validators()
            .map(|v| i128::from(v.stake.to_bits()))
            .sum();
        if total <= 0 {
            return Some(first);
        }

        let draw = rng.gen_range(0..total);
        let mut cumulative: i128 = 0;
        for validator in active {
            cumulative += i128::from(validator.stake.to_bits());
            if cumulative >= draw {
                return Some(validator);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn amount(n: i32) -> Amount {
        Amount::from_num(n)
    }

    #[test]
    fn test_deposit_below_minimum_rejected() {
        let mut registry = ValidatorRegistry::new(amount(32));
        let result = registry.deposit("bob", amount(10));
        assert!(matches!(result, Err(ChainError::StakeBelowMinimum { .. })));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_top_up_below_minimum_rejected() {
        let mut registry = ValidatorRegistry::new(amount(32));
        registry.deposit("bob", amount(40)).unwrap();
        assert!(registry.deposit("bob", amount(5)).is_err());
        assert_eq!(registry.get("bob").unwrap().stake, amount(40));

        registry.deposit("bob", amount(32)).unwrap();
        assert_eq!(registry.get("bob").unwrap().stake, amount(72));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_withdraw_below_minimum_removes_validator() {
        let mut registry = ValidatorRegistry::new(amount(32));
        registry.deposit("bob", amount(40)).unwrap();

        assert_eq!(registry.withdraw("bob", amount(8)).unwrap(), amount(32));
        assert!(registry.is_validator("bob"));

        assert_eq!(registry.withdraw("bob", amount(1)).unwrap(), amount(31));
        assert!(!registry.is_validator("bob"));
    }

    #[test]
    fn test_withdraw_errors() {
        let mut registry = ValidatorRegistry::new(amount(32));
        assert_eq!(
            registry.withdraw("ghost", amount(1)),
            Err(ChainError::UnknownValidator("ghost".to_string()))
        );

        registry.deposit("bob", amount(40)).unwrap();
        assert!(matches!(
            registry.withdraw("bob", amount(41)),
            Err(ChainError::InsufficientStake { .. })
        ));
    }

    #[test]
    fn test_select_with_no_validators() {
        let registry = ValidatorRegistry::new(amount(32));
        let mut rng = StdRng::seed_from_u64(1);
        assert!(registry.select_with(&mut rng).is_none());
    }

    #[test]
    fn test_selection_follows_stake_share() {
        let mut registry = ValidatorRegistry::new(amount(10));
        registry.deposit("small", amount(10)).unwrap();
        registry.deposit("large", amount(90)).unwrap();

        let mut rng = StdRng::seed_from_u64(42);
        let mut large_wins = 0;
        for _ in 0..2_000 {
            if registry.select_with(&mut rng).unwrap().address == "large" {
                large_wins += 1;
            }
        }
        assert!(large_wins > 1_600 && large_wins < 1_990, "large won {}", large_wins);
    }

    #[test]
    fn test_total_stake_sums_active() {
        let mut registry = ValidatorRegistry::new(amount(32));
        registry.deposit("a", amount(32)).unwrap();
        registry.deposit("b", amount(50)).unwrap();
        assert_eq!(registry.total_stake(), amount(82));
    }

    #[test]
    fn test_non_positive_withdraw_rejected() {
        let mut registry = ValidatorRegistry::new(amount(32));
        registry.deposit("bob", amount(40)).unwrap();

        for requested in [amount(-500), Amount::ZERO] {
            assert!(matches!(
                registry.withdraw("bob", requested),
                Err(ChainError::InvalidAmount(_))
            ));
        }
        assert_eq!(registry.get("bob").unwrap().stake, amount(40));
    }

    #[test]
    fn test_non_positive_deposit_rejected_at_zero_minimum() {
        let mut registry = ValidatorRegistry::new(Amount::ZERO);
        assert!(matches!(
            registry.deposit("bob", amount(-5)),
            Err(ChainError::InvalidAmount(_))
        ));
        assert!(registry.deposit("bob", Amount::ZERO).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_large_stakes_do_not_overflow() {
        let mut registry = ValidatorRegistry::new(amount(32));
        registry.deposit("bob", Amount::MAX).unwrap();
        registry.deposit("carol", Amount::MAX).unwrap();

        assert!(matches!(
            registry.deposit("bob", amount(32)),
            Err(ChainError::InvalidAmount(_))
        ));
        assert_eq!(registry.get("bob").unwrap().stake, Amount::MAX);
        assert_eq!(registry.total_stake(), Amount::MAX);

        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..32 {
            assert!(registry.select_with(&mut rng).is_some());
        }
    }
}
