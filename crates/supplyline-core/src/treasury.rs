//! Player cash balances.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use supplyline_logic::effects::{CashLedger, DebitDeclined};
use supplyline_logic::ids::PlayerId;

/// Balances never go negative; a debit larger than the balance is refused.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Treasury {
    balances: BTreeMap<PlayerId, u64>,
}

impl Treasury {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deposit(&mut self, player: PlayerId, amount: u64) -> u64 {
        let balance = self.balances.entry(player).or_insert(0);
        *balance = balance.saturating_add(amount);
        *balance
    }

    pub fn balance(&self, player: PlayerId) -> u64 {
        self.balances.get(&player).copied().unwrap_or(0)
    }
}

impl CashLedger for Treasury {
    fn debit(&mut self, player: PlayerId, amount: u64) -> Result<(), DebitDeclined> {
        let balance = self.balance(player);
        if balance < amount {
            return Err(DebitDeclined {
                player,
                amount,
                reason: format!("balance is only {balance}"),
            });
        }
        self.balances.insert(player, balance - amount);
        log::debug!("{player} paid {amount}, {} left", balance - amount);
        Ok(())
    }
}
