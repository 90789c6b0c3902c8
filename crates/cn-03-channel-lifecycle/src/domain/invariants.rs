//! # Domain Invariants
//!
//! Money and ordering rules every channel mutation is checked against.

use super::errors::ChannelError;
use shared_types::Amount;

/// Conservation: the two balances always add up to the locked amount.
pub fn invariant_conservation(
    balance_a: Amount,
    balance_b: Amount,
    amount: Amount,
) -> Result<(), ChannelError> {
    match balance_a.checked_add(balance_b) {
        Some(total) if total == amount => Ok(()),
        _ => Err(ChannelError::Validation(format!(
            "balances {balance_a} + {balance_b} do not sum to {amount}"
        ))),
    }
}

/// Monotonic nonce: only a strictly newer state may be applied.
pub fn invariant_nonce_advances(current: u64, incoming: u64) -> bool {
    incoming > current
}

/// Withdraw is allowed only once `height > closing_block + challenge_period`.
pub fn invariant_challenge_elapsed(
    height: u64,
    closing_block: u64,
    challenge_period: u64,
) -> Result<(), ChannelError> {
    let unlocks_after = closing_block.saturating_add(challenge_period);
    if height <= unlocks_after {
        return Err(ChannelError::ChallengePeriodActive {
            current: height,
            unlocks_after,
        });
    }
    Ok(())
}

/// Initial split of a channel amount: A gets the larger half of an odd
/// amount so the two halves always sum exactly.
pub fn initial_split(amount: Amount) -> (Amount, Amount) {
    let balance_b = amount / 2;
    (amount - balance_b, balance_b)
}
