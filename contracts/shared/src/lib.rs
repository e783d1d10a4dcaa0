#![no_std]
//! Shared constants, math and cross-contract plumbing used by every liquid locker contract.
//! The ledger and both reward distributors round through the same fixed-point helpers.

pub mod interfaces;
pub mod management;

pub use interfaces::*;

// ============================================================================
// Constants
// ============================================================================

/// Seconds in a day
pub const DAY: u64 = 86_400;

/// Seconds in a week, the length of every reward and withdrawal stream window
pub const WEEK: u64 = 7 * DAY;

/// Longest lock an account can hold
pub const MAX_LOCK: u64 = 8 * WEEK;

/// Time it takes for an unlocked stake to reach its full vote weight
pub const VOTE_LENGTH: u64 = 8 * WEEK;

/// Basis points representing 100% (10000 basis points = 100%)
pub const MAX_BPS: u32 = 10_000;

/// Fixed-point scale of every reward integral (18 decimals)
pub const PRECISION: i128 = 1_000_000_000_000_000_000;

/// Allowance value that is never decremented
pub const UNLIMITED_ALLOWANCE: i128 = i128::MAX;

// ============================================================================
// Errors
// ============================================================================

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MathError {
    Overflow,
    DivisionByZero,
}

// ============================================================================
// Fixed-point and fee math
// ============================================================================

/// Reward per share for `amount` spread over `supply`, scaled by `PRECISION`.
/// Rounds down so the distributor can only ever hold a dust surplus.
pub fn per_share(amount: i128, supply: i128) -> Result<i128, MathError> {
    if supply <= 0 {
        return Err(MathError::DivisionByZero);
    }
    amount
        .checked_mul(PRECISION)
        .ok_or(MathError::Overflow)?
        .checked_div(supply)
        .ok_or(MathError::Overflow)
}

/// Rewards earned by `balance` while the integral moved from `snapshot` to `integral`.
pub fn accrued(integral: i128, snapshot: i128, balance: i128) -> Result<i128, MathError> {
    let delta = integral.checked_sub(snapshot).ok_or(MathError::Overflow)?;
    if delta <= 0 || balance <= 0 {
        return Ok(0);
    }
    Ok(delta.checked_mul(balance).ok_or(MathError::Overflow)? / PRECISION)
}

/// Split `amount` into `(net, fee)` for a fee rate in basis points.
pub fn skim(amount: i128, rate: u32) -> Result<(i128, i128), MathError> {
    if amount <= 0 || rate == 0 {
        return Ok((amount, 0));
    }
    let fee = amount
        .checked_mul(rate as i128)
        .ok_or(MathError::Overflow)?
        / MAX_BPS as i128;
    Ok((amount - fee, fee))
}

/// Validate that a fee rate is within valid range (0-100%)
pub fn validate_fee_rate(rate: u32) -> bool {
    rate <= MAX_BPS
}

/// Start of the week containing `timestamp`
pub fn week_start(timestamp: u64) -> u64 {
    timestamp - timestamp % WEEK
}
