use locker_shared::{accrued, per_share, week_start, MathError, WEEK};
use soroban_sdk::contracttype;

/// An amount of each of the two reward tokens.
#[contracttype]
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TokenPair {
    pub locking: i128,
    pub discount: i128,
}

impl TokenPair {
    pub fn new(locking: i128, discount: i128) -> Self {
        TokenPair { locking, discount }
    }

    pub fn is_zero(&self) -> bool {
        self.locking == 0 && self.discount == 0
    }

    pub fn checked_add(&self, other: &TokenPair) -> Result<TokenPair, MathError> {
        Ok(TokenPair {
            locking: self
                .locking
                .checked_add(other.locking)
                .ok_or(MathError::Overflow)?,
            discount: self
                .discount
                .checked_add(other.discount)
                .ok_or(MathError::Overflow)?,
        })
    }

    pub fn checked_sub(&self, other: &TokenPair) -> Result<TokenPair, MathError> {
        Ok(TokenPair {
            locking: self
                .locking
                .checked_sub(other.locking)
                .ok_or(MathError::Overflow)?,
            discount: self
                .discount
                .checked_sub(other.discount)
                .ok_or(MathError::Overflow)?,
        })
    }

    fn prorate(&self, elapsed: u64) -> Result<TokenPair, MathError> {
        let scale = |amount: i128| {
            amount
                .checked_mul(elapsed as i128)
                .map(|v| v / WEEK as i128)
                .ok_or(MathError::Overflow)
        };
        Ok(TokenPair {
            locking: scale(self.locking)?,
            discount: scale(self.discount)?,
        })
    }
}

/// Rewards being released during the week starting at `start`.
#[contracttype]
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RewardStream {
    pub start: u64,
    pub total: TokenPair,
    pub distributed: TokenPair,
}

/// Global distribution state: the running stream, the bucket that starts
/// streaming next week, and the reward-per-share integrals.
#[contracttype]
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Distribution {
    pub stream: RewardStream,
    pub next: TokenPair,
    pub integrals: TokenPair,
}

impl Distribution {
    /// Release whatever the stream owes up to `now` into the integrals.
    /// Nothing moves while `supply` is zero, so no rewards are stranded.
    pub fn sync(&mut self, now: u64, supply: i128) -> Result<(), MathError> {
        if supply <= 0 {
            return Ok(());
        }

        let mut released = TokenPair::default();
        let current = week_start(now);

        if current > self.stream.start {
            released = self.stream.total.checked_sub(&self.stream.distributed)?;
            if current == self.stream.start + WEEK {
                self.stream.total = self.next.clone();
            } else {
                released = released.checked_add(&self.next)?;
                self.stream.total = TokenPair::default();
            }
            self.stream.distributed = TokenPair::default();
            self.stream.start = current;
            self.next = TokenPair::default();
        }

        let due = self.stream.total.prorate(now - self.stream.start)?;
        released = released.checked_add(&due.checked_sub(&self.stream.distributed)?)?;
        self.stream.distributed = due;

        if released.is_zero() {
            return Ok(());
        }

        self.integrals = self.integrals.checked_add(&TokenPair {
            locking: per_share(released.locking, supply)?,
            discount: per_share(released.discount, supply)?,
        })?;
        Ok(())
    }

    /// Queue harvested rewards for the stream that starts next week.
    pub fn queue(&mut self, amounts: &TokenPair) -> Result<(), MathError> {
        self.next = self.next.checked_add(amounts)?;
        Ok(())
    }
}

/// Rewards owed to one account and the integrals it was last settled at.
#[contracttype]
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AccountRewards {
    pub pending: TokenPair,
    pub integrals: TokenPair,
}

impl AccountRewards {
    pub fn settle(&mut self, integrals: &TokenPair, balance: i128) -> Result<(), MathError> {
        let earned = TokenPair {
            locking: accrued(integrals.locking, self.integrals.locking, balance)?,
            discount: accrued(integrals.discount, self.integrals.discount, balance)?,
        };
        self.pending = self.pending.checked_add(&earned)?;
        self.integrals = integrals.clone();
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use locker_shared::PRECISION;

    const UNIT: i128 = 10_000_000;
    const START: u64 = 2_800 * WEEK;

    #[test]
    fn test_harvest_streams_from_next_week() {
        let mut dist = Distribution::default();
        let ts = START + WEEK / 2;
        dist.sync(ts, 2 * UNIT).unwrap();
        dist.queue(&TokenPair::new(4 * UNIT, 8 * UNIT)).unwrap();

        assert_eq!(dist.stream.start, START);
        assert_eq!(dist.next, TokenPair::new(4 * UNIT, 8 * UNIT));

        dist.sync(START + WEEK + WEEK / 4, 2 * UNIT).unwrap();
        assert_eq!(dist.stream.start, START + WEEK);
        assert_eq!(dist.stream.total, TokenPair::new(4 * UNIT, 8 * UNIT));
        assert_eq!(dist.stream.distributed, TokenPair::new(UNIT, 2 * UNIT));
        assert_eq!(dist.next, TokenPair::default());
        assert_eq!(dist.integrals, TokenPair::new(PRECISION / 2, PRECISION));

        dist.sync(START + WEEK + 3 * WEEK / 4, 2 * UNIT).unwrap();
        assert_eq!(dist.integrals, TokenPair::new(3 * PRECISION / 2, 3 * PRECISION));
    }

    #[test]
    fn test_stale_stream_releases_everything() {
        let mut dist = Distribution::default();
        dist.sync(START + WEEK / 2, UNIT).unwrap();
        dist.queue(&TokenPair::new(4 * UNIT, 6 * UNIT)).unwrap();

        dist.sync(START + 5 * WEEK, 2 * UNIT).unwrap();
        assert_eq!(dist.integrals, TokenPair::new(2 * PRECISION, 3 * PRECISION));
        assert_eq!(dist.stream.total, TokenPair::default());
        assert_eq!(dist.stream.start, START + 5 * WEEK);
    }

    #[test]
    fn test_repeated_sync_is_idempotent() {
        let mut dist = Distribution::default();
        dist.sync(START + WEEK / 2, 2 * UNIT).unwrap();
        dist.queue(&TokenPair::new(4 * UNIT, 8 * UNIT)).unwrap();

        let ts = START + WEEK + WEEK / 4;
        dist.sync(ts, 2 * UNIT).unwrap();
        let before = dist.clone();

        dist.sync(ts, 2 * UNIT).unwrap();
        assert_eq!(dist.integrals, before.integrals);
        assert_eq!(dist.stream.distributed, before.stream.distributed);
        assert_eq!(dist, before);
    }

    #[test]
    fn test_zero_supply_is_noop() {
        let mut dist = Distribution::default();
        dist.sync(START, UNIT).unwrap();
        dist.queue(&TokenPair::new(UNIT, UNIT)).unwrap();
        let before = dist.clone();

        dist.sync(START + 3 * WEEK, 0).unwrap();
        assert_eq!(dist, before);
    }

    #[test]
    fn test_settle_accrues_since_snapshot() {
        let mut account = AccountRewards::default();
        account
            .settle(&TokenPair::new(PRECISION, 2 * PRECISION), 2 * UNIT)
            .unwrap();
        assert_eq!(account.pending, TokenPair::new(2 * UNIT, 4 * UNIT));

        account
            .settle(&TokenPair::new(PRECISION, 2 * PRECISION), 2 * UNIT)
            .unwrap();
        assert_eq!(account.pending, TokenPair::new(2 * UNIT, 4 * UNIT));
    }
}
