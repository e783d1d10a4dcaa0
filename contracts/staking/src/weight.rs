use locker_shared::{MAX_LOCK, VOTE_LENGTH, WEEK};
use soroban_sdk::contracttype;

/// Balance snapshot used for vote weight.
///
/// `timestamp` is the balance-weighted start time of the stake. Lock credit moves
/// it into the past, which is what makes a locked stake ramp faster.
#[contracttype]
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct WeightRecord {
    pub week: u64,
    pub timestamp: u64,
    pub balance: i128,
}

/// Latest snapshot plus the last snapshot of an earlier week. Weight for the
/// running week is always read from a record written before the week started.
#[contracttype]
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct WeightHistory {
    pub current: WeightRecord,
    pub previous: WeightRecord,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WeightError {
    Overflow,
    NothingStaked,
    LockNotExtended,
}

impl WeightHistory {
    /// Record `amount` of incoming balance. While a lock is active the new
    /// amount starts with the remaining lock time already credited.
    pub fn add(&mut self, now: u64, unlock_time: u64, amount: i128) -> Result<(), WeightError> {
        if amount <= 0 {
            return Ok(());
        }

        let start = now.saturating_sub(unlock_time.saturating_sub(now));
        let old = &self.current;
        let balance = old.balance.checked_add(amount).ok_or(WeightError::Overflow)?;

        let timestamp = if old.balance <= 0 {
            start
        } else {
            let weighted = old
                .balance
                .checked_mul(old.timestamp as i128)
                .and_then(|w| w.checked_add(amount.checked_mul(start as i128)?))
                .ok_or(WeightError::Overflow)?;
            (weighted / balance) as u64
        };

        self.write(now, timestamp, balance);
        Ok(())
    }

    /// Record `amount` of outgoing balance. The start time is kept, and the
    /// snapshot that backs this week's weight cannot exceed what is left.
    pub fn remove(&mut self, now: u64, amount: i128) -> Result<(), WeightError> {
        if amount <= 0 {
            return Ok(());
        }

        let balance = self
            .current
            .balance
            .checked_sub(amount)
            .ok_or(WeightError::Overflow)?
            .max(0);
        let timestamp = self.current.timestamp;

        self.write(now, timestamp, balance);
        if self.previous.balance > balance {
            self.previous.balance = balance;
        }
        Ok(())
    }

    /// Extend the lock to `now + duration`, capped so that the stake never
    /// receives more credit than it needs to reach full weight. Returns the new
    /// unlock time.
    pub fn extend_lock(
        &mut self,
        now: u64,
        unlock_time: u64,
        duration: u64,
    ) -> Result<u64, WeightError> {
        if self.current.balance <= 0 {
            return Err(WeightError::NothingStaked);
        }

        let base = unlock_time.max(now);
        let room = self
            .current
            .timestamp
            .saturating_add(VOTE_LENGTH)
            .saturating_sub(now);
        let new_unlock = now
            .saturating_add(duration)
            .min(base.saturating_add(room))
            .min(now.saturating_add(MAX_LOCK));

        if new_unlock <= base {
            return Err(WeightError::LockNotExtended);
        }

        let timestamp = self.current.timestamp.saturating_sub(new_unlock - base);
        let balance = self.current.balance;
        self.write(now, timestamp, balance);

        Ok(new_unlock)
    }

    /// Vote weight for the week containing `now`.
    pub fn vote_weight(&self, now: u64) -> i128 {
        let week = now / WEEK;
        let record = if self.current.week < week {
            &self.current
        } else {
            &self.previous
        };

        let start = week * WEEK;
        if record.balance <= 0 || record.timestamp >= start {
            return 0;
        }

        let elapsed = (start - record.timestamp) as i128;
        let weight = record.balance.saturating_mul(elapsed) / VOTE_LENGTH as i128;
        weight.min(record.balance)
    }

    fn write(&mut self, now: u64, timestamp: u64, balance: i128) {
        let week = now / WEEK;
        if self.current.week != week {
            self.previous = self.current.clone();
        }
        self.current = WeightRecord {
            week,
            timestamp,
            balance,
        };
    }
}
