#![no_std]
use locker_shared::{
    management::{self, AccessError},
    RewardsHookClient, MAX_LOCK, UNLIMITED_ALLOWANCE, WEEK,
};
use soroban_sdk::{
    contract, contracterror, contractimpl, contracttype, log, symbol_short, token, Address, Env,
    String,
};

mod weight;

pub use weight::{WeightError, WeightHistory, WeightRecord};

// Data Types
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StakingConfig {
    pub asset: Address,
    pub rewards: Option<Address>,
}

/// Unstaked funds released linearly over one week from `start`.
#[contracttype]
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct WithdrawalStream {
    pub start: u64,
    pub total: i128,
    pub claimed: i128,
}

// Storage Keys
#[contracttype]
pub enum DataKey {
    Config,
    TotalSupply,
    Balance(Address),
    Allowance(Address, Address),
    UnlockTime(Address),
    Weight(Address),
    Stream(Address),
}

// Error Types
#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum StakingError {
    NotInitialized = 1,
    AlreadyInitialized = 2,
    Unauthorized = 3,
    InvalidAmount = 4,
    InsufficientBalance = 5,
    InsufficientAllowance = 6,
    Locked = 7,
    LockNotExtended = 8,
    NothingStaked = 9,
    ExceedsWithdrawable = 10,
    NumericOverflow = 11,
}

impl From<AccessError> for StakingError {
    fn from(_: AccessError) -> Self {
        StakingError::Unauthorized
    }
}

impl From<WeightError> for StakingError {
    fn from(err: WeightError) -> Self {
        match err {
            WeightError::Overflow => StakingError::NumericOverflow,
            WeightError::NothingStaked => StakingError::NothingStaked,
            WeightError::LockNotExtended => StakingError::LockNotExtended,
        }
    }
}

// Events
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DepositEvent {
    pub caller: Address,
    pub receiver: Address,
    pub amount: i128,
    pub timestamp: u64,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UnstakeEvent {
    pub account: Address,
    pub amount: i128,
    pub stream_total: i128,
    pub timestamp: u64,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WithdrawEvent {
    pub caller: Address,
    pub receiver: Address,
    pub owner: Address,
    pub amount: i128,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TransferEvent {
    pub from: Address,
    pub to: Address,
    pub amount: i128,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ApprovalEvent {
    pub owner: Address,
    pub spender: Address,
    pub amount: i128,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LockEvent {
    pub account: Address,
    pub unlock_time: u64,
    pub timestamp: u64,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RewardsUpdatedEvent {
    pub rewards: Option<Address>,
}

#[contract]
pub struct StakingContract;

#[contractimpl]
impl StakingContract {
    /// Initialize the ledger for a single staked `asset`
    pub fn initialize(env: Env, management: Address, asset: Address) -> Result<(), StakingError> {
        if env.storage().instance().has(&DataKey::Config) {
            return Err(StakingError::AlreadyInitialized);
        }

        management.require_auth();

        let config = StakingConfig {
            asset,
            rewards: None,
        };

        env.storage().instance().set(&DataKey::Config, &config);
        env.storage().instance().set(&DataKey::TotalSupply, &0i128);
        management::init(&env, &management);

        log!(&env, "Staking ledger initialized by management: {}", management);

        Ok(())
    }

    /// Stake `amount` of the asset on behalf of `receiver` (defaults to the caller).
    /// Shares are minted 1:1.
    pub fn deposit(
        env: Env,
        caller: Address,
        amount: i128,
        receiver: Option<Address>,
    ) -> Result<i128, StakingError> {
        caller.require_auth();
        let config = Self::get_config(&env)?;

        if amount < 0 {
            return Err(StakingError::InvalidAmount);
        }

        let receiver = receiver.unwrap_or_else(|| caller.clone());
        let asset = token::Client::new(&env, &config.asset);
        if asset.balance(&caller) < amount {
            return Err(StakingError::InsufficientBalance);
        }

        let balance = Self::balance_of(env.clone(), receiver.clone());
        let supply = Self::total_supply(env.clone());
        Self::report(&env, &config, &receiver, balance, supply);

        if amount > 0 {
            asset.transfer(&caller, &env.current_contract_address(), &amount);

            let now = env.ledger().timestamp();
            let mut history = Self::weight_history(&env, &receiver);
            history.add(now, Self::unlock_time(env.clone(), receiver.clone()), amount)?;
            Self::set_weight_history(&env, &receiver, &history);

            let new_balance = balance
                .checked_add(amount)
                .ok_or(StakingError::NumericOverflow)?;
            let new_supply = supply
                .checked_add(amount)
                .ok_or(StakingError::NumericOverflow)?;
            Self::set_balance(&env, &receiver, new_balance);
            env.storage().instance().set(&DataKey::TotalSupply, &new_supply);
        }

        let event = DepositEvent {
            caller: caller.clone(),
            receiver: receiver.clone(),
            amount,
            timestamp: env.ledger().timestamp(),
        };
        env.events().publish((symbol_short!("deposit"),), event);

        log!(&env, "Deposit of {} by {} for {}", amount, caller, receiver);

        Ok(amount)
    }

    /// Burn `amount` of shares and start streaming the underlying back over one
    /// week. Any unclaimed remainder of a running stream is merged into the new
    /// one, which restarts the clock.
    pub fn unstake(env: Env, account: Address, amount: i128) -> Result<(), StakingError> {
        account.require_auth();
        let config = Self::get_config(&env)?;

        if amount <= 0 {
            return Err(StakingError::InvalidAmount);
        }

        let now = env.ledger().timestamp();
        if Self::unlock_time(env.clone(), account.clone()) > now {
            return Err(StakingError::Locked);
        }

        let balance = Self::balance_of(env.clone(), account.clone());
        if amount > balance {
            return Err(StakingError::InsufficientBalance);
        }

        let supply = Self::total_supply(env.clone());
        Self::report(&env, &config, &account, balance, supply);

        let mut history = Self::weight_history(&env, &account);
        history.remove(now, amount)?;
        Self::set_weight_history(&env, &account, &history);

        Self::set_balance(&env, &account, balance - amount);
        env.storage()
            .instance()
            .set(&DataKey::TotalSupply, &(supply - amount));

        let previous = Self::stream(env.clone(), account.clone());
        let stream = WithdrawalStream {
            start: now,
            total: (previous.total - previous.claimed)
                .checked_add(amount)
                .ok_or(StakingError::NumericOverflow)?,
            claimed: 0,
        };
        env.storage()
            .persistent()
            .set(&DataKey::Stream(account.clone()), &stream);

        let event = UnstakeEvent {
            account: account.clone(),
            amount,
            stream_total: stream.total,
            timestamp: now,
        };
        env.events().publish((symbol_short!("unstake"),), event);

        log!(&env, "Unstaked {} for {}", amount, account);

        Ok(())
    }

    /// Withdraw released funds from `owner`'s stream (defaults to the caller).
    /// A caller other than the owner spends the owner's share allowance.
    pub fn withdraw(
        env: Env,
        caller: Address,
        amount: i128,
        receiver: Option<Address>,
        owner: Option<Address>,
    ) -> Result<i128, StakingError> {
        caller.require_auth();
        let config = Self::get_config(&env)?;

        if amount < 0 {
            return Err(StakingError::InvalidAmount);
        }

        let owner = owner.unwrap_or_else(|| caller.clone());
        let receiver = receiver.unwrap_or_else(|| caller.clone());

        if amount > Self::max_withdraw(env.clone(), owner.clone()) {
            return Err(StakingError::ExceedsWithdrawable);
        }

        if caller != owner {
            Self::spend_allowance(&env, &owner, &caller, amount)?;
        }

        if amount > 0 {
            let mut stream = Self::stream(env.clone(), owner.clone());
            stream.claimed += amount;
            env.storage()
                .persistent()
                .set(&DataKey::Stream(owner.clone()), &stream);

            token::Client::new(&env, &config.asset).transfer(
                &env.current_contract_address(),
                &receiver,
                &amount,
            );
        }

        let event = WithdrawEvent {
            caller,
            receiver: receiver.clone(),
            owner: owner.clone(),
            amount,
        };
        env.events().publish((symbol_short!("withdraw"),), event);

        log!(&env, "Withdrew {} from stream of {} to {}", amount, owner, receiver);

        Ok(amount)
    }

    pub fn transfer(env: Env, from: Address, to: Address, amount: i128) -> Result<bool, StakingError> {
        from.require_auth();
        Self::move_balance(&env, &from, &to, amount)?;
        Ok(true)
    }

    pub fn transfer_from(
        env: Env,
        spender: Address,
        from: Address,
        to: Address,
        amount: i128,
    ) -> Result<bool, StakingError> {
        spender.require_auth();
        Self::get_config(&env)?;
        Self::spend_allowance(&env, &from, &spender, amount)?;
        Self::move_balance(&env, &from, &to, amount)?;
        Ok(true)
    }

    /// Set the share allowance of `spender`. `i128::MAX` is never decremented.
    pub fn approve(env: Env, owner: Address, spender: Address, amount: i128) -> Result<bool, StakingError> {
        owner.require_auth();
        Self::get_config(&env)?;

        if amount < 0 {
            return Err(StakingError::InvalidAmount);
        }

        env.storage()
            .persistent()
            .set(&DataKey::Allowance(owner.clone(), spender.clone()), &amount);

        let event = ApprovalEvent {
            owner,
            spender,
            amount,
        };
        env.events().publish((symbol_short!("approve"),), event);

        Ok(true)
    }

    /// Lock the caller's stake for `duration` (defaults to the maximum). The
    /// lock only ever grows and earns vote weight credit for the time added.
    pub fn lock(env: Env, account: Address, duration: Option<u64>) -> Result<u64, StakingError> {
        account.require_auth();
        Self::get_config(&env)?;

        let now = env.ledger().timestamp();
        let mut history = Self::weight_history(&env, &account);
        let unlock_time = history.extend_lock(
            now,
            Self::unlock_time(env.clone(), account.clone()),
            duration.unwrap_or(MAX_LOCK),
        )?;

        Self::set_weight_history(&env, &account, &history);
        env.storage()
            .persistent()
            .set(&DataKey::UnlockTime(account.clone()), &unlock_time);

        let event = LockEvent {
            account: account.clone(),
            unlock_time,
            timestamp: now,
        };
        env.events().publish((symbol_short!("lock"),), event);

        log!(&env, "Locked stake of {} until {}", account, unlock_time);

        Ok(unlock_time)
    }

    /// Point the ledger at a rewards distributor, or detach it with `None`
    pub fn set_rewards(env: Env, caller: Address, rewards: Option<Address>) -> Result<(), StakingError> {
        let mut config = Self::get_config(&env)?;
        management::require_management(&env, &caller)?;

        config.rewards = rewards.clone();
        env.storage().instance().set(&DataKey::Config, &config);

        env.events()
            .publish((symbol_short!("set_rwds"),), RewardsUpdatedEvent { rewards });

        Ok(())
    }

    pub fn set_management(env: Env, caller: Address, pending: Option<Address>) -> Result<(), StakingError> {
        Self::get_config(&env)?;
        management::set_management(&env, &caller, pending)?;
        Ok(())
    }

    pub fn accept_management(env: Env, caller: Address) -> Result<(), StakingError> {
        Self::get_config(&env)?;
        management::accept_management(&env, &caller)?;
        Ok(())
    }

    // View functions
    pub fn balance_of(env: Env, account: Address) -> i128 {
        env.storage()
            .persistent()
            .get(&DataKey::Balance(account))
            .unwrap_or(0)
    }

    pub fn total_supply(env: Env) -> i128 {
        env.storage()
            .instance()
            .get(&DataKey::TotalSupply)
            .unwrap_or(0)
    }

    pub fn allowance(env: Env, owner: Address, spender: Address) -> i128 {
        env.storage()
            .persistent()
            .get(&DataKey::Allowance(owner, spender))
            .unwrap_or(0)
    }

    pub fn name(env: Env) -> String {
        String::from_str(&env, "Staked Liquid Locker")
    }

    pub fn symbol(env: Env) -> String {
        String::from_str(&env, "stLL")
    }

    pub fn decimals(env: Env) -> Result<u32, StakingError> {
        let config = Self::get_config(&env)?;
        Ok(token::Client::new(&env, &config.asset).decimals())
    }

    pub fn asset(env: Env) -> Result<Address, StakingError> {
        Ok(Self::get_config(&env)?.asset)
    }

    pub fn rewards(env: Env) -> Result<Option<Address>, StakingError> {
        Ok(Self::get_config(&env)?.rewards)
    }

    pub fn management(env: Env) -> Option<Address> {
        management::management(&env)
    }

    pub fn pending_management(env: Env) -> Option<Address> {
        management::pending_management(&env)
    }

    /// Assets backing the shares. Unstaked funds still in a stream are not counted.
    pub fn total_assets(env: Env) -> i128 {
        Self::total_supply(env)
    }

    pub fn convert_to_shares(_env: Env, assets: i128) -> i128 {
        assets
    }

    pub fn convert_to_assets(_env: Env, shares: i128) -> i128 {
        shares
    }

    pub fn preview_deposit(_env: Env, assets: i128) -> i128 {
        assets
    }

    pub fn preview_withdraw(_env: Env, assets: i128) -> i128 {
        assets
    }

    pub fn max_deposit(_env: Env, _receiver: Address) -> i128 {
        i128::MAX
    }

    pub fn unlock_time(env: Env, account: Address) -> u64 {
        env.storage()
            .persistent()
            .get(&DataKey::UnlockTime(account))
            .unwrap_or(0)
    }

    pub fn stream(env: Env, account: Address) -> WithdrawalStream {
        env.storage()
            .persistent()
            .get(&DataKey::Stream(account))
            .unwrap_or_default()
    }

    /// Amount of `account`'s stream released so far and not yet withdrawn
    pub fn max_withdraw(env: Env, account: Address) -> i128 {
        let stream = Self::stream(env.clone(), account);
        if stream.total <= 0 {
            return 0;
        }

        let elapsed = env.ledger().timestamp().saturating_sub(stream.start).min(WEEK);
        let released = stream.total * elapsed as i128 / WEEK as i128;
        (released - stream.claimed).max(0)
    }

    pub fn vote_weight(env: Env, account: Address) -> i128 {
        Self::weight_history(&env, &account).vote_weight(env.ledger().timestamp())
    }

    pub fn weight_record(env: Env, account: Address) -> WeightRecord {
        Self::weight_history(&env, &account).current
    }

    pub fn previous_weight_record(env: Env, account: Address) -> WeightRecord {
        Self::weight_history(&env, &account).previous
    }

    // Helper functions
    fn get_config(env: &Env) -> Result<StakingConfig, StakingError> {
        env.storage()
            .instance()
            .get(&DataKey::Config)
            .ok_or(StakingError::NotInitialized)
    }

    fn weight_history(env: &Env, account: &Address) -> WeightHistory {
        env.storage()
            .persistent()
            .get(&DataKey::Weight(account.clone()))
            .unwrap_or_default()
    }

    fn set_weight_history(env: &Env, account: &Address, history: &WeightHistory) {
        env.storage()
            .persistent()
            .set(&DataKey::Weight(account.clone()), history);
    }

    fn set_balance(env: &Env, account: &Address, balance: i128) {
        env.storage()
            .persistent()
            .set(&DataKey::Balance(account.clone()), &balance);
    }

    fn spend_allowance(
        env: &Env,
        owner: &Address,
        spender: &Address,
        amount: i128,
    ) -> Result<(), StakingError> {
        let allowance = Self::allowance(env.clone(), owner.clone(), spender.clone());
        if allowance == UNLIMITED_ALLOWANCE {
            return Ok(());
        }
        if allowance < amount {
            return Err(StakingError::InsufficientAllowance);
        }

        env.storage().persistent().set(
            &DataKey::Allowance(owner.clone(), spender.clone()),
            &(allowance - amount),
        );
        Ok(())
    }

    /// Settle both sides with the rewards distributor, then move shares and
    /// the vote weight that comes with them.
    fn move_balance(env: &Env, from: &Address, to: &Address, amount: i128) -> Result<(), StakingError> {
        let config = Self::get_config(env)?;

        if amount < 0 {
            return Err(StakingError::InvalidAmount);
        }

        let now = env.ledger().timestamp();
        if Self::unlock_time(env.clone(), from.clone()) > now {
            return Err(StakingError::Locked);
        }

        let from_balance = Self::balance_of(env.clone(), from.clone());
        if amount > from_balance {
            return Err(StakingError::InsufficientBalance);
        }

        let supply = Self::total_supply(env.clone());
        let to_balance = Self::balance_of(env.clone(), to.clone());
        Self::report(env, &config, from, from_balance, supply);
        if from != to {
            Self::report(env, &config, to, to_balance, supply);
        }

        if from != to && amount > 0 {
            let mut from_history = Self::weight_history(env, from);
            from_history.remove(now, amount)?;
            Self::set_weight_history(env, from, &from_history);

            let mut to_history = Self::weight_history(env, to);
            to_history.add(now, Self::unlock_time(env.clone(), to.clone()), amount)?;
            Self::set_weight_history(env, to, &to_history);

            Self::set_balance(env, from, from_balance - amount);
            Self::set_balance(
                env,
                to,
                to_balance
                    .checked_add(amount)
                    .ok_or(StakingError::NumericOverflow)?,
            );
        }

        let event = TransferEvent {
            from: from.clone(),
            to: to.clone(),
            amount,
        };
        env.events().publish((symbol_short!("transfer"),), event);

        Ok(())
    }

    fn report(env: &Env, config: &StakingConfig, account: &Address, balance: i128, supply: i128) {
        if let Some(rewards) = &config.rewards {
            RewardsHookClient::new(env, rewards).report(
                &env.current_contract_address(),
                account,
                &balance,
                &supply,
            );
        }
    }
}

#[cfg(test)]
mod test;
