#![no_std]
use locker_shared::{
    management::{self, AccessError},
    skim, validate_fee_rate, LedgerClient, MathError, StakingRedeemerClient,
};
use soroban_sdk::{
    contract, contracterror, contractimpl, contracttype, log, symbol_short, token, Address, Bytes,
    Env,
};

mod stream;

pub use stream::{AccountRewards, Distribution, RewardStream, TokenPair};

/// Fee categories, indexed by `set_fee_rate`
pub const HARVEST_FEE_IDX: u32 = 0;
pub const DT_FEE_IDX: u32 = 1;
pub const DT_REDEEM_SELL_FEE_IDX: u32 = 2;
pub const DT_REDEEM_FEE_IDX: u32 = 3;
pub const LT_FEE_IDX: u32 = 4;
pub const LT_REDEEM_FEE_IDX: u32 = 5;
pub const FEE_TYPES: u32 = 6;

// Data Types
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RewardsConfig {
    pub ledger: Address,
    pub custody: Address,
    pub locking_token: Address,
    pub discount_token: Address,
    pub native_token: Address,
    pub treasury: Address,
    pub redeemer: Option<Address>,
}

// Storage Keys
#[contracttype]
pub enum DataKey {
    Config,
    Distribution,
    FeeRate(u32),
    PendingFees,
    Account(Address),
}

// Error Types
#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum RewardError {
    NotInitialized = 1,
    AlreadyInitialized = 2,
    Unauthorized = 3,
    InvalidAmount = 4,
    NoSupply = 5,
    InsufficientCustody = 6,
    NoRedeemer = 7,
    InvalidFeeIndex = 8,
    FeeTooHigh = 9,
    NumericOverflow = 10,
}

impl From<AccessError> for RewardError {
    fn from(_: AccessError) -> Self {
        RewardError::Unauthorized
    }
}

impl From<MathError> for RewardError {
    fn from(_: MathError) -> Self {
        RewardError::NumericOverflow
    }
}

// Events
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HarvestEvent {
    pub caller: Address,
    pub locking_amount: i128,
    pub discount_amount: i128,
    pub locking_fee: i128,
    pub discount_fee: i128,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClaimEvent {
    pub account: Address,
    pub receiver: Address,
    pub locking_amount: i128,
    pub discount_amount: i128,
    pub redeemed: bool,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FeesClaimedEvent {
    pub treasury: Address,
    pub locking_amount: i128,
    pub discount_amount: i128,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FeeRateEvent {
    pub index: u32,
    pub rate: u32,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TreasuryEvent {
    pub treasury: Address,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RedeemerEvent {
    pub redeemer: Option<Address>,
}

/// Streams harvested locking and discount token rewards to stakers of the
/// ledger. A harvest is queued for the following week and then released
/// linearly over that week.
#[contract]
pub struct StakingRewardsContract;

#[contractimpl]
impl StakingRewardsContract {
    pub fn initialize(
        env: Env,
        management: Address,
        ledger: Address,
        custody: Address,
        locking_token: Address,
        discount_token: Address,
        native_token: Address,
    ) -> Result<(), RewardError> {
        if env.storage().instance().has(&DataKey::Config) {
            return Err(RewardError::AlreadyInitialized);
        }

        management.require_auth();

        let config = RewardsConfig {
            ledger,
            custody,
            locking_token,
            discount_token,
            native_token,
            treasury: management.clone(),
            redeemer: None,
        };

        env.storage().instance().set(&DataKey::Config, &config);
        env.storage()
            .instance()
            .set(&DataKey::Distribution, &Distribution::default());
        management::init(&env, &management);

        log!(&env, "Staking rewards initialized by management: {}", management);

        Ok(())
    }

    /// Balance hook called by the ledger before `account`'s balance changes.
    /// `balance` and `supply` are the values before the change.
    pub fn report(
        env: Env,
        ledger: Address,
        account: Address,
        balance: i128,
        supply: i128,
    ) -> Result<(), RewardError> {
        let config = Self::get_config(&env)?;
        if ledger != config.ledger {
            return Err(RewardError::Unauthorized);
        }
        ledger.require_auth();

        let mut dist = Self::distribution(&env);
        dist.sync(env.ledger().timestamp(), supply)?;
        Self::settle(&env, &dist, &account, balance)?;
        env.storage().instance().set(&DataKey::Distribution, &dist);

        Ok(())
    }

    /// Pull rewards from custody and queue them for next week's stream.
    /// The harvest fee on each token goes to `receiver` (defaults to the caller).
    pub fn harvest(
        env: Env,
        caller: Address,
        locking_amount: i128,
        discount_amount: i128,
        receiver: Option<Address>,
    ) -> Result<(i128, i128), RewardError> {
        caller.require_auth();
        let config = Self::get_config(&env)?;

        if locking_amount < 0
            || discount_amount < 0
            || (locking_amount == 0 && discount_amount == 0)
        {
            return Err(RewardError::InvalidAmount);
        }

        let supply = LedgerClient::new(&env, &config.ledger).total_supply();
        if supply <= 0 {
            return Err(RewardError::NoSupply);
        }

        let locking = token::Client::new(&env, &config.locking_token);
        let discount = token::Client::new(&env, &config.discount_token);
        if locking.balance(&config.custody) < locking_amount
            || discount.balance(&config.custody) < discount_amount
        {
            return Err(RewardError::InsufficientCustody);
        }

        let mut dist = Self::distribution(&env);
        dist.sync(env.ledger().timestamp(), supply)?;

        let this = env.current_contract_address();
        let rate = Self::fee_rate(env.clone(), HARVEST_FEE_IDX);
        let (locking_net, locking_fee) = skim(locking_amount, rate)?;
        let (discount_net, discount_fee) = skim(discount_amount, rate)?;

        if locking_amount > 0 {
            locking.transfer_from(&this, &config.custody, &this, &locking_amount);
        }
        if discount_amount > 0 {
            discount.transfer_from(&this, &config.custody, &this, &discount_amount);
        }

        dist.queue(&TokenPair::new(locking_net, discount_net))?;
        env.storage().instance().set(&DataKey::Distribution, &dist);

        let receiver = receiver.unwrap_or_else(|| caller.clone());
        if locking_fee > 0 {
            locking.transfer(&this, &receiver, &locking_fee);
        }
        if discount_fee > 0 {
            discount.transfer(&this, &receiver, &discount_fee);
        }

        let event = HarvestEvent {
            caller: caller.clone(),
            locking_amount,
            discount_amount,
            locking_fee,
            discount_fee,
        };
        env.events().publish((symbol_short!("harvest"),), event);

        log!(
            &env,
            "Harvested {} locking and {} discount tokens by {}",
            locking_amount,
            discount_amount,
            caller
        );

        Ok((locking_fee, discount_fee))
    }

    /// Release streamed rewards up to now
    pub fn sync(env: Env) -> Result<(), RewardError> {
        let config = Self::get_config(&env)?;
        let supply = LedgerClient::new(&env, &config.ledger).total_supply();

        let mut dist = Self::distribution(&env);
        dist.sync(env.ledger().timestamp(), supply)?;
        env.storage().instance().set(&DataKey::Distribution, &dist);

        Ok(())
    }

    /// Claim all rewards of `account`. With non-empty `data` or a positive
    /// `value` both tokens are handed to the redeemer and its output is
    /// returned as `(output, 0)`, otherwise the net tokens go to `receiver`.
    pub fn claim(
        env: Env,
        account: Address,
        receiver: Option<Address>,
        data: Bytes,
        value: i128,
    ) -> Result<(i128, i128), RewardError> {
        account.require_auth();
        let config = Self::get_config(&env)?;

        if value < 0 {
            return Err(RewardError::InvalidAmount);
        }

        let redeem = !data.is_empty() || value > 0;
        if redeem && config.redeemer.is_none() {
            return Err(RewardError::NoRedeemer);
        }

        let ledger = LedgerClient::new(&env, &config.ledger);
        let mut dist = Self::distribution(&env);
        dist.sync(env.ledger().timestamp(), ledger.total_supply())?;
        let mut rewards = Self::settle(&env, &dist, &account, ledger.balance_of(&account))?;
        env.storage().instance().set(&DataKey::Distribution, &dist);

        let amounts = rewards.pending.clone();
        rewards.pending = TokenPair::default();
        env.storage()
            .persistent()
            .set(&DataKey::Account(account.clone()), &rewards);

        let receiver = receiver.unwrap_or_else(|| account.clone());

        let (locking_rate, discount_rate) = if redeem {
            let discount_idx = if value > 0 {
                DT_REDEEM_FEE_IDX
            } else {
                DT_REDEEM_SELL_FEE_IDX
            };
            (
                Self::fee_rate(env.clone(), LT_REDEEM_FEE_IDX),
                Self::fee_rate(env.clone(), discount_idx),
            )
        } else {
            (
                Self::fee_rate(env.clone(), LT_FEE_IDX),
                Self::fee_rate(env.clone(), DT_FEE_IDX),
            )
        };

        let (locking_net, locking_fee) = skim(amounts.locking, locking_rate)?;
        let (discount_net, discount_fee) = skim(amounts.discount, discount_rate)?;
        Self::add_pending_fees(&env, &TokenPair::new(locking_fee, discount_fee))?;

        let result = if redeem {
            let redeemer = config.redeemer.clone().ok_or(RewardError::NoRedeemer)?;
            let this = env.current_contract_address();
            if locking_net > 0 {
                token::Client::new(&env, &config.locking_token).transfer(&this, &redeemer, &locking_net);
            }
            if discount_net > 0 {
                token::Client::new(&env, &config.discount_token).transfer(
                    &this,
                    &redeemer,
                    &discount_net,
                );
            }
            if value > 0 {
                token::Client::new(&env, &config.native_token).transfer(&account, &redeemer, &value);
            }
            let output = StakingRedeemerClient::new(&env, &redeemer).redeem(
                &account,
                &receiver,
                &locking_net,
                &discount_net,
                &value,
                &data,
            );
            (output, 0)
        } else {
            let this = env.current_contract_address();
            if locking_net > 0 {
                token::Client::new(&env, &config.locking_token).transfer(&this, &receiver, &locking_net);
            }
            if discount_net > 0 {
                token::Client::new(&env, &config.discount_token).transfer(
                    &this,
                    &receiver,
                    &discount_net,
                );
            }
            (locking_net, discount_net)
        };

        let event = ClaimEvent {
            account: account.clone(),
            receiver: receiver.clone(),
            locking_amount: amounts.locking,
            discount_amount: amounts.discount,
            redeemed: redeem,
        };
        env.events().publish((symbol_short!("claim"),), event);

        log!(&env, "Rewards of {} claimed to {}", account, receiver);

        Ok(result)
    }

    /// Send accumulated claim fees to the treasury
    pub fn claim_fees(env: Env) -> Result<(i128, i128), RewardError> {
        let config = Self::get_config(&env)?;
        let fees = Self::pending_fee_pair(&env);
        env.storage()
            .instance()
            .set(&DataKey::PendingFees, &TokenPair::default());

        let this = env.current_contract_address();
        if fees.locking > 0 {
            token::Client::new(&env, &config.locking_token).transfer(
                &this,
                &config.treasury,
                &fees.locking,
            );
        }
        if fees.discount > 0 {
            token::Client::new(&env, &config.discount_token).transfer(
                &this,
                &config.treasury,
                &fees.discount,
            );
        }

        let event = FeesClaimedEvent {
            treasury: config.treasury,
            locking_amount: fees.locking,
            discount_amount: fees.discount,
        };
        env.events().publish((symbol_short!("fees"),), event);

        Ok((fees.locking, fees.discount))
    }

    pub fn set_fee_rate(env: Env, caller: Address, index: u32, rate: u32) -> Result<(), RewardError> {
        Self::get_config(&env)?;
        management::require_management(&env, &caller)?;

        if index >= FEE_TYPES {
            return Err(RewardError::InvalidFeeIndex);
        }
        if !validate_fee_rate(rate) {
            return Err(RewardError::FeeTooHigh);
        }

        env.storage().instance().set(&DataKey::FeeRate(index), &rate);
        env.events()
            .publish((symbol_short!("fee_rate"),), FeeRateEvent { index, rate });

        Ok(())
    }

    pub fn set_treasury(env: Env, caller: Address, treasury: Address) -> Result<(), RewardError> {
        let mut config = Self::get_config(&env)?;
        management::require_management(&env, &caller)?;

        config.treasury = treasury.clone();
        env.storage().instance().set(&DataKey::Config, &config);
        env.events()
            .publish((symbol_short!("treasury"),), TreasuryEvent { treasury });

        Ok(())
    }

    /// Replace the redeemer. Claims that redeem hand their tokens to it.
    pub fn set_redeemer(env: Env, caller: Address, redeemer: Option<Address>) -> Result<(), RewardError> {
        let mut config = Self::get_config(&env)?;
        management::require_management(&env, &caller)?;

        config.redeemer = redeemer.clone();
        env.storage().instance().set(&DataKey::Config, &config);
        env.events()
            .publish((symbol_short!("redeemer"),), RedeemerEvent { redeemer });

        Ok(())
    }

    pub fn set_management(env: Env, caller: Address, pending: Option<Address>) -> Result<(), RewardError> {
        Self::get_config(&env)?;
        management::set_management(&env, &caller, pending)?;
        Ok(())
    }

    pub fn accept_management(env: Env, caller: Address) -> Result<(), RewardError> {
        Self::get_config(&env)?;
        management::accept_management(&env, &caller)?;
        Ok(())
    }

    // View functions
    pub fn pending(env: Env, account: Address) -> (i128, i128) {
        let rewards = Self::account_rewards(&env, &account);
        (rewards.pending.locking, rewards.pending.discount)
    }

    /// Everything `account` could claim right now, including rewards the
    /// stream has released since the last sync.
    pub fn claimable(env: Env, account: Address) -> Result<(i128, i128), RewardError> {
        let config = Self::get_config(&env)?;
        let ledger = LedgerClient::new(&env, &config.ledger);

        let mut dist = Self::distribution(&env);
        dist.sync(env.ledger().timestamp(), ledger.total_supply())?;

        let mut rewards = Self::account_rewards(&env, &account);
        rewards.settle(&dist.integrals, ledger.balance_of(&account))?;
        Ok((rewards.pending.locking, rewards.pending.discount))
    }

    pub fn integrals(env: Env) -> TokenPair {
        Self::distribution(&env).integrals
    }

    pub fn account_integrals(env: Env, account: Address) -> TokenPair {
        Self::account_rewards(&env, &account).integrals
    }

    pub fn stream(env: Env) -> RewardStream {
        Self::distribution(&env).stream
    }

    pub fn next(env: Env) -> TokenPair {
        Self::distribution(&env).next
    }

    pub fn pending_fees(env: Env) -> (i128, i128) {
        let fees = Self::pending_fee_pair(&env);
        (fees.locking, fees.discount)
    }

    pub fn fee_rate(env: Env, index: u32) -> u32 {
        env.storage()
            .instance()
            .get(&DataKey::FeeRate(index))
            .unwrap_or(0)
    }

    pub fn treasury(env: Env) -> Result<Address, RewardError> {
        Ok(Self::get_config(&env)?.treasury)
    }

    pub fn redeemer(env: Env) -> Result<Option<Address>, RewardError> {
        Ok(Self::get_config(&env)?.redeemer)
    }

    pub fn ledger(env: Env) -> Result<Address, RewardError> {
        Ok(Self::get_config(&env)?.ledger)
    }

    pub fn management(env: Env) -> Option<Address> {
        management::management(&env)
    }

    pub fn pending_management(env: Env) -> Option<Address> {
        management::pending_management(&env)
    }

    // Helper functions
    fn get_config(env: &Env) -> Result<RewardsConfig, RewardError> {
        env.storage()
            .instance()
            .get(&DataKey::Config)
            .ok_or(RewardError::NotInitialized)
    }

    fn distribution(env: &Env) -> Distribution {
        env.storage()
            .instance()
            .get(&DataKey::Distribution)
            .unwrap_or_default()
    }

    fn account_rewards(env: &Env, account: &Address) -> AccountRewards {
        env.storage()
            .persistent()
            .get(&DataKey::Account(account.clone()))
            .unwrap_or_default()
    }

    fn settle(
        env: &Env,
        dist: &Distribution,
        account: &Address,
        balance: i128,
    ) -> Result<AccountRewards, RewardError> {
        let mut rewards = Self::account_rewards(env, account);
        rewards.settle(&dist.integrals, balance)?;
        env.storage()
            .persistent()
            .set(&DataKey::Account(account.clone()), &rewards);
        Ok(rewards)
    }

    fn pending_fee_pair(env: &Env) -> TokenPair {
        env.storage()
            .instance()
            .get(&DataKey::PendingFees)
            .unwrap_or_default()
    }

    fn add_pending_fees(env: &Env, fees: &TokenPair) -> Result<(), RewardError> {
        if fees.is_zero() {
            return Ok(());
        }
        let total = Self::pending_fee_pair(env).checked_add(fees)?;
        env.storage().instance().set(&DataKey::PendingFees, &total);
        Ok(())
    }
}
