#![no_std]
use locker_shared::{
    accrued,
    management::{self, AccessError},
    per_share, skim, validate_fee_rate, GaugeRedeemerClient, MathError, RegistryClient,
};
use soroban_sdk::{
    contract, contracterror, contractimpl, contracttype, log, symbol_short, token, Address, Bytes,
    Env, Vec,
};

/// Fee categories, indexed by `set_fee_rate`
pub const HARVEST_FEE_IDX: u32 = 0;
pub const FEE_IDX: u32 = 1;
pub const REDEEM_SELL_FEE_IDX: u32 = 2;
pub const REDEEM_FEE_IDX: u32 = 3;
pub const FEE_TYPES: u32 = 4;

// Data Types
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GaugeRewardsConfig {
    pub reward_token: Address,
    pub registry: Address,
    pub native_token: Address,
    pub treasury: Address,
    pub redeemer: Option<Address>,
}

/// Deposits tracked for one gauge and its reward-per-share integral
#[contracttype]
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct GaugeState {
    pub supply: i128,
    pub integral: i128,
}

#[contracttype]
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Position {
    pub balance: i128,
    pub integral: i128,
}

// Storage Keys
#[contracttype]
pub enum DataKey {
    Config,
    FeeRate(u32),
    PendingFees,
    Gauge(Address),
    Position(Address, Address),
    Pending(Address),
}

// Error Types
#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum GaugeRewardError {
    NotInitialized = 1,
    AlreadyInitialized = 2,
    Unauthorized = 3,
    InvalidAmount = 4,
    NothingToReport = 5,
    InvalidTransfer = 6,
    GaugeNotRegistered = 7,
    InsufficientBalance = 8,
    InsufficientRewards = 9,
    NoRedeemer = 10,
    InvalidFeeIndex = 11,
    FeeTooHigh = 12,
    LengthMismatch = 13,
    NumericOverflow = 14,
}

impl From<AccessError> for GaugeRewardError {
    fn from(_: AccessError) -> Self {
        GaugeRewardError::Unauthorized
    }
}

impl From<MathError> for GaugeRewardError {
    fn from(_: MathError) -> Self {
        GaugeRewardError::NumericOverflow
    }
}

// Events
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReportEvent {
    pub gauge: Address,
    pub from: Option<Address>,
    pub to: Option<Address>,
    pub amount: i128,
    pub rewards: i128,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HarvestEvent {
    pub gauge: Address,
    pub amount: i128,
    pub fee: i128,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClaimEvent {
    pub account: Address,
    pub receiver: Address,
    pub amount: i128,
    pub fee: i128,
    pub redeemed: bool,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FeesClaimedEvent {
    pub treasury: Address,
    pub amount: i128,
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

/// Distributes a single reward token across many gauges. Each gauge reports
/// its own deposits, withdrawals and transfers, and rewards are credited to
/// the gauge's depositors the moment they arrive.
#[contract]
pub struct GaugeRewardsContract;

#[contractimpl]
impl GaugeRewardsContract {
    pub fn initialize(
        env: Env,
        management: Address,
        reward_token: Address,
        registry: Address,
        native_token: Address,
    ) -> Result<(), GaugeRewardError> {
        if env.storage().instance().has(&DataKey::Config) {
            return Err(GaugeRewardError::AlreadyInitialized);
        }

        management.require_auth();

        let config = GaugeRewardsConfig {
            reward_token,
            registry,
            native_token,
            treasury: management.clone(),
            redeemer: None,
        };

        env.storage().instance().set(&DataKey::Config, &config);
        management::init(&env, &management);

        log!(&env, "Gauge rewards initialized by management: {}", management);

        Ok(())
    }

    /// Called by `gauge` on every deposit (`from` is none), withdrawal (`to` is
    /// none) or transfer, optionally carrying `rewards` that it pulled from
    /// `external_gauge`. Rewards are distributed over the supply before the
    /// balances move and are skipped while the gauge has no deposits.
    pub fn report(
        env: Env,
        gauge: Address,
        external_gauge: Address,
        from: Option<Address>,
        to: Option<Address>,
        amount: i128,
        rewards: i128,
    ) -> Result<(), GaugeRewardError> {
        gauge.require_auth();
        let config = Self::get_config(&env)?;

        if amount < 0 || rewards < 0 {
            return Err(GaugeRewardError::InvalidAmount);
        }
        if amount == 0 && rewards == 0 {
            return Err(GaugeRewardError::NothingToReport);
        }
        if amount > 0 && from == to {
            return Err(GaugeRewardError::InvalidTransfer);
        }

        // only new deposits need a live registration
        if amount > 0 && from.is_none() {
            let mapped = RegistryClient::new(&env, &config.registry).gauge_map(&external_gauge);
            if mapped != Some(gauge.clone()) {
                return Err(GaugeRewardError::GaugeNotRegistered);
            }
        }

        let mut state = Self::gauge_supply_state(&env, &gauge);

        if rewards > 0 && state.supply > 0 {
            let reward_token = token::Client::new(&env, &config.reward_token);
            if reward_token.balance(&gauge) < rewards {
                return Err(GaugeRewardError::InsufficientRewards);
            }
            let this = env.current_contract_address();
            reward_token.transfer_from(&this, &gauge, &this, &rewards);

            state.integral = state
                .integral
                .checked_add(per_share(rewards, state.supply)?)
                .ok_or(GaugeRewardError::NumericOverflow)?;
        }

        if amount > 0 {
            if let Some(account) = &from {
                let mut position = Self::settle(&env, &gauge, &state, account)?;
                if position.balance < amount {
                    return Err(GaugeRewardError::InsufficientBalance);
                }
                position.balance -= amount;
                Self::set_position(&env, &gauge, account, &position);
            } else {
                state.supply = state
                    .supply
                    .checked_add(amount)
                    .ok_or(GaugeRewardError::NumericOverflow)?;
            }

            if let Some(account) = &to {
                let mut position = Self::settle(&env, &gauge, &state, account)?;
                position.balance = position
                    .balance
                    .checked_add(amount)
                    .ok_or(GaugeRewardError::NumericOverflow)?;
                Self::set_position(&env, &gauge, account, &position);
            } else {
                state.supply -= amount;
            }
        }

        env.storage()
            .persistent()
            .set(&DataKey::Gauge(gauge.clone()), &state);

        let event = ReportEvent {
            gauge,
            from,
            to,
            amount,
            rewards,
        };
        env.events().publish((symbol_short!("report"),), event);

        Ok(())
    }

    /// Pull rewards that accumulated in `gauges`. Gauges without deposits are
    /// skipped. The harvest fee goes to `receiver` (defaults to the caller) and
    /// the total fee is returned.
    pub fn harvest(
        env: Env,
        caller: Address,
        gauges: Vec<Address>,
        amounts: Vec<i128>,
        receiver: Option<Address>,
    ) -> Result<i128, GaugeRewardError> {
        caller.require_auth();
        let config = Self::get_config(&env)?;

        if gauges.len() != amounts.len() {
            return Err(GaugeRewardError::LengthMismatch);
        }

        let reward_token = token::Client::new(&env, &config.reward_token);
        let this = env.current_contract_address();
        let rate = Self::fee_rate(env.clone(), HARVEST_FEE_IDX);
        let mut total_fee: i128 = 0;

        for (gauge, amount) in gauges.iter().zip(amounts.iter()) {
            if amount < 0 {
                return Err(GaugeRewardError::InvalidAmount);
            }

            let mut state = Self::gauge_supply_state(&env, &gauge);
            if amount == 0 || state.supply == 0 {
                continue;
            }
            if reward_token.balance(&gauge) < amount {
                return Err(GaugeRewardError::InsufficientRewards);
            }

            reward_token.transfer_from(&this, &gauge, &this, &amount);

            let (net, fee) = skim(amount, rate)?;
            state.integral = state
                .integral
                .checked_add(per_share(net, state.supply)?)
                .ok_or(GaugeRewardError::NumericOverflow)?;
            env.storage()
                .persistent()
                .set(&DataKey::Gauge(gauge.clone()), &state);

            total_fee = total_fee
                .checked_add(fee)
                .ok_or(GaugeRewardError::NumericOverflow)?;

            env.events()
                .publish((symbol_short!("harvest"),), HarvestEvent { gauge, amount, fee });
        }

        if total_fee > 0 {
            let receiver = receiver.unwrap_or_else(|| caller.clone());
            reward_token.transfer(&this, &receiver, &total_fee);
        }

        log!(&env, "Harvest by {} paid {} in fees", caller, total_fee);

        Ok(total_fee)
    }

    /// Claim everything `account` earned in `gauges` plus earlier settled
    /// rewards. Non-empty `data` or a positive `value` routes the claim through
    /// the redeemer and returns its output.
    pub fn claim(
        env: Env,
        account: Address,
        gauges: Vec<Address>,
        receiver: Option<Address>,
        data: Bytes,
        value: i128,
    ) -> Result<i128, GaugeRewardError> {
        account.require_auth();
        let config = Self::get_config(&env)?;

        if value < 0 {
            return Err(GaugeRewardError::InvalidAmount);
        }

        let redeem = !data.is_empty() || value > 0;
        if redeem && config.redeemer.is_none() {
            return Err(GaugeRewardError::NoRedeemer);
        }

        for gauge in gauges.iter() {
            let state = Self::gauge_supply_state(&env, &gauge);
            let position = Self::settle(&env, &gauge, &state, &account)?;
            Self::set_position(&env, &gauge, &account, &position);
        }

        let amount = Self::pending(env.clone(), account.clone());
        env.storage()
            .persistent()
            .set(&DataKey::Pending(account.clone()), &0i128);

        let index = if !redeem {
            FEE_IDX
        } else if value > 0 {
            REDEEM_FEE_IDX
        } else {
            REDEEM_SELL_FEE_IDX
        };
        let (net, fee) = skim(amount, Self::fee_rate(env.clone(), index))?;
        if fee > 0 {
            let fees = Self::pending_fees(env.clone())
                .checked_add(fee)
                .ok_or(GaugeRewardError::NumericOverflow)?;
            env.storage().instance().set(&DataKey::PendingFees, &fees);
        }

        let receiver = receiver.unwrap_or_else(|| account.clone());
        let result = match (&config.redeemer, redeem) {
            (Some(redeemer), true) => {
                if net > 0 {
                    token::Client::new(&env, &config.reward_token).transfer(
                        &env.current_contract_address(),
                        redeemer,
                        &net,
                    );
                }
                if value > 0 {
                    token::Client::new(&env, &config.native_token).transfer(
                        &account,
                        redeemer,
                        &value,
                    );
                }
                GaugeRedeemerClient::new(&env, redeemer).redeem(
                    &account,
                    &receiver,
                    &net,
                    &value,
                    &data,
                )
            }
            _ => {
                if net > 0 {
                    token::Client::new(&env, &config.reward_token).transfer(
                        &env.current_contract_address(),
                        &receiver,
                        &net,
                    );
                }
                net
            }
        };

        let event = ClaimEvent {
            account: account.clone(),
            receiver: receiver.clone(),
            amount,
            fee,
            redeemed: redeem,
        };
        env.events().publish((symbol_short!("claim"),), event);

        log!(&env, "Rewards of {} claimed to {}", account, receiver);

        Ok(result)
    }

    /// Send accumulated claim fees to the treasury
    pub fn claim_fees(env: Env) -> Result<i128, GaugeRewardError> {
        let config = Self::get_config(&env)?;
        let fees = Self::pending_fees(env.clone());
        env.storage().instance().set(&DataKey::PendingFees, &0i128);

        if fees > 0 {
            token::Client::new(&env, &config.reward_token).transfer(
                &env.current_contract_address(),
                &config.treasury,
                &fees,
            );
        }

        let event = FeesClaimedEvent {
            treasury: config.treasury,
            amount: fees,
        };
        env.events().publish((symbol_short!("fees"),), event);

        Ok(fees)
    }

    pub fn set_fee_rate(env: Env, caller: Address, index: u32, rate: u32) -> Result<(), GaugeRewardError> {
        Self::get_config(&env)?;
        management::require_management(&env, &caller)?;

        if index >= FEE_TYPES {
            return Err(GaugeRewardError::InvalidFeeIndex);
        }
        if !validate_fee_rate(rate) {
            return Err(GaugeRewardError::FeeTooHigh);
        }

        env.storage().instance().set(&DataKey::FeeRate(index), &rate);
        env.events()
            .publish((symbol_short!("fee_rate"),), FeeRateEvent { index, rate });

        Ok(())
    }

    pub fn set_treasury(env: Env, caller: Address, treasury: Address) -> Result<(), GaugeRewardError> {
        let mut config = Self::get_config(&env)?;
        management::require_management(&env, &caller)?;

        config.treasury = treasury.clone();
        env.storage().instance().set(&DataKey::Config, &config);
        env.events()
            .publish((symbol_short!("treasury"),), TreasuryEvent { treasury });

        Ok(())
    }

    /// Replace the redeemer. Claims that redeem hand their tokens to it.
    pub fn set_redeemer(
        env: Env,
        caller: Address,
        redeemer: Option<Address>,
    ) -> Result<(), GaugeRewardError> {
        let mut config = Self::get_config(&env)?;
        management::require_management(&env, &caller)?;

        config.redeemer = redeemer.clone();
        env.storage().instance().set(&DataKey::Config, &config);
        env.events()
            .publish((symbol_short!("redeemer"),), RedeemerEvent { redeemer });

        Ok(())
    }

    pub fn set_management(
        env: Env,
        caller: Address,
        pending: Option<Address>,
    ) -> Result<(), GaugeRewardError> {
        Self::get_config(&env)?;
        management::set_management(&env, &caller, pending)?;
        Ok(())
    }

    pub fn accept_management(env: Env, caller: Address) -> Result<(), GaugeRewardError> {
        Self::get_config(&env)?;
        management::accept_management(&env, &caller)?;
        Ok(())
    }

    // View functions
    pub fn gauge_supply(env: Env, gauge: Address) -> i128 {
        Self::gauge_supply_state(&env, &gauge).supply
    }

    pub fn gauge_integral(env: Env, gauge: Address) -> i128 {
        Self::gauge_supply_state(&env, &gauge).integral
    }

    pub fn gauge_balance(env: Env, gauge: Address, account: Address) -> i128 {
        Self::position(&env, &gauge, &account).balance
    }

    pub fn account_integral(env: Env, gauge: Address, account: Address) -> i128 {
        Self::position(&env, &gauge, &account).integral
    }

    /// Settled rewards of `account` across all gauges
    pub fn pending(env: Env, account: Address) -> i128 {
        env.storage()
            .persistent()
            .get(&DataKey::Pending(account))
            .unwrap_or(0)
    }

    /// Rewards of `account` in `gauge` that are not settled yet
    pub fn claimable(env: Env, gauge: Address, account: Address) -> Result<i128, GaugeRewardError> {
        let state = Self::gauge_supply_state(&env, &gauge);
        let position = Self::position(&env, &gauge, &account);
        Ok(accrued(state.integral, position.integral, position.balance)?)
    }

    pub fn pending_fees(env: Env) -> i128 {
        env.storage()
            .instance()
            .get(&DataKey::PendingFees)
            .unwrap_or(0)
    }

    pub fn fee_rate(env: Env, index: u32) -> u32 {
        env.storage()
            .instance()
            .get(&DataKey::FeeRate(index))
            .unwrap_or(0)
    }

    pub fn treasury(env: Env) -> Result<Address, GaugeRewardError> {
        Ok(Self::get_config(&env)?.treasury)
    }

    pub fn redeemer(env: Env) -> Result<Option<Address>, GaugeRewardError> {
        Ok(Self::get_config(&env)?.redeemer)
    }

    pub fn registry(env: Env) -> Result<Address, GaugeRewardError> {
        Ok(Self::get_config(&env)?.registry)
    }

    pub fn management(env: Env) -> Option<Address> {
        management::management(&env)
    }

    pub fn pending_management(env: Env) -> Option<Address> {
        management::pending_management(&env)
    }

    // Helper functions
    fn get_config(env: &Env) -> Result<GaugeRewardsConfig, GaugeRewardError> {
        env.storage()
            .instance()
            .get(&DataKey::Config)
            .ok_or(GaugeRewardError::NotInitialized)
    }

    fn gauge_supply_state(env: &Env, gauge: &Address) -> GaugeState {
        env.storage()
            .persistent()
            .get(&DataKey::Gauge(gauge.clone()))
            .unwrap_or_default()
    }

    fn position(env: &Env, gauge: &Address, account: &Address) -> Position {
        env.storage()
            .persistent()
            .get(&DataKey::Position(gauge.clone(), account.clone()))
            .unwrap_or_default()
    }

    fn set_position(env: &Env, gauge: &Address, account: &Address, position: &Position) {
        env.storage()
            .persistent()
            .set(&DataKey::Position(gauge.clone(), account.clone()), position);
    }

    /// Move what `account` earned in `gauge` into its pending rewards and
    /// return the position snapshotted at the current integral.
    fn settle(
        env: &Env,
        gauge: &Address,
        state: &GaugeState,
        account: &Address,
    ) -> Result<Position, GaugeRewardError> {
        let mut position = Self::position(env, gauge, account);
        let earned = accrued(state.integral, position.integral, position.balance)?;
        if earned > 0 {
            let pending = Self::pending(env.clone(), account.clone())
                .checked_add(earned)
                .ok_or(GaugeRewardError::NumericOverflow)?;
            env.storage()
                .persistent()
                .set(&DataKey::Pending(account.clone()), &pending);
        }
        position.integral = state.integral;
        Ok(position)
    }
}
