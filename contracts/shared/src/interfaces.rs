use soroban_sdk::{contractclient, Address, Bytes, Env};

// ============================================================================
// Cross-Contract Interfaces
// ============================================================================

/// Read side of the staking ledger, used by the streaming distributor.
#[contractclient(name = "LedgerClient")]
pub trait LedgerInterface {
    fn balance_of(env: Env, account: Address) -> i128;
    fn total_supply(env: Env) -> i128;
}

/// Settlement hook the ledger invokes before any balance of `account` changes.
/// `balance` and `supply` are the values before the mutation.
#[contractclient(name = "RewardsHookClient")]
pub trait RewardsHookInterface {
    fn report(env: Env, ledger: Address, account: Address, balance: i128, supply: i128);
}

/// Gauge lookup consulted by the instant distributor.
#[contractclient(name = "RegistryClient")]
pub trait RegistryInterface {
    fn gauge_map(env: Env, external_gauge: Address) -> Option<Address>;
    fn is_deregistered(env: Env, gauge: Address) -> bool;
}

/// Converts the single gauge reward token into another asset.
/// The distributor transfers `amount` and `value` to the redeemer before calling it.
#[contractclient(name = "GaugeRedeemerClient")]
pub trait GaugeRedeemerInterface {
    fn redeem(
        env: Env,
        account: Address,
        receiver: Address,
        amount: i128,
        value: i128,
        data: Bytes,
    ) -> i128;
}

/// Converts both staking reward tokens into another asset. Both net amounts
/// are transferred to the redeemer before the call.
#[contractclient(name = "StakingRedeemerClient")]
pub trait StakingRedeemerInterface {
    fn redeem(
        env: Env,
        account: Address,
        receiver: Address,
        locking_amount: i128,
        discount_amount: i128,
        value: i128,
        data: Bytes,
    ) -> i128;
}
