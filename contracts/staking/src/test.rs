#![cfg(test)]
use super::*;
use locker_staking_rewards::{StakingRewardsContract, StakingRewardsContractClient};
use soroban_sdk::{
    testutils::{Address as _, Ledger},
    token::{StellarAssetClient, TokenClient},
    Bytes,
};

const UNIT: i128 = 10_000_000;
const WEEK_INDEX: u64 = 2_800;
const START: u64 = WEEK_INDEX * WEEK + WEEK / 2;

struct Setup<'a> {
    env: Env,
    management: Address,
    client: StakingContractClient<'a>,
    asset: TokenClient<'a>,
    asset_admin: StellarAssetClient<'a>,
}

fn create_test_contract<'a>() -> Setup<'a> {
    let env = Env::default();
    env.mock_all_auths();
    env.ledger().with_mut(|li| li.timestamp = START);

    let management = Address::generate(&env);
    let sac = env.register_stellar_asset_contract_v2(management.clone());
    let asset = TokenClient::new(&env, &sac.address());
    let asset_admin = StellarAssetClient::new(&env, &sac.address());

    let contract_id = env.register_contract(None, StakingContract);
    let client = StakingContractClient::new(&env, &contract_id);
    client.initialize(&management, &asset.address);

    Setup {
        env,
        management,
        client,
        asset,
        asset_admin,
    }
}

impl<'a> Setup<'a> {
    fn user(&self, funds: i128) -> Address {
        let user = Address::generate(&self.env);
        if funds > 0 {
            self.asset_admin.mint(&user, &funds);
        }
        user
    }

    fn staker(&self, amount: i128) -> Address {
        let user = self.user(amount);
        self.client.deposit(&user, &amount, &None);
        user
    }

    fn set_time(&self, timestamp: u64) {
        self.env.ledger().with_mut(|li| li.timestamp = timestamp);
    }
}

#[test]
fn test_initialize() {
    let s = create_test_contract();

    assert_eq!(s.client.asset(), s.asset.address);
    assert_eq!(s.client.management(), Some(s.management.clone()));
    assert_eq!(s.client.rewards(), None);
    assert_eq!(s.client.total_supply(), 0);
    assert_eq!(s.client.decimals(), 7);
    assert_eq!(
        s.client.try_initialize(&s.management, &s.asset.address),
        Err(Ok(StakingError::AlreadyInitialized))
    );
}

#[test]
fn test_not_initialized() {
    let env = Env::default();
    env.mock_all_auths();
    let contract_id = env.register_contract(None, StakingContract);
    let client = StakingContractClient::new(&env, &contract_id);
    let user = Address::generate(&env);

    assert_eq!(
        client.try_deposit(&user, &UNIT, &None),
        Err(Ok(StakingError::NotInitialized))
    );
}

#[test]
fn test_deposit() {
    let s = create_test_contract();
    let alice = s.user(3 * UNIT);

    assert_eq!(s.client.deposit(&alice, &(2 * UNIT), &None), 2 * UNIT);
    assert_eq!(s.client.balance_of(&alice), 2 * UNIT);
    assert_eq!(s.client.total_supply(), 2 * UNIT);
    assert_eq!(s.client.total_assets(), 2 * UNIT);
    assert_eq!(s.asset.balance(&alice), UNIT);
    assert_eq!(s.asset.balance(&s.client.address), 2 * UNIT);
}

#[test]
fn test_deposit_receiver() {
    let s = create_test_contract();
    let alice = s.user(2 * UNIT);
    let bob = s.user(0);

    s.client.deposit(&alice, &(2 * UNIT), &Some(bob.clone()));
    assert_eq!(s.client.balance_of(&alice), 0);
    assert_eq!(s.client.balance_of(&bob), 2 * UNIT);
    assert_eq!(s.client.weight_record(&bob).balance, 2 * UNIT);
}

#[test]
fn test_deposit_excessive() {
    let s = create_test_contract();
    let alice = s.user(UNIT);

    assert_eq!(
        s.client.try_deposit(&alice, &(2 * UNIT), &None),
        Err(Ok(StakingError::InsufficientBalance))
    );
    assert_eq!(
        s.client.try_deposit(&alice, &-1, &None),
        Err(Ok(StakingError::InvalidAmount))
    );
}

#[test]
fn test_share_conversion() {
    let s = create_test_contract();

    assert_eq!(s.client.convert_to_shares(&UNIT), UNIT);
    assert_eq!(s.client.convert_to_assets(&UNIT), UNIT);
    assert_eq!(s.client.preview_deposit(&UNIT), UNIT);
    assert_eq!(s.client.preview_withdraw(&UNIT), UNIT);
    assert_eq!(s.client.max_deposit(&s.management), i128::MAX);
}

#[test]
fn test_unstake() {
    let s = create_test_contract();
    let alice = s.staker(4 * UNIT);

    s.client.unstake(&alice, &(2 * UNIT));
    assert_eq!(s.client.balance_of(&alice), 2 * UNIT);
    assert_eq!(s.client.total_supply(), 2 * UNIT);
    assert_eq!(
        s.client.stream(&alice),
        WithdrawalStream {
            start: START,
            total: 2 * UNIT,
            claimed: 0
        }
    );
    assert_eq!(s.client.max_withdraw(&alice), 0);

    s.set_time(START + WEEK / 2);
    assert_eq!(s.client.max_withdraw(&alice), UNIT);
    s.set_time(START + 2 * WEEK);
    assert_eq!(s.client.max_withdraw(&alice), 2 * UNIT);
}

#[test]
fn test_unstake_excessive() {
    let s = create_test_contract();
    let alice = s.staker(UNIT);

    assert_eq!(
        s.client.try_unstake(&alice, &(2 * UNIT)),
        Err(Ok(StakingError::InsufficientBalance))
    );
}

#[test]
fn test_unstake_zero() {
    let s = create_test_contract();
    let alice = s.staker(4 * UNIT);

    s.client.unstake(&alice, &(2 * UNIT));
    s.set_time(START + WEEK / 2);

    // an empty unstake must not restart the running stream
    assert_eq!(
        s.client.try_unstake(&alice, &0),
        Err(Ok(StakingError::InvalidAmount))
    );
    assert_eq!(s.client.stream(&alice).start, START);
    assert_eq!(s.client.max_withdraw(&alice), UNIT);
}

#[test]
fn test_unstake_merges_stream() {
    let s = create_test_contract();
    let alice = s.staker(4 * UNIT);

    s.client.unstake(&alice, &(2 * UNIT));
    s.set_time(START + WEEK / 2);
    s.client.withdraw(&alice, &UNIT, &None, &None);

    // the unclaimed remainder joins the new stream and the clock restarts
    s.client.unstake(&alice, &(2 * UNIT));
    let stream = s.client.stream(&alice);
    assert_eq!(stream.start, START + WEEK / 2);
    assert_eq!(stream.total, 3 * UNIT);
    assert_eq!(stream.claimed, 0);
    assert_eq!(s.client.max_withdraw(&alice), 0);

    s.set_time(START + 3 * WEEK / 2);
    assert_eq!(s.client.max_withdraw(&alice), 3 * UNIT);
}

#[test]
fn test_withdraw() {
    let s = create_test_contract();
    let alice = s.staker(2 * UNIT);
    let bob = s.user(0);

    s.client.unstake(&alice, &(2 * UNIT));
    s.set_time(START + WEEK / 2);
    assert_eq!(
        s.client.withdraw(&alice, &UNIT, &Some(bob.clone()), &None),
        UNIT
    );
    assert_eq!(s.asset.balance(&bob), UNIT);
    assert_eq!(s.client.max_withdraw(&alice), 0);

    s.set_time(START + WEEK);
    s.client.withdraw(&alice, &UNIT, &None, &None);
    assert_eq!(s.asset.balance(&alice), UNIT);
    assert_eq!(s.client.stream(&alice).claimed, 2 * UNIT);
    assert_eq!(s.asset.balance(&s.client.address), 0);
}

#[test]
fn test_withdraw_excessive() {
    let s = create_test_contract();
    let alice = s.staker(2 * UNIT);

    s.client.unstake(&alice, &(2 * UNIT));
    s.set_time(START + WEEK / 2);
    assert_eq!(
        s.client.try_withdraw(&alice, &(UNIT + 1), &None, &None),
        Err(Ok(StakingError::ExceedsWithdrawable))
    );
}

#[test]
fn test_withdraw_from() {
    let s = create_test_contract();
    let alice = s.staker(4 * UNIT);
    let bob = s.user(0);

    s.client.unstake(&alice, &(4 * UNIT));
    s.set_time(START + WEEK);
    s.client.approve(&alice, &bob, &(3 * UNIT));

    s.client
        .withdraw(&bob, &(2 * UNIT), &None, &Some(alice.clone()));
    assert_eq!(s.asset.balance(&bob), 2 * UNIT);
    assert_eq!(s.client.allowance(&alice, &bob), UNIT);
    assert_eq!(
        s.client
            .try_withdraw(&bob, &(2 * UNIT), &None, &Some(alice.clone())),
        Err(Ok(StakingError::InsufficientAllowance))
    );
}

#[test]
fn test_transfer() {
    let s = create_test_contract();
    let alice = s.staker(3 * UNIT);
    let bob = s.user(0);

    assert!(s.client.transfer(&alice, &bob, &UNIT));
    assert_eq!(s.client.balance_of(&alice), 2 * UNIT);
    assert_eq!(s.client.balance_of(&bob), UNIT);
    assert_eq!(s.client.total_supply(), 3 * UNIT);

    assert_eq!(
        s.client.try_transfer(&alice, &bob, &(3 * UNIT)),
        Err(Ok(StakingError::InsufficientBalance))
    );
}

#[test]
fn test_transfer_self() {
    let s = create_test_contract();
    let alice = s.staker(2 * UNIT);
    let before = s.client.weight_record(&alice);

    s.client.transfer(&alice, &alice, &UNIT);
    assert_eq!(s.client.balance_of(&alice), 2 * UNIT);
    assert_eq!(s.client.weight_record(&alice), before);
}

#[test]
fn test_transfer_from() {
    let s = create_test_contract();
    let alice = s.staker(4 * UNIT);
    let bob = s.user(0);
    let charlie = s.user(0);

    s.client.approve(&alice, &bob, &(3 * UNIT));
    s.client.transfer_from(&bob, &alice, &charlie, &(2 * UNIT));
    assert_eq!(s.client.balance_of(&charlie), 2 * UNIT);
    assert_eq!(s.client.allowance(&alice, &bob), UNIT);

    assert_eq!(
        s.client
            .try_transfer_from(&bob, &alice, &charlie, &(2 * UNIT)),
        Err(Ok(StakingError::InsufficientAllowance))
    );
}

#[test]
fn test_transfer_from_unlimited() {
    let s = create_test_contract();
    let alice = s.staker(4 * UNIT);
    let bob = s.user(0);

    s.client.approve(&alice, &bob, &i128::MAX);
    s.client.transfer_from(&bob, &alice, &bob, &(2 * UNIT));
    assert_eq!(s.client.allowance(&alice, &bob), i128::MAX);
}

#[test]
fn test_lock() {
    let s = create_test_contract();
    let alice = s.staker(UNIT);

    assert_eq!(s.client.lock(&alice, &Some(2 * WEEK)), START + 2 * WEEK);
    assert_eq!(s.client.unlock_time(&alice), START + 2 * WEEK);

    // no duration means the maximum
    assert_eq!(s.client.lock(&alice, &None), START + MAX_LOCK);
    assert_eq!(
        s.client.try_lock(&alice, &Some(WEEK)),
        Err(Ok(StakingError::LockNotExtended))
    );
}

#[test]
fn test_lock_excessive() {
    let s = create_test_contract();
    let alice = s.staker(UNIT);

    s.set_time(START + WEEK);
    // credit is capped at what the stake needs to reach full weight
    assert_eq!(s.client.lock(&alice, &None), START + 8 * WEEK);

    s.set_time(START + 8 * WEEK);
    assert_eq!(
        s.client.try_lock(&alice, &None),
        Err(Ok(StakingError::LockNotExtended))
    );
}

#[test]
fn test_lock_nothing_staked() {
    let s = create_test_contract();
    let alice = s.user(0);

    assert_eq!(
        s.client.try_lock(&alice, &None),
        Err(Ok(StakingError::NothingStaked))
    );
}

#[test]
fn test_locked_balance() {
    let s = create_test_contract();
    let alice = s.staker(2 * UNIT);
    let bob = s.user(0);

    s.client.lock(&alice, &Some(WEEK));
    assert_eq!(
        s.client.try_unstake(&alice, &UNIT),
        Err(Ok(StakingError::Locked))
    );
    assert_eq!(
        s.client.try_transfer(&alice, &bob, &UNIT),
        Err(Ok(StakingError::Locked))
    );

    // deposits into a locked position are fine
    s.asset_admin.mint(&alice, &UNIT);
    s.client.deposit(&alice, &UNIT, &None);

    s.set_time(START + WEEK);
    s.client.unstake(&alice, &UNIT);
    s.client.transfer(&alice, &bob, &UNIT);
    assert_eq!(s.client.balance_of(&alice), UNIT);
}

#[test]
fn test_vote_weight() {
    let s = create_test_contract();
    let alice = s.staker(32 * UNIT);
    assert_eq!(s.client.vote_weight(&alice), 0);

    s.set_time(START + WEEK);
    assert_eq!(s.client.vote_weight(&alice), 2 * UNIT);
    s.asset_admin.mint(&alice, &(16 * UNIT));
    s.client.deposit(&alice, &(16 * UNIT), &None);
    assert_eq!(s.client.vote_weight(&alice), 2 * UNIT);
    assert_eq!(s.client.previous_weight_record(&alice).balance, 32 * UNIT);

    s.set_time(START + 2 * WEEK);
    assert_eq!(s.client.vote_weight(&alice), 7 * UNIT);
}

#[test]
fn test_vote_weight_lock() {
    let s = create_test_contract();
    let alice = s.staker(32 * UNIT);

    s.set_time(START + WEEK);
    s.client.lock(&alice, &Some(4 * WEEK));

    s.set_time(START + 2 * WEEK);
    s.asset_admin.mint(&alice, &(64 * UNIT));
    s.client.deposit(&alice, &(64 * UNIT), &None);

    s.set_time(START + 3 * WEEK);
    assert_eq!(s.client.vote_weight(&alice), 54 * UNIT);
}

#[test]
fn test_vote_weight_transfer() {
    let s = create_test_contract();
    let alice = s.staker(32 * UNIT);
    let bob = s.user(0);

    s.set_time(START + WEEK);
    s.client.transfer(&alice, &bob, &(16 * UNIT));
    // moved shares do not vote twice this week
    assert_eq!(s.client.vote_weight(&alice), UNIT);
    assert_eq!(s.client.vote_weight(&bob), 0);

    s.set_time(START + 2 * WEEK);
    assert_eq!(s.client.vote_weight(&alice), 3 * UNIT);
    assert_eq!(s.client.vote_weight(&bob), UNIT);
}

#[test]
fn test_set_rewards_permission() {
    let s = create_test_contract();
    let alice = s.user(0);
    let rewards = s.user(0);

    assert_eq!(
        s.client.try_set_rewards(&alice, &Some(rewards.clone())),
        Err(Ok(StakingError::Unauthorized))
    );
    s.client.set_rewards(&s.management, &Some(rewards.clone()));
    assert_eq!(s.client.rewards(), Some(rewards));
    s.client.set_rewards(&s.management, &None);
    assert_eq!(s.client.rewards(), None);
}

#[test]
fn test_rewards_reporting() {
    let s = create_test_contract();
    let custody = s.user(0);
    let bob = s.user(0);

    let sac = s.env.register_stellar_asset_contract_v2(s.management.clone());
    let reward_token = TokenClient::new(&s.env, &sac.address());
    let reward_admin = StellarAssetClient::new(&s.env, &sac.address());

    let rewards_id = s.env.register_contract(None, StakingRewardsContract);
    let rewards = StakingRewardsContractClient::new(&s.env, &rewards_id);
    rewards.initialize(
        &s.management,
        &s.client.address,
        &custody,
        &reward_token.address,
        &s.asset.address,
        &s.asset.address,
    );
    s.client.set_rewards(&s.management, &Some(rewards_id.clone()));

    let expiration = s.env.ledger().max_live_until_ledger() - 1;
    reward_token.approve(&custody, &rewards_id, &i128::MAX, &expiration);
    s.asset.approve(&custody, &rewards_id, &i128::MAX, &expiration);

    let alice = s.staker(2 * UNIT);
    reward_admin.mint(&custody, &(4 * UNIT));
    s.asset_admin.mint(&custody, &(6 * UNIT));
    rewards.harvest(&s.management, &(4 * UNIT), &(6 * UNIT), &None);

    s.set_time(START + 2 * WEEK);
    assert_eq!(rewards.claimable(&alice), (4 * UNIT, 6 * UNIT));

    // a transfer settles both sides before the balances move
    s.client.transfer(&alice, &bob, &UNIT);
    assert_eq!(rewards.pending(&alice), (4 * UNIT, 6 * UNIT));
    assert_eq!(rewards.pending(&bob), (0, 0));
    assert_eq!(rewards.account_integrals(&bob), rewards.integrals());

    s.client.unstake(&bob, &UNIT);
    assert_eq!(rewards.claimable(&bob), (0, 0));

    let claimed = rewards.claim(&alice, &None, &Bytes::new(&s.env), &0);
    assert_eq!(claimed, (4 * UNIT, 6 * UNIT));
    assert_eq!(reward_token.balance(&alice), 4 * UNIT);
}

#[test]
fn test_management_handover() {
    let s = create_test_contract();
    let alice = s.user(0);

    s.client.set_management(&s.management, &Some(alice.clone()));
    assert_eq!(s.client.pending_management(), Some(alice.clone()));
    s.client.accept_management(&alice);
    assert_eq!(s.client.management(), Some(alice.clone()));
    assert_eq!(
        s.client.try_set_rewards(&s.management, &None),
        Err(Ok(StakingError::Unauthorized))
    );
}

#[test]
fn test_metadata() {
    let s = create_test_contract();

    assert_eq!(s.client.name(), String::from_str(&s.env, "Staked Liquid Locker"));
    assert_eq!(s.client.symbol(), String::from_str(&s.env, "stLL"));
}
