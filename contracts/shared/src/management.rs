//! Two-step management handover shared by every contract.
//!
//! Management proposes a candidate, and only that candidate can accept. A new
//! proposal (or `None`) replaces the previous one, so a mistaken nomination can
//! be undone before it is accepted.

use soroban_sdk::{contracttype, log, symbol_short, Address, Env};

#[contracttype]
#[derive(Clone)]
enum ManagementKey {
    Management,
    PendingManagement,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AccessError {
    NotManagement,
    NotPendingManagement,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PendingManagementEvent {
    pub management: Address,
    pub pending: Option<Address>,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ManagementAcceptedEvent {
    pub management: Address,
}

pub fn init(env: &Env, management: &Address) {
    env.storage()
        .instance()
        .set(&ManagementKey::Management, management);
}

pub fn management(env: &Env) -> Option<Address> {
    env.storage().instance().get(&ManagementKey::Management)
}

pub fn pending_management(env: &Env) -> Option<Address> {
    env.storage().instance().get(&ManagementKey::PendingManagement)
}

/// Authenticate `caller` and check it holds the management role.
pub fn require_management(env: &Env, caller: &Address) -> Result<(), AccessError> {
    caller.require_auth();
    match management(env) {
        Some(current) if current == *caller => Ok(()),
        _ => Err(AccessError::NotManagement),
    }
}

pub fn set_management(
    env: &Env,
    caller: &Address,
    candidate: Option<Address>,
) -> Result<(), AccessError> {
    require_management(env, caller)?;

    match &candidate {
        Some(pending) => env
            .storage()
            .instance()
            .set(&ManagementKey::PendingManagement, pending),
        None => env
            .storage()
            .instance()
            .remove(&ManagementKey::PendingManagement),
    }

    let event = PendingManagementEvent {
        management: caller.clone(),
        pending: candidate,
    };
    env.events().publish((symbol_short!("set_mgmt"),), event);

    Ok(())
}

pub fn accept_management(env: &Env, caller: &Address) -> Result<(), AccessError> {
    caller.require_auth();

    match pending_management(env) {
        Some(pending) if pending == *caller => {}
        _ => return Err(AccessError::NotPendingManagement),
    }

    env.storage()
        .instance()
        .set(&ManagementKey::Management, caller);
    env.storage()
        .instance()
        .remove(&ManagementKey::PendingManagement);

    let event = ManagementAcceptedEvent {
        management: caller.clone(),
    };
    env.events().publish((symbol_short!("acc_mgmt"),), event);

    log!(env, "Management accepted by {}", caller);

    Ok(())
}
