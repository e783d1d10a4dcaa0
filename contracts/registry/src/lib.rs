#![no_std]
use locker_shared::management::{self, AccessError};
use soroban_sdk::{
    contract, contracterror, contractimpl, contracttype, log, symbol_short, Address, Env, Vec,
};

// Data Types
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RegistryConfig {
    pub registrar: Address,
}

// Storage Keys
#[contracttype]
pub enum DataKey {
    Config,
    Gauges,
    ExternalGauges,
    GaugeMap(Address),
    Registered(Address),
    Deregistered(Address),
}

// Error Types
#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum RegistryError {
    NotInitialized = 1,
    AlreadyInitialized = 2,
    Unauthorized = 3,
    AlreadyRegistered = 4,
    PreviouslyDeregistered = 5,
    ExternalGaugeTaken = 6,
    NotRegistered = 7,
    IndexMismatch = 8,
    IndexOutOfRange = 9,
}

impl From<AccessError> for RegistryError {
    fn from(_: AccessError) -> Self {
        RegistryError::Unauthorized
    }
}

// Events
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RegisterEvent {
    pub external_gauge: Address,
    pub gauge: Address,
    pub index: u32,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DeregisterEvent {
    pub external_gauge: Address,
    pub gauge: Address,
    pub index: u32,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RegistrarEvent {
    pub registrar: Address,
}

/// Maps external gauges to the locker gauges wrapping them.
///
/// A gauge can be registered once. After deregistration it is remembered so
/// it can never come back, while its external gauge becomes free again.
#[contract]
pub struct RegistryContract;

#[contractimpl]
impl RegistryContract {
    pub fn initialize(env: Env, management: Address, registrar: Address) -> Result<(), RegistryError> {
        if env.storage().instance().has(&DataKey::Config) {
            return Err(RegistryError::AlreadyInitialized);
        }

        management.require_auth();

        env.storage()
            .instance()
            .set(&DataKey::Config, &RegistryConfig { registrar });
        env.storage()
            .instance()
            .set(&DataKey::Gauges, &Vec::<Address>::new(&env));
        env.storage()
            .instance()
            .set(&DataKey::ExternalGauges, &Vec::<Address>::new(&env));
        management::init(&env, &management);

        log!(&env, "Registry initialized by management: {}", management);

        Ok(())
    }

    /// Register `gauge` as the wrapper of `external_gauge`. Returns its index.
    pub fn register(
        env: Env,
        caller: Address,
        external_gauge: Address,
        gauge: Address,
    ) -> Result<u32, RegistryError> {
        caller.require_auth();
        let config = Self::get_config(&env)?;
        if caller != config.registrar {
            return Err(RegistryError::Unauthorized);
        }

        if Self::is_registered(env.clone(), gauge.clone()) {
            return Err(RegistryError::AlreadyRegistered);
        }
        if Self::is_deregistered(env.clone(), gauge.clone()) {
            return Err(RegistryError::PreviouslyDeregistered);
        }
        if Self::gauge_map(env.clone(), external_gauge.clone()).is_some() {
            return Err(RegistryError::ExternalGaugeTaken);
        }

        let mut gauges = Self::gauge_list(&env);
        let mut externals = Self::external_list(&env);
        let index = gauges.len();
        gauges.push_back(gauge.clone());
        externals.push_back(external_gauge.clone());

        env.storage().instance().set(&DataKey::Gauges, &gauges);
        env.storage()
            .instance()
            .set(&DataKey::ExternalGauges, &externals);
        env.storage()
            .persistent()
            .set(&DataKey::GaugeMap(external_gauge.clone()), &gauge);
        env.storage()
            .persistent()
            .set(&DataKey::Registered(gauge.clone()), &true);

        let event = RegisterEvent {
            external_gauge,
            gauge: gauge.clone(),
            index,
        };
        env.events().publish((symbol_short!("register"),), event);

        log!(&env, "Gauge {} registered at index {}", gauge, index);

        Ok(index)
    }

    /// Remove the gauge at `index`. The last entry takes its place.
    pub fn deregister(env: Env, caller: Address, gauge: Address, index: u32) -> Result<(), RegistryError> {
        Self::get_config(&env)?;
        management::require_management(&env, &caller)?;

        if !Self::is_registered(env.clone(), gauge.clone()) {
            return Err(RegistryError::NotRegistered);
        }

        let mut gauges = Self::gauge_list(&env);
        let mut externals = Self::external_list(&env);
        match gauges.get(index) {
            Some(found) if found == gauge => {}
            Some(_) => return Err(RegistryError::IndexMismatch),
            None => return Err(RegistryError::IndexOutOfRange),
        }
        let external_gauge = externals
            .get(index)
            .ok_or(RegistryError::IndexOutOfRange)?;

        let last = gauges.len() - 1;
        if index != last {
            if let (Some(moved), Some(moved_external)) = (gauges.get(last), externals.get(last)) {
                gauges.set(index, moved);
                externals.set(index, moved_external);
            }
        }
        gauges.pop_back();
        externals.pop_back();

        env.storage().instance().set(&DataKey::Gauges, &gauges);
        env.storage()
            .instance()
            .set(&DataKey::ExternalGauges, &externals);
        env.storage()
            .persistent()
            .remove(&DataKey::GaugeMap(external_gauge.clone()));
        env.storage()
            .persistent()
            .remove(&DataKey::Registered(gauge.clone()));
        env.storage()
            .persistent()
            .set(&DataKey::Deregistered(gauge.clone()), &true);

        let event = DeregisterEvent {
            external_gauge,
            gauge: gauge.clone(),
            index,
        };
        env.events().publish((symbol_short!("dereg"),), event);

        log!(&env, "Gauge {} deregistered", gauge);

        Ok(())
    }

    pub fn set_registrar(env: Env, caller: Address, registrar: Address) -> Result<(), RegistryError> {
        let mut config = Self::get_config(&env)?;
        management::require_management(&env, &caller)?;

        config.registrar = registrar.clone();
        env.storage().instance().set(&DataKey::Config, &config);
        env.events()
            .publish((symbol_short!("registrar"),), RegistrarEvent { registrar });

        Ok(())
    }

    pub fn set_management(env: Env, caller: Address, pending: Option<Address>) -> Result<(), RegistryError> {
        Self::get_config(&env)?;
        management::set_management(&env, &caller, pending)?;
        Ok(())
    }

    pub fn accept_management(env: Env, caller: Address) -> Result<(), RegistryError> {
        Self::get_config(&env)?;
        management::accept_management(&env, &caller)?;
        Ok(())
    }

    // View functions
    pub fn num_gauges(env: Env) -> u32 {
        Self::gauge_list(&env).len()
    }

    pub fn gauges(env: Env, index: u32) -> Result<Address, RegistryError> {
        Self::gauge_list(&env)
            .get(index)
            .ok_or(RegistryError::IndexOutOfRange)
    }

    pub fn external_gauges(env: Env, index: u32) -> Option<Address> {
        Self::external_list(&env).get(index)
    }

    pub fn gauge_map(env: Env, external_gauge: Address) -> Option<Address> {
        env.storage()
            .persistent()
            .get(&DataKey::GaugeMap(external_gauge))
    }

    pub fn is_registered(env: Env, gauge: Address) -> bool {
        env.storage()
            .persistent()
            .get(&DataKey::Registered(gauge))
            .unwrap_or(false)
    }

    pub fn is_deregistered(env: Env, gauge: Address) -> bool {
        env.storage()
            .persistent()
            .get(&DataKey::Deregistered(gauge))
            .unwrap_or(false)
    }

    pub fn registrar(env: Env) -> Result<Address, RegistryError> {
        Ok(Self::get_config(&env)?.registrar)
    }

    pub fn management(env: Env) -> Option<Address> {
        management::management(&env)
    }

    pub fn pending_management(env: Env) -> Option<Address> {
        management::pending_management(&env)
    }

    // Helper functions
    fn get_config(env: &Env) -> Result<RegistryConfig, RegistryError> {
        env.storage()
            .instance()
            .get(&DataKey::Config)
            .ok_or(RegistryError::NotInitialized)
    }

    fn gauge_list(env: &Env) -> Vec<Address> {
        env.storage()
            .instance()
            .get(&DataKey::Gauges)
            .unwrap_or_else(|| Vec::new(env))
    }

    fn external_list(env: &Env) -> Vec<Address> {
        env.storage()
            .instance()
            .get(&DataKey::ExternalGauges)
            .unwrap_or_else(|| Vec::new(env))
    }
}
