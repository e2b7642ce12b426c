use soroban_sdk::{Address, Env};

use crate::{randomness, DataKey, Error};

pub fn require_initialized(env: &Env) -> Result<(), Error> {
    if !env.storage().instance().has(&DataKey::Owner) {
        return Err(Error::NotInitialized);
    }
    Ok(())
}

pub fn owner(env: &Env) -> Result<Address, Error> {
    env.storage()
        .instance()
        .get(&DataKey::Owner)
        .ok_or(Error::NotInitialized)
}

/// Gate for withdraw and the stake limit setters.
pub fn require_owner(env: &Env, caller: &Address) -> Result<(), Error> {
    let owner = owner(env)?;
    caller.require_auth();
    if caller != &owner {
        return Err(Error::NotAuthorized);
    }
    Ok(())
}

/// Only the registered coordinator may deliver randomness.
pub fn require_coordinator(env: &Env, caller: &Address) -> Result<(), Error> {
    let coordinator = randomness::coordinator(env)?;
    caller.require_auth();
    if caller != &coordinator {
        return Err(Error::NotAuthorized);
    }
    Ok(())
}
