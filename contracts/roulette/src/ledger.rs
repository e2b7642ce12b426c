//! Ledger adapter over the SEP-41 token holding the pooled balance.
//!
//! Transfers go through the `try_` client so a failing token call comes back
//! as `Error::TransferFailed` with the token's own writes rolled back, and the
//! engine decides what to do with it. Winnings that could not be paid are
//! kept here as claimable credit per bettor.

use soroban_sdk::{token::TokenClient, Address, Env};

use crate::{DataKey, Error, PERSISTENT_BUMP_LEDGERS};

fn token(env: &Env) -> Result<TokenClient<'_>, Error> {
    let address: Address = env
        .storage()
        .instance()
        .get(&DataKey::Token)
        .ok_or(Error::NotInitialized)?;
    Ok(TokenClient::new(env, &address))
}

/// Pull `amount` from `from` into the pool.
pub fn debit(env: &Env, from: &Address, amount: i128) -> Result<(), Error> {
    match token(env)?.try_transfer(from, &env.current_contract_address(), &amount) {
        Ok(Ok(())) => Ok(()),
        _ => Err(Error::TransferFailed),
    }
}

/// Pay `amount` out of the pool to `to`.
pub fn credit(env: &Env, to: &Address, amount: i128) -> Result<(), Error> {
    match token(env)?.try_transfer(&env.current_contract_address(), to, &amount) {
        Ok(Ok(())) => Ok(()),
        _ => Err(Error::TransferFailed),
    }
}

/// Live pooled balance as reported by the token.
pub fn balance(env: &Env) -> Result<i128, Error> {
    Ok(token(env)?.balance(&env.current_contract_address()))
}

// ---------------------------------------------------------------------------
// Claimable credit
// ---------------------------------------------------------------------------

pub fn owed_to(env: &Env, bettor: &Address) -> i128 {
    env.storage()
        .persistent()
        .get(&DataKey::Claimable(bettor.clone()))
        .unwrap_or(0)
}

pub fn total_owed(env: &Env) -> i128 {
    env.storage()
        .persistent()
        .get(&DataKey::TotalOwed)
        .unwrap_or(0)
}

/// Record `amount` as owed to `bettor`.
///
/// Called mid-settlement, so it cannot fail. Both sums saturate at
/// `i128::MAX`, more than any pool can hold.
pub fn defer(env: &Env, bettor: &Address, amount: i128) {
    let owed = owed_to(env, bettor).saturating_add(amount);
    let total = total_owed(env).saturating_add(amount);

    set_i128(env, DataKey::Claimable(bettor.clone()), owed);
    set_i128(env, DataKey::TotalOwed, total);
}

/// Clear the credit owed to `bettor` and return it.
pub fn take_owed(env: &Env, bettor: &Address) -> i128 {
    let owed = owed_to(env, bettor);
    if owed == 0 {
        return 0;
    }
    let total = total_owed(env).saturating_sub(owed).max(0);

    env.storage()
        .persistent()
        .remove(&DataKey::Claimable(bettor.clone()));
    set_i128(env, DataKey::TotalOwed, total);
    owed
}

fn set_i128(env: &Env, key: DataKey, value: i128) {
    env.storage().persistent().set(&key, &value);
    env.storage()
        .persistent()
        .extend_ttl(&key, PERSISTENT_BUMP_LEDGERS, PERSISTENT_BUMP_LEDGERS);
}
