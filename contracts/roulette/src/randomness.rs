//! Request side of the oracle protocol and the raw value to slot mapping.

use soroban_sdk::{contractclient, Address, BytesN, Env};

use crate::{payout::WHEEL_SLOTS, DataKey, Error};

/// The part of the coordinator interface the engine calls.
#[contractclient(name = "CoordinatorClient")]
pub trait Coordinator {
    fn request_randomness(
        env: Env,
        consumer: Address,
        key_hash: BytesN<32>,
        subscription_id: u64,
    ) -> u64;
}

/// Ask the configured coordinator for one random value. Returns the
/// request handle to wait on.
pub fn request(env: &Env) -> Result<u64, Error> {
    let coordinator = coordinator(env)?;
    let key_hash: BytesN<32> = env
        .storage()
        .instance()
        .get(&DataKey::KeyHash)
        .ok_or(Error::NotInitialized)?;
    let subscription_id: u64 = env
        .storage()
        .instance()
        .get(&DataKey::SubscriptionId)
        .ok_or(Error::NotInitialized)?;

    match CoordinatorClient::new(env, &coordinator).try_request_randomness(
        &env.current_contract_address(),
        &key_hash,
        &subscription_id,
    ) {
        Ok(Ok(request_id)) => Ok(request_id),
        _ => Err(Error::RandomnessRequestFailed),
    }
}

pub fn coordinator(env: &Env) -> Result<Address, Error> {
    env.storage()
        .instance()
        .get(&DataKey::Coordinator)
        .ok_or(Error::NotInitialized)
}

/// Map a delivered raw value onto the wheel.
pub fn winning_slot(raw_value: u64) -> u32 {
    (raw_value % WHEEL_SLOTS as u64) as u32
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_winning_slot_is_raw_mod_37() {
        assert_eq!(winning_slot(0), 0);
        assert_eq!(winning_slot(31), 31);
        assert_eq!(winning_slot(36), 36);
        assert_eq!(winning_slot(37), 0);
        assert_eq!(winning_slot(31 + 37 * 1_000), 31);
        assert_eq!(winning_slot(u64::MAX), (u64::MAX % 37) as u32);
    }
}
