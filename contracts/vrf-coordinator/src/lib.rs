//! Roulette VRF Coordinator Contract
//!
//! The randomness oracle consumed by the roulette engine. Consumers never
//! see a seed: they register a request and receive a single raw value
//! through a callback once the oracle has fulfilled it.
//!
//! 1. A whitelisted consumer calls `request_randomness` and gets back a
//!    fresh `request_id`.
//! 2. The designated oracle calls `fulfill_random` with a `server_seed`.
//!    The raw value is derived deterministically as:
//!
//!      `u64_be(sha256(server_seed || request_id_be_bytes)[0..8])`
//!
//!    and stored alongside the seed so anyone can verify it.
//! 3. The coordinator invokes the consumer's `on_randomness_delivered`
//!    with `(coordinator, request_id, raw_value)`. A consumer that rejects
//!    the callback does not undo fulfillment; the outcome is recorded in
//!    `FulfilledEntry::delivered`.
//!
//! ## Fairness Model
//! The oracle publishes `sha256(server_seed)` before the round it serves
//! is closed. Mixing `request_id` into the preimage means one committed
//! seed cannot be replayed across requests.
#![no_std]
#![allow(unexpected_cfgs)]

use soroban_sdk::{
    contract, contractclient, contracterror, contractevent, contractimpl, contracttype, Address,
    Bytes, BytesN, Env,
};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Persistent storage TTL in ledgers (~30 days at 5 s/ledger).
pub const PERSISTENT_BUMP_LEDGERS: u32 = 518_400;

// ---------------------------------------------------------------------------
// Error Types
// ---------------------------------------------------------------------------

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum Error {
    AlreadyInitialized   = 1,
    NotInitialized       = 2,
    NotAuthorized        = 3,
    RequestNotFound      = 4,
    /// `fulfill_random` was called a second time for the same `request_id`.
    AlreadyFulfilled     = 5,
    /// The `consumer` passed to `request_randomness` is not whitelisted.
    UnauthorizedConsumer = 6,
    Overflow             = 7,
}

// ---------------------------------------------------------------------------
// Consumer interface
// ---------------------------------------------------------------------------

/// Callback every consumer contract must expose.
#[contractclient(name = "RandomnessConsumerClient")]
pub trait RandomnessConsumer {
    fn on_randomness_delivered(env: Env, coordinator: Address, request_id: u64, raw_value: u64);
}

// ---------------------------------------------------------------------------
// Storage Types
// ---------------------------------------------------------------------------

#[contracttype]
pub enum DataKey {
    // --- instance() ---
    Admin,
    Oracle,
    NextRequestId,
    // --- persistent() ---
    AuthorizedConsumer(Address),
    PendingRequest(u64),
    FulfilledRequest(u64),
}

/// A request awaiting the oracle.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PendingEntry {
    pub consumer: Address,
    pub key_hash: BytesN<32>,
    pub subscription_id: u64,
}

/// A fulfilled request, kept for verification.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FulfilledEntry {
    pub consumer: Address,
    pub key_hash: BytesN<32>,
    pub subscription_id: u64,
    pub server_seed: BytesN<32>,
    pub raw_value: u64,
    /// Whether the consumer accepted the callback.
    pub delivered: bool,
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[contractevent]
pub struct ConsumerAuthorized {
    #[topic]
    pub consumer: Address,
}

#[contractevent]
pub struct ConsumerRevoked {
    #[topic]
    pub consumer: Address,
}

#[contractevent]
pub struct RandomnessRequested {
    #[topic]
    pub request_id: u64,
    #[topic]
    pub consumer: Address,
    pub key_hash: BytesN<32>,
    pub subscription_id: u64,
}

#[contractevent]
pub struct RandomnessFulfilled {
    #[topic]
    pub request_id: u64,
    pub raw_value: u64,
    pub server_seed: BytesN<32>,
    pub delivered: bool,
}

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

#[contract]
pub struct VrfCoordinator;

#[contractimpl]
impl VrfCoordinator {
    /// Initialize the coordinator. May only be called once.
    ///
    /// `oracle` is the sole address permitted to call `fulfill_random`.
    pub fn init(env: Env, admin: Address, oracle: Address) -> Result<(), Error> {
        if env.storage().instance().has(&DataKey::Admin) {
            return Err(Error::AlreadyInitialized);
        }

        admin.require_auth();

        env.storage().instance().set(&DataKey::Admin, &admin);
        env.storage().instance().set(&DataKey::Oracle, &oracle);
        env.storage().instance().set(&DataKey::NextRequestId, &1u64);

        Ok(())
    }

    /// Add a consumer contract to the whitelist. Admin only.
    pub fn authorize(env: Env, admin: Address, consumer: Address) -> Result<(), Error> {
        require_initialized(&env)?;
        require_admin(&env, &admin)?;

        let key = DataKey::AuthorizedConsumer(consumer.clone());
        env.storage().persistent().set(&key, &());
        env.storage()
            .persistent()
            .extend_ttl(&key, PERSISTENT_BUMP_LEDGERS, PERSISTENT_BUMP_LEDGERS);

        ConsumerAuthorized { consumer }.publish(&env);
        Ok(())
    }

    /// Remove a consumer contract from the whitelist. Admin only.
    pub fn revoke(env: Env, admin: Address, consumer: Address) -> Result<(), Error> {
        require_initialized(&env)?;
        require_admin(&env, &admin)?;

        env.storage()
            .persistent()
            .remove(&DataKey::AuthorizedConsumer(consumer.clone()));

        ConsumerRevoked { consumer }.publish(&env);
        Ok(())
    }

    /// Register a randomness request for `consumer` and return its id.
    ///
    /// `key_hash` and `subscription_id` identify the oracle lane and the
    /// billing account; they are recorded with the request.
    pub fn request_randomness(
        env: Env,
        consumer: Address,
        key_hash: BytesN<32>,
        subscription_id: u64,
    ) -> Result<u64, Error> {
        require_initialized(&env)?;

        consumer.require_auth();

        if !env
            .storage()
            .persistent()
            .has(&DataKey::AuthorizedConsumer(consumer.clone()))
        {
            return Err(Error::UnauthorizedConsumer);
        }

        let request_id: u64 = env
            .storage()
            .instance()
            .get(&DataKey::NextRequestId)
            .unwrap_or(1);
        let next = request_id.checked_add(1).ok_or(Error::Overflow)?;
        env.storage().instance().set(&DataKey::NextRequestId, &next);

        let entry = PendingEntry {
            consumer: consumer.clone(),
            key_hash: key_hash.clone(),
            subscription_id,
        };
        let key = DataKey::PendingRequest(request_id);
        env.storage().persistent().set(&key, &entry);
        env.storage()
            .persistent()
            .extend_ttl(&key, PERSISTENT_BUMP_LEDGERS, PERSISTENT_BUMP_LEDGERS);

        RandomnessRequested {
            request_id,
            consumer,
            key_hash,
            subscription_id,
        }
        .publish(&env);

        Ok(request_id)
    }

    /// Fulfill a pending request and deliver the raw value to its consumer.
    /// Oracle only; each `request_id` can be fulfilled exactly once.
    pub fn fulfill_random(
        env: Env,
        oracle: Address,
        request_id: u64,
        server_seed: BytesN<32>,
    ) -> Result<u64, Error> {
        require_initialized(&env)?;
        require_oracle(&env, &oracle)?;

        if env
            .storage()
            .persistent()
            .has(&DataKey::FulfilledRequest(request_id))
        {
            return Err(Error::AlreadyFulfilled);
        }

        let pending_key = DataKey::PendingRequest(request_id);
        let pending: PendingEntry = env
            .storage()
            .persistent()
            .get(&pending_key)
            .ok_or(Error::RequestNotFound)?;
        env.storage().persistent().remove(&pending_key);

        let raw_value = derive_raw_value(&env, &server_seed, request_id);

        // A rejected callback rolls back only the consumer's writes.
        let delivered = matches!(
            RandomnessConsumerClient::new(&env, &pending.consumer).try_on_randomness_delivered(
                &env.current_contract_address(),
                &request_id,
                &raw_value,
            ),
            Ok(Ok(()))
        );

        let fulfilled = FulfilledEntry {
            consumer: pending.consumer,
            key_hash: pending.key_hash,
            subscription_id: pending.subscription_id,
            server_seed: server_seed.clone(),
            raw_value,
            delivered,
        };
        let fulfilled_key = DataKey::FulfilledRequest(request_id);
        env.storage().persistent().set(&fulfilled_key, &fulfilled);
        env.storage()
            .persistent()
            .extend_ttl(&fulfilled_key, PERSISTENT_BUMP_LEDGERS, PERSISTENT_BUMP_LEDGERS);

        RandomnessFulfilled {
            request_id,
            raw_value,
            server_seed,
            delivered,
        }
        .publish(&env);

        Ok(raw_value)
    }

    /// Return the fulfilled entry for a `request_id`.
    ///
    /// Returns `RequestNotFound` while the request is still pending.
    pub fn get_result(env: Env, request_id: u64) -> Result<FulfilledEntry, Error> {
        require_initialized(&env)?;

        env.storage()
            .persistent()
            .get(&DataKey::FulfilledRequest(request_id))
            .ok_or(Error::RequestNotFound)
    }

    pub fn is_pending(env: Env, request_id: u64) -> bool {
        env.storage()
            .persistent()
            .has(&DataKey::PendingRequest(request_id))
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn require_initialized(env: &Env) -> Result<(), Error> {
    if !env.storage().instance().has(&DataKey::Admin) {
        return Err(Error::NotInitialized);
    }
    Ok(())
}

fn require_admin(env: &Env, caller: &Address) -> Result<(), Error> {
    let admin: Address = env
        .storage()
        .instance()
        .get(&DataKey::Admin)
        .ok_or(Error::NotInitialized)?;
    caller.require_auth();
    if caller != &admin {
        return Err(Error::NotAuthorized);
    }
    Ok(())
}

fn require_oracle(env: &Env, caller: &Address) -> Result<(), Error> {
    let oracle: Address = env
        .storage()
        .instance()
        .get(&DataKey::Oracle)
        .ok_or(Error::NotInitialized)?;
    caller.require_auth();
    if caller != &oracle {
        return Err(Error::NotAuthorized);
    }
    Ok(())
}

/// Preimage is `server_seed (32 bytes) || request_id (8 bytes BE)`; the raw
/// value is the first 8 digest bytes read big-endian.
pub fn derive_raw_value(env: &Env, server_seed: &BytesN<32>, request_id: u64) -> u64 {
    let mut preimage = [0u8; 40];
    preimage[..32].copy_from_slice(&server_seed.to_array());
    preimage[32..].copy_from_slice(&request_id.to_be_bytes());

    let digest: BytesN<32> = env.crypto().sha256(&Bytes::from_slice(env, &preimage)).into();
    let arr = digest.to_array();
    u64::from_be_bytes([arr[0], arr[1], arr[2], arr[3], arr[4], arr[5], arr[6], arr[7]])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use soroban_sdk::{contract, contractimpl, testutils::Address as _, Env};

    // ------------------------------------------------------------------
    // Test consumers
    // ------------------------------------------------------------------

    #[contracttype]
    enum ConsumerKey {
        Last,
    }

    /// Records the last delivery it receives.
    #[contract]
    struct RecordingConsumer;

    #[contractimpl]
    impl RecordingConsumer {
        pub fn on_randomness_delivered(
            env: Env,
            coordinator: Address,
            request_id: u64,
            raw_value: u64,
        ) {
            coordinator.require_auth();
            env.storage()
                .instance()
                .set(&ConsumerKey::Last, &(request_id, raw_value));
        }

        pub fn last(env: Env) -> Option<(u64, u64)> {
            env.storage().instance().get(&ConsumerKey::Last)
        }
    }

    /// Rejects every delivery.
    #[contract]
    struct RejectingConsumer;

    #[contractimpl]
    impl RejectingConsumer {
        pub fn on_randomness_delivered(
            _env: Env,
            _coordinator: Address,
            _request_id: u64,
            _raw_value: u64,
        ) {
            panic!("delivery rejected");
        }
    }

    // ------------------------------------------------------------------
    // Test helpers
    // ------------------------------------------------------------------

    struct Setup<'a> {
        client: VrfCoordinatorClient<'a>,
        admin: Address,
        oracle: Address,
        consumer: Address,
        consumer_client: RecordingConsumerClient<'a>,
    }

    fn setup(env: &Env) -> Setup<'_> {
        let admin = Address::generate(env);
        let oracle = Address::generate(env);

        let contract_id = env.register(VrfCoordinator, ());
        let client = VrfCoordinatorClient::new(env, &contract_id);

        let consumer = env.register(RecordingConsumer, ());
        let consumer_client = RecordingConsumerClient::new(env, &consumer);

        env.mock_all_auths();
        client.init(&admin, &oracle);
        client.authorize(&admin, &consumer);

        Setup {
            client,
            admin,
            oracle,
            consumer,
            consumer_client,
        }
    }

    fn key_hash(env: &Env) -> BytesN<32> {
        BytesN::from_array(env, &[7u8; 32])
    }

    fn seed(env: &Env, byte: u8) -> BytesN<32> {
        let mut arr = [0u8; 32];
        arr[31] = byte;
        BytesN::from_array(env, &arr)
    }

    // ------------------------------------------------------------------
    // 1. Requests get fresh, increasing ids
    // ------------------------------------------------------------------

    #[test]
    fn test_request_ids_increase() {
        let env = Env::default();
        let s = setup(&env);
        env.mock_all_auths();

        let first = s.client.request_randomness(&s.consumer, &key_hash(&env), &1u64);
        let second = s.client.request_randomness(&s.consumer, &key_hash(&env), &1u64);

        assert_eq!(first, 1);
        assert_eq!(second, 2);
        assert!(s.client.is_pending(&first));
        assert!(s.client.is_pending(&second));
        assert!(s.client.try_get_result(&first).is_err());
    }

    // ------------------------------------------------------------------
    // 2. Fulfillment delivers the derived value to the consumer
    // ------------------------------------------------------------------

    #[test]
    fn test_fulfill_delivers_to_consumer() {
        let env = Env::default();
        let s = setup(&env);
        env.mock_all_auths();

        let request_id = s.client.request_randomness(&s.consumer, &key_hash(&env), &9u64);
        let server_seed = seed(&env, 0xAB);
        let raw = s.client.fulfill_random(&s.oracle, &request_id, &server_seed);

        assert_eq!(raw, derive_raw_value(&env, &server_seed, request_id));
        assert_eq!(s.consumer_client.last(), Some((request_id, raw)));

        let entry = s.client.get_result(&request_id);
        assert_eq!(entry.raw_value, raw);
        assert_eq!(entry.server_seed, server_seed);
        assert_eq!(entry.subscription_id, 9);
        assert!(entry.delivered);
        assert!(!s.client.is_pending(&request_id));
    }

    // ------------------------------------------------------------------
    // 3. Replay fulfillment rejected
    // ------------------------------------------------------------------

    #[test]
    fn test_replay_fulfillment_rejected() {
        let env = Env::default();
        let s = setup(&env);
        env.mock_all_auths();

        let request_id = s.client.request_randomness(&s.consumer, &key_hash(&env), &1u64);
        s.client.fulfill_random(&s.oracle, &request_id, &seed(&env, 2));

        let result = s.client.try_fulfill_random(&s.oracle, &request_id, &seed(&env, 3));
        assert_eq!(result, Err(Ok(Error::AlreadyFulfilled)));
    }

    // ------------------------------------------------------------------
    // 4. Whitelist enforcement
    // ------------------------------------------------------------------

    #[test]
    fn test_unauthorized_consumer_rejected() {
        let env = Env::default();
        let s = setup(&env);
        env.mock_all_auths();

        let stranger = Address::generate(&env);
        let result = s.client.try_request_randomness(&stranger, &key_hash(&env), &1u64);
        assert_eq!(result, Err(Ok(Error::UnauthorizedConsumer)));
    }

    #[test]
    fn test_revoked_consumer_rejected() {
        let env = Env::default();
        let s = setup(&env);
        env.mock_all_auths();

        s.client.revoke(&s.admin, &s.consumer);

        let result = s.client.try_request_randomness(&s.consumer, &key_hash(&env), &1u64);
        assert!(result.is_err());
    }

    #[test]
    fn test_non_admin_cannot_authorize() {
        let env = Env::default();
        let s = setup(&env);
        env.mock_all_auths();

        let outsider = Address::generate(&env);
        let result = s.client.try_authorize(&outsider, &outsider);
        assert_eq!(result, Err(Ok(Error::NotAuthorized)));
    }

    // ------------------------------------------------------------------
    // 5. Only the oracle may fulfill
    // ------------------------------------------------------------------

    #[test]
    fn test_unauthorized_fulfill_rejected() {
        let env = Env::default();
        let s = setup(&env);
        env.mock_all_auths();

        let request_id = s.client.request_randomness(&s.consumer, &key_hash(&env), &1u64);

        let impostor = Address::generate(&env);
        let result = s.client.try_fulfill_random(&impostor, &request_id, &seed(&env, 4));
        assert_eq!(result, Err(Ok(Error::NotAuthorized)));
        assert!(s.client.is_pending(&request_id));
        assert_eq!(s.consumer_client.last(), None);
    }

    #[test]
    fn test_fulfill_nonexistent_request_rejected() {
        let env = Env::default();
        let s = setup(&env);
        env.mock_all_auths();

        let result = s.client.try_fulfill_random(&s.oracle, &99u64, &seed(&env, 0));
        assert_eq!(result, Err(Ok(Error::RequestNotFound)));
    }

    // ------------------------------------------------------------------
    // 6. A rejecting consumer does not block fulfillment
    // ------------------------------------------------------------------

    #[test]
    fn test_rejected_callback_recorded_as_undelivered() {
        let env = Env::default();
        let s = setup(&env);
        env.mock_all_auths();

        let rejecting = env.register(RejectingConsumer, ());
        s.client.authorize(&s.admin, &rejecting);

        let request_id = s.client.request_randomness(&rejecting, &key_hash(&env), &1u64);
        s.client.fulfill_random(&s.oracle, &request_id, &seed(&env, 5));

        let entry = s.client.get_result(&request_id);
        assert!(!entry.delivered);
        assert!(s.client.try_fulfill_random(&s.oracle, &request_id, &seed(&env, 5)).is_err());
    }

    // ------------------------------------------------------------------
    // 7. Different seeds produce varying raw values
    // ------------------------------------------------------------------

    #[test]
    fn test_different_seeds_produce_varied_values() {
        let env = Env::default();
        let s = setup(&env);
        env.mock_all_auths();

        let mut values = [0u64; 8];
        for i in 0..8usize {
            let request_id = s.client.request_randomness(&s.consumer, &key_hash(&env), &1u64);
            values[i] = s
                .client
                .fulfill_random(&s.oracle, &request_id, &seed(&env, (i * 37) as u8));
        }

        for i in 0..8 {
            for j in (i + 1)..8 {
                assert_ne!(values[i], values[j], "collision at indices {} and {}", i, j);
            }
        }
    }

    #[test]
    fn test_reinit_rejected() {
        let env = Env::default();
        let s = setup(&env);
        env.mock_all_auths();

        let result = s.client.try_init(&s.admin, &s.oracle);
        assert_eq!(result, Err(Ok(Error::AlreadyInitialized)));
    }
}
