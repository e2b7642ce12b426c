//! Roulette Contract
//!
//! A round-based roulette table on a single-zero (37 slot) wheel. Bettors
//! stake a SEP-41 token on a straight number or a color; one value from an
//! external VRF coordinator decides the whole round.
//!
//! ## Round Flow
//! 1. **Open**: `place_bet` validates the stake, pulls it into the pool and
//!    appends the bet to the round's registry.
//! 2. Anyone calls `close_and_request_randomness`: the round becomes
//!    **Pending** on the returned request id and rejects new bets.
//! 3. The coordinator calls `on_randomness_delivered` with that request id.
//!    `raw_value % 37` is the winning slot; every bet is settled in
//!    registry order, the registry is cleared and the next round opens.
//!
//! ## Payout
//! Straight number: `36 * stake`. Red / Black: `2 * stake`; zero is neither
//! color. Losing stakes stay in the pool.
//!
//! ## Failed Payouts
//! A winner whose transfer fails (pool short of funds) is not dropped and
//! does not block the round: the amount is recorded as claimable credit and
//! paid through `claim`. The owner can only withdraw what is not owed.
//!
//! ## Storage Strategy
//! - `instance()`: owner, token, coordinator, key hash, subscription id,
//!   stake limits, last winning slot.
//! - `persistent()`: the live `Round` and per-bettor claimable credit, TTL
//!   bumped on every write.
#![no_std]
#![allow(unexpected_cfgs)]

use soroban_sdk::{
    contract, contracterror, contractevent, contractimpl, contracttype, Address, BytesN, Env, Vec,
};

mod access;
pub mod ledger;
pub mod payout;
pub mod randomness;

pub use payout::{Selector, BLACK_SELECTOR, RED_SELECTOR};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const PERSISTENT_BUMP_LEDGERS: u32 = 518_400;

/// $1 on a 6-decimal asset.
pub const DEFAULT_MIN_BET: i128 = 1_000_000;
/// $5,000 on a 6-decimal asset.
pub const DEFAULT_MAX_BET: i128 = 5_000_000_000;
/// Upper bound on bets settled in one callback. A full round of winners must
/// settle inside a single invocation's default CPU budget.
pub const MAX_BETS_PER_ROUND: u32 = 16;
/// Largest stake for which a full round of straight wins still sums inside an
/// `i128`.
pub const MAX_STAKE: i128 =
    i128::MAX / (payout::STRAIGHT_MULTIPLIER * MAX_BETS_PER_ROUND as i128);

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum Error {
    AlreadyInitialized      = 1,
    NotInitialized          = 2,
    NotAuthorized           = 3,
    InvalidAmount           = 4,
    InvalidSelector         = 5,
    BetTooSmall             = 6,
    BetTooLarge             = 7,
    InvalidBetLimits        = 8,
    BettingClosed           = 9,
    RequestAlreadyPending   = 10,
    /// Delivery for a request that is not the one the round is waiting on.
    StaleRequest            = 11,
    RoundFull               = 12,
    TransferFailed          = 13,
    RandomnessRequestFailed = 14,
    InsufficientBalance     = 15,
    NothingToClaim          = 16,
    BetNotFound             = 17,
    Overflow                = 18,
}

// ---------------------------------------------------------------------------
// Storage types
// ---------------------------------------------------------------------------

#[contracttype]
#[derive(Clone)]
pub enum DataKey {
    // --- instance() ---
    Owner,
    Token,
    Coordinator,
    KeyHash,
    SubscriptionId,
    MinBet,
    MaxBet,
    LastWinningSlot,
    // --- persistent() ---
    Round,
    Claimable(Address),
    TotalOwed,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Bet {
    pub bettor: Address,
    pub amount: i128,
    pub selector: Selector,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RoundStatus {
    Open,
    /// Waiting on the coordinator for this request id.
    Pending(u64),
}

/// The single live round. Bets are indexed by position in `bets`.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Round {
    pub number: u64,
    pub status: RoundStatus,
    pub bets: Vec<Bet>,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RouletteConfig {
    pub owner: Address,
    pub token: Address,
    pub coordinator: Address,
    pub key_hash: BytesN<32>,
    pub subscription_id: u64,
    pub min_bet: i128,
    pub max_bet: i128,
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[contractevent]
pub struct Initialized {
    pub owner: Address,
    pub token: Address,
    pub coordinator: Address,
}

#[contractevent]
pub struct BetPlaced {
    #[topic]
    pub round: u64,
    #[topic]
    pub bettor: Address,
    pub amount: i128,
    pub index: u32,
    pub selector: u32,
}

#[contractevent]
pub struct RandomnessRequested {
    #[topic]
    pub request_id: u64,
    pub round: u64,
}

#[contractevent]
pub struct BetPaid {
    #[topic]
    pub round: u64,
    #[topic]
    pub bettor: Address,
    pub index: u32,
    pub amount: i128,
}

#[contractevent]
pub struct PayoutDeferred {
    #[topic]
    pub round: u64,
    #[topic]
    pub bettor: Address,
    pub index: u32,
    pub amount: i128,
}

#[contractevent]
pub struct RoundSettled {
    #[topic]
    pub round: u64,
    pub request_id: u64,
    pub winning_slot: u32,
    pub total_paid: i128,
    pub total_deferred: i128,
}

#[contractevent]
pub struct CreditClaimed {
    #[topic]
    pub bettor: Address,
    pub amount: i128,
}

#[contractevent]
pub struct Withdrawn {
    #[topic]
    pub owner: Address,
    pub amount: i128,
}

#[contractevent]
pub struct MinBetUpdated {
    pub min_bet: i128,
}

#[contractevent]
pub struct MaxBetUpdated {
    pub max_bet: i128,
}

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

#[contract]
pub struct Roulette;

#[contractimpl]
impl Roulette {
    /// Initialize the table. May only be called once.
    ///
    /// `key_hash` and `subscription_id` are forwarded to the coordinator with
    /// every randomness request. The round starts open and empty.
    #[allow(clippy::too_many_arguments)]
    pub fn init(
        env: Env,
        owner: Address,
        coordinator: Address,
        key_hash: BytesN<32>,
        subscription_id: u64,
        token: Address,
        min_bet: i128,
        max_bet: i128,
    ) -> Result<(), Error> {
        if env.storage().instance().has(&DataKey::Owner) {
            return Err(Error::AlreadyInitialized);
        }
        owner.require_auth();

        if min_bet <= 0 || max_bet > MAX_STAKE {
            return Err(Error::InvalidAmount);
        }
        if min_bet > max_bet {
            return Err(Error::InvalidBetLimits);
        }

        env.storage().instance().set(&DataKey::Owner, &owner);
        env.storage().instance().set(&DataKey::Token, &token);
        env.storage().instance().set(&DataKey::Coordinator, &coordinator);
        env.storage().instance().set(&DataKey::KeyHash, &key_hash);
        env.storage()
            .instance()
            .set(&DataKey::SubscriptionId, &subscription_id);
        env.storage().instance().set(&DataKey::MinBet, &min_bet);
        env.storage().instance().set(&DataKey::MaxBet, &max_bet);

        save_round(
            &env,
            &Round {
                number: 1,
                status: RoundStatus::Open,
                bets: Vec::new(&env),
            },
        );

        Initialized {
            owner,
            token,
            coordinator,
        }
        .publish(&env);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Round engine
    // -----------------------------------------------------------------------

    /// Stake `amount` on `selector` (0–36 straight, 37 red, 38 black).
    /// Returns the bet's index within the current round.
    pub fn place_bet(env: Env, bettor: Address, amount: i128, selector: u32) -> Result<u32, Error> {
        access::require_initialized(&env)?;
        bettor.require_auth();

        let mut round = load_round(&env)?;
        if round.status != RoundStatus::Open {
            return Err(Error::BettingClosed);
        }

        let selector = Selector::from_code(selector)?;
        if amount <= 0 {
            return Err(Error::InvalidAmount);
        }
        if amount < get_i128(&env, DataKey::MinBet)? {
            return Err(Error::BetTooSmall);
        }
        if amount > get_i128(&env, DataKey::MaxBet)? {
            return Err(Error::BetTooLarge);
        }

        let index = round.bets.len();
        if index >= MAX_BETS_PER_ROUND {
            return Err(Error::RoundFull);
        }

        ledger::debit(&env, &bettor, amount)?;

        let code = selector.code();
        round.bets.push_back(Bet {
            bettor: bettor.clone(),
            amount,
            selector,
        });
        save_round(&env, &round);

        BetPlaced {
            round: round.number,
            bettor,
            amount,
            index,
            selector: code,
        }
        .publish(&env);
        Ok(index)
    }

    /// Close the round and ask the coordinator for randomness. Callable by
    /// anyone; returns the request id the round now waits on.
    pub fn close_and_request_randomness(env: Env) -> Result<u64, Error> {
        access::require_initialized(&env)?;

        let mut round = load_round(&env)?;
        if round.status != RoundStatus::Open {
            return Err(Error::RequestAlreadyPending);
        }

        let request_id = randomness::request(&env)?;
        round.status = RoundStatus::Pending(request_id);
        save_round(&env, &round);

        RandomnessRequested {
            request_id,
            round: round.number,
        }
        .publish(&env);
        Ok(request_id)
    }

    /// Coordinator callback. Settles every bet of the pending round against
    /// `raw_value % 37` and reopens betting.
    pub fn on_randomness_delivered(
        env: Env,
        coordinator: Address,
        request_id: u64,
        raw_value: u64,
    ) -> Result<(), Error> {
        access::require_initialized(&env)?;
        access::require_coordinator(&env, &coordinator)?;

        let round = load_round(&env)?;
        match round.status {
            RoundStatus::Pending(pending) if pending == request_id => {}
            _ => return Err(Error::StaleRequest),
        }

        let winning_slot = randomness::winning_slot(raw_value);

        // Reopen before any transfer leaves the contract.
        save_round(
            &env,
            &Round {
                number: round.number.checked_add(1).ok_or(Error::Overflow)?,
                status: RoundStatus::Open,
                bets: Vec::new(&env),
            },
        );
        env.storage()
            .instance()
            .set(&DataKey::LastWinningSlot, &winning_slot);

        let mut total_paid = 0i128;
        let mut total_deferred = 0i128;
        for (index, bet) in round.bets.iter().enumerate() {
            let multiplier = payout::multiplier(&bet.selector, winning_slot);
            if multiplier == 0 {
                continue;
            }
            // Stakes are capped at MAX_STAKE, so neither this nor the round
            // totals can leave the i128 range.
            let winnings = bet.amount.saturating_mul(multiplier);
            let index = index as u32;

            match ledger::credit(&env, &bet.bettor, winnings) {
                Ok(()) => {
                    total_paid = total_paid.saturating_add(winnings);
                    BetPaid {
                        round: round.number,
                        bettor: bet.bettor,
                        index,
                        amount: winnings,
                    }
                    .publish(&env);
                }
                Err(_) => {
                    ledger::defer(&env, &bet.bettor, winnings);
                    total_deferred = total_deferred.saturating_add(winnings);
                    PayoutDeferred {
                        round: round.number,
                        bettor: bet.bettor,
                        index,
                        amount: winnings,
                    }
                    .publish(&env);
                }
            }
        }

        RoundSettled {
            round: round.number,
            request_id,
            winning_slot,
            total_paid,
            total_deferred,
        }
        .publish(&env);
        Ok(())
    }

    /// Pay out credit recorded for `bettor` by an earlier failed payout.
    pub fn claim(env: Env, bettor: Address) -> Result<i128, Error> {
        access::require_initialized(&env)?;
        bettor.require_auth();

        let amount = ledger::take_owed(&env, &bettor);
        if amount == 0 {
            return Err(Error::NothingToClaim);
        }
        ledger::credit(&env, &bettor, amount)?;

        CreditClaimed { bettor, amount }.publish(&env);
        Ok(amount)
    }

    // -----------------------------------------------------------------------
    // Owner operations
    // -----------------------------------------------------------------------

    /// Move `amount` of unowed pool balance to the owner.
    pub fn withdraw(env: Env, owner: Address, amount: i128) -> Result<(), Error> {
        access::require_initialized(&env)?;
        access::require_owner(&env, &owner)?;

        if amount <= 0 {
            return Err(Error::InvalidAmount);
        }
        let available = ledger::balance(&env)?
            .checked_sub(ledger::total_owed(&env))
            .ok_or(Error::Overflow)?;
        if amount > available {
            return Err(Error::InsufficientBalance);
        }

        ledger::credit(&env, &owner, amount)?;

        Withdrawn { owner, amount }.publish(&env);
        Ok(())
    }

    /// Rejects a minimum above the current maximum.
    pub fn set_min_bet(env: Env, owner: Address, amount: i128) -> Result<(), Error> {
        access::require_initialized(&env)?;
        access::require_owner(&env, &owner)?;

        if amount <= 0 {
            return Err(Error::InvalidAmount);
        }
        if amount > get_i128(&env, DataKey::MaxBet)? {
            return Err(Error::InvalidBetLimits);
        }

        env.storage().instance().set(&DataKey::MinBet, &amount);
        MinBetUpdated { min_bet: amount }.publish(&env);
        Ok(())
    }

    /// Rejects a maximum below the current minimum.
    pub fn set_max_bet(env: Env, owner: Address, amount: i128) -> Result<(), Error> {
        access::require_initialized(&env)?;
        access::require_owner(&env, &owner)?;

        if amount <= 0 || amount > MAX_STAKE {
            return Err(Error::InvalidAmount);
        }
        if amount < get_i128(&env, DataKey::MinBet)? {
            return Err(Error::InvalidBetLimits);
        }

        env.storage().instance().set(&DataKey::MaxBet, &amount);
        MaxBetUpdated { max_bet: amount }.publish(&env);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn get_accepting_bets(env: Env) -> Result<bool, Error> {
        Ok(load_round(&env)?.status == RoundStatus::Open)
    }

    pub fn get_count_bets(env: Env) -> Result<u32, Error> {
        Ok(load_round(&env)?.bets.len())
    }

    pub fn get_min_bet(env: Env) -> Result<i128, Error> {
        get_i128(&env, DataKey::MinBet)
    }

    pub fn get_max_bet(env: Env) -> Result<i128, Error> {
        get_i128(&env, DataKey::MaxBet)
    }

    /// Pooled balance, read live from the token.
    pub fn get_balance(env: Env) -> Result<i128, Error> {
        access::require_initialized(&env)?;
        ledger::balance(&env)
    }

    pub fn get_bet(env: Env, index: u32) -> Result<Bet, Error> {
        load_round(&env)?.bets.get(index).ok_or(Error::BetNotFound)
    }

    pub fn get_round(env: Env) -> Result<Round, Error> {
        load_round(&env)
    }

    pub fn get_pending_request(env: Env) -> Result<Option<u64>, Error> {
        Ok(match load_round(&env)?.status {
            RoundStatus::Pending(request_id) => Some(request_id),
            RoundStatus::Open => None,
        })
    }

    /// Winning slot of the most recently settled round, if any.
    pub fn get_last_winning_slot(env: Env) -> Option<u32> {
        env.storage().instance().get(&DataKey::LastWinningSlot)
    }

    pub fn get_claimable(env: Env, bettor: Address) -> i128 {
        ledger::owed_to(&env, &bettor)
    }

    pub fn get_total_owed(env: Env) -> i128 {
        ledger::total_owed(&env)
    }

    pub fn get_config(env: Env) -> Result<RouletteConfig, Error> {
        access::require_initialized(&env)?;

        Ok(RouletteConfig {
            owner: access::owner(&env)?,
            token: env
                .storage()
                .instance()
                .get(&DataKey::Token)
                .ok_or(Error::NotInitialized)?,
            coordinator: randomness::coordinator(&env)?,
            key_hash: env
                .storage()
                .instance()
                .get(&DataKey::KeyHash)
                .ok_or(Error::NotInitialized)?,
            subscription_id: env
                .storage()
                .instance()
                .get(&DataKey::SubscriptionId)
                .ok_or(Error::NotInitialized)?,
            min_bet: get_i128(&env, DataKey::MinBet)?,
            max_bet: get_i128(&env, DataKey::MaxBet)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn load_round(env: &Env) -> Result<Round, Error> {
    env.storage()
        .persistent()
        .get(&DataKey::Round)
        .ok_or(Error::NotInitialized)
}

fn save_round(env: &Env, round: &Round) {
    env.storage().persistent().set(&DataKey::Round, round);
    env.storage()
        .persistent()
        .extend_ttl(&DataKey::Round, PERSISTENT_BUMP_LEDGERS, PERSISTENT_BUMP_LEDGERS);
}

fn get_i128(env: &Env, key: DataKey) -> Result<i128, Error> {
    env.storage()
        .instance()
        .get(&key)
        .ok_or(Error::NotInitialized)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
