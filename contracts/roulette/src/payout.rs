//! Payout table for a single-zero (37 slot) wheel.
//!
//! Every bet either wins `stake * multiplier` or loses its whole stake;
//! there are no pushes.

use soroban_sdk::contracttype;

use crate::Error;

/// Number of slots on the wheel: 0 plus 1–36.
pub const WHEEL_SLOTS: u32 = 37;
pub const MAX_SLOT: u32 = 36;

/// Wire encoding of the two color selectors, distinct from slot numbers.
pub const RED_SELECTOR: u32 = 37;
pub const BLACK_SELECTOR: u32 = 38;

/// Straight-up win: stake back plus 35x.
pub const STRAIGHT_MULTIPLIER: i128 = 36;
/// Color win: stake back plus 1x.
pub const COLOR_MULTIPLIER: i128 = 2;

/// Standard layout; every other slot in 1–36 is black, 0 is neither.
const RED_SLOTS: [u32; 18] = [
    1, 3, 5, 7, 9, 12, 14, 16, 18, 19, 21, 23, 25, 27, 30, 32, 34, 36,
];

/// The outcome a bet targets.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Selector {
    Straight(u32),
    Red,
    Black,
}

impl Selector {
    pub fn from_code(code: u32) -> Result<Self, Error> {
        match code {
            0..=MAX_SLOT => Ok(Selector::Straight(code)),
            RED_SELECTOR => Ok(Selector::Red),
            BLACK_SELECTOR => Ok(Selector::Black),
            _ => Err(Error::InvalidSelector),
        }
    }

    pub fn code(&self) -> u32 {
        match self {
            Selector::Straight(slot) => *slot,
            Selector::Red => RED_SELECTOR,
            Selector::Black => BLACK_SELECTOR,
        }
    }
}

pub fn is_red(slot: u32) -> bool {
    RED_SLOTS.contains(&slot)
}

pub fn is_black(slot: u32) -> bool {
    slot != 0 && slot <= MAX_SLOT && !is_red(slot)
}

/// Multiplier credited for `selector` when the wheel lands on `winning_slot`.
/// Zero means the stake is forfeited.
pub fn multiplier(selector: &Selector, winning_slot: u32) -> i128 {
    match selector {
        Selector::Straight(slot) if *slot == winning_slot => STRAIGHT_MULTIPLIER,
        Selector::Red if is_red(winning_slot) => COLOR_MULTIPLIER,
        Selector::Black if is_black(winning_slot) => COLOR_MULTIPLIER,
        _ => 0,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_colors_partition_one_to_thirty_six() {
        let reds = (1..=MAX_SLOT).filter(|s| is_red(*s)).count();
        let blacks = (1..=MAX_SLOT).filter(|s| is_black(*s)).count();
        assert_eq!(reds, 18);
        assert_eq!(blacks, 18);
        for slot in 1..=MAX_SLOT {
            assert_ne!(is_red(slot), is_black(slot), "slot {} has no single color", slot);
        }
    }

    #[test]
    fn test_zero_has_no_color() {
        assert!(!is_red(0));
        assert!(!is_black(0));
        assert_eq!(multiplier(&Selector::Red, 0), 0);
        assert_eq!(multiplier(&Selector::Black, 0), 0);
    }

    #[test]
    fn test_known_layout_slots() {
        assert!(is_black(28));
        assert!(is_red(12));
        assert!(is_black(31));
        assert!(is_black(13));
        assert!(is_red(23));
    }

    #[test]
    fn test_straight_pays_only_on_exact_slot() {
        for slot in 0..=MAX_SLOT {
            for winning in 0..=MAX_SLOT {
                let expected = if slot == winning { STRAIGHT_MULTIPLIER } else { 0 };
                assert_eq!(multiplier(&Selector::Straight(slot), winning), expected);
            }
        }
    }

    #[test]
    fn test_color_pays_double() {
        assert_eq!(multiplier(&Selector::Red, 1), COLOR_MULTIPLIER);
        assert_eq!(multiplier(&Selector::Red, 2), 0);
        assert_eq!(multiplier(&Selector::Black, 2), COLOR_MULTIPLIER);
        assert_eq!(multiplier(&Selector::Black, 36), 0);
    }

    #[test]
    fn test_selector_codes() {
        assert_eq!(Selector::from_code(0), Ok(Selector::Straight(0)));
        assert_eq!(Selector::from_code(36), Ok(Selector::Straight(36)));
        assert_eq!(Selector::from_code(37), Ok(Selector::Red));
        assert_eq!(Selector::from_code(38), Ok(Selector::Black));
        assert_eq!(Selector::from_code(39), Err(Error::InvalidSelector));
        assert_eq!(Selector::from_code(u32::MAX), Err(Error::InvalidSelector));
        assert_eq!(Selector::Black.code(), BLACK_SELECTOR);
    }
}
