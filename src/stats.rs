//! Aggregate entities maintained by the indexer.
//!
//! Every aggregate is keyed by a deterministic identifier derived from event
//! data, so reprocessing an event always targets the same record:
//!
//! | Entity | Key |
//! |---|---|
//! | [`GlobalStats`] | [`GLOBAL_STATS_ID`] |
//! | [`PlayerStats`] | lower-cased wallet |
//! | [`WeeklyStats`] | week (decimal) |
//! | [`PlayerWeeklyStats`] | `<wallet>_<week>` |
//! | [`JackpotStats`] | nonce (decimal) |
//! | [`JackpotPlayerSeen`] | `<nonce>_<wallet>` |
//!
//! Event and claimer counters are 256-bit unsigned integers. Summed amounts
//! are unbounded, since a single `uint256` amount can already fill 256 bits.
//! Net profit is an unbounded signed integer: purchases subtract from it and
//! claims add to it.

use alloy::primitives::U256;
use num_bigint::{BigInt, BigUint};

use crate::error::{IndexerError, IndexerResult};

/// Key of the singleton [`GlobalStats`] record.
pub const GLOBAL_STATS_ID: &str = "global";

/// Block metadata stamped onto every record an event touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockMeta {
    /// Block number
    pub number: u64,
    /// Block timestamp (Unix epoch seconds)
    pub timestamp: u64,
}

impl BlockMeta {
    /// Create block metadata.
    #[must_use]
    pub const fn new(number: u64, timestamp: u64) -> Self {
        Self { number, timestamp }
    }
}

/// Lower-case a wallet address so mixed-case inputs share one identity.
///
/// # Example
///
/// ```
/// use keyvault_indexer::stats::normalize_wallet;
///
/// assert_eq!(normalize_wallet("0xABCdef"), "0xabcdef");
/// ```
#[must_use]
pub fn normalize_wallet(wallet: &str) -> String {
    wallet.to_ascii_lowercase()
}

/// Key of a [`WeeklyStats`] record.
#[must_use]
pub fn weekly_id(week: U256) -> String {
    week.to_string()
}

/// Key of a [`PlayerWeeklyStats`] record.
#[must_use]
pub fn player_weekly_id(wallet: &str, week: U256) -> String {
    format!("{wallet}_{week}")
}

/// Key of a [`JackpotStats`] record.
#[must_use]
pub fn jackpot_id(nonce: U256) -> String {
    nonce.to_string()
}

/// Key of a [`JackpotPlayerSeen`] fact.
#[must_use]
pub fn jackpot_player_seen_id(nonce: U256, wallet: &str) -> String {
    format!("{nonce}_{wallet}")
}

fn one() -> U256 {
    U256::from(1u64)
}

/// Add two counters, failing instead of wrapping.
pub(crate) fn add(field: &str, lhs: U256, rhs: U256) -> IndexerResult<U256> {
    lhs.checked_add(rhs)
        .ok_or_else(|| IndexerError::math(format!("{field} overflowed 256 bits"), None))
}

/// Widen an event amount into an unbounded sum operand.
///
/// ```
/// use alloy::primitives::U256;
/// use keyvault_indexer::stats::widen;
///
/// assert_eq!(widen(U256::from(30u64)).to_string(), "30");
/// assert_eq!(widen(U256::MAX).to_string(), U256::MAX.to_string());
/// ```
#[must_use]
pub fn widen(amount: U256) -> BigUint {
    BigUint::from_bytes_be(&amount.to_be_bytes::<32>())
}

/// Economic counters shared by the global and per-player scopes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Totals {
    /// Number of `KeysPurchased` events
    pub key_purchase_events: U256,
    /// Sum of purchased key quantities
    pub keys_purchased: BigUint,
    /// Sum of `totalPaid` over purchases
    pub key_purchase_amount: BigUint,
    /// Number of `WeeklyClaimed` events
    pub weekly_claim_events: U256,
    /// Sum of weekly claim amounts
    pub weekly_claim_amount: BigUint,
    /// Number of `JackpotClaimed` events
    pub jackpot_claim_events: U256,
    /// Sum of jackpot claim amounts
    pub jackpot_claim_amount: BigUint,
    /// `weekly_claim_amount + jackpot_claim_amount`
    pub total_claim_amount: BigUint,
    /// Purchases subtract, claims add
    pub net_profit_amount: BigInt,
}

impl Totals {
    /// Apply one key purchase.
    ///
    /// # Errors
    ///
    /// Returns a math error if the event counter would overflow.
    pub fn apply_purchase(&mut self, quantity: U256, total_paid: U256) -> IndexerResult<()> {
        self.key_purchase_events = add("keyPurchaseEvents", self.key_purchase_events, one())?;
        let paid = widen(total_paid);
        self.keys_purchased += widen(quantity);
        self.net_profit_amount -= BigInt::from(paid.clone());
        self.key_purchase_amount += paid;
        Ok(())
    }

    /// Apply one weekly claim.
    ///
    /// # Errors
    ///
    /// Returns a math error if the event counter would overflow.
    pub fn apply_weekly_claim(&mut self, amount: U256) -> IndexerResult<()> {
        self.weekly_claim_events = add("weeklyClaimEvents", self.weekly_claim_events, one())?;
        let amount = widen(amount);
        self.weekly_claim_amount += &amount;
        self.apply_claim_totals(amount);
        Ok(())
    }

    /// Apply one jackpot claim.
    ///
    /// # Errors
    ///
    /// Returns a math error if the event counter would overflow.
    pub fn apply_jackpot_claim(&mut self, amount: U256) -> IndexerResult<()> {
        self.jackpot_claim_events = add("jackpotClaimEvents", self.jackpot_claim_events, one())?;
        let amount = widen(amount);
        self.jackpot_claim_amount += &amount;
        self.apply_claim_totals(amount);
        Ok(())
    }

    fn apply_claim_totals(&mut self, amount: BigUint) {
        self.total_claim_amount += &amount;
        self.net_profit_amount += BigInt::from(amount);
    }
}

/// Protocol-wide totals. A single record keyed by [`GLOBAL_STATS_ID`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalStats {
    /// Distinct wallets seen in any economic event
    pub total_unique_players: U256,
    /// Economic counters
    pub totals: Totals,
    /// Block of the last update
    pub updated_at_block: u64,
    /// Timestamp of the last update
    pub updated_at_timestamp: u64,
}

impl GlobalStats {
    /// Zeroed record stamped with the triggering block.
    #[must_use]
    pub fn new(block: BlockMeta) -> Self {
        Self {
            total_unique_players: U256::ZERO,
            totals: Totals::default(),
            updated_at_block: block.number,
            updated_at_timestamp: block.timestamp,
        }
    }

    /// Count a wallet the first time it appears.
    ///
    /// # Errors
    ///
    /// Returns a math error on overflow.
    pub fn count_player(&mut self, is_new_player: bool) -> IndexerResult<()> {
        if is_new_player {
            self.total_unique_players =
                add("totalUniquePlayers", self.total_unique_players, one())?;
        }
        Ok(())
    }

    /// Stamp the record with the block that last touched it.
    pub fn touch(&mut self, block: BlockMeta) {
        self.updated_at_block = block.number;
        self.updated_at_timestamp = block.timestamp;
    }
}

/// Identity profile attached to a player on creation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlayerProfile {
    /// Display name
    pub name: Option<String>,
    /// Avatar image URL
    pub image_url: Option<String>,
    /// Verification tier reported by the profile service
    pub verification: Option<String>,
    /// Whether enrichment ran for this wallet
    pub fetch_attempted: bool,
    /// Event timestamp at which enrichment ran
    pub fetched_at_timestamp: Option<u64>,
}

/// Per-wallet totals plus the enrichment profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerStats {
    /// Lower-cased wallet address (record key)
    pub wallet: String,
    /// Profile fields, set once at creation
    pub profile: PlayerProfile,
    /// Block where the wallet first appeared
    pub first_seen_block: u64,
    /// Timestamp where the wallet first appeared
    pub first_seen_timestamp: u64,
    /// Block of the last update
    pub updated_at_block: u64,
    /// Timestamp of the last update
    pub updated_at_timestamp: u64,
    /// Economic counters
    pub totals: Totals,
}

impl PlayerStats {
    /// Zeroed record for `wallet`, first seen at `block`.
    #[must_use]
    pub fn new(wallet: impl Into<String>, block: BlockMeta) -> Self {
        Self {
            wallet: wallet.into(),
            profile: PlayerProfile::default(),
            first_seen_block: block.number,
            first_seen_timestamp: block.timestamp,
            updated_at_block: block.number,
            updated_at_timestamp: block.timestamp,
            totals: Totals::default(),
        }
    }

    /// Stamp the record with the block that last touched it.
    pub fn touch(&mut self, block: BlockMeta) {
        self.updated_at_block = block.number;
        self.updated_at_timestamp = block.timestamp;
    }
}

/// Totals for one claim week.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeeklyStats {
    /// Week number
    pub week: U256,
    /// Number of claims in this week
    pub weekly_claim_events: U256,
    /// Sum of claimed amounts in this week
    pub weekly_claim_amount: BigUint,
    /// Distinct wallets that claimed in this week
    pub unique_claimers: U256,
    /// Block of the last update
    pub updated_at_block: u64,
    /// Timestamp of the last update
    pub updated_at_timestamp: u64,
}

impl WeeklyStats {
    /// Zeroed record for `week`.
    #[must_use]
    pub fn new(week: U256, block: BlockMeta) -> Self {
        Self {
            week,
            weekly_claim_events: U256::ZERO,
            weekly_claim_amount: BigUint::default(),
            unique_claimers: U256::ZERO,
            updated_at_block: block.number,
            updated_at_timestamp: block.timestamp,
        }
    }

    /// Record key.
    #[must_use]
    pub fn id(&self) -> String {
        weekly_id(self.week)
    }

    /// Apply one claim; `is_new_claimer` bumps `unique_claimers`.
    ///
    /// # Errors
    ///
    /// Returns a math error on overflow.
    pub fn apply_claim(
        &mut self,
        amount: U256,
        is_new_claimer: bool,
        block: BlockMeta,
    ) -> IndexerResult<()> {
        self.weekly_claim_events = add("weeklyClaimEvents", self.weekly_claim_events, one())?;
        self.weekly_claim_amount += widen(amount);
        if is_new_claimer {
            self.unique_claimers = add("uniqueClaimers", self.unique_claimers, one())?;
        }
        self.updated_at_block = block.number;
        self.updated_at_timestamp = block.timestamp;
        Ok(())
    }
}

/// One wallet's claims within one week.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerWeeklyStats {
    /// Lower-cased wallet
    pub wallet: String,
    /// Week number
    pub week: U256,
    /// Claims by this wallet in this week
    pub weekly_claim_events: U256,
    /// Amount claimed by this wallet in this week
    pub weekly_claim_amount: BigUint,
    /// Block of the first claim
    pub first_claim_block: u64,
    /// Timestamp of the first claim
    pub first_claim_timestamp: u64,
    /// Block of the latest claim
    pub last_claim_block: u64,
    /// Timestamp of the latest claim
    pub last_claim_timestamp: u64,
}

impl PlayerWeeklyStats {
    /// Record for a wallet's first claim of the week.
    #[must_use]
    pub fn first_claim(wallet: impl Into<String>, week: U256, amount: U256, block: BlockMeta) -> Self {
        Self {
            wallet: wallet.into(),
            week,
            weekly_claim_events: one(),
            weekly_claim_amount: widen(amount),
            first_claim_block: block.number,
            first_claim_timestamp: block.timestamp,
            last_claim_block: block.number,
            last_claim_timestamp: block.timestamp,
        }
    }

    /// Record key.
    #[must_use]
    pub fn id(&self) -> String {
        player_weekly_id(&self.wallet, self.week)
    }

    /// Apply a repeat claim; the first-claim fields are left untouched.
    ///
    /// # Errors
    ///
    /// Returns a math error on overflow.
    pub fn apply_repeat_claim(&mut self, amount: U256, block: BlockMeta) -> IndexerResult<()> {
        self.weekly_claim_events = add("weeklyClaimEvents", self.weekly_claim_events, one())?;
        self.weekly_claim_amount += widen(amount);
        self.last_claim_block = block.number;
        self.last_claim_timestamp = block.timestamp;
        Ok(())
    }
}

/// Totals for one jackpot round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JackpotStats {
    /// Jackpot nonce
    pub nonce: U256,
    /// Number of claims for this nonce
    pub jackpot_claim_events: U256,
    /// Sum of claimed amounts for this nonce
    pub jackpot_claim_amount: BigUint,
    /// Distinct wallets that claimed this nonce
    pub unique_claimers: U256,
    /// Block of the last update
    pub updated_at_block: u64,
    /// Timestamp of the last update
    pub updated_at_timestamp: u64,
}

impl JackpotStats {
    /// Zeroed record for `nonce`.
    #[must_use]
    pub fn new(nonce: U256, block: BlockMeta) -> Self {
        Self {
            nonce,
            jackpot_claim_events: U256::ZERO,
            jackpot_claim_amount: BigUint::default(),
            unique_claimers: U256::ZERO,
            updated_at_block: block.number,
            updated_at_timestamp: block.timestamp,
        }
    }

    /// Record key.
    #[must_use]
    pub fn id(&self) -> String {
        jackpot_id(self.nonce)
    }

    /// Apply one claim; `is_new_claimer` bumps `unique_claimers`.
    ///
    /// # Errors
    ///
    /// Returns a math error on overflow.
    pub fn apply_claim(
        &mut self,
        amount: U256,
        is_new_claimer: bool,
        block: BlockMeta,
    ) -> IndexerResult<()> {
        self.jackpot_claim_events = add("jackpotClaimEvents", self.jackpot_claim_events, one())?;
        self.jackpot_claim_amount += widen(amount);
        if is_new_claimer {
            self.unique_claimers = add("uniqueClaimers", self.unique_claimers, one())?;
        }
        self.updated_at_block = block.number;
        self.updated_at_timestamp = block.timestamp;
        Ok(())
    }
}

/// Write-once fact: `wallet` has been counted for jackpot `nonce`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JackpotPlayerSeen {
    /// Jackpot nonce
    pub nonce: U256,
    /// Lower-cased wallet
    pub wallet: String,
}

impl JackpotPlayerSeen {
    /// Record key.
    #[must_use]
    pub fn id(&self) -> String {
        jackpot_player_seen_id(self.nonce, &self.wallet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLOCK: BlockMeta = BlockMeta::new(100, 1_700_000_000);

    #[test]
    fn test_identifiers_are_deterministic() {
        let week = U256::from(7u64);
        let nonce = U256::from(42u64);
        assert_eq!(weekly_id(week), "7");
        assert_eq!(player_weekly_id("0xabc", week), "0xabc_7");
        assert_eq!(jackpot_id(nonce), "42");
        assert_eq!(jackpot_player_seen_id(nonce, "0xabc"), "42_0xabc");
    }

    #[test]
    fn test_purchase_subtracts_from_net_profit() {
        let mut totals = Totals::default();
        totals
            .apply_purchase(U256::from(3u64), U256::from(30u64))
            .unwrap();

        assert_eq!(totals.key_purchase_events, U256::from(1u64));
        assert_eq!(totals.keys_purchased, BigUint::from(3u64));
        assert_eq!(totals.key_purchase_amount, BigUint::from(30u64));
        assert_eq!(totals.net_profit_amount, BigInt::from(-30i64));
    }

    #[test]
    fn test_claims_add_to_net_profit_and_total_claims() {
        let mut totals = Totals::default();
        totals.apply_weekly_claim(U256::from(50u64)).unwrap();
        totals.apply_jackpot_claim(U256::from(25u64)).unwrap();

        assert_eq!(totals.total_claim_amount, BigUint::from(75u64));
        assert_eq!(
            totals.total_claim_amount,
            &totals.weekly_claim_amount + &totals.jackpot_claim_amount
        );
        assert_eq!(totals.net_profit_amount, BigInt::from(75i64));
    }

    #[test]
    fn test_event_counter_overflow_is_an_error() {
        let mut totals = Totals {
            key_purchase_events: U256::MAX,
            ..Totals::default()
        };
        let err = totals.apply_purchase(U256::from(1u64), U256::ZERO).unwrap_err();
        assert!(matches!(err, IndexerError::MathError { .. }));
    }

    #[test]
    fn test_claim_of_two_pow_255_is_applied() {
        let huge = U256::from(1u64) << 255usize;
        let mut totals = Totals::default();
        totals.apply_weekly_claim(huge).unwrap();
        totals.apply_jackpot_claim(huge).unwrap();

        let doubled = BigUint::from(1u64) << 256u32;
        assert_eq!(totals.total_claim_amount, doubled);
        assert_eq!(totals.net_profit_amount, BigInt::from(doubled));
    }

    #[test]
    fn test_net_profit_goes_below_signed_256_range() {
        let quarter = U256::from(1u64) << 254usize;
        let mut totals = Totals::default();
        for _ in 0..3 {
            totals.apply_purchase(U256::from(1u64), quarter).unwrap();
        }

        let spent = BigUint::from(3u64) << 254u32;
        assert_eq!(totals.key_purchase_amount, spent);
        assert_eq!(totals.net_profit_amount, -BigInt::from(spent));
    }

    #[test]
    fn test_sums_grow_past_u256() {
        let mut totals = Totals::default();
        totals.apply_purchase(U256::MAX, U256::MAX).unwrap();
        totals.apply_purchase(U256::MAX, U256::MAX).unwrap();

        assert_eq!(totals.keys_purchased, widen(U256::MAX) * 2u32);
        assert!(totals.keys_purchased.bits() > 256);
    }

    #[test]
    fn test_global_counts_new_players_only() {
        let mut global = GlobalStats::new(BLOCK);
        global.count_player(true).unwrap();
        global.count_player(false).unwrap();
        assert_eq!(global.total_unique_players, U256::from(1u64));
    }

    #[test]
    fn test_weekly_unique_claimers_never_exceed_events() {
        let mut weekly = WeeklyStats::new(U256::from(7u64), BLOCK);
        weekly.apply_claim(U256::from(10u64), true, BLOCK).unwrap();
        weekly.apply_claim(U256::from(10u64), false, BLOCK).unwrap();
        assert_eq!(weekly.unique_claimers, U256::from(1u64));
        assert_eq!(weekly.weekly_claim_events, U256::from(2u64));
        assert!(weekly.unique_claimers <= weekly.weekly_claim_events);
    }

    #[test]
    fn test_player_weekly_repeat_claim_keeps_first_claim() {
        let later = BlockMeta::new(200, 1_700_000_600);
        let mut record =
            PlayerWeeklyStats::first_claim("0xabc", U256::from(7u64), U256::from(50u64), BLOCK);
        record.apply_repeat_claim(U256::from(20u64), later).unwrap();

        assert_eq!(record.first_claim_block, 100);
        assert_eq!(record.last_claim_block, 200);
        assert_eq!(record.last_claim_timestamp, 1_700_000_600);
        assert_eq!(record.weekly_claim_events, U256::from(2u64));
        assert_eq!(record.weekly_claim_amount, BigUint::from(70u64));
        assert_eq!(record.id(), "0xabc_7");
    }

    #[test]
    fn test_new_records_are_zeroed_and_stamped() {
        let player = PlayerStats::new("0xabc", BLOCK);
        assert_eq!(player.totals, Totals::default());
        assert_eq!(player.first_seen_block, 100);
        assert!(!player.profile.fetch_attempted);

        let jackpot = JackpotStats::new(U256::from(3u64), BLOCK);
        assert_eq!(jackpot.id(), "3");
        assert_eq!(jackpot.updated_at_timestamp, 1_700_000_000);
    }
}
