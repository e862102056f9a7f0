use tracing::debug;

use super::{load_global, players};
use crate::error::IndexerResult;
use crate::events::{JackpotClaimed, WeeklyClaimed};
use crate::profile::ProfileLookup;
use crate::stats::{normalize_wallet, BlockMeta, JackpotStats, PlayerWeeklyStats, WeeklyStats};
use crate::store::{AggregateStore, Changeset};
use crate::uniqueness::UniquenessTracker;

/// Apply a weekly claim to the global, player, week and player-week records.
pub(super) async fn apply_weekly<S, P>(
    store: &S,
    profiles: &P,
    claim: &WeeklyClaimed,
    block: BlockMeta,
) -> IndexerResult<Changeset>
where
    S: AggregateStore + ?Sized,
    P: ProfileLookup + ?Sized,
{
    let wallet = normalize_wallet(&claim.claimer);

    let (mut global, player, weekly, player_weekly) = tokio::try_join!(
        load_global(store, block),
        players::load_or_create(store, profiles, &wallet, block),
        store.weekly_stats(claim.week),
        store.player_weekly_stats(&wallet, claim.week),
    )?;
    let mut stats = player.stats;

    global.count_player(player.is_new)?;
    global.totals.apply_weekly_claim(claim.amount)?;
    global.touch(block);

    stats.totals.apply_weekly_claim(claim.amount)?;
    stats.touch(block);

    // The player-week record doubles as the weekly seen-fact.
    let is_new_claimer = player_weekly.is_none();
    let mut weekly = weekly.unwrap_or_else(|| WeeklyStats::new(claim.week, block));
    weekly.apply_claim(claim.amount, is_new_claimer, block)?;

    let player_weekly = match player_weekly {
        Some(mut existing) => {
            existing.apply_repeat_claim(claim.amount, block)?;
            existing
        }
        None => PlayerWeeklyStats::first_claim(wallet.clone(), claim.week, claim.amount, block),
    };

    debug!(
        wallet = %wallet,
        week = %claim.week,
        amount = %claim.amount,
        new_player = player.is_new,
        new_claimer = is_new_claimer,
        "weekly claim"
    );

    Ok(Changeset {
        global: Some(global),
        player: Some(stats),
        weekly: Some(weekly),
        player_weekly: Some(player_weekly),
        ..Changeset::default()
    })
}

/// Apply a jackpot claim to the global, player and jackpot records, creating
/// the seen-fact on a wallet's first claim of the nonce.
pub(super) async fn apply_jackpot<S, P>(
    store: &S,
    profiles: &P,
    claim: &JackpotClaimed,
    block: BlockMeta,
) -> IndexerResult<Changeset>
where
    S: AggregateStore + ?Sized,
    P: ProfileLookup + ?Sized,
{
    let wallet = normalize_wallet(&claim.claimer);
    let tracker = UniquenessTracker::new(store);

    let (mut global, player, jackpot, seen) = tokio::try_join!(
        load_global(store, block),
        players::load_or_create(store, profiles, &wallet, block),
        store.jackpot_stats(claim.nonce),
        tracker.has_seen(claim.nonce, &wallet),
    )?;
    let mut stats = player.stats;

    global.count_player(player.is_new)?;
    global.totals.apply_jackpot_claim(claim.amount)?;
    global.touch(block);

    stats.totals.apply_jackpot_claim(claim.amount)?;
    stats.touch(block);

    let mut jackpot = jackpot.unwrap_or_else(|| JackpotStats::new(claim.nonce, block));
    jackpot.apply_claim(claim.amount, !seen, block)?;

    debug!(
        wallet = %wallet,
        nonce = %claim.nonce,
        amount = %claim.amount,
        new_player = player.is_new,
        new_claimer = !seen,
        "jackpot claim"
    );

    Ok(Changeset {
        global: Some(global),
        player: Some(stats),
        jackpot: Some(jackpot),
        jackpot_seen: UniquenessTracker::<S>::first_sighting(claim.nonce, &wallet, seen),
        ..Changeset::default()
    })
}
