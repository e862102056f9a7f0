use tracing::debug;

use super::{load_global, players};
use crate::error::IndexerResult;
use crate::events::KeysPurchased;
use crate::profile::ProfileLookup;
use crate::stats::{normalize_wallet, BlockMeta};
use crate::store::{AggregateStore, Changeset};

/// Apply a key purchase to the global and player totals.
///
/// Net profit moves down by `total_paid` at both scopes.
pub(super) async fn apply<S, P>(
    store: &S,
    profiles: &P,
    purchase: &KeysPurchased,
    block: BlockMeta,
) -> IndexerResult<Changeset>
where
    S: AggregateStore + ?Sized,
    P: ProfileLookup + ?Sized,
{
    let wallet = normalize_wallet(&purchase.buyer);

    let (mut global, player) = tokio::try_join!(
        load_global(store, block),
        players::load_or_create(store, profiles, &wallet, block),
    )?;
    let mut stats = player.stats;

    global.count_player(player.is_new)?;
    global
        .totals
        .apply_purchase(purchase.quantity, purchase.total_paid)?;
    global.touch(block);

    stats
        .totals
        .apply_purchase(purchase.quantity, purchase.total_paid)?;
    stats.touch(block);

    debug!(
        wallet = %wallet,
        quantity = %purchase.quantity,
        total_paid = %purchase.total_paid,
        new_player = player.is_new,
        "keys purchased"
    );

    Ok(Changeset {
        global: Some(global),
        player: Some(stats),
        ..Changeset::default()
    })
}
