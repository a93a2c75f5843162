//! The feed of recent posts across all boards.

use std::collections::HashSet;

use log::trace;

use crate::models::*;
use crate::{Error, Result};

/// Get up to `limit` of the most recently updated posts across all boards.
///
/// With `distinct`, only the newest post from each board is included, so a
/// single busy board can't take over the feed.
pub fn recent_feed<S>(store: &mut S, limit: u32, distinct: bool) -> Result<Vec<Post>>
where
    S: Store + ?Sized,
{
    if limit == 0 {
        return Ok(Vec::new());
    }

    let limit = limit as usize;
    let mut ids: Vec<PostId> = Vec::new();

    if distinct {
        let query = Query::posts()
            .order_by(SortField::UpdatedAt, Direction::Descending)
            .projection(Projection::BoardId);

        let mut seen_boards: HashSet<BoardId> = HashSet::new();

        for entry in store.scan(&query)? {
            let entry = entry?;

            let board_id = entry.board_id.ok_or(Error::StoreContract {
                reason: "board projection returned a post without its board",
            })?;

            if !seen_boards.insert(board_id) {
                continue;
            }

            ids.push(entry.id);

            if ids.len() == limit {
                break;
            }
        }
    } else {
        let query = Query::posts()
            .order_by(SortField::UpdatedAt, Direction::Descending)
            .limit(limit as u64)
            .projection(Projection::KeysOnly);

        for entry in store.scan(&query)? {
            ids.push(entry?.id);
        }
    }

    trace!("Recent feed has {} posts (distinct: {})", ids.len(), distinct);

    store.fetch_posts(&ids)
}
