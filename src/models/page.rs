//! Paging through the posts on a board.

use log::{trace, warn};

use serde::Serialize;

use crate::models::*;
use crate::{Error, Result};

/// One page of posts on a board.
#[derive(Debug, Clone, Serialize)]
pub struct PostPage {
    /// The posts on this page, most recently updated first.
    pub posts: Vec<Post>,
    /// A token for the page after this one, if there is one.
    pub next: Option<Cursor>,
}

impl PostPage {
    fn empty() -> PostPage {
        PostPage {
            posts: Vec::new(),
            next: None,
        }
    }
}

enum PageState {
    Scanning,
    PageFull(Position),
    Exhausted,
}

/// Decode a cursor for `query`, throwing it away if it's unusable.
fn resume_point<S>(store: &S, query: &Query, cursor: Option<&str>) -> Option<Position>
where
    S: Store + ?Sized,
{
    let cursor = cursor?;

    match store.decode_cursor(cursor) {
        Ok(position) if position.belongs_to(query) => Some(position),
        Ok(_) => {
            warn!("Ignoring cursor from another scan: {}", cursor);
            None
        }
        Err(Error::StaleCursor) => {
            warn!("Ignoring stale cursor: {}", cursor);
            None
        }
        Err(err) => {
            warn!("Ignoring unreadable cursor {}: {}", cursor, err);
            None
        }
    }
}

/// Get up to `limit` posts on `board`, most recently updated first, resuming
/// after `cursor` if it's given.
///
/// A cursor that can't be used is logged and ignored, so the first page is
/// returned instead. The returned page has a cursor for the next one only if
/// there are more posts.
pub fn list_page<S>(
    store: &mut S,
    board: &BoardRef,
    limit: u32,
    cursor: Option<&str>,
) -> Result<PostPage>
where
    S: Store + ?Sized,
{
    if limit == 0 {
        return Ok(PostPage::empty());
    }

    let mut query = Query::posts()
        .in_board(board.id)
        .order_by(SortField::UpdatedAt, Direction::Descending)
        .limit(u64::from(limit) + 1)
        .projection(Projection::KeysOnly);

    if let Some(position) = resume_point(&*store, &query, cursor) {
        query = query.start_after(position);
    }

    let mut ids: Vec<PostId> = Vec::new();
    let mut last: Option<Position> = None;
    let mut state = PageState::Scanning;

    {
        let mut scan = store.scan(&query)?;

        while let PageState::Scanning = state {
            state = match scan.next() {
                Some(entry) => {
                    let entry = entry?;

                    if ids.len() < limit as usize {
                        ids.push(entry.id);
                        last = Some(entry.position);
                        PageState::Scanning
                    } else {
                        match last.take() {
                            Some(position) => PageState::PageFull(position),
                            None => PageState::Exhausted,
                        }
                    }
                }
                None => PageState::Exhausted,
            };
        }
    }

    let next = match state {
        PageState::PageFull(position) => Some(store.encode_cursor(&position)?),
        _ => None,
    };

    trace!(
        "Page of board #{} has {} posts, more: {}",
        board.id,
        ids.len(),
        next.is_some()
    );

    let posts = store.fetch_posts(&ids)?;

    Ok(PostPage { posts, next })
}
