//! A record store that keeps everything in process.
//!
//! Used for development instances, tests, and benchmarks.

use std::collections::BTreeMap;

use chrono::offset::Utc;
use chrono::DateTime;

use crate::models::*;
use crate::{Error, Result};

/// Boards and posts held in memory.
///
/// IDs are handed out in insertion order starting at 1, the same way a
/// PostgreSQL sequence does.
#[derive(Debug, Default)]
pub struct MemoryStore {
    boards: BTreeMap<BoardId, Board>,
    posts: BTreeMap<PostId, Post>,
    last_board_id: BoardId,
    last_post_id: PostId,
    unavailable: bool,
    fetch_unavailable: bool,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    /// Make every operation fail with [Error::StoreUnavailable], or stop
    /// doing so.
    pub fn set_unavailable(&mut self, unavailable: bool) {
        self.unavailable = unavailable;
    }

    /// Make only the batch fetches fail, so scans still work.
    pub fn set_fetch_unavailable(&mut self, unavailable: bool) {
        self.fetch_unavailable = unavailable;
    }

    fn check_fetch_available(&self) -> Result<()> {
        if self.fetch_unavailable {
            Err(Error::StoreUnavailable)
        } else {
            self.check_available()
        }
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable {
            Err(Error::StoreUnavailable)
        } else {
            Ok(())
        }
    }

    fn sort_key(
        field: SortField,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> DateTime<Utc> {
        match field {
            SortField::CreatedAt => created_at,
            SortField::UpdatedAt => updated_at,
        }
    }

    /// Every entry that matches `query`, in order, before the limit.
    fn matching(&self, query: &Query) -> Vec<ScanEntry> {
        let projection = query.selection();

        let mut entries: Vec<(DateTime<Utc>, i64, Option<BoardId>, Option<Record>)> =
            match query.kind() {
                Kind::Board => self
                    .boards
                    .values()
                    .map(|board| {
                        let sort_key = MemoryStore::sort_key(
                            query.field(),
                            board.created_at,
                            board.updated_at,
                        );
                        let record = match projection {
                            Projection::Full => Some(Record::Board(board.clone())),
                            _ => None,
                        };
                        (sort_key, board.id, None, record)
                    })
                    .collect(),
                Kind::Post => self
                    .posts
                    .values()
                    .filter(|post| {
                        query
                            .board_id()
                            .map_or(true, |board_id| post.board_id == board_id)
                    })
                    .map(|post| {
                        let sort_key = MemoryStore::sort_key(
                            query.field(),
                            post.created_at,
                            post.updated_at,
                        );
                        let (board_id, record) = match projection {
                            Projection::KeysOnly => (None, None),
                            Projection::BoardId => (Some(post.board_id), None),
                            Projection::Full => {
                                (Some(post.board_id), Some(Record::Post(post.clone())))
                            }
                        };
                        (sort_key, post.id, board_id, record)
                    })
                    .collect(),
            };

        entries.retain(|(sort_key, id, ..)| {
            query.in_range(*sort_key) && query.is_after_start(*sort_key, *id)
        });

        entries.sort_by(|a, b| {
            let order = (a.0, a.1).cmp(&(b.0, b.1));
            match query.direction() {
                Direction::Ascending => order,
                Direction::Descending => order.reverse(),
            }
        });

        entries
            .into_iter()
            .map(|(sort_key, id, board_id, record)| ScanEntry {
                id,
                board_id,
                record,
                position: Position::new(query, sort_key, id),
            })
            .collect()
    }
}

impl Store for MemoryStore {
    fn put_board(&mut self, new_board: &NewBoard) -> Result<BoardId> {
        self.check_available()?;

        self.last_board_id += 1;
        let id = self.last_board_id;

        self.boards.insert(
            id,
            Board {
                id,
                name: new_board.name.clone(),
                description: new_board.description.clone(),
                theme: new_board.theme.clone(),
                created_at: new_board.created_at,
                updated_at: new_board.updated_at,
            },
        );

        Ok(id)
    }

    fn board(&mut self, board_id: BoardId) -> Result<Board> {
        self.check_available()?;

        self.boards
            .get(&board_id)
            .cloned()
            .ok_or(Error::BoardNotFound { board_id })
    }

    fn fetch_boards(&mut self, ids: &[BoardId]) -> Result<Vec<Board>> {
        self.check_fetch_available()?;

        ids.iter().map(|&id| self.board(id)).collect()
    }

    fn put_post(&mut self, new_post: &NewPost) -> Result<PostId> {
        self.check_available()?;

        self.last_post_id += 1;
        let id = self.last_post_id;

        self.posts.insert(
            id,
            Post {
                id,
                board_id: new_post.board_id,
                author_name: new_post.author_name.clone(),
                subject: new_post.subject.clone(),
                message: new_post.message.clone(),
                source_address: new_post.source_address.clone(),
                created_at: new_post.created_at,
                updated_at: new_post.updated_at,
            },
        );

        Ok(id)
    }

    fn post(&mut self, post_id: PostId) -> Result<Post> {
        self.check_available()?;

        self.posts
            .get(&post_id)
            .cloned()
            .ok_or(Error::PostNotFound { post_id })
    }

    fn fetch_posts(&mut self, ids: &[PostId]) -> Result<Vec<Post>> {
        self.check_fetch_available()?;

        ids.iter().map(|&id| self.post(id)).collect()
    }

    fn scan<'a>(&'a mut self, query: &Query) -> Result<Scan<'a>> {
        self.check_available()?;

        let entries = self
            .matching(query)
            .into_iter()
            .map(Ok::<ScanEntry, Error>);

        match query.cap() {
            Some(cap) => Ok(Box::new(entries.take(cap as usize))),
            None => Ok(Box::new(entries)),
        }
    }
}
