//! A record store backed by PostgreSQL.

use std::collections::{HashMap, VecDeque};

use chrono::offset::{TimeZone, Utc};
use chrono::DateTime;

use diesel::insert_into;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, PooledConnection};

use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use log::{info, trace};

use crate::models::{
    decode_position, Board, BoardId, Bound, Direction, Kind, NewBoard, NewPost,
    Position, Post, PostId, Projection, Query, Record, Scan, ScanEntry,
    SortField, Store,
};
use crate::schema::{board, post};
use crate::{Error, Result};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// A pool of PostgreSQL connections.
pub type Pool = diesel::r2d2::Pool<ConnectionManager<PgConnection>>;

/// How many rows a scan reads from the database at a time.
const SCAN_BATCH: u64 = 100;

/// Open a connection pool and bring the schema up to date.
pub(crate) fn open_pool(url: &str) -> Result<Pool> {
    let pool = Pool::new(ConnectionManager::new(url))?;

    let mut pooled = pool.get()?;
    let conn: &mut PgConnection = &mut pooled;

    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|err| Error::MigrationError {
            msg: err.to_string(),
        })?;

    for version in applied {
        info!("Applied migration {}", version);
    }

    Ok(pool)
}

/// Reject positions whose sort key PostgreSQL can't hold.
///
/// `timestamptz` starts at 4714-11-24 BC, long before anything we write, so a
/// position earlier than that can only come from a tampered cursor.
fn check_position(position: Position) -> Result<Position> {
    match Utc.with_ymd_and_hms(-4713, 11, 24, 0, 0, 0).single() {
        Some(earliest) if position.sort_key() >= earliest => Ok(position),
        _ => Err(Error::StaleCursor),
    }
}

/// Convenience function to convert from diesel's error type into our error
/// type, when we're querying for a board.
fn conv_board_error(
    board_id: BoardId,
) -> impl FnOnce(diesel::result::Error) -> Error {
    move |e: diesel::result::Error| match e {
        diesel::result::Error::NotFound => Error::BoardNotFound { board_id },
        _ => Error::from(e),
    }
}

/// Convenience function to convert from diesel's error type into our error
/// type, when we're querying for a post.
fn conv_post_error(
    post_id: PostId,
) -> impl FnOnce(diesel::result::Error) -> Error {
    move |e: diesel::result::Error| match e {
        diesel::result::Error::NotFound => Error::PostNotFound { post_id },
        _ => Error::from(e),
    }
}

/// A checked-out PostgreSQL connection.
pub struct PgStore {
    conn: PooledConnection<ConnectionManager<PgConnection>>,
}

impl PgStore {
    pub fn new(conn: PooledConnection<ConnectionManager<PgConnection>>) -> PgStore {
        PgStore { conn }
    }

    fn conn(&mut self) -> &mut PgConnection {
        &mut self.conn
    }
}

impl Store for PgStore {
    fn put_board(&mut self, new_board: &NewBoard) -> Result<BoardId> {
        Ok(insert_into(board::table)
            .values(new_board)
            .returning(board::id)
            .get_result(self.conn())?)
    }

    fn board(&mut self, board_id: BoardId) -> Result<Board> {
        board::table
            .find(board_id)
            .first(self.conn())
            .map_err(conv_board_error(board_id))
    }

    fn fetch_boards(&mut self, ids: &[BoardId]) -> Result<Vec<Board>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let found: Vec<Board> = board::table
            .filter(board::id.eq_any(ids.to_vec()))
            .load(self.conn())?;

        let by_id: HashMap<BoardId, Board> =
            found.into_iter().map(|board| (board.id, board)).collect();

        ids.iter()
            .map(|&board_id| {
                by_id
                    .get(&board_id)
                    .cloned()
                    .ok_or(Error::BoardNotFound { board_id })
            })
            .collect()
    }

    fn put_post(&mut self, new_post: &NewPost) -> Result<PostId> {
        Ok(insert_into(post::table)
            .values(new_post)
            .returning(post::id)
            .get_result(self.conn())?)
    }

    fn post(&mut self, post_id: PostId) -> Result<Post> {
        post::table
            .find(post_id)
            .first(self.conn())
            .map_err(conv_post_error(post_id))
    }

    fn fetch_posts(&mut self, ids: &[PostId]) -> Result<Vec<Post>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let found: Vec<Post> = post::table
            .filter(post::id.eq_any(ids.to_vec()))
            .load(self.conn())?;

        let by_id: HashMap<PostId, Post> =
            found.into_iter().map(|post| (post.id, post)).collect();

        ids.iter()
            .map(|&post_id| {
                by_id
                    .get(&post_id)
                    .cloned()
                    .ok_or(Error::PostNotFound { post_id })
            })
            .collect()
    }

    fn decode_cursor(&self, cursor: &str) -> Result<Position> {
        check_position(decode_position(cursor)?)
    }

    fn scan<'a>(&'a mut self, query: &Query) -> Result<Scan<'a>> {
        Ok(Box::new(PgScan {
            conn: self.conn(),
            query: query.clone(),
            after: query.start().cloned(),
            remaining: query.cap(),
            buffer: VecDeque::new(),
            exhausted: false,
        }))
    }
}

/// A scan that reads rows in batches as they're needed.
///
/// Every batch resumes after the last row handed out, filtering on the pair
/// `(sort field, id)` instead of using an offset, so rows don't shift between
/// batches.
struct PgScan<'a> {
    conn: &'a mut PgConnection,
    query: Query,
    after: Option<Position>,
    remaining: Option<u64>,
    buffer: VecDeque<ScanEntry>,
    exhausted: bool,
}

impl Iterator for PgScan<'_> {
    type Item = Result<ScanEntry>;

    fn next(&mut self) -> Option<Result<ScanEntry>> {
        if self.remaining == Some(0) {
            return None;
        }

        if self.buffer.is_empty() {
            if self.exhausted {
                return None;
            }

            let batch = self.remaining.map_or(SCAN_BATCH, |r| r.min(SCAN_BATCH));

            let loaded = match self.query.kind() {
                Kind::Board => {
                    board_batch(self.conn, &self.query, self.after.as_ref(), batch)
                }
                Kind::Post => {
                    post_batch(self.conn, &self.query, self.after.as_ref(), batch)
                }
            };

            match loaded {
                Ok(entries) => {
                    trace!(
                        "Scan {} read {} rows",
                        self.query.scope(),
                        entries.len()
                    );
                    self.exhausted = (entries.len() as u64) < batch;
                    self.buffer.extend(entries);
                }
                Err(err) => {
                    self.exhausted = true;
                    return Some(Err(err));
                }
            }
        }

        let entry = self.buffer.pop_front()?;

        self.after = Some(entry.position.clone());
        if let Some(ref mut remaining) = self.remaining {
            *remaining -= 1;
        }

        Some(Ok(entry))
    }
}

/// Apply the range filter, the resume point, the order, and the batch size
/// of a scan to a boxed query.
macro_rules! keyset {
    ($q:expr, $col:expr, $id:expr, $query:expr, $after:expr, $batch:expr) => {{
        let query: &Query = $query;
        let mut q = $q;

        if let Some((bound, time)) = query.range() {
            q = match bound {
                Bound::AtLeast => q.filter($col.ge(time)),
                Bound::AtMost => q.filter($col.le(time)),
            };
        }

        if let Some(after) = $after {
            let (key, id) = (after.sort_key(), after.id());

            q = match query.direction() {
                Direction::Ascending => {
                    q.filter($col.gt(key).or($col.eq(key).and($id.gt(id))))
                }
                Direction::Descending => {
                    q.filter($col.lt(key).or($col.eq(key).and($id.lt(id))))
                }
            };
        }

        q = match query.direction() {
            Direction::Ascending => q.order(($col.asc(), $id.asc())),
            Direction::Descending => q.order(($col.desc(), $id.desc())),
        };

        q.limit($batch as i64)
    }};
}

macro_rules! post_batch_by {
    ($conn:expr, $query:expr, $after:expr, $batch:expr, $col:expr) => {{
        let query: &Query = $query;

        if query.selection() == Projection::Full {
            let mut q = post::table.into_boxed();

            if let Some(board_id) = query.board_id() {
                q = q.filter(post::board_id.eq(board_id));
            }

            let posts: Vec<Post> =
                keyset!(q, $col, post::id, query, $after, $batch).load($conn)?;

            posts
                .into_iter()
                .map(|post| ScanEntry {
                    id: post.id,
                    board_id: Some(post.board_id),
                    position: Position::new(
                        query,
                        post_sort_key(query.field(), &post),
                        post.id,
                    ),
                    record: Some(Record::Post(post)),
                })
                .collect::<Vec<ScanEntry>>()
        } else {
            let mut q = post::table
                .select((post::id, post::board_id, $col))
                .into_boxed();

            if let Some(board_id) = query.board_id() {
                q = q.filter(post::board_id.eq(board_id));
            }

            let rows: Vec<(PostId, BoardId, DateTime<Utc>)> =
                keyset!(q, $col, post::id, query, $after, $batch).load($conn)?;

            let with_board = query.selection() == Projection::BoardId;

            rows.into_iter()
                .map(|(id, board_id, key)| ScanEntry {
                    id,
                    board_id: if with_board { Some(board_id) } else { None },
                    record: None,
                    position: Position::new(query, key, id),
                })
                .collect::<Vec<ScanEntry>>()
        }
    }};
}

macro_rules! board_batch_by {
    ($conn:expr, $query:expr, $after:expr, $batch:expr, $col:expr) => {{
        let query: &Query = $query;

        if query.selection() == Projection::Full {
            let q = board::table.into_boxed();

            let boards: Vec<Board> =
                keyset!(q, $col, board::id, query, $after, $batch).load($conn)?;

            boards
                .into_iter()
                .map(|board| ScanEntry {
                    id: board.id,
                    board_id: None,
                    position: Position::new(
                        query,
                        board_sort_key(query.field(), &board),
                        board.id,
                    ),
                    record: Some(Record::Board(board)),
                })
                .collect::<Vec<ScanEntry>>()
        } else {
            let q = board::table.select((board::id, $col)).into_boxed();

            let rows: Vec<(BoardId, DateTime<Utc>)> =
                keyset!(q, $col, board::id, query, $after, $batch).load($conn)?;

            rows.into_iter()
                .map(|(id, key)| ScanEntry {
                    id,
                    board_id: None,
                    record: None,
                    position: Position::new(query, key, id),
                })
                .collect::<Vec<ScanEntry>>()
        }
    }};
}

fn post_sort_key(field: SortField, post: &Post) -> DateTime<Utc> {
    match field {
        SortField::CreatedAt => post.created_at,
        SortField::UpdatedAt => post.updated_at,
    }
}

fn board_sort_key(field: SortField, board: &Board) -> DateTime<Utc> {
    match field {
        SortField::CreatedAt => board.created_at,
        SortField::UpdatedAt => board.updated_at,
    }
}

/// Read the next batch of a post scan.
fn post_batch(
    conn: &mut PgConnection,
    query: &Query,
    after: Option<&Position>,
    batch: u64,
) -> Result<Vec<ScanEntry>> {
    Ok(match query.field() {
        SortField::CreatedAt => {
            post_batch_by!(conn, query, after, batch, post::created_at)
        }
        SortField::UpdatedAt => {
            post_batch_by!(conn, query, after, batch, post::updated_at)
        }
    })
}

/// Read the next batch of a board scan.
fn board_batch(
    conn: &mut PgConnection,
    query: &Query,
    after: Option<&Position>,
    batch: u64,
) -> Result<Vec<ScanEntry>> {
    Ok(match query.field() {
        SortField::CreatedAt => {
            board_batch_by!(conn, query, after, batch, board::created_at)
        }
        SortField::UpdatedAt => {
            board_batch_by!(conn, query, after, batch, board::updated_at)
        }
    })
}
