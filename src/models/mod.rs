//! Models and types related to the record store.

use std::fmt::{self, Debug, Display};
use std::sync::{Arc, Mutex, MutexGuard};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use chrono::offset::Utc;
use chrono::DateTime;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub mod board;
pub mod feed;
pub mod memory;
pub mod page;
pub mod pg;
pub mod post;
pub mod query;

pub use board::*;
pub use feed::*;
pub use memory::MemoryStore;
pub use page::*;
pub use pg::PgStore;
pub use post::*;
pub use query::*;

/// A place in one ordered scan, just after the entry it was taken from.
///
/// Stores hand these out with every scanned entry and take them back through
/// [Query::start_after]. Nothing outside of a store looks inside one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    scope: String,
    sort_key: DateTime<Utc>,
    id: i64,
}

impl Position {
    pub(crate) fn new(query: &Query, sort_key: DateTime<Utc>, id: i64) -> Position {
        Position {
            scope: query.scope(),
            sort_key,
            id,
        }
    }

    pub(crate) fn sort_key(&self) -> DateTime<Utc> {
        self.sort_key
    }

    pub(crate) fn id(&self) -> i64 {
        self.id
    }

    /// Whether this position was taken from a scan shaped like `query`.
    pub fn belongs_to(&self, query: &Query) -> bool {
        self.scope == query.scope()
    }
}

/// An opaque continuation token for a paginated scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    /// The token as it should appear in a query string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Encode a position as a URL-safe token.
pub(crate) fn encode_position(position: &Position) -> Result<Cursor> {
    let bytes = serde_json::to_vec(position)?;
    Ok(Cursor(URL_SAFE_NO_PAD.encode(bytes)))
}

/// Decode a token produced by [encode_position].
pub(crate) fn decode_position(cursor: &str) -> Result<Position> {
    let bytes = URL_SAFE_NO_PAD
        .decode(cursor.trim())
        .map_err(|_| Error::StaleCursor)?;

    serde_json::from_slice(&bytes).map_err(|_| Error::StaleCursor)
}

/// A full record, as returned by a scan with [Projection::Full].
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Board(Board),
    Post(Post),
}

/// One result of a scan.
#[derive(Debug, Clone)]
pub struct ScanEntry {
    /// The ID of the record.
    pub id: i64,
    /// The board a post belongs to, when the projection asked for it.
    pub board_id: Option<BoardId>,
    /// The whole record, when the projection asked for it.
    pub record: Option<Record>,
    /// Where the scan resumes after this entry.
    pub position: Position,
}

/// A lazy sequence of scan results.
pub type Scan<'a> = Box<dyn Iterator<Item = Result<ScanEntry>> + 'a>;

/// The primitives the rest of the crate needs from a record store.
pub trait Store {
    /// Insert a new board, returning its ID.
    fn put_board(&mut self, new_board: &NewBoard) -> Result<BoardId>;

    /// Get a board.
    fn board(&mut self, board_id: BoardId) -> Result<Board>;

    /// Get many boards in one go, in the order of `ids`.
    fn fetch_boards(&mut self, ids: &[BoardId]) -> Result<Vec<Board>>;

    /// Insert a new post, returning its ID.
    fn put_post(&mut self, new_post: &NewPost) -> Result<PostId>;

    /// Get a post.
    fn post(&mut self, post_id: PostId) -> Result<Post>;

    /// Get many posts in one go, in the order of `ids`.
    fn fetch_posts(&mut self, ids: &[PostId]) -> Result<Vec<Post>>;

    /// Start a scan. Results come back in the order the query asks for.
    fn scan<'a>(&'a mut self, query: &Query) -> Result<Scan<'a>>;

    /// Turn a position into a continuation token.
    fn encode_cursor(&self, position: &Position) -> Result<Cursor> {
        encode_position(position)
    }

    /// Turn a continuation token back into a position.
    fn decode_cursor(&self, cursor: &str) -> Result<Position> {
        decode_position(cursor)
    }
}

/// A connection to whichever record store the instance is configured with.
///
/// Clones share the same store.
#[derive(Clone)]
pub enum Database {
    Memory(Arc<Mutex<MemoryStore>>),
    Postgres(pg::Pool),
}

impl Debug for Database {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Database::Memory(..) => write!(fmt, "<#Database memory>"),
            Database::Postgres(pool) => {
                let state = pool.state();

                write!(
                    fmt,
                    "<#Database connections={} idle_connections={}>",
                    state.connections, state.idle_connections,
                )
            }
        }
    }
}

impl Database {
    /// The URL that selects the in-process store.
    pub const MEMORY_URL: &'static str = "memory:";

    /// Open the database at `url`, running migrations if needed.
    pub fn open<S>(url: S) -> Result<Database>
    where
        S: AsRef<str>,
    {
        let url = url.as_ref();

        if url == Database::MEMORY_URL {
            Ok(Database::memory())
        } else {
            Ok(Database::Postgres(pg::open_pool(url)?))
        }
    }

    /// An empty in-process database.
    pub fn memory() -> Database {
        Database::Memory(Arc::new(Mutex::new(MemoryStore::new())))
    }

    /// Fail with [Error::EphemeralStore] if nothing written here will
    /// outlive this process.
    pub fn require_persistent(&self) -> Result<()> {
        match self {
            Database::Memory(..) => Err(Error::EphemeralStore),
            Database::Postgres(..) => Ok(()),
        }
    }

    /// Get a handle to the store for the duration of one request.
    pub fn get(&self) -> Result<Handle<'_>> {
        match self {
            Database::Memory(store) => Ok(Handle::Memory(
                store.lock().map_err(|_| Error::StoreUnavailable)?,
            )),
            Database::Postgres(pool) => Ok(Handle::Postgres(PgStore::new(pool.get()?))),
        }
    }

    /// Run `f` against the store on the blocking thread pool.
    ///
    /// Store calls block on locks and sockets, so async handlers go through
    /// here instead of calling [Database::get] themselves.
    pub async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn Store) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();

        rocket::tokio::task::spawn_blocking(move || {
            let mut handle = db.get()?;
            f(handle.store())
        })
        .await?
    }
}

/// A checked-out store.
pub enum Handle<'a> {
    Memory(MutexGuard<'a, MemoryStore>),
    Postgres(PgStore),
}

impl Handle<'_> {
    /// The store behind this handle.
    pub fn store(&mut self) -> &mut dyn Store {
        match self {
            Handle::Memory(guard) => &mut **guard,
            Handle::Postgres(store) => store,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_round_trip() -> Result<()> {
        let query = Query::posts().in_board(3);
        let position = Position::new(&query, Utc::now(), 42);

        let cursor = encode_position(&position)?;
        assert!(cursor
            .as_str()
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));

        let decoded = decode_position(cursor.as_str())?;
        assert_eq!(decoded, position);
        assert!(decoded.belongs_to(&query));
        assert!(!decoded.belongs_to(&Query::posts().in_board(4)));

        Ok(())
    }

    #[test]
    fn garbage_cursor_is_stale() {
        for garbage in &["", "!!!", "bm90IGpzb24", "eyJzY29wZSI6MX0"] {
            match decode_position(garbage) {
                Err(Error::StaleCursor) => {}
                other => panic!("expected a stale cursor, got {:?}", other),
            }
        }
    }

    #[test]
    fn memory_database_from_url() -> Result<()> {
        let db = Database::open(Database::MEMORY_URL)?;
        let mut handle = db.get()?;

        assert!(handle.store().fetch_posts(&[]).unwrap().is_empty());

        Ok(())
    }

    #[test]
    fn memory_database_is_not_persistent() {
        match Database::memory().require_persistent() {
            Err(Error::EphemeralStore) => {}
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn clones_share_a_store() -> Result<()> {
        let db = Database::memory();
        let copy = db.clone();

        let now = Utc::now();
        copy.get()?.store().put_board(&NewBoard {
            name: "General".into(),
            description: String::new(),
            theme: String::new(),
            created_at: now,
            updated_at: now,
        })?;

        assert_eq!(db.get()?.store().board(1)?.name, "General");

        Ok(())
    }

    #[rocket::async_test]
    async fn run_on_blocking_pool() -> Result<()> {
        let db = Database::memory();

        let board_id = db
            .run(|store| {
                let now = Utc::now();
                store.put_board(&NewBoard {
                    name: "General".into(),
                    description: String::new(),
                    theme: String::new(),
                    created_at: now,
                    updated_at: now,
                })
            })
            .await?;

        let board = db.run(move |store| store.board(board_id)).await?;
        assert_eq!(board.name, "General");

        match db.run(|store| store.board(9)).await {
            Err(Error::BoardNotFound { board_id: 9 }) => {}
            other => panic!("unexpected result {:?}", other),
        }

        Ok(())
    }
}
