//! Types related to boards.

use std::fmt::Debug;

use chrono::offset::Utc;
use chrono::DateTime;

use diesel::{Insertable, Queryable};

use log::debug;

use serde::Serialize;

use crate::models::*;
use crate::schema::board;
use crate::{Error, Result};

/// A board ID.
pub type BoardId = i64;

/// A named collection of posts.
#[derive(Debug, Clone, PartialEq, Queryable, Serialize)]
pub struct Board {
    /// The ID of the board.
    pub id: BoardId,
    /// The name of the board.
    pub name: String,
    /// The description of the board.
    pub description: String,
    /// The stylesheet theme the board is shown with.
    pub theme: String,
    /// When the board was created.
    pub created_at: DateTime<Utc>,
    /// When the board was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Board {
    /// The URI for the board.
    pub fn uri(&self) -> String {
        self.to_ref().uri()
    }

    /// A reference to this board by ID.
    pub fn to_ref(&self) -> BoardRef {
        BoardRef { id: self.id }
    }
}

/// A board identified only by its ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoardRef {
    pub id: BoardId,
}

impl BoardRef {
    /// The URI for the board.
    pub fn uri(&self) -> String {
        format!("/bbs/{}/posts", self.id)
    }
}

/// A new board to be inserted in the database.
#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = board)]
pub struct NewBoard {
    pub name: String,
    pub description: String,
    pub theme: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Board fields as they come in from a client.
///
/// The same shape is used both to name an existing board (only `id` set) and
/// to describe a new one (`id` zero, `name` set). Converting it into a
/// [BoardRef] or a [NewBoard] checks that it's in the right state.
#[derive(Debug, Clone, Default)]
pub struct BoardForm {
    pub id: BoardId,
    pub name: String,
    pub description: String,
    pub theme: String,
}

impl BoardForm {
    /// Use the form to look up an existing board.
    pub fn validate_for_read(self) -> Result<BoardRef> {
        if self.id == 0 {
            return Err(Error::Invariant {
                reason: "board lookup has no ID",
            });
        }

        if !self.name.is_empty() {
            return Err(Error::Invariant {
                reason: "board lookup has both an ID and a name",
            });
        }

        Ok(BoardRef { id: self.id })
    }

    /// Use the form to create a new board at `now`.
    pub fn validate_for_write(self, now: DateTime<Utc>) -> Result<NewBoard> {
        if self.id != 0 {
            return Err(Error::Invariant {
                reason: "new board already has an ID",
            });
        }

        if self.name.trim().is_empty() {
            return Err(Error::Invariant {
                reason: "new board has no name",
            });
        }

        Ok(NewBoard {
            name: self.name,
            description: self.description,
            theme: self.theme,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Parse a board ID from a string, like one from a URL.
pub fn parse_board_id<S>(raw: S) -> Result<BoardRef>
where
    S: AsRef<str>,
{
    let raw = raw.as_ref();

    let id = raw.trim().parse::<BoardId>().map_err(|_| Error::ParseBoardId {
        raw: raw.to_string(),
    })?;

    BoardForm {
        id,
        ..BoardForm::default()
    }
    .validate_for_read()
}

/// Create a new board from a form. Returns the new board's ID.
pub fn create_board<S>(store: &mut S, form: BoardForm) -> Result<BoardId>
where
    S: Store + ?Sized,
{
    let new_board = form.validate_for_write(Utc::now())?;
    let board_id = store.put_board(&new_board)?;

    debug!("Created board #{} '{}'", board_id, new_board.name);

    Ok(board_id)
}

/// Get a board.
pub fn load_board<S>(store: &mut S, board: &BoardRef) -> Result<Board>
where
    S: Store + ?Sized,
{
    store.board(board.id)
}

/// Get up to `limit` of the most recently created boards, newest first.
pub fn newest_boards<S>(store: &mut S, limit: u32) -> Result<Vec<Board>>
where
    S: Store + ?Sized,
{
    let query = Query::boards()
        .order_by(SortField::CreatedAt, Direction::Descending)
        .limit(limit.into());

    let ids = store
        .scan(&query)?
        .map(|entry| entry.map(|entry| entry.id))
        .collect::<Result<Vec<BoardId>>>()?;

    store.fetch_boards(&ids)
}
