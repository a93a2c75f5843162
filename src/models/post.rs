//! Types related to posts.

use std::fmt::Debug;

use chrono::offset::Utc;
use chrono::DateTime;

use diesel::{Insertable, Queryable};

use log::debug;

use serde::Serialize;

use crate::models::*;
use crate::schema::post;
use crate::{Error, Result};

/// A post ID.
pub type PostId = i64;

/// A user-made post.
#[derive(Debug, Clone, PartialEq, Queryable, Serialize)]
pub struct Post {
    /// The ID of the post.
    pub id: PostId,
    /// The board that this post was posted on.
    pub board_id: BoardId,
    /// The name of the author.
    pub author_name: String,
    /// The subject line of the post.
    pub subject: String,
    /// The contents of the post.
    pub message: String,
    /// The address the post was sent from.
    pub source_address: String,
    /// When the post was created.
    pub created_at: DateTime<Utc>,
    /// When the post was last updated. Posts are never edited, so this is
    /// the same as `created_at`; it's the key posts are sorted by.
    pub updated_at: DateTime<Utc>,
}

impl Post {
    /// The URI of the post.
    pub fn uri(&self) -> String {
        format!("{}#{}", self.board().uri(), self.id)
    }

    /// The board this post belongs to.
    pub fn board(&self) -> BoardRef {
        BoardRef { id: self.board_id }
    }
}

/// A post identified only by its ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PostRef {
    pub id: PostId,
}

/// A new post to be inserted in the database.
#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = post)]
pub struct NewPost {
    pub board_id: BoardId,
    pub author_name: String,
    pub subject: String,
    pub message: String,
    pub source_address: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Post fields as they come in from a client.
///
/// Like [BoardForm], this either names an existing post (only `id` set) or
/// describes a new one (`id` zero, `message` set).
#[derive(Debug, Clone, Default)]
pub struct PostForm {
    pub id: PostId,
    pub board_id: BoardId,
    pub author_name: String,
    pub subject: String,
    pub message: String,
    pub source_address: String,
}

impl PostForm {
    /// Use the form to look up an existing post.
    pub fn validate_for_read(self) -> Result<PostRef> {
        if self.id == 0 {
            return Err(Error::Invariant {
                reason: "post lookup has no ID",
            });
        }

        if !self.message.is_empty() {
            return Err(Error::Invariant {
                reason: "post lookup has both an ID and a message",
            });
        }

        Ok(PostRef { id: self.id })
    }

    /// Use the form to create a new post at `now`.
    pub fn validate_for_write(self, now: DateTime<Utc>) -> Result<NewPost> {
        if self.id != 0 {
            return Err(Error::Invariant {
                reason: "new post already has an ID",
            });
        }

        if self.message.trim().is_empty() {
            return Err(Error::Invariant {
                reason: "new post has no message",
            });
        }

        Ok(NewPost {
            board_id: self.board_id,
            author_name: self.author_name,
            subject: self.subject,
            message: self.message,
            source_address: self.source_address,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Create a new post on `board`. Returns the new post's ID.
///
/// The board in the form is replaced by `board`, which has to exist.
pub fn create_post<S>(
    store: &mut S,
    board: &BoardRef,
    form: PostForm,
) -> Result<PostId>
where
    S: Store + ?Sized,
{
    let new_post = PostForm {
        board_id: board.id,
        ..form
    }
    .validate_for_write(Utc::now())?;

    store.board(board.id)?;

    let post_id = store.put_post(&new_post)?;

    debug!("Created post #{} on board #{}", post_id, board.id);

    Ok(post_id)
}

/// Get a post.
pub fn load_post<S>(store: &mut S, post: &PostRef) -> Result<Post>
where
    S: Store + ?Sized,
{
    store.post(post.id)
}
