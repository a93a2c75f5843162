//! Views, types to generate layouts.
//!
//! Most of these types are meant to be returned from a route.

use chrono::FixedOffset;

use rocket::http::Status;

use serde::ser::Error as _;
use serde::{Serialize, Serializer};

use serde_json::value::{to_value, Value as JsonValue};

use crate::models::*;
use crate::{config::Config, Result};

#[macro_export]
macro_rules! impl_template_responder {
    ($t:ty, $template:expr) => {
        impl<'r> ::rocket::response::Responder<'r, 'static> for $t {
            fn respond_to(
                self,
                req: &'r ::rocket::request::Request<'_>,
            ) -> ::rocket::response::Result<'static> {
                ::log::trace!("Rendering template at {}", $template);

                let template =
                    ::rocket_dyn_templates::Template::render($template, &self);

                ::rocket::response::Responder::respond_to(template, req)
            }
        }
    };
}

/// Display information for a page.
#[derive(Debug, Serialize)]
pub struct PageInfo {
    /// The title of the page.
    pub title: String,
    /// The verson of the bbs server.
    pub version: &'static str,
}

impl PageInfo {
    pub fn new<S>(title: S) -> PageInfo
    where
        S: Into<String>,
    {
        PageInfo {
            title: title.into(),
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

/// Serialize `value` and add extra fields to the resulting object.
fn with_fields<T, S>(
    value: &T,
    fields: Vec<(&'static str, JsonValue)>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error>
where
    T: Serialize,
    S: Serializer,
{
    let mut data = to_value(value).map_err(S::Error::custom)?;

    if let Some(obj) = data.as_object_mut() {
        for (key, value) in fields {
            obj.insert(key.into(), value);
        }
    }

    data.serialize(serializer)
}

/// A wrapper for board that can be passed into a template.
#[derive(Debug)]
pub struct BoardView(Board, FixedOffset);

impl BoardView {
    pub fn new(board: Board, config: &Config) -> BoardView {
        BoardView(board, config.timezone())
    }
}

impl Serialize for BoardView {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let BoardView(board, tz) = self;

        let time_stamp = board.created_at.with_timezone(tz).format("%F %R");

        with_fields(
            board,
            vec![
                ("uri", JsonValue::String(board.uri())),
                ("time_stamp", JsonValue::String(time_stamp.to_string())),
            ],
            serializer,
        )
    }
}

/// A wrapper for post that can be passed into a template.
#[derive(Debug)]
pub struct PostView(Post, FixedOffset);

impl PostView {
    pub fn new(post: Post, config: &Config) -> PostView {
        PostView(post, config.timezone())
    }

    fn many(posts: Vec<Post>, config: &Config) -> Vec<PostView> {
        posts
            .into_iter()
            .map(|post| PostView::new(post, config))
            .collect()
    }
}

impl Serialize for PostView {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let PostView(post, tz) = self;

        let time_stamp = post.updated_at.with_timezone(tz).format("%F %R");

        let author = if post.author_name.trim().is_empty() {
            "Anonymous"
        } else {
            post.author_name.as_str()
        };

        with_fields(
            post,
            vec![
                ("uri", JsonValue::String(post.uri())),
                ("board_uri", JsonValue::String(post.board().uri())),
                ("author", JsonValue::String(author.to_string())),
                ("time_stamp", JsonValue::String(time_stamp.to_string())),
            ],
            serializer,
        )
    }
}

/// The home page.
#[derive(Debug, Serialize)]
pub struct HomePage {
    page_info: PageInfo,
    boards: Vec<BoardView>,
    recent_posts: Vec<PostView>,
    distinct: bool,
}

impl HomePage {
    pub fn new(store: &mut dyn Store, config: &Config) -> Result<HomePage> {
        let boards = newest_boards(store, config.newest_boards_limit)?
            .into_iter()
            .map(|board| BoardView::new(board, config))
            .collect();

        let recent =
            recent_feed(store, config.feed_limit(None), config.recent_distinct)?;

        Ok(HomePage {
            page_info: PageInfo::new("Boards"),
            boards,
            recent_posts: PostView::many(recent, config),
            distinct: config.recent_distinct,
        })
    }
}

impl_template_responder!(HomePage, "home");

/// The form for creating a board.
#[derive(Debug, Serialize)]
pub struct NewBoardPage {
    page_info: PageInfo,
}

impl NewBoardPage {
    pub fn new() -> NewBoardPage {
        NewBoardPage {
            page_info: PageInfo::new("New board"),
        }
    }
}

impl_template_responder!(NewBoardPage, "new_board");

/// A page of posts on a board.
#[derive(Debug, Serialize)]
pub struct BoardPage {
    page_info: PageInfo,
    board: BoardView,
    posts: Vec<PostView>,
    /// Link to the page after this one.
    #[serde(skip_serializing_if = "Option::is_none")]
    next_uri: Option<String>,
}

impl BoardPage {
    pub fn new(
        store: &mut dyn Store,
        board: &BoardRef,
        limit: u32,
        cursor: Option<&str>,
        config: &Config,
    ) -> Result<BoardPage> {
        let board = load_board(store, board)?;
        let page = list_page(store, &board.to_ref(), limit, cursor)?;

        let next_uri = page
            .next
            .map(|next| format!("{}?cursor={}&limit={}", board.uri(), next, limit));

        Ok(BoardPage {
            page_info: PageInfo::new(board.name.clone()),
            board: BoardView::new(board, config),
            posts: PostView::many(page.posts, config),
            next_uri,
        })
    }
}

impl_template_responder!(BoardPage, "board");

/// The recent posts across all boards.
#[derive(Debug, Serialize)]
pub struct RecentPage {
    page_info: PageInfo,
    posts: Vec<PostView>,
    distinct: bool,
}

impl RecentPage {
    pub fn new(
        store: &mut dyn Store,
        limit: u32,
        distinct: bool,
        config: &Config,
    ) -> Result<RecentPage> {
        let posts = recent_feed(store, limit, distinct)?;

        Ok(RecentPage {
            page_info: PageInfo::new("Recent posts"),
            posts: PostView::many(posts, config),
            distinct,
        })
    }
}

impl_template_responder!(RecentPage, "recent");

/// A page describing an error.
#[derive(Debug, Serialize)]
pub struct ErrorPage {
    page_info: PageInfo,
    status: u16,
    reason: &'static str,
    message: String,
}

impl ErrorPage {
    pub fn new<S>(status: Status, message: S) -> ErrorPage
    where
        S: Into<String>,
    {
        let reason = status.reason().unwrap_or("Error");

        ErrorPage {
            page_info: PageInfo::new(reason),
            status: status.code,
            reason,
            message: message.into(),
        }
    }
}

impl_template_responder!(ErrorPage, "error");

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn post(author_name: &str) -> Post {
        let time = Utc.with_ymd_and_hms(2024, 3, 1, 23, 30, 0).unwrap();

        Post {
            id: 5,
            board_id: 2,
            author_name: author_name.into(),
            subject: String::new(),
            message: "hello".into(),
            source_address: String::new(),
            created_at: time,
            updated_at: time,
        }
    }

    #[test]
    fn post_view_fields() {
        let config = Config {
            timezone_offset: Some(3600),
            ..Config::default()
        };

        let data = to_value(PostView::new(post(""), &config)).unwrap();

        assert_eq!(data["author"], "Anonymous");
        assert_eq!(data["uri"], "/bbs/2/posts#5");
        assert_eq!(data["board_uri"], "/bbs/2/posts");
        assert_eq!(data["time_stamp"], "2024-03-02 00:30");
        assert_eq!(data["message"], "hello");

        let data = to_value(PostView::new(post("lain"), &config)).unwrap();
        assert_eq!(data["author"], "lain");
    }

    #[test]
    fn home_page_with_huge_limits() -> Result<()> {
        let config = Config {
            recent_limit: u32::MAX,
            newest_boards_limit: u32::MAX,
            ..Config::default()
        };

        let mut store = MemoryStore::new();
        let now = Utc::now();
        let board_id = store.put_board(&NewBoard {
            name: "General".into(),
            description: String::new(),
            theme: String::new(),
            created_at: now,
            updated_at: now,
        })?;
        store.put_post(&NewPost {
            board_id,
            author_name: String::new(),
            subject: String::new(),
            message: "hello".into(),
            source_address: String::new(),
            created_at: now,
            updated_at: now,
        })?;

        let page = HomePage::new(&mut store, &config)?;
        assert_eq!(page.boards.len(), 1);
        assert_eq!(page.recent_posts.len(), 1);

        Ok(())
    }

    #[test]
    fn error_page_status() {
        let page = ErrorPage::new(Status::NotFound, "Board #3 not found");

        assert_eq!(page.status, 404);
        assert_eq!(page.reason, "Not Found");
    }
}
