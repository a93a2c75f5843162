//! Routes for creating new boards and new posts.

use std::net::IpAddr;

use rocket::form::{Form, FromForm};
use rocket::response::Redirect;
use rocket::{post, State};

use crate::models::*;
use crate::Result;

/// Form data for a new board.
#[derive(Debug, FromForm)]
pub struct NewBoardData {
    bbs_name: Option<String>,
    bbs_descr: Option<String>,
    theme: Option<String>,
}

/// Form data for a new post.
#[derive(Debug, FromForm)]
pub struct NewPostData {
    user_name: Option<String>,
    subject: Option<String>,
    message: Option<String>,
}

/// Create a new board.
#[post("/bbs", data = "<data>")]
pub async fn handle_new_board(
    data: Form<NewBoardData>,
    db: &State<Database>,
) -> Result<Redirect> {
    let data = data.into_inner();

    let form = BoardForm {
        name: data.bbs_name.unwrap_or_default(),
        description: data.bbs_descr.unwrap_or_default(),
        theme: data.theme.unwrap_or_default(),
        ..BoardForm::default()
    };

    let board_id = db.run(move |store| create_board(store, form)).await?;

    Ok(Redirect::to(BoardRef { id: board_id }.uri()))
}

/// Create a new post on a board.
#[post("/bbs/<board_id>/posts", data = "<data>")]
pub async fn handle_new_post(
    board_id: &str,
    data: Form<NewPostData>,
    addr: Option<IpAddr>,
    db: &State<Database>,
) -> Result<Redirect> {
    let board = parse_board_id(board_id)?;
    let data = data.into_inner();

    let form = PostForm {
        author_name: data.user_name.unwrap_or_default(),
        subject: data.subject.unwrap_or_default(),
        message: data.message.unwrap_or_default(),
        source_address: addr.map(|addr| addr.to_string()).unwrap_or_default(),
        ..PostForm::default()
    };

    let post_id = db
        .run(move |store| create_post(store, &board, form))
        .await?;

    Ok(Redirect::to(format!("{}#{}", board.uri(), post_id)))
}
