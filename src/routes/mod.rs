//! Rocket HTTP routes.

use rocket::http::Status;
use rocket::{catch, catchers, get, routes, Catcher, Request, Route, State};

use crate::models::*;
use crate::views::*;
use crate::{config::Config, Result};

pub mod new;

/// Get all routes.
pub fn routes() -> Vec<Route> {
    routes![
        crate::routes::home,
        crate::routes::new_board,
        crate::routes::board,
        crate::routes::recent,
        crate::routes::new::handle_new_board,
        crate::routes::new::handle_new_post,
    ]
}

/// Get all error catchers.
pub fn catchers() -> Vec<Catcher> {
    catchers![not_found, unprocessable]
}

/// Serve the home page.
#[get("/")]
pub async fn home(config: &State<Config>, db: &State<Database>) -> Result<HomePage> {
    let config = config.inner().clone();
    db.run(move |store| HomePage::new(store, &config)).await
}

/// Serve the form for creating a board.
#[get("/bbs")]
pub fn new_board() -> NewBoardPage {
    NewBoardPage::new()
}

/// Serve a page of posts on a board.
#[get("/bbs/<board_id>/posts?<cursor>&<limit>")]
pub async fn board(
    board_id: &str,
    cursor: Option<String>,
    limit: Option<u32>,
    config: &State<Config>,
    db: &State<Database>,
) -> Result<BoardPage> {
    let board = parse_board_id(board_id)?;
    let limit = config.page_limit(limit);
    let config = config.inner().clone();

    db.run(move |store| {
        BoardPage::new(store, &board, limit, cursor.as_deref(), &config)
    })
    .await
}

/// Serve the recent posts across all boards.
#[get("/recent?<limit>&<distinct>")]
pub async fn recent(
    limit: Option<u32>,
    distinct: Option<bool>,
    config: &State<Config>,
    db: &State<Database>,
) -> Result<RecentPage> {
    let limit = config.feed_limit(limit);
    let distinct = distinct.unwrap_or(config.recent_distinct);
    let config = config.inner().clone();

    db.run(move |store| RecentPage::new(store, limit, distinct, &config))
        .await
}

#[catch(404)]
pub fn not_found(req: &Request) -> (Status, ErrorPage) {
    let message = format!("Nothing here at {}", req.uri());
    (Status::NotFound, ErrorPage::new(Status::NotFound, message))
}

#[catch(422)]
pub fn unprocessable(_req: &Request) -> (Status, ErrorPage) {
    let status = Status::UnprocessableEntity;
    (status, ErrorPage::new(status, "The form couldn't be read"))
}

#[cfg(test)]
mod tests {
    use rocket::http::{ContentType, Status};
    use rocket::local::blocking::Client;

    use crate::config::Config;
    use crate::models::Database;

    fn test_config() -> Config {
        Config {
            template_dir: concat!(env!("CARGO_MANIFEST_DIR"), "/res/templates").into(),
            page_size: 2,
            ..Config::default()
        }
    }

    fn client() -> Client {
        Client::tracked(crate::new_instance(test_config(), Database::memory()))
            .expect("valid rocket instance")
    }

    fn create_board(client: &Client, name: &str) -> String {
        let res = client
            .post("/bbs")
            .header(ContentType::Form)
            .body(format!("bbs_name={}&bbs_descr=About+{}&theme=dark", name, name))
            .dispatch();

        assert_eq!(res.status(), Status::SeeOther);

        res.headers()
            .get_one("Location")
            .expect("redirect without a location")
            .to_string()
    }

    fn create_post(client: &Client, board_uri: &str, message: &str) -> Status {
        client
            .post(board_uri)
            .header(ContentType::Form)
            .body(format!("user_name=&subject=hi&message={}", message))
            .dispatch()
            .status()
    }

    #[test]
    fn home_page() {
        let client = client();
        create_board(&client, "General");

        let res = client.get("/").dispatch();
        assert_eq!(res.status(), Status::Ok);
        assert!(res.into_string().unwrap().contains("General"));
    }

    #[test]
    fn new_board_form() {
        let client = client();

        let res = client.get("/bbs").dispatch();
        assert_eq!(res.status(), Status::Ok);
        assert!(res.into_string().unwrap().contains("bbs_name"));
    }

    #[test]
    fn create_board_and_post() {
        let client = client();

        let board_uri = create_board(&client, "General");
        assert_eq!(board_uri, "/bbs/1/posts");

        let res = client
            .post(board_uri.as_str())
            .header(ContentType::Form)
            .body("user_name=wired-lain&subject=hello&message=present+day")
            .dispatch();
        assert_eq!(res.status(), Status::SeeOther);
        assert_eq!(res.headers().get_one("Location"), Some("/bbs/1/posts#1"));

        let res = client.get(board_uri.as_str()).dispatch();
        assert_eq!(res.status(), Status::Ok);

        let body = res.into_string().unwrap();
        assert!(body.contains("present day"));
        assert!(body.contains("wired-lain"));
    }

    #[test]
    fn board_pages_link_to_next() {
        let client = client();
        let board_uri = create_board(&client, "General");

        for message in &["post-one", "post-two", "post-three"] {
            assert_eq!(create_post(&client, &board_uri, message), Status::SeeOther);
        }

        let body = client.get(board_uri.as_str()).dispatch().into_string().unwrap();
        assert!(body.contains("post-three"));
        assert!(body.contains("post-two"));
        assert!(!body.contains("post-one"));
        assert!(body.contains("cursor="));

        let body = client
            .get(format!("{}?limit=5", board_uri))
            .dispatch()
            .into_string()
            .unwrap();
        assert!(body.contains("post-one"));
        assert!(!body.contains("cursor="));
    }

    #[test]
    fn garbage_cursor_is_first_page() {
        let client = client();
        let board_uri = create_board(&client, "General");
        create_post(&client, &board_uri, "hello-there");

        let res = client
            .get(format!("{}?cursor=garbage", board_uri))
            .dispatch();
        assert_eq!(res.status(), Status::Ok);
        assert!(res.into_string().unwrap().contains("hello-there"));
    }

    #[test]
    fn bad_requests() {
        let client = client();

        assert_eq!(client.get("/bbs/abc/posts").dispatch().status(), Status::BadRequest);
        assert_eq!(client.get("/bbs/0/posts").dispatch().status(), Status::BadRequest);

        let res = client
            .post("/bbs")
            .header(ContentType::Form)
            .body("bbs_name=&bbs_descr=&theme=")
            .dispatch();
        assert_eq!(res.status(), Status::BadRequest);

        let board_uri = create_board(&client, "General");
        assert_eq!(create_post(&client, &board_uri, ""), Status::BadRequest);
    }

    #[test]
    fn not_found() {
        let client = client();

        assert_eq!(client.get("/bbs/9/posts").dispatch().status(), Status::NotFound);
        assert_eq!(create_post(&client, "/bbs/9/posts", "hello"), Status::NotFound);
        assert_eq!(client.get("/nowhere").dispatch().status(), Status::NotFound);
    }

    #[test]
    fn recent_feed_page() {
        let client = client();

        let general = create_board(&client, "General");
        let other = create_board(&client, "Other");
        create_post(&client, &general, "first-post");
        create_post(&client, &general, "second-post");
        create_post(&client, &other, "elsewhere-post");

        let body = client.get("/recent").dispatch().into_string().unwrap();
        assert!(body.contains("second-post"));
        assert!(body.contains("elsewhere-post"));
        assert!(!body.contains("first-post"));

        let body = client
            .get("/recent?distinct=false")
            .dispatch()
            .into_string()
            .unwrap();
        assert!(body.contains("first-post"));
    }

    #[test]
    fn huge_limits_are_clamped() {
        let client = client();
        let board_uri = create_board(&client, "General");
        create_post(&client, &board_uri, "only-post");

        let res = client
            .get(format!("{}?limit={}", board_uri, u32::MAX))
            .dispatch();
        assert_eq!(res.status(), Status::Ok);
        assert!(res.into_string().unwrap().contains("only-post"));

        let res = client
            .get(format!("/recent?limit={}&distinct=false", u32::MAX))
            .dispatch();
        assert_eq!(res.status(), Status::Ok);
        assert!(res.into_string().unwrap().contains("only-post"));
    }

    #[test]
    fn unavailable_store_is_server_error() {
        let db = Database::memory();
        let client = Client::tracked(crate::new_instance(test_config(), db.clone()))
            .expect("valid rocket instance");

        if let Database::Memory(ref store) = db {
            store.lock().unwrap().set_unavailable(true);
        }

        assert_eq!(client.get("/").dispatch().status(), Status::InternalServerError);
        assert_eq!(
            client.get("/recent").dispatch().status(),
            Status::InternalServerError
        );
    }
}
