//! Error types.

use log::{error, warn};

use rocket::http::Status;
use rocket::response::{self, Responder, Response};
use rocket::Request;

use derive_more::{Display, From};

use crate::models::{BoardId, PostId};
use crate::views::ErrorPage;

/// Our error type.
#[derive(Debug, Display, From)]
pub enum Error {
    #[display(fmt = "Invalid board ID '{}'", raw)]
    ParseBoardId { raw: String },
    #[display(fmt = "Invalid record state: {}", reason)]
    Invariant { reason: &'static str },
    #[display(fmt = "Board #{} not found", board_id)]
    BoardNotFound { board_id: BoardId },
    #[display(fmt = "Post #{} not found", post_id)]
    PostNotFound { post_id: PostId },
    #[display(fmt = "Cursor could not be decoded")]
    StaleCursor,
    #[display(fmt = "Record store is unavailable")]
    StoreUnavailable,
    #[display(fmt = "Record store misbehaved: {}", reason)]
    StoreContract { reason: &'static str },
    #[display(fmt = "The in-memory store keeps nothing once this process exits")]
    EphemeralStore,
    #[display(fmt = "Store task failed: {}", _0)]
    #[from]
    TaskError(rocket::tokio::task::JoinError),
    #[display(fmt = "Database error: {}", _0)]
    #[from]
    DatabaseError(diesel::result::Error),
    #[display(fmt = "Database connection pool error: {}", _0)]
    #[from]
    R2d2Error(r2d2::Error),
    #[display(fmt = "Couldn't connect to the PostgreSQL database: {}", _0)]
    #[from]
    ConnectionError(diesel::ConnectionError),
    #[display(fmt = "Database migration error: {}", msg)]
    MigrationError { msg: String },
    #[display(fmt = "JSON error: {}", _0)]
    #[from]
    JsonError(serde_json::error::Error),
    #[display(fmt = "YAML error: {}", _0)]
    #[from]
    YamlError(serde_yaml::Error),
    #[display(fmt = "Couldn't initialize logging: {}", _0)]
    #[from]
    LogError(log::SetLoggerError),
    #[display(fmt = "I/O error: {}", _0)]
    #[from]
    IoError(std::io::Error),
    #[display(fmt = "I/O error: {}: {}", msg, cause)]
    IoErrorMsg { cause: std::io::Error, msg: String },
}

impl Error {
    pub fn from_io_error<S>(cause: std::io::Error, msg: S) -> Error
    where
        S: Into<String>,
    {
        Error::IoErrorMsg {
            cause,
            msg: msg.into(),
        }
    }

    /// The HTTP status this error is reported with.
    pub fn status(&self) -> Status {
        match self {
            Error::ParseBoardId { .. } | Error::Invariant { .. } => {
                Status::BadRequest
            }
            Error::BoardNotFound { .. } | Error::PostNotFound { .. } => {
                Status::NotFound
            }
            _ => Status::InternalServerError,
        }
    }
}

impl<'r> Responder<'r, 'static> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        let status = self.status();

        if status == Status::InternalServerError {
            error!("{}", &self);
        } else {
            warn!("{}", &self);
        }

        let page = ErrorPage::new(status, self.to_string());
        let res = page.respond_to(req)?;

        Ok(Response::build_from(res).status(status).finalize())
    }
}

impl std::error::Error for Error {}

/// Our result type.
pub type Result<T> = std::result::Result<T, Error>;
