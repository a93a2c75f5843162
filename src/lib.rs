//! A minimal bulletin board engine.
//!
//! Boards hold posts. Posts on a board are read one page at a time, newest
//! first, with an opaque cursor pointing at the next page. The home page
//! shows the newest boards and a feed of recent posts across all of them.

use fern::colors::ColoredLevelConfig;

use rocket::{Build, Rocket};

use rocket_dyn_templates::Template;

pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod schema;
pub mod views;

pub use crate::config::Config;
pub use crate::error::{Error, Result};

use crate::models::Database;

/// Set up logging to stderr, and to the configured log file if there is one.
pub fn init_logging(config: &Config) -> Result<()> {
    let colors = ColoredLevelConfig::new();

    let stderr = fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{} {} [{}] {}",
                chrono::Local::now().format("%F %T"),
                colors.color(record.level()),
                record.target(),
                message
            ))
        })
        .chain(std::io::stderr());

    let mut dispatch = fern::Dispatch::new()
        .level(config.log_level)
        .level_for("hyper", log::LevelFilter::Warn)
        .level_for("handlebars", log::LevelFilter::Warn)
        .chain(stderr);

    if let Some(ref path) = config.log_file {
        let msg = format!("Couldn't open log file at {}", path.display());
        let file =
            fern::log_file(path).map_err(|err| Error::from_io_error(err, msg))?;

        dispatch = dispatch.chain(
            fern::Dispatch::new()
                .format(|out, message, record| {
                    out.finish(format_args!(
                        "{} {} [{}] {}",
                        chrono::Local::now().format("%F %T"),
                        record.level(),
                        record.target(),
                        message
                    ))
                })
                .chain(file),
        );
    }

    dispatch.apply()?;

    Ok(())
}

/// Build a Rocket instance serving `db` with the settings in `config`.
pub fn new_instance(config: Config, db: Database) -> Rocket<Build> {
    let figment = rocket::Config::figment()
        .merge(("address", config.address.clone()))
        .merge(("port", config.port))
        .merge(("template_dir", config.template_dir.clone()));

    rocket::custom(figment)
        .mount("/", routes::routes())
        .register("/", routes::catchers())
        .manage(db)
        .manage(config)
        .attach(Template::fairing())
}
