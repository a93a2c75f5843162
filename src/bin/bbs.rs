use std::path::PathBuf;

use clap::{value_parser, Arg, Command};

use log::{error, info};

use bbs::models::Database;
use bbs::{init_logging, new_instance, Config, Result};

fn setup() -> Result<(Config, Database)> {
    let matches = Command::new("bbs")
        .version(env!("CARGO_PKG_VERSION"))
        .author(env!("CARGO_PKG_AUTHORS"))
        .about("Run a bbs server")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .num_args(1)
                .value_parser(value_parser!(PathBuf))
                .help("Config file to use"),
        )
        .get_matches();

    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => Config::open(path)?,
        None => {
            let path = Config::default_path();

            if path.exists() {
                Config::open(path)?
            } else {
                Config::default()
            }
        }
    };

    init_logging(&config)?;

    info!("Starting bbs {}", env!("CARGO_PKG_VERSION"));
    config.debug_log();

    let db = Database::open(&config.database_url)?;
    info!("Opened database {:?}", db);

    Ok((config, db))
}

#[rocket::main]
async fn main() {
    let (config, db) = match setup() {
        Ok(setup) => setup,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(-1);
        }
    };

    if let Err(e) = new_instance(config, db).launch().await {
        error!("{}", e);
        std::process::exit(-1);
    }
}
