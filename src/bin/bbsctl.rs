use std::path::PathBuf;

use clap::{value_parser, Arg, ArgAction, Command};

use bbs::models::*;
use bbs::{Config, Result};

fn main_res() -> Result<()> {
    let matches = Command::new("bbsctl")
        .version(env!("CARGO_PKG_VERSION"))
        .author(env!("CARGO_PKG_AUTHORS"))
        .about("Control a bbs server")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .num_args(1)
                .value_parser(value_parser!(PathBuf))
                .help("Config file to use"),
        )
        .arg(
            Arg::new("database-url")
                .short('u')
                .long("database-url")
                .value_name("URL")
                .num_args(1)
                .help("URL to use to connect to the database"),
        )
        .subcommand(
            Command::new("create-board")
                .about("Create a new board")
                .arg(
                    Arg::new("name")
                        .short('n')
                        .long("name")
                        .help("The name of the board")
                        .required(true)
                        .num_args(1),
                )
                .arg(
                    Arg::new("description")
                        .short('d')
                        .long("description")
                        .help("What the board is about")
                        .num_args(1),
                )
                .arg(
                    Arg::new("theme")
                        .short('t')
                        .long("theme")
                        .help("The stylesheet theme of the board")
                        .num_args(1),
                ),
        )
        .subcommand(
            Command::new("list-posts")
                .about("List one page of posts on a board")
                .arg(
                    Arg::new("board")
                        .short('b')
                        .long("board")
                        .help("The ID of the board")
                        .required(true)
                        .num_args(1),
                )
                .arg(
                    Arg::new("limit")
                        .short('l')
                        .long("limit")
                        .help("How many posts to list")
                        .num_args(1)
                        .value_parser(value_parser!(u32)),
                )
                .arg(
                    Arg::new("cursor")
                        .long("cursor")
                        .help("Where to continue from, as printed by a previous listing")
                        .num_args(1),
                ),
        )
        .subcommand(
            Command::new("recent")
                .about("List the most recent posts across all boards")
                .arg(
                    Arg::new("limit")
                        .short('l')
                        .long("limit")
                        .help("How many posts to list")
                        .num_args(1)
                        .value_parser(value_parser!(u32)),
                )
                .arg(
                    Arg::new("all")
                        .short('a')
                        .long("all")
                        .help("Include more than one post per board")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("newest-boards").about("List the most recently created boards"),
        )
        .subcommand(
            Command::new("check-config")
                .about("Check configuration file for errors"),
        )
        .subcommand(
            Command::new("generate-config")
                .about("Print a configuration file with default values"),
        )
        .get_matches();

    if matches.subcommand_matches("generate-config").is_some() {
        return Config::generate(std::io::stdout());
    }

    let conf_path = matches
        .get_one::<PathBuf>("config")
        .cloned()
        .unwrap_or_else(Config::default_path);

    let mut config = Config::open(&conf_path)?;

    if let Some(url) = matches.get_one::<String>("database-url") {
        config.database_url = url.to_owned();
    }

    if matches.subcommand_matches("check-config").is_some() {
        // We've already loaded the config file, so we know it's good.
        println!("Configuration: {}", conf_path.display());
        println!("\nConfig file is good.");
        return Ok(());
    }

    let db = Database::open(&config.database_url)?;

    if let Err(err) = db.require_persistent() {
        if matches.subcommand_matches("create-board").is_some() {
            return Err(err);
        }

        eprintln!("warning: {}; pass --database-url to read a real database", err);
    }

    let mut handle = db.get()?;
    let store = handle.store();

    if let Some(matches) = matches.subcommand_matches("create-board") {
        let arg = |name: &str| matches.get_one::<String>(name).cloned().unwrap_or_default();

        let board_id = create_board(
            store,
            BoardForm {
                name: arg("name"),
                description: arg("description"),
                theme: arg("theme"),
                ..BoardForm::default()
            },
        )?;

        println!("Created board #{} at {}", board_id, BoardRef { id: board_id }.uri());
    } else if let Some(matches) = matches.subcommand_matches("list-posts") {
        let raw = matches.get_one::<String>("board").map(String::as_str).unwrap_or("");
        let board = parse_board_id(raw)?;
        let limit = config.page_limit(matches.get_one::<u32>("limit").copied());
        let cursor = matches.get_one::<String>("cursor").map(String::as_str);

        let page = list_page(store, &board, limit, cursor)?;

        for post in &page.posts {
            print_post(post);
        }

        match page.next {
            Some(next) => println!("next: {}", next),
            None => println!("(end of board)"),
        }
    } else if let Some(matches) = matches.subcommand_matches("recent") {
        let limit = config.feed_limit(matches.get_one::<u32>("limit").copied());
        let distinct = !matches.get_flag("all");

        for post in recent_feed(store, limit, distinct)? {
            print_post(&post);
        }
    } else if matches.subcommand_matches("newest-boards").is_some() {
        for board in newest_boards(store, config.newest_boards_limit)? {
            println!(
                "#{} {} ({}) created {}",
                board.id,
                board.name,
                board.description,
                board.created_at.format("%F %R")
            );
        }
    }

    Ok(())
}

fn print_post(post: &Post) {
    let author = if post.author_name.is_empty() {
        "Anonymous"
    } else {
        &post.author_name
    };

    println!(
        "{} #{} {} {}: {}",
        post.updated_at.format("%F %R"),
        post.id,
        post.board().uri(),
        author,
        post.message
    );
}

fn main() {
    if let Err(e) = main_res() {
        eprintln!("{}", e);
        std::process::exit(-1);
    }
}
