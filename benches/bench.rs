use chrono::{Duration, Utc};

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use rocket::local::blocking::{Client, LocalResponse};

use bbs::models::*;
use bbs::{new_instance, Config};

fn filled_store(boards: i64, posts_per_board: i64) -> MemoryStore {
    let mut store = MemoryStore::new();
    let start = Utc::now();

    for b in 0..boards {
        let board_id = store
            .put_board(&NewBoard {
                name: format!("board {}", b),
                description: String::new(),
                theme: String::new(),
                created_at: start,
                updated_at: start,
            })
            .expect("couldn't create board");

        for p in 0..posts_per_board {
            let time = start + Duration::seconds(p * boards + b);

            store
                .put_post(&NewPost {
                    board_id,
                    author_name: String::new(),
                    subject: String::new(),
                    message: format!("post {} on board {}", p, b),
                    source_address: String::new(),
                    created_at: time,
                    updated_at: time,
                })
                .expect("couldn't create post");
        }
    }

    store
}

pub fn bench_list_page(c: &mut Criterion) {
    let mut store = filled_store(10, 1000);
    let board = BoardRef { id: 1 };

    let second = list_page(&mut store, &board, 20, None)
        .expect("couldn't list first page")
        .next
        .expect("first page should have a cursor");

    c.bench_function("first page", |b| {
        b.iter(|| list_page(&mut store, black_box(&board), 20, None))
    });

    c.bench_function("second page", |b| {
        b.iter(|| list_page(&mut store, black_box(&board), 20, Some(second.as_str())))
    });
}

pub fn bench_recent_feed(c: &mut Criterion) {
    let mut store = filled_store(50, 100);

    c.bench_function("distinct feed", |b| {
        b.iter(|| recent_feed(&mut store, black_box(10), true))
    });
}

fn get_home<'c>(client: &'c Client) -> LocalResponse<'c> {
    client.get("/").dispatch()
}

pub fn bench_homepage(c: &mut Criterion) {
    let config = Config {
        template_dir: concat!(env!("CARGO_MANIFEST_DIR"), "/res/templates").into(),
        ..Config::default()
    };

    let rocket = new_instance(config, Database::memory());
    let client = Client::tracked(rocket).expect("valid rocket instance");

    c.bench_function("home", |b| b.iter(|| get_home(black_box(&client))));
}

criterion_group!(benches, bench_list_page, bench_recent_feed, bench_homepage);
criterion_main!(benches);
