diesel::table! {
    board (id) {
        id -> Int8,
        name -> Text,
        description -> Text,
        theme -> Text,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    post (id) {
        id -> Int8,
        board_id -> Int8,
        author_name -> Text,
        subject -> Text,
        message -> Text,
        source_address -> Text,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::joinable!(post -> board (board_id));

diesel::allow_tables_to_appear_in_same_query!(board, post);
