diesel::table! {
    articles (article_id) {
        article_id -> Int4,
        title -> Varchar,
        topic -> Varchar,
        author -> Varchar,
        body -> Varchar,
        created_at -> Timestamptz,
        votes -> Int4,
    }
}

diesel::table! {
    comments (comment_id) {
        comment_id -> Int4,
        body -> Varchar,
        article_id -> Int4,
        author -> Varchar,
        votes -> Int4,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    topics (slug) {
        slug -> Varchar,
        description -> Varchar,
    }
}

diesel::table! {
    users (username) {
        username -> Varchar,
        name -> Varchar,
        avatar_url -> Nullable<Varchar>,
    }
}

diesel::joinable!(articles -> topics (topic));
diesel::joinable!(articles -> users (author));
diesel::joinable!(comments -> articles (article_id));
diesel::joinable!(comments -> users (author));

diesel::allow_tables_to_appear_in_same_query!(articles, comments, topics, users);
