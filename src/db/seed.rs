//! Resets the database to a known data set.
//!
//! Data lives in four JSON files (`topics.json`, `users.json`,
//! `articles.json`, `comments.json`) inside one directory. Comments refer to
//! articles by their position in `articles.json`, starting at 1, which is the
//! id each article receives once identities are restarted.

use super::schema::{articles, comments, topics, users};
use super::Result;
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::{insert_into, sql_query};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::info;

#[derive(Debug, Deserialize, Insertable)]
#[diesel(table_name = topics)]
pub struct SeedTopic {
    pub slug: String,
    pub description: String,
}

#[derive(Debug, Deserialize, Insertable)]
#[diesel(table_name = users)]
pub struct SeedUser {
    pub username: String,
    pub name: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize, Insertable)]
#[diesel(table_name = articles)]
pub struct SeedArticle {
    pub title: String,
    pub topic: String,
    pub author: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub votes: i32,
}

#[derive(Debug, Deserialize, Insertable)]
#[diesel(table_name = comments)]
pub struct SeedComment {
    pub body: String,
    pub article_id: i32,
    pub author: String,
    #[serde(default)]
    pub votes: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct SeedData {
    pub topics: Vec<SeedTopic>,
    pub users: Vec<SeedUser>,
    pub articles: Vec<SeedArticle>,
    pub comments: Vec<SeedComment>,
}

fn read_json<T: DeserializeOwned>(dir: &Path, name: &str) -> Result<Vec<T>> {
    let raw = fs::read_to_string(dir.join(name))?;
    Ok(serde_json::from_str(&raw)?)
}

impl SeedData {
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        Ok(SeedData {
            topics: read_json(dir, "topics.json")?,
            users: read_json(dir, "users.json")?,
            articles: read_json(dir, "articles.json")?,
            comments: read_json(dir, "comments.json")?,
        })
    }
}

/// Truncates every table and inserts `data`, all in one transaction.
pub fn seed(connection: &mut PgConnection, data: &SeedData) -> Result<()> {
    connection.transaction::<_, diesel::result::Error, _>(|conn| {
        sql_query("TRUNCATE comments, articles, users, topics RESTART IDENTITY CASCADE")
            .execute(conn)?;
        insert_into(topics::table).values(&data.topics).execute(conn)?;
        insert_into(users::table).values(&data.users).execute(conn)?;
        insert_into(articles::table).values(&data.articles).execute(conn)?;
        insert_into(comments::table).values(&data.comments).execute(conn)?;
        Ok(())
    })?;
    info!(
        topics = data.topics.len(),
        users = data.users.len(),
        articles = data.articles.len(),
        comments = data.comments.len(),
        "seeded database"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_data_set_is_consistent() {
        let data = SeedData::from_dir(concat!(env!("CARGO_MANIFEST_DIR"), "/data")).unwrap();
        assert!(!data.topics.is_empty());

        for article in &data.articles {
            assert!(data.topics.iter().any(|t| t.slug == article.topic));
            assert!(data.users.iter().any(|u| u.username == article.author));
        }
        for comment in &data.comments {
            assert!(comment.article_id >= 1);
            assert!(comment.article_id as usize <= data.articles.len());
            assert!(data.users.iter().any(|u| u.username == comment.author));
        }
    }
}
