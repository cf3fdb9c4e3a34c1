use crate::article::Article;
use crate::db::schema::comments;
use crate::db::DbConnection;
use crate::types::*;
use crate::utils::serialize_date;
use chrono::{DateTime, Utc};
use diesel::insert_into;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use rocket::response::status;
use rocket::serde::json::{self, Json};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Queryable, PartialEq)]
pub struct Comment {
    pub comment_id: i32,
    pub body: String,
    pub article_id: i32,
    pub author: String,
    pub votes: i32,
    #[serde(serialize_with = "serialize_date")]
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn for_article(article: i32, connection: &mut PgConnection) -> QueryResult<Vec<Comment>> {
        use crate::db::schema::comments::dsl::*;
        comments
            .filter(article_id.eq(article))
            .order((created_at.desc(), comment_id.desc()))
            .load::<Comment>(connection)
    }

    pub fn add_votes(id: i32, inc: i32, connection: &mut PgConnection) -> Result<Comment, ApiError> {
        use crate::db::schema::comments::dsl::*;
        connection.transaction(|conn| {
            let current = comments
                .find(id)
                .select(votes)
                .for_update()
                .first::<i32>(conn)?;
            Ok(diesel::update(comments.find(id))
                .set(votes.eq(tally(current, inc)?))
                .get_result::<Comment>(conn)?)
        })
    }

    pub fn remove(id: i32, connection: &mut PgConnection) -> QueryResult<bool> {
        use crate::db::schema::comments::dsl::*;
        diesel::delete(comments.find(id))
            .execute(connection)
            .map(|deleted| deleted > 0)
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = comments)]
pub struct NewComment {
    pub article_id: i32,
    pub author: String,
    pub body: String,
}

/// Body of a new comment; `author` is accepted in place of `username`.
#[derive(Debug, Default, Deserialize)]
pub struct CommentBody {
    username: Option<String>,
    author: Option<String>,
    body: Option<String>,
}

impl Validate for CommentBody {
    type Valid = (String, String);
    fn validate(self) -> Result<(String, String), ValidationError> {
        let mut error = ValidationError::default();
        let username = match (self.username, self.author) {
            (Some(username), Some(author)) if username != author => {
                error.add_error("username", "username and author name different users");
                Some(username)
            }
            (username, author) => username.or(author),
        };
        error.require("username", &username);
        error.require("body", &self.body);
        error.into_result(|| (username.unwrap_or_default(), self.body.unwrap_or_default()))
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CommentContainer<T> {
    comment: T,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CommentsContainer<T> {
    comments: T,
}

fn ensure_article(id: i32, connection: &mut PgConnection) -> Result<(), ApiError> {
    if Article::exists(id, connection)? {
        Ok(())
    } else {
        Err(ApiError::NotFound(format!("Article {} not found", id)))
    }
}

#[get("/articles/<article_id>/comments")]
pub async fn list(
    db: DbConnection,
    article_id: Result<i32, &str>,
) -> ApiResult<CommentsContainer<Vec<Comment>>> {
    let id = parse_id(article_id)?;
    let comments = db
        .run(move |conn| {
            ensure_article(id, conn)?;
            Ok(Comment::for_article(id, conn)?)
        })
        .await?;
    Ok(Json(CommentsContainer { comments }))
}

#[post("/articles/<article_id>/comments", data = "<details>")]
pub async fn add(
    db: DbConnection,
    article_id: Result<i32, &str>,
    details: Result<Json<CommentBody>, json::Error<'_>>,
) -> Result<status::Created<Json<CommentContainer<Comment>>>, ApiError> {
    let id = parse_id(article_id)?;
    let (author, body) = parse_body(details)?.validate()?;
    let new_comment = NewComment {
        article_id: id,
        author,
        body,
    };

    let comment = db
        .run(move |conn| {
            ensure_article(id, conn)?;
            Ok(insert_into(comments::table)
                .values(&new_comment)
                .get_result::<Comment>(conn)?)
        })
        .await?;

    let location = format!("/api/comments/{}", comment.comment_id);
    Ok(status::Created::new(location).body(Json(CommentContainer { comment })))
}

#[patch("/comments/<comment_id>", data = "<change>")]
pub async fn update_votes(
    db: DbConnection,
    comment_id: Result<i32, &str>,
    change: Result<Json<VoteChange>, json::Error<'_>>,
) -> ApiResult<CommentContainer<Comment>> {
    let id = parse_id(comment_id)?;
    let inc = parse_body(change)?.validate()?;
    let comment = db.run(move |conn| Comment::add_votes(id, inc, conn)).await?;
    Ok(Json(CommentContainer { comment }))
}

#[delete("/comments/<comment_id>")]
pub async fn delete(
    db: DbConnection,
    comment_id: Result<i32, &str>,
) -> Result<status::NoContent, ApiError> {
    let id = parse_id(comment_id)?;
    if db.run(move |conn| Ok(Comment::remove(id, conn)?)).await? {
        Ok(status::NoContent)
    } else {
        Err(ApiError::NotFound(format!("Comment {} not found", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn author_is_an_alias_for_username() {
        let body: CommentBody =
            serde_json::from_str(r#"{"author": "lurker", "body": "hi"}"#).unwrap();
        assert_eq!(
            body.validate().unwrap(),
            ("lurker".to_string(), "hi".to_string())
        );
    }

    #[test]
    fn username_and_author_together() {
        let same: CommentBody = serde_json::from_str(
            r#"{"username": "lurker", "author": "lurker", "body": "hi"}"#,
        )
        .unwrap();
        assert_eq!(same.validate().unwrap().0, "lurker");

        let clash: CommentBody = serde_json::from_str(
            r#"{"username": "lurker", "author": "rogersop", "body": "hi"}"#,
        )
        .unwrap();
        let errors = clash.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors.get("username"),
            Some(&["username and author name different users".to_string()][..])
        );
    }

    #[test]
    fn missing_body_is_rejected() {
        let body: CommentBody = serde_json::from_str(r#"{"username": "lurker"}"#).unwrap();
        let errors = body.validate().unwrap_err();
        assert_eq!(errors.get("body"), Some(&["missing body".to_string()][..]));
    }
}
