use crate::db::schema::{articles, comments};
use crate::db::DbConnection;
use crate::topic::Topic;
use crate::types::*;
use crate::utils::serialize_date;
use chrono::{DateTime, Utc};
use diesel::dsl::count;
use diesel::insert_into;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use rocket::response::status;
use rocket::serde::json::{self, Json};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::debug;

#[derive(Debug, Queryable, Serialize, PartialEq)]
pub struct Article {
    pub article_id: i32,
    pub title: String,
    pub topic: String,
    pub author: String,
    pub body: String,
    #[serde(serialize_with = "serialize_date")]
    pub created_at: DateTime<Utc>,
    pub votes: i32,
}

/// An article together with the number of comments posted on it.
#[derive(Debug, Serialize)]
pub struct ArticleDetail {
    #[serde(flatten)]
    pub article: Article,
    pub comment_count: i64,
}

impl From<(Article, i64)> for ArticleDetail {
    fn from((article, comment_count): (Article, i64)) -> Self {
        ArticleDetail {
            article,
            comment_count,
        }
    }
}

/// Listing row: everything but the body.
#[derive(Debug, Queryable, Serialize)]
pub struct ArticleSummary {
    pub article_id: i32,
    pub author: String,
    pub title: String,
    pub topic: String,
    #[serde(serialize_with = "serialize_date")]
    pub created_at: DateTime<Utc>,
    pub votes: i32,
    pub comment_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SortColumn {
    ArticleId,
    Title,
    Topic,
    Author,
    CreatedAt,
    Votes,
    CommentCount,
}

impl FromStr for SortColumn {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "article_id" => Ok(SortColumn::ArticleId),
            "title" => Ok(SortColumn::Title),
            "topic" => Ok(SortColumn::Topic),
            "author" => Ok(SortColumn::Author),
            "created_at" => Ok(SortColumn::CreatedAt),
            "votes" => Ok(SortColumn::Votes),
            "comment_count" => Ok(SortColumn::CommentCount),
            other => Err(ApiError::BadRequest(format!(
                "Bad request: cannot sort by {:?}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl FromStr for SortOrder {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            _ => Err(ApiError::BadRequest(format!(
                "Bad request: order must be asc or desc, got {:?}",
                s
            ))),
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct ArticleQuery {
    pub sort_by: SortColumn,
    pub order: SortOrder,
    pub topic: Option<String>,
}

impl Default for ArticleQuery {
    fn default() -> Self {
        ArticleQuery {
            sort_by: SortColumn::CreatedAt,
            order: SortOrder::Desc,
            topic: None,
        }
    }
}

impl ArticleQuery {
    pub fn parse(
        sort_by: Option<&str>,
        order: Option<&str>,
        topic: Option<&str>,
    ) -> Result<Self, ApiError> {
        let mut query = ArticleQuery::default();
        if let Some(sort_by) = sort_by {
            query.sort_by = sort_by.parse()?;
        }
        if let Some(order) = order {
            query.order = order.parse()?;
        }
        query.topic = topic.map(String::from);
        Ok(query)
    }
}

macro_rules! sorted {
    ($query:expr, $column:expr, $order:expr) => {
        match $order {
            SortOrder::Asc => $query.order($column.asc()),
            SortOrder::Desc => $query.order($column.desc()),
        }
    };
}

impl Article {
    pub fn list(
        query: &ArticleQuery,
        connection: &mut PgConnection,
    ) -> QueryResult<Vec<ArticleSummary>> {
        let mut select = articles::table
            .left_join(comments::table)
            .group_by(articles::article_id)
            .select((
                articles::article_id,
                articles::author,
                articles::title,
                articles::topic,
                articles::created_at,
                articles::votes,
                count(comments::comment_id.nullable()),
            ))
            .into_boxed();

        if let Some(topic) = &query.topic {
            select = select.filter(articles::topic.eq(topic));
        }

        select = match query.sort_by {
            SortColumn::ArticleId => sorted!(select, articles::article_id, query.order),
            SortColumn::Title => sorted!(select, articles::title, query.order),
            SortColumn::Topic => sorted!(select, articles::topic, query.order),
            SortColumn::Author => sorted!(select, articles::author, query.order),
            SortColumn::CreatedAt => sorted!(select, articles::created_at, query.order),
            SortColumn::Votes => sorted!(select, articles::votes, query.order),
            SortColumn::CommentCount => sorted!(
                select,
                count(comments::comment_id.nullable()),
                query.order
            ),
        };

        select
            .then_order_by(articles::article_id.asc())
            .load::<ArticleSummary>(connection)
    }

    pub fn load_detail(id: i32, connection: &mut PgConnection) -> QueryResult<ArticleDetail> {
        articles::table
            .left_join(comments::table)
            .filter(articles::article_id.eq(id))
            .group_by(articles::article_id)
            .select((articles::all_columns, count(comments::comment_id.nullable())))
            .first::<(Article, i64)>(connection)
            .map(ArticleDetail::from)
    }

    pub fn exists(id: i32, connection: &mut PgConnection) -> QueryResult<bool> {
        use crate::db::schema::articles::dsl::*;
        diesel::select(diesel::dsl::exists(articles.find(id))).get_result(connection)
    }

    /// Adjusts the vote total under a row lock and reloads the article.
    pub fn add_votes(
        id: i32,
        inc: i32,
        connection: &mut PgConnection,
    ) -> Result<ArticleDetail, ApiError> {
        use crate::db::schema::articles::dsl::*;
        connection.transaction(|conn| {
            let current = articles
                .find(id)
                .select(votes)
                .for_update()
                .first::<i32>(conn)?;
            diesel::update(articles.find(id))
                .set(votes.eq(tally(current, inc)?))
                .execute(conn)?;
            Ok(Article::load_detail(id, conn)?)
        })
    }

    /// Removes the article (its comments cascade); returns whether a row went.
    pub fn remove(id: i32, connection: &mut PgConnection) -> QueryResult<bool> {
        use crate::db::schema::articles::dsl::*;
        diesel::delete(articles.find(id))
            .execute(connection)
            .map(|deleted| deleted > 0)
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = articles)]
pub struct NewArticle {
    pub author: String,
    pub title: String,
    pub body: String,
    pub topic: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateArticle {
    author: Option<String>,
    title: Option<String>,
    body: Option<String>,
    topic: Option<String>,
}

impl Validate for CreateArticle {
    type Valid = NewArticle;
    fn validate(self) -> Result<NewArticle, ValidationError> {
        let mut error = ValidationError::default();
        error.require("author", &self.author);
        error.require("title", &self.title);
        error.require("body", &self.body);
        error.require("topic", &self.topic);
        error.into_result(|| NewArticle {
            author: self.author.unwrap_or_default(),
            title: self.title.unwrap_or_default(),
            body: self.body.unwrap_or_default(),
            topic: self.topic.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ArticlesResponse {
    articles: Vec<ArticleSummary>,
}

#[derive(Debug, Serialize)]
pub struct ArticleResponse<T> {
    article: T,
}

#[get("/articles?<sort_by>&<order>&<order_by>&<topic>")]
pub async fn list(
    db: DbConnection,
    sort_by: Option<&str>,
    order: Option<&str>,
    order_by: Option<&str>,
    topic: Option<&str>,
) -> ApiResult<ArticlesResponse> {
    let query = ArticleQuery::parse(sort_by, order.or(order_by), topic)?;
    debug!(?query, "listing articles");
    let articles = db
        .run(move |conn| {
            let articles = Article::list(&query, conn)?;
            if articles.is_empty() {
                if let Some(slug) = &query.topic {
                    if !Topic::exists(slug, conn)? {
                        return Err(ApiError::NotFound(format!("Topic {:?} not found", slug)));
                    }
                }
            }
            Ok(articles)
        })
        .await?;
    Ok(Json(ArticlesResponse { articles }))
}

#[get("/articles/<article_id>")]
pub async fn get(
    db: DbConnection,
    article_id: Result<i32, &str>,
) -> ApiResult<ArticleResponse<ArticleDetail>> {
    let id = parse_id(article_id)?;
    let article = db
        .run(move |conn| Ok(Article::load_detail(id, conn)?))
        .await?;
    Ok(Json(ArticleResponse { article }))
}

#[post("/articles", data = "<create>")]
pub async fn create(
    db: DbConnection,
    create: Result<Json<CreateArticle>, json::Error<'_>>,
) -> Result<status::Created<Json<ArticleResponse<ArticleDetail>>>, ApiError> {
    let new_article = parse_body(create)?.validate()?;
    let article = db
        .run(move |conn| {
            Ok(insert_into(articles::table)
                .values(&new_article)
                .get_result::<Article>(conn)?)
        })
        .await?;
    let location = format!("/api/articles/{}", article.article_id);
    let article = ArticleDetail {
        article,
        comment_count: 0,
    };
    Ok(status::Created::new(location).body(Json(ArticleResponse { article })))
}

#[patch("/articles/<article_id>", data = "<change>")]
pub async fn update_votes(
    db: DbConnection,
    article_id: Result<i32, &str>,
    change: Result<Json<VoteChange>, json::Error<'_>>,
) -> ApiResult<ArticleResponse<ArticleDetail>> {
    let id = parse_id(article_id)?;
    let inc = parse_body(change)?.validate()?;
    let article = db.run(move |conn| Article::add_votes(id, inc, conn)).await?;
    Ok(Json(ArticleResponse { article }))
}

#[delete("/articles/<article_id>")]
pub async fn delete(
    db: DbConnection,
    article_id: Result<i32, &str>,
) -> Result<status::NoContent, ApiError> {
    let id = parse_id(article_id)?;
    if db.run(move |conn| Ok(Article::remove(id, conn)?)).await? {
        Ok(status::NoContent)
    } else {
        Err(ApiError::NotFound(format!("Article {} not found", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_defaults_to_newest_first() {
        let query = ArticleQuery::parse(None, None, None).unwrap();
        assert_eq!(query, ArticleQuery::default());
        assert_eq!(query.sort_by, SortColumn::CreatedAt);
        assert_eq!(query.order, SortOrder::Desc);
    }

    #[test]
    fn query_accepts_whitelisted_columns() {
        let query = ArticleQuery::parse(Some("comment_count"), Some("ASC"), Some("cats")).unwrap();
        assert_eq!(query.sort_by, SortColumn::CommentCount);
        assert_eq!(query.order, SortOrder::Asc);
        assert_eq!(query.topic.as_deref(), Some("cats"));
    }

    #[test]
    fn query_rejects_unknown_column() {
        let err = ArticleQuery::parse(Some("body; DROP TABLE articles"), None, None).unwrap_err();
        assert_eq!(err.status().code, 400);
    }

    #[test]
    fn query_rejects_unknown_order() {
        let err = ArticleQuery::parse(None, Some("sideways"), None).unwrap_err();
        assert_eq!(err.status().code, 400);
    }

    #[test]
    fn create_article_requires_every_field() {
        let errors = CreateArticle {
            title: Some("Rust".into()),
            ..Default::default()
        }
        .validate()
        .unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.get("title").is_none());
        assert!(errors.get("author").is_some());
    }

    #[test]
    fn detail_flattens_comment_count() {
        let article = Article {
            article_id: 1,
            title: "t".into(),
            topic: "cats".into(),
            author: "lurker".into(),
            body: "b".into(),
            created_at: DateTime::<Utc>::from_timestamp(0, 0).unwrap(),
            votes: 2,
        };
        let json = serde_json::to_value(ArticleDetail::from((article, 5))).unwrap();
        assert_eq!(json["article_id"], 1);
        assert_eq!(json["comment_count"], 5);
        assert_eq!(json["created_at"], "1970-01-01T00:00:00.000Z");
    }
}
