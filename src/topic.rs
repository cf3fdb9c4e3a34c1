use crate::db::schema::topics;
use crate::db::DbConnection;
use crate::types::{parse_body, ApiError, ApiResult, Validate, ValidationError};
use diesel::insert_into;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use rocket::response::status;
use rocket::serde::json::{self, Json};
use serde::{Deserialize, Serialize};
use slug::slugify;

#[derive(Debug, Queryable, Insertable, Serialize, PartialEq)]
#[diesel(table_name = topics)]
pub struct Topic {
    pub slug: String,
    pub description: String,
}

impl Topic {
    pub fn exists(slug_: &str, connection: &mut PgConnection) -> QueryResult<bool> {
        use crate::db::schema::topics::dsl::*;
        diesel::select(diesel::dsl::exists(topics.filter(slug.eq(slug_)))).get_result(connection)
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateTopic {
    slug: Option<String>,
    description: Option<String>,
}

impl Validate for CreateTopic {
    type Valid = Topic;
    fn validate(self) -> Result<Topic, ValidationError> {
        let mut error = ValidationError::default();
        error.require("slug", &self.slug);
        error.require("description", &self.description);
        if let Some(slug) = &self.slug {
            if !slug.trim().is_empty() && slugify(slug) != *slug {
                error.add_error("slug", format!("not a valid slug, try {:?}", slugify(slug)));
            }
        }
        error.into_result(|| Topic {
            slug: self.slug.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct TopicsResponse {
    topics: Vec<Topic>,
}

#[derive(Debug, Serialize)]
pub struct TopicResponse {
    topic: Topic,
}

#[get("/topics")]
pub async fn list(db: DbConnection) -> ApiResult<TopicsResponse> {
    use crate::db::schema::topics::dsl::*;
    let all = db
        .run(|conn| Ok(topics.order(slug.asc()).load::<Topic>(conn)?))
        .await?;
    Ok(Json(TopicsResponse { topics: all }))
}

#[post("/topics", data = "<create>")]
pub async fn create(
    db: DbConnection,
    create: Result<Json<CreateTopic>, json::Error<'_>>,
) -> Result<status::Created<Json<TopicResponse>>, ApiError> {
    let new_topic = parse_body(create)?.validate()?;
    let topic = db
        .run(move |conn| {
            Ok(insert_into(topics::table)
                .values(&new_topic)
                .get_result::<Topic>(conn)?)
        })
        .await?;
    Ok(status::Created::new("/api/topics").body(Json(TopicResponse { topic })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(slug: Option<&str>, description: Option<&str>) -> CreateTopic {
        CreateTopic {
            slug: slug.map(String::from),
            description: description.map(String::from),
        }
    }

    #[test]
    fn valid_topic_passes() {
        let topic = create(Some("rust-lang"), Some("ferris")).validate().unwrap();
        assert_eq!(topic.slug, "rust-lang");
        assert_eq!(topic.description, "ferris");
    }

    #[test]
    fn missing_fields_are_reported() {
        let errors = create(None, Some("  ")).validate().unwrap_err();
        assert_eq!(errors.get("slug"), Some(&["missing slug".to_string()][..]));
        assert_eq!(errors.get("description"), Some(&["empty description".to_string()][..]));
    }

    #[test]
    fn slug_must_be_url_safe() {
        let errors = create(Some("Rust Lang"), Some("ferris")).validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors.get("slug").unwrap()[0].contains("rust-lang"));
    }
}
