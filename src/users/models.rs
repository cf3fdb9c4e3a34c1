use crate::types::ApiError;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde::Serialize;

#[derive(Debug, Queryable, Serialize, PartialEq)]
pub struct User {
    pub username: String,
    pub name: String,
    pub avatar_url: Option<String>,
}

impl User {
    pub fn load_all(connection: &mut PgConnection) -> Result<Vec<User>, ApiError> {
        use crate::db::schema::users::dsl::*;
        users
            .order(username.asc())
            .load::<User>(connection)
            .map_err(|e| e.into())
    }

    pub fn load_by_name(name_: &str, connection: &mut PgConnection) -> Result<User, ApiError> {
        use crate::db::schema::users::dsl::*;
        users
            .filter(username.eq(name_))
            .get_result::<User>(connection)
            .optional()?
            .ok_or_else(|| ApiError::NotFound(format!("User {:?} not found", name_)))
    }
}
