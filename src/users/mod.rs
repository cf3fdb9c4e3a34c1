use crate::db::DbConnection;
use crate::types::ApiResult;
use rocket::serde::json::Json;
use serde::Serialize;

pub mod models;

use self::models::User;

#[derive(Debug, Serialize)]
pub struct UsersResponse {
    users: Vec<User>,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    user: User,
}

#[get("/users")]
pub async fn list(db: DbConnection) -> ApiResult<UsersResponse> {
    let users = db.run(|conn| User::load_all(conn)).await?;
    Ok(Json(UsersResponse { users }))
}

#[get("/users/<username>")]
pub async fn get(db: DbConnection, username: &str) -> ApiResult<UserResponse> {
    let username = username.to_owned();
    let user = db
        .run(move |conn| User::load_by_name(&username, conn))
        .await?;
    Ok(Json(UserResponse { user }))
}
