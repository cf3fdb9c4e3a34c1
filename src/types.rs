use diesel::result::{DatabaseErrorKind, Error as DieselError};
use rocket::http::Status;
use rocket::request::Request;
use rocket::response::{self, Responder};
use rocket::serde::json::{self, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use tracing::{debug, error};
use crate::utils::try_respond;

/// Checks a deserialized request body and turns it into its validated form.
pub trait Validate
where
    Self: Sized,
{
    type Valid;
    fn validate(self) -> Result<Self::Valid, ValidationError>;
}

#[derive(Debug)]
pub enum ApiError {
    Diesel(DieselError),
    Validation(ValidationError),
    BadRequest(String),
    NotFound(String),
    Unavailable,
    Internal,
}

impl From<DieselError> for ApiError {
    fn from(err: DieselError) -> ApiError {
        ApiError::Diesel(err)
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> ApiError {
        ApiError::Validation(err)
    }
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Serialize, Default, PartialEq)]
pub struct ValidationError(HashMap<String, Vec<String>>);

impl ValidationError {
    pub fn add_error<K: Into<String>, V: Into<String>>(&mut self, key: K, val: V) {
        self.0.entry(key.into()).or_default().push(val.into());
    }

    pub fn from<K: Into<String>, V: Into<String>>(key: K, val: V) -> Self {
        let mut error = ValidationError::default();
        error.add_error(key, val);
        error
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.0.get(key).map(Vec::as_slice)
    }

    /// Records an error for `key` unless `value` holds non-blank text.
    pub fn require(&mut self, key: &str, value: &Option<String>) {
        match value {
            Some(v) if !v.trim().is_empty() => {}
            Some(_) => self.add_error(key, format!("empty {}", key)),
            None => self.add_error(key, format!("missing {}", key)),
        }
    }

    pub fn into_result<T>(self, valid: impl FnOnce() -> T) -> Result<T, ValidationError> {
        if self.empty() {
            Ok(valid())
        } else {
            Err(self)
        }
    }
}

impl ApiError {
    pub fn status(&self) -> Status {
        match self {
            ApiError::Diesel(error) => match error {
                DieselError::NotFound => Status::NotFound,
                DieselError::DatabaseError(kind, _) => match kind {
                    DatabaseErrorKind::ForeignKeyViolation
                    | DatabaseErrorKind::UniqueViolation
                    | DatabaseErrorKind::NotNullViolation
                    | DatabaseErrorKind::CheckViolation => Status::BadRequest,
                    _ => Status::InternalServerError,
                },
                _ => Status::InternalServerError,
            },
            ApiError::Validation(_) | ApiError::BadRequest(_) => Status::BadRequest,
            ApiError::NotFound(_) => Status::NotFound,
            ApiError::Unavailable => Status::ServiceUnavailable,
            ApiError::Internal => Status::InternalServerError,
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::BadRequest(msg) | ApiError::NotFound(msg) => msg.clone(),
            ApiError::Diesel(DieselError::NotFound) => "Not found".into(),
            ApiError::Diesel(DieselError::DatabaseError(kind, info)) => match kind {
                DatabaseErrorKind::ForeignKeyViolation => match info.details() {
                    Some(details) => format!("Bad request: {}", details),
                    None => "Bad request".into(),
                },
                DatabaseErrorKind::UniqueViolation => "Bad request: already exists".into(),
                _ if self.status() == Status::BadRequest => "Bad request".into(),
                _ => "Internal server error".into(),
            },
            ApiError::Validation(_) => "Bad request".into(),
            ApiError::Unavailable => "Service Unavailable".into(),
            _ => "Internal server error".into(),
        }
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        let status = self.status();
        if status.code >= 500 {
            error!(error = ?self, uri = %req.uri(), "request failed");
        } else {
            debug!(error = ?self, uri = %req.uri(), "request rejected");
        }

        let body = match &self {
            ApiError::Validation(errors) => json!({ "msg": self.message(), "errors": errors }),
            _ => json!({ "msg": self.message() }),
        };
        try_respond(req, &body, status)
    }
}

/// Maps an unparsable path id to a 400.
pub fn parse_id(raw: Result<i32, &str>) -> Result<i32, ApiError> {
    raw.map_err(|bad| ApiError::BadRequest(format!("Bad request: invalid id {:?}", bad)))
}

/// Maps a malformed JSON body to a 400 instead of Rocket's default 422.
pub fn parse_body<T>(body: Result<Json<T>, json::Error<'_>>) -> Result<T, ApiError> {
    match body {
        Ok(body) => Ok(body.into_inner()),
        Err(e) => {
            debug!(error = %e, "malformed request body");
            Err(ApiError::BadRequest("Bad request: malformed body".into()))
        }
    }
}

/// `{"inc_votes": n}` as sent to the vote endpoints.
#[derive(Debug, Deserialize)]
pub struct VoteChange {
    inc_votes: Option<serde_json::Value>,
}

impl Validate for VoteChange {
    type Valid = i32;
    fn validate(self) -> Result<i32, ValidationError> {
        match self.inc_votes {
            None => Err(ValidationError::from("inc_votes", "missing inc_votes")),
            Some(value) => value
                .as_i64()
                .and_then(|v| i32::try_from(v).ok())
                .ok_or_else(|| ValidationError::from("inc_votes", "inc_votes must be an integer")),
        }
    }
}

/// Applies a vote change, refusing totals outside the `INT4` column range.
pub fn tally(current: i32, inc: i32) -> Result<i32, ApiError> {
    current
        .checked_add(inc)
        .ok_or_else(|| ApiError::BadRequest("Bad request: votes out of range".into()))
}
