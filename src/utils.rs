use chrono::{DateTime, SecondsFormat, Utc};
use rocket::http::Status;
use rocket::request::Request;
use rocket::response::{self, Responder, Response};
use rocket::serde::json::Json;
use serde::Serializer;
use serde_json::Value;

pub fn try_respond(req: &Request, json: &Value, status: Status) -> response::Result<'static> {
    Json(json.clone())
        .respond_to(req)
        .and_then(|resp| Response::build_from(resp).status(status).ok())
}

pub fn serialize_date<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let s = date.to_rfc3339_opts(SecondsFormat::Millis, true);
    serializer.serialize_str(&s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Stamp {
        #[serde(serialize_with = "serialize_date")]
        at: DateTime<Utc>,
    }

    #[test]
    fn dates_serialize_as_rfc3339_millis() {
        let at = Utc.with_ymd_and_hms(2020, 7, 9, 20, 11, 0).unwrap();
        let json = serde_json::to_string(&Stamp { at }).unwrap();
        assert_eq!(json, r#"{"at":"2020-07-09T20:11:00.000Z"}"#);
    }
}
