use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use crate::repo::Repository;
use crate::session::Session;
use crate::store::StoreError;
use serde::de::DeserializeOwned;
use serde_json::json;

/// Deserializes `params`; a missing params object reads as `{}`.
pub fn parse_params<T: DeserializeOwned>(req: &Request) -> Result<T, serde_json::Value> {
    let raw = if req.params.is_null() {
        json!({})
    } else {
        req.params.clone()
    };
    serde_json::from_value(raw).map_err(|e| err(&req.id, "bad_params", e.to_string(), None))
}

pub fn require_str<'a>(req: &'a Request, key: &str) -> Result<&'a str, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing params.{key}"), None))
}

pub fn require_repo<'a>(
    state: &'a AppState,
    req: &Request,
) -> Result<&'a Repository, serde_json::Value> {
    state
        .repo
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn store_failure(id: &str, e: StoreError) -> serde_json::Value {
    match e {
        StoreError::InvalidData(msg) => err(id, "validation_failed", msg, None),
        other => err(id, "store_failed", other.to_string(), None),
    }
}

/// The unexpired session, or an `auth_failed` response.
pub fn require_session(repo: &Repository, req: &Request) -> Result<Session, serde_json::Value> {
    match repo.sessions().current() {
        Ok(Some(s)) => Ok(s),
        Ok(None) => Err(err(
            &req.id,
            "auth_failed",
            "no valid session; sign in again",
            None,
        )),
        Err(e) => Err(store_failure(&req.id, e)),
    }
}
