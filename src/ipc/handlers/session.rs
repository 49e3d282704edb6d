use crate::auth::{self, AuthError, AuthOperation, LoginForm, SignupForm};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{parse_params, require_repo, require_str, store_failure};
use crate::ipc::types::{AppState, Request};
use crate::model::SessionUser;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

fn auth_failure(id: &str, e: AuthError) -> serde_json::Value {
    match e {
        AuthError::Validation(msg) => err(id, "validation_failed", msg, None),
        AuthError::Rejected(msg) => err(id, "auth_failed", msg, None),
        AuthError::Hash(msg) => err(id, "store_failed", msg, None),
        AuthError::Store(e) => store_failure(id, e),
    }
}

#[derive(Deserialize)]
struct CreateParams {
    user: SessionUser,
}

fn handle_session_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let repo = match require_repo(state, req) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let params: CreateParams = match parse_params(req) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    match repo.sessions().create(params.user) {
        Ok(session) => ok(&req.id, json!({ "session": session })),
        Err(e) => store_failure(&req.id, e),
    }
}

fn handle_session_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(repo) = state.repo.as_ref() else {
        return ok(&req.id, json!({ "session": null }));
    };
    match repo.sessions().get() {
        Ok(session) => ok(&req.id, json!({ "session": session })),
        Err(e) => store_failure(&req.id, e),
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct IsValidParams {
    at: Option<DateTime<Utc>>,
}

fn handle_session_is_valid(state: &mut AppState, req: &Request) -> serde_json::Value {
    let params: IsValidParams = match parse_params(req) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    let Some(repo) = state.repo.as_ref() else {
        return ok(&req.id, json!({ "valid": false }));
    };
    let sessions = repo.sessions();
    let valid = match params.at {
        Some(at) => sessions.is_valid_at(at),
        None => sessions.is_valid(),
    };
    match valid {
        Ok(valid) => ok(&req.id, json!({ "valid": valid })),
        Err(e) => store_failure(&req.id, e),
    }
}

fn handle_session_clear(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(repo) = state.repo.as_ref() else {
        return ok(&req.id, json!({ "cleared": true }));
    };
    match repo.sessions().clear() {
        Ok(()) => ok(&req.id, json!({ "cleared": true })),
        Err(e) => store_failure(&req.id, e),
    }
}

fn handle_login(state: &mut AppState, req: &Request) -> serde_json::Value {
    let repo = match require_repo(state, req) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let form: LoginForm = match parse_params(req) {
        Ok(f) => f,
        Err(resp) => return resp,
    };
    match auth::login(repo, &form) {
        Ok(session) => ok(&req.id, json!({ "session": session })),
        Err(e) => auth_failure(&req.id, e),
    }
}

fn handle_signup(state: &mut AppState, req: &Request) -> serde_json::Value {
    let repo = match require_repo(state, req) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let form: SignupForm = match parse_params(req) {
        Ok(f) => f,
        Err(resp) => return resp,
    };
    match auth::signup(repo, &form) {
        Ok(session) => ok(&req.id, json!({ "session": session })),
        Err(e) => auth_failure(&req.id, e),
    }
}

fn handle_logout(state: &mut AppState, req: &Request) -> serde_json::Value {
    // Same effect as clearing the session; kept as its own verb for the UI.
    handle_session_clear(state, req)
}

fn handle_describe_error(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let raw_op = match require_str(req, "operation") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(op) = AuthOperation::parse(raw_op) else {
        return err(
            &req.id,
            "bad_params",
            format!("unknown operation: {raw_op}"),
            None,
        );
    };
    let code = req
        .params
        .get("code")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    let fallback = req
        .params
        .get("fallback")
        .and_then(|v| v.as_str())
        .unwrap_or("An unexpected error occurred");
    ok(
        &req.id,
        json!({ "message": auth::describe_provider_error(op, code, fallback) }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "session.create" => Some(handle_session_create(state, req)),
        "session.get" => Some(handle_session_get(state, req)),
        "session.isValid" => Some(handle_session_is_valid(state, req)),
        "session.clear" => Some(handle_session_clear(state, req)),
        "auth.login" => Some(handle_login(state, req)),
        "auth.signup" => Some(handle_signup(state, req)),
        "auth.logout" => Some(handle_logout(state, req)),
        "auth.describeError" => Some(handle_describe_error(state, req)),
        _ => None,
    }
}
