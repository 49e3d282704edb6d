use crate::auth;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{parse_params, require_repo, require_str, store_failure};
use crate::ipc::types::{AppState, Request};
use crate::model::{NewActivity, NewAssessment, Role, User};
use crate::repo::{AssessmentFilter, ResourceFilter, StudentFilter};
use serde::Deserialize;
use serde_json::json;

// Credentials never leave the daemon.
fn redacted(mut user: User) -> User {
    user.password = None;
    user.password_hash = None;
    user
}

fn handle_users_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let email = match require_str(req, "email") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(repo) = state.repo.as_ref() else {
        return ok(&req.id, json!({ "user": null }));
    };
    match repo.get_user(email) {
        Ok(user) => ok(&req.id, json!({ "user": user.map(redacted) })),
        Err(e) => store_failure(&req.id, e),
    }
}

#[derive(Deserialize)]
struct SaveUserParams {
    user: User,
}

fn handle_users_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    let repo = match require_repo(state, req) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let params: SaveUserParams = match parse_params(req) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    let mut user = params.user;
    // Plaintext never reaches storage through this path.
    if let Some(plain) = user.password.take() {
        match auth::hash_password(&plain) {
            Ok(hash) => user.password_hash = Some(hash),
            Err(e) => return err(&req.id, "store_failed", e.to_string(), None),
        }
    }
    match repo.save_user(user) {
        Ok(saved) => ok(&req.id, json!({ "saved": saved })),
        Err(e) => store_failure(&req.id, e),
    }
}

fn handle_schools_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(repo) = state.repo.as_ref() else {
        return ok(&req.id, json!({ "schools": [] }));
    };
    match repo.get_schools() {
        Ok(schools) => ok(&req.id, json!({ "schools": schools })),
        Err(e) => store_failure(&req.id, e),
    }
}

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let filter: StudentFilter = match parse_params(req) {
        Ok(f) => f,
        Err(resp) => return resp,
    };
    let Some(repo) = state.repo.as_ref() else {
        return ok(&req.id, json!({ "students": [] }));
    };
    match repo.get_students(&filter) {
        Ok(students) => ok(&req.id, json!({ "students": students })),
        Err(e) => store_failure(&req.id, e),
    }
}

fn handle_assessments_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let filter: AssessmentFilter = match parse_params(req) {
        Ok(f) => f,
        Err(resp) => return resp,
    };
    let Some(repo) = state.repo.as_ref() else {
        return ok(&req.id, json!({ "assessments": [] }));
    };
    match repo.get_assessments(&filter) {
        Ok(assessments) => ok(&req.id, json!({ "assessments": assessments })),
        Err(e) => store_failure(&req.id, e),
    }
}

#[derive(Deserialize)]
struct AddAssessmentParams {
    assessment: NewAssessment,
}

fn handle_assessments_add(state: &mut AppState, req: &Request) -> serde_json::Value {
    let repo = match require_repo(state, req) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let params: AddAssessmentParams = match parse_params(req) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    match repo.add_assessment(params.assessment) {
        Ok(stored) => ok(&req.id, json!({ "assessment": stored })),
        Err(e) => store_failure(&req.id, e),
    }
}

fn handle_announcements_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let role = match req.params.get("role").and_then(|v| v.as_str()) {
        None | Some("") => None,
        Some(raw) => match Role::parse(raw) {
            Some(r) => Some(r),
            None => return err(&req.id, "bad_params", format!("unknown role: {raw}"), None),
        },
    };
    let Some(repo) = state.repo.as_ref() else {
        return ok(&req.id, json!({ "announcements": [] }));
    };
    match repo.get_announcements(role) {
        Ok(list) => ok(&req.id, json!({ "announcements": list })),
        Err(e) => store_failure(&req.id, e),
    }
}

fn handle_resources_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let filter: ResourceFilter = match parse_params(req) {
        Ok(f) => f,
        Err(resp) => return resp,
    };
    let Some(repo) = state.repo.as_ref() else {
        return ok(&req.id, json!({ "resources": [] }));
    };
    match repo.get_resources(&filter) {
        Ok(resources) => ok(&req.id, json!({ "resources": resources })),
        Err(e) => store_failure(&req.id, e),
    }
}

fn handle_resources_increment(state: &mut AppState, req: &Request) -> serde_json::Value {
    let id = match require_str(req, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(repo) = state.repo.as_ref() else {
        return ok(&req.id, json!({ "updated": false }));
    };
    match repo.increment_resource_downloads(id) {
        Ok(updated) => ok(&req.id, json!({ "updated": updated })),
        Err(e) => store_failure(&req.id, e),
    }
}

fn handle_resources_download(state: &mut AppState, req: &Request) -> serde_json::Value {
    let repo = match require_repo(state, req) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let id = match require_str(req, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let actor = match repo.sessions().current() {
        Ok(s) => s.map(|s| s.user),
        Err(e) => return store_failure(&req.id, e),
    };
    match repo.record_resource_download(id, actor.as_ref()) {
        Ok(Some(resource)) => ok(&req.id, json!({ "resource": resource })),
        Ok(None) => err(
            &req.id,
            "not_found",
            "Resource not found",
            Some(json!({ "id": id })),
        ),
        Err(e) => store_failure(&req.id, e),
    }
}

#[derive(Deserialize)]
struct ActivitiesListParams {
    #[serde(default = "default_activity_limit")]
    limit: usize,
}

fn default_activity_limit() -> usize {
    10
}

fn handle_activities_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let params: ActivitiesListParams = match parse_params(req) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    let Some(repo) = state.repo.as_ref() else {
        return ok(&req.id, json!({ "activities": [] }));
    };
    match repo.get_activities(params.limit) {
        Ok(list) => ok(&req.id, json!({ "activities": list })),
        Err(e) => store_failure(&req.id, e),
    }
}

#[derive(Deserialize)]
struct AddActivityParams {
    activity: NewActivity,
}

fn handle_activities_add(state: &mut AppState, req: &Request) -> serde_json::Value {
    let repo = match require_repo(state, req) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let params: AddActivityParams = match parse_params(req) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    match repo.add_activity(params.activity) {
        Ok(stored) => ok(&req.id, json!({ "activity": stored })),
        Err(e) => store_failure(&req.id, e),
    }
}

fn handle_stats_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(repo) = state.repo.as_ref() else {
        return ok(&req.id, json!({ "stats": null }));
    };
    match repo.get_system_stats() {
        Ok(stats) => ok(&req.id, json!({ "stats": stats })),
        Err(e) => store_failure(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "users.get" => Some(handle_users_get(state, req)),
        "users.save" => Some(handle_users_save(state, req)),
        "schools.list" => Some(handle_schools_list(state, req)),
        "students.list" => Some(handle_students_list(state, req)),
        "assessments.list" => Some(handle_assessments_list(state, req)),
        "assessments.add" => Some(handle_assessments_add(state, req)),
        "announcements.list" => Some(handle_announcements_list(state, req)),
        "resources.list" => Some(handle_resources_list(state, req)),
        "resources.incrementDownloads" => Some(handle_resources_increment(state, req)),
        "resources.download" => Some(handle_resources_download(state, req)),
        "activities.list" => Some(handle_activities_list(state, req)),
        "activities.add" => Some(handle_activities_add(state, req)),
        "stats.get" => Some(handle_stats_get(state, req)),
        _ => None,
    }
}
