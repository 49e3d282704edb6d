use crate::dashboard::{self, DashboardData, RECENT_ACTIVITY_COUNT};
use crate::ipc::helpers::{require_repo, require_session, store_failure};
use crate::ipc::error::ok;
use crate::ipc::types::{AppState, Request};
use crate::model::SessionUser;
use crate::repo::{AssessmentFilter, Repository, ResourceFilter, StudentFilter};
use crate::store::StoreResult;
use serde_json::json;

fn load(repo: &Repository, user: &SessionUser) -> StoreResult<DashboardData> {
    let children = repo
        .get_user(&user.email)?
        .map(|u| u.children)
        .unwrap_or_default();
    Ok(DashboardData {
        stats: repo.get_system_stats()?,
        assessments: repo.get_assessments(&AssessmentFilter::default())?,
        students: repo.get_students(&StudentFilter::default())?,
        activities: repo.get_activities(RECENT_ACTIVITY_COUNT)?,
        announcements: repo.get_announcements(Some(user.role))?,
        resources: repo.get_resources(&ResourceFilter::default())?,
        children,
    })
}

fn handle_home(state: &mut AppState, req: &Request) -> serde_json::Value {
    let repo = match require_repo(state, req) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let session = match require_session(repo, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    match load(repo, &session.user) {
        Ok(data) => ok(
            &req.id,
            json!({ "home": dashboard::home_view(&session.user, &data) }),
        ),
        Err(e) => store_failure(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "dashboard.home" => Some(handle_home(state, req)),
        _ => None,
    }
}
