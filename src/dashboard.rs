//! Role home view as plain data. Callers query the repository; building the
//! view touches no storage.

use crate::model::{Activity, Announcement, Assessment, ChildLink, Resource, Role, SessionUser, Student};
use crate::repo::{distinct_students, mean_score, SystemStats};
use serde::Serialize;

pub const RECENT_ACTIVITY_COUNT: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatCard {
    pub key: &'static str,
    pub title: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickAction {
    pub action: &'static str,
    pub title: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeView {
    pub welcome: String,
    pub role: Role,
    pub stats: Vec<StatCard>,
    pub quick_actions: Vec<QuickAction>,
    pub recent_activities: Vec<Activity>,
    pub announcements: Vec<Announcement>,
    pub resources: Vec<Resource>,
}

pub struct DashboardData {
    pub stats: SystemStats,
    pub assessments: Vec<Assessment>,
    pub students: Vec<Student>,
    pub activities: Vec<Activity>,
    /// Already filtered to the viewer's role.
    pub announcements: Vec<Announcement>,
    pub resources: Vec<Resource>,
    pub children: Vec<ChildLink>,
}

fn card(key: &'static str, title: &'static str, value: impl ToString) -> StatCard {
    StatCard {
        key,
        title,
        value: value.to_string(),
    }
}

fn action(action: &'static str, title: &'static str, description: &'static str) -> QuickAction {
    QuickAction {
        action,
        title,
        description,
    }
}

fn percent(mean: Option<f64>) -> String {
    match mean {
        Some(m) => format!("{:.0}%", m / 4.0 * 100.0),
        None => "N/A".to_string(),
    }
}

fn stat_cards(user: &SessionUser, data: &DashboardData) -> Vec<StatCard> {
    match user.role {
        Role::Teacher => {
            let mine: Vec<Assessment> = data
                .assessments
                .iter()
                .filter(|a| a.teacher_id.as_deref() == Some(user.user_id.as_str()))
                .cloned()
                .collect();
            let downloads: u64 = data.resources.iter().map(|r| r.downloads).sum();
            vec![
                card("my-students", "My Students", distinct_students(&mine).len()),
                card("my-assessments", "My Assessments", mine.len()),
                card("avg-competency", "Avg Competency", percent(mean_score(&mine))),
                card("resource-downloads", "Resource Downloads", downloads),
            ]
        }
        Role::Headteacher | Role::Hod => {
            let enrolled = match &user.school {
                Some(school) => data.students.iter().filter(|s| &s.school == school).count(),
                None => data.students.len(),
            };
            vec![
                card("school-enrollment", "School Enrollment", enrolled),
                card("teaching-staff", "Teaching Staff", data.stats.total_teachers),
                card("schools", "Schools", data.stats.total_schools),
                card("assessments", "Assessments", data.stats.total_assessments),
            ]
        }
        Role::Pupil => {
            let mine: Vec<Assessment> = data
                .assessments
                .iter()
                .filter(|a| a.student_id == user.user_id)
                .cloned()
                .collect();
            vec![
                card("my-assessments", "My Assessments", mine.len()),
                card("my-competency", "My Competency", percent(mean_score(&mine))),
                card("announcements", "Announcements", data.announcements.len()),
            ]
        }
        Role::Parent => {
            let theirs: Vec<Assessment> = data
                .assessments
                .iter()
                .filter(|a| data.children.iter().any(|c| c.student_id == a.student_id))
                .cloned()
                .collect();
            vec![
                card("children", "Children", data.children.len()),
                card("child-assessments", "Assessments", theirs.len()),
                card("overall-performance", "Overall Performance", percent(mean_score(&theirs))),
            ]
        }
    }
}

fn quick_actions(role: Role) -> Vec<QuickAction> {
    match role {
        Role::Teacher => vec![
            action("record-assessment", "Record Assessment", "Enter competency scores"),
            action("generate-report", "Generate Report", "Create performance reports"),
            action("lesson-plans", "Lesson Plans", "Access CBC lesson plans"),
            action("parent-messages", "Parent Messages", "Communicate with parents"),
        ],
        Role::Headteacher | Role::Hod => vec![
            action("school-analytics", "School Analytics", "View performance metrics"),
            action("generate-report", "Generate Report", "Create performance reports"),
            action("announcements", "Announcements", "Post school updates"),
            action("export", "Data Management", "Import/export data"),
        ],
        Role::Pupil => vec![
            action("study-materials", "Study Materials", "Access learning resources"),
            action("my-progress", "My Progress", "Track performance"),
        ],
        Role::Parent => vec![
            action("child-progress", "Child Progress", "Monitor performance"),
            action("notifications", "Notifications", "School announcements"),
        ],
    }
}

pub fn home_view(user: &SessionUser, data: &DashboardData) -> HomeView {
    let mut recent = data.activities.clone();
    recent.truncate(RECENT_ACTIVITY_COUNT);
    HomeView {
        welcome: format!("Welcome back, {}!", user.name),
        role: user.role,
        stats: stat_cards(user, data),
        quick_actions: quick_actions(user.role),
        recent_activities: recent,
        announcements: data.announcements.clone(),
        resources: data.resources.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::tests::seeded_repo;
    use crate::repo::{AssessmentFilter, Repository, ResourceFilter, StudentFilter};

    fn data_for(repo: &Repository, user: &SessionUser) -> DashboardData {
        let children = repo
            .get_user(&user.email)
            .unwrap()
            .map(|u| u.children)
            .unwrap_or_default();
        DashboardData {
            stats: repo.get_system_stats().unwrap(),
            assessments: repo.get_assessments(&AssessmentFilter::default()).unwrap(),
            students: repo.get_students(&StudentFilter::default()).unwrap(),
            activities: repo.get_activities(RECENT_ACTIVITY_COUNT).unwrap(),
            announcements: repo.get_announcements(Some(user.role)).unwrap(),
            resources: repo.get_resources(&ResourceFilter::default()).unwrap(),
            children,
        }
    }

    fn session_user(repo: &Repository, email: &str) -> SessionUser {
        SessionUser::from(&repo.get_user(email).unwrap().unwrap())
    }

    fn value<'a>(view: &'a HomeView, key: &str) -> &'a str {
        view.stats
            .iter()
            .find(|c| c.key == key)
            .map(|c| c.value.as_str())
            .unwrap_or_else(|| panic!("missing card {key}"))
    }

    #[test]
    fn teacher_cards_come_from_own_assessments() {
        let (repo, _) = seeded_repo();
        let user = session_user(&repo, "teacher@zames.zm");
        let view = home_view(&user, &data_for(&repo, &user));
        assert_eq!(view.welcome, "Welcome back, John Banda!");
        assert_eq!(value(&view, "my-students"), "1");
        assert_eq!(value(&view, "my-assessments"), "2");
        assert_eq!(value(&view, "avg-competency"), "88%");
        assert_eq!(value(&view, "resource-downloads"), "2137");
        assert_eq!(view.quick_actions[0].action, "record-assessment");
        assert_eq!(view.announcements.len(), 2);
    }

    #[test]
    fn parent_sees_children_and_own_announcements() {
        let (repo, _) = seeded_repo();
        let user = session_user(&repo, "parent@zames.zm");
        let view = home_view(&user, &data_for(&repo, &user));
        assert_eq!(value(&view, "children"), "2");
        assert_eq!(value(&view, "child-assessments"), "2");
        let ids: Vec<_> = view.announcements.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["ANN002"]);
    }

    #[test]
    fn headteacher_and_pupil_cards() {
        let (repo, _) = seeded_repo();
        let head = session_user(&repo, "headteacher@zames.zm");
        let view = home_view(&head, &data_for(&repo, &head));
        assert_eq!(value(&view, "school-enrollment"), "2");
        assert_eq!(value(&view, "teaching-staff"), "1");

        let pupil = session_user(&repo, "pupil@zames.zm");
        let view = home_view(&pupil, &data_for(&repo, &pupil));
        assert_eq!(value(&view, "my-assessments"), "2");
        assert_eq!(value(&view, "announcements"), "0");
        assert!(view.recent_activities.len() <= RECENT_ACTIVITY_COUNT);
    }
}
