//! Typed queries and mutations over the dataset blob.
//!
//! Reads load the whole blob and filter in memory. Writes are one atomic
//! read-modify-write of the blob. A missing dataset reads as empty and makes
//! every mutation a no-op.

use crate::clock::Clock;
use crate::db;
use crate::model::{
    Activity, Announcement, Assessment, CompetencyLevel, Dataset, NewActivity, NewAssessment,
    Resource, Role, School, SessionUser, Student, User, DATA_VERSION,
};
use crate::seed::{self, DATA_KEY, INITIALIZED_KEY};
use crate::session::{Session, SessionManager, SESSION_KEY};
use crate::store::{KvStore, StoreError, StoreResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AssessmentFilter {
    pub student_id: Option<String>,
    pub teacher_id: Option<String>,
    pub subject: Option<String>,
    pub grade: Option<String>,
}

impl AssessmentFilter {
    pub fn matches(&self, a: &Assessment) -> bool {
        field_matches(&self.student_id, Some(&a.student_id))
            && field_matches(&self.teacher_id, a.teacher_id.as_deref())
            && field_matches(&self.subject, Some(&a.subject))
            && field_matches(&self.grade, a.grade.as_deref())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResourceFilter {
    pub subject: Option<String>,
    pub grade_level: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

impl ResourceFilter {
    pub fn matches(&self, r: &Resource) -> bool {
        field_matches(&self.subject, Some(&r.subject))
            && field_matches(&self.grade_level, Some(&r.grade_level))
            && field_matches(&self.kind, Some(&r.kind))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StudentFilter {
    pub grade: Option<String>,
    pub school: Option<String>,
}

impl StudentFilter {
    pub fn matches(&self, s: &Student) -> bool {
        field_matches(&self.grade, Some(&s.grade)) && field_matches(&self.school, Some(&s.school))
    }
}

// An empty filter value does not constrain, matching how the dashboard sends unset fields.
fn field_matches(filter: &Option<String>, value: Option<&str>) -> bool {
    match filter.as_deref() {
        None | Some("") => true,
        Some(want) => value == Some(want),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStats {
    pub total_students: usize,
    pub total_teachers: usize,
    pub total_schools: usize,
    pub total_assessments: usize,
    pub total_resources: usize,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub data: Option<Dataset>,
    pub session: Option<Session>,
    #[serde(default)]
    pub export_date: Option<DateTime<Utc>>,
    pub version: String,
}

pub struct Repository {
    store: KvStore,
    clock: Box<dyn Clock>,
}

impl Repository {
    pub fn new(store: KvStore, clock: Box<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Opens the workspace database and seeds it on first use.
    pub fn open(workspace: &Path, prefix: &str, clock: Box<dyn Clock>) -> anyhow::Result<Self> {
        let conn = db::open_db(workspace)?;
        let repo = Self::new(KvStore::new(conn, prefix), clock);
        if repo.initialize()? {
            info!(workspace = %workspace.display(), "initialized new workspace");
        }
        Ok(repo)
    }

    pub fn initialize(&self) -> StoreResult<bool> {
        seed::initialize_if_absent(&self.store, self.clock.now())
    }

    pub fn store(&self) -> &KvStore {
        &self.store
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn sessions(&self) -> SessionManager<'_> {
        SessionManager::new(&self.store, self.clock.as_ref())
    }

    pub fn dataset(&self) -> StoreResult<Option<Dataset>> {
        self.store.get(DATA_KEY)
    }

    fn dataset_or_empty(&self) -> StoreResult<Dataset> {
        Ok(self.dataset()?.unwrap_or_default())
    }

    pub fn get_user(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.dataset_or_empty()?.users.remove(email))
    }

    /// Inserts or overwrites by email. A record without credentials keeps the
    /// stored ones. Returns false when there is no dataset.
    pub fn save_user(&self, mut user: User) -> StoreResult<bool> {
        let saved = self.store.update::<Dataset, _>(DATA_KEY, |data| {
            if user.password.is_none() && user.password_hash.is_none() {
                if let Some(existing) = data.users.get(&user.email) {
                    user.password = existing.password.clone();
                    user.password_hash = existing.password_hash.clone();
                }
            }
            data.users.insert(user.email.clone(), user);
        })?;
        Ok(saved.is_some())
    }

    /// Inserts a user that does not exist yet and logs the signup.
    /// `Some(false)` means the email is already taken; `None` means no dataset.
    pub fn register_user(&self, user: User) -> StoreResult<Option<bool>> {
        let now = self.clock.now();
        self.store.transaction(|tx| {
            let Some(mut data) = tx.get::<Dataset>(DATA_KEY)? else {
                return Ok(None);
            };
            if data.users.contains_key(&user.email) {
                return Ok(Some(false));
            }
            data.push_activity(
                NewActivity {
                    kind: "signup".to_string(),
                    user: Some(user.name.clone()),
                    user_id: Some(user.id.clone()),
                    action: "Account created".to_string(),
                    details: format!("{} account", user.role.label()),
                },
                now,
            );
            data.users.insert(user.email.clone(), user);
            tx.set(DATA_KEY, &data)?;
            Ok(Some(true))
        })
    }

    /// Stamps `lastLogin` and logs the login in one write.
    pub fn record_login(&self, email: &str) -> StoreResult<Option<User>> {
        let now = self.clock.now();
        self.store.transaction(|tx| {
            let Some(mut data) = tx.get::<Dataset>(DATA_KEY)? else {
                return Ok(None);
            };
            let Some(user) = data.users.get_mut(email) else {
                return Ok(None);
            };
            user.last_login = Some(now);
            let user = user.clone();
            data.push_activity(
                NewActivity {
                    kind: "login".to_string(),
                    user: Some(user.name.clone()),
                    user_id: Some(user.id.clone()),
                    action: "Logged in".to_string(),
                    details: format!("{} dashboard access", user.role.label()),
                },
                now,
            );
            tx.set(DATA_KEY, &data)?;
            Ok(Some(user))
        })
    }

    pub fn get_schools(&self) -> StoreResult<Vec<School>> {
        Ok(self.dataset_or_empty()?.schools)
    }

    /// AND of every set filter, in stored order (newest first).
    pub fn get_assessments(&self, filter: &AssessmentFilter) -> StoreResult<Vec<Assessment>> {
        let mut assessments = self.dataset_or_empty()?.assessments;
        assessments.retain(|a| filter.matches(a));
        Ok(assessments)
    }

    /// Assigns id, level and creation time, prepends the record and logs the
    /// matching activity in the same write.
    pub fn add_assessment(&self, new: NewAssessment) -> StoreResult<Option<Assessment>> {
        let level = CompetencyLevel::from_score(new.score).ok_or_else(|| {
            StoreError::InvalidData(format!(
                "score must be between {} and {}, got {}",
                CompetencyLevel::MIN_SCORE,
                CompetencyLevel::MAX_SCORE,
                new.score
            ))
        })?;
        let now = self.clock.now();
        self.store.update::<Dataset, _>(DATA_KEY, |data| {
            let term = new.term.unwrap_or_else(|| {
                data.system
                    .as_ref()
                    .map(|s| s.current_term.clone())
                    .unwrap_or_default()
            });
            let assessment = Assessment {
                id: data.next_assessment_id(),
                student_id: new.student_id,
                student_name: new.student_name,
                grade: new.grade,
                subject: new.subject,
                competency: new.competency,
                score: new.score,
                level,
                date: new.date.unwrap_or_else(|| now.date_naive()),
                term,
                teacher: new.teacher,
                teacher_id: new.teacher_id,
                comments: new.comments,
                evidence: new.evidence,
                created_at: Some(now),
            };
            data.assessments.insert(0, assessment.clone());
            let student = assessment
                .student_name
                .clone()
                .unwrap_or_else(|| assessment.student_id.clone());
            data.push_activity(
                NewActivity {
                    kind: "assessment".to_string(),
                    user: assessment.teacher.clone(),
                    user_id: assessment.teacher_id.clone(),
                    action: "Recorded assessment".to_string(),
                    details: format!("{} assessment for {}", assessment.subject, student),
                },
                now,
            );
            assessment
        })
    }

    /// Announcements visible to `role` (all of them when `role` is None), newest date first.
    pub fn get_announcements(&self, role: Option<Role>) -> StoreResult<Vec<Announcement>> {
        let mut announcements = self.dataset_or_empty()?.announcements;
        if let Some(role) = role {
            announcements.retain(|a| a.visible_to(role));
        }
        announcements.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(announcements)
    }

    pub fn get_resources(&self, filter: &ResourceFilter) -> StoreResult<Vec<Resource>> {
        let mut resources = self.dataset_or_empty()?.resources;
        resources.retain(|r| filter.matches(r));
        Ok(resources)
    }

    /// Returns false, without writing, for an unknown id or a missing dataset.
    pub fn increment_resource_downloads(&self, id: &str) -> StoreResult<bool> {
        self.store.transaction(|tx| {
            let Some(mut data) = tx.get::<Dataset>(DATA_KEY)? else {
                return Ok(false);
            };
            let Some(resource) = data.resources.iter_mut().find(|r| r.id == id) else {
                return Ok(false);
            };
            resource.downloads += 1;
            tx.set(DATA_KEY, &data)?;
            Ok(true)
        })
    }

    /// Download as the dashboard performs it: bump the counter and log who took it.
    pub fn record_resource_download(
        &self,
        id: &str,
        actor: Option<&SessionUser>,
    ) -> StoreResult<Option<Resource>> {
        let now = self.clock.now();
        self.store.transaction(|tx| {
            let Some(mut data) = tx.get::<Dataset>(DATA_KEY)? else {
                return Ok(None);
            };
            let Some(resource) = data.resources.iter_mut().find(|r| r.id == id) else {
                return Ok(None);
            };
            resource.downloads += 1;
            let resource = resource.clone();
            data.push_activity(
                NewActivity {
                    kind: "resource".to_string(),
                    user: actor.map(|u| u.name.clone()),
                    user_id: actor.map(|u| u.user_id.clone()),
                    action: "Downloaded resource".to_string(),
                    details: resource.title.clone(),
                },
                now,
            );
            tx.set(DATA_KEY, &data)?;
            Ok(Some(resource))
        })
    }

    /// Most recent first by timestamp; ties keep stored order.
    pub fn get_activities(&self, limit: usize) -> StoreResult<Vec<Activity>> {
        let mut activities = self.dataset_or_empty()?.activities;
        activities.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        activities.truncate(limit);
        Ok(activities)
    }

    pub fn add_activity(&self, activity: NewActivity) -> StoreResult<Option<Activity>> {
        let now = self.clock.now();
        self.store
            .update::<Dataset, _>(DATA_KEY, |data| data.push_activity(activity, now))
    }

    pub fn get_students(&self, filter: &StudentFilter) -> StoreResult<Vec<Student>> {
        let mut students = self.dataset_or_empty()?.students;
        students.retain(|s| filter.matches(s));
        Ok(students)
    }

    pub fn get_system_stats(&self) -> StoreResult<SystemStats> {
        let data = self.dataset_or_empty()?;
        Ok(SystemStats {
            total_students: data.students.len(),
            total_teachers: data
                .users
                .values()
                .filter(|u| u.role == Role::Teacher)
                .count(),
            total_schools: data.schools.len(),
            total_assessments: data.assessments.len(),
            total_resources: data.resources.len(),
            last_updated: data
                .system
                .as_ref()
                .map(|s| s.last_sync)
                .unwrap_or_else(|| self.clock.now()),
        })
    }

    pub fn export_data(&self) -> StoreResult<ExportDocument> {
        Ok(ExportDocument {
            data: self.dataset()?,
            session: self.sessions().get()?,
            export_date: Some(self.clock.now()),
            version: DATA_VERSION.to_string(),
        })
    }

    /// Replaces the dataset (and the session, when the payload has one) if the
    /// version tag matches exactly. Returns false on a version mismatch; nothing
    /// is merged in either case.
    pub fn import_data(&self, payload: &serde_json::Value) -> StoreResult<bool> {
        let version = payload.get("version").and_then(|v| v.as_str());
        if version != Some(DATA_VERSION) {
            warn!(?version, expected = DATA_VERSION, "import rejected: version mismatch");
            return Ok(false);
        }
        let doc: ExportDocument = serde_json::from_value(payload.clone())
            .map_err(|e| StoreError::InvalidData(format!("import payload: {e}")))?;
        self.store.transaction(|tx| {
            match &doc.data {
                Some(data) => tx.set(DATA_KEY, data)?,
                None => tx.remove(DATA_KEY)?,
            }
            if let Some(session) = &doc.session {
                tx.set(SESSION_KEY, session)?;
            }
            tx.set(INITIALIZED_KEY, &true)?;
            Ok(())
        })?;
        info!(exported_at = ?doc.export_date, "dataset imported");
        Ok(true)
    }

    /// Clears the namespace and writes a fresh seed.
    pub fn reset_data(&self) -> StoreResult<()> {
        let now = self.clock.now();
        self.store.transaction(|tx| {
            let removed = tx.clear()?;
            info!(removed, "namespace cleared");
            seed::write_seed(tx, now)
        })
    }
}

/// Mean score over the given assessments, if any.
pub fn mean_score(assessments: &[Assessment]) -> Option<f64> {
    if assessments.is_empty() {
        return None;
    }
    let total: u32 = assessments.iter().map(|a| u32::from(a.score)).sum();
    Some(f64::from(total) / assessments.len() as f64)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Improving,
    Stable,
    Declining,
}

impl Trend {
    pub fn as_str(self) -> &'static str {
        match self {
            Trend::Improving => "Improving",
            Trend::Stable => "Stable",
            Trend::Declining => "Declining",
        }
    }
}

/// Compares the mean of the newer half of the assessments (by date, then id)
/// against the older half. Needs at least two assessments.
pub fn performance_trend(assessments: &[Assessment]) -> Option<Trend> {
    if assessments.len() < 2 {
        return None;
    }
    let mut ordered: Vec<Assessment> = assessments.to_vec();
    ordered.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
    let (older, newer) = ordered.split_at(ordered.len() / 2);
    let (older, newer) = (mean_score(older)?, mean_score(newer)?);
    Some(match newer.partial_cmp(&older) {
        Some(std::cmp::Ordering::Greater) => Trend::Improving,
        Some(std::cmp::Ordering::Less) => Trend::Declining,
        _ => Trend::Stable,
    })
}

/// Distinct student ids in first-seen order.
pub fn distinct_students(assessments: &[Assessment]) -> Vec<&str> {
    let mut seen = HashSet::new();
    assessments
        .iter()
        .map(|a| a.student_id.as_str())
        .filter(|id| seen.insert(*id))
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::model::ACTIVITY_LOG_CAP;
    use crate::store::DEFAULT_PREFIX;
    use chrono::{Duration, NaiveDate, TimeZone};
    use serde_json::json;
    use std::sync::Arc;

    pub(crate) fn seeded_repo() -> (Repository, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 2, 1, 9, 0, 0).unwrap(),
        ));
        let store = KvStore::new(db::open_in_memory().expect("db"), DEFAULT_PREFIX);
        let repo = Repository::new(store, Box::new(clock.clone()));
        assert!(repo.initialize().expect("seed"));
        (repo, clock)
    }

    fn empty_repo() -> Repository {
        let store = KvStore::new(db::open_in_memory().expect("db"), DEFAULT_PREFIX);
        Repository::new(store, Box::new(crate::clock::SystemClock))
    }

    pub(crate) fn new_assessment(student: &str, subject: &str, score: u8) -> NewAssessment {
        serde_json::from_value(json!({
            "studentId": student,
            "studentName": format!("Student {student}"),
            "grade": "Grade 7",
            "subject": subject,
            "competency": "Problem Solving",
            "score": score,
            "teacher": "John Banda",
            "teacherId": "T001",
            "comments": "ok"
        }))
        .expect("new assessment")
    }

    #[test]
    fn assessment_filters_are_and_combined() {
        let (repo, _) = seeded_repo();
        repo.add_assessment(new_assessment("S002", "Mathematics", 2))
            .expect("add");

        let all = repo
            .get_assessments(&AssessmentFilter::default())
            .expect("all");
        assert_eq!(all.len(), 3);

        let filter = AssessmentFilter {
            student_id: Some("S001".into()),
            subject: Some("Mathematics".into()),
            ..Default::default()
        };
        let got = repo.get_assessments(&filter).expect("filtered");
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].id, "A001");

        let expected: Vec<_> = all.iter().filter(|a| filter.matches(a)).cloned().collect();
        assert_eq!(got, expected);

        let none = repo
            .get_assessments(&AssessmentFilter {
                student_id: Some("S002".into()),
                subject: Some("Science".into()),
                ..Default::default()
            })
            .expect("none");
        assert!(none.is_empty());

        let blank = repo
            .get_assessments(&AssessmentFilter {
                subject: Some(String::new()),
                ..Default::default()
            })
            .expect("blank filter");
        assert_eq!(blank.len(), 3);
    }

    #[test]
    fn added_assessment_gets_next_id_and_leads_the_listing() {
        let (repo, _) = seeded_repo();
        let before = repo
            .get_assessments(&AssessmentFilter::default())
            .expect("before")
            .len();

        let stored = repo
            .add_assessment(new_assessment("S001", "English", 3))
            .expect("add")
            .expect("dataset present");
        assert_eq!(stored.id, format!("A{:03}", before + 1));
        assert_eq!(stored.level, CompetencyLevel::Proficient);
        assert_eq!(stored.term, "Term 1");
        assert_eq!(stored.date, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());

        let mine = repo
            .get_assessments(&AssessmentFilter {
                student_id: Some("S001".into()),
                ..Default::default()
            })
            .expect("mine");
        assert_eq!(mine[0], stored);

        let latest = repo.get_activities(1).expect("activities");
        assert_eq!(latest[0].action, "Recorded assessment");
        assert_eq!(latest[0].details, "English assessment for Student S001");
    }

    #[test]
    fn out_of_range_score_is_rejected_without_writing() {
        let (repo, _) = seeded_repo();
        let err = repo
            .add_assessment(new_assessment("S001", "English", 5))
            .expect_err("score 5");
        assert!(matches!(err, StoreError::InvalidData(_)));
        assert_eq!(repo.get_system_stats().expect("stats").total_assessments, 2);
    }

    #[test]
    fn activity_log_keeps_latest_hundred() {
        let (repo, clock) = seeded_repo();
        let mut added = Vec::new();
        for n in 0..101 {
            clock.advance(Duration::seconds(1));
            let a = repo
                .add_activity(NewActivity {
                    kind: "test".into(),
                    user: None,
                    user_id: None,
                    action: format!("step {n}"),
                    details: String::new(),
                })
                .expect("add")
                .expect("dataset present");
            added.push(a);
        }
        let got = repo.get_activities(1000).expect("activities");
        assert_eq!(got.len(), ACTIVITY_LOG_CAP);
        let expected: Vec<_> = added.iter().rev().take(100).cloned().collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn activities_sort_by_timestamp_not_position() {
        let (repo, _) = seeded_repo();
        repo.store()
            .update::<Dataset, _>(DATA_KEY, |data| data.activities.reverse())
            .expect("reorder");
        let got = repo.get_activities(2).expect("activities");
        // ACT001 (10:30) now sits after ACT002 (08:15) in storage.
        assert_eq!(got[0].id, "ACT001");
        assert_eq!(got[1].id, "ACT002");
        assert_eq!(repo.get_activities(0).expect("none").len(), 0);
    }

    #[test]
    fn announcements_respect_audience_and_sort_by_date() {
        let (repo, _) = seeded_repo();
        repo.store()
            .update::<Dataset, _>(DATA_KEY, |data| {
                let mut public = data.announcements[0].clone();
                public.id = "ANN003".into();
                public.audience = None;
                public.date = NaiveDate::from_ymd_opt(2023, 12, 1).unwrap();
                data.announcements.push(public);
            })
            .expect("update");

        let parent = repo.get_announcements(Some(Role::Parent)).expect("parent");
        let ids: Vec<_> = parent.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["ANN002", "ANN003"]);
        assert!(parent.iter().all(|a| a.visible_to(Role::Parent)));

        let all = repo.get_announcements(None).expect("all");
        let ids: Vec<_> = all.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["ANN002", "ANN001", "ANN003"]);
    }

    #[test]
    fn resource_filters_keep_original_order() {
        let (repo, _) = seeded_repo();
        let pdfs = repo
            .get_resources(&ResourceFilter {
                kind: Some("pdf".into()),
                ..Default::default()
            })
            .expect("pdfs");
        let ids: Vec<_> = pdfs.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["RES001", "RES002"]);

        let maths = repo
            .get_resources(&ResourceFilter {
                subject: Some("Mathematics".into()),
                grade_level: Some("Grade 7".into()),
                kind: None,
            })
            .expect("maths");
        assert_eq!(maths.len(), 1);
    }

    #[test]
    fn unknown_resource_download_changes_nothing() {
        let (repo, _) = seeded_repo();
        let before = repo.dataset().expect("data");
        assert!(!repo.increment_resource_downloads("RES999").expect("increment"));
        assert_eq!(repo.dataset().expect("data"), before);

        assert!(repo.increment_resource_downloads("RES001").expect("increment"));
        let res = repo
            .get_resources(&ResourceFilter::default())
            .expect("resources");
        assert_eq!(res[0].downloads, 1246);
    }

    #[test]
    fn recorded_download_logs_actor() {
        let (repo, _) = seeded_repo();
        let actor = SessionUser::from(&repo.get_user("pupil@zames.zm").unwrap().unwrap());
        let res = repo
            .record_resource_download("RES002", Some(&actor))
            .expect("download")
            .expect("found");
        assert_eq!(res.downloads, 893);
        let act = &repo.get_activities(1).expect("activities")[0];
        assert_eq!(act.kind, "resource");
        assert_eq!(act.user_id.as_deref(), Some("S001"));
        assert_eq!(act.details, "Mathematics Grade 7 Lesson Plans");
        assert!(repo
            .record_resource_download("nope", Some(&actor))
            .expect("download")
            .is_none());
    }

    #[test]
    fn students_filter_by_grade_and_school() {
        let (repo, _) = seeded_repo();
        let g7 = repo
            .get_students(&StudentFilter {
                grade: Some("Grade 7".into()),
                school: Some("Lusaka Central School".into()),
            })
            .expect("students");
        assert_eq!(g7.len(), 1);
        assert_eq!(g7[0].id, "S001");
        let elsewhere = repo
            .get_students(&StudentFilter {
                grade: None,
                school: Some("Copperbelt Secondary".into()),
            })
            .expect("students");
        assert!(elsewhere.is_empty());
    }

    #[test]
    fn save_user_overwrites_by_email() {
        let (repo, _) = seeded_repo();
        let mut user = repo.get_user("teacher@zames.zm").unwrap().unwrap();
        user.name = "J. Banda".into();
        assert!(repo.save_user(user).expect("save"));
        assert_eq!(
            repo.get_user("teacher@zames.zm").unwrap().unwrap().name,
            "J. Banda"
        );
        assert!(repo.get_user("nobody@zames.zm").unwrap().is_none());
    }

    #[test]
    fn save_user_without_credentials_keeps_stored_ones() {
        let (repo, _) = seeded_repo();
        let mut user = repo.get_user("parent@zames.zm").unwrap().unwrap();
        user.password = None;
        user.password_hash = None;
        user.phone = Some("+260 977 000000".into());
        assert!(repo.save_user(user).expect("save"));

        let stored = repo.get_user("parent@zames.zm").unwrap().unwrap();
        assert_eq!(stored.password.as_deref(), Some("password123"));
        assert_eq!(stored.phone.as_deref(), Some("+260 977 000000"));

        let mut user = stored;
        user.password = None;
        user.password_hash = Some("$argon2id$replaced".into());
        repo.save_user(user).expect("save");
        let stored = repo.get_user("parent@zames.zm").unwrap().unwrap();
        assert!(stored.password.is_none());
        assert_eq!(stored.password_hash.as_deref(), Some("$argon2id$replaced"));
    }

    #[test]
    fn missing_dataset_reads_empty_and_ignores_writes() {
        let repo = empty_repo();
        assert!(repo
            .get_assessments(&AssessmentFilter::default())
            .unwrap()
            .is_empty());
        assert!(repo.get_announcements(Some(Role::Teacher)).unwrap().is_empty());
        assert!(repo.get_activities(10).unwrap().is_empty());
        assert!(repo.get_schools().unwrap().is_empty());
        assert_eq!(repo.get_system_stats().unwrap().total_students, 0);
        assert!(repo
            .add_assessment(new_assessment("S001", "Maths", 2))
            .unwrap()
            .is_none());
        assert!(repo
            .add_activity(NewActivity {
                kind: "x".into(),
                user: None,
                user_id: None,
                action: "y".into(),
                details: String::new(),
            })
            .unwrap()
            .is_none());
        assert!(!repo.increment_resource_downloads("RES001").unwrap());
        assert!(repo.dataset().unwrap().is_none());
    }

    #[test]
    fn export_reset_import_restores_stats() {
        let (repo, clock) = seeded_repo();
        repo.add_assessment(new_assessment("S001", "English", 4))
            .expect("add");
        let before = repo.get_system_stats().expect("stats");
        let exported = serde_json::to_value(repo.export_data().expect("export")).expect("json");
        assert_eq!(exported["version"], "1.0.0");

        clock.advance(Duration::hours(3));
        repo.reset_data().expect("reset");
        assert_eq!(repo.get_system_stats().expect("stats").total_assessments, 2);

        assert!(repo.import_data(&exported).expect("import"));
        assert_eq!(repo.get_system_stats().expect("stats"), before);

        let next = repo
            .add_assessment(new_assessment("S001", "Art", 1))
            .expect("add")
            .expect("present");
        assert_eq!(next.id, "A004");
    }

    #[test]
    fn import_with_other_version_is_rejected_untouched() {
        let (repo, _) = seeded_repo();
        let mut exported = serde_json::to_value(repo.export_data().expect("export")).expect("json");
        exported["data"]["students"] = json!([]);
        exported["version"] = json!("2.0.0");
        let before = repo.dataset().expect("data");
        assert!(!repo.import_data(&exported).expect("import"));
        assert_eq!(repo.dataset().expect("data"), before);

        let err = repo
            .import_data(&json!({ "version": "1.0.0", "data": { "students": "nope" } }))
            .expect_err("bad shape");
        assert!(matches!(err, StoreError::InvalidData(_)));
        assert_eq!(repo.dataset().expect("data"), before);
    }

    #[test]
    fn import_accepts_missing_export_date_and_foreign_audience() {
        let (repo, _) = seeded_repo();
        let mut exported = serde_json::to_value(repo.export_data().expect("export")).expect("json");
        exported
            .as_object_mut()
            .expect("object")
            .remove("exportDate");
        exported["data"]["announcements"][0]["audience"] = json!(["teacher", "admin"]);

        assert!(repo.import_data(&exported).expect("import"));
        let teacher = repo.get_announcements(Some(Role::Teacher)).expect("list");
        assert!(teacher.iter().any(|a| a.id == "ANN001"));
        let stored = repo.dataset().expect("data").expect("present");
        assert_eq!(
            stored.announcements[0].audience,
            Some(vec!["teacher".to_string(), "admin".to_string()])
        );
    }

    #[test]
    fn two_connections_on_one_workspace_never_lose_an_id() {
        let dir = std::env::temp_dir().join(format!("zames-repo-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).expect("create temp dir");
        let seeded = Repository::open(&dir, DEFAULT_PREFIX, Box::new(crate::clock::SystemClock));
        drop(seeded.expect("seed"));

        let writers: Vec<_> = (0..2)
            .map(|w| {
                let dir = dir.clone();
                std::thread::spawn(move || {
                    let repo =
                        Repository::open(&dir, DEFAULT_PREFIX, Box::new(crate::clock::SystemClock))
                            .expect("open");
                    for i in 0..50 {
                        let score = (i % 4 + 1) as u8;
                        repo.add_assessment(new_assessment(&format!("W{w}"), "Science", score))
                            .expect("add")
                            .expect("dataset present");
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().expect("writer thread");
        }

        let repo = Repository::open(&dir, DEFAULT_PREFIX, Box::new(crate::clock::SystemClock))
            .expect("reopen");
        let all = repo
            .get_assessments(&AssessmentFilter::default())
            .expect("all");
        assert_eq!(all.len(), 102);
        let ids: HashSet<_> = all.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids.len(), 102);
        drop(repo);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn reset_clears_session_and_reseeds() {
        let (repo, _) = seeded_repo();
        let user = repo.get_user("teacher@zames.zm").unwrap().unwrap();
        repo.sessions().create(SessionUser::from(&user)).expect("session");
        repo.add_assessment(new_assessment("S001", "English", 4))
            .expect("add");

        repo.reset_data().expect("reset");
        assert!(repo.sessions().get().expect("session").is_none());
        assert_eq!(repo.get_system_stats().expect("stats").total_assessments, 2);
        assert_eq!(
            repo.store().keys().expect("keys"),
            vec!["data".to_string(), "initialized".to_string()]
        );
    }

    #[test]
    fn trend_compares_newer_half_with_older_half() {
        let (repo, _) = seeded_repo();
        let seeded = repo
            .get_assessments(&AssessmentFilter::default())
            .expect("all");
        // A001 scored 4 on 2024-01-15, A002 scored 3 on 2024-01-20.
        assert_eq!(performance_trend(&seeded), Some(Trend::Declining));
        assert_eq!(performance_trend(&seeded[..1]), None);
        assert_eq!(performance_trend(&[]), None);

        let mut later = new_assessment("S002", "Science", 4);
        later.date = NaiveDate::from_ymd_opt(2024, 1, 25);
        repo.add_assessment(later).expect("add");
        let mut latest = new_assessment("S002", "Science", 4);
        latest.date = NaiveDate::from_ymd_opt(2024, 1, 30);
        repo.add_assessment(latest).expect("add");
        let all = repo
            .get_assessments(&AssessmentFilter::default())
            .expect("all");
        // Older half 4,3 against newer half 4,4.
        assert_eq!(performance_trend(&all), Some(Trend::Improving));

        let flat: Vec<_> = all.iter().filter(|a| a.score == 4).cloned().collect();
        assert_eq!(performance_trend(&flat).map(Trend::as_str), Some("Stable"));
    }

    #[test]
    fn helpers_compute_mean_and_distinct_students() {
        let (repo, _) = seeded_repo();
        let all = repo
            .get_assessments(&AssessmentFilter::default())
            .expect("all");
        assert_eq!(mean_score(&all), Some(3.5));
        assert_eq!(distinct_students(&all), vec!["S001"]);
        assert_eq!(mean_score(&[]), None);
    }
}
