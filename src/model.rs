//! Entities persisted inside the dataset blob.
//!
//! Field names serialize in camelCase so the blob stays compatible with
//! exports produced by the browser dashboard.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DATA_VERSION: &str = "1.0.0";
pub const ACTIVITY_LOG_CAP: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "teacher")]
    Teacher,
    #[serde(rename = "headteacher")]
    Headteacher,
    #[serde(rename = "pupil")]
    Pupil,
    #[serde(rename = "parent")]
    Parent,
    #[serde(rename = "HOD")]
    Hod,
}

impl Role {
    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "teacher" => Some(Role::Teacher),
            "headteacher" => Some(Role::Headteacher),
            "pupil" => Some(Role::Pupil),
            "parent" => Some(Role::Parent),
            "HOD" | "hod" => Some(Role::Hod),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Teacher => "teacher",
            Role::Headteacher => "headteacher",
            Role::Pupil => "pupil",
            Role::Parent => "parent",
            Role::Hod => "HOD",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Role::Teacher => "Teacher",
            Role::Headteacher => "Headteacher",
            Role::Pupil => "Pupil",
            Role::Parent => "Parent",
            Role::Hod => "HOD",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildLink {
    pub name: String,
    pub grade: String,
    pub student_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    /// Plaintext demo credential carried by seed users only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    pub role: Role,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub province: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subjects: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ChildLink>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct School {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emis: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub province: String,
    #[serde(default)]
    pub district: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headteacher: Option<String>,
    #[serde(default)]
    pub students: u32,
    #[serde(default)]
    pub teachers: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub established: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upn: Option<String>,
    pub grade: String,
    #[serde(default)]
    pub class: String,
    #[serde(default)]
    pub school: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dob: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent1_phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent1_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompetencyLevel {
    Beginning,
    Developing,
    Proficient,
    Advanced,
}

impl CompetencyLevel {
    pub const MIN_SCORE: u8 = 1;
    pub const MAX_SCORE: u8 = 4;

    pub fn from_score(score: u8) -> Option<CompetencyLevel> {
        match score {
            1 => Some(CompetencyLevel::Beginning),
            2 => Some(CompetencyLevel::Developing),
            3 => Some(CompetencyLevel::Proficient),
            4 => Some(CompetencyLevel::Advanced),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CompetencyLevel::Beginning => "Beginning",
            CompetencyLevel::Developing => "Developing",
            CompetencyLevel::Proficient => "Proficient",
            CompetencyLevel::Advanced => "Advanced",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
    pub id: String,
    pub student_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
    pub subject: String,
    #[serde(default)]
    pub competency: String,
    pub score: u8,
    pub level: CompetencyLevel,
    pub date: NaiveDate,
    #[serde(default)]
    pub term: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teacher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teacher_id: Option<String>,
    #[serde(default)]
    pub comments: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Assessment as submitted by a client, before id/level/createdAt are assigned.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAssessment {
    pub student_id: String,
    #[serde(default)]
    pub student_name: Option<String>,
    #[serde(default)]
    pub grade: Option<String>,
    pub subject: String,
    #[serde(default)]
    pub competency: String,
    pub score: u8,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub term: Option<String>,
    #[serde(default)]
    pub teacher: Option<String>,
    #[serde(default)]
    pub teacher_id: Option<String>,
    #[serde(default)]
    pub comments: String,
    #[serde(default)]
    pub evidence: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<NaiveDate>,
    /// Role names allowed to see this announcement. Absent or empty means
    /// everyone. Names outside [`Role`] are kept as-is and match no one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<Vec<String>>,
}

impl Announcement {
    pub fn visible_to(&self, role: Role) -> bool {
        match &self.audience {
            None => true,
            Some(names) => {
                names.is_empty() || names.iter().any(|n| Role::parse(n) == Some(role))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub subject: String,
    pub grade_level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default)]
    pub size: String,
    #[serde(default)]
    pub downloads: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub action: String,
    #[serde(default)]
    pub details: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewActivity {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    pub action: String,
    #[serde(default)]
    pub details: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    pub version: String,
    pub last_sync: DateTime<Utc>,
    #[serde(default)]
    pub offline_mode: bool,
    #[serde(default)]
    pub school_year: String,
    #[serde(default)]
    pub current_term: String,
}

/// Monotonic id counters kept next to the collections they number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sequences {
    #[serde(default)]
    pub assessment: u64,
    #[serde(default)]
    pub activity: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub users: BTreeMap<String, User>,
    #[serde(default)]
    pub schools: Vec<School>,
    #[serde(default)]
    pub students: Vec<Student>,
    #[serde(default)]
    pub assessments: Vec<Assessment>,
    #[serde(default)]
    pub announcements: Vec<Announcement>,
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default)]
    pub activities: Vec<Activity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<SystemInfo>,
    #[serde(default)]
    pub sequences: Sequences,
}

impl Dataset {
    pub fn next_assessment_id(&mut self) -> String {
        let n = next_sequence(&mut self.sequences.assessment, self.assessments.len());
        format!("A{:03}", n)
    }

    pub fn next_activity_id(&mut self) -> String {
        let n = next_sequence(&mut self.sequences.activity, self.activities.len());
        format!("ACT{:03}", n)
    }

    /// Prepends an activity and evicts from the tail past the cap.
    pub fn push_activity(&mut self, activity: NewActivity, now: DateTime<Utc>) -> Activity {
        let stored = Activity {
            id: self.next_activity_id(),
            kind: activity.kind,
            user: activity.user,
            user_id: activity.user_id,
            action: activity.action,
            details: activity.details,
            timestamp: now,
        };
        self.activities.insert(0, stored.clone());
        self.activities.truncate(ACTIVITY_LOG_CAP);
        stored
    }
}

// Older blobs have no counters; never hand out a number at or below the collection size.
fn next_sequence(counter: &mut u64, len: usize) -> u64 {
    let n = (*counter).max(len as u64) + 1;
    *counter = n;
    n
}

/// Snapshot of the signed-in user carried by a session record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub user_id: String,
    pub email: String,
    pub role: Role,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school: Option<String>,
}

impl From<&User> for SessionUser {
    fn from(user: &User) -> Self {
        SessionUser {
            user_id: user.id.clone(),
            email: user.email.clone(),
            role: user.role,
            name: user.name.clone(),
            school: user.school.clone(),
        }
    }
}
