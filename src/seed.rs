//! First-run demo dataset.

use crate::model::{
    Activity, Announcement, Assessment, ChildLink, CompetencyLevel, Dataset, Priority, Resource,
    Role, School, Sequences, Student, SystemInfo, User, DATA_VERSION,
};
use crate::store::{KvStore, StoreResult};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::collections::BTreeMap;
use tracing::info;

pub const DATA_KEY: &str = "data";
pub const INITIALIZED_KEY: &str = "initialized";

const DEMO_PASSWORD: &str = "password123";
const CENTRAL_SCHOOL: &str = "Lusaka Central School";

/// Seeds the namespace unless the `initialized` flag is already present.
/// Returns true when a dataset was written.
pub fn initialize_if_absent(store: &KvStore, now: DateTime<Utc>) -> StoreResult<bool> {
    store.transaction(|tx| {
        if tx.get::<bool>(INITIALIZED_KEY)?.is_some() {
            return Ok(false);
        }
        write_seed(tx, now)?;
        Ok(true)
    })
}

/// Writes the demo dataset and the flag. Callers provide the transaction.
pub fn write_seed(store: &KvStore, now: DateTime<Utc>) -> StoreResult<()> {
    let data = default_dataset(now);
    store.set(DATA_KEY, &data)?;
    store.set(INITIALIZED_KEY, &true)?;
    info!(
        users = data.users.len(),
        assessments = data.assessments.len(),
        "seeded demo dataset"
    );
    Ok(())
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
}

fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0)
        .single()
        .unwrap_or_default()
}

fn staff(id: &str, email: &str, role: Role, name: &str, phone: &str, now: DateTime<Utc>) -> User {
    User {
        id: id.to_string(),
        email: email.to_string(),
        password: Some(DEMO_PASSWORD.to_string()),
        password_hash: None,
        role,
        name: name.to_string(),
        school: Some(CENTRAL_SCHOOL.to_string()),
        school_id: Some("LC001".to_string()),
        province: Some("Lusaka".to_string()),
        district: Some("Lusaka District".to_string()),
        subjects: Vec::new(),
        grade: None,
        phone: Some(phone.to_string()),
        children: Vec::new(),
        parent_email: None,
        last_login: Some(now),
        avatar: Some(initials(name)),
    }
}

fn audience(roles: &[Role]) -> Vec<String> {
    roles.iter().map(|r| r.as_str().to_string()).collect()
}

fn initials(name: &str) -> String {
    name.split_whitespace()
        .filter_map(|w| w.chars().next())
        .collect::<String>()
        .to_uppercase()
}

pub fn default_dataset(now: DateTime<Utc>) -> Dataset {
    let mut users = BTreeMap::new();

    let mut teacher = staff(
        "T001",
        "teacher@zames.zm",
        Role::Teacher,
        "John Banda",
        "+260 97 123 4567",
        now,
    );
    teacher.subjects = vec!["Mathematics".to_string(), "Science".to_string()];
    teacher.grade = Some("Grade 7".to_string());

    let headteacher = staff(
        "HT001",
        "headteacher@zames.zm",
        Role::Headteacher,
        "Sarah Mwila",
        "+260 96 987 6543",
        now,
    );

    let mut hod = staff(
        "HOD001",
        "hod@zames.zm",
        Role::Hod,
        "Grace Tembo",
        "+260 97 222 3344",
        now,
    );
    hod.subjects = vec!["Mathematics".to_string()];

    let parent = User {
        id: "P001".to_string(),
        email: "parent@zames.zm".to_string(),
        password: Some(DEMO_PASSWORD.to_string()),
        password_hash: None,
        role: Role::Parent,
        name: "David Phiri".to_string(),
        school: None,
        school_id: None,
        province: None,
        district: None,
        subjects: Vec::new(),
        grade: None,
        phone: Some("+260 95 555 1234".to_string()),
        children: vec![
            ChildLink {
                name: "Mary Phiri".to_string(),
                grade: "Grade 7".to_string(),
                student_id: "S001".to_string(),
            },
            ChildLink {
                name: "Joseph Phiri".to_string(),
                grade: "Grade 5".to_string(),
                student_id: "S002".to_string(),
            },
        ],
        parent_email: None,
        last_login: Some(now),
        avatar: Some("DP".to_string()),
    };

    let pupil = User {
        id: "S001".to_string(),
        email: "pupil@zames.zm".to_string(),
        password: Some(DEMO_PASSWORD.to_string()),
        password_hash: None,
        role: Role::Pupil,
        name: "Mary Phiri".to_string(),
        school: Some(CENTRAL_SCHOOL.to_string()),
        school_id: Some("LC001".to_string()),
        province: None,
        district: None,
        subjects: Vec::new(),
        grade: Some("Grade 7".to_string()),
        phone: None,
        children: Vec::new(),
        parent_email: Some("parent@zames.zm".to_string()),
        last_login: Some(now),
        avatar: Some("MP".to_string()),
    };

    for user in [teacher, headteacher, hod, parent, pupil] {
        users.insert(user.email.clone(), user);
    }

    let schools = vec![
        School {
            id: "LC001".to_string(),
            name: CENTRAL_SCHOOL.to_string(),
            emis: Some("LC001".to_string()),
            kind: "Primary".to_string(),
            level: "1-7".to_string(),
            province: "Lusaka".to_string(),
            district: "Lusaka District".to_string(),
            address: Some("Cairo Road, Lusaka".to_string()),
            headteacher: Some("Sarah Mwila".to_string()),
            students: 850,
            teachers: 32,
            established: Some(1964),
        },
        School {
            id: "CB002".to_string(),
            name: "Copperbelt Secondary".to_string(),
            emis: Some("CB002".to_string()),
            kind: "Secondary".to_string(),
            level: "8-12".to_string(),
            province: "Copperbelt".to_string(),
            district: "Ndola District".to_string(),
            address: Some("Kwacha Road, Ndola".to_string()),
            headteacher: Some("Peter Musonda".to_string()),
            students: 1200,
            teachers: 48,
            established: Some(1972),
        },
    ];

    let students = vec![
        Student {
            id: "S001".to_string(),
            name: "Mary Phiri".to_string(),
            upn: Some("ZM20230001".to_string()),
            grade: "Grade 7".to_string(),
            class: "7A".to_string(),
            school: CENTRAL_SCHOOL.to_string(),
            dob: Some(date(2010, 5, 15)),
            gender: Some("Female".to_string()),
            parent1: Some("David Phiri".to_string()),
            parent1_phone: Some("+260 95 555 1234".to_string()),
            parent1_email: Some("parent@zames.zm".to_string()),
            address: Some("Plot 123, Lusaka".to_string()),
        },
        Student {
            id: "S002".to_string(),
            name: "Joseph Phiri".to_string(),
            upn: Some("ZM20230002".to_string()),
            grade: "Grade 5".to_string(),
            class: "5B".to_string(),
            school: CENTRAL_SCHOOL.to_string(),
            dob: Some(date(2012, 9, 2)),
            gender: Some("Male".to_string()),
            parent1: Some("David Phiri".to_string()),
            parent1_phone: Some("+260 95 555 1234".to_string()),
            parent1_email: Some("parent@zames.zm".to_string()),
            address: Some("Plot 123, Lusaka".to_string()),
        },
    ];

    let assessments = vec![
        Assessment {
            id: "A001".to_string(),
            student_id: "S001".to_string(),
            student_name: Some("Mary Phiri".to_string()),
            grade: Some("Grade 7".to_string()),
            subject: "Mathematics".to_string(),
            competency: "Problem Solving".to_string(),
            score: 4,
            level: CompetencyLevel::Advanced,
            date: date(2024, 1, 15),
            term: "Term 1".to_string(),
            teacher: Some("John Banda".to_string()),
            teacher_id: Some("T001".to_string()),
            comments: "Excellent problem-solving skills demonstrated in class activities."
                .to_string(),
            evidence: Some("Classwork and group projects".to_string()),
            created_at: Some(at(2024, 1, 15, 10, 30)),
        },
        Assessment {
            id: "A002".to_string(),
            student_id: "S001".to_string(),
            student_name: Some("Mary Phiri".to_string()),
            grade: Some("Grade 7".to_string()),
            subject: "Science".to_string(),
            competency: "Scientific Inquiry".to_string(),
            score: 3,
            level: CompetencyLevel::Proficient,
            date: date(2024, 1, 20),
            term: "Term 1".to_string(),
            teacher: Some("John Banda".to_string()),
            teacher_id: Some("T001".to_string()),
            comments: "Good understanding of scientific methods.".to_string(),
            evidence: Some("Lab reports".to_string()),
            created_at: Some(at(2024, 1, 20, 14, 15)),
        },
    ];

    let announcements = vec![
        Announcement {
            id: "ANN001".to_string(),
            title: "New CBC Implementation Guidelines".to_string(),
            content: "The Ministry of Education has released updated guidelines for Competence \
                      Based Curriculum implementation. All teachers are required to review the \
                      new framework."
                .to_string(),
            category: Some("Policy Update".to_string()),
            priority: Priority::High,
            author: Some("Ministry of Education".to_string()),
            date: date(2024, 1, 10),
            expires: Some(date(2024, 12, 31)),
            audience: Some(audience(&[Role::Teacher, Role::Headteacher])),
        },
        Announcement {
            id: "ANN002".to_string(),
            title: "Parent-Teacher Conference Schedule".to_string(),
            content: "The term 1 parent-teacher conferences will be held from February 5-9, \
                      2024. Please schedule your appointments through the ZAMES portal."
                .to_string(),
            category: Some("School Event".to_string()),
            priority: Priority::Medium,
            author: Some("Sarah Mwila".to_string()),
            date: date(2024, 1, 15),
            expires: Some(date(2024, 2, 10)),
            audience: Some(audience(&[Role::Parent, Role::Teacher])),
        },
    ];

    let resources = vec![
        Resource {
            id: "RES001".to_string(),
            title: "CBC Implementation Guide 2024".to_string(),
            description: Some(
                "Complete guide for implementing Competence Based Curriculum in Zambian schools"
                    .to_string(),
            ),
            kind: "pdf".to_string(),
            subject: "General".to_string(),
            grade_level: "All".to_string(),
            language: Some("English".to_string()),
            size: "2.4 MB".to_string(),
            downloads: 1245,
            url: Some("https://cdn.example.com/cbc-guide-2024.pdf".to_string()),
            tags: vec![
                "CBC".to_string(),
                "guidelines".to_string(),
                "implementation".to_string(),
            ],
            uploaded_by: Some("Ministry of Education".to_string()),
            uploaded_date: Some(date(2024, 1, 1)),
        },
        Resource {
            id: "RES002".to_string(),
            title: "Mathematics Grade 7 Lesson Plans".to_string(),
            description: Some(
                "Complete set of lesson plans for Grade 7 Mathematics aligned with CBC"
                    .to_string(),
            ),
            kind: "pdf".to_string(),
            subject: "Mathematics".to_string(),
            grade_level: "Grade 7".to_string(),
            language: Some("English".to_string()),
            size: "3.2 MB".to_string(),
            downloads: 892,
            url: Some("https://cdn.example.com/math-grade7-lessons.pdf".to_string()),
            tags: vec![
                "mathematics".to_string(),
                "lesson plans".to_string(),
                "grade 7".to_string(),
            ],
            uploaded_by: Some("John Banda".to_string()),
            uploaded_date: Some(date(2024, 1, 5)),
        },
    ];

    let activities = vec![
        Activity {
            id: "ACT001".to_string(),
            kind: "assessment".to_string(),
            user: Some("John Banda".to_string()),
            user_id: Some("T001".to_string()),
            action: "Recorded assessment".to_string(),
            details: "Mathematics assessment for Mary Phiri".to_string(),
            timestamp: at(2024, 1, 15, 10, 30),
        },
        Activity {
            id: "ACT002".to_string(),
            kind: "login".to_string(),
            user: Some("Sarah Mwila".to_string()),
            user_id: Some("HT001".to_string()),
            action: "Logged in".to_string(),
            details: "Headteacher dashboard access".to_string(),
            timestamp: at(2024, 1, 15, 8, 15),
        },
    ];

    let sequences = Sequences {
        assessment: assessments.len() as u64,
        activity: activities.len() as u64,
    };

    Dataset {
        users,
        schools,
        students,
        assessments,
        announcements,
        resources,
        activities,
        system: Some(SystemInfo {
            version: DATA_VERSION.to_string(),
            last_sync: now,
            offline_mode: true,
            school_year: "2024".to_string(),
            current_term: "Term 1".to_string(),
        }),
        sequences,
    }
}
