//! Plain-text report documents.
//!
//! The requested format only picks the file extension; the content is always
//! plain text.

use crate::model::{Assessment, SessionUser};
use crate::repo::{
    mean_score, performance_trend, AssessmentFilter, Repository, SystemStats, Trend,
};
use anyhow::{anyhow, Context};
use chrono::NaiveDate;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

const RULE: &str = "=================================";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportType {
    Performance,
    Competency,
    Attendance,
    Summary,
    Custom,
}

impl ReportType {
    pub fn parse(s: &str) -> Option<ReportType> {
        match s {
            "performance" => Some(ReportType::Performance),
            "competency" => Some(ReportType::Competency),
            "attendance" => Some(ReportType::Attendance),
            "summary" => Some(ReportType::Summary),
            "custom" => Some(ReportType::Custom),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReportType::Performance => "performance",
            ReportType::Competency => "competency",
            ReportType::Attendance => "attendance",
            ReportType::Summary => "summary",
            ReportType::Custom => "custom",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Pdf,
    Excel,
    Word,
    Html,
}

impl ReportFormat {
    pub fn parse(s: &str) -> Option<ReportFormat> {
        match s {
            "pdf" => Some(ReportFormat::Pdf),
            "excel" => Some(ReportFormat::Excel),
            "word" => Some(ReportFormat::Word),
            "html" => Some(ReportFormat::Html),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ReportFormat::Pdf => "pdf",
            ReportFormat::Excel => "excel",
            ReportFormat::Word => "word",
            ReportFormat::Html => "html",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub report_type: ReportType,
    pub period: String,
    pub format: ReportFormat,
}

impl ReportRequest {
    pub fn parse(report_type: &str, period: &str, format: &str) -> anyhow::Result<Self> {
        let report_type =
            ReportType::parse(report_type).ok_or_else(|| anyhow!("unknown report type: {report_type}"))?;
        let format = ReportFormat::parse(format).ok_or_else(|| anyhow!("unknown format: {format}"))?;
        let period = period.trim();
        // The period lands in a file name.
        if period.is_empty()
            || !period
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(anyhow!("invalid period: {period:?}"));
        }
        Ok(Self {
            report_type,
            period: period.to_string(),
            format,
        })
    }

    pub fn file_name(&self) -> String {
        format!(
            "zames-report-{}-{}.{}",
            self.report_type.as_str(),
            self.period,
            self.format.extension()
        )
    }
}

/// Body data, already queried.
pub enum ReportBody<'a> {
    Performance(&'a [Assessment]),
    Competency {
        stats: &'a SystemStats,
        mean: Option<f64>,
        trend: Option<Trend>,
    },
    Placeholder,
}

pub fn render(
    req: &ReportRequest,
    user: &SessionUser,
    generated: NaiveDate,
    body: &ReportBody<'_>,
) -> String {
    let mut out = String::new();
    out.push_str("ZAMES EDUCATION SYSTEM REPORT\n");
    out.push_str(RULE);
    out.push_str("\n\n");
    out.push_str(&format!(
        "Report Type: {}\n",
        req.report_type.as_str().to_uppercase()
    ));
    out.push_str(&format!("Period: {}\n", req.period));
    out.push_str(&format!("Generated: {}\n", generated.format("%Y-%m-%d")));
    out.push_str(&format!(
        "Generated By: {} ({})\n",
        user.name,
        user.role.as_str()
    ));
    out.push_str(&format!(
        "School: {}\n\n",
        user.school.as_deref().unwrap_or("N/A")
    ));
    out.push_str(RULE);
    out.push_str("\n\n");

    match body {
        ReportBody::Performance(assessments) => {
            out.push_str("STUDENT PERFORMANCE ANALYSIS\n");
            out.push_str("---------------------------\n\n");
            for a in assessments.iter() {
                out.push_str(&format!(
                    "Student: {}\n",
                    a.student_name.as_deref().unwrap_or(&a.student_id)
                ));
                out.push_str(&format!("Grade: {}\n", a.grade.as_deref().unwrap_or("N/A")));
                out.push_str(&format!("Subject: {}\n", a.subject));
                out.push_str(&format!("Competency: {}\n", a.competency));
                out.push_str(&format!("Score: {}/4 ({})\n", a.score, a.level.as_str()));
                out.push_str(&format!("Date: {}\n", a.date));
                out.push_str(&format!("Comments: {}\n\n", a.comments));
            }
        }
        ReportBody::Competency { stats, mean, trend } => {
            out.push_str("COMPETENCY ANALYSIS REPORT\n");
            out.push_str("-------------------------\n\n");
            out.push_str(&format!("Total Assessments: {}\n", stats.total_assessments));
            out.push_str(&format!("Total Students: {}\n", stats.total_students));
            match mean {
                Some(m) => out.push_str(&format!("Average Score: {:.1}/4\n", m)),
                None => out.push_str("Average Score: N/A\n"),
            }
            out.push_str(&format!(
                "Performance Trend: {}\n\n",
                trend.map_or("N/A", Trend::as_str)
            ));
        }
        ReportBody::Placeholder => {
            out.push_str("Report content would be generated here based on selected parameters.\n");
            out.push_str("This is a simulated report for demonstration purposes.\n");
        }
    }

    out.push('\n');
    out.push_str(RULE);
    out.push('\n');
    out.push_str("END OF REPORT\n");
    out.push_str("ZAMES - Zambia Advanced Management Education System\n");
    out
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedReport {
    pub file_name: String,
    pub path: PathBuf,
    pub content: String,
}

/// Queries what the report needs, renders it and writes it into `out_dir`.
pub fn generate(
    repo: &Repository,
    req: &ReportRequest,
    user: &SessionUser,
    out_dir: &Path,
) -> anyhow::Result<GeneratedReport> {
    let generated = repo.now().date_naive();
    let content = match req.report_type {
        ReportType::Performance => {
            let mine = repo.get_assessments(&AssessmentFilter {
                teacher_id: Some(user.user_id.clone()),
                ..Default::default()
            })?;
            render(req, user, generated, &ReportBody::Performance(&mine))
        }
        ReportType::Competency => {
            let stats = repo.get_system_stats()?;
            let all = repo.get_assessments(&AssessmentFilter::default())?;
            let body = ReportBody::Competency {
                stats: &stats,
                mean: mean_score(&all),
                trend: performance_trend(&all),
            };
            render(req, user, generated, &body)
        }
        _ => render(req, user, generated, &ReportBody::Placeholder),
    };

    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create directory {}", out_dir.display()))?;
    let file_name = req.file_name();
    let path = out_dir.join(&file_name);
    std::fs::write(&path, &content)
        .with_context(|| format!("failed to write report {}", path.display()))?;
    info!(path = %path.display(), "report written");

    Ok(GeneratedReport {
        file_name,
        path,
        content,
    })
}
