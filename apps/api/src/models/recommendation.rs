use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::swipe::unlock::Section;

/// Identifier of the subject entity (job id or candidate id).
pub type SubjectId = i64;

/// Shown instead of an empty explanation panel.
pub const FALLBACK_MATCH_REASON: &str = "Profile matches requirements";

/// Disclosure tier of a recommendation. Computed server-side, only rendered here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnlockLevel {
    #[default]
    Preview,
    Partial,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectKind {
    Job,
    Candidate,
}

/// Anything the card stack can hold: it only needs a stable id.
pub trait Identified {
    fn id(&self) -> SubjectId;
}

/// A recommended entity as rendered on a card.
///
/// `preview` is always visible; `sections` are the gated parts. Subjects that
/// are not `GATED` render every section regardless of unlock level.
pub trait Subject {
    const KIND: SubjectKind;
    const GATED: bool;

    fn subject_id(&self) -> SubjectId;
    fn preview(&self) -> Value;
    fn sections(&self) -> Vec<(Section, Value)>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    pub name: String,
    #[serde(default)]
    pub level: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateCard {
    pub id: SubjectId,
    pub name: String,
    #[serde(default, alias = "primary_role")]
    pub headline: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default, alias = "experience_years")]
    pub years_experience: Option<u32>,
    #[serde(default)]
    pub availability: Option<String>,
    #[serde(default)]
    pub work_type: Option<String>,
    #[serde(default)]
    pub rate_min: Option<f64>,
    #[serde(default)]
    pub rate_max: Option<f64>,
    #[serde(default)]
    pub skills: Vec<Skill>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub certifications: Vec<String>,
    #[serde(default)]
    pub resume_url: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl Subject for CandidateCard {
    const KIND: SubjectKind = SubjectKind::Candidate;
    const GATED: bool = true;

    fn subject_id(&self) -> SubjectId {
        self.id
    }

    fn preview(&self) -> Value {
        json!({
            "name": self.name,
            "headline": self.headline,
            "location": self.location,
            "years_experience": self.years_experience,
            "availability": self.availability,
            "work_type": self.work_type,
            "rate_min": self.rate_min,
            "rate_max": self.rate_max,
            "skills": self.skills,
            "certifications": self.certifications,
        })
    }

    fn sections(&self) -> Vec<(Section, Value)> {
        vec![
            (
                Section::FullProfile,
                json!({ "summary": self.summary }),
            ),
            (Section::Resume, json!({ "resume_url": self.resume_url })),
            (
                Section::Contact,
                json!({ "email": self.email, "phone": self.phone }),
            ),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobCard {
    pub id: SubjectId,
    pub title: String,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub employment_type: Option<String>,
    #[serde(default, alias = "min_rate")]
    pub rate_min: Option<f64>,
    #[serde(default, alias = "max_rate")]
    pub rate_max: Option<f64>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub requirements: Option<String>,
    #[serde(default)]
    pub benefits: Option<String>,
}

impl Subject for JobCard {
    const KIND: SubjectKind = SubjectKind::Job;
    const GATED: bool = false;

    fn subject_id(&self) -> SubjectId {
        self.id
    }

    fn preview(&self) -> Value {
        json!({
            "title": self.title,
            "company_name": self.company_name,
            "location": self.location,
            "employment_type": self.employment_type,
            "rate_min": self.rate_min,
            "rate_max": self.rate_max,
            "start_date": self.start_date,
        })
    }

    fn sections(&self) -> Vec<(Section, Value)> {
        vec![(
            Section::FullProfile,
            json!({
                "description": self.description,
                "requirements": self.requirements,
                "benefits": self.benefits,
            }),
        )]
    }
}

/// One scored recommendation. Immutable for the lifetime of a stack traversal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationItem<S> {
    pub subject: S,
    pub match_score: f64,
    #[serde(default)]
    pub match_reasons: Vec<String>,
    #[serde(default)]
    pub unlock_level: UnlockLevel,
}

impl<S: Subject> RecommendationItem<S> {
    /// Score as displayed: clamped to 0..=100 and rounded, never recomputed.
    pub fn display_score(&self) -> u32 {
        self.match_score.clamp(0.0, 100.0).round() as u32
    }

    pub fn fit_label(&self) -> &'static str {
        match self.display_score() {
            s if s >= 80 => "STRONG MATCH",
            s if s >= 60 => "GOOD FIT",
            _ => "POTENTIAL FIT",
        }
    }

    /// Match reasons, with a single fallback when the backend sent none.
    pub fn reasons(&self) -> Vec<String> {
        let reasons: Vec<String> = self
            .match_reasons
            .iter()
            .map(|r| r.trim())
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .collect();
        if reasons.is_empty() {
            vec![FALLBACK_MATCH_REASON.to_string()]
        } else {
            reasons
        }
    }
}

impl<S: Subject> Identified for RecommendationItem<S> {
    fn id(&self) -> SubjectId {
        self.subject.subject_id()
    }
}

/// The two shapes a stack can hold: jobs for a candidate, candidates for a recruiter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Recommendation {
    Job(RecommendationItem<JobCard>),
    Candidate(RecommendationItem<CandidateCard>),
}

impl Recommendation {
    pub fn kind(&self) -> SubjectKind {
        match self {
            Recommendation::Job(_) => SubjectKind::Job,
            Recommendation::Candidate(_) => SubjectKind::Candidate,
        }
    }
}

impl Identified for Recommendation {
    fn id(&self) -> SubjectId {
        match self {
            Recommendation::Job(item) => item.id(),
            Recommendation::Candidate(item) => item.id(),
        }
    }
}

#[cfg(test)]
pub mod fixtures {
    use super::*;

    pub fn job(id: SubjectId, score: f64) -> Recommendation {
        Recommendation::Job(job_item(id, score))
    }

    pub fn job_item(id: SubjectId, score: f64) -> RecommendationItem<JobCard> {
        RecommendationItem {
            subject: JobCard {
                id,
                title: format!("Job {id}"),
                company_name: Some("Acme".to_string()),
                location: Some("Remote".to_string()),
                employment_type: None,
                rate_min: None,
                rate_max: None,
                start_date: None,
                description: Some("Build things".to_string()),
                requirements: None,
                benefits: None,
            },
            match_score: score,
            match_reasons: vec!["Strong role alignment".to_string()],
            unlock_level: UnlockLevel::Preview,
        }
    }

    pub fn candidate_card(id: SubjectId) -> CandidateCard {
        CandidateCard {
            id,
            name: format!("Candidate {id}"),
            headline: Some("Backend Engineer".to_string()),
            location: Some("Berlin".to_string()),
            years_experience: Some(6),
            availability: Some("immediate".to_string()),
            work_type: Some("remote".to_string()),
            rate_min: Some(80.0),
            rate_max: Some(110.0),
            skills: vec![Skill {
                name: "Rust".to_string(),
                level: Some("expert".to_string()),
            }],
            summary: Some("Systems programmer".to_string()),
            certifications: vec!["AWS Certified Developer".to_string()],
            resume_url: Some("https://files.example/resume.pdf".to_string()),
            email: Some(format!("candidate{id}@example.com")),
            phone: None,
        }
    }

    pub fn candidate(id: SubjectId, level: UnlockLevel) -> Recommendation {
        let mut item = candidate_item(id);
        item.unlock_level = level;
        Recommendation::Candidate(item)
    }

    pub fn candidate_item(id: SubjectId) -> RecommendationItem<CandidateCard> {
        RecommendationItem {
            subject: candidate_card(id),
            match_score: 72.4,
            match_reasons: vec![],
            unlock_level: UnlockLevel::Preview,
        }
    }
}
