use serde::Serialize;
use serde_json::Value;

use super::unlock::{is_locked, Section};
use crate::models::recommendation::{
    Identified, Recommendation, RecommendationItem, Subject, SubjectId, SubjectKind, UnlockLevel,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LockBanner {
    pub title: &'static str,
    pub reason: &'static str,
}

/// A gated part of a card. Locked sections carry no content, only a banner.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionView {
    pub section: Section,
    pub locked: bool,
    pub content: Option<Value>,
    pub banner: Option<LockBanner>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardView {
    pub id: SubjectId,
    pub kind: SubjectKind,
    pub score: u32,
    pub fit_label: &'static str,
    pub reasons: Vec<String>,
    pub unlock_level: UnlockLevel,
    pub preview: Value,
    pub sections: Vec<SectionView>,
}

pub fn render_card(recommendation: &Recommendation) -> CardView {
    match recommendation {
        Recommendation::Job(item) => render_item(item),
        Recommendation::Candidate(item) => render_item(item),
    }
}

/// Consults the unlock gate on every call.
pub fn render_item<S: Subject>(item: &RecommendationItem<S>) -> CardView {
    let sections = item
        .subject
        .sections()
        .into_iter()
        .map(|(section, content)| {
            let locked = S::GATED && is_locked(item.unlock_level, section);
            if locked {
                SectionView {
                    section,
                    locked,
                    content: None,
                    banner: Some(LockBanner {
                        title: section.locked_title(),
                        reason: section.unlock_hint(),
                    }),
                }
            } else {
                SectionView {
                    section,
                    locked,
                    content: Some(content),
                    banner: None,
                }
            }
        })
        .collect();

    CardView {
        id: item.id(),
        kind: S::KIND,
        score: item.display_score(),
        fit_label: item.fit_label(),
        reasons: item.reasons(),
        unlock_level: item.unlock_level,
        preview: item.subject.preview(),
        sections,
    }
}
