//! Unlock gate: which parts of a profile are disclosed at a given unlock level.
//!
//! Pure policy, consulted on every render. Nothing here is cached, so a level
//! upgrade shows up on the next render with no invalidation step.

use serde::{Deserialize, Serialize};

use crate::models::recommendation::UnlockLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Section {
    Resume,
    Contact,
    FullProfile,
}

impl Section {
    pub fn locked_title(self) -> &'static str {
        match self {
            Section::Resume => "Resume Locked",
            Section::Contact => "Contact Info Locked",
            Section::FullProfile => "Profile Locked",
        }
    }

    pub fn unlock_hint(self) -> &'static str {
        match self {
            Section::Resume => "Resume unlocks after you express interest or mutual like",
            Section::Contact => "Contact info unlocks after you apply or mutual match",
            Section::FullProfile => "Full profile unlocks after mutual interest or apply",
        }
    }
}

/// First matching rule wins.
pub fn is_locked(level: UnlockLevel, section: Section) -> bool {
    if level == UnlockLevel::Full {
        return false;
    }
    // Resumes unlock before contact detail.
    if level == UnlockLevel::Partial && section == Section::Resume {
        return false;
    }
    if level == UnlockLevel::Preview {
        return true;
    }
    if section == Section::Contact {
        return level != UnlockLevel::Full;
    }
    false
}
