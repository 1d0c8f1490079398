//! ============================================================================
//! Content - Course and lesson documents as the access policy sees them
//! ============================================================================
//! Only the fields that matter for gating are modelled; the document store
//! owns the full schema. A lesson can belong to several courses and is
//! unlocked when any one of them is accessible.
//! ============================================================================

use serde::{Deserialize, Serialize};

use crate::access::{has_access, RequiredTier, Tier};

/// A course document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    /// Required tier; absent, null and empty mean unrestricted
    #[serde(default, deserialize_with = "deserialize_required_tier")]
    pub tier: Option<RequiredTier>,
}

impl Course {
    pub fn is_accessible(&self, tier: Tier) -> bool {
        has_access(tier, self.tier.as_ref())
    }
}

/// A lesson document with the courses that contain it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    /// Containing courses, ordered free, pro, ultra
    #[serde(default, deserialize_with = "deserialize_courses")]
    pub courses: Vec<Course>,
}

/// Lock state of a lesson for one tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonAccess {
    pub unlocked: bool,
    /// First accessible course
    pub active_course: Option<String>,
    /// Tier to advertise when locked
    pub required_tier: Option<RequiredTier>,
}

impl Lesson {
    /// First course `tier` can access
    pub fn accessible_course(&self, tier: Tier) -> Option<&Course> {
        self.courses.iter().find(|course| course.is_accessible(tier))
    }

    /// A lesson with no courses stays locked
    pub fn is_unlocked(&self, tier: Tier) -> bool {
        self.accessible_course(tier).is_some()
    }

    pub fn access(&self, tier: Tier) -> LessonAccess {
        match self.accessible_course(tier) {
            Some(course) => LessonAccess {
                unlocked: true,
                active_course: Some(course.id.clone()),
                required_tier: None,
            },
            None => LessonAccess {
                unlocked: false,
                active_course: None,
                required_tier: self.courses.first().and_then(|c| c.tier.clone()),
            },
        }
    }
}

fn deserialize_required_tier<'de, D>(deserializer: D) -> Result<Option<RequiredTier>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(RequiredTier::parse(raw.as_deref()))
}

/// The store returns `null` for a lesson outside every course
fn deserialize_courses<'de, D>(deserializer: D) -> Result<Vec<Course>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<Course>>::deserialize(deserializer)?.unwrap_or_default())
}
