//! Project records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::Record;

/// Name of the projects collection.
pub const PROJECTS: &str = "projects";

/// Most preview images a project may carry.
pub const MAX_PREVIEWS: usize = 6;

/// Fields fetched for the card listing.
pub const SUMMARY_FIELDS: &[&str] = &["id", "created_at", "title", "tagline", "image_thumbnail_url"];

/// A portfolio project with its image references.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tagline: Option<String>,
    pub description: String,
    pub technologies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_code_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub demo_url: Option<String>,
    pub image_thumbnail_url: String,
    #[serde(default)]
    pub image_preview_urls: Vec<String>,
}

impl Record for Project {
    fn id(&self) -> &str {
        &self.id
    }
}

/// The card projection of a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tagline: Option<String>,
    pub image_thumbnail_url: String,
}

/// Top-level fields to merge into a stored project. Unset fields are left alone.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProjectChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tagline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technologies: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_code_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub demo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_thumbnail_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_preview_urls: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_changes_serialize_only_set_fields() {
        let changes = ProjectChanges {
            title: Some("New".into()),
            image_preview_urls: Some(vec![]),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&changes).unwrap(),
            json!({ "title": "New", "image_preview_urls": [] })
        );
    }

    #[test]
    fn test_project_reads_stored_timestamp_string() {
        let project: Project = serde_json::from_value(json!({
            "id": "p1",
            "created_at": "2024-05-01T10:00:00.000Z",
            "title": "Trailhead",
            "description": "A memory system",
            "technologies": ["rust"],
            "image_thumbnail_url": "https://storage.googleapis.com/b/projects/p1/thumbnail.png"
        }))
        .unwrap();
        assert!(project.image_preview_urls.is_empty());
        assert!(project.site_url.is_none());
    }
}
