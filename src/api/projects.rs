//! Project Routes
//!
//! CRUD operations for portfolio projects. Writes take multipart forms so
//! images travel with the fields.
//!
//! Routes:
//! - GET /api/project - List projects (`?view=full` for every field)
//! - POST /api/project - Create a project
//! - POST /api/project/validate - Check project fields without saving
//! - GET /api/project/:id - Get project details
//! - PATCH /api/project/:id - Update project fields and images
//! - DELETE /api/project/:id - Delete a project and its images

use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::{JsonRejection, QueryRejection},
        Multipart, Path, Query, State,
    },
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::response::ApiResponse;
use crate::middleware::SessionUser;
use crate::models::{Project, ProjectSummary};
use crate::services::ProjectUpdate;
use crate::storage::StoredFile;
use crate::validation::{self, FieldErrors, Mode, ProjectFields};
use crate::{AppState, Error, Result};

/// Build project routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/project", get(list_projects).post(create_project))
        .route("/api/project/validate", post(validate_project))
        .route(
            "/api/project/:id",
            get(get_project).patch(update_project).delete(delete_project),
        )
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize, Default)]
pub struct ListProjectsQuery {
    /// `full` returns every field, anything else the card projection.
    pub view: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ValidateQuery {
    /// `update` relaxes the required fields.
    pub mode: Option<String>,
}

/// Full project as returned by the API.
#[derive(Debug, Serialize)]
pub struct ProjectResponse {
    pub id: String,
    pub created_at: String,
    pub title: String,
    pub tagline: Option<String>,
    pub description: String,
    pub technologies: Vec<String>,
    pub site_url: Option<String>,
    pub source_code_url: Option<String>,
    pub demo_url: Option<String>,
    pub image_thumbnail_url: String,
    pub image_preview_urls: Vec<String>,
}

impl From<Project> for ProjectResponse {
    fn from(p: Project) -> Self {
        Self {
            id: p.id,
            created_at: readable_date(&p.created_at),
            title: p.title,
            tagline: p.tagline,
            description: p.description,
            technologies: p.technologies,
            site_url: p.site_url,
            source_code_url: p.source_code_url,
            demo_url: p.demo_url,
            image_thumbnail_url: p.image_thumbnail_url,
            image_preview_urls: p.image_preview_urls,
        }
    }
}

/// Card projection as returned by the API.
#[derive(Debug, Serialize)]
pub struct ProjectSummaryResponse {
    pub id: String,
    pub created_at: String,
    pub title: String,
    pub tagline: Option<String>,
    pub image_thumbnail_url: String,
}

impl From<ProjectSummary> for ProjectSummaryResponse {
    fn from(p: ProjectSummary) -> Self {
        Self {
            id: p.id,
            created_at: readable_date(&p.created_at),
            title: p.title,
            tagline: p.tagline,
            image_thumbnail_url: p.image_thumbnail_url,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ProjectListResponse {
    Summaries(Vec<ProjectSummaryResponse>),
    Full(Vec<ProjectResponse>),
}

#[derive(Debug, Serialize)]
pub struct CreatedProject {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: FieldErrors,
}

/// `October 16, 2026`
fn readable_date(at: &DateTime<Utc>) -> String {
    at.format("%B %-d, %Y").to_string()
}

// ============================================================================
// Multipart form
// ============================================================================

/// Parts of a project form. Unknown parts are ignored.
#[derive(Debug, Default)]
struct ProjectForm {
    data: Option<String>,
    thumbnail: Option<StoredFile>,
    previews: Vec<StoredFile>,
    preview_detail: Option<String>,
}

impl ProjectForm {
    async fn read(mut multipart: Multipart) -> Result<Self> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "data" => form.data = Some(field.text().await?),
                "preview_detail" => form.preview_detail = Some(field.text().await?),
                "thumbnail" | "previews" => {
                    let mime_type = field
                        .content_type()
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "application/octet-stream".into());
                    let bytes = field.bytes().await?;

                    // Browsers send an empty part for an untouched file input.
                    if bytes.is_empty() {
                        continue;
                    }

                    let file = StoredFile { mime_type, bytes };
                    if name == "thumbnail" {
                        form.thumbnail = Some(file);
                    } else {
                        form.previews.push(file);
                    }
                }
                _ => continue,
            }
        }

        Ok(form)
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// List projects, newest first.
///
/// GET /api/project
#[axum::debug_handler]
async fn list_projects(
    State(state): State<AppState>,
    query: std::result::Result<Query<ListProjectsQuery>, QueryRejection>,
) -> Result<ApiResponse<ProjectListResponse>> {
    let Query(query) = query?;
    let projects = if query.view.as_deref() == Some("full") {
        let projects = state.projects.list_full().await?;
        ProjectListResponse::Full(projects.into_iter().map(Into::into).collect())
    } else {
        let projects = state.projects.list_summaries().await?;
        ProjectListResponse::Summaries(projects.into_iter().map(Into::into).collect())
    };

    Ok(ApiResponse::ok("All projects retrieved successfully", projects))
}

/// Get a project by id.
///
/// GET /api/project/:id
#[axum::debug_handler]
async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ApiResponse<ProjectResponse>> {
    let project = state.projects.get(&id).await?;
    Ok(ApiResponse::ok("Project retrieved successfully", project.into()))
}

/// Create a project.
///
/// POST /api/project
///
/// Form parts: `data` (JSON object), `thumbnail` (image), `previews` (0-6 images).
#[axum::debug_handler]
async fn create_project(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<ApiResponse<CreatedProject>> {
    let form = ProjectForm::read(multipart?).await?;
    let fields = validation::parse_project_fields(form.data.as_deref().unwrap_or_default())?;

    let project = state
        .projects
        .create(fields, form.thumbnail, form.previews)
        .await?;

    info!(project_id = %project.id, by = user.email(), "Created project");
    Ok(ApiResponse::created(
        "Project created successfully",
        CreatedProject { id: project.id },
    ))
}

/// Update a project.
///
/// PATCH /api/project/:id
///
/// Every part is optional. `preview_detail` is `{update: [url], delete: [url]}`:
/// with an empty `update` list the `previews` files are appended, otherwise
/// they replace the listed previews in order.
#[axum::debug_handler]
async fn update_project(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path(id): Path<String>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<ApiResponse<()>> {
    let form = ProjectForm::read(multipart?).await?;

    let fields = form
        .data
        .as_deref()
        .filter(|raw| !raw.trim().is_empty())
        .map(validation::parse_project_fields)
        .transpose()?;
    let preview_detail = form
        .preview_detail
        .as_deref()
        .filter(|raw| !raw.trim().is_empty())
        .map(validation::parse_preview_detail)
        .transpose()?
        .unwrap_or_default();

    state
        .projects
        .update(
            &id,
            ProjectUpdate {
                fields,
                thumbnail: form.thumbnail,
                previews: form.previews,
                preview_detail,
            },
        )
        .await?;

    info!(project_id = %id, by = user.email(), "Updated project");
    Ok(ApiResponse::message("Project updated successfully"))
}

/// Delete a project and its images.
///
/// DELETE /api/project/:id
#[axum::debug_handler]
async fn delete_project(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path(id): Path<String>,
) -> Result<ApiResponse<()>> {
    state.projects.delete(&id).await?;

    info!(project_id = %id, by = user.email(), "Deleted project");
    Ok(ApiResponse::message("Project deleted successfully"))
}

/// Run the project rules in collect-all mode.
///
/// POST /api/project/validate
#[axum::debug_handler]
async fn validate_project(
    query: std::result::Result<Query<ValidateQuery>, QueryRejection>,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<ApiResponse<ValidationReport>> {
    let Query(query) = query?;
    let Json(body) = body?;
    let mode = match query.mode.as_deref() {
        Some("update") => Mode::Update,
        _ => Mode::Create,
    };

    if !body.is_object() {
        return Err(Error::Validation("Data must be a valid JSON object".to_string()));
    }

    let errors = match serde_json::from_value::<ProjectFields>(body) {
        Ok(fields) => validation::project_field_errors(&fields, mode),
        Err(e) => FieldErrors::from([("data".to_string(), e.to_string())]),
    };

    Ok(ApiResponse::ok(
        "Validation completed",
        ValidationReport {
            valid: errors.is_empty(),
            errors,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_readable_date() {
        let at = Utc.with_ymd_and_hms(2024, 3, 5, 23, 59, 0).unwrap();
        assert_eq!(readable_date(&at), "March 5, 2024");
    }

    #[test]
    fn test_summary_response_renders_date() {
        let summary = ProjectSummary {
            id: "p1".into(),
            created_at: Utc.with_ymd_and_hms(2023, 11, 20, 8, 0, 0).unwrap(),
            title: "Trailhead".into(),
            tagline: None,
            image_thumbnail_url: "https://storage.googleapis.com/b/projects/p1/thumbnail.png".into(),
        };
        let response = ProjectSummaryResponse::from(summary);
        assert_eq!(response.created_at, "November 20, 2023");
    }
}
