//! Project service.
//!
//! Orchestrates validation, the projects collection and image storage.
//! Every check runs before the first storage mutation; once mutations start
//! there is no rollback, so a failure midway can leave orphaned objects.

use futures::future::try_join_all;
use tracing::{info, warn};

use crate::db::Collection;
use crate::error::{Error, Result};
use crate::models::{
    new_id, now, Project, ProjectChanges, ProjectSummary, MAX_PREVIEWS, SUMMARY_FIELDS,
};
use crate::storage::{
    next_preview_index, object_path, strip_extension, CloudStorage, StoredFile,
};
use crate::validation::{self, Mode, PreviewDetail, ProjectFields};

const TOO_MANY_PREVIEWS: &str = "Too many preview files to add, max 6 previews per project";

/// Everything a PATCH may carry.
#[derive(Debug, Default)]
pub struct ProjectUpdate {
    pub fields: Option<ProjectFields>,
    pub thumbnail: Option<StoredFile>,
    pub previews: Vec<StoredFile>,
    pub preview_detail: PreviewDetail,
}

/// Service for project management.
#[derive(Clone)]
pub struct ProjectService {
    projects: Collection<Project>,
    storage: CloudStorage,
}

/// Storage work for an update, resolved up front.
struct PreviewPlan<'a> {
    /// New files paired with the index each will be stored under.
    additions: Vec<(u32, &'a StoredFile)>,
    /// `(position in preview list, old object path, replacement)`.
    replacements: Vec<(usize, String, &'a StoredFile)>,
    /// `(url, object path)` of previews to remove.
    removals: Vec<(String, String)>,
}

impl ProjectService {
    pub fn new(projects: Collection<Project>, storage: CloudStorage) -> Self {
        Self { projects, storage }
    }

    /// Card projection of every project, newest first.
    pub async fn list_summaries(&self) -> Result<Vec<ProjectSummary>> {
        let mut projects: Vec<ProjectSummary> =
            self.projects.find_all_fields(SUMMARY_FIELDS).await?;
        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(projects)
    }

    /// Every project with all fields, newest first.
    pub async fn list_full(&self) -> Result<Vec<Project>> {
        let mut projects = self.projects.find_all().await?;
        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(projects)
    }

    pub async fn get(&self, id: &str) -> Result<Project> {
        validation::check_id(id)?;
        self.find(id).await
    }

    async fn find(&self, id: &str) -> Result<Project> {
        self.projects
            .find_by_id(id)
            .await?
            .ok_or_else(|| Error::NotFound("Project not found".to_string()))
    }

    /// Validate, upload images concurrently, then write the record.
    pub async fn create(
        &self,
        fields: ProjectFields,
        thumbnail: Option<StoredFile>,
        previews: Vec<StoredFile>,
    ) -> Result<Project> {
        if previews.len() > MAX_PREVIEWS {
            return Err(Error::Validation(TOO_MANY_PREVIEWS.to_string()));
        }
        validation::check_project(&fields, Mode::Create)?;
        let thumbnail =
            thumbnail.ok_or_else(|| Error::Validation("Image file is required".to_string()))?;
        check_images(std::iter::once(&thumbnail).chain(previews.iter()))?;

        let id = new_id();
        let thumbnail_path = format!("projects/{}/thumbnail", id);
        let preview_uploads = previews.iter().enumerate().map(|(i, file)| {
            let path = format!("projects/{}/preview-{}", id, i + 1);
            async move { self.storage.store_file(&path, file).await }
        });

        let (image_thumbnail_url, image_preview_urls) = futures::try_join!(
            self.storage.store_file(&thumbnail_path, &thumbnail),
            try_join_all(preview_uploads),
        )?;

        let project = Project {
            id,
            created_at: now(),
            title: required(fields.title, "title")?,
            tagline: fields.tagline,
            description: required(fields.description, "description")?,
            technologies: required(fields.technologies, "technologies")?,
            site_url: fields.site_url,
            source_code_url: fields.source_code_url,
            demo_url: fields.demo_url,
            image_thumbnail_url,
            image_preview_urls,
        };
        self.projects.create(&project).await?;

        info!(
            project_id = %project.id,
            previews = project.image_preview_urls.len(),
            "Project created"
        );
        Ok(project)
    }

    /// Apply a partial update.
    ///
    /// New preview files are appended when `preview_detail.update` is empty,
    /// otherwise they replace the listed previews one for one.
    pub async fn update(&self, id: &str, mut request: ProjectUpdate) -> Result<()> {
        validation::check_id(id)?;
        if let Some(fields) = &request.fields {
            validation::check_project(fields, Mode::Update)?;
        }
        validation::check(&request.preview_detail)?;
        check_images(request.thumbnail.iter().chain(request.previews.iter()))?;

        let fields = request.fields.take();
        let current = self.find(id).await?;
        let plan = plan_previews(&current.image_preview_urls, &request)?;

        let mut changes = match fields {
            Some(fields) => ProjectChanges {
                title: fields.title,
                tagline: fields.tagline,
                description: fields.description,
                technologies: fields.technologies,
                site_url: fields.site_url,
                source_code_url: fields.source_code_url,
                demo_url: fields.demo_url,
                ..Default::default()
            },
            None => ProjectChanges::default(),
        };

        if let Some(thumbnail) = &request.thumbnail {
            match object_path(&current.image_thumbnail_url) {
                Some(old) => self.storage.delete_file(&old).await?,
                None => warn!(
                    project_id = %id,
                    url = %current.image_thumbnail_url,
                    "Thumbnail url has no object path, skipping delete"
                ),
            }
            let path = format!("projects/{}/thumbnail", id);
            changes.image_thumbnail_url = Some(self.storage.store_file(&path, thumbnail).await?);
        }

        let mut preview_urls = current.image_preview_urls.clone();

        let added = try_join_all(plan.additions.iter().map(|(index, file)| {
            let path = format!("projects/{}/preview-{}", id, index);
            async move { self.storage.store_file(&path, file).await }
        }))
        .await?;
        preview_urls.extend(added);

        let replaced = try_join_all(plan.replacements.iter().map(|(position, old, file)| {
            async move {
                self.storage.delete_file(old).await?;
                let url = self.storage.store_file(strip_extension(old), file).await?;
                Ok::<_, Error>((*position, url))
            }
        }))
        .await?;
        for (position, url) in replaced {
            preview_urls[position] = url;
        }

        try_join_all(
            plan.removals
                .iter()
                .map(|(_, path)| self.storage.delete_file(path)),
        )
        .await?;
        preview_urls.retain(|url| !plan.removals.iter().any(|(removed, _)| removed == url));

        changes.image_preview_urls = Some(preview_urls);
        self.projects.update(id, &changes).await?;

        info!(project_id = %id, "Project updated");
        Ok(())
    }

    /// Remove every image of a project, then the record.
    pub async fn delete(&self, id: &str) -> Result<()> {
        validation::check_id(id)?;
        let project = self.find(id).await?;

        match object_path(&project.image_thumbnail_url) {
            Some(path) => self.storage.delete_file(&path).await?,
            None => warn!(project_id = %id, "Thumbnail url has no object path, skipping delete"),
        }

        let preview_paths: Vec<String> = project
            .image_preview_urls
            .iter()
            .filter_map(|url| {
                let path = object_path(url);
                if path.is_none() {
                    warn!(
                        project_id = %id,
                        url = %url,
                        "Preview url has no object path, skipping delete"
                    );
                }
                path
            })
            .collect();
        try_join_all(preview_paths.iter().map(|p| self.storage.delete_file(p))).await?;

        self.projects.delete(id).await?;
        info!(project_id = %id, "Project deleted");
        Ok(())
    }
}

fn required<T>(value: Option<T>, field: &str) -> Result<T> {
    value.ok_or_else(|| Error::Validation(format!("\"{}\" is required", field)))
}

fn check_images<'a>(files: impl Iterator<Item = &'a StoredFile>) -> Result<()> {
    for file in files {
        validation::check_image(&file.mime_type, file.bytes.len() as u64)?;
    }
    Ok(())
}

fn plan_previews<'a>(current: &[String], request: &'a ProjectUpdate) -> Result<PreviewPlan<'a>> {
    let detail = &request.preview_detail;
    let invalid = |message: &str| Error::Validation(message.to_string());

    let mut replacements = Vec::new();
    let mut additions = Vec::new();

    if detail.update.is_empty() {
        if current.len() + request.previews.len() > MAX_PREVIEWS {
            return Err(invalid(TOO_MANY_PREVIEWS));
        }
        let first = next_preview_index(current);
        additions = request
            .previews
            .iter()
            .enumerate()
            .map(|(i, file)| (first + i as u32, file))
            .collect();
    } else {
        if detail.update.len() != request.previews.len() {
            return Err(invalid("Number of preview files and update list not match"));
        }
        for (url, file) in detail.update.iter().zip(request.previews.iter()) {
            let position = current
                .iter()
                .position(|u| u == url)
                .ok_or_else(|| invalid("Invalid preview url in update list"))?;
            if replacements.iter().any(|(p, _, _)| *p == position) {
                return Err(invalid("Duplicate preview url in update list"));
            }
            let path = object_path(url).ok_or_else(|| invalid("Invalid preview url in update list"))?;
            replacements.push((position, path, file));
        }
    }

    let mut removals: Vec<(String, String)> = Vec::new();
    if !detail.delete.is_empty() {
        if detail.delete.len() > current.len() {
            return Err(invalid("Too many preview files to delete"));
        }
        for url in &detail.delete {
            if !current.contains(url) {
                return Err(invalid("Invalid preview url in delete list"));
            }
            if detail.update.contains(url) {
                return Err(invalid("A preview url cannot be both updated and deleted"));
            }
            if removals.iter().any(|(u, _)| u == url) {
                continue;
            }
            let path = object_path(url).ok_or_else(|| invalid("Invalid preview url in delete list"))?;
            removals.push((url.clone(), path));
        }
    }

    Ok(PreviewPlan {
        additions,
        replacements,
        removals,
    })
}
