//! Request validation.
//!
//! Rules are declared once, on the payload types, with `validator`. They can
//! be evaluated two ways over the same definitions:
//!
//! - [`field_errors`] collects one message per field, for interactive forms.
//! - [`check`] fails with a single [`Error::Validation`] whose message joins
//!   every violation, for request handlers.

use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use validator::{Validate, ValidateUrl, ValidationError, ValidationErrors};

use crate::{Error, Result};

/// Hard per-image ceiling: 10 MiB.
pub const MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024;

/// Accepted image mime types.
pub const IMAGE_MIME_TYPES: &[&str] = &["image/jpeg", "image/png", "image/jpg", "image/webp"];

const MAX_ID_LEN: usize = 128;

/// Field name to first violation message.
pub type FieldErrors = BTreeMap<String, String>;

// ============================================================================
// Payloads
// ============================================================================

/// Which project rules apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Title, description and technologies must be present.
    Create,
    /// Every field is optional.
    Update,
}

/// Project fields as submitted in the `data` form part.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ProjectFields {
    #[validate(length(min = 1, max = 25))]
    pub title: Option<String>,

    #[serde(default, deserialize_with = "blank_as_none")]
    #[validate(length(min = 1, max = 100))]
    pub tagline: Option<String>,

    #[validate(length(min = 10, max = 200))]
    pub description: Option<String>,

    #[validate(length(min = 1, max = 20), custom(function = "technology_names"))]
    pub technologies: Option<Vec<String>>,

    #[serde(default, deserialize_with = "blank_as_none")]
    #[validate(url)]
    pub site_url: Option<String>,

    #[serde(default, deserialize_with = "blank_as_none")]
    #[validate(url)]
    pub source_code_url: Option<String>,

    #[serde(default, deserialize_with = "blank_as_none")]
    #[validate(url)]
    pub demo_url: Option<String>,
}

impl ProjectFields {
    fn missing_required(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.title.is_none() {
            missing.push("title");
        }
        if self.description.is_none() {
            missing.push("description");
        }
        if self.technologies.is_none() {
            missing.push("technologies");
        }
        missing
    }
}

/// Metadata of an uploaded image.
#[derive(Debug, Clone, Validate)]
pub struct ImageFile {
    #[validate(custom(function = "image_mime_type"))]
    pub mime_type: String,

    #[validate(range(max = 10485760, message = "File size must be less than 10MB"))]
    pub size: u64,
}

/// Which existing previews a PATCH replaces or removes.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct PreviewDetail {
    #[serde(default)]
    #[validate(
        length(max = 6, message = "Too many preview files to update"),
        custom(function = "update_urls")
    )]
    pub update: Vec<String>,

    #[serde(default)]
    #[validate(
        length(max = 6, message = "Too many preview files to delete"),
        custom(function = "delete_urls")
    )]
    pub delete: Vec<String>,
}

// ============================================================================
// Custom rules
// ============================================================================

fn rule_error(code: &'static str, message: String) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::from(message));
    err
}

fn technology_names(technologies: &[String]) -> std::result::Result<(), ValidationError> {
    for (i, name) in technologies.iter().enumerate() {
        let len = name.chars().count();
        if len == 0 {
            return Err(rule_error(
                "technology",
                format!("\"technologies[{}]\" is not allowed to be empty", i),
            ));
        }
        if len > 25 {
            return Err(rule_error(
                "technology",
                format!(
                    "\"technologies[{}]\" length must be less than or equal to 25 characters long",
                    i
                ),
            ));
        }
    }
    Ok(())
}

fn preview_urls(urls: &[String], list: &str) -> std::result::Result<(), ValidationError> {
    if urls.iter().all(|u| u.validate_url()) {
        return Ok(());
    }
    Err(rule_error(
        "url",
        format!("Invalid preview url in {} list", list),
    ))
}

fn update_urls(urls: &[String]) -> std::result::Result<(), ValidationError> {
    preview_urls(urls, "update")
}

fn delete_urls(urls: &[String]) -> std::result::Result<(), ValidationError> {
    preview_urls(urls, "delete")
}

fn image_mime_type(mime_type: &str) -> std::result::Result<(), ValidationError> {
    if IMAGE_MIME_TYPES.contains(&mime_type) {
        return Ok(());
    }
    Err(rule_error(
        "mime_type",
        "Only JPEG, PNG, JPG and WEBP images are allowed".to_string(),
    ))
}

fn blank_as_none<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

// ============================================================================
// Evaluation
// ============================================================================

/// Every violation as `(field, message)`, ordered by field name.
fn violations(errors: &ValidationErrors) -> Vec<(String, String)> {
    let mut out: Vec<(String, String)> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            let field = field.to_string();
            errs.iter()
                .map(move |err| (field.clone(), describe(&field, err)))
                .collect::<Vec<_>>()
        })
        .collect();
    out.sort_by(|a, b| a.0.cmp(&b.0));
    out
}

fn describe(field: &str, err: &ValidationError) -> String {
    if let Some(message) = &err.message {
        return message.to_string();
    }

    let param = |name: &str| err.params.get(name).and_then(Value::as_u64);
    match err.code.as_ref() {
        "required" => format!("\"{}\" is required", field),
        "url" => format!("\"{}\" must be a valid uri", field),
        "length" => {
            let (len, is_list) = match err.params.get("value") {
                Some(Value::Array(items)) => (Some(items.len() as u64), true),
                Some(Value::String(s)) => (Some(s.chars().count() as u64), false),
                _ => (None, false),
            };
            match (len, param("min"), param("max")) {
                (Some(len), Some(min), _) if len < min && is_list => {
                    format!("\"{}\" must contain at least {} items", field, min)
                }
                (Some(len), Some(min), _) if len < min => {
                    format!("\"{}\" length must be at least {} characters long", field, min)
                }
                (Some(_), _, Some(max)) if is_list => {
                    format!("\"{}\" must contain less than or equal to {} items", field, max)
                }
                (Some(_), _, Some(max)) => format!(
                    "\"{}\" length must be less than or equal to {} characters long",
                    field, max
                ),
                _ => format!("\"{}\" has an invalid length", field),
            }
        }
        "range" => match param("max") {
            Some(max) => format!("\"{}\" must be less than or equal to {}", field, max),
            None => format!("\"{}\" is out of range", field),
        },
        other => format!("\"{}\" failed {} validation", field, other),
    }
}

fn project_violations(fields: &ProjectFields, mode: Mode) -> Vec<(String, String)> {
    let mut out = match fields.validate() {
        Ok(()) => Vec::new(),
        Err(errors) => violations(&errors),
    };
    if mode == Mode::Create {
        out.extend(
            fields
                .missing_required()
                .into_iter()
                .map(|f| (f.to_string(), format!("\"{}\" is required", f))),
        );
        out.sort_by(|a, b| a.0.cmp(&b.0));
    }
    out
}

fn first_per_field(violations: Vec<(String, String)>) -> FieldErrors {
    let mut map = FieldErrors::new();
    for (field, message) in violations {
        map.entry(field).or_insert(message);
    }
    map
}

fn joined(violations: Vec<(String, String)>) -> Result<()> {
    if violations.is_empty() {
        return Ok(());
    }
    let message = violations
        .into_iter()
        .map(|(_, m)| m)
        .collect::<Vec<_>>()
        .join(". ");
    Err(Error::Validation(message))
}

/// Collect-all mode for any validated payload.
pub fn field_errors<V: Validate>(value: &V) -> FieldErrors {
    match value.validate() {
        Ok(()) => FieldErrors::new(),
        Err(errors) => first_per_field(violations(&errors)),
    }
}

/// Fail-fast mode for any validated payload.
pub fn check<V: Validate>(value: &V) -> Result<()> {
    match value.validate() {
        Ok(()) => Ok(()),
        Err(errors) => joined(violations(&errors)),
    }
}

/// Collect-all mode for project fields.
pub fn project_field_errors(fields: &ProjectFields, mode: Mode) -> FieldErrors {
    first_per_field(project_violations(fields, mode))
}

/// Fail-fast mode for project fields.
pub fn check_project(fields: &ProjectFields, mode: Mode) -> Result<()> {
    joined(project_violations(fields, mode))
}

/// Fail-fast check of an uploaded image.
pub fn check_image(mime_type: &str, size: u64) -> Result<()> {
    check(&ImageFile {
        mime_type: mime_type.to_string(),
        size,
    })
}

/// Ids are opaque but must be usable as a single path segment.
pub fn check_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(Error::Validation(
            "\"id\" is not allowed to be empty".to_string(),
        ));
    }
    if id.chars().count() > MAX_ID_LEN {
        return Err(Error::Validation(format!(
            "\"id\" length must be less than or equal to {} characters long",
            MAX_ID_LEN
        )));
    }
    if id.contains('/') {
        return Err(Error::Validation("\"id\" must not contain '/'".to_string()));
    }
    Ok(())
}

// ============================================================================
// Form part parsing
// ============================================================================

fn parse_object<T: serde::de::DeserializeOwned>(raw: &str, not_object: &str) -> Result<T> {
    let value: Value =
        serde_json::from_str(raw).map_err(|_| Error::Validation(not_object.to_string()))?;
    if !value.is_object() {
        return Err(Error::Validation(not_object.to_string()));
    }
    serde_json::from_value(value).map_err(|e| Error::Validation(e.to_string()))
}

/// Parse the `data` form part.
pub fn parse_project_fields(raw: &str) -> Result<ProjectFields> {
    parse_object(raw, "Data must be a valid JSON object")
}

/// Parse the `preview_detail` form part.
pub fn parse_preview_detail(raw: &str) -> Result<PreviewDetail> {
    parse_object(raw, "preview_detail must be a valid JSON object")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn fields(value: Value) -> ProjectFields {
        serde_json::from_value(value).unwrap()
    }

    fn valid() -> Value {
        json!({
            "title": "Trailhead",
            "description": "Offline trail maps for hikers",
            "technologies": ["rust", "axum"],
            "site_url": "https://trailhead.dev"
        })
    }

    #[test]
    fn test_valid_project_passes_both_modes() {
        let f = fields(valid());
        assert!(project_field_errors(&f, Mode::Create).is_empty());
        assert!(check_project(&f, Mode::Create).is_ok());
    }

    #[test]
    fn test_short_description_mentions_minimum() {
        let f = fields(json!({ "title": "X", "description": "short" }));
        let err = check_project(&f, Mode::Create).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("\"description\" length must be at least 10 characters long"));
        assert!(message.contains("\"technologies\" is required"));
    }

    #[test]
    fn test_modes_agree_on_violated_fields() {
        let f = fields(json!({
            "title": "A title that is far too long to fit",
            "description": "short",
            "technologies": [],
            "demo_url": "not a uri"
        }));
        let map = project_field_errors(&f, Mode::Create);
        let joined = check_project(&f, Mode::Create).unwrap_err().to_string();

        assert_eq!(
            map.keys().cloned().collect::<Vec<_>>(),
            vec!["demo_url", "description", "technologies", "title"]
        );
        for message in map.values() {
            assert!(joined.contains(message.as_str()), "{} not in {}", message, joined);
        }
    }

    #[test]
    fn test_update_mode_allows_missing_fields() {
        let f = fields(json!({ "title": "Renamed" }));
        assert!(check_project(&f, Mode::Update).is_ok());
        assert!(check_project(&f, Mode::Create).is_err());
    }

    #[test]
    fn test_blank_urls_mean_not_provided() {
        let mut data = valid();
        data["site_url"] = json!("");
        data["demo_url"] = Value::Null;
        let f = fields(data);
        assert!(f.site_url.is_none());
        assert!(f.demo_url.is_none());
        assert!(check_project(&f, Mode::Create).is_ok());
    }

    #[test]
    fn test_technology_entries_bounded() {
        let mut data = valid();
        data["technologies"] = json!(["rust", "a-very-long-technology-name-indeed"]);
        let map = project_field_errors(&fields(data), Mode::Create);
        assert!(map["technologies"].contains("technologies[1]"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = parse_project_fields(r#"{"title":"x","owner":"me"}"#).unwrap_err();
        assert!(err.to_string().contains("unknown field"));
    }

    #[rstest]
    #[case("not json")]
    #[case("[1, 2]")]
    #[case("\"text\"")]
    fn test_data_must_be_json_object(#[case] raw: &str) {
        let err = parse_project_fields(raw).unwrap_err();
        assert_eq!(err.to_string(), "Data must be a valid JSON object");
    }

    #[rstest]
    #[case("image/jpeg", 1024, true)]
    #[case("image/png", MAX_IMAGE_BYTES, true)]
    #[case("image/webp", 10, true)]
    #[case("image/gif", 10, false)]
    #[case("application/pdf", 10, false)]
    #[case("image/png", MAX_IMAGE_BYTES + 1, false)]
    fn test_image_rules(#[case] mime: &str, #[case] size: u64, #[case] ok: bool) {
        assert_eq!(check_image(mime, size).is_ok(), ok);
    }

    #[test]
    fn test_oversized_image_message() {
        let err = check_image("image/png", MAX_IMAGE_BYTES + 1).unwrap_err();
        assert_eq!(err.to_string(), "File size must be less than 10MB");
    }

    #[test]
    fn test_preview_detail_defaults_and_limits() {
        let detail = parse_preview_detail("{}").unwrap();
        assert!(detail.update.is_empty() && detail.delete.is_empty());

        let urls: Vec<String> = (0..7)
            .map(|i| format!("https://storage.googleapis.com/b/projects/p/preview-{}.png", i))
            .collect();
        let detail = PreviewDetail {
            update: vec![],
            delete: urls,
        };
        assert_eq!(
            check(&detail).unwrap_err().to_string(),
            "Too many preview files to delete"
        );
    }

    #[test]
    fn test_preview_detail_membership_left_to_handler() {
        let detail = parse_preview_detail(
            r#"{"delete":["https://storage.googleapis.com/b/projects/p/preview-9.png"]}"#,
        )
        .unwrap();
        assert!(field_errors(&detail).is_empty());
        assert!(parse_preview_detail(r#"{"replace":[]}"#).is_err());
    }

    #[test]
    fn test_preview_detail_entries_must_be_urls() {
        let detail = parse_preview_detail(r#"{"update":["not a url"]}"#).unwrap();
        assert_eq!(
            check(&detail).unwrap_err().to_string(),
            "Invalid preview url in update list"
        );

        let detail = parse_preview_detail(r#"{"delete":["url-not-in-list"]}"#).unwrap();
        assert_eq!(
            field_errors(&detail).get("delete").map(String::as_str),
            Some("Invalid preview url in delete list")
        );
    }

    #[rstest]
    #[case("", false)]
    #[case("a/b", false)]
    #[case("9f3c1e2a-1111-4b4b-8c8c-123456789abc", true)]
    fn test_check_id(#[case] id: &str, #[case] ok: bool) {
        assert_eq!(check_id(id).is_ok(), ok);
    }
}
