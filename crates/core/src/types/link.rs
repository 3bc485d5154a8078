//! Admin-menu link types.
//!
//! An [`AdminLink`] describes a menu entry the app registers inside the
//! Shoper admin panel. Links are created from a [`NewAdminLink`] and modified
//! with an [`AdminLinkUpdate`]; both paths run the same validation.

use core::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

/// Prefix of every generated link identifier.
const LINK_ID_PREFIX: &str = "link_";

/// Identifier of an admin link (`link_<32 hex chars>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkId(String);

impl LinkId {
    /// Generate a fresh identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("{LINK_ID_PREFIX}{}", Uuid::new_v4().simple()))
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for LinkId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// How the Shoper admin panel opens a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpenType {
    /// Opens in the side panel.
    #[default]
    Panel,
    /// Opens inside an iframe.
    Iframe,
}

impl OpenType {
    /// Get the wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Panel => "panel",
            Self::Iframe => "iframe",
        }
    }
}

impl fmt::Display for OpenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OpenType {
    type Err = LinkValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "panel" => Ok(Self::Panel),
            "iframe" => Ok(Self::Iframe),
            other => Err(LinkValidationError::InvalidOpenType(other.to_owned())),
        }
    }
}

/// A single validation failure for an admin link.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkValidationError {
    /// The name is missing or blank.
    #[error("Name is required")]
    NameRequired,
    /// The URL is missing or blank.
    #[error("URL is required")]
    UrlRequired,
    /// The URL is not an absolute URL.
    #[error("URL is not valid: {0}")]
    InvalidUrl(String),
    /// The open type is not `panel` or `iframe`.
    #[error("Open type must be 'panel' or 'iframe' (got '{0}')")]
    InvalidOpenType(String),
}

/// A stored admin-menu link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminLink {
    pub id: LinkId,
    pub name: String,
    pub url: String,
    /// Shoper admin object the link is attached to (e.g. `product`).
    pub object: Option<String>,
    pub action: Option<String>,
    pub placement: Option<String>,
    pub open_type: OpenType,
    pub permissions: Vec<String>,
    pub scope: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating an admin link.
///
/// `open_type` is kept as a raw string so that an unknown value is reported
/// as a validation error instead of a deserialization failure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAdminLink {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
    pub object: Option<String>,
    pub action: Option<String>,
    pub placement: Option<String>,
    pub open_type: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
    pub scope: Option<String>,
}

/// Partial update of an admin link. Absent fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminLinkUpdate {
    pub name: Option<String>,
    pub url: Option<String>,
    pub object: Option<String>,
    pub action: Option<String>,
    pub placement: Option<String>,
    pub open_type: Option<String>,
    pub permissions: Option<Vec<String>>,
    pub scope: Option<String>,
}

impl NewAdminLink {
    /// Validate the input, collecting every failure.
    ///
    /// # Errors
    ///
    /// Returns all validation failures found.
    pub fn validate(&self) -> Result<OpenType, Vec<LinkValidationError>> {
        validate_fields(&self.name, &self.url, self.open_type.as_deref())
    }

    /// Validate the input and build a new link with a fresh identifier.
    ///
    /// # Errors
    ///
    /// Returns all validation failures found.
    pub fn into_link(self, now: DateTime<Utc>) -> Result<AdminLink, Vec<LinkValidationError>> {
        let open_type = self.validate()?;

        Ok(AdminLink {
            id: LinkId::generate(),
            name: self.name.trim().to_owned(),
            url: self.url.trim().to_owned(),
            object: self.object,
            action: self.action,
            placement: self.placement,
            open_type,
            permissions: self.permissions,
            scope: self.scope,
            created_at: now,
            updated_at: now,
        })
    }
}

impl AdminLink {
    /// Apply a partial update, returning the updated link.
    ///
    /// The identifier and creation time are preserved; `updated_at` is set to
    /// `now`.
    ///
    /// # Errors
    ///
    /// Returns all validation failures of the resulting link.
    pub fn apply(
        &self,
        update: AdminLinkUpdate,
        now: DateTime<Utc>,
    ) -> Result<Self, Vec<LinkValidationError>> {
        let name = update.name.unwrap_or_else(|| self.name.clone());
        let url = update.url.unwrap_or_else(|| self.url.clone());
        let open_type = match update.open_type.as_deref() {
            Some(raw) => validate_fields(&name, &url, Some(raw))?,
            None => {
                validate_fields(&name, &url, None)?;
                self.open_type
            }
        };

        Ok(Self {
            id: self.id.clone(),
            name: name.trim().to_owned(),
            url: url.trim().to_owned(),
            object: update.object.or_else(|| self.object.clone()),
            action: update.action.or_else(|| self.action.clone()),
            placement: update.placement.or_else(|| self.placement.clone()),
            open_type,
            permissions: update
                .permissions
                .unwrap_or_else(|| self.permissions.clone()),
            scope: update.scope.or_else(|| self.scope.clone()),
            created_at: self.created_at,
            updated_at: now,
        })
    }
}

fn validate_fields(
    name: &str,
    url: &str,
    open_type: Option<&str>,
) -> Result<OpenType, Vec<LinkValidationError>> {
    let mut errors = Vec::new();

    if name.trim().is_empty() {
        errors.push(LinkValidationError::NameRequired);
    }

    let url = url.trim();
    if url.is_empty() {
        errors.push(LinkValidationError::UrlRequired);
    } else if let Err(e) = Url::parse(url) {
        errors.push(LinkValidationError::InvalidUrl(e.to_string()));
    }

    let open_type = match open_type.map(str::parse::<OpenType>) {
        None => OpenType::default(),
        Some(Ok(open_type)) => open_type,
        Some(Err(e)) => {
            errors.push(e);
            OpenType::default()
        }
    };

    if errors.is_empty() {
        Ok(open_type)
    } else {
        Err(errors)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn new_link() -> NewAdminLink {
        NewAdminLink {
            name: "Reports".to_string(),
            url: "https://app.example.com/reports".to_string(),
            placement: Some("left".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_link_id_format() {
        let id = LinkId::generate();
        assert!(id.as_str().starts_with("link_"));
        assert_eq!(id.as_str().len(), 5 + 32);
        assert_ne!(id, LinkId::generate());
    }

    #[test]
    fn test_into_link_defaults_to_panel() {
        let now = Utc::now();
        let link = new_link().into_link(now).unwrap();
        assert_eq!(link.open_type, OpenType::Panel);
        assert_eq!(link.created_at, now);
        assert_eq!(link.updated_at, now);
        assert_eq!(link.placement.as_deref(), Some("left"));
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let input = NewAdminLink {
            name: "  ".to_string(),
            url: "not a url".to_string(),
            open_type: Some("popup".to_string()),
            ..Default::default()
        };
        let errors = input.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&LinkValidationError::NameRequired));
        assert!(matches!(errors[1], LinkValidationError::InvalidUrl(_)));
        assert_eq!(
            errors[2],
            LinkValidationError::InvalidOpenType("popup".to_string())
        );
    }

    #[test]
    fn test_validate_missing_url() {
        let input = NewAdminLink {
            name: "Reports".to_string(),
            ..Default::default()
        };
        assert_eq!(
            input.validate().unwrap_err(),
            vec![LinkValidationError::UrlRequired]
        );
    }

    #[test]
    fn test_apply_keeps_identity() {
        let created = Utc::now();
        let link = new_link().into_link(created).unwrap();
        let later = created + chrono::Duration::seconds(30);

        let updated = link
            .apply(
                AdminLinkUpdate {
                    name: Some("Sales".to_string()),
                    open_type: Some("iframe".to_string()),
                    ..Default::default()
                },
                later,
            )
            .unwrap();

        assert_eq!(updated.id, link.id);
        assert_eq!(updated.name, "Sales");
        assert_eq!(updated.url, link.url);
        assert_eq!(updated.open_type, OpenType::Iframe);
        assert_eq!(updated.created_at, created);
        assert_eq!(updated.updated_at, later);
    }

    #[test]
    fn test_apply_rejects_invalid_url() {
        let link = new_link().into_link(Utc::now()).unwrap();
        let result = link.apply(
            AdminLinkUpdate {
                url: Some(String::new()),
                ..Default::default()
            },
            Utc::now(),
        );
        assert_eq!(result.unwrap_err(), vec![LinkValidationError::UrlRequired]);
    }

    #[test]
    fn test_serializes_camel_case() {
        let link = new_link().into_link(Utc::now()).unwrap();
        let json = serde_json::to_value(&link).unwrap();
        assert_eq!(json["openType"], "panel");
        assert!(json.get("createdAt").is_some());
        assert!(json.get("open_type").is_none());
    }
}
