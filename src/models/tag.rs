use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::borrow::Cow;
use validator::{Validate, ValidationError};

static HEX_COLOR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#[A-Fa-f0-9]{6}$").unwrap());
static SLUG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-a-zA-Z0-9_]+$").unwrap());

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub color: String,
    pub slug: String,
}

/// Association row used when loading the tags of many recipes at once.
#[derive(Debug, Clone, FromRow)]
pub struct RecipeTagRow {
    pub recipe_id: i64,
    pub id: i64,
    pub name: String,
    pub color: String,
    pub slug: String,
}

impl From<RecipeTagRow> for Tag {
    fn from(row: RecipeTagRow) -> Self {
        Tag {
            id: row.id,
            name: row.name,
            color: row.color,
            slug: row.slug,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct TagForm {
    #[validate(length(min = 1, max = 200))]
    pub name: String,

    #[validate(custom(function = "validate_color"))]
    pub color: String,

    #[validate(length(min = 1, max = 200), custom(function = "validate_slug"))]
    pub slug: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TagUpdateForm {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,

    #[validate(custom(function = "validate_color"))]
    pub color: Option<String>,

    #[validate(length(min = 1, max = 200), custom(function = "validate_slug"))]
    pub slug: Option<String>,
}

pub fn validate_color(color: &str) -> Result<(), ValidationError> {
    if HEX_COLOR_RE.is_match(color) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_color")
            .with_message(Cow::from("Color must be a hex value like #E26C2D")))
    }
}

pub fn validate_slug(slug: &str) -> Result<(), ValidationError> {
    if SLUG_RE.is_match(slug) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_slug").with_message(Cow::from(
            "Slug may contain only letters, digits, hyphens and underscores",
        )))
    }
}
