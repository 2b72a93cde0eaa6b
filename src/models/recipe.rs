use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::HashSet;
use validator::Validate;

use super::tag::Tag;
use super::user::UserProfile;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Recipe {
    pub id: i64,
    pub author_id: i64,
    pub name: String,
    pub text: String,
    pub image: String,
    pub cooking_time: i64,
    pub created_at: i64,
}

/// One (ingredient, amount) pair of a recipe, joined with the ingredient's
/// catalog entry.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct RecipeIngredient {
    #[serde(skip)]
    pub recipe_id: i64,
    pub id: i64,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct IngredientAmount {
    pub id: i64,
    pub amount: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RecipeForm {
    #[validate(length(min = 1, max = 200))]
    pub name: String,

    #[validate(length(min = 1))]
    pub text: String,

    #[validate(length(min = 1))]
    pub image: String,

    #[validate(range(min = 1))]
    pub cooking_time: i64,

    pub ingredients: Vec<IngredientAmount>,

    #[serde(default)]
    pub tags: Vec<i64>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct RecipeUpdateForm {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,

    #[validate(length(min = 1))]
    pub text: Option<String>,

    #[validate(length(min = 1))]
    pub image: Option<String>,

    #[validate(range(min = 1))]
    pub cooking_time: Option<i64>,

    pub ingredients: Option<Vec<IngredientAmount>>,

    pub tags: Option<Vec<i64>>,
}

pub const MAX_INGREDIENT_AMOUNT: i64 = i32::MAX as i64;

/// A recipe needs at least one ingredient, every amount lies in
/// `1..=MAX_INGREDIENT_AMOUNT` and no ingredient appears twice.
pub fn validate_ingredient_amounts(ingredients: &[IngredientAmount]) -> AppResult<()> {
    if ingredients.is_empty() {
        return Err(AppError::Validation(
            "A recipe needs at least one ingredient".to_string(),
        ));
    }

    let mut seen = HashSet::with_capacity(ingredients.len());
    for item in ingredients {
        if item.amount < 1 {
            return Err(AppError::Validation(format!(
                "Amount of ingredient {} must be at least 1",
                item.id
            )));
        }
        if item.amount > MAX_INGREDIENT_AMOUNT {
            return Err(AppError::Validation(format!(
                "Amount of ingredient {} must be at most {}",
                item.id, MAX_INGREDIENT_AMOUNT
            )));
        }
        if !seen.insert(item.id) {
            return Err(AppError::Validation(format!(
                "Ingredient {} is listed more than once",
                item.id
            )));
        }
    }

    Ok(())
}

/// Tag ids with duplicates dropped, first occurrence wins.
pub fn dedup_tag_ids(tags: &[i64]) -> Vec<i64> {
    let mut seen = HashSet::with_capacity(tags.len());
    tags.iter().copied().filter(|id| seen.insert(*id)).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeResponse {
    pub id: i64,
    pub tags: Vec<Tag>,
    pub author: UserProfile,
    pub ingredients: Vec<RecipeIngredient>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecipeShortResponse {
    pub id: i64,
    pub name: String,
    pub image: String,
    pub cooking_time: i64,
}

impl From<Recipe> for RecipeShortResponse {
    fn from(recipe: Recipe) -> Self {
        RecipeShortResponse {
            id: recipe.id,
            name: recipe.name,
            image: recipe.image,
            cooking_time: recipe.cooking_time,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct RecipeFilter {
    pub tags: Vec<String>,
    pub author: Option<i64>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

impl RecipeFilter {
    /// `tags` may repeat (`?tags=lunch&tags=dinner`), which is why this reads
    /// the raw query string instead of going through `web::Query`.
    pub fn from_query_string(query: &str) -> AppResult<Self> {
        let mut filter = RecipeFilter::default();

        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "tags" => {
                    if !value.is_empty() {
                        filter.tags.push(value.into_owned());
                    }
                }
                "author" => {
                    let author = value.parse::<i64>().map_err(|_| {
                        AppError::Validation(format!("Invalid author id: {}", value))
                    })?;
                    filter.author = Some(author);
                }
                "is_favorited" => filter.is_favorited = parse_flag(&value),
                "is_in_shopping_cart" => filter.is_in_shopping_cart = parse_flag(&value),
                _ => {}
            }
        }

        Ok(filter)
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "1" | "true")
}
