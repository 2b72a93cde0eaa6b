use serde::{Deserialize, Serialize};

use super::recipe::RecipeShortResponse;
use super::user::UserProfile;
use crate::error::{AppError, AppResult};

/// An author as listed on the subscriptions page: profile, a preview of their
/// recipes and how many they have in total.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionResponse {
    #[serde(flatten)]
    pub author: UserProfile,
    pub recipes: Vec<RecipeShortResponse>,
    pub recipes_count: i64,
}

#[derive(Debug, Deserialize)]
pub struct RecipesLimitQuery {
    pub recipes_limit: Option<String>,
}

impl RecipesLimitQuery {
    pub fn parse(&self) -> AppResult<Option<i64>> {
        parse_recipes_limit(self.recipes_limit.as_deref())
    }
}

pub fn parse_recipes_limit(value: Option<&str>) -> AppResult<Option<i64>> {
    match value {
        None | Some("") => Ok(None),
        Some(raw) => raw
            .parse::<i64>()
            .ok()
            .filter(|limit| *limit >= 0)
            .map(Some)
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "recipes_limit must be a non-negative integer, got {}",
                    raw
                ))
            }),
    }
}
