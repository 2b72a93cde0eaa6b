use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Ingredient {
    pub id: i64,
    pub name: String,
    pub measurement_unit: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct IngredientForm {
    #[validate(length(min = 1, max = 200))]
    pub name: String,

    #[validate(length(min = 1, max = 200))]
    pub measurement_unit: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct IngredientUpdateForm {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,

    #[validate(length(min = 1, max = 200))]
    pub measurement_unit: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct IngredientSearchQuery {
    pub name: Option<String>,
}
