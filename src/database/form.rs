use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use super::{error::ValidationError, schema::Uuid};
use crate::constants::{
    HEX_COLOR_PATTERN, INGREDIENT_NAME_MAX_LENGTH, RECIPE_NAME_MAX_LENGTH, SLUG_MAX_LENGTH,
    TAG_NAME_MAX_LENGTH,
};

#[derive(Deserialize, Debug, Clone)]
pub struct IngredientAmountForm {
    pub id: Uuid,
    pub amount: i64,
}

/// Recipe payload of the create and update endpoints.
#[derive(Deserialize, Debug, Clone)]
pub struct RecipeForm {
    pub name: String,
    pub text: String,
    #[serde(default)]
    pub image: Option<String>,
    pub cooking_time: i64,
    pub ingredients: Vec<IngredientAmountForm>,
    pub tags: Vec<Uuid>,
}

/// A recipe that passed validation; amounts fit the storage columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecipe {
    pub name: String,
    pub text: String,
    pub image: Option<String>,
    pub cooking_time: i16,
    pub ingredients: Vec<(Uuid, i16)>,
    pub tags: Vec<Uuid>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct IngredientRecord {
    pub name: String,
    pub measurement_unit: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TagRecord {
    pub name: String,
    pub color: String,
    pub slug: String,
}

fn positive_small_int(field: &str, value: i64) -> Result<i16, ValidationError> {
    if value < 1 {
        return Err(ValidationError::new(field, "must be at least 1"));
    }
    i16::try_from(value).map_err(|_e| ValidationError::new(field, "is too large"))
}

fn bounded_text(field: &str, value: &str, max: usize) -> Result<String, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::new(field, "may not be blank"));
    }
    if value.chars().count() > max {
        return Err(ValidationError::new(field, "is too long"));
    }
    Ok(value.to_string())
}

pub fn is_hex_color(value: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(HEX_COLOR_PATTERN).expect("hex color pattern is valid"))
        .is_match(value)
}

pub fn is_slug(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

impl RecipeForm {
    pub fn validate(self) -> Result<NewRecipe, ValidationError> {
        let name = bounded_text("name", &self.name, RECIPE_NAME_MAX_LENGTH)?;
        let text = self.text.trim();
        if text.is_empty() {
            return Err(ValidationError::new("text", "may not be blank"));
        }
        let cooking_time = positive_small_int("cooking_time", self.cooking_time)?;

        if self.ingredients.is_empty() {
            return Err(ValidationError::new("ingredients", "at least one is required"));
        }
        let mut seen = HashSet::new();
        let mut ingredients = Vec::with_capacity(self.ingredients.len());
        for part in self.ingredients {
            if !seen.insert(part.id) {
                return Err(ValidationError::new(
                    "ingredients",
                    "an ingredient may only be listed once",
                ));
            }
            ingredients.push((part.id, positive_small_int("amount", part.amount)?));
        }

        if self.tags.is_empty() {
            return Err(ValidationError::new("tags", "at least one is required"));
        }
        let mut seen = HashSet::new();
        if !self.tags.iter().all(|tag| seen.insert(*tag)) {
            return Err(ValidationError::new("tags", "a tag may only be listed once"));
        }

        let image = self
            .image
            .map(|image| image.trim().to_string())
            .filter(|image| !image.is_empty());

        Ok(NewRecipe {
            name,
            text: text.to_string(),
            image,
            cooking_time,
            ingredients,
            tags: self.tags,
        })
    }
}

impl IngredientRecord {
    pub fn validate(self) -> Result<Self, ValidationError> {
        Ok(Self {
            name: bounded_text("name", &self.name, INGREDIENT_NAME_MAX_LENGTH)?,
            measurement_unit: bounded_text(
                "measurement_unit",
                &self.measurement_unit,
                INGREDIENT_NAME_MAX_LENGTH,
            )?,
        })
    }
}

impl TagRecord {
    pub fn validate(self) -> Result<Self, ValidationError> {
        let name = bounded_text("name", &self.name, TAG_NAME_MAX_LENGTH)?;
        if !is_hex_color(&self.color) {
            return Err(ValidationError::new("color", "is not a hex color"));
        }
        let slug = bounded_text("slug", &self.slug, SLUG_MAX_LENGTH)?;
        if !is_slug(&slug) {
            return Err(ValidationError::new("slug", "is not a valid slug"));
        }

        Ok(Self {
            name,
            color: self.color,
            slug,
        })
    }
}
