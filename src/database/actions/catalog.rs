use async_trait::async_trait;

use super::PgStore;
use crate::{
    error::{Error, QueryError},
    form::{IngredientRecord, TagRecord},
    schema::{Ingredient, Tag, Uuid},
    store::CatalogStore,
};

/// Escapes LIKE wildcards so user input only ever matches literally.
pub(crate) fn like_prefix(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.to_lowercase().chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn list_tags(&self) -> Result<Vec<Tag>, Error> {
        let list: Vec<Tag> = sqlx::query_as("SELECT * FROM tags ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(QueryError::from)?;

        Ok(list)
    }

    async fn get_tag(&self, id: Uuid) -> Result<Option<Tag>, Error> {
        let tag: Option<Tag> = sqlx::query_as("SELECT * FROM tags WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(QueryError::from)?;

        Ok(tag)
    }

    async fn get_or_create_tag(&self, record: &TagRecord) -> Result<(Tag, bool), Error> {
        let created: Option<Tag> = sqlx::query_as(
            "INSERT INTO tags (name, color, slug) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING RETURNING *",
        )
        .bind(&record.name)
        .bind(&record.color)
        .bind(&record.slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(QueryError::from)?;

        if let Some(tag) = created {
            return Ok((tag, true));
        }

        let existing: Option<Tag> = sqlx::query_as("SELECT * FROM tags WHERE name = $1")
            .bind(&record.name)
            .fetch_optional(&self.pool)
            .await
            .map_err(QueryError::from)?;

        existing.map(|tag| (tag, false)).ok_or_else(|| {
            Error::Conflict(format!(
                "Tag {} clashes with an existing color or slug",
                record.name
            ))
        })
    }

    async fn list_ingredients(&self, name_prefix: Option<&str>) -> Result<Vec<Ingredient>, Error> {
        let list: Vec<Ingredient> = match name_prefix {
            Some(prefix) => sqlx::query_as(
                "SELECT * FROM ingredients WHERE LOWER(name) LIKE $1 ORDER BY name, measurement_unit",
            )
            .bind(like_prefix(prefix))
            .fetch_all(&self.pool)
            .await
            .map_err(QueryError::from)?,
            None => sqlx::query_as("SELECT * FROM ingredients ORDER BY name, measurement_unit")
                .fetch_all(&self.pool)
                .await
                .map_err(QueryError::from)?,
        };

        Ok(list)
    }

    async fn get_ingredient(&self, id: Uuid) -> Result<Option<Ingredient>, Error> {
        let ingredient: Option<Ingredient> =
            sqlx::query_as("SELECT * FROM ingredients WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(QueryError::from)?;

        Ok(ingredient)
    }

    async fn get_or_create_ingredient(
        &self,
        record: &IngredientRecord,
    ) -> Result<(Ingredient, bool), Error> {
        let created: Option<Ingredient> = sqlx::query_as(
            "
            INSERT INTO ingredients (name, measurement_unit)
            VALUES ($1, $2)
            ON CONFLICT (name, measurement_unit) DO NOTHING RETURNING *
        ",
        )
        .bind(&record.name)
        .bind(&record.measurement_unit)
        .fetch_optional(&self.pool)
        .await
        .map_err(QueryError::from)?;

        if let Some(ingredient) = created {
            return Ok((ingredient, true));
        }

        let existing: Ingredient = sqlx::query_as(
            "SELECT * FROM ingredients WHERE name = $1 AND measurement_unit = $2",
        )
        .bind(&record.name)
        .bind(&record.measurement_unit)
        .fetch_one(&self.pool)
        .await
        .map_err(QueryError::from)?;

        Ok((existing, false))
    }
}
