use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder, Transaction};

use super::{users::fetch_profile, PgStore};
use crate::{
    error::{Error, QueryError},
    form::NewRecipe,
    pagination::{PageContext, PageQuery},
    schema::{Recipe, RecipeDetail, RecipeFilter, RecipeIngredient, Tag, Uuid},
    store::RecipeStore,
};

#[derive(sqlx::FromRow)]
struct RecipeRowPartial {
    #[sqlx(flatten)]
    recipe: Recipe,
    count: i64,
}

async fn insert_parts(
    tx: &mut Transaction<'_, Postgres>,
    recipe_id: Uuid,
    recipe: &NewRecipe,
) -> Result<(), Error> {
    if !recipe.ingredients.is_empty() {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) ");
        builder.push_values(recipe.ingredients.iter(), |mut row, (ingredient_id, amount)| {
            row.push_bind(recipe_id)
                .push_bind(*ingredient_id)
                .push_bind(*amount);
        });
        builder
            .build()
            .execute(&mut **tx)
            .await
            .map_err(QueryError::from)?;
    }

    if !recipe.tags.is_empty() {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO recipe_tags (recipe_id, tag_id) ");
        builder.push_values(recipe.tags.iter(), |mut row, tag_id| {
            row.push_bind(recipe_id).push_bind(*tag_id);
        });
        builder
            .build()
            .execute(&mut **tx)
            .await
            .map_err(QueryError::from)?;
    }

    Ok(())
}

fn push_recipe_filter(
    builder: &mut QueryBuilder<'_, Postgres>,
    viewer: Option<Uuid>,
    filter: &RecipeFilter,
) {
    if let Some(author) = filter.author {
        builder.push(" AND r.author_id = ").push_bind(author);
    }
    if !filter.tags.is_empty() {
        builder
            .push(
                " AND EXISTS (SELECT 1 FROM recipe_tags rt INNER JOIN tags t ON t.id = rt.tag_id WHERE rt.recipe_id = r.id AND t.slug = ANY(",
            )
            .push_bind(filter.tags.clone())
            .push("))");
    }
    if let (true, Some(viewer)) = (filter.is_favorited, viewer) {
        builder
            .push(" AND EXISTS (SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = ")
            .push_bind(viewer)
            .push(")");
    }
    if let (true, Some(viewer)) = (filter.is_in_shopping_cart, viewer) {
        builder
            .push(" AND EXISTS (SELECT 1 FROM shopping_cart c WHERE c.recipe_id = r.id AND c.user_id = ")
            .push_bind(viewer)
            .push(")");
    }
}

impl PgStore {
    /// Matching rows regardless of page, for requests that page past the end.
    async fn count_recipes(&self, viewer: Option<Uuid>, filter: &RecipeFilter) -> Result<i64, Error> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM recipes r WHERE TRUE");
        push_recipe_filter(&mut builder, viewer, filter);

        let count: (i64,) = builder
            .build_query_as()
            .fetch_one(&self.pool)
            .await
            .map_err(QueryError::from)?;

        Ok(count.0)
    }

    async fn list_recipe_ingredients(&self, recipe_id: Uuid) -> Result<Vec<RecipeIngredient>, Error> {
        let rows: Vec<RecipeIngredient> = sqlx::query_as(
            "
            SELECT i.id AS id, i.name AS name, i.measurement_unit AS measurement_unit, ri.amount AS amount
            FROM recipe_ingredients ri
            INNER JOIN ingredients i ON i.id = ri.ingredient_id
            WHERE ri.recipe_id = $1
            ORDER BY ri.id
        ",
        )
        .bind(recipe_id)
        .fetch_all(&self.pool)
        .await
        .map_err(QueryError::from)?;

        Ok(rows)
    }

    async fn list_recipe_tags(&self, recipe_id: Uuid) -> Result<Vec<Tag>, Error> {
        let rows: Vec<Tag> = sqlx::query_as(
            "
            SELECT t.* FROM recipe_tags rt
            INNER JOIN tags t ON t.id = rt.tag_id
            WHERE rt.recipe_id = $1
            ORDER BY t.name
        ",
        )
        .bind(recipe_id)
        .fetch_all(&self.pool)
        .await
        .map_err(QueryError::from)?;

        Ok(rows)
    }

    async fn recipe_flags(&self, viewer: Option<Uuid>, recipe_id: Uuid) -> Result<(bool, bool), Error> {
        let Some(viewer) = viewer else {
            return Ok((false, false));
        };

        let flags: (bool, bool) = sqlx::query_as(
            "
            SELECT
                EXISTS (SELECT 1 FROM favorites WHERE user_id = $1 AND recipe_id = $2),
                EXISTS (SELECT 1 FROM shopping_cart WHERE user_id = $1 AND recipe_id = $2)
        ",
        )
        .bind(viewer)
        .bind(recipe_id)
        .fetch_one(&self.pool)
        .await
        .map_err(QueryError::from)?;

        Ok(flags)
    }

    async fn recipe_detail(&self, viewer: Option<Uuid>, recipe: Recipe) -> Result<RecipeDetail, Error> {
        let author = fetch_profile(&self.pool, viewer, recipe.author_id)
            .await?
            .ok_or_else(|| Error::not_found("Recipe author no longer exists"))?;
        let tags = self.list_recipe_tags(recipe.id).await?;
        let ingredients = self.list_recipe_ingredients(recipe.id).await?;
        let (is_favorited, is_in_shopping_cart) = self.recipe_flags(viewer, recipe.id).await?;

        Ok(RecipeDetail {
            id: recipe.id,
            author,
            name: recipe.name,
            text: recipe.text,
            image: recipe.image,
            cooking_time: recipe.cooking_time,
            tags,
            ingredients,
            is_favorited,
            is_in_shopping_cart,
        })
    }
}

#[async_trait]
impl RecipeStore for PgStore {
    async fn create_recipe(&self, author_id: Uuid, recipe: &NewRecipe) -> Result<Uuid, Error> {
        let mut tx = self.pool.begin().await.map_err(QueryError::from)?;

        let id: (Uuid,) = sqlx::query_as(
            "
            INSERT INTO recipes (author_id, name, text, image, cooking_time)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
        ",
        )
        .bind(author_id)
        .bind(&recipe.name)
        .bind(&recipe.text)
        .bind(&recipe.image)
        .bind(recipe.cooking_time)
        .fetch_one(&mut *tx)
        .await
        .map_err(QueryError::from)?;

        insert_parts(&mut tx, id.0, recipe).await?;
        tx.commit().await.map_err(QueryError::from)?;

        Ok(id.0)
    }

    async fn update_recipe(&self, id: Uuid, recipe: &NewRecipe) -> Result<(), Error> {
        let mut tx = self.pool.begin().await.map_err(QueryError::from)?;

        let result = sqlx::query(
            "UPDATE recipes SET name = $1, text = $2, image = $3, cooking_time = $4 WHERE id = $5",
        )
        .bind(&recipe.name)
        .bind(&recipe.text)
        .bind(&recipe.image)
        .bind(recipe.cooking_time)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(QueryError::from)?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found("No recipe exists with specified id"));
        }

        sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(QueryError::from)?;
        sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(QueryError::from)?;

        insert_parts(&mut tx, id, recipe).await?;
        tx.commit().await.map_err(QueryError::from)?;

        Ok(())
    }

    async fn delete_recipe(&self, id: Uuid) -> Result<bool, Error> {
        let result = sqlx::query("DELETE FROM recipes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(QueryError::from)?;

        Ok(result.rows_affected() > 0)
    }

    async fn recipe_author(&self, id: Uuid) -> Result<Option<Uuid>, Error> {
        let row: Option<(Uuid,)> = sqlx::query_as("SELECT author_id FROM recipes WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(QueryError::from)?;

        Ok(row.map(|r| r.0))
    }

    async fn get_recipe(
        &self,
        viewer: Option<Uuid>,
        id: Uuid,
    ) -> Result<Option<RecipeDetail>, Error> {
        let row: Option<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(QueryError::from)?;

        match row {
            Some(recipe) => Ok(Some(self.recipe_detail(viewer, recipe).await?)),
            None => Ok(None),
        }
    }

    async fn fetch_recipes(
        &self,
        viewer: Option<Uuid>,
        filter: &RecipeFilter,
        page: &PageQuery,
    ) -> Result<PageContext<RecipeDetail>, Error> {
        if viewer.is_none() && (filter.is_favorited || filter.is_in_shopping_cart) {
            return Ok(PageContext::no_rows());
        }

        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT r.*, COUNT(*) OVER() AS count FROM recipes r WHERE TRUE");
        push_recipe_filter(&mut builder, viewer, filter);
        builder
            .push(" ORDER BY r.id DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows: Vec<RecipeRowPartial> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(QueryError::from)?;

        let total_count = match rows.first() {
            Some(row) => row.count,
            None if page.page() > 1 => self.count_recipes(viewer, filter).await?,
            None => 0,
        };
        let mut details = Vec::with_capacity(rows.len());
        for row in rows {
            details.push(self.recipe_detail(viewer, row.recipe).await?);
        }

        Ok(PageContext::from_rows(details, total_count, page))
    }
}
