use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use super::{
    users::{fetch_author, fetch_profile},
    PgStore,
};
use crate::{
    error::{Error, QueryError},
    schema::{Author, RecipeShort, Uuid},
    store::{Favorite, Relation, RelationStore, ShoppingCart, Subscription},
};

/// A single statement, so the unique constraint settles concurrent adds.
async fn insert_pair<R: Relation>(
    pool: &Pool<Postgres>,
    owner: Uuid,
    target: Uuid,
) -> Result<bool, Error> {
    let result = sqlx::query(&format!(
        "INSERT INTO {} ({}, {}) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        R::TABLE,
        R::OWNER_COLUMN,
        R::TARGET_COLUMN
    ))
    .bind(owner)
    .bind(target)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(result.rows_affected() > 0)
}

async fn delete_pair<R: Relation>(
    pool: &Pool<Postgres>,
    owner: Uuid,
    target: Uuid,
) -> Result<bool, Error> {
    let result = sqlx::query(&format!(
        "DELETE FROM {} WHERE {} = $1 AND {} = $2",
        R::TABLE,
        R::OWNER_COLUMN,
        R::TARGET_COLUMN
    ))
    .bind(owner)
    .bind(target)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(result.rows_affected() > 0)
}

async fn find_recipe_short(
    pool: &Pool<Postgres>,
    recipe_id: Uuid,
) -> Result<Option<RecipeShort>, Error> {
    let row: Option<RecipeShort> =
        sqlx::query_as("SELECT id, name, image, cooking_time FROM recipes WHERE id = $1")
            .bind(recipe_id)
            .fetch_optional(pool)
            .await
            .map_err(QueryError::from)?;

    Ok(row)
}

#[async_trait]
impl RelationStore<Favorite> for PgStore {
    async fn find_target(&self, _viewer: Uuid, target_id: Uuid) -> Result<Option<RecipeShort>, Error> {
        find_recipe_short(&self.pool, target_id).await
    }

    async fn insert_if_absent(&self, owner: Uuid, target: Uuid) -> Result<bool, Error> {
        insert_pair::<Favorite>(&self.pool, owner, target).await
    }

    async fn delete_if_present(&self, owner: Uuid, target: Uuid) -> Result<bool, Error> {
        delete_pair::<Favorite>(&self.pool, owner, target).await
    }
}

#[async_trait]
impl RelationStore<ShoppingCart> for PgStore {
    async fn find_target(&self, _viewer: Uuid, target_id: Uuid) -> Result<Option<RecipeShort>, Error> {
        find_recipe_short(&self.pool, target_id).await
    }

    async fn insert_if_absent(&self, owner: Uuid, target: Uuid) -> Result<bool, Error> {
        insert_pair::<ShoppingCart>(&self.pool, owner, target).await
    }

    async fn delete_if_present(&self, owner: Uuid, target: Uuid) -> Result<bool, Error> {
        delete_pair::<ShoppingCart>(&self.pool, owner, target).await
    }
}

#[async_trait]
impl RelationStore<Subscription> for PgStore {
    async fn find_target(&self, viewer: Uuid, target_id: Uuid) -> Result<Option<Author>, Error> {
        match fetch_profile(&self.pool, Some(viewer), target_id).await? {
            Some(profile) => Ok(Some(fetch_author(&self.pool, profile, None).await?)),
            None => Ok(None),
        }
    }

    async fn insert_if_absent(&self, owner: Uuid, target: Uuid) -> Result<bool, Error> {
        insert_pair::<Subscription>(&self.pool, owner, target).await
    }

    async fn delete_if_present(&self, owner: Uuid, target: Uuid) -> Result<bool, Error> {
        delete_pair::<Subscription>(&self.pool, owner, target).await
    }
}
