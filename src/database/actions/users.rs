use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use super::PgStore;
use crate::{
    error::{Error, QueryError},
    pagination::{PageContext, PageQuery},
    schema::{Author, RecipeShort, User, UserProfile, Uuid},
    store::UserStore,
};

#[derive(sqlx::FromRow)]
struct ProfileRowPartial {
    #[sqlx(flatten)]
    profile: UserProfile,
    count: i64,
}

pub(crate) async fn fetch_profile(
    pool: &Pool<Postgres>,
    viewer: Option<Uuid>,
    user_id: Uuid,
) -> Result<Option<UserProfile>, Error> {
    let row: Option<UserProfile> = sqlx::query_as(
        "
        SELECT u.id, u.email, u.username, u.first_name, u.last_name,
            EXISTS (SELECT 1 FROM subscriptions s WHERE s.author_id = u.id AND s.user_id = $2) AS is_subscribed
        FROM users u
        WHERE u.id = $1
    ",
    )
    .bind(user_id)
    .bind(viewer)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(row)
}

/// Attaches the author's newest recipes (all of them without a limit) and their count.
pub(crate) async fn fetch_author(
    pool: &Pool<Postgres>,
    profile: UserProfile,
    recipes_limit: Option<i64>,
) -> Result<Author, Error> {
    let recipes: Vec<RecipeShort> = sqlx::query_as(
        "SELECT id, name, image, cooking_time FROM recipes WHERE author_id = $1 ORDER BY id DESC LIMIT $2",
    )
    .bind(profile.id)
    .bind(recipes_limit)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM recipes WHERE author_id = $1")
        .bind(profile.id)
        .fetch_one(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(Author {
        profile,
        recipes,
        recipes_count: count.0,
    })
}

#[async_trait]
impl UserStore for PgStore {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, Error> {
        let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(QueryError::from)?;

        Ok(row)
    }

    async fn get_profile(
        &self,
        viewer: Option<Uuid>,
        id: Uuid,
    ) -> Result<Option<UserProfile>, Error> {
        fetch_profile(&self.pool, viewer, id).await
    }

    async fn list_subscriptions(
        &self,
        user_id: Uuid,
        page: &PageQuery,
        recipes_limit: Option<i64>,
    ) -> Result<PageContext<Author>, Error> {
        let rows: Vec<ProfileRowPartial> = sqlx::query_as(
            "
            SELECT u.id, u.email, u.username, u.first_name, u.last_name,
                TRUE AS is_subscribed, COUNT(*) OVER() AS count
            FROM subscriptions s
            INNER JOIN users u ON u.id = s.author_id
            WHERE s.user_id = $1
            ORDER BY s.id DESC
            LIMIT $2 OFFSET $3
        ",
        )
        .bind(user_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(QueryError::from)?;

        let total_count = match rows.first() {
            Some(row) => row.count,
            None if page.page() > 1 => {
                let count: (i64,) =
                    sqlx::query_as("SELECT COUNT(*) FROM subscriptions WHERE user_id = $1")
                        .bind(user_id)
                        .fetch_one(&self.pool)
                        .await
                        .map_err(QueryError::from)?;
                count.0
            }
            None => 0,
        };
        let mut authors = Vec::with_capacity(rows.len());
        for row in rows {
            authors.push(fetch_author(&self.pool, row.profile, recipes_limit).await?);
        }

        Ok(PageContext::from_rows(authors, total_count, page))
    }
}
