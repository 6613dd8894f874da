use async_trait::async_trait;

use super::PgStore;
use crate::{
    error::{Error, QueryError},
    schema::{CartIngredient, Uuid},
    store::CartStore,
};

#[async_trait]
impl CartStore for PgStore {
    async fn cart_size(&self, user_id: Uuid) -> Result<i64, Error> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM shopping_cart WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(QueryError::from)?;

        Ok(count.0)
    }

    async fn cart_ingredients(&self, user_id: Uuid) -> Result<Vec<CartIngredient>, Error> {
        let rows: Vec<CartIngredient> = sqlx::query_as(
            "
            SELECT i.name AS name, i.measurement_unit AS measurement_unit, ri.amount AS amount, r.image AS image
            FROM shopping_cart c
            INNER JOIN recipes r ON r.id = c.recipe_id
            INNER JOIN recipe_ingredients ri ON ri.recipe_id = r.id
            INNER JOIN ingredients i ON i.id = ri.ingredient_id
            WHERE c.user_id = $1
            ORDER BY c.id DESC, ri.id
        ",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(QueryError::from)?;

        Ok(rows)
    }
}
