//! Storage capabilities the core operations are written against.
//!
//! [`PgStore`](crate::actions::PgStore) is the production backend,
//! [`MemoryStore`](crate::memory::MemoryStore) keeps everything in process.

use async_trait::async_trait;
use serde::Serialize;

use super::{
    error::Error,
    form::{IngredientRecord, NewRecipe, TagRecord},
    pagination::{PageContext, PageQuery},
    schema::{
        Author, CartIngredient, Ingredient, RecipeDetail, RecipeFilter, RecipeShort, Tag, User,
        UserProfile, Uuid,
    },
};
use crate::authentication::permissions::ActionType;

/// A per-user link table with a unique (owner, target) pair.
pub trait Relation: Send + Sync + 'static {
    const TABLE: &'static str;
    const OWNER_COLUMN: &'static str;
    const TARGET_COLUMN: &'static str;

    const ACTION: ActionType;
    const TARGET_MISSING: &'static str;
    const ALREADY_PRESENT: &'static str;
    const NOT_PRESENT: &'static str;

    /// Projection handed back after a successful add.
    type Target: Serialize + Send + Sync;

    fn check(_owner: Uuid, _target: Uuid) -> Result<(), Error> {
        Ok(())
    }

    fn linked(target: Self::Target) -> Self::Target {
        target
    }
}

pub struct Favorite;
pub struct ShoppingCart;
pub struct Subscription;

impl Relation for Favorite {
    const TABLE: &'static str = "favorites";
    const OWNER_COLUMN: &'static str = "user_id";
    const TARGET_COLUMN: &'static str = "recipe_id";

    const ACTION: ActionType = ActionType::ManageOwnFavorites;
    const TARGET_MISSING: &'static str = "No recipe exists with specified id";
    const ALREADY_PRESENT: &'static str = "Recipe is already in favorites";
    const NOT_PRESENT: &'static str = "Recipe is not in favorites";

    type Target = RecipeShort;
}

impl Relation for ShoppingCart {
    const TABLE: &'static str = "shopping_cart";
    const OWNER_COLUMN: &'static str = "user_id";
    const TARGET_COLUMN: &'static str = "recipe_id";

    const ACTION: ActionType = ActionType::ManageOwnShoppingCart;
    const TARGET_MISSING: &'static str = "No recipe exists with specified id";
    const ALREADY_PRESENT: &'static str = "Recipe is already in the shopping cart";
    const NOT_PRESENT: &'static str = "Recipe is not in the shopping cart";

    type Target = RecipeShort;
}

impl Relation for Subscription {
    const TABLE: &'static str = "subscriptions";
    const OWNER_COLUMN: &'static str = "user_id";
    const TARGET_COLUMN: &'static str = "author_id";

    const ACTION: ActionType = ActionType::ManageOwnSubscriptions;
    const TARGET_MISSING: &'static str = "No user exists with specified id";
    const ALREADY_PRESENT: &'static str = "Already subscribed to this author";
    const NOT_PRESENT: &'static str = "Not subscribed to this author";

    type Target = Author;

    fn check(owner: Uuid, target: Uuid) -> Result<(), Error> {
        if owner == target {
            return Err(Error::BadRequest(String::from(
                "Cannot subscribe to yourself",
            )));
        }
        Ok(())
    }

    fn linked(mut target: Author) -> Author {
        target.profile.is_subscribed = true;
        target
    }
}

#[async_trait]
pub trait RelationStore<R: Relation>: Send + Sync {
    async fn find_target(&self, viewer: Uuid, target_id: Uuid)
        -> Result<Option<R::Target>, Error>;

    /// Inserts the pair unless present. `false` means nothing was written.
    async fn insert_if_absent(&self, owner: Uuid, target: Uuid) -> Result<bool, Error>;

    /// Deletes the pair if present. `false` means nothing was removed.
    async fn delete_if_present(&self, owner: Uuid, target: Uuid) -> Result<bool, Error>;
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn list_tags(&self) -> Result<Vec<Tag>, Error>;
    async fn get_tag(&self, id: Uuid) -> Result<Option<Tag>, Error>;
    async fn get_or_create_tag(&self, record: &TagRecord) -> Result<(Tag, bool), Error>;

    async fn list_ingredients(&self, name_prefix: Option<&str>) -> Result<Vec<Ingredient>, Error>;
    async fn get_ingredient(&self, id: Uuid) -> Result<Option<Ingredient>, Error>;
    async fn get_or_create_ingredient(
        &self,
        record: &IngredientRecord,
    ) -> Result<(Ingredient, bool), Error>;
}

#[async_trait]
pub trait RecipeStore: Send + Sync {
    /// Creates the recipe with its ingredient and tag rows as one unit.
    async fn create_recipe(&self, author_id: Uuid, recipe: &NewRecipe) -> Result<Uuid, Error>;
    /// Replaces content, ingredient rows and tags as one unit.
    async fn update_recipe(&self, id: Uuid, recipe: &NewRecipe) -> Result<(), Error>;
    async fn delete_recipe(&self, id: Uuid) -> Result<bool, Error>;

    async fn recipe_author(&self, id: Uuid) -> Result<Option<Uuid>, Error>;
    async fn get_recipe(&self, viewer: Option<Uuid>, id: Uuid)
        -> Result<Option<RecipeDetail>, Error>;
    async fn fetch_recipes(
        &self,
        viewer: Option<Uuid>,
        filter: &RecipeFilter,
        page: &PageQuery,
    ) -> Result<PageContext<RecipeDetail>, Error>;
}

#[async_trait]
pub trait CartStore: Send + Sync {
    async fn cart_size(&self, user_id: Uuid) -> Result<i64, Error>;
    /// Ingredient rows of every carted recipe, newest cart entry first.
    async fn cart_ingredients(&self, user_id: Uuid) -> Result<Vec<CartIngredient>, Error>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, Error>;
    async fn get_profile(&self, viewer: Option<Uuid>, id: Uuid)
        -> Result<Option<UserProfile>, Error>;
    async fn list_subscriptions(
        &self,
        user_id: Uuid,
        page: &PageQuery,
        recipes_limit: Option<i64>,
    ) -> Result<PageContext<Author>, Error>;
}

/// Everything the HTTP surface needs from a backend.
pub trait Store:
    CatalogStore
    + RecipeStore
    + CartStore
    + UserStore
    + RelationStore<Favorite>
    + RelationStore<ShoppingCart>
    + RelationStore<Subscription>
    + 'static
{
}

impl<T> Store for T where
    T: CatalogStore
        + RecipeStore
        + CartStore
        + UserStore
        + RelationStore<Favorite>
        + RelationStore<ShoppingCart>
        + RelationStore<Subscription>
        + 'static
{
}
