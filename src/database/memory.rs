use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{
    error::Error,
    form::{IngredientRecord, NewRecipe, TagRecord},
    pagination::{PageContext, PageQuery},
    schema::{
        Author, CartIngredient, Ingredient, Recipe, RecipeDetail, RecipeFilter, RecipeIngredient,
        RecipeShort, Tag, User, UserProfile, UserRole, Uuid,
    },
    store::{
        CartStore, CatalogStore, Favorite, Relation, RelationStore, RecipeStore, ShoppingCart,
        Subscription, UserStore,
    },
};

#[derive(Default)]
struct State {
    sequences: HashMap<&'static str, Uuid>,
    users: BTreeMap<Uuid, User>,
    tags: BTreeMap<Uuid, Tag>,
    ingredients: BTreeMap<Uuid, Ingredient>,
    recipes: BTreeMap<Uuid, Recipe>,
    // (recipe, ingredient, amount) in insertion order
    recipe_ingredients: Vec<(Uuid, Uuid, i16)>,
    recipe_tags: Vec<(Uuid, Uuid)>,
    // (owner, target) per relation table, oldest first
    relations: HashMap<&'static str, Vec<(Uuid, Uuid)>>,
}

impl State {
    fn next_id(&mut self, table: &'static str) -> Uuid {
        let id = self.sequences.entry(table).or_insert(0);
        *id += 1;
        *id
    }

    fn pairs(&self, table: &'static str) -> &[(Uuid, Uuid)] {
        self.relations.get(table).map(Vec::as_slice).unwrap_or(&[])
    }

    fn has_pair<R: Relation>(&self, owner: Uuid, target: Uuid) -> bool {
        self.pairs(R::TABLE).contains(&(owner, target))
    }

    fn insert_pair<R: Relation>(&mut self, owner: Uuid, target: Uuid) -> bool {
        let pairs = self.relations.entry(R::TABLE).or_default();
        if pairs.contains(&(owner, target)) {
            return false;
        }
        pairs.push((owner, target));
        true
    }

    fn delete_pair<R: Relation>(&mut self, owner: Uuid, target: Uuid) -> bool {
        let Some(pairs) = self.relations.get_mut(R::TABLE) else {
            return false;
        };
        let before = pairs.len();
        pairs.retain(|pair| *pair != (owner, target));
        pairs.len() < before
    }

    fn profile(&self, viewer: Option<Uuid>, user_id: Uuid) -> Option<UserProfile> {
        let user = self.users.get(&user_id)?;
        let is_subscribed = viewer
            .map(|viewer| self.has_pair::<Subscription>(viewer, user_id))
            .unwrap_or(false);

        Some(UserProfile::from_user(user, is_subscribed))
    }

    fn author(&self, profile: UserProfile, recipes_limit: Option<i64>) -> Author {
        let recipes: Vec<RecipeShort> = self
            .recipes
            .values()
            .rev()
            .filter(|recipe| recipe.author_id == profile.id)
            .map(RecipeShort::from)
            .collect();
        let recipes_count = recipes.len() as i64;
        let recipes = match recipes_limit {
            Some(limit) => recipes
                .into_iter()
                .take(usize::try_from(limit).unwrap_or(0))
                .collect(),
            None => recipes,
        };

        Author {
            profile,
            recipes,
            recipes_count,
        }
    }

    fn detail(&self, viewer: Option<Uuid>, recipe: &Recipe) -> Result<RecipeDetail, Error> {
        let author = self
            .profile(viewer, recipe.author_id)
            .ok_or_else(|| Error::not_found("Recipe author no longer exists"))?;

        let mut tags: Vec<Tag> = self
            .recipe_tags
            .iter()
            .filter(|(recipe_id, _)| *recipe_id == recipe.id)
            .filter_map(|(_, tag_id)| self.tags.get(tag_id).cloned())
            .collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));

        let ingredients = self
            .recipe_ingredients
            .iter()
            .filter(|(recipe_id, _, _)| *recipe_id == recipe.id)
            .filter_map(|(_, ingredient_id, amount)| {
                self.ingredients
                    .get(ingredient_id)
                    .map(|ingredient| RecipeIngredient {
                        id: ingredient.id,
                        name: ingredient.name.to_owned(),
                        measurement_unit: ingredient.measurement_unit.to_owned(),
                        amount: *amount,
                    })
            })
            .collect();

        let (is_favorited, is_in_shopping_cart) = match viewer {
            Some(viewer) => (
                self.has_pair::<Favorite>(viewer, recipe.id),
                self.has_pair::<ShoppingCart>(viewer, recipe.id),
            ),
            None => (false, false),
        };

        Ok(RecipeDetail {
            id: recipe.id,
            author,
            name: recipe.name.to_owned(),
            text: recipe.text.to_owned(),
            image: recipe.image.to_owned(),
            cooking_time: recipe.cooking_time,
            tags,
            ingredients,
            is_favorited,
            is_in_shopping_cart,
        })
    }

    fn check_parts(&self, recipe: &NewRecipe) -> Result<(), Error> {
        if let Some((id, _)) = recipe
            .ingredients
            .iter()
            .find(|(id, _)| !self.ingredients.contains_key(id))
        {
            return Err(Error::NotFound(format!("No ingredient exists with id {id}")));
        }
        if let Some(id) = recipe.tags.iter().find(|id| !self.tags.contains_key(id)) {
            return Err(Error::NotFound(format!("No tag exists with id {id}")));
        }
        Ok(())
    }

    fn replace_parts(&mut self, recipe_id: Uuid, recipe: &NewRecipe) {
        self.recipe_ingredients.retain(|(id, _, _)| *id != recipe_id);
        self.recipe_tags.retain(|(id, _)| *id != recipe_id);
        self.recipe_ingredients.extend(
            recipe
                .ingredients
                .iter()
                .map(|(ingredient_id, amount)| (recipe_id, *ingredient_id, *amount)),
        );
        self.recipe_tags
            .extend(recipe.tags.iter().map(|tag_id| (recipe_id, *tag_id)));
    }

    fn remove_recipe(&mut self, recipe_id: Uuid) -> bool {
        if self.recipes.remove(&recipe_id).is_none() {
            return false;
        }
        self.recipe_ingredients.retain(|(id, _, _)| *id != recipe_id);
        self.recipe_tags.retain(|(id, _)| *id != recipe_id);
        for table in [Favorite::TABLE, ShoppingCart::TABLE] {
            if let Some(pairs) = self.relations.get_mut(table) {
                pairs.retain(|(_, target)| *target != recipe_id);
            }
        }
        true
    }
}

/// In-process backend with the same uniqueness and cascade rules as the schema.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create_user(
        &self,
        username: &str,
        email: &str,
        first_name: &str,
        last_name: &str,
        role: UserRole,
    ) -> Result<User, Error> {
        let mut state = self.state.lock().await;
        if state
            .users
            .values()
            .any(|user| user.username == username || user.email == email)
        {
            return Err(Error::Conflict(String::from(
                "A user with that username or email already exists",
            )));
        }

        let user = User {
            id: state.next_id("users"),
            email: email.to_string(),
            username: username.to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            role,
        };
        state.users.insert(user.id, user.clone());

        Ok(user)
    }

    /// Removes the user together with their recipes and relation rows.
    pub async fn delete_user(&self, id: Uuid) -> bool {
        let mut state = self.state.lock().await;
        if state.users.remove(&id).is_none() {
            return false;
        }

        let owned: Vec<Uuid> = state
            .recipes
            .values()
            .filter(|recipe| recipe.author_id == id)
            .map(|recipe| recipe.id)
            .collect();
        for recipe_id in owned {
            state.remove_recipe(recipe_id);
        }
        for pairs in state.relations.values_mut() {
            pairs.retain(|(owner, _)| *owner != id);
        }
        if let Some(pairs) = state.relations.get_mut(Subscription::TABLE) {
            pairs.retain(|(_, author)| *author != id);
        }
        true
    }

    /// Rows of one relation table, oldest first.
    pub async fn relation_rows<R: Relation>(&self) -> Vec<(Uuid, Uuid)> {
        self.state.lock().await.pairs(R::TABLE).to_vec()
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn list_tags(&self) -> Result<Vec<Tag>, Error> {
        let state = self.state.lock().await;
        let mut tags: Vec<Tag> = state.tags.values().cloned().collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(tags)
    }

    async fn get_tag(&self, id: Uuid) -> Result<Option<Tag>, Error> {
        Ok(self.state.lock().await.tags.get(&id).cloned())
    }

    async fn get_or_create_tag(&self, record: &TagRecord) -> Result<(Tag, bool), Error> {
        let mut state = self.state.lock().await;
        if let Some(tag) = state.tags.values().find(|tag| tag.name == record.name) {
            return Ok((tag.clone(), false));
        }
        if state
            .tags
            .values()
            .any(|tag| tag.color == record.color || tag.slug == record.slug)
        {
            return Err(Error::Conflict(format!(
                "Tag {} clashes with an existing color or slug",
                record.name
            )));
        }

        let tag = Tag {
            id: state.next_id("tags"),
            name: record.name.to_owned(),
            color: record.color.to_owned(),
            slug: record.slug.to_owned(),
        };
        state.tags.insert(tag.id, tag.clone());

        Ok((tag, true))
    }

    async fn list_ingredients(&self, name_prefix: Option<&str>) -> Result<Vec<Ingredient>, Error> {
        let prefix = name_prefix.map(str::to_lowercase);
        let state = self.state.lock().await;
        let mut ingredients: Vec<Ingredient> = state
            .ingredients
            .values()
            .filter(|ingredient| match &prefix {
                Some(prefix) => ingredient.name.to_lowercase().starts_with(prefix.as_str()),
                None => true,
            })
            .cloned()
            .collect();
        ingredients.sort_by(|a, b| {
            (&a.name, &a.measurement_unit).cmp(&(&b.name, &b.measurement_unit))
        });

        Ok(ingredients)
    }

    async fn get_ingredient(&self, id: Uuid) -> Result<Option<Ingredient>, Error> {
        Ok(self.state.lock().await.ingredients.get(&id).cloned())
    }

    async fn get_or_create_ingredient(
        &self,
        record: &IngredientRecord,
    ) -> Result<(Ingredient, bool), Error> {
        let mut state = self.state.lock().await;
        if let Some(ingredient) = state.ingredients.values().find(|ingredient| {
            ingredient.name == record.name && ingredient.measurement_unit == record.measurement_unit
        }) {
            return Ok((ingredient.clone(), false));
        }

        let ingredient = Ingredient {
            id: state.next_id("ingredients"),
            name: record.name.to_owned(),
            measurement_unit: record.measurement_unit.to_owned(),
        };
        state.ingredients.insert(ingredient.id, ingredient.clone());

        Ok((ingredient, true))
    }
}

#[async_trait]
impl RecipeStore for MemoryStore {
    async fn create_recipe(&self, author_id: Uuid, recipe: &NewRecipe) -> Result<Uuid, Error> {
        let mut state = self.state.lock().await;
        if !state.users.contains_key(&author_id) {
            return Err(Error::not_found("No user exists with specified id"));
        }
        state.check_parts(recipe)?;

        let id = state.next_id("recipes");
        state.recipes.insert(
            id,
            Recipe {
                id,
                author_id,
                name: recipe.name.to_owned(),
                text: recipe.text.to_owned(),
                image: recipe.image.to_owned(),
                cooking_time: recipe.cooking_time,
            },
        );
        state.replace_parts(id, recipe);

        Ok(id)
    }

    async fn update_recipe(&self, id: Uuid, recipe: &NewRecipe) -> Result<(), Error> {
        let mut state = self.state.lock().await;
        state.check_parts(recipe)?;

        let stored = state
            .recipes
            .get_mut(&id)
            .ok_or_else(|| Error::not_found("No recipe exists with specified id"))?;
        stored.name = recipe.name.to_owned();
        stored.text = recipe.text.to_owned();
        stored.image = recipe.image.to_owned();
        stored.cooking_time = recipe.cooking_time;
        state.replace_parts(id, recipe);

        Ok(())
    }

    async fn delete_recipe(&self, id: Uuid) -> Result<bool, Error> {
        Ok(self.state.lock().await.remove_recipe(id))
    }

    async fn recipe_author(&self, id: Uuid) -> Result<Option<Uuid>, Error> {
        Ok(self
            .state
            .lock()
            .await
            .recipes
            .get(&id)
            .map(|recipe| recipe.author_id))
    }

    async fn get_recipe(
        &self,
        viewer: Option<Uuid>,
        id: Uuid,
    ) -> Result<Option<RecipeDetail>, Error> {
        let state = self.state.lock().await;
        match state.recipes.get(&id) {
            Some(recipe) => Ok(Some(state.detail(viewer, recipe)?)),
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

        let state = self.state.lock().await;
        let matching: Vec<&Recipe> = state
            .recipes
            .values()
            .rev()
            .filter(|recipe| filter.author.map_or(true, |author| recipe.author_id == author))
            .filter(|recipe| {
                filter.tags.is_empty()
                    || state.recipe_tags.iter().any(|(recipe_id, tag_id)| {
                        *recipe_id == recipe.id
                            && state
                                .tags
                                .get(tag_id)
                                .is_some_and(|tag| filter.tags.contains(&tag.slug))
                    })
            })
            .filter(|recipe| match viewer {
                Some(viewer) => {
                    (!filter.is_favorited || state.has_pair::<Favorite>(viewer, recipe.id))
                        && (!filter.is_in_shopping_cart
                            || state.has_pair::<ShoppingCart>(viewer, recipe.id))
                }
                None => true,
            })
            .collect();

        let total_count = matching.len() as i64;
        let results = matching
            .into_iter()
            .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
            .take(page.limit() as usize)
            .map(|recipe| state.detail(viewer, recipe))
            .collect::<Result<Vec<_>, Error>>()?;

        Ok(PageContext::from_rows(results, total_count, page))
    }
}

#[async_trait]
impl CartStore for MemoryStore {
    async fn cart_size(&self, user_id: Uuid) -> Result<i64, Error> {
        let state = self.state.lock().await;
        let count = state
            .pairs(ShoppingCart::TABLE)
            .iter()
            .filter(|(owner, _)| *owner == user_id)
            .count();

        Ok(count as i64)
    }

    async fn cart_ingredients(&self, user_id: Uuid) -> Result<Vec<CartIngredient>, Error> {
        let state = self.state.lock().await;
        let mut rows = Vec::new();
        for (_, recipe_id) in state
            .pairs(ShoppingCart::TABLE)
            .iter()
            .rev()
            .filter(|(owner, _)| *owner == user_id)
        {
            let Some(recipe) = state.recipes.get(recipe_id) else {
                continue;
            };
            for (_, ingredient_id, amount) in state
                .recipe_ingredients
                .iter()
                .filter(|(id, _, _)| id == recipe_id)
            {
                if let Some(ingredient) = state.ingredients.get(ingredient_id) {
                    rows.push(CartIngredient {
                        name: ingredient.name.to_owned(),
                        measurement_unit: ingredient.measurement_unit.to_owned(),
                        amount: *amount,
                        image: recipe.image.to_owned(),
                    });
                }
            }
        }

        Ok(rows)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, Error> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }

    async fn get_profile(
        &self,
        viewer: Option<Uuid>,
        id: Uuid,
    ) -> Result<Option<UserProfile>, Error> {
        Ok(self.state.lock().await.profile(viewer, id))
    }

    async fn list_subscriptions(
        &self,
        user_id: Uuid,
        page: &PageQuery,
        recipes_limit: Option<i64>,
    ) -> Result<PageContext<Author>, Error> {
        let state = self.state.lock().await;
        let authors: Vec<Uuid> = state
            .pairs(Subscription::TABLE)
            .iter()
            .rev()
            .filter(|(owner, _)| *owner == user_id)
            .map(|(_, author)| *author)
            .collect();

        let total_count = authors.len() as i64;
        let results = authors
            .into_iter()
            .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
            .take(page.limit() as usize)
            .filter_map(|author| state.profile(Some(user_id), author))
            .map(|profile| state.author(profile, recipes_limit))
            .collect();

        Ok(PageContext::from_rows(results, total_count, page))
    }
}

fn recipe_short(state: &State, recipe_id: Uuid) -> Option<RecipeShort> {
    state.recipes.get(&recipe_id).map(RecipeShort::from)
}

#[async_trait]
impl RelationStore<Favorite> for MemoryStore {
    async fn find_target(&self, _viewer: Uuid, target_id: Uuid) -> Result<Option<RecipeShort>, Error> {
        Ok(recipe_short(&*self.state.lock().await, target_id))
    }

    async fn insert_if_absent(&self, owner: Uuid, target: Uuid) -> Result<bool, Error> {
        let mut state = self.state.lock().await;
        if !state.recipes.contains_key(&target) || !state.users.contains_key(&owner) {
            return Err(Error::not_found(Favorite::TARGET_MISSING));
        }
        Ok(state.insert_pair::<Favorite>(owner, target))
    }

    async fn delete_if_present(&self, owner: Uuid, target: Uuid) -> Result<bool, Error> {
        Ok(self.state.lock().await.delete_pair::<Favorite>(owner, target))
    }
}

#[async_trait]
impl RelationStore<ShoppingCart> for MemoryStore {
    async fn find_target(&self, _viewer: Uuid, target_id: Uuid) -> Result<Option<RecipeShort>, Error> {
        Ok(recipe_short(&*self.state.lock().await, target_id))
    }

    async fn insert_if_absent(&self, owner: Uuid, target: Uuid) -> Result<bool, Error> {
        let mut state = self.state.lock().await;
        if !state.recipes.contains_key(&target) || !state.users.contains_key(&owner) {
            return Err(Error::not_found(ShoppingCart::TARGET_MISSING));
        }
        Ok(state.insert_pair::<ShoppingCart>(owner, target))
    }

    async fn delete_if_present(&self, owner: Uuid, target: Uuid) -> Result<bool, Error> {
        Ok(self
            .state
            .lock()
            .await
            .delete_pair::<ShoppingCart>(owner, target))
    }
}

#[async_trait]
impl RelationStore<Subscription> for MemoryStore {
    async fn find_target(&self, viewer: Uuid, target_id: Uuid) -> Result<Option<Author>, Error> {
        let state = self.state.lock().await;
        Ok(state
            .profile(Some(viewer), target_id)
            .map(|profile| state.author(profile, None)))
    }

    async fn insert_if_absent(&self, owner: Uuid, target: Uuid) -> Result<bool, Error> {
        let mut state = self.state.lock().await;
        if !state.users.contains_key(&target) || !state.users.contains_key(&owner) {
            return Err(Error::not_found(Subscription::TARGET_MISSING));
        }
        Ok(state.insert_pair::<Subscription>(owner, target))
    }

    async fn delete_if_present(&self, owner: Uuid, target: Uuid) -> Result<bool, Error> {
        Ok(self
            .state
            .lock()
            .await
            .delete_pair::<Subscription>(owner, target))
    }
}
