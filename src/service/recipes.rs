use crate::{
    error::{Error, ValidationError},
    form::{NewRecipe, RecipeForm},
    jwt::SessionData,
    permissions::ActionType,
    schema::{RecipeDetail, Uuid},
    store::{CatalogStore, RecipeStore},
};

async fn check_references<S>(store: &S, recipe: &NewRecipe) -> Result<(), Error>
where
    S: CatalogStore + ?Sized,
{
    for (ingredient_id, _) in &recipe.ingredients {
        if store.get_ingredient(*ingredient_id).await?.is_none() {
            return Err(ValidationError::new(
                "ingredients",
                &format!("no ingredient exists with id {ingredient_id}"),
            )
            .into());
        }
    }
    for tag_id in &recipe.tags {
        if store.get_tag(*tag_id).await?.is_none() {
            return Err(
                ValidationError::new("tags", &format!("no tag exists with id {tag_id}")).into(),
            );
        }
    }
    Ok(())
}

async fn authorize_change<S>(store: &S, session: &SessionData, id: Uuid) -> Result<(), Error>
where
    S: RecipeStore + ?Sized,
{
    let author_id = store
        .recipe_author(id)
        .await?
        .ok_or_else(|| Error::not_found("No recipe exists with specified id"))?;

    session.authenticate_owner(
        author_id,
        ActionType::ManageOwnRecipes,
        ActionType::ManageAllRecipes,
    )
}

async fn load_detail<S>(store: &S, session: &SessionData, id: Uuid) -> Result<RecipeDetail, Error>
where
    S: RecipeStore + ?Sized,
{
    store
        .get_recipe(Some(session.user_id), id)
        .await?
        .ok_or_else(|| Error::not_found("No recipe exists with specified id"))
}

/// Stores the recipe with its ingredient amounts and tags, authored by the acting user.
pub async fn create_recipe<S>(
    store: &S,
    session: &SessionData,
    form: RecipeForm,
) -> Result<RecipeDetail, Error>
where
    S: CatalogStore + RecipeStore + ?Sized,
{
    session.authenticate(ActionType::CreateRecipes)?;

    let recipe = form.validate()?;
    check_references(store, &recipe).await?;

    let id = store.create_recipe(session.user_id, &recipe).await?;
    log::debug!("User {} created recipe {}", session.user_id, id);

    load_detail(store, session, id).await
}

pub async fn update_recipe<S>(
    store: &S,
    session: &SessionData,
    id: Uuid,
    form: RecipeForm,
) -> Result<RecipeDetail, Error>
where
    S: CatalogStore + RecipeStore + ?Sized,
{
    authorize_change(store, session, id).await?;

    let recipe = form.validate()?;
    check_references(store, &recipe).await?;

    store.update_recipe(id, &recipe).await?;
    log::debug!("User {} updated recipe {}", session.user_id, id);

    load_detail(store, session, id).await
}

pub async fn delete_recipe<S>(store: &S, session: &SessionData, id: Uuid) -> Result<(), Error>
where
    S: RecipeStore + ?Sized,
{
    authorize_change(store, session, id).await?;

    if !store.delete_recipe(id).await? {
        return Err(Error::not_found("No recipe exists with specified id"));
    }
    log::debug!("User {} deleted recipe {}", session.user_id, id);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        form::{IngredientAmountForm, IngredientRecord, TagRecord},
        memory::MemoryStore,
        schema::{User, UserRole},
    };

    struct Fixture {
        store: MemoryStore,
        alice: User,
        bob: User,
        admin: User,
        potato: Uuid,
        tag: Uuid,
    }

    fn session(user: &User) -> SessionData {
        SessionData {
            user_id: user.id,
            username: user.username.to_owned(),
            role: user.role.to_owned(),
            is_admin: user.role == UserRole::Admin,
        }
    }

    async fn fixture() -> Fixture {
        let store = MemoryStore::new();
        let alice = store
            .create_user("alice", "alice@example.com", "", "", UserRole::User)
            .await
            .unwrap();
        let bob = store
            .create_user("bob", "bob@example.com", "", "", UserRole::User)
            .await
            .unwrap();
        let admin = store
            .create_user("admin", "admin@example.com", "", "", UserRole::Admin)
            .await
            .unwrap();
        let (potato, _) = store
            .get_or_create_ingredient(&IngredientRecord {
                name: "potato".to_string(),
                measurement_unit: "g".to_string(),
            })
            .await
            .unwrap();
        let (tag, _) = store
            .get_or_create_tag(&TagRecord {
                name: "Dinner".to_string(),
                color: "#8775D2".to_string(),
                slug: "dinner".to_string(),
            })
            .await
            .unwrap();

        Fixture {
            store,
            alice,
            bob,
            admin,
            potato: potato.id,
            tag: tag.id,
        }
    }

    fn form(ingredient: Uuid, tag: Uuid) -> RecipeForm {
        RecipeForm {
            name: "Mash".to_string(),
            text: "Boil, then mash.".to_string(),
            image: Some("recipes/mash.png".to_string()),
            cooking_time: 25,
            ingredients: vec![IngredientAmountForm {
                id: ingredient,
                amount: 400,
            }],
            tags: vec![tag],
        }
    }

    #[tokio::test]
    async fn creates_a_recipe_for_the_acting_user() {
        let f = fixture().await;

        let detail = create_recipe(&f.store, &session(&f.alice), form(f.potato, f.tag))
            .await
            .unwrap();
        assert_eq!(detail.author.id, f.alice.id);
        assert_eq!(detail.ingredients.len(), 1);
        assert_eq!(detail.ingredients[0].amount, 400);
        assert_eq!(detail.tags[0].slug, "dinner");
        assert!(!detail.is_favorited);
    }

    #[tokio::test]
    async fn unknown_ingredient_is_a_validation_error() {
        let f = fixture().await;

        let error = create_recipe(&f.store, &session(&f.alice), form(999, f.tag))
            .await
            .unwrap_err();
        assert!(matches!(error, Error::Validation(_)));
    }

    #[tokio::test]
    async fn only_the_author_or_an_admin_may_change_a_recipe() {
        let f = fixture().await;
        let detail = create_recipe(&f.store, &session(&f.alice), form(f.potato, f.tag))
            .await
            .unwrap();

        let error = update_recipe(&f.store, &session(&f.bob), detail.id, form(f.potato, f.tag))
            .await
            .unwrap_err();
        assert!(matches!(error, Error::Forbidden(_)));
        let error = delete_recipe(&f.store, &session(&f.bob), detail.id)
            .await
            .unwrap_err();
        assert!(matches!(error, Error::Forbidden(_)));

        let mut changed = form(f.potato, f.tag);
        changed.cooking_time = 40;
        let updated = update_recipe(&f.store, &session(&f.alice), detail.id, changed)
            .await
            .unwrap();
        assert_eq!(updated.cooking_time, 40);

        delete_recipe(&f.store, &session(&f.admin), detail.id)
            .await
            .unwrap();
        assert_eq!(f.store.recipe_author(detail.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn deleting_a_missing_recipe_is_not_found() {
        let f = fixture().await;

        let error = delete_recipe(&f.store, &session(&f.alice), 42)
            .await
            .unwrap_err();
        assert!(matches!(error, Error::NotFound(_)));
    }
}
