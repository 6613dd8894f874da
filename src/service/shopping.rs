use std::path::Path;

use chrono::NaiveDate;

use crate::{
    document::{load_picture, media_path, render, Document, Picture},
    error::Error,
    jwt::SessionData,
    list::{filename, ShoppingList},
    permissions::ActionType,
    schema::CartIngredient,
    store::{CartStore, UserStore},
};

/// The picture of the first contributing recipe that has one, if it loads.
/// Decoding runs on the blocking pool.
async fn first_picture(media_root: &Path, rows: &[CartIngredient]) -> Option<Picture> {
    let image = rows.iter().find_map(|row| row.image.as_deref())?;
    let Some(path) = media_path(media_root, image) else {
        log::warn!("Skipping shopping list image outside the media root: {image}");
        return None;
    };

    match tokio::task::spawn_blocking(move || load_picture(&path)).await {
        Ok(Ok(picture)) => Some(picture),
        Ok(Err(e)) => {
            log::warn!("Shopping list rendered without image: {e}");
            None
        }
        Err(e) => {
            log::warn!("Shopping list image task failed: {e}");
            None
        }
    }
}

fn empty_cart() -> Error {
    Error::BadRequest(String::from("Shopping cart is empty"))
}

/// Reads the acting user's cart and returns the summed list.
pub async fn shopping_list<S>(
    store: &S,
    session: &SessionData,
    today: NaiveDate,
) -> Result<(ShoppingList, Vec<CartIngredient>), Error>
where
    S: CartStore + UserStore + ?Sized,
{
    session.authenticate(ActionType::ManageOwnShoppingCart)?;

    if store.cart_size(session.user_id).await? == 0 {
        return Err(empty_cart());
    }
    let user = store
        .get_user(session.user_id)
        .await?
        .ok_or_else(|| Error::not_found("No user exists with specified id"))?;

    // The cart may have been emptied since it was counted.
    let rows = store.cart_ingredients(session.user_id).await?;
    if rows.is_empty() {
        return Err(empty_cart());
    }
    Ok((ShoppingList::new(user.display_name(), today, &rows), rows))
}

/// Sums the acting user's cart into a shopping list and renders it as PDF.
pub async fn build_shopping_list<S>(
    store: &S,
    session: &SessionData,
    media_root: &Path,
    today: NaiveDate,
) -> Result<Document, Error>
where
    S: CartStore + UserStore + ?Sized,
{
    let (list, rows) = shopping_list(store, session, today).await?;
    log::info!(
        "Building shopping list for {} with {} entries",
        session.username,
        list.items.len()
    );

    let picture = first_picture(media_root, &rows).await;
    let lines = list.lines();
    let bytes = tokio::task::spawn_blocking(move || render(&lines, picture.as_ref()))
        .await
        .map_err(|e| {
            log::error!("Shopping list rendering failed: {e}");
            Error::Internal(String::from("Internal server error"))
        })?;

    Ok(Document {
        filename: filename(&session.username),
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        form::{IngredientRecord, NewRecipe},
        list::ShoppingItem,
        memory::MemoryStore,
        schema::{User, UserRole, Uuid},
        store::{CatalogStore, RecipeStore, RelationStore, ShoppingCart},
    };

    fn session(user: &User) -> SessionData {
        SessionData {
            user_id: user.id,
            username: user.username.to_owned(),
            role: user.role.to_owned(),
            is_admin: false,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    async fn ingredient(store: &MemoryStore, name: &str, unit: &str) -> Uuid {
        store
            .get_or_create_ingredient(&IngredientRecord {
                name: name.to_string(),
                measurement_unit: unit.to_string(),
            })
            .await
            .unwrap()
            .0
            .id
    }

    async fn recipe(
        store: &MemoryStore,
        author: &User,
        image: Option<&str>,
        ingredients: Vec<(Uuid, i16)>,
    ) -> Uuid {
        store
            .create_recipe(
                author.id,
                &NewRecipe {
                    name: "Recipe".to_string(),
                    text: "Cook.".to_string(),
                    image: image.map(str::to_string),
                    cooking_time: 20,
                    ingredients,
                    tags: vec![],
                },
            )
            .await
            .unwrap()
    }

    async fn alice_with_cart(image: Option<&str>) -> (MemoryStore, User) {
        let store = MemoryStore::new();
        let alice = store
            .create_user("alice", "alice@example.com", "", "", UserRole::User)
            .await
            .unwrap();
        let potato = ingredient(&store, "potato", "g").await;
        let onion = ingredient(&store, "onion", "pc").await;

        let a = recipe(&store, &alice, image, vec![(potato, 200), (onion, 1)]).await;
        let b = recipe(&store, &alice, None, vec![(potato, 300)]).await;
        for id in [a, b] {
            RelationStore::<ShoppingCart>::insert_if_absent(&store, alice.id, id)
                .await
                .unwrap();
        }
        (store, alice)
    }

    #[tokio::test]
    async fn sums_alice_cart() {
        let (store, alice) = alice_with_cart(None).await;

        let (list, _) = shopping_list(&store, &session(&alice), today())
            .await
            .unwrap();
        let mut items = list.items.clone();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(
            items,
            vec![
                ShoppingItem {
                    name: "onion".to_string(),
                    measurement_unit: "pc".to_string(),
                    amount: 1,
                },
                ShoppingItem {
                    name: "potato".to_string(),
                    measurement_unit: "g".to_string(),
                    amount: 500,
                },
            ]
        );

        let lines = list.lines();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].contains("alice"));
        assert!(lines[1].contains("2024-05-01"));
        assert!(lines.contains(&"-- Potato -- (G) -- 500".to_string()));
        assert!(lines.contains(&"-- Onion -- (Pc) -- 1".to_string()));
    }

    #[tokio::test]
    async fn empty_cart_is_a_bad_request() {
        let store = MemoryStore::new();
        let alice = store
            .create_user("alice", "alice@example.com", "", "", UserRole::User)
            .await
            .unwrap();
        let media = tempfile::tempdir().unwrap();

        let error = build_shopping_list(&store, &session(&alice), media.path(), today())
            .await
            .unwrap_err();
        assert!(matches!(error, Error::BadRequest(_)));
    }

    #[tokio::test]
    async fn missing_image_still_yields_a_document() {
        let (store, alice) = alice_with_cart(Some("recipes/gone.jpg")).await;
        let media = tempfile::tempdir().unwrap();

        let document = build_shopping_list(&store, &session(&alice), media.path(), today())
            .await
            .unwrap();
        assert_eq!(document.filename, "alice_shopping_list.pdf");
        assert!(document.bytes.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn present_image_is_embedded() {
        let media = tempfile::tempdir().unwrap();
        std::fs::create_dir(media.path().join("recipes")).unwrap();
        image::RgbImage::from_pixel(2, 2, image::Rgb([10, 200, 10]))
            .save(media.path().join("recipes/dish.png"))
            .unwrap();
        let (store, alice) = alice_with_cart(Some("recipes/dish.png")).await;

        let document = build_shopping_list(&store, &session(&alice), media.path(), today())
            .await
            .unwrap();
        assert!(document
            .bytes
            .windows(4)
            .any(|window| window == b"/Im1"));
    }

    #[tokio::test]
    async fn undecodable_image_is_skipped() {
        let media = tempfile::tempdir().unwrap();
        std::fs::create_dir(media.path().join("recipes")).unwrap();
        std::fs::write(media.path().join("recipes/dish.jpg"), b"not a jpeg").unwrap();
        let (store, alice) = alice_with_cart(Some("recipes/dish.jpg")).await;

        let document = build_shopping_list(&store, &session(&alice), media.path(), today())
            .await
            .unwrap();
        assert!(document.bytes.starts_with(b"%PDF"));
        assert!(!document
            .bytes
            .windows(4)
            .any(|window| window == b"/Im1"));
    }

    #[tokio::test]
    async fn cart_without_ingredients_is_a_bad_request() {
        let store = MemoryStore::new();
        let alice = store
            .create_user("alice", "alice@example.com", "", "", UserRole::User)
            .await
            .unwrap();
        let bare = recipe(&store, &alice, None, vec![]).await;
        RelationStore::<ShoppingCart>::insert_if_absent(&store, alice.id, bare)
            .await
            .unwrap();
        assert_eq!(store.cart_size(alice.id).await.unwrap(), 1);

        let media = tempfile::tempdir().unwrap();
        let error = build_shopping_list(&store, &session(&alice), media.path(), today())
            .await
            .unwrap_err();
        assert!(matches!(error, Error::BadRequest(_)));
    }
}
