use std::{path::PathBuf, sync::Arc};

use foodgram_sdk::{
    filters::{routes, AppState},
    form::{IngredientRecord, NewRecipe, TagRecord},
    jwt::generate_jwt_session,
    memory::MemoryStore,
    schema::{User, UserRole, Uuid},
    store::{CatalogStore, Favorite, RecipeStore, ShoppingCart, Subscription},
};
use serde_json::{json, Value};
use warp::http::StatusCode;

const SECRET: &[u8] = b"integration-secret";

struct Harness {
    store: Arc<MemoryStore>,
    state: AppState<MemoryStore>,
    alice: User,
    bob: User,
    potato: Uuid,
    onion: Uuid,
    lunch: Uuid,
    _media: tempfile::TempDir,
}

impl Harness {
    async fn new() -> Self {
        let media = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        let alice = store
            .create_user("alice", "alice@example.com", "", "", UserRole::User)
            .await
            .unwrap();
        let bob = store
            .create_user("bob", "bob@example.com", "Bob", "Baker", UserRole::User)
            .await
            .unwrap();
        let potato = ingredient(&store, "potato", "g").await;
        let onion = ingredient(&store, "onion", "pc").await;
        let (lunch, _) = store
            .get_or_create_tag(&TagRecord {
                name: "Lunch".to_string(),
                color: "#E26C2D".to_string(),
                slug: "lunch".to_string(),
            })
            .await
            .unwrap();

        let state = AppState {
            store: store.clone(),
            secret: Arc::new(SECRET.to_vec()),
            media_root: Arc::new(PathBuf::from(media.path())),
        };

        Self {
            store,
            state,
            alice,
            bob,
            potato,
            onion,
            lunch: lunch.id,
            _media: media,
        }
    }

    async fn recipe(&self, author: &User, ingredients: Vec<(Uuid, i16)>) -> Uuid {
        self.store
            .create_recipe(
                author.id,
                &NewRecipe {
                    name: "Recipe".to_string(),
                    text: "Cook.".to_string(),
                    image: None,
                    cooking_time: 15,
                    ingredients,
                    tags: vec![self.lunch],
                },
            )
            .await
            .unwrap()
    }

    async fn send(
        &self,
        method: &str,
        path: &str,
        user: Option<&User>,
        body: Option<Value>,
    ) -> warp::http::Response<warp::hyper::body::Bytes> {
        let mut request = warp::test::request().method(method).path(path);
        if let Some(user) = user {
            let token = generate_jwt_session(user, SECRET).unwrap();
            request = request.header("authorization", format!("Token {token}"));
        }
        if let Some(body) = body {
            request = request.json(&body);
        }
        request.reply(&routes(self.state.clone())).await
    }
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

fn body(response: &warp::http::Response<warp::hyper::body::Bytes>) -> Value {
    serde_json::from_slice(response.body()).unwrap()
}

#[tokio::test]
async fn favorite_twice_conflicts() {
    let h = Harness::new().await;
    let recipe = h.recipe(&h.bob, vec![(h.potato, 100)]).await;
    let path = format!("/api/recipes/{recipe}/favorite");

    let first = h.send("POST", &path, Some(&h.alice), None).await;
    assert_eq!(first.status(), StatusCode::CREATED);
    assert_eq!(body(&first)["id"], json!(recipe));
    assert_eq!(body(&first)["cooking_time"], json!(15));

    let second = h.send("POST", &path, Some(&h.alice), None).await;
    assert_eq!(second.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body(&second)["errors"], json!("Recipe is already in favorites"));
    assert_eq!(h.store.relation_rows::<Favorite>().await.len(), 1);
}

#[tokio::test]
async fn removing_what_is_not_there_conflicts() {
    let h = Harness::new().await;
    let recipe = h.recipe(&h.bob, vec![(h.potato, 100)]).await;

    let response = h
        .send(
            "DELETE",
            &format!("/api/recipes/{recipe}/shopping_cart"),
            Some(&h.alice),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(h.store.relation_rows::<ShoppingCart>().await.is_empty());
}

#[tokio::test]
async fn favorite_round_trip_restores_the_set() {
    let h = Harness::new().await;
    let recipe = h.recipe(&h.bob, vec![(h.potato, 100)]).await;
    let path = format!("/api/recipes/{recipe}/favorite");

    assert_eq!(
        h.send("POST", &path, Some(&h.alice), None).await.status(),
        StatusCode::CREATED
    );
    let listed = h
        .send("GET", "/api/recipes?is_favorited=1", Some(&h.alice), None)
        .await;
    assert_eq!(body(&listed)["count"], json!(1));
    assert_eq!(body(&listed)["results"][0]["is_favorited"], json!(true));

    let removed = h.send("DELETE", &path, Some(&h.alice), None).await;
    assert_eq!(removed.status(), StatusCode::NO_CONTENT);
    assert!(h.store.relation_rows::<Favorite>().await.is_empty());
}

#[tokio::test]
async fn toggles_require_a_session() {
    let h = Harness::new().await;
    let recipe = h.recipe(&h.bob, vec![(h.potato, 100)]).await;

    let response = h
        .send("POST", &format!("/api/recipes/{recipe}/favorite"), None, None)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_recipe_is_not_found() {
    let h = Harness::new().await;

    let response = h
        .send("POST", "/api/recipes/999/shopping_cart", Some(&h.alice), None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn downloads_alice_shopping_list() {
    let h = Harness::new().await;
    let a = h.recipe(&h.bob, vec![(h.potato, 200), (h.onion, 1)]).await;
    let b = h.recipe(&h.bob, vec![(h.potato, 300)]).await;
    for recipe in [a, b] {
        let response = h
            .send(
                "POST",
                &format!("/api/recipes/{recipe}/shopping_cart"),
                Some(&h.alice),
                None,
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = h
        .send(
            "GET",
            "/api/recipes/download_shopping_cart",
            Some(&h.alice),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "application/pdf");
    let disposition = response.headers()["content-disposition"].to_str().unwrap();
    assert!(disposition.starts_with("attachment"));
    assert!(disposition.contains("alice_shopping_list.pdf"));
    assert!(response.body().starts_with(b"%PDF"));
    let text = String::from_utf8_lossy(response.body());
    assert!(text.contains("Potato"));
    assert!(text.contains("-- 500"));
    assert!(text.contains("Onion"));
}

#[tokio::test]
async fn empty_cart_download_is_a_bad_request() {
    let h = Harness::new().await;

    let response = h
        .send(
            "GET",
            "/api/recipes/download_shopping_cart",
            Some(&h.alice),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body(&response)["errors"].is_string());
}

#[tokio::test]
async fn subscribing_twice_conflicts() {
    let h = Harness::new().await;
    h.recipe(&h.bob, vec![(h.potato, 100)]).await;
    let path = format!("/api/users/{}/subscribe", h.bob.id);

    let first = h.send("POST", &path, Some(&h.alice), None).await;
    assert_eq!(first.status(), StatusCode::CREATED);
    assert_eq!(body(&first)["is_subscribed"], json!(true));
    assert_eq!(body(&first)["recipes_count"], json!(1));

    let second = h.send("POST", &path, Some(&h.alice), None).await;
    assert_eq!(second.status(), StatusCode::BAD_REQUEST);

    let listed = h
        .send(
            "GET",
            "/api/users/subscriptions?recipes_limit=0",
            Some(&h.alice),
            None,
        )
        .await;
    assert_eq!(body(&listed)["count"], json!(1));
    assert_eq!(body(&listed)["results"][0]["username"], json!("bob"));
    assert_eq!(body(&listed)["results"][0]["recipes"], json!([]));

    let removed = h.send("DELETE", &path, Some(&h.alice), None).await;
    assert_eq!(removed.status(), StatusCode::NO_CONTENT);
    assert!(h.store.relation_rows::<Subscription>().await.is_empty());
}

#[tokio::test]
async fn recipes_are_changed_only_by_their_author() {
    let h = Harness::new().await;
    let form = json!({
        "name": "Potato salad",
        "text": "Boil and chill.",
        "cooking_time": 40,
        "ingredients": [{"id": h.potato, "amount": 500}, {"id": h.onion, "amount": 1}],
        "tags": [h.lunch],
    });

    let created = h
        .send("POST", "/api/recipes", Some(&h.alice), Some(form.clone()))
        .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    let id = body(&created)["id"].as_i64().unwrap();
    assert_eq!(body(&created)["author"]["username"], json!("alice"));

    let path = format!("/api/recipes/{id}");
    let forbidden = h
        .send("PATCH", &path, Some(&h.bob), Some(form.clone()))
        .await;
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

    let invalid = h
        .send(
            "POST",
            "/api/recipes",
            Some(&h.alice),
            Some(json!({
                "name": "Nothing",
                "text": "Empty.",
                "cooking_time": 0,
                "ingredients": [{"id": h.potato, "amount": 1}],
                "tags": [h.lunch],
            })),
        )
        .await;
    assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);

    let deleted = h.send("DELETE", &path, Some(&h.alice), None).await;
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);
    let missing = h.send("GET", &path, None, None).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn catalog_is_public() {
    let h = Harness::new().await;

    let tags = h.send("GET", "/api/tags", None, None).await;
    assert_eq!(tags.status(), StatusCode::OK);
    assert_eq!(body(&tags)[0]["slug"], json!("lunch"));

    let ingredients = h.send("GET", "/api/ingredients?name=pot", None, None).await;
    assert_eq!(body(&ingredients).as_array().unwrap().len(), 1);
    assert_eq!(body(&ingredients)[0]["measurement_unit"], json!("g"));

    let profile = h
        .send("GET", &format!("/api/users/{}", h.bob.id), None, None)
        .await;
    assert_eq!(body(&profile)["is_subscribed"], json!(false));
}

#[tokio::test]
async fn bad_token_is_rejected_even_on_public_reads() {
    let h = Harness::new().await;

    let response = warp::test::request()
        .method("GET")
        .path("/api/recipes")
        .header("authorization", "Token not-a-jwt")
        .reply(&routes(h.state.clone()))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn paging_past_the_end_keeps_the_total() {
    let h = Harness::new().await;
    h.recipe(&h.bob, vec![(h.potato, 100)]).await;

    for path in [
        "/api/recipes?page=9223372036854775807",
        "/api/recipes?page=3&limit=1",
    ] {
        let response = h.send("GET", path, None, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body(&response)["count"], json!(1));
        assert_eq!(body(&response)["next"], Value::Null);
        assert_eq!(body(&response)["results"], json!([]));
    }

    let subscriptions = h
        .send(
            "GET",
            "/api/users/subscriptions?page=9223372036854775807",
            Some(&h.alice),
            None,
        )
        .await;
    assert_eq!(subscriptions.status(), StatusCode::OK);
    assert_eq!(body(&subscriptions)["count"], json!(0));
}
