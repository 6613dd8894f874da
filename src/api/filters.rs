use std::{convert::Infallible, path::PathBuf, sync::Arc};

use warp::{reject::Rejection, reply::Reply, Filter};

use super::handlers;
use crate::{
    form::RecipeForm,
    middleware::{with_possible_session, with_session},
    schema::Uuid,
    store::{Favorite, ShoppingCart, Store, Subscription},
};

const JSON_BODY_LIMIT: u64 = 1024 * 1024;

/// Shared state handed to every route.
pub struct AppState<S> {
    pub store: Arc<S>,
    pub secret: Arc<Vec<u8>>,
    pub media_root: Arc<PathBuf>,
}

impl<S> AppState<S> {
    pub fn new(store: S, secret: &[u8], media_root: PathBuf) -> Self {
        Self {
            store: Arc::new(store),
            secret: Arc::new(secret.to_vec()),
            media_root: Arc::new(media_root),
        }
    }
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            secret: self.secret.clone(),
            media_root: self.media_root.clone(),
        }
    }
}

fn with_store<S: Store>(
    store: Arc<S>,
) -> impl Filter<Extract = (Arc<S>,), Error = Infallible> + Clone {
    warp::any().map(move || store.clone())
}

fn with_media_root(
    media_root: Arc<PathBuf>,
) -> impl Filter<Extract = (Arc<PathBuf>,), Error = Infallible> + Clone {
    warp::any().map(move || media_root.clone())
}

fn recipe_body() -> impl Filter<Extract = (RecipeForm,), Error = Rejection> + Clone {
    warp::body::content_length_limit(JSON_BODY_LIMIT).and(warp::body::json())
}

pub fn catalog<S: Store>(
    state: &AppState<S>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let list_tags = warp::path!("api" / "tags")
        .and(warp::get())
        .and(with_store(state.store.clone()))
        .and_then(handlers::list_tags::<S>);
    let get_tag = warp::path!("api" / "tags" / Uuid)
        .and(warp::get())
        .and(with_store(state.store.clone()))
        .and_then(handlers::get_tag::<S>);
    let list_ingredients = warp::path!("api" / "ingredients")
        .and(warp::get())
        .and(warp::query::<handlers::IngredientQuery>())
        .and(with_store(state.store.clone()))
        .and_then(handlers::list_ingredients::<S>);
    let get_ingredient = warp::path!("api" / "ingredients" / Uuid)
        .and(warp::get())
        .and(with_store(state.store.clone()))
        .and_then(handlers::get_ingredient::<S>);

    list_tags.or(get_tag).or(list_ingredients).or(get_ingredient)
}

pub fn recipes<S: Store>(
    state: &AppState<S>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let download = warp::path!("api" / "recipes" / "download_shopping_cart")
        .and(warp::get())
        .and(with_session(state.secret.clone()))
        .and(with_store(state.store.clone()))
        .and(with_media_root(state.media_root.clone()))
        .and_then(handlers::download_shopping_cart::<S>);
    let list = warp::path!("api" / "recipes")
        .and(warp::get())
        .and(warp::query::<Vec<(String, String)>>())
        .and(with_possible_session(state.secret.clone()))
        .and(with_store(state.store.clone()))
        .and_then(handlers::list_recipes::<S>);
    let create = warp::path!("api" / "recipes")
        .and(warp::post())
        .and(with_session(state.secret.clone()))
        .and(recipe_body())
        .and(with_store(state.store.clone()))
        .and_then(handlers::create_recipe::<S>);
    let get = warp::path!("api" / "recipes" / Uuid)
        .and(warp::get())
        .and(with_possible_session(state.secret.clone()))
        .and(with_store(state.store.clone()))
        .and_then(handlers::get_recipe::<S>);
    let update = warp::path!("api" / "recipes" / Uuid)
        .and(warp::patch())
        .and(with_session(state.secret.clone()))
        .and(recipe_body())
        .and(with_store(state.store.clone()))
        .and_then(handlers::update_recipe::<S>);
    let delete = warp::path!("api" / "recipes" / Uuid)
        .and(warp::delete())
        .and(with_session(state.secret.clone()))
        .and(with_store(state.store.clone()))
        .and_then(handlers::delete_recipe::<S>);

    download
        .or(list)
        .or(create)
        .or(get)
        .or(update)
        .or(delete)
}

pub fn relations<S: Store>(
    state: &AppState<S>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let add_favorite = warp::path!("api" / "recipes" / Uuid / "favorite")
        .and(warp::post())
        .and(with_session(state.secret.clone()))
        .and(with_store(state.store.clone()))
        .and_then(handlers::add_relation::<Favorite, S>);
    let remove_favorite = warp::path!("api" / "recipes" / Uuid / "favorite")
        .and(warp::delete())
        .and(with_session(state.secret.clone()))
        .and(with_store(state.store.clone()))
        .and_then(handlers::remove_relation::<Favorite, S>);
    let add_to_cart = warp::path!("api" / "recipes" / Uuid / "shopping_cart")
        .and(warp::post())
        .and(with_session(state.secret.clone()))
        .and(with_store(state.store.clone()))
        .and_then(handlers::add_relation::<ShoppingCart, S>);
    let remove_from_cart = warp::path!("api" / "recipes" / Uuid / "shopping_cart")
        .and(warp::delete())
        .and(with_session(state.secret.clone()))
        .and(with_store(state.store.clone()))
        .and_then(handlers::remove_relation::<ShoppingCart, S>);
    let subscribe = warp::path!("api" / "users" / Uuid / "subscribe")
        .and(warp::post())
        .and(with_session(state.secret.clone()))
        .and(with_store(state.store.clone()))
        .and_then(handlers::add_relation::<Subscription, S>);
    let unsubscribe = warp::path!("api" / "users" / Uuid / "subscribe")
        .and(warp::delete())
        .and(with_session(state.secret.clone()))
        .and(with_store(state.store.clone()))
        .and_then(handlers::remove_relation::<Subscription, S>);

    add_favorite
        .or(remove_favorite)
        .or(add_to_cart)
        .or(remove_from_cart)
        .or(subscribe)
        .or(unsubscribe)
}

pub fn users<S: Store>(
    state: &AppState<S>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let subscriptions = warp::path!("api" / "users" / "subscriptions")
        .and(warp::get())
        .and(warp::query::<handlers::SubscriptionQuery>())
        .and(with_session(state.secret.clone()))
        .and(with_store(state.store.clone()))
        .and_then(handlers::list_subscriptions::<S>);
    let profile = warp::path!("api" / "users" / Uuid)
        .and(warp::get())
        .and(with_possible_session(state.secret.clone()))
        .and(with_store(state.store.clone()))
        .and_then(handlers::get_user::<S>);

    subscriptions.or(profile)
}

/// The whole HTTP surface, rejections rendered as JSON.
pub fn routes<S: Store>(
    state: AppState<S>,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    catalog(&state)
        .or(recipes(&state))
        .or(relations(&state))
        .or(users(&state))
        .recover(handlers::handle_rejection)
        .with(warp::log("foodgram::api"))
}
