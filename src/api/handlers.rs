use std::{convert::Infallible, path::PathBuf, sync::Arc};

use chrono::Local;
use serde::{Deserialize, Serialize};
use warp::{
    http::{header, Response, StatusCode},
    reject::Rejection,
    reply::{self, Reply},
};

use crate::{
    error::Error,
    form::RecipeForm,
    jwt::SessionData,
    pagination::PageQuery,
    schema::{RecipeFilter, Uuid},
    service::{recipes, relations, shopping},
    store::{Relation, RelationStore, Store},
};

fn reject(error: Error) -> Rejection {
    warp::reject::custom(error)
}

#[derive(Deserialize, Debug, Default)]
pub struct IngredientQuery {
    pub name: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct SubscriptionQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub recipes_limit: Option<i64>,
}

fn parse_flag(key: &str, value: &str) -> Result<bool, Error> {
    match value {
        "1" | "true" => Ok(true),
        "0" | "false" => Ok(false),
        _ => Err(Error::Validation(format!("{key}: expected 0 or 1"))),
    }
}

fn parse_number(key: &str, value: &str) -> Result<i64, Error> {
    value
        .parse()
        .map_err(|_e| Error::Validation(format!("{key}: expected a number")))
}

/// Recipe list parameters; `tags` may repeat.
pub fn recipe_query(pairs: Vec<(String, String)>) -> Result<(RecipeFilter, PageQuery), Error> {
    let mut filter = RecipeFilter::default();
    let mut page = PageQuery::default();

    for (key, value) in pairs {
        match key.as_str() {
            "tags" => filter.tags.push(value),
            "author" => {
                let author = parse_number(&key, &value)?;
                filter.author = Some(
                    Uuid::try_from(author)
                        .map_err(|_e| Error::Validation(format!("{key}: out of range")))?,
                );
            }
            "is_favorited" => filter.is_favorited = parse_flag(&key, &value)?,
            "is_in_shopping_cart" => filter.is_in_shopping_cart = parse_flag(&key, &value)?,
            "page" => page.page = Some(parse_number(&key, &value)?),
            "limit" => page.limit = Some(parse_number(&key, &value)?),
            _ => {}
        }
    }

    Ok((filter, page))
}

pub async fn list_tags<S: Store>(store: Arc<S>) -> Result<impl Reply, Rejection> {
    let tags = store.list_tags().await.map_err(reject)?;
    Ok(reply::json(&tags))
}

pub async fn get_tag<S: Store>(id: Uuid, store: Arc<S>) -> Result<impl Reply, Rejection> {
    let tag = store
        .get_tag(id)
        .await
        .map_err(reject)?
        .ok_or_else(|| reject(Error::not_found("No tag exists with specified id")))?;
    Ok(reply::json(&tag))
}

pub async fn list_ingredients<S: Store>(
    query: IngredientQuery,
    store: Arc<S>,
) -> Result<impl Reply, Rejection> {
    let prefix = query.name.as_deref().filter(|name| !name.is_empty());
    let ingredients = store.list_ingredients(prefix).await.map_err(reject)?;
    Ok(reply::json(&ingredients))
}

pub async fn get_ingredient<S: Store>(id: Uuid, store: Arc<S>) -> Result<impl Reply, Rejection> {
    let ingredient = store
        .get_ingredient(id)
        .await
        .map_err(reject)?
        .ok_or_else(|| reject(Error::not_found("No ingredient exists with specified id")))?;
    Ok(reply::json(&ingredient))
}

pub async fn list_recipes<S: Store>(
    pairs: Vec<(String, String)>,
    session: Option<SessionData>,
    store: Arc<S>,
) -> Result<impl Reply, Rejection> {
    let (filter, page) = recipe_query(pairs).map_err(reject)?;
    let viewer = session.map(|session| session.user_id);

    let recipes = store
        .fetch_recipes(viewer, &filter, &page)
        .await
        .map_err(reject)?;
    Ok(reply::json(&recipes))
}

pub async fn get_recipe<S: Store>(
    id: Uuid,
    session: Option<SessionData>,
    store: Arc<S>,
) -> Result<impl Reply, Rejection> {
    let viewer = session.map(|session| session.user_id);
    let recipe = store
        .get_recipe(viewer, id)
        .await
        .map_err(reject)?
        .ok_or_else(|| reject(Error::not_found("No recipe exists with specified id")))?;
    Ok(reply::json(&recipe))
}

pub async fn create_recipe<S: Store>(
    session: SessionData,
    form: RecipeForm,
    store: Arc<S>,
) -> Result<impl Reply, Rejection> {
    let recipe = recipes::create_recipe(&*store, &session, form)
        .await
        .map_err(reject)?;
    Ok(reply::with_status(reply::json(&recipe), StatusCode::CREATED))
}

pub async fn update_recipe<S: Store>(
    id: Uuid,
    session: SessionData,
    form: RecipeForm,
    store: Arc<S>,
) -> Result<impl Reply, Rejection> {
    let recipe = recipes::update_recipe(&*store, &session, id, form)
        .await
        .map_err(reject)?;
    Ok(reply::json(&recipe))
}

pub async fn delete_recipe<S: Store>(
    id: Uuid,
    session: SessionData,
    store: Arc<S>,
) -> Result<impl Reply, Rejection> {
    recipes::delete_recipe(&*store, &session, id)
        .await
        .map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_relation<R, S>(
    id: Uuid,
    session: SessionData,
    store: Arc<S>,
) -> Result<impl Reply, Rejection>
where
    R: Relation,
    S: Store + RelationStore<R>,
{
    let target = relations::add_relation::<R, S>(&*store, &session, id)
        .await
        .map_err(reject)?;
    Ok(reply::with_status(reply::json(&target), StatusCode::CREATED))
}

pub async fn remove_relation<R, S>(
    id: Uuid,
    session: SessionData,
    store: Arc<S>,
) -> Result<impl Reply, Rejection>
where
    R: Relation,
    S: Store + RelationStore<R>,
{
    relations::remove_relation::<R, S>(&*store, &session, id)
        .await
        .map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn download_shopping_cart<S: Store>(
    session: SessionData,
    store: Arc<S>,
    media_root: Arc<PathBuf>,
) -> Result<impl Reply, Rejection> {
    let today = Local::now().date_naive();
    let document = shopping::build_shopping_list(&*store, &session, &media_root, today)
        .await
        .map_err(reject)?;

    Response::builder()
        .header(header::CONTENT_TYPE, "application/pdf")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", document.filename),
        )
        .body(document.bytes)
        .map_err(|e| reject(Error::Internal(format!("Failed to build response: {e}"))))
}

pub async fn list_subscriptions<S: Store>(
    query: SubscriptionQuery,
    session: SessionData,
    store: Arc<S>,
) -> Result<impl Reply, Rejection> {
    let page = PageQuery {
        page: query.page,
        limit: query.limit,
    };
    let recipes_limit = query.recipes_limit.map(|limit| limit.max(0));

    let authors = store
        .list_subscriptions(session.user_id, &page, recipes_limit)
        .await
        .map_err(reject)?;
    Ok(reply::json(&authors))
}

pub async fn get_user<S: Store>(
    id: Uuid,
    session: Option<SessionData>,
    store: Arc<S>,
) -> Result<impl Reply, Rejection> {
    let viewer = session.map(|session| session.user_id);
    let profile = store
        .get_profile(viewer, id)
        .await
        .map_err(reject)?
        .ok_or_else(|| reject(Error::not_found("No user exists with specified id")))?;
    Ok(reply::json(&profile))
}

#[derive(Serialize)]
struct ErrorBody {
    errors: String,
}

/// Renders every rejection as `{"errors": ...}` with a matching status.
pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, message) = if let Some(e) = err.find::<Error>() {
        (e.status(), e.to_string())
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, e.to_string())
    } else if let Some(e) = err.find::<warp::reject::InvalidQuery>() {
        (StatusCode::BAD_REQUEST, e.to_string())
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, String::from("Payload too large"))
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, String::from("Not found"))
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, String::from("Method not allowed"))
    } else {
        log::error!("Unhandled rejection: {err:?}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            String::from("Internal server error"),
        )
    };

    Ok(reply::with_status(
        reply::json(&ErrorBody { errors: message }),
        status,
    ))
}
