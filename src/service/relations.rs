use crate::{
    error::Error,
    jwt::SessionData,
    schema::Uuid,
    store::{Relation, RelationStore},
};

/// Links the acting user to `target_id` and returns the linked target.
pub async fn add_relation<R, S>(
    store: &S,
    session: &SessionData,
    target_id: Uuid,
) -> Result<R::Target, Error>
where
    R: Relation,
    S: RelationStore<R> + ?Sized,
{
    session.authenticate(R::ACTION)?;

    let target = store
        .find_target(session.user_id, target_id)
        .await?
        .ok_or_else(|| Error::not_found(R::TARGET_MISSING))?;
    R::check(session.user_id, target_id)?;

    if !store.insert_if_absent(session.user_id, target_id).await? {
        return Err(Error::Conflict(R::ALREADY_PRESENT.to_string()));
    }
    log::debug!(
        "User {} added {} to {}",
        session.user_id,
        target_id,
        R::TABLE
    );

    Ok(R::linked(target))
}

pub async fn remove_relation<R, S>(
    store: &S,
    session: &SessionData,
    target_id: Uuid,
) -> Result<(), Error>
where
    R: Relation,
    S: RelationStore<R> + ?Sized,
{
    session.authenticate(R::ACTION)?;

    if store.find_target(session.user_id, target_id).await?.is_none() {
        return Err(Error::not_found(R::TARGET_MISSING));
    }
    if !store.delete_if_present(session.user_id, target_id).await? {
        return Err(Error::Conflict(R::NOT_PRESENT.to_string()));
    }
    log::debug!(
        "User {} removed {} from {}",
        session.user_id,
        target_id,
        R::TABLE
    );

    Ok(())
}
