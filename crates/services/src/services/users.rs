use db::{
    models::user::{UpdateUser, User},
    validation,
};
use sqlx::PgPool;

use super::{access::Actor, error::ServiceError};

const MAX_TIMEZONE_LEN: usize = 64;
const MAX_BIO_LEN: usize = 2000;

pub async fn me(pool: &PgPool, actor: &Actor) -> Result<User, ServiceError> {
    User::find_by_id(pool, actor.id)
        .await?
        .ok_or_else(|| ServiceError::not_found("user"))
}

pub async fn update_me(
    pool: &PgPool,
    actor: &Actor,
    mut changes: UpdateUser,
) -> Result<User, ServiceError> {
    if let Some(first_name) = changes.first_name.as_deref() {
        changes.first_name = Some(validation::name("first_name", first_name)?);
    }
    if let Some(last_name) = changes.last_name.as_deref() {
        changes.last_name = Some(validation::name("last_name", last_name)?);
    }
    if let Some(timezone) = changes.timezone.as_deref() {
        changes.timezone = Some(validation::required_text(
            "timezone",
            timezone,
            MAX_TIMEZONE_LEN,
        )?);
    }
    if let Some(bio) = changes.bio.as_deref()
        && bio.chars().count() > MAX_BIO_LEN
    {
        return Err(validation::ValidationError::TooLong {
            field: "bio",
            max: MAX_BIO_LEN,
        }
        .into());
    }

    let user = User::update_profile(pool, actor.id, &changes).await?;
    tracing::debug!(user_id = %user.id, "profile updated");
    Ok(user)
}
