//! Session business logic - gateway identities used to route sends.

use crate::{
    entities::{Session, session},
    errors::{Error, Result},
};
use sea_orm::{Set, prelude::*};
use std::collections::HashMap;

/// Creates a session. Names must be unique and non-empty.
pub async fn create_session(
    db: &DatabaseConnection,
    name: &str,
    phone_number: &str,
) -> Result<session::Model> {
    if name.trim().is_empty() {
        return Err(Error::Config {
            message: "Session name cannot be empty".to_string(),
        });
    }

    let session = session::ActiveModel {
        name: Set(name.trim().to_string()),
        phone_number: Set(phone_number.trim().to_string()),
        ..Default::default()
    };
    session.insert(db).await.map_err(Into::into)
}

/// Finds a session by its unique ID.
pub async fn get_session(
    db: &DatabaseConnection,
    session_id: i64,
) -> Result<Option<session::Model>> {
    Session::find_by_id(session_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Loads the given sessions keyed by id. Unknown ids are simply absent.
pub async fn sessions_by_id(
    db: &DatabaseConnection,
    session_ids: &[i64],
) -> Result<HashMap<i64, session::Model>> {
    if session_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let sessions = Session::find()
        .filter(session::Column::Id.is_in(session_ids.iter().copied()))
        .all(db)
        .await?;
    Ok(sessions.into_iter().map(|s| (s.id, s)).collect())
}
