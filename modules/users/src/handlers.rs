//! The handlers slot implementation.

use std::sync::Arc;

use anyhow::anyhow;
use arc_swap::ArcSwapOption;
use sea_orm::DatabaseConnection;
use svckit::{
    async_trait, Database as _, Handlers, NewUser, ServiceHub, Subsystem, User, UserError,
    UserPatch, Validator as _,
};
use uuid::Uuid;

use crate::storage::entity;

impl From<entity::Model> for User {
    fn from(model: entity::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            email: model.email,
        }
    }
}

/// CRUD over the users table, reaching persistence and validation through
/// the hub on every call. Ids are generated server-side on create.
#[derive(Default)]
pub struct UserHandlers {
    hub: ArcSwapOption<ServiceHub>,
}

impl UserHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    fn hub(&self) -> Result<Arc<ServiceHub>, UserError> {
        self.hub
            .load_full()
            .ok_or_else(|| UserError::Internal(anyhow!("handlers are not bound to a manager")))
    }

    fn db(&self) -> Result<DatabaseConnection, UserError> {
        let handle = self
            .hub()?
            .database()
            .handle()
            .ok_or_else(|| UserError::Internal(anyhow!("database is not connected")))?;
        Ok(handle.sea())
    }

    fn check(&self, target: &dyn validator::Validate) -> Result<(), UserError> {
        self.hub()?
            .validator()
            .validate(target)
            .map_err(|err| UserError::invalid(err.to_string()))
    }
}

impl Subsystem for UserHandlers {
    fn bind(&self, hub: ServiceHub) {
        self.hub.store(Some(Arc::new(hub)));
    }
}

#[async_trait]
impl Handlers for UserHandlers {
    async fn create_user(&self, draft: NewUser) -> Result<User, UserError> {
        self.check(&draft)?;
        let db = self.db()?;

        let id = Uuid::new_v4();
        let model = entity::insert(&db, id, draft.name, draft.email)
            .await
            .map_err(|err| UserError::Internal(err.into()))?;
        tracing::debug!(user = %model.id, "user created");
        Ok(model.into())
    }

    async fn update_user(&self, id: Uuid, patch: UserPatch) -> Result<User, UserError> {
        self.check(&patch)?;
        let db = self.db()?;

        let model = entity::update(&db, id, patch.name, patch.email)
            .await
            .map_err(|err| UserError::Internal(err.into()))?
            .ok_or_else(|| UserError::not_found(id))?;
        tracing::debug!(user = %model.id, "user updated");
        Ok(model.into())
    }

    async fn get_user(&self, id: Uuid) -> Result<User, UserError> {
        let db = self.db()?;
        entity::find_by_id(&db, id)
            .await
            .map_err(|err| UserError::Internal(err.into()))?
            .map(User::from)
            .ok_or_else(|| UserError::not_found(id))
    }

    async fn list_users(&self) -> Result<Vec<User>, UserError> {
        let db = self.db()?;
        let models = entity::list(&db)
            .await
            .map_err(|err| UserError::Internal(err.into()))?;
        Ok(models.into_iter().map(User::from).collect())
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), UserError> {
        let db = self.db()?;
        let deleted = entity::delete(&db, id)
            .await
            .map_err(|err| UserError::Internal(err.into()))?;
        if !deleted {
            return Err(UserError::not_found(id));
        }
        tracing::debug!(user = %id, "user deleted");
        Ok(())
    }
}
