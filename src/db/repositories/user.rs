use std::sync::Arc;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, sea_query::Expr,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::entities::{Role, photos, prelude::*, users};
use crate::error::{AccountError, AccountResult};
use crate::services::avatar::{AvatarOutcome, AvatarProvider, resolve_avatar};

/// Account data returned from the repository.
///
/// Credential material stays in the struct for the auth layer but is never serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    pub id: i32,
    pub email: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub avatar: Option<String>,
    pub confirmed: bool,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    pub role: Role,
    pub created_at: String,
    pub updated_at: String,
}

impl From<users::Model> for Account {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            email: model.email,
            username: model.username,
            password: model.password,
            avatar: model.avatar,
            confirmed: model.confirmed,
            refresh_token: model.refresh_token,
            role: model.role,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Fields supplied by a signup request.
#[derive(Debug, Clone, Deserialize)]
pub struct NewAccount {
    pub email: String,
    pub username: String,
    pub password: String,
}

/// Account queries and updates.
///
/// Every operation runs on the session handed in by the caller, either a pooled
/// connection or an open transaction. Writes on a transaction become durable only
/// when the caller commits it.
pub struct UserRepository {
    avatars: Option<Arc<dyn AvatarProvider>>,
}

impl UserRepository {
    #[must_use]
    pub const fn new(avatars: Option<Arc<dyn AvatarProvider>>) -> Self {
        Self { avatars }
    }

    #[must_use]
    pub fn with_avatars(provider: impl AvatarProvider + 'static) -> Self {
        Self::new(Some(Arc::new(provider)))
    }

    #[must_use]
    pub const fn without_avatars() -> Self {
        Self::new(None)
    }

    /// Get account by ID
    pub async fn get_by_id<C: ConnectionTrait>(
        &self,
        db: &C,
        id: i32,
    ) -> AccountResult<Option<Account>> {
        let user = Users::find_by_id(id).one(db).await?;
        Ok(user.map(Account::from))
    }

    /// Get account by email
    pub async fn get_by_email<C: ConnectionTrait>(
        &self,
        db: &C,
        email: &str,
    ) -> AccountResult<Option<Account>> {
        debug!("Looking up account by email: {}", email);
        Ok(find_model_by_email(db, email).await?.map(Account::from))
    }

    /// Get account by username
    pub async fn get_by_username<C: ConnectionTrait>(
        &self,
        db: &C,
        username: &str,
    ) -> AccountResult<Option<Account>> {
        debug!("Looking up account by username: {}", username);
        let user = Users::find()
            .filter(users::Column::Username.eq(username))
            .one(db)
            .await?;

        Ok(user.map(Account::from))
    }

    /// Check that no account uses this username yet
    pub async fn is_username_unique<C: ConnectionTrait>(
        &self,
        db: &C,
        username: &str,
    ) -> AccountResult<bool> {
        let existing = Users::find()
            .filter(users::Column::Username.eq(username))
            .count(db)
            .await?;

        Ok(existing == 0)
    }

    /// Creates an account after checking the username is free.
    ///
    /// The check and the insert are not atomic. Two concurrent signups can both pass
    /// the check; the unique index then rejects the second insert, which surfaces
    /// as the same [`AccountError::DuplicateUsername`].
    pub async fn create<C: ConnectionTrait>(
        &self,
        db: &C,
        body: NewAccount,
        role: Role,
    ) -> AccountResult<Account> {
        if !self.is_username_unique(db, &body.username).await? {
            info!("Rejected signup, username taken: {}", body.username);
            return Err(AccountError::DuplicateUsername);
        }

        let avatar = match &self.avatars {
            Some(provider) => resolve_avatar(provider.as_ref(), &body.email).await,
            None => AvatarOutcome::NoImage,
        };

        let now = chrono::Utc::now().to_rfc3339();
        let inserted = Users::insert(users::ActiveModel {
            email: Set(body.email),
            username: Set(body.username),
            password: Set(body.password),
            avatar: Set(avatar.into_url()),
            confirmed: Set(false),
            refresh_token: Set(None),
            role: Set(role),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        })
        .exec(db)
        .await
        .map_err(AccountError::from_insert)?;

        let account = reload(db, inserted.last_insert_id).await?;
        metrics::counter!("accounts_created_total").increment(1);
        info!(
            "Created account {} ({}) with role {}",
            account.username,
            account.id,
            account.role.as_str()
        );

        Ok(account)
    }

    /// Stores a new refresh token, or clears it with `None`.
    pub async fn update_token<C: ConnectionTrait>(
        &self,
        db: &C,
        account: &Account,
        token: Option<&str>,
    ) -> AccountResult<()> {
        let now = chrono::Utc::now().to_rfc3339();
        let result = Users::update_many()
            .col_expr(users::Column::RefreshToken, Expr::value(token.map(str::to_string)))
            .col_expr(users::Column::UpdatedAt, Expr::value(now))
            .filter(users::Column::Id.eq(account.id))
            .exec(db)
            .await?;

        if result.rows_affected == 0 {
            return Err(AccountError::not_found(format!("id {}", account.id)));
        }

        debug!("Updated refresh token for account {}", account.id);
        Ok(())
    }

    /// Marks the email as verified. There is no way back to unconfirmed.
    pub async fn confirm_email<C: ConnectionTrait>(&self, db: &C, email: &str) -> AccountResult<()> {
        let user = require_by_email(db, email).await?;
        if user.confirmed {
            debug!("Email already confirmed: {}", email);
            return Ok(());
        }

        let mut active: users::ActiveModel = user.into();
        active.confirmed = Set(true);
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());
        active.update(db).await?;

        info!("Confirmed email: {}", email);
        Ok(())
    }

    /// Set or clear the avatar URL and return the updated account
    pub async fn update_avatar_url<C: ConnectionTrait>(
        &self,
        db: &C,
        email: &str,
        url: Option<&str>,
    ) -> AccountResult<Account> {
        let user = require_by_email(db, email).await?;
        let id = user.id;

        let mut active: users::ActiveModel = user.into();
        active.avatar = Set(url.map(str::to_string));
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());
        active.update(db).await?;

        info!("Updated avatar for {}", email);
        reload(db, id).await
    }

    /// All accounts in primary key order, without paging.
    pub async fn list_all<C: ConnectionTrait>(&self, db: &C) -> AccountResult<Vec<Account>> {
        let users = Users::find()
            .order_by_asc(users::Column::Id)
            .all(db)
            .await?;

        Ok(users.into_iter().map(Account::from).collect())
    }

    /// Change the role and return the updated account
    pub async fn update_role<C: ConnectionTrait>(
        &self,
        db: &C,
        email: &str,
        role: Role,
    ) -> AccountResult<Account> {
        let user = require_by_email(db, email).await?;
        let id = user.id;

        let mut active: users::ActiveModel = user.into();
        active.role = Set(role);
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());
        active.update(db).await?;

        info!("Changed role of {} to {}", email, role.as_str());
        reload(db, id).await
    }

    /// Number of photos owned by the account. Unknown usernames count as zero.
    pub async fn count_photos<C: ConnectionTrait>(
        &self,
        db: &C,
        username: &str,
    ) -> AccountResult<u64> {
        let count = Photos::find()
            .select_only()
            .column(photos::Column::Id)
            .inner_join(Users)
            .filter(users::Column::Username.eq(username))
            .count(db)
            .await?;

        Ok(count)
    }
}

async fn find_model_by_email<C: ConnectionTrait>(
    db: &C,
    email: &str,
) -> AccountResult<Option<users::Model>> {
    let user = Users::find()
        .filter(users::Column::Email.eq(email))
        .one(db)
        .await?;

    Ok(user)
}

async fn require_by_email<C: ConnectionTrait>(db: &C, email: &str) -> AccountResult<users::Model> {
    find_model_by_email(db, email)
        .await?
        .ok_or_else(|| AccountError::not_found(email))
}

async fn reload<C: ConnectionTrait>(db: &C, id: i32) -> AccountResult<Account> {
    Users::find_by_id(id)
        .one(db)
        .await?
        .map(Account::from)
        .ok_or_else(|| AccountError::not_found(format!("id {id}")))
}
