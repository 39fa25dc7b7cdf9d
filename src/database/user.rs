use std::sync::Arc;
use std::time::Duration;

use sqlx::{PgPool, Postgres, Transaction};

use crate::auth::{TokenService, hash_password, verify_password};
use crate::cache::{self, Cache, keys};
use crate::database::pagination::ListQuery;
use crate::error::AppError;
use crate::models::{
    AuthUser, ChangePasswordRequest, CreateUserRequest, LoginRequest, LoginResponse,
    ResponsePagination, ResponseUser, Role, Status, TerminateUserRequest, UpdateUserRequest, User,
    UserDetails,
};

const USER_COLUMNS: &str = "id, username, phone, password, role, status, created_at, updated_at";
const PUBLIC_COLUMNS: &str = "id, username, phone, role, status, created_at";

/// Transactional access to the `users` table, with list cache invalidation.
#[derive(Clone)]
pub struct UserStore {
    pool: PgPool,
    cache: Arc<dyn Cache>,
    tokens: Arc<TokenService>,
    cache_ttl: Duration,
}

impl UserStore {
    pub fn new(
        pool: PgPool,
        cache: Arc<dyn Cache>,
        tokens: Arc<TokenService>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            pool,
            cache,
            tokens,
            cache_ttl,
        }
    }

    /// Clears every cache family derived from the users table.
    pub async fn invalidate_caches(&self) -> Result<(), AppError> {
        for pattern in keys::USER_TABLE_PATTERNS {
            let removed = self.cache.clear_pattern(pattern).await?;
            tracing::debug!(pattern, removed, "invalidated user caches");
        }
        Ok(())
    }

    /// Invalidates caches, commits, then invalidates again. A failed first
    /// invalidation drops `tx`, which rolls the write back. The second pass
    /// evicts lists re-cached by reads that ran before the commit landed.
    async fn commit(&self, tx: Transaction<'_, Postgres>) -> Result<(), AppError> {
        self.invalidate_caches().await?;
        tx.commit().await?;

        if let Err(e) = self.invalidate_caches().await {
            tracing::warn!(error = %e, "post-commit cache invalidation failed");
        }
        Ok(())
    }

    pub async fn list(&self, query: &ListQuery) -> Result<ResponsePagination, AppError> {
        let key = keys::user_list_key(&query.encoded);
        cache::get_or_load(self.cache.as_ref(), &key, self.cache_ttl, || {
            self.load_page(query)
        })
        .await
    }

    async fn load_page(&self, query: &ListQuery) -> Result<ResponsePagination, AppError> {
        // total first so the pagination block matches the page we return
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            "SELECT {PUBLIC_COLUMNS} FROM users ORDER BY {} LIMIT $1 OFFSET $2",
            query.order_clause()
        );
        // ORDER BY comes from a whitelist, only LIMIT/OFFSET are bound
        let data = sqlx::query_as::<_, ResponseUser>(&sql)
            .bind(query.page_size)
            .bind(query.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(ResponsePagination {
            data,
            pagination: query.paginate(total),
        })
    }

    pub async fn find(&self, id: i64) -> Result<ResponseUser, AppError> {
        let sql = format!("SELECT {PUBLIC_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, ResponseUser>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("user".into()))
    }

    pub async fn details(&self, id: i64) -> Result<UserDetails, AppError> {
        let sql = format!("SELECT {PUBLIC_COLUMNS}, updated_at FROM users WHERE id = $1");
        sqlx::query_as::<_, UserDetails>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("user".into()))
    }

    pub async fn create(&self, req: CreateUserRequest) -> Result<User, AppError> {
        let role = req.role.as_deref().and_then(Role::parse).unwrap_or_default();
        // hash before the transaction opens
        let password = hash_password(&req.password)?;

        let mut tx = self.pool.begin().await?;
        let sql = format!(
            "INSERT INTO users (username, phone, password, role) VALUES ($1, $2, $3, $4) \
             RETURNING {USER_COLUMNS}"
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(&req.username)
            .bind(&req.phone)
            .bind(&password)
            .bind(role)
            .fetch_one(&mut *tx)
            .await
            .map_err(phone_conflict)?;
        // clear list caches and commit
        self.commit(tx).await?;

        tracing::info!(user_id = user.id, role = role.as_str(), "user created");
        Ok(user)
    }

    pub async fn update(
        &self,
        actor: &AuthUser,
        id: i64,
        req: UpdateUserRequest,
    ) -> Result<User, AppError> {
        let role = req.role.as_deref().and_then(Role::parse);
        let status = req.status.as_deref().and_then(Status::parse);

        // absent fields bind NULL and COALESCE keeps the stored value
        let mut tx = self.pool.begin().await?;
        let sql = format!(
            "UPDATE users SET \
                username = COALESCE($1, username), \
                phone = COALESCE($2, phone), \
                role = COALESCE($3, role), \
                status = COALESCE($4, status), \
                updated_at = NOW() \
             WHERE id = $5 RETURNING {USER_COLUMNS}"
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(req.username)
            .bind(req.phone)
            .bind(role)
            .bind(status)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(phone_conflict)?
            .ok_or_else(|| AppError::NotFound("user".into()))?;
        self.commit(tx).await?;

        tracing::info!(actor = actor.id, user_id = id, "user updated");
        Ok(user)
    }

    pub async fn delete(&self, actor: &AuthUser, id: i64) -> Result<(), AppError> {
        self.hard_delete(id).await?;
        tracing::info!(actor = actor.id, user_id = id, "user deleted");
        Ok(())
    }

    /// Issues the same hard delete as [`UserStore::delete`]; the requested
    /// status is only logged.
    pub async fn terminate(
        &self,
        actor: &AuthUser,
        id: i64,
        req: TerminateUserRequest,
    ) -> Result<(), AppError> {
        self.hard_delete(id).await?;
        tracing::info!(
            actor = actor.id,
            user_id = id,
            requested_status = req.status.as_deref().unwrap_or("-"),
            "user terminated"
        );
        Ok(())
    }

    async fn hard_delete(&self, id: i64) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        // nothing deleted: tx drops and rolls back
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("user".into()));
        }
        self.commit(tx).await
    }

    /// Replaces the password after checking the old one. List caches never
    /// hold passwords, so they are left alone.
    pub async fn change_password(
        &self,
        actor: &AuthUser,
        id: i64,
        req: ChangePasswordRequest,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        // lock the row so concurrent changes serialize
        let current: Option<String> =
            sqlx::query_scalar("SELECT password FROM users WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let current = current.ok_or_else(|| AppError::NotFound("user".into()))?;

        if !verify_password(&req.old_password, &current)? {
            return Err(AppError::InvalidCredentials);
        }

        // list caches never hold hashes, plain commit is enough
        let password = hash_password(&req.new_password)?;
        sqlx::query("UPDATE users SET password = $1, updated_at = NOW() WHERE id = $2")
            .bind(&password)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(actor = actor.id, user_id = id, "password changed");
        Ok(())
    }

    pub async fn login(&self, req: LoginRequest) -> Result<LoginResponse, AppError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE phone = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(&req.phone)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("user".into()))?;

        if !verify_password(&req.password, &user.password)? {
            tracing::info!(user_id = user.id, "login rejected");
            return Err(AppError::InvalidCredentials);
        }

        // the token carries a snapshot, not a live reference to the row
        let token = self.tokens.issue(&user.snapshot())?;
        tracing::info!(user_id = user.id, "login succeeded");

        Ok(LoginResponse {
            id: user.id,
            username: user.username,
            phone: user.phone,
            role: user.role,
            status: user.status,
            token,
        })
    }
}

fn phone_conflict(e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return AppError::Conflict("a user with this phone already exists".into());
        }
    }
    AppError::Database(e)
}
