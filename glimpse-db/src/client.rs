use crate::{
    record::{AuthenticationRecord, UserRecord},
    transaction::DbTransaction,
};
use glimpse_common::{
    model::{
        GlimpseSnowflakeGenerator, Id, ModelValidationError,
        auth::{AuthToken, AuthTokenHash, AuthTokenHashError, Authentication},
        user::{CreateUser, User, UserMarker},
    },
    snowflake::{ProcessId, SnowflakeTimeError, WorkerId},
    util::PositiveDuration,
};
use glimpse_core::{
    error::StoreError,
    store::{self, Store},
};
use sqlx::{PgPool, error::ErrorKind, migrate::MigrateError, query, query_as};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::debug;

pub type Result<T, E = DbError> = std::result::Result<T, E>;

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

#[derive(Debug, Error)]
pub enum DbError {
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error("Could not generate an id: {0}")]
    Snowflake(#[from] SnowflakeTimeError),
    #[error(transparent)]
    AuthTokenHash(#[from] AuthTokenHashError),
    #[error("The email address is already registered")]
    EmailTaken,
    #[error("Migrating the database failed: {0}")]
    Migrate(#[from] MigrateError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl DbError {
    /// Whether the database could not be reached at all, as opposed to rejecting the query.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, DbError::Sqlx(err) if is_connectivity_error(err))
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        match value {
            DbError::Data(err) => StoreError::Data(err),
            DbError::Sqlx(err) if is_connectivity_error(&err) => {
                StoreError::Unavailable(Box::new(err))
            }
            DbError::Sqlx(err) if is_constraint_violation(&err) => {
                StoreError::Constraint(Box::new(err))
            }
            other => StoreError::Other(Box::new(other)),
        }
    }
}

fn is_connectivity_error(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
    )
}

fn is_constraint_violation(err: &sqlx::Error) -> bool {
    err.as_database_error().is_some_and(|db_err| {
        matches!(
            db_err.kind(),
            ErrorKind::UniqueViolation
                | ErrorKind::ForeignKeyViolation
                | ErrorKind::NotNullViolation
                | ErrorKind::CheckViolation
        )
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db_err| matches!(db_err.kind(), ErrorKind::UniqueViolation))
}

/// Shared between the client and every transaction it opens, so ids stay unique per process.
#[derive(Clone, Debug)]
pub(crate) struct IdGenerator(Arc<Mutex<GlimpseSnowflakeGenerator>>);

impl IdGenerator {
    pub(crate) fn next<Marker>(&self) -> Result<Id<Marker>> {
        let snowflake = self
            .0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .generate()?;

        Ok(Id::new(snowflake))
    }
}

#[derive(Debug)]
pub struct DbClient {
    pool: PgPool,
    ids: IdGenerator,
}

impl DbClient {
    #[must_use]
    pub fn new(pool: PgPool, worker_id: WorkerId, process_id: ProcessId) -> Self {
        let snowflake_generator = GlimpseSnowflakeGenerator::new(worker_id, process_id);

        Self {
            pool,
            ids: IdGenerator(Arc::new(Mutex::new(snowflake_generator))),
        }
    }

    pub async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await?;
        Ok(())
    }

    pub async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(
            "
            SELECT
                users.user_snowflake,
                users.email
            FROM
                users.users
            WHERE
                users.user_snowflake = $1
            ",
        )
        .bind(user_id.to_db())
        .fetch_optional(&self.pool)
        .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    /// Creates the user together with its first auth token. The plain token is returned once
    /// and never stored.
    pub async fn register_user(
        &self,
        user: &CreateUser,
        token_ttl: Option<PositiveDuration>,
    ) -> Result<(User, AuthToken)> {
        let user_id = self.ids.next::<UserMarker>()?;
        let token = AuthToken::issue(user_id);
        let token_hash = token.hash()?;

        let mut tx = self.pool.begin().await?;

        let record = query_as::<_, UserRecord>(
            "
            INSERT INTO users.users (user_snowflake, email)
            VALUES ($1, $2)
            RETURNING users.user_snowflake, users.email
            ",
        )
        .bind(user_id.to_db())
        .bind(user.email.get())
        .fetch_one(&mut *tx)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                DbError::EmailTaken
            } else {
                DbError::Sqlx(err)
            }
        })?;

        query(
            "
            INSERT INTO users.authentications (token_hash, user_snowflake, expires_after_seconds)
            VALUES ($1, $2, $3)
            ",
        )
        .bind(token_hash.as_bytes())
        .bind(user_id.to_db())
        .bind(token_ttl.map(|ttl| ttl.get().whole_seconds()))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(%user_id, "Registered user");

        Ok((User::try_from(record)?, token))
    }

    pub async fn fetch_auth(&self, token_hash: &AuthTokenHash) -> Result<Option<Authentication>> {
        let record = query_as::<_, AuthenticationRecord>(
            "
            SELECT
                authentications.user_snowflake,
                authentications.token_hash,
                authentications.created_at,
                authentications.expires_after_seconds
            FROM
                users.authentications
            WHERE
                authentications.token_hash = $1
            ",
        )
        .bind(token_hash.as_bytes())
        .fetch_optional(&self.pool)
        .await?;

        let authentication = record.map(Authentication::try_from).transpose()?;
        Ok(authentication)
    }
}

impl Store for DbClient {
    type Transaction = DbTransaction;

    async fn begin(&self) -> store::Result<DbTransaction> {
        let tx = self.pool.begin().await.map_err(DbError::from)?;

        Ok(DbTransaction::new(tx, self.ids.clone()))
    }

    async fn snapshot(&self) -> store::Result<DbTransaction> {
        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(DbError::from)?;

        Ok(DbTransaction::new(tx, self.ids.clone()))
    }
}

#[cfg(test)]
mod tests {
    use crate::client::{DbError, IdGenerator};
    use glimpse_common::{
        model::{GlimpseSnowflakeGenerator, Id, ModelValidationError, post::PostMarker, user::Email},
        snowflake::{ProcessId, WorkerId},
    };
    use glimpse_core::error::StoreError;
    use std::sync::{Arc, Mutex};

    #[test]
    fn pool_failures_are_unavailable() {
        assert!(DbError::Sqlx(sqlx::Error::PoolTimedOut).is_unavailable());
        let err = StoreError::from(DbError::Sqlx(sqlx::Error::PoolTimedOut));
        assert!(err.is_unavailable());

        let err = StoreError::from(DbError::Sqlx(sqlx::Error::PoolClosed));
        assert!(err.is_unavailable());
    }

    #[test]
    fn missing_rows_are_not_unavailable() {
        assert!(!DbError::EmailTaken.is_unavailable());
        let err = StoreError::from(DbError::Sqlx(sqlx::Error::RowNotFound));
        assert!(matches!(err, StoreError::Other(_)));
    }

    #[test]
    fn data_errors_stay_data_errors() {
        let invalid = ModelValidationError::from(Email::new(String::new()).unwrap_err());
        let err = StoreError::from(DbError::Data(invalid));
        assert!(matches!(
            err,
            StoreError::Data(ModelValidationError::Email(_))
        ));
    }

    #[test]
    fn ids_are_unique_across_clones() {
        let generator = GlimpseSnowflakeGenerator::new(
            WorkerId::new(1).unwrap(),
            ProcessId::new(2).unwrap(),
        );
        let ids = IdGenerator(Arc::new(Mutex::new(generator)));
        let other = ids.clone();

        let first: Id<PostMarker> = ids.next().unwrap();
        let second: Id<PostMarker> = other.next().unwrap();

        assert!(second > first);
    }
}
