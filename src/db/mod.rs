use crate::types::ApiError;
use diesel::pg::PgConnection;
use diesel::r2d2::ConnectionManager;
use diesel::result::Error as DieselError;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use dotenv::dotenv;
use error_chain::error_chain;
use rocket::outcome::{try_outcome, Outcome};
use rocket::request::{self, FromRequest};
use rocket::tokio::task;
use rocket::{Request, State};
use std::env;
use std::time::Duration;
use tracing::{error, info, warn};

pub mod schema;
pub mod seed;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

const DEFAULT_POOL_SIZE: u32 = 10;
const DEFAULT_TIMEOUT_SECS: u64 = 5;

// An alias to the type for a pool of Diesel Postgres connections.
pub type Pool = r2d2::Pool<ConnectionManager<PgConnection>>;

pub struct DbConnection(Pool);

error_chain! {
    foreign_links {
        Var(::std::env::VarError);
        ParseInt(::std::num::ParseIntError);
        R2D2(r2d2::Error);
        Diesel(DieselError);
        Io(::std::io::Error);
        Json(::serde_json::Error);
    }

    errors {
        Migration(reason: String) {
            description("migration failed")
            display("migration failed: {}", reason)
        }
    }
}

/// Hands handlers the managed pool. If no pool is managed, fails with an
/// `InternalServerError` status. Connections are checked out inside
/// [`DbConnection::run`], off the async workers.
#[rocket::async_trait]
impl<'r> FromRequest<'r> for DbConnection {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> request::Outcome<DbConnection, ()> {
        let pool = try_outcome!(request.guard::<&State<Pool>>().await);
        Outcome::Success(DbConnection(pool.inner().clone()))
    }
}

impl DbConnection {
    /// Runs `f` with a pooled connection on the blocking thread pool. An empty
    /// pool after the configured timeout surfaces as 503.
    pub async fn run<F, T>(&self, f: F) -> std::result::Result<T, ApiError>
    where
        F: FnOnce(&mut PgConnection) -> std::result::Result<T, ApiError> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.0.clone();
        task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(|e| {
                warn!(error = %e, "no database connection available");
                ApiError::Unavailable
            })?;
            f(&mut *conn)
        })
        .await
        .map_err(|e| {
            error!(error = %e, "database task did not complete");
            ApiError::Internal
        })?
    }
}

/// Connection settings read from the environment (and `.env`, if present).
#[derive(Debug, Clone, PartialEq)]
pub struct PoolSettings {
    pub database_url: String,
    pub max_size: u32,
    pub timeout: Duration,
}

impl PoolSettings {
    pub fn new<S: Into<String>>(database_url: S) -> Self {
        PoolSettings {
            database_url: database_url.into(),
            max_size: DEFAULT_POOL_SIZE,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        let mut settings = PoolSettings::new(env::var("DATABASE_URL")?);
        if let Ok(size) = env::var("DATABASE_POOL_SIZE") {
            settings.max_size = size.parse()?;
        }
        if let Ok(secs) = env::var("DATABASE_TIMEOUT_SECS") {
            settings.timeout = Duration::from_secs(secs.parse()?);
        }
        Ok(settings)
    }

    fn builder(&self) -> r2d2::Builder<ConnectionManager<PgConnection>> {
        Pool::builder()
            .max_size(self.max_size)
            .connection_timeout(self.timeout)
    }

    /// Builds the pool, failing unless a first connection can be opened.
    pub fn build(&self) -> Result<Pool> {
        let manager = ConnectionManager::<PgConnection>::new(self.database_url.as_str());
        Ok(self.builder().build(manager)?)
    }

    /// Builds the pool without touching the database.
    pub fn build_lazy(&self) -> Pool {
        let manager = ConnectionManager::<PgConnection>::new(self.database_url.as_str());
        self.builder().build_unchecked(manager)
    }
}

pub fn init_pool() -> Result<Pool> {
    let settings = PoolSettings::from_env()?;
    info!(
        max_size = settings.max_size,
        timeout_secs = settings.timeout.as_secs(),
        "creating database pool"
    );
    settings.build()
}

pub fn run_migrations(connection: &mut PgConnection) -> Result<()> {
    let applied = connection
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| Error::from(ErrorKind::Migration(e.to_string())))?;
    for migration in applied {
        info!(%migration, "applied migration");
    }
    Ok(())
}
