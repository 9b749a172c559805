use core::time::Duration;
use std::time::SystemTime;

use bb8_postgres::{PostgresConnectionManager, bb8};
use tokio_postgres::{NoTls, Row};

use crate::{review::Review, store::ReviewStore};

pub type ConnectionManager = PostgresConnectionManager<NoTls>;
pub type Pool = bb8::Pool<ConnectionManager>;
pub type PooledConnection<'a> = bb8::PooledConnection<'a, ConnectionManager>;
pub type DBError = tokio_postgres::Error;
pub type BB8Error = bb8::RunError<DBError>;
pub type DBResult<T> = Result<T, DBError>;

pub const CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection parameters, read once at startup and handed to [`PgStore::connect`].
#[derive(Clone, Debug, clap::Args)]
pub struct DbConfig {
    /// Database host name, or a socket directory when it starts with '/'
    #[arg(long = "db-host", env = "DB_HOST", default_value = "localhost")]
    pub host: String,
    #[arg(long = "db-port", env = "DB_PORT", default_value_t = 5432)]
    pub port: u16,
    #[arg(long = "db-name", env = "DB_NAME", default_value = "googlemaps")]
    pub dbname: String,
    #[arg(long = "db-user", env = "DB_USER", default_value = "reviewsuser")]
    pub user: String,
    #[arg(long = "db-password", env = "DB_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

impl DbConfig {
    pub fn to_pg(&self) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        if self.host.starts_with('/') {
            config.host_path(&self.host);
        } else {
            config.host(&self.host);
        }
        config
            .port(self.port)
            .user(&self.user)
            .dbname(&self.dbname)
            .connect_timeout(CONNECTION_TIMEOUT);
        if let Some(password) = &self.password {
            config.password(password);
        }
        config
    }
}

const SQL_SCHEMA: &str = "create table if not exists review (\
    id serial primary key, \
    id_review text unique, \
    caption text, \
    relative_date text, \
    retrieval_date timestamp, \
    rating double precision, \
    username text, \
    n_review_user integer, \
    url_user text, \
    timestamp timestamp, \
    replies text, \
    business_url text)";

/// Postgres-backed [`ReviewStore`] over the `review` table.
#[derive(Clone)]
pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    pub async fn connect(config: &DbConfig) -> DBResult<Self> {
        let manager = PostgresConnectionManager::new(config.to_pg(), NoTls);
        let pool = Pool::builder()
            .connection_timeout(CONNECTION_TIMEOUT)
            .build(manager)
            .await?;
        tracing::info!(target: "db", "connected to {}@{}/{}", config.user, config.host, config.dbname);
        Ok(Self { pool })
    }

    #[inline(always)]
    pub fn get_connection(&self) -> impl Future<Output = Result<PooledConnection<'_>, BB8Error>> {
        self.pool.get()
    }

    /// Creates the `review` table if it is missing.
    pub async fn bootstrap(&self) -> Result<(), BB8Error> {
        let conn = self.get_connection().await?;
        conn.batch_execute(SQL_SCHEMA).await?;
        Ok(())
    }

    pub async fn info(&self) -> Result<StoreInfo, BB8Error> {
        const SQL_TOTALS: &str = "select count(*), count(distinct business_url), count(distinct username), min(timestamp), max(timestamp) from review";
        const SQL_RATINGS: &str = "select rating, count(*) from review group by rating order by rating";
        const SQL_BUSINESSES: &str = "select business_url, count(*) from review group by business_url order by count(*) desc, business_url";

        let conn = self.get_connection().await?;
        let row = conn.query_one(SQL_TOTALS, &[]).await?;
        let ratings = conn
            .query(SQL_RATINGS, &[])
            .await?
            .into_iter()
            .map(|row| -> DBResult<(Option<f64>, i64)> { Ok((row.try_get(0)?, row.try_get(1)?)) })
            .collect::<DBResult<Vec<_>>>()?;
        let per_business = conn
            .query(SQL_BUSINESSES, &[])
            .await?
            .into_iter()
            .map(|row| -> DBResult<(Option<String>, i64)> { Ok((row.try_get(0)?, row.try_get(1)?)) })
            .collect::<DBResult<Vec<_>>>()?;

        Ok(StoreInfo {
            total: row.try_get(0)?,
            businesses: row.try_get(1)?,
            reviewers: row.try_get(2)?,
            oldest: row.try_get(3)?,
            newest: row.try_get(4)?,
            ratings,
            per_business,
        })
    }

    /// Newest reviews first, skipping the first `offset` of them.
    pub async fn recent(&self, business: Option<&str>, limit: i64, offset: i64) -> Result<Vec<StoredReview>, BB8Error> {
        const SQL: &str = "select id_review, business_url, username, rating, relative_date, timestamp, caption from review where $1::text is null or business_url = $1 order by timestamp desc nulls last, id desc limit $2 offset $3";

        let conn = self.get_connection().await?;
        let rows = conn.query(SQL, &[&business, &limit, &offset]).await?;
        Ok(rows.iter().map(StoredReview::from_row).collect::<DBResult<Vec<_>>>()?)
    }

    pub async fn count(&self, business: Option<&str>) -> Result<i64, BB8Error> {
        const SQL: &str = "select count(*) from review where $1::text is null or business_url = $1";

        let conn = self.get_connection().await?;
        Ok(conn.query_one(SQL, &[&business]).await?.try_get(0)?)
    }

    pub async fn clear(&self, business: Option<&str>) -> Result<u64, BB8Error> {
        const SQL: &str = "delete from review where $1::text is null or business_url = $1";

        let conn = self.get_connection().await?;
        let n = conn.execute(SQL, &[&business]).await?;
        tracing::info!(target: "db", "\x1b[31mdeleted {n} reviews\x1b[0m");
        Ok(n)
    }
}

impl ReviewStore for PgStore {
    async fn exists(&self, id: &str) -> anyhow::Result<bool> {
        const SQL: &str = "select 1 from review where id_review = $1";

        let conn = self.get_connection().await?;
        let stmt = conn.prepare(SQL).await?;
        Ok(conn.query_opt(&stmt, &[&id]).await?.is_some())
    }

    async fn upsert(&self, review: &Review) -> anyhow::Result<bool> {
        const SQL: &str = "insert into review (id_review, caption, relative_date, retrieval_date, rating, username, n_review_user, url_user, timestamp, replies, business_url) values ($1, $2, $3, $4, $5, $6, $7, $8, $9, null, $10) on conflict (id_review) do nothing";

        let raw = &review.raw;
        let conn = self.get_connection().await?;
        let stmt = conn.prepare(SQL).await?;
        let n_rows = conn
            .execute(
                &stmt,
                &[
                    &&*raw.id,
                    &raw.caption.as_deref(),
                    &raw.relative_date.as_deref(),
                    &review.retrieved,
                    &raw.rating,
                    &raw.author.as_deref(),
                    &raw.author_reviews,
                    &raw.author_url.as_deref(),
                    &review.resolved,
                    &&*review.business,
                ],
            )
            .await?;
        Ok(n_rows == 1)
    }
}

#[derive(Debug)]
pub struct StoreInfo {
    pub total: i64,
    pub businesses: i64,
    pub reviewers: i64,
    pub oldest: Option<SystemTime>,
    pub newest: Option<SystemTime>,
    pub ratings: Vec<(Option<f64>, i64)>,
    /// Review count per business, largest first.
    pub per_business: Vec<(Option<String>, i64)>,
}

#[derive(Debug)]
pub struct StoredReview {
    pub id: String,
    pub business: Option<String>,
    pub author: Option<String>,
    pub rating: Option<f64>,
    pub relative_date: Option<String>,
    pub resolved: Option<SystemTime>,
    pub caption: Option<String>,
}

impl StoredReview {
    fn from_row(row: &Row) -> DBResult<Self> {
        Ok(Self {
            id: row.try_get(0)?,
            business: row.try_get(1)?,
            author: row.try_get(2)?,
            rating: row.try_get(3)?,
            relative_date: row.try_get(4)?,
            resolved: row.try_get(5)?,
            caption: row.try_get(6)?,
        })
    }
}
