use crate::models::{ListOptions, NewProperty, PropertyPatch, PropertyRecord, ScrapeStatus};
use crate::store::{PropertyStore, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite};
use std::str::FromStr;
use tracing::{debug, info};

const COLUMNS: &str = "id, title, location, price, image_url, status, url, created_at, updated_at";

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS properties (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL DEFAULT '',
    location TEXT NOT NULL DEFAULT '',
    price TEXT NOT NULL DEFAULT '',
    image_url TEXT NOT NULL DEFAULT '',
    status TEXT NOT NULL DEFAULT 'PENDING',
    url TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
"#;

#[derive(Debug, sqlx::FromRow)]
struct PropertyRow {
    id: i64,
    title: String,
    location: String,
    price: String,
    image_url: String,
    status: String,
    url: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PropertyRow> for PropertyRecord {
    type Error = StoreError;

    fn try_from(row: PropertyRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<ScrapeStatus>()
            .map_err(|_| StoreError::Corrupt(format!("row {} has status {:?}", row.id, row.status)))?;

        Ok(PropertyRecord {
            id: row.id,
            title: row.title,
            location: row.location,
            price: row.price,
            image_url: row.image_url,
            url: row.url,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// SQLite-backed property store
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `url` and ensure the schema exists
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        info!("Connected to property store at {}", url);
        Self::with_pool(pool).await
    }

    /// Private in-memory database; a single long-lived connection keeps it alive
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        sqlx::query(SCHEMA).execute(&pool).await?;
        Ok(Self { pool })
    }

    fn select_where(column: &str) -> String {
        format!("SELECT {} FROM properties WHERE {} = ?", COLUMNS, column)
    }
}

#[async_trait]
impl PropertyStore for SqliteStore {
    async fn create(&self, property: NewProperty) -> Result<PropertyRecord, StoreError> {
        let now = Utc::now();
        let sql = format!(
            "INSERT INTO properties (title, location, price, image_url, status, url, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING {}",
            COLUMNS
        );

        let result = sqlx::query_as::<_, PropertyRow>(&sql)
            .bind(&property.title)
            .bind(&property.location)
            .bind(&property.price)
            .bind(&property.image_url)
            .bind(property.status.as_str())
            .bind(&property.url)
            .bind(now)
            .bind(now)
            .fetch_one(&self.pool)
            .await;

        match result {
            Ok(row) => {
                debug!(id = row.id, url = %row.url, status = %row.status, "Created property");
                row.try_into()
            }
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::Duplicate { url: property.url })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<PropertyRecord>, StoreError> {
        sqlx::query_as::<_, PropertyRow>(&Self::select_where("id"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(PropertyRecord::try_from)
            .transpose()
    }

    async fn get_by_url(&self, url: &str) -> Result<Option<PropertyRecord>, StoreError> {
        sqlx::query_as::<_, PropertyRow>(&Self::select_where("url"))
            .bind(url)
            .fetch_optional(&self.pool)
            .await?
            .map(PropertyRecord::try_from)
            .transpose()
    }

    async fn update(&self, id: i64, patch: PropertyPatch) -> Result<PropertyRecord, StoreError> {
        if patch.is_empty() {
            return self.get_by_id(id).await?.ok_or(StoreError::NotFound(id));
        }

        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE properties SET ");
        {
            let mut set = builder.separated(", ");
            if let Some(title) = patch.title {
                set.push("title = ").push_bind_unseparated(title);
            }
            if let Some(location) = patch.location {
                set.push("location = ").push_bind_unseparated(location);
            }
            if let Some(price) = patch.price {
                set.push("price = ").push_bind_unseparated(price);
            }
            if let Some(image_url) = patch.image_url {
                set.push("image_url = ").push_bind_unseparated(image_url);
            }
            if let Some(status) = patch.status {
                set.push("status = ").push_bind_unseparated(status.as_str());
            }
            set.push("updated_at = ").push_bind_unseparated(Utc::now());
        }
        builder
            .push(" WHERE id = ")
            .push_bind(id)
            .push(format!(" RETURNING {}", COLUMNS));

        let row = builder
            .build_query_as::<PropertyRow>()
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound(id))?;

        row.try_into()
    }

    async fn update_status(&self, id: i64, status: ScrapeStatus) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE properties SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }

        debug!(id, status = %status, "Updated property status");
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM properties WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn list(&self, options: &ListOptions) -> Result<Vec<PropertyRecord>, StoreError> {
        let mut builder = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM properties", COLUMNS));

        if let Some(status) = options.status {
            builder.push(" WHERE status = ").push_bind(status.as_str());
        }

        // Sort column and direction come from closed enums, never from raw input
        let order = options.sort_order.keyword();
        builder.push(format!(
            " ORDER BY {} {}, id {}",
            options.sort_by.column(),
            order,
            order
        ));
        builder
            .push(" LIMIT ")
            .push_bind(options.limit)
            .push(" OFFSET ")
            .push_bind(options.offset);

        builder
            .build_query_as::<PropertyRow>()
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(PropertyRecord::try_from)
            .collect()
    }

    async fn count(&self, status: Option<ScrapeStatus>) -> Result<i64, StoreError> {
        let total: i64 = match status {
            Some(status) => {
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM properties WHERE status = ?")
                    .bind(status.as_str())
                    .fetch_one(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM properties")
                    .fetch_one(&self.pool)
                    .await?
            }
        };
        Ok(total)
    }
}
