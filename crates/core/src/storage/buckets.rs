//! Bucket CRUD operations.
//!
//! A bucket is one named cache. Creation is insert-or-ignore followed by a
//! lookup, both inside a single call on the database thread, so concurrent
//! opens of the same name resolve to one row.

use super::connection::Storage;
use crate::Error;
use tokio_rusqlite::rusqlite::OptionalExtension;
use tokio_rusqlite::params;

/// A named bucket row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    pub id: i64,
    pub name: String,
}

impl Storage {
    /// Create the bucket if it is missing and return its id.
    pub async fn upsert_bucket(&self, name: &str) -> Result<i64, Error> {
        Ok(self.ensure_bucket(name).await?.0)
    }

    /// Create the bucket if it is missing; returns its id and whether this
    /// call inserted it.
    pub async fn ensure_bucket(&self, name: &str) -> Result<(i64, bool), Error> {
        let name = name.to_string();
        let created_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(i64, bool), Error> {
                let inserted = conn.execute(
                    "INSERT OR IGNORE INTO buckets (name, created_at) VALUES (?1, ?2)",
                    params![name, created_at],
                )?;
                let id = conn.query_row("SELECT id FROM buckets WHERE name = ?1", params![name], |row| row.get(0))?;
                Ok((id, inserted > 0))
            })
            .await
            .map_err(Error::from)
    }

    /// Look up a bucket id by name.
    pub async fn find_bucket(&self, name: &str) -> Result<Option<i64>, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<Option<i64>, Error> {
                let id = conn
                    .query_row("SELECT id FROM buckets WHERE name = ?1", params![name], |row| row.get(0))
                    .optional()?;
                Ok(id)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a bucket by name; its entries go with it.
    ///
    /// Returns whether a bucket existed.
    pub async fn delete_bucket(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM buckets WHERE name = ?1", params![name])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// All buckets in creation order.
    pub async fn list_buckets(&self) -> Result<Vec<Bucket>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<Bucket>, Error> {
                let mut stmt = conn.prepare("SELECT id, name FROM buckets ORDER BY id ASC")?;
                let rows = stmt.query_map([], |row| Ok(Bucket { id: row.get(0)?, name: row.get(1)? }))?;
                let buckets = rows.collect::<Result<Vec<_>, _>>()?;
                Ok(buckets)
            })
            .await
            .map_err(Error::from)
    }
}
