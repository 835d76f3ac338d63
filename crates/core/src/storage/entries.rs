//! Entry CRUD operations.
//!
//! Entries are keyed by `(bucket_id, request_url)`, where the URL is the
//! normalized request URL without its fragment. Writing an entry deletes any
//! row under the same key and inserts a fresh one, so a replaced entry moves
//! to the end of the bucket's insertion order.

use bytes::Bytes;
use http::{Method, StatusCode};
use tokio_rusqlite::params;
use url::Url;

use super::connection::Storage;
use super::headers;
use crate::message::{CacheRequest, CacheResponse};
use crate::{Error, normalize};

/// An entry ready to be written, with headers already encoded.
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub request_url: String,
    pub request_method: String,
    pub request_headers: Vec<u8>,
    pub response_status: u16,
    pub response_status_text: Option<String>,
    pub response_headers: Vec<u8>,
    pub response_body: Option<Vec<u8>>,
}

impl NewEntry {
    pub fn from_pair(request: &CacheRequest, response: &CacheResponse) -> Result<Self, Error> {
        Ok(Self {
            request_url: normalize::entry_key(&request.url),
            request_method: request.method.as_str().to_string(),
            request_headers: headers::encode(&request.headers)?,
            response_status: response.status.as_u16(),
            response_status_text: response.status_text.clone(),
            response_headers: headers::encode(&response.headers)?,
            response_body: response.body.as_ref().map(|b| b.to_vec()),
        })
    }
}

/// An entry read back from a bucket.
#[derive(Debug, Clone)]
pub struct StoredEntry {
    pub id: i64,
    pub request: CacheRequest,
    pub response: CacheResponse,
    /// Milliseconds since the Unix epoch.
    pub inserted_at: i64,
}

struct EntryRow {
    id: i64,
    request_url: String,
    request_method: String,
    request_headers: Vec<u8>,
    response_status: u16,
    response_status_text: Option<String>,
    response_headers: Vec<u8>,
    response_body: Option<Vec<u8>>,
    inserted_at: i64,
}

impl EntryRow {
    fn decode(self) -> Result<StoredEntry, Error> {
        let url = Url::parse(&self.request_url)?;
        let method = Method::from_bytes(self.request_method.as_bytes())
            .map_err(|e| Error::InvalidInput(format!("stored method {}: {e}", self.request_method)))?;
        let status = StatusCode::from_u16(self.response_status)
            .map_err(|e| Error::InvalidInput(format!("stored status {}: {e}", self.response_status)))?;

        Ok(StoredEntry {
            id: self.id,
            request: CacheRequest { url, method, headers: headers::decode(&self.request_headers)? },
            response: CacheResponse {
                status,
                status_text: self.response_status_text,
                headers: headers::decode(&self.response_headers)?,
                body: self.response_body.map(Bytes::from),
            },
            inserted_at: self.inserted_at,
        })
    }
}

impl Storage {
    /// Write a set of entries into one bucket as a single transaction.
    ///
    /// Either every entry is replaced/inserted or, on any failure, none are.
    pub async fn put_entries(&self, bucket_id: i64, entries: Vec<NewEntry>) -> Result<(), Error> {
        let inserted_at = chrono::Utc::now().timestamp_millis();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                for entry in &entries {
                    tx.execute(
                        "DELETE FROM entries WHERE bucket_id = ?1 AND request_url = ?2",
                        params![bucket_id, entry.request_url],
                    )?;
                    tx.execute(
                        "INSERT INTO entries (
                            bucket_id, request_url, request_method, request_headers,
                            response_headers, response_status, response_status_text,
                            response_body, inserted_at
                        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                        params![
                            bucket_id,
                            entry.request_url,
                            entry.request_method,
                            entry.request_headers,
                            entry.response_headers,
                            entry.response_status,
                            entry.response_status_text,
                            entry.response_body,
                            inserted_at,
                        ],
                    )?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// All entries of a bucket, oldest first.
    pub async fn list_entries(&self, bucket_id: i64) -> Result<Vec<StoredEntry>, Error> {
        self.conn
            .call(move |conn| -> Result<Vec<StoredEntry>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT
                    id, request_url, request_method, request_headers, response_status,
                    response_status_text, response_headers, response_body, inserted_at
                FROM entries WHERE bucket_id = ?1 ORDER BY id ASC",
                )?;

                let rows = stmt.query_map(params![bucket_id], |row| {
                    Ok(EntryRow {
                        id: row.get(0)?,
                        request_url: row.get(1)?,
                        request_method: row.get(2)?,
                        request_headers: row.get(3)?,
                        response_status: row.get(4)?,
                        response_status_text: row.get(5)?,
                        response_headers: row.get(6)?,
                        response_body: row.get(7)?,
                        inserted_at: row.get(8)?,
                    })
                })?;

                let mut entries = Vec::new();
                for row in rows {
                    entries.push(row?.decode()?);
                }
                Ok(entries)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete the given entry ids from one bucket.
    ///
    /// Returns the number of deleted entries.
    pub async fn delete_entries(&self, bucket_id: i64, ids: Vec<i64>) -> Result<u64, Error> {
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let tx = conn.transaction()?;
                let mut deleted = 0u64;
                for id in &ids {
                    let removed =
                        tx.execute("DELETE FROM entries WHERE bucket_id = ?1 AND id = ?2", params![bucket_id, id])?;
                    deleted += removed as u64;
                }
                tx.commit()?;
                Ok(deleted)
            })
            .await
            .map_err(Error::from)
    }

    /// Number of entries held by a bucket.
    #[cfg(test)]
    pub(crate) async fn count_entries(&self, bucket_id: i64) -> Result<u64, Error> {
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE bucket_id = ?1", params![bucket_id], |row| {
                        row.get(0)
                    })?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}
