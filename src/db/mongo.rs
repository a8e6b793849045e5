//! MongoDB access layer for the lease collections
//!
//! One typed wrapper per collection, opened with its schema-declared
//! indexes. Reads carry a soft-delete guard: sibling tenancy services
//! flag records rather than removing them, and a flagged lease or token
//! must never resurface here.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::{
    options::{IndexOptions, UpdateModifications},
    results::UpdateResult,
    Client, Collection, IndexModel,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{error, info};

use crate::db::schemas::Metadata;
use crate::types::CovenantError;

/// Index definitions a schema wants on its collection
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

/// Access to the embedded audit metadata, for write-time stamping
pub trait MutMetadata {
    fn mut_metadata(&mut self) -> &mut Metadata;
}

/// Shared connection handle, one per process.
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Connect and ping. A short server-selection timeout keeps startup
    /// from hanging on an unreachable MongoDB.
    pub async fn new(uri: &str, db_name: &str) -> Result<Self, CovenantError> {
        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        };

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| CovenantError::Database(format!("Failed to connect to MongoDB: {}", e)))?;

        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| CovenantError::Database(format!("MongoDB ping failed: {}", e)))?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }

    /// Open a typed collection, applying its schema indexes.
    pub async fn collection<T>(&self, name: &str) -> Result<MongoCollection<T>, CovenantError>
    where
        T: Serialize + DeserializeOwned + Unpin + Send + Sync + Default + IntoIndexes + MutMetadata,
    {
        MongoCollection::new(&self.client, &self.db_name, name).await
    }

    /// Connection liveness probe for the readiness endpoint.
    pub async fn ping(&self) -> Result<(), CovenantError> {
        self.client
            .database(&self.db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| CovenantError::Database(format!("MongoDB ping failed: {}", e)))?;
        Ok(())
    }
}

/// Typed collection bound to one schema.
#[derive(Debug, Clone)]
pub struct MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync,
{
    inner: Collection<T>,
}

impl<T> MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync + Default + IntoIndexes + MutMetadata,
{
    async fn new(
        client: &Client,
        db_name: &str,
        collection_name: &str,
    ) -> Result<Self, CovenantError> {
        let collection = MongoCollection {
            inner: client.database(db_name).collection::<T>(collection_name),
        };
        collection.ensure_indexes().await?;
        Ok(collection)
    }

    async fn ensure_indexes(&self) -> Result<(), CovenantError> {
        let declared = T::into_indices();
        if declared.is_empty() {
            return Ok(());
        }

        let models: Vec<IndexModel> = declared
            .into_iter()
            .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
            .collect();

        self.inner
            .create_indexes(models)
            .await
            .map_err(|e| CovenantError::Database(format!("Failed to create indexes: {}", e)))?;

        Ok(())
    }

    /// The soft-delete guard every read filter carries.
    fn visible(mut filter: Document) -> Document {
        filter.insert("metadata.is_deleted", doc! { "$ne": true });
        filter
    }

    /// Insert a record, stamping its audit metadata. A caller-set `_id`
    /// is kept, so records can be linked before they are written.
    pub async fn insert_one(&self, mut item: T) -> Result<ObjectId, CovenantError> {
        let metadata = item.mut_metadata();
        metadata.is_deleted = false;
        metadata.created_at = Some(DateTime::now());
        metadata.updated_at = Some(DateTime::now());

        let result = self
            .inner
            .insert_one(item)
            .await
            .map_err(|e| CovenantError::Database(format!("Insert failed: {}", e)))?;

        result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| CovenantError::Database("Failed to get inserted ID".into()))
    }

    /// One record matching the filter, soft-deleted records excluded.
    pub async fn find_one(&self, filter: Document) -> Result<Option<T>, CovenantError> {
        self.inner
            .find_one(Self::visible(filter))
            .await
            .map_err(|e| CovenantError::Database(format!("Find failed: {}", e)))
    }

    /// Every record matching the filter, soft-deleted records excluded.
    /// A record that fails to decode is logged and skipped rather than
    /// poisoning the whole read.
    pub async fn find_many(&self, filter: Document) -> Result<Vec<T>, CovenantError> {
        use futures_util::StreamExt;

        let cursor = self
            .inner
            .find(Self::visible(filter))
            .await
            .map_err(|e| CovenantError::Database(format!("Find failed: {}", e)))?;

        let results: Vec<T> = cursor
            .filter_map(|record| async {
                match record {
                    Ok(r) => Some(r),
                    Err(e) => {
                        error!("Error reading document: {}", e);
                        None
                    }
                }
            })
            .collect()
            .await;

        Ok(results)
    }

    /// Update one record. The filter is the caller's whole condition:
    /// conditional transitions put their precondition here and read the
    /// matched count off the result. Callers bump `metadata.updated_at`
    /// in their own update document.
    pub async fn update_one(
        &self,
        filter: Document,
        update: impl Into<UpdateModifications>,
    ) -> Result<UpdateResult, CovenantError> {
        self.inner
            .update_one(filter, update.into())
            .await
            .map_err(|e| CovenantError::Database(format!("Update failed: {}", e)))
    }
}
