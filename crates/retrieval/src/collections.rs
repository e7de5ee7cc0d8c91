//! Collection catalog and lazily connected collection handles.

use crate::config::validate_catalog;
use crate::types::{CollectionInfo, SearchFilter, SearchResult};
use crate::vector_store::{VectorStore, VectorStoreConnector};
use advisor_core::AppResult;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// A connected collection: static catalog metadata plus its store client.
pub struct CollectionHandle {
    info: CollectionInfo,
    store: Arc<dyn VectorStore>,
}

impl CollectionHandle {
    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn info(&self) -> &CollectionInfo {
        &self.info
    }

    /// Search this collection. Results are tagged with the logical collection name.
    pub async fn search(
        &self,
        query_vector: &[f32],
        filter: &SearchFilter,
        limit: usize,
    ) -> AppResult<Vec<SearchResult>> {
        let mut results = self.store.search(query_vector, filter, limit).await?;
        for result in &mut results {
            result.collection = self.info.name.clone();
        }
        Ok(results)
    }

    pub async fn count(&self) -> AppResult<u64> {
        self.store.count().await
    }
}

impl std::fmt::Debug for CollectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionHandle")
            .field("name", &self.info.name)
            .field("actual_name", &self.info.actual_name)
            .finish()
    }
}

struct CollectionSlot {
    info: CollectionInfo,
    handle: OnceCell<Arc<CollectionHandle>>,
}

/// Source of truth for which collections exist and how to reach them.
///
/// Every catalog entry owns one slot created up front; the slot's handle is
/// built on first access. Concurrent first accesses wait on the same
/// initialisation, so at most one handle is ever created per name. A failed
/// connection leaves the slot empty and the next access retries.
pub struct CollectionManager {
    order: Vec<String>,
    slots: HashMap<String, CollectionSlot>,
    connector: Arc<dyn VectorStoreConnector>,
}

impl CollectionManager {
    /// Build a manager over `catalog`.
    ///
    /// The catalog is ordered by descending priority; equal priorities keep
    /// their given order.
    pub fn new(
        mut catalog: Vec<CollectionInfo>,
        connector: Arc<dyn VectorStoreConnector>,
    ) -> AppResult<Self> {
        validate_catalog(&catalog)?;
        catalog.sort_by(|a, b| b.priority.cmp(&a.priority));

        let order = catalog.iter().map(|info| info.name.clone()).collect();
        let slots = catalog
            .into_iter()
            .map(|info| {
                (
                    info.name.clone(),
                    CollectionSlot {
                        info,
                        handle: OnceCell::new(),
                    },
                )
            })
            .collect();

        Ok(Self {
            order,
            slots,
            connector,
        })
    }

    /// Get the handle for `name`, connecting on first access.
    ///
    /// Returns `Ok(None)` for names outside the catalog. A connection failure
    /// for a catalogued collection is an error.
    pub async fn get_collection(&self, name: &str) -> AppResult<Option<Arc<CollectionHandle>>> {
        let Some(slot) = self.slots.get(name) else {
            tracing::debug!("Collection '{}' is not in the catalog", name);
            return Ok(None);
        };

        let handle = slot
            .handle
            .get_or_try_init(|| async {
                tracing::debug!(
                    "Connecting collection '{}' (index '{}')",
                    slot.info.name,
                    slot.info.actual_name
                );
                let store = self.connector.connect(&slot.info.actual_name).await?;
                Ok::<_, advisor_core::AppError>(Arc::new(CollectionHandle {
                    info: slot.info.clone(),
                    store,
                }))
            })
            .await?;

        Ok(Some(Arc::clone(handle)))
    }

    /// Collection names in catalog (priority) order.
    pub fn list_collections(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Static metadata for `name`. No I/O.
    pub fn get_collection_info(&self, name: &str) -> Option<&CollectionInfo> {
        self.slots.get(name).map(|slot| &slot.info)
    }

    /// Catalog entries in catalog order.
    pub fn catalog(&self) -> impl Iterator<Item = &CollectionInfo> {
        self.order
            .iter()
            .filter_map(|name| self.slots.get(name).map(|slot| &slot.info))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    /// Whether the handle for `name` has already been built.
    pub fn is_connected(&self, name: &str) -> bool {
        self.slots
            .get(name)
            .map(|slot| slot.handle.initialized())
            .unwrap_or(false)
    }

    /// Connect every collection concurrently and return all handles.
    ///
    /// Already connected collections are returned as-is.
    pub async fn get_all_collections(&self) -> AppResult<HashMap<String, Arc<CollectionHandle>>> {
        let outcomes = futures::future::join_all(
            self.order
                .iter()
                .map(|name| async move { (name, self.get_collection(name).await) }),
        )
        .await;

        let mut handles = HashMap::with_capacity(outcomes.len());
        for (name, outcome) in outcomes {
            if let Some(handle) = outcome? {
                handles.insert(name.clone(), handle);
            }
        }

        Ok(handles)
    }
}
