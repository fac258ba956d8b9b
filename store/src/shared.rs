//! Async handle over [`MenuStore`].
//!
//! SQLite calls block, so every operation runs on the blocking pool while
//! holding the connection mutex. Cloning the handle shares the connection.

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, anyhow};
use tokio::task;

use rolesync_types::{MenuDefinition, MenuId, MessageId, PostingRef};

use crate::MenuStore;

#[derive(Clone)]
pub struct SharedMenuStore {
    inner: Arc<Mutex<MenuStore>>,
}

impl SharedMenuStore {
    #[must_use]
    pub fn new(store: MenuStore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    /// Run `op` against the store on the blocking pool.
    pub async fn call<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut MenuStore) -> Result<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        task::spawn_blocking(move || {
            let mut store = inner
                .lock()
                .map_err(|_| anyhow!("Menu store lock poisoned"))?;
            op(&mut store)
        })
        .await
        .context("Menu store task failed")?
    }

    pub async fn find_by_posting(&self, posting: PostingRef) -> Result<Option<MenuDefinition>> {
        self.call(move |store| store.find_by_posting(posting)).await
    }

    pub async fn list_published(&self) -> Result<Vec<MenuDefinition>> {
        self.call(|store| store.list_published()).await
    }

    pub async fn bind_posting(&self, id: MenuId, message: MessageId) -> Result<MenuDefinition> {
        self.call(move |store| store.bind_posting(id, message)).await
    }
}
