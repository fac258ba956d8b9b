//! In-memory menu lookup keyed by posting.
//!
//! The cache is filled lazily on miss and eagerly by [`MenuRegistry::warm`].
//! Absence is never cached: a menu may be published after the cache was
//! warmed, and the next event must find it.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use dashmap::DashMap;

use rolesync_store::SharedMenuStore;
use rolesync_types::{MenuDefinition, MenuId, MessageId, PostingRef};

use crate::error::RegistryError;

pub type SourceFut<'a, T> = Pin<Box<dyn Future<Output = Result<T, RegistryError>> + Send + 'a>>;

/// Persistent collaborator the registry reads through.
pub trait MenuSource: Send + Sync {
    fn find_by_posting(&self, posting: PostingRef) -> SourceFut<'_, Option<MenuDefinition>>;

    fn list_published(&self) -> SourceFut<'_, Vec<MenuDefinition>>;

    /// Record that `menu` is now published as `message`.
    fn bind_posting(&self, menu: MenuId, message: MessageId) -> SourceFut<'_, MenuDefinition>;
}

impl MenuSource for SharedMenuStore {
    fn find_by_posting(&self, posting: PostingRef) -> SourceFut<'_, Option<MenuDefinition>> {
        Box::pin(async move {
            SharedMenuStore::find_by_posting(self, posting)
                .await
                .map_err(|e| RegistryError::Lookup {
                    posting,
                    reason: format!("{e:#}"),
                })
        })
    }

    fn list_published(&self) -> SourceFut<'_, Vec<MenuDefinition>> {
        Box::pin(async move {
            SharedMenuStore::list_published(self)
                .await
                .map_err(|e| RegistryError::Store {
                    reason: format!("{e:#}"),
                })
        })
    }

    fn bind_posting(&self, menu: MenuId, message: MessageId) -> SourceFut<'_, MenuDefinition> {
        Box::pin(async move {
            SharedMenuStore::bind_posting(self, menu, message)
                .await
                .map_err(|e| RegistryError::Store {
                    reason: format!("{e:#}"),
                })
        })
    }
}

pub struct MenuRegistry {
    source: Arc<dyn MenuSource>,
    cache: DashMap<PostingRef, Arc<MenuDefinition>>,
}

impl MenuRegistry {
    pub fn new(source: Arc<dyn MenuSource>) -> Self {
        Self {
            source,
            cache: DashMap::new(),
        }
    }

    /// Find the menu published at `posting`, consulting the store on miss.
    pub async fn lookup(
        &self,
        posting: PostingRef,
    ) -> Result<Option<Arc<MenuDefinition>>, RegistryError> {
        if let Some(hit) = self.cache.get(&posting) {
            return Ok(Some(Arc::clone(hit.value())));
        }

        let Some(menu) = self.source.find_by_posting(posting).await? else {
            return Ok(None);
        };
        if menu.posting() != Some(posting) {
            return Err(RegistryError::Unpublished { menu: menu.id() });
        }

        // A concurrent register/lookup may have won the race; keep theirs.
        let entry = self
            .cache
            .entry(posting)
            .or_insert_with(|| Arc::new(menu));
        tracing::debug!(posting = %posting, "Menu cached on miss");
        Ok(Some(Arc::clone(entry.value())))
    }

    /// Cache a definition supplied by the edit flow. Returns `false` when the
    /// menu has no posting yet and therefore cannot be routed.
    pub fn register(&self, menu: MenuDefinition) -> bool {
        match menu.posting() {
            Some(posting) => {
                self.cache.insert(posting, Arc::new(menu));
                true
            }
            None => false,
        }
    }

    /// Drop the cached definition for `posting` so the next lookup rereads it.
    pub fn invalidate(&self, posting: PostingRef) -> bool {
        self.cache.remove(&posting).is_some()
    }

    /// Bind a freshly posted message to its menu and start routing it.
    pub async fn publish(
        &self,
        menu: MenuId,
        message: MessageId,
    ) -> Result<Arc<MenuDefinition>, RegistryError> {
        let bound = self.source.bind_posting(menu, message).await?;
        let posting = bound
            .posting()
            .ok_or(RegistryError::Unpublished { menu })?;
        let bound = Arc::new(bound);
        self.cache.insert(posting, Arc::clone(&bound));
        tracing::info!(menu = %menu, posting = %posting, "Menu published");
        Ok(bound)
    }

    /// Preload every published menu. Returns how many were cached.
    pub async fn warm(&self) -> Result<usize, RegistryError> {
        let menus = self.source.list_published().await?;
        let mut loaded = 0;
        for menu in menus {
            if self.register(menu) {
                loaded += 1;
            }
        }
        tracing::info!(menus = loaded, "Menu cache warmed");
        Ok(loaded)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
