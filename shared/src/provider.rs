//! Lazily constructed, process-wide API clients.

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::info;

use crate::{Error, Result};

type Factory<C> = Box<dyn Fn() -> Result<C> + Send + Sync>;

/// Builds a client on first use and hands out the same instance afterwards.
///
/// Lives for the lifetime of the process, so a warm Lambda reuses the client
/// (and any token it holds) across invocations. A failed build is not
/// cached; the next call tries again.
pub struct ClientProvider<C> {
    cell: OnceCell<Arc<C>>,
    factory: Factory<C>,
}

impl<C> ClientProvider<C> {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Result<C> + Send + Sync + 'static,
    {
        Self {
            cell: OnceCell::new(),
            factory: Box::new(factory),
        }
    }

    /// A provider wrapping an already built client.
    pub fn ready(client: C) -> Self {
        Self {
            cell: OnceCell::new_with(Some(Arc::new(client))),
            factory: Box::new(|| Err(Error::Internal("client already initialized".to_string()))),
        }
    }

    /// Get the client, building it if this is the first call.
    pub async fn get(&self) -> Result<Arc<C>> {
        self.cell
            .get_or_try_init(|| async {
                info!(client = std::any::type_name::<C>(), "Initializing API client...");
                let client = (self.factory)()?;
                info!(client = std::any::type_name::<C>(), "API client initialized successfully");
                Ok::<_, Error>(Arc::new(client))
            })
            .await
            .cloned()
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }
}
