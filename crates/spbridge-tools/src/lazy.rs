use futures::future::BoxFuture;
use futures::FutureExt;
use spbridge_core::{BridgeError, Result, SharePointSettings};
use spbridge_sharepoint::{DocumentLibrary, SharePointService};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;

pub type LibraryFuture = BoxFuture<'static, Result<Arc<dyn DocumentLibrary>>>;
type LibraryFactory = Box<dyn Fn() -> LibraryFuture + Send + Sync>;

/// Process-wide handle to the document library, built on first use.
///
/// Concurrent first callers wait on a single construction. A failed
/// construction leaves the cell empty, so the error reaches that caller and
/// the next call tries again.
pub struct LazyLibrary {
    cell: OnceCell<Arc<dyn DocumentLibrary>>,
    factory: LibraryFactory,
}

impl LazyLibrary {
    pub fn new<F, Fut>(factory: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<dyn DocumentLibrary>>> + Send + 'static,
    {
        Self {
            cell: OnceCell::new(),
            factory: Box::new(move || factory().boxed()),
        }
    }

    /// A handle that builds a [`SharePointService`] from `SHAREPOINT_*`
    /// settings.
    pub fn from_env() -> Self {
        Self::new(|| async {
            let settings = SharePointSettings::from_env().map_err(|err| {
                tracing::error!(error = %err, "SharePoint settings are missing");
                err
            })?;
            tracing::debug!(site = ?settings.site_url, "loaded SharePoint settings");

            let service: Arc<dyn DocumentLibrary> = Arc::new(SharePointService::new(&settings)?);
            Ok::<_, BridgeError>(service)
        })
    }

    pub async fn get(&self) -> Result<Arc<dyn DocumentLibrary>> {
        self.cell
            .get_or_try_init(|| (self.factory)())
            .await
            .map(Arc::clone)
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }
}

impl fmt::Debug for LazyLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyLibrary")
            .field("library", &self.cell.get())
            .finish_non_exhaustive()
    }
}
