use crate::error::ProviderError;
use async_trait::async_trait;

/// Source of pooled client handles.
///
/// The pool never inspects a handle: it only asks the provider to open one
/// and, on release or eviction, to close it. Checking that a handle is still
/// alive (and reconnecting it) is up to the provider and its handle type.
#[async_trait]
pub trait Provider: Send + Sync + 'static {
    /// Client handle handed out to workers.
    type Handle: Send + Sync + 'static;
    /// Connection settings forwarded unchanged from pool construction.
    type Options: Send + Sync + 'static;

    fn r#type(&self) -> &str;

    async fn new_connection(&self, options: &Self::Options) -> Result<Self::Handle, ProviderError>;

    async fn close_connection(&self, handle: &Self::Handle) -> Result<(), ProviderError>;
}
