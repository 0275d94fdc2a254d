use async_trait::async_trait;
use srpc_common::MetadataSnapshot;

/// Callbacks the relay invokes on its owner.
#[async_trait]
pub trait RelayHooks: Send + Sync + 'static {
    /// A validated snapshot arrived from an authenticated producer.
    async fn on_metadata_update(&self, snapshot: MetadataSnapshot);

    /// The last authenticated producer went away.
    async fn on_client_disconnect(&self);
}
