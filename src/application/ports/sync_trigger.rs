use async_trait::async_trait;

/// オンライン復帰時に同期を開始する側のポート
#[async_trait]
pub trait SyncTrigger: Send + Sync {
    async fn on_online(&self);
}
