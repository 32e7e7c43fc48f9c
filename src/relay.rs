use crate::collector::Collector;
use crate::config::Config;
use crate::error::Result;
use crate::gateway::Gateway;
use crate::log_line::SentinelFraming;
use crate::message::Message;
use crate::publisher::Publisher;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Entry point used by the HTTP layer: one publish or one fetch per call,
/// each on its own connection.
pub struct Relay {
    publisher: Publisher,
    collector: Collector,
}

impl Relay {
    pub fn new(publisher: Publisher, collector: Collector) -> Self {
        Self {
            publisher,
            collector,
        }
    }

    pub fn from_config(gateway: Arc<dyn Gateway>, config: &Config) -> Self {
        let deadlines = config.deadlines();
        let framing = Arc::new(SentinelFraming::new(config.sentinel.clone()));
        Self {
            publisher: Publisher::new(Arc::clone(&gateway), deadlines),
            collector: Collector::new(gateway, framing, deadlines),
        }
    }

    pub async fn publish(&self, body: &str) -> Result<Message> {
        self.publish_with(body, &CancellationToken::new()).await
    }

    pub async fn publish_with(&self, body: &str, cancel: &CancellationToken) -> Result<Message> {
        self.publisher.send(body, cancel).await
    }

    pub async fn fetch_all(&self) -> Result<Vec<Message>> {
        self.fetch_all_with(&CancellationToken::new()).await
    }

    pub async fn fetch_all_with(&self, cancel: &CancellationToken) -> Result<Vec<Message>> {
        self.collector.fetch_all(cancel).await
    }
}
