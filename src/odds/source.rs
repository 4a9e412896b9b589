use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::errors::TransportError;
use crate::models::OddsUpdate;

/// Buffer between a transport task and the stream supervisor.
pub const FEED_BUFFER: usize = 256;

/// One item delivered by an odds transport.
#[derive(Debug, Clone)]
pub enum FeedItem {
    Update(OddsUpdate),
    /// Payload that could not be decoded. Dropped by the stream.
    Malformed(String),
}

/// Live feed for one event. The transport closes the channel when the
/// underlying connection is lost; dropping the receiver unsubscribes.
pub type OddsFeed = mpsc::Receiver<FeedItem>;

/// Anything that can deliver odds updates for an event: a push socket,
/// an HTTP poller, or a test double.
#[async_trait]
pub trait OddsSource: Send + Sync {
    /// Open a subscription for `event_id`. Returns once the transport is
    /// connected; an error means the attempt failed and may be retried.
    async fn connect(&self, event_id: &str) -> Result<OddsFeed, TransportError>;
}
