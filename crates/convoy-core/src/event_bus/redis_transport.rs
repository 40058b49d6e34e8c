use super::bus::BusTransport;
use super::fanout::FanOut;
use super::types::BusMessage;
use crate::error::{Error, Result};
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const KEY_PREFIX: &str = "convoy:events:";
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Redis pub/sub transport.
///
/// Publishing goes out as `PUBLISH convoy:events:<channel>`; a single
/// pattern subscription per process feeds everything back into the local
/// registry, so a message is delivered locally exactly once.
pub struct RedisTransport {
    client: redis::Client,
    conn: Mutex<Option<redis::aio::MultiplexedConnection>>,
}

impl RedisTransport {
    /// Create a transport for `redis_url`. Does not connect yet.
    ///
    /// # Errors
    ///
    /// Returns error if the Redis URL is invalid
    pub fn new(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url).map_err(|e| Error::Transport(e.to_string()))?;
        Ok(Self {
            client,
            conn: Mutex::new(None),
        })
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection> {
        let mut guard = self.conn.lock().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }
        let conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| Error::Transport(format!("Redis connection failed: {e}")))?;
        *guard = Some(conn.clone());
        Ok(conn)
    }

    pub(crate) fn spawn_listener(&self, fanout: Arc<FanOut>, shutdown: CancellationToken) {
        let client = self.client.clone();
        tokio::spawn(async move {
            listen(client, fanout, shutdown).await;
        });
    }
}

#[async_trait]
impl BusTransport for RedisTransport {
    async fn publish(&self, message: &BusMessage) -> Result<usize> {
        let body = serde_json::to_string(message)?;
        let mut conn = self.connection().await?;

        let result: redis::RedisResult<i64> = redis::cmd("PUBLISH")
            .arg(format!("{KEY_PREFIX}{}", message.channel))
            .arg(body)
            .query_async(&mut conn)
            .await;

        match result {
            Ok(receivers) => {
                debug!(channel = %message.channel, receivers, "Redis PUBLISH");
                Ok(0)
            }
            Err(e) => {
                // Force a reconnect on the next publish
                *self.conn.lock().await = None;
                Err(Error::Transport(format!("Redis PUBLISH failed: {e}")))
            }
        }
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

async fn listen(client: redis::Client, fanout: Arc<FanOut>, shutdown: CancellationToken) {
    let pattern = format!("{KEY_PREFIX}*");
    let mut backoff = Duration::from_millis(500);

    while !shutdown.is_cancelled() {
        match client.get_async_pubsub().await {
            Ok(mut pubsub) => match pubsub.psubscribe(&pattern).await {
                Ok(()) => {
                    info!(pattern = %pattern, "Redis event listener subscribed");
                    backoff = Duration::from_millis(500);
                    let mut messages = pubsub.on_message();
                    loop {
                        tokio::select! {
                            _ = shutdown.cancelled() => {
                                info!("Redis event listener stopped");
                                return;
                            }
                            next = messages.next() => match next {
                                Some(msg) => forward(&fanout, &msg),
                                None => {
                                    warn!("Redis pub/sub stream ended, reconnecting");
                                    break;
                                }
                            }
                        }
                    }
                }
                Err(e) => warn!(error = %e, "Redis PSUBSCRIBE failed"),
            },
            Err(e) => warn!(error = %e, "Redis pub/sub connection failed"),
        }

        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = tokio::time::sleep(backoff) => {}
        }
        backoff = (backoff * 2).min(MAX_BACKOFF);
    }
}

fn forward(fanout: &FanOut, msg: &redis::Msg) {
    let body: String = match msg.get_payload() {
        Ok(body) => body,
        Err(e) => {
            warn!(error = %e, "Unreadable Redis payload");
            return;
        }
    };
    match serde_json::from_str::<BusMessage>(&body) {
        Ok(message) => {
            fanout.deliver(&message);
        }
        Err(e) => warn!(error = %e, channel = msg.get_channel_name(), "Malformed bus message from Redis"),
    }
}
