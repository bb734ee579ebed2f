use std::time::Duration;

use futures_util::{SinkExt, Stream, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tracing::{debug, info, warn};

use crate::events::Event;
use crate::state::Snapshot;

// Message we send to subscribe
#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct SubscribeMsg<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    game_id: &'a str,
}

/// Parse one feed frame into a snapshot.
pub fn parse_snapshot(text: String) -> Result<Snapshot, simd_json::Error> {
    let mut bytes = text.into_bytes();
    simd_json::from_slice::<Snapshot>(&mut bytes)
}

/// Live market feed for one game over a websocket.
pub struct MarketFeed {
    url: String,
    game_id: String,
    reconnect_delay: Duration,
}

impl MarketFeed {
    pub fn new(url: impl Into<String>, game_id: impl Into<String>, reconnect_delay: Duration) -> Self {
        Self {
            url: url.into(),
            game_id: game_id.into(),
            reconnect_delay,
        }
    }

    /// Spawns a task that keeps the socket alive.
    ///
    /// Snapshots go to `snapshots` (latest wins, unchanged ones are skipped);
    /// connect/disconnect go to `events`. The task ends once the event
    /// receiver is gone.
    pub fn spawn(
        self,
        snapshots: watch::Sender<Option<Snapshot>>,
        events: mpsc::Sender<Event>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while !events.is_closed() {
                info!(url = %self.url, "market feed connecting");

                let reason = match connect_async(self.url.as_str()).await {
                    Ok((ws_stream, _)) => {
                        let (mut write, mut read) = ws_stream.split();

                        let subscribe = SubscribeMsg {
                            kind: "subscribe",
                            game_id: &self.game_id,
                        };
                        let sent = match serde_json::to_string(&subscribe) {
                            Ok(msg) => write
                                .send(tungstenite::Message::Text(msg))
                                .await
                                .map_err(|e| format!("subscribe failed: {}", e)),
                            Err(e) => Err(format!("subscribe encode failed: {}", e)),
                        };

                        match sent {
                            Err(reason) => reason,
                            Ok(()) => {
                                info!(game_id = %self.game_id, "market feed subscribed");
                                if events.send(Event::FeedConnected).await.is_err() {
                                    debug!("event receiver gone, market feed stopping");
                                    return;
                                }
                                self.pump(&mut read, &snapshots).await
                            }
                        }
                    }
                    Err(e) => format!("connect failed: {}", e),
                };

                warn!(%reason, "market feed down");
                if events.send(Event::FeedDisconnected { reason }).await.is_err() {
                    break;
                }

                info!(delay_secs = self.reconnect_delay.as_secs(), "market feed reconnecting");
                tokio::time::sleep(self.reconnect_delay).await;
            }
        })
    }

    /// Read frames until the socket fails. Returns why it stopped.
    async fn pump<S>(&self, read: &mut S, snapshots: &watch::Sender<Option<Snapshot>>) -> String
    where
        S: Stream<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
    {
        while let Some(msg) = read.next().await {
            match msg {
                Ok(tungstenite::Message::Text(text)) => match parse_snapshot(text) {
                    Ok(snapshot) => {
                        // Only publish if changed
                        snapshots.send_if_modified(|current| {
                            if current.as_ref() == Some(&snapshot) {
                                return false;
                            }
                            *current = Some(snapshot);
                            true
                        });
                    }
                    Err(e) => debug!(error = %e, "skipping unparseable feed frame"),
                },
                Ok(tungstenite::Message::Close(frame)) => {
                    return format!("closed by server: {:?}", frame);
                }
                Err(e) => return format!("read error: {}", e),
                _ => {}
            }
        }
        "stream ended".to_string()
    }
}
