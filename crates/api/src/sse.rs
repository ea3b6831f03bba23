//! Server-Sent Events (SSE) for live poll tallies.
//!
//! Every poll gets its own broadcast channel, created on first subscription.
//! A stream stays open until the viewer's session ends, at which point it
//! sends a final `redirect` event and closes.

use std::collections::{HashMap, HashSet};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::{
    FutureExt,
    future::BoxFuture,
    stream::{self, Stream},
};
use serde::Serialize;
use tokio::sync::{RwLock, broadcast};
use tokio_stream::{StreamExt, wrappers::BroadcastStream};
use votebox_common::AppResult;
use votebox_core::{AccessGuard, PollEventPublisher, PollTally};

use crate::{endpoints::polls::TallyResponse, extractors::AuthUser, middleware::AppState};

/// Capacity of each per-poll channel.
const POLL_CHANNEL_CAPACITY: usize = 100;

/// Events sent on a poll stream.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum PollStreamEvent {
    /// Connection established.
    Connected { poll_id: String },
    /// Current counts.
    Tally(TallyResponse),
    /// The poll was edited or deleted; refetch it.
    Invalidated { poll_id: String },
    /// The viewer's session ended.
    Redirect { to: String },
}

impl PollStreamEvent {
    const fn name(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::Tally(_) => "tally",
            Self::Invalidated { .. } => "invalidated",
            Self::Redirect { .. } => "redirect",
        }
    }

    fn to_event(&self) -> Event {
        Event::default()
            .event(self.name())
            .json_data(self)
            .unwrap_or_else(|_| Event::default().event(self.name()).data("error"))
    }
}

/// Per-poll broadcast channels.
#[derive(Clone, Default)]
pub struct TallyBroadcaster {
    poll_channels: Arc<RwLock<HashMap<String, broadcast::Sender<PollStreamEvent>>>>,
}

impl TallyBroadcaster {
    /// Create a new broadcaster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a poll's channel, creating it if needed.
    pub async fn subscribe(&self, poll_id: &str) -> broadcast::Receiver<PollStreamEvent> {
        let mut channels = self.poll_channels.write().await;
        channels
            .entry(poll_id.to_string())
            .or_insert_with(|| broadcast::channel(POLL_CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Send an event to everyone watching a poll.
    pub async fn broadcast(&self, poll_id: &str, event: PollStreamEvent) {
        let channels = self.poll_channels.read().await;
        if let Some(sender) = channels.get(poll_id) {
            let _ = sender.send(event);
        }
    }

    /// Number of open channels.
    pub async fn channel_count(&self) -> usize {
        self.poll_channels.read().await.len()
    }

    /// Polls that currently have a channel.
    pub async fn poll_ids(&self) -> HashSet<String> {
        self.poll_channels.read().await.keys().cloned().collect()
    }

    /// Drop channels nobody listens to anymore.
    pub async fn cleanup(&self) {
        let mut channels = self.poll_channels.write().await;
        channels.retain(|_, sender| sender.receiver_count() > 0);
    }
}

#[async_trait]
impl PollEventPublisher for TallyBroadcaster {
    async fn publish_tally(&self, tally: &PollTally) -> AppResult<()> {
        let event = PollStreamEvent::Tally((&tally.anonymous()).into());
        self.broadcast(&tally.poll_id, event).await;
        Ok(())
    }

    async fn publish_invalidated(&self, poll_id: &str) -> AppResult<()> {
        let event = PollStreamEvent::Invalidated {
            poll_id: poll_id.to_string(),
        };
        self.broadcast(poll_id, event).await;
        Ok(())
    }
}

struct StreamState {
    updates: BroadcastStream<PollStreamEvent>,
    signed_out: BoxFuture<'static, Option<String>>,
    done: bool,
}

async fn next_event(mut st: StreamState) -> Option<(Result<Event, Infallible>, StreamState)> {
    if st.done {
        return None;
    }

    loop {
        tokio::select! {
            target = &mut st.signed_out => {
                let to = target?;
                st.done = true;
                return Some((Ok(PollStreamEvent::Redirect { to }.to_event()), st));
            }
            update = st.updates.next() => match update {
                Some(Ok(event)) => return Some((Ok(event.to_event()), st)),
                // Lagged receivers skip ahead
                Some(Err(_)) => {}
                None => return None,
            },
        }
    }
}

/// Live tally stream for one poll.
pub async fn poll_stream(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let detail = state
        .poll_service
        .get_poll_detail(&poll_id, Some(&user))
        .await?;

    let updates = BroadcastStream::new(state.tally_broadcaster.subscribe(&poll_id).await);

    let auth_events = state.identity_service.subscribe();
    let mut guard = AccessGuard::new(state.auth.login_path.as_str());
    guard.resolve(Some(user.clone()));
    let signed_out = async move { guard.follow(auth_events, &user.id).await }.boxed();

    let initial = stream::iter([
        Ok(PollStreamEvent::Connected {
            poll_id: poll_id.clone(),
        }
        .to_event()),
        Ok(PollStreamEvent::Tally((&detail.tally).into()).to_event()),
    ]);

    let live = stream::unfold(
        StreamState {
            updates,
            signed_out,
            done: false,
        },
        next_event,
    );

    tracing::debug!(%poll_id, "Poll stream opened");

    Ok(Sse::new(initial.chain(live)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("ping"),
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample_tally() -> PollTally {
        PollTally {
            poll_id: "poll1".to_string(),
            options: Vec::new(),
            total_votes: 3,
            has_voted: true,
            viewer_choice: Some("opt1".to_string()),
        }
    }

    #[tokio::test]
    async fn test_subscribe_reuses_channel() {
        let broadcaster = TallyBroadcaster::new();

        let _a = broadcaster.subscribe("poll1").await;
        let _b = broadcaster.subscribe("poll1").await;

        assert_eq!(broadcaster.channel_count().await, 1);
    }

    #[tokio::test]
    async fn test_publish_tally_strips_viewer_fields() {
        let broadcaster = TallyBroadcaster::new();
        let mut rx = broadcaster.subscribe("poll1").await;

        broadcaster.publish_tally(&sample_tally()).await.unwrap();

        match rx.recv().await.unwrap() {
            PollStreamEvent::Tally(tally) => {
                assert_eq!(tally.total_votes, 3);
                assert!(!tally.has_voted);
                assert!(tally.viewer_choice.is_none());
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_broadcast_without_subscribers_is_dropped() {
        let broadcaster = TallyBroadcaster::new();

        broadcaster.publish_invalidated("poll1").await.unwrap();

        assert_eq!(broadcaster.channel_count().await, 0);
    }

    #[tokio::test]
    async fn test_cleanup_prunes_unused_channels() {
        let broadcaster = TallyBroadcaster::new();
        let rx = broadcaster.subscribe("poll1").await;
        let _keep = broadcaster.subscribe("poll2").await;
        drop(rx);

        broadcaster.cleanup().await;

        assert_eq!(broadcaster.channel_count().await, 1);
        assert_eq!(broadcaster.poll_ids().await, HashSet::from(["poll2".to_string()]));
    }

    #[test]
    fn test_event_serialization() {
        let event = PollStreamEvent::Invalidated {
            poll_id: "poll1".to_string(),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"invalidated\""));
        assert!(json.contains("\"pollId\":\"poll1\""));
        assert_eq!(event.name(), "invalidated");
    }

    #[tokio::test]
    async fn test_stream_ends_with_redirect_on_sign_out() {
        let (_tx, rx) = broadcast::channel::<PollStreamEvent>(4);
        let st = StreamState {
            updates: BroadcastStream::new(rx),
            signed_out: async { Some("/auth/login".to_string()) }.boxed(),
            done: false,
        };

        let (first, st) = next_event(st).await.unwrap();
        assert!(first.is_ok());
        assert!(st.done);
        assert!(next_event(st).await.is_none());
    }
}
