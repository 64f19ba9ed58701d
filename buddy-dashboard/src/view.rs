//! View session lifecycle.
//!
//! Activating a session builds a fresh view-model and spawns the loader, the
//! realtime channel and (optionally) signaling under one cancellation token.
//! Deactivating cancels and joins them; dropping the session cancels too, so
//! the socket and the media session are released on every exit path.

use crate::backend_client::BackendApi;
use crate::live_session;
use crate::loader::{self, LoaderSource};
use crate::signaling::{self, MediaSession, RemoteStream, SdpAnswerer};
use crate::view_model::{self, MediaState, SharedViewModel};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// What a view session needs from the host
#[derive(Clone)]
pub struct ViewContext {
    pub api: Arc<dyn BackendApi>,
    pub realtime_url: String,
    pub signaling: bool,
}

pub struct ViewSession {
    id: String,
    view: SharedViewModel,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl ViewSession {
    pub fn activate(ctx: &ViewContext, source: LoaderSource) -> Self {
        let id = uuid::Uuid::new_v4().to_string();
        let identity = match &source {
            LoaderSource::Handle(username) => Some(username.clone()),
            _ => None,
        };
        log::info!("[VIEW] Activating session {} ({:?})", id, source);

        let view = view_model::shared(identity);
        let cancel = CancellationToken::new();
        let mut tasks = Vec::new();

        tasks.push(tokio::spawn(run_loader(
            ctx.api.clone(),
            source,
            view.clone(),
            cancel.clone(),
        )));

        tasks.push(tokio::spawn(live_session::run_channel(
            ctx.realtime_url.clone(),
            view.clone(),
            cancel.clone(),
        )));

        if ctx.signaling {
            tasks.push(tokio::spawn(run_media(
                ctx.api.clone(),
                view.clone(),
                cancel.clone(),
            )));
        }

        Self {
            id,
            view,
            cancel,
            tasks,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn view(&self) -> SharedViewModel {
        self.view.clone()
    }

    /// Cancel every task of this session and wait for them to finish
    pub async fn deactivate(mut self) {
        log::info!("[VIEW] Deactivating session {}", self.id);
        self.cancel.cancel();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                log::error!("[VIEW] Session task failed: {}", e);
            }
        }
    }
}

impl Drop for ViewSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_loader(
    api: Arc<dyn BackendApi>,
    source: LoaderSource,
    view: SharedViewModel,
    cancel: CancellationToken,
) {
    let data = tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        data = loader::load_dashboard(api.as_ref(), &source) => data,
    };
    log::info!(
        "[LOADER] Loaded {} tasks, {} reminders",
        data.tasks.len(),
        data.reminders.len()
    );
    let mut vm = view.write().await;
    vm.data = data;
    vm.loaded = true;
}

async fn run_media(api: Arc<dyn BackendApi>, view: SharedViewModel, cancel: CancellationToken) {
    view.write().await.media = MediaState::Negotiating;

    let mut session = SdpAnswerer::new();
    let announced: Arc<Mutex<Option<RemoteStream>>> = Arc::new(Mutex::new(None));
    let sink = announced.clone();
    session.on_remote_stream(Box::new(move |stream| {
        log::info!("[SIGNALING] Remote stream {} ({})", stream.id, stream.kinds.join(", "));
        if let Ok(mut slot) = sink.lock() {
            slot.get_or_insert(stream);
        }
    }));

    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        r = signaling::negotiate(api.as_ref(), &mut session) => Some(r),
    };

    match result {
        Some(Ok(_)) => {
            let stream = announced.lock().ok().and_then(|mut slot| slot.take());
            view.write().await.media = match stream {
                Some(stream) => MediaState::Playing(stream.id),
                None => MediaState::Connected,
            };
            // Keep the media session open until the view goes away
            cancel.cancelled().await;
            session.close().await;
            view.write().await.media = MediaState::Closed;
        }
        Some(Err(e)) => {
            log::error!("[SIGNALING] Media session aborted: {}", e);
            session.close().await;
            view.write().await.media = MediaState::Failed(e);
        }
        None => {
            session.close().await;
            view.write().await.media = MediaState::Closed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend_client::BackendError;
    use crate::mock_backend::{MockBackend, record, sample_offer};
    use crate::view_model::ChannelState;
    use buddy_types::User;
    use std::time::Duration;

    fn closed_ws_url() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("ws://{}/ws/rtc", addr)
    }

    async fn wait_until_loaded(view: &SharedViewModel) {
        for _ in 0..300 {
            if view.read().await.loaded {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("loader never finished");
    }

    #[tokio::test]
    async fn test_activate_loads_and_deactivate_joins() {
        let api = Arc::new(MockBackend {
            user: Ok(User {
                username: "ankit".into(),
                name: "Ankit".into(),
            }),
            events: Ok(vec![record("task", "write tests")]),
            ..Default::default()
        });
        let ctx = ViewContext {
            api,
            realtime_url: closed_ws_url(),
            signaling: false,
        };

        let session = ViewSession::activate(&ctx, LoaderSource::Handle("ankit".into()));
        let view = session.view();
        wait_until_loaded(&view).await;

        session.deactivate().await;

        let vm = view.read().await;
        assert_eq!(vm.identity.as_deref(), Some("ankit"));
        assert_eq!(vm.data.tasks, vec!["write tests"]);
        assert!(matches!(
            vm.channel,
            ChannelState::Dropped(_) | ChannelState::Closed
        ));
        assert_eq!(vm.media, MediaState::Disabled);
    }

    #[tokio::test]
    async fn test_failed_signaling_marks_media_failed() {
        let ctx = ViewContext {
            api: Arc::new(MockBackend::default()),
            realtime_url: closed_ws_url(),
            signaling: true,
        };
        let session = ViewSession::activate(&ctx, LoaderSource::Directory);
        let view = session.view();

        for _ in 0..300 {
            if matches!(view.read().await.media, MediaState::Failed(_)) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(matches!(view.read().await.media, MediaState::Failed(_)));
        session.deactivate().await;
    }

    async fn wait_for_media(view: &SharedViewModel, done: impl Fn(&MediaState) -> bool) {
        for _ in 0..300 {
            if done(&view.read().await.media) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn test_rejected_answer_stays_failed() {
        let api = Arc::new(MockBackend {
            offer: Ok(sample_offer()),
            answer: Err(BackendError::Status {
                status: 500,
                detail: Some("answer rejected".to_string()),
            }),
            ..Default::default()
        });
        let ctx = ViewContext {
            api: api.clone(),
            realtime_url: closed_ws_url(),
            signaling: true,
        };
        let session = ViewSession::activate(&ctx, LoaderSource::Directory);
        let view = session.view();

        wait_for_media(&view, |m| matches!(m, MediaState::Failed(_))).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        match &view.read().await.media {
            MediaState::Failed(reason) => assert!(reason.contains("answer rejected")),
            other => panic!("expected failed media session, got {:?}", other),
        }
        assert_eq!(api.posted_answers.lock().unwrap().len(), 1);

        session.deactivate().await;
        assert!(matches!(view.read().await.media, MediaState::Failed(_)));
    }

    #[tokio::test]
    async fn test_handshake_plays_stream_until_deactivated() {
        let api = Arc::new(MockBackend {
            offer: Ok(sample_offer()),
            ..Default::default()
        });
        let ctx = ViewContext {
            api: api.clone(),
            realtime_url: closed_ws_url(),
            signaling: true,
        };
        let session = ViewSession::activate(&ctx, LoaderSource::Directory);
        let view = session.view();

        wait_for_media(&view, |m| matches!(m, MediaState::Playing(_))).await;
        assert_eq!(
            view.read().await.media,
            MediaState::Playing("buddy-stream".to_string())
        );

        session.deactivate().await;
        assert_eq!(view.read().await.media, MediaState::Closed);
    }

    #[tokio::test]
    async fn test_each_activation_starts_with_empty_transcript() {
        let ctx = ViewContext {
            api: Arc::new(MockBackend::default()),
            realtime_url: closed_ws_url(),
            signaling: false,
        };
        let first = ViewSession::activate(&ctx, LoaderSource::Directory);
        first.view().write().await.transcript.append(buddy_types::TranscriptLine {
            sender: buddy_types::Sender::User,
            text: "old".into(),
        });
        first.deactivate().await;

        let second = ViewSession::activate(&ctx, LoaderSource::Directory);
        assert!(second.view().read().await.transcript.is_empty());
        assert_ne!(second.id(), "");
        drop(second);
    }
}
