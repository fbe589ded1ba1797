//! Session controller: owns one view's subscription and tables from mount to
//! unmount.

mod loop_worker;
pub mod state;


use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{error, info, warn};
use serde::Serialize;
use serde_json::Value;
use tokio::{sync::Mutex, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::audio::{AudioPlayer, AudioRelay};
use crate::backend::{HttpBackend, ViewBackend};
use crate::channel::{ChannelSource, WsChannel};
use crate::error::LiveError;
use crate::identifiers::{RevisionId, TaskId, ThreadId};
use crate::settings::ClientSettings;
use crate::view::LiveView;

use loop_worker::{fetch_and_apply, reconcile_ticker, subscription_loop, sync, SyncScope};
use state::ViewState;

/// What a view is looking at: a chat thread and, for build previews, the
/// selected revision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewSubject {
    pub thread_id: ThreadId,
    pub revision_id: Option<RevisionId>,
}

impl ViewSubject {
    pub fn new(thread_id: ThreadId, revision_id: Option<RevisionId>) -> Self {
        Self {
            thread_id,
            revision_id,
        }
    }
}

/// Where rendered state goes.
pub trait ViewSink: Send + Sync {
    fn render(&self, view: &LiveView);

    /// Errors a generation finished with. They are data for the user, not
    /// failures of the view.
    fn show_errors(&self, task_id: &TaskId, errors: &[String]) {
        warn!("generation {task_id} finished with errors: {errors:?}");
    }

    /// Fresh view data (messages, title, image) after a resync.
    fn refresh(&self, _view_data: &Value) {}

    /// A contract mismatch with the server worth surfacing once.
    fn diagnostic(&self, message: &str) {
        error!("{message}");
    }
}

/// Collaborators and state shared between the controller and its tasks.
pub(crate) struct ViewContext {
    pub(crate) instance_id: Uuid,
    pub(crate) state: Mutex<ViewState>,
    pub(crate) channel: Arc<dyn ChannelSource>,
    pub(crate) backend: Arc<dyn ViewBackend>,
    pub(crate) sink: Arc<dyn ViewSink>,
    pub(crate) audio: AudioRelay,
}

struct Worker {
    cancel_token: CancellationToken,
    handle: JoinHandle<()>,
    ticker: Option<JoinHandle<()>>,
}

#[derive(Clone)]
pub struct LiveViewController {
    ctx: Arc<ViewContext>,
    worker: Arc<Mutex<Option<Worker>>>,
    resync_interval: Option<Duration>,
}

impl LiveViewController {
    /// `resync_interval` of `None` disables periodic reconciliation.
    pub fn new(
        channel: Arc<dyn ChannelSource>,
        backend: Arc<dyn ViewBackend>,
        sink: Arc<dyn ViewSink>,
        audio: AudioRelay,
        resync_interval: Option<Duration>,
    ) -> Self {
        Self {
            ctx: Arc::new(ViewContext {
                instance_id: Uuid::new_v4(),
                state: Mutex::new(ViewState::new()),
                channel,
                backend,
                sink,
                audio,
            }),
            worker: Arc::new(Mutex::new(None)),
            resync_interval,
        }
    }

    /// Controller wired to the WebSocket hub and REST API named in
    /// `settings`.
    pub fn from_settings(
        settings: &ClientSettings,
        sink: Arc<dyn ViewSink>,
        player: Arc<dyn AudioPlayer>,
    ) -> Result<Self, LiveError> {
        let channel = WsChannel::new(&settings.channel_url, &settings.channel_session_id);
        let backend = HttpBackend::new(&settings.api_base_url, settings.fetch_timeout())?;
        Ok(Self::new(
            Arc::new(channel),
            Arc::new(backend),
            sink,
            AudioRelay::new(player),
            settings.resync_interval(),
        ))
    }

    pub fn instance_id(&self) -> Uuid {
        self.ctx.instance_id
    }

    /// Subscribes, then seeds the tables from a snapshot in the background.
    /// The view renders as loading until the snapshot lands; events that
    /// arrive meanwhile are kept and replayed on top of it. Mounting over a
    /// mounted view unmounts it first.
    pub async fn mount(&self, subject: ViewSubject) -> Result<(), LiveError> {
        let mut worker = self.worker.lock().await;
        if worker.is_some() {
            drop(worker);
            self.unmount().await;
            worker = self.worker.lock().await;
        }

        let stream = self.ctx.channel.subscribe().await?;

        let (epoch, ticket) = {
            let mut state = self.ctx.state.lock().await;
            let epoch = state.mount(subject.clone());
            let ticket = state.begin_fetch();
            self.ctx.sink.render(&state.view(Utc::now()));
            (epoch, ticket)
        };
        info!(
            "[controller] view {} mounted thread {} revision {:?} (epoch {epoch})",
            self.ctx.instance_id, subject.thread_id, subject.revision_id
        );

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(subscription_loop(
            self.ctx.clone(),
            epoch,
            stream,
            cancel_token.clone(),
        ));
        tokio::spawn(fetch_and_apply(
            self.ctx.clone(),
            ticket,
            subject,
            SyncScope::Snapshot,
        ));
        let ticker = self
            .resync_interval
            .filter(|every| !every.is_zero())
            .map(|every| tokio::spawn(reconcile_ticker(self.ctx.clone(), epoch, every)));

        *worker = Some(Worker {
            cancel_token,
            handle,
            ticker,
        });
        Ok(())
    }

    /// Tears the current view down and mounts `subject`. Anything still in
    /// flight for the old subject is discarded when it resolves.
    pub async fn change_subject(&self, subject: ViewSubject) -> Result<(), LiveError> {
        self.unmount().await;
        self.mount(subject).await
    }

    /// Stops the subscription and the reconciliation ticker and releases
    /// every per-task resource, whether or not anything was mid-flight.
    pub async fn unmount(&self) {
        let Some(worker) = self.worker.lock().await.take() else {
            return;
        };

        worker.cancel_token.cancel();
        if let Some(ticker) = worker.ticker {
            ticker.abort();
        }
        // A frame already past its epoch check finishes before anything is
        // released, so it cannot leave a buffer behind.
        if let Err(err) = worker.handle.await {
            error!(
                "[controller] view {} subscription loop failed to join: {err}",
                self.ctx.instance_id
            );
        }

        self.ctx.state.lock().await.unmount();
        self.ctx.audio.release_all();
        info!("[controller] view {} unmounted", self.ctx.instance_id);
    }

    /// Submits new build work for the mounted revision. Only allowed once
    /// the view is seeded and nothing is running.
    pub async fn launch_operation(&self) -> Result<(), LiveError> {
        let (thread_id, revision_id) = {
            let state = self.ctx.state.lock().await;
            let subject = state.subject().ok_or(LiveError::NotMounted)?;
            let revision_id = subject.revision_id.clone().ok_or(LiveError::NoRevision)?;
            if !state.view(Utc::now()).submission_allowed {
                return Err(LiveError::SubmissionBlocked);
            }
            (subject.thread_id.clone(), revision_id)
        };

        self.ctx
            .backend
            .launch_operation(&thread_id, &revision_id)
            .await?;
        info!(
            "[controller] view {} launched work for revision {revision_id}",
            self.ctx.instance_id
        );
        Ok(())
    }

    pub async fn current_view(&self) -> LiveView {
        self.ctx.state.lock().await.view(Utc::now())
    }

    pub async fn subject(&self) -> Option<ViewSubject> {
        self.ctx.state.lock().await.subject().cloned()
    }

    /// Forces a full resync of the mounted view.
    pub async fn resync(&self) {
        sync(self.ctx.clone(), SyncScope::Full).await;
    }
}
