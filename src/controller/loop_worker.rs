use std::sync::Arc;

use chrono::Utc;
use futures_util::StreamExt;
use tokio::time::{self, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::state::{FetchOutcome, FetchTicket};
use super::{ViewContext, ViewSubject};
use crate::channel::MessageStream;
use crate::dispatch::Effect;
use crate::events;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

const MAX_RECONNECT_BACKOFF: Duration = Duration::from_secs(30);

/// How much of the view a sync refetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SyncScope {
    /// Job buckets only.
    Snapshot,
    /// Job buckets plus the surrounding view data.
    Full,
}

fn next_backoff(current: Duration) -> Duration {
    (current * 2).min(MAX_RECONNECT_BACKOFF)
}

/// Reads the channel for one mounted epoch until cancelled. A dropped
/// connection is reopened with backoff and followed by a full sync, since
/// anything sent meanwhile is lost.
pub(crate) async fn subscription_loop(
    ctx: Arc<ViewContext>,
    epoch: u64,
    mut stream: MessageStream,
    cancel_token: CancellationToken,
) {
    let mut backoff = Duration::from_secs(1);

    loop {
        loop {
            tokio::select! {
                biased;
                _ = cancel_token.cancelled() => {
                    log_info!("[controller] view {} subscription loop shutting down", ctx.instance_id);
                    return;
                }
                next = stream.next() => match next {
                    Some(Ok(frame)) => handle_frame(&ctx, epoch, &frame).await,
                    Some(Err(err)) => {
                        log_warn!("[channel] view {} lost its subscription: {err}", ctx.instance_id);
                        break;
                    }
                    None => {
                        log_warn!("[channel] view {} subscription closed by the hub", ctx.instance_id);
                        break;
                    }
                },
            }
        }

        stream = loop {
            tokio::select! {
                _ = time::sleep(backoff) => {}
                _ = cancel_token.cancelled() => return,
            }
            let subscribed = tokio::select! {
                result = ctx.channel.subscribe() => result,
                _ = cancel_token.cancelled() => return,
            };
            match subscribed {
                Ok(stream) => {
                    backoff = Duration::from_secs(1);
                    break stream;
                }
                Err(err) => {
                    log_error!("[channel] view {} failed to resubscribe: {err}", ctx.instance_id);
                    backoff = next_backoff(backoff);
                }
            }
        };

        log_info!("[channel] view {} resubscribed", ctx.instance_id);
        tokio::spawn(sync(ctx.clone(), SyncScope::Full));
    }
}

/// Decodes and applies one frame. A frame that cannot be decoded is logged
/// and dropped; nothing else is affected.
pub(crate) async fn handle_frame(ctx: &Arc<ViewContext>, epoch: u64, frame: &str) {
    let event = match events::decode(frame) {
        Ok(event) => event,
        Err(err) => {
            log_warn!("[channel] view {} dropped a frame: {err}", ctx.instance_id);
            return;
        }
    };
    log_debug!("[dispatch] view {} <- {event:?}", ctx.instance_id);

    let now = Utc::now();
    let (effects, view) = {
        let mut state = ctx.state.lock().await;
        if state.epoch() != epoch {
            return;
        }
        let effects = state.apply(&event, now);
        (effects, state.view(now))
    };

    ctx.sink.render(&view);
    perform(ctx, effects);
}

fn perform(ctx: &Arc<ViewContext>, effects: Vec<Effect>) {
    for effect in effects {
        match effect {
            Effect::Resync(reason) => {
                log_info!("[controller] view {} resync: {reason:?}", ctx.instance_id);
                tokio::spawn(sync(ctx.clone(), SyncScope::Full));
            }
            Effect::ShowErrors { task_id, errors } => ctx.sink.show_errors(&task_id, &errors),
            Effect::SubmissionAllowed => {
                log_info!("[controller] view {} may submit new work", ctx.instance_id);
            }
            Effect::UnfiledJob { job_id, state } => {
                log_warn!("[dispatch] view {} left job {job_id} unfiled", ctx.instance_id);
                ctx.sink.diagnostic(&format!(
                    "job {job_id} finished in unknown state `{state}` and was not filed"
                ));
            }
            Effect::Audio(signal) => ctx.audio.accept(&signal),
        }
    }
}

/// Refetches authoritative state for whatever subject is mounted when the
/// sync starts. Results arriving after the subject changed are dropped.
pub(crate) async fn sync(ctx: Arc<ViewContext>, scope: SyncScope) {
    let (ticket, subject) = {
        let mut state = ctx.state.lock().await;
        let Some(subject) = state.subject().cloned() else {
            return;
        };
        (state.begin_fetch(), subject)
    };
    fetch_and_apply(ctx, ticket, subject, scope).await;
}

/// Second half of [`sync`] for callers that already took a ticket, so that
/// no event can slip in between mounting and the start of the first fetch.
pub(crate) async fn fetch_and_apply(
    ctx: Arc<ViewContext>,
    ticket: FetchTicket,
    subject: ViewSubject,
    scope: SyncScope,
) {
    let result = ctx.backend.fetch_snapshot(&subject).await;
    if let Err(err) = &result {
        log_warn!("[controller] view {} snapshot fetch failed: {err}", ctx.instance_id);
    }

    let now = Utc::now();
    let view = {
        let mut state = ctx.state.lock().await;
        match state.finish_fetch(ticket, result, now) {
            FetchOutcome::Applied => Some(state.view(now)),
            FetchOutcome::Stale => {
                log_debug!("[controller] view {} discarded a stale snapshot", ctx.instance_id);
                return;
            }
            FetchOutcome::Superseded | FetchOutcome::Failed => None,
        }
    };
    if let Some(view) = view {
        ctx.sink.render(&view);
    }

    if scope == SyncScope::Full {
        match ctx.backend.refresh_view(&subject).await {
            Ok(data) => {
                if ctx.state.lock().await.epoch() == ticket.epoch {
                    ctx.sink.refresh(&data);
                }
            }
            Err(err) => log_warn!("[controller] view {} refresh failed: {err}", ctx.instance_id),
        }
    }
}

/// Periodic reconciliation against the server while `epoch` stays mounted.
pub(crate) async fn reconcile_ticker(ctx: Arc<ViewContext>, epoch: u64, every: Duration) {
    let mut ticker = time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately and mount already synced.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        if ctx.state.lock().await.epoch() != epoch {
            break;
        }
        sync(ctx.clone(), SyncScope::Snapshot).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        assert_eq!(next_backoff(Duration::from_secs(1)), Duration::from_secs(2));
        assert_eq!(next_backoff(Duration::from_secs(20)), MAX_RECONNECT_BACKOFF);
    }
}
