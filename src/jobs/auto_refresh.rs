use std::sync::Weak;
use tokio::time::{sleep, Duration};

use crate::models::dashboard::Page;
use crate::services::dashboard::Feeds;
use crate::services::refresh::RefreshTask;
use crate::services::session::DashboardSession;

/// Spawn the timed refresh loop for one page of one session.
///
/// Each cycle waits `interval`, invalidates the page's cache entry, runs a full
/// render pass and publishes the view. Cycles never overlap. The loop stops
/// when the returned handle is dropped or the session goes away.
pub fn start_auto_refresh(
    session: Weak<DashboardSession>,
    feeds: Feeds,
    page: Page,
    interval: Duration,
) -> RefreshTask {
    let handle = tokio::spawn(async move {
        tracing::debug!("Auto-refresh loop for {} started ({:?})", page, interval);

        loop {
            sleep(interval).await;

            let Some(session) = session.upgrade() else {
                tracing::debug!("Session gone, stopping {} auto-refresh", page);
                break;
            };

            let update = session.force_refresh(page, &feeds).await;
            let receivers = session.publish(update);

            tracing::debug!(
                "Auto-refreshed {} for session {} ({} subscribers)",
                page,
                session.id(),
                receivers
            );
        }
    });

    RefreshTask::new(handle)
}
