//! Per-session dashboard state
//!
//! Each session owns both pages (cache + history), their auto-refresh loops
//! and a broadcast channel for pushing auto-refreshed views. Nothing is shared
//! between sessions. Idle sessions are evicted, which stops their loops and
//! signals connected sockets to close.

use chrono::{NaiveDateTime, Utc};
use moka::future::Cache;
use moka::notification::RemovalCause;
use parking_lot::Mutex as SyncMutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch, Mutex};
use tracing::{debug, info};
use uuid::Uuid;

use crate::jobs::auto_refresh::start_auto_refresh;
use crate::models::dashboard::{Page, PageUpdate, PricePageView, WeatherPageView};
use crate::services::dashboard::{Feeds, PricePage, WeatherPage};
use crate::services::refresh::{RefreshControls, RefreshSettings, RefreshTask};

const UPDATE_CHANNEL_CAPACITY: usize = 32;
const MAX_SESSIONS: u64 = 10_000;
const MIN_KEEPALIVE: Duration = Duration::from_millis(10);

#[derive(Default)]
struct AutoRefreshSlot {
    settings: RefreshSettings,
    task: Option<RefreshTask>,
}

pub struct DashboardSession {
    id: Uuid,
    prices: Mutex<PricePage>,
    weather: Mutex<WeatherPage>,
    price_refresh: SyncMutex<AutoRefreshSlot>,
    weather_refresh: SyncMutex<AutoRefreshSlot>,
    updates: broadcast::Sender<PageUpdate>,
    ended: watch::Sender<bool>,
}

impl DashboardSession {
    pub fn new(id: Uuid) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        let (ended, _) = watch::channel(false);
        Self {
            id,
            prices: Mutex::new(PricePage::new()),
            weather: Mutex::new(WeatherPage::new()),
            price_refresh: SyncMutex::new(AutoRefreshSlot::default()),
            weather_refresh: SyncMutex::new(AutoRefreshSlot::default()),
            updates,
            ended,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    fn slot(&self, page: Page) -> &SyncMutex<AutoRefreshSlot> {
        match page {
            Page::Prices => &self.price_refresh,
            Page::Weather => &self.weather_refresh,
        }
    }

    pub fn controls(&self, page: Page) -> RefreshControls {
        self.slot(page).lock().settings.controls()
    }

    pub async fn render_prices(&self, feeds: &Feeds, now: NaiveDateTime) -> PricePageView {
        let controls = self.controls(Page::Prices);
        let mut page = self.prices.lock().await;
        page.render(&feeds.coingecko, controls, now).await
    }

    pub async fn render_weather(&self, feeds: &Feeds, now: NaiveDateTime) -> WeatherPageView {
        let controls = self.controls(Page::Weather);
        let mut page = self.weather.lock().await;
        page.render(&feeds.open_meteo, controls, now).await
    }

    /// Manual refresh: a render pass through the cache
    pub async fn render(&self, page: Page, feeds: &Feeds) -> PageUpdate {
        let now = Utc::now().naive_utc();
        match page {
            Page::Prices => PageUpdate::Prices {
                view: self.render_prices(feeds, now).await,
            },
            Page::Weather => PageUpdate::Weather {
                view: self.render_weather(feeds, now).await,
            },
        }
    }

    /// Timed refresh: drop the cached result first so the pass goes upstream.
    /// Invalidation happens under the page lock so a concurrent manual render
    /// can't repopulate the cache in between.
    pub async fn force_refresh(&self, page: Page, feeds: &Feeds) -> PageUpdate {
        let now = Utc::now().naive_utc();
        match page {
            Page::Prices => {
                let controls = self.controls(Page::Prices);
                let mut prices = self.prices.lock().await;
                prices.invalidate(&feeds.coingecko).await;
                PageUpdate::Prices {
                    view: prices.render(&feeds.coingecko, controls, now).await,
                }
            }
            Page::Weather => {
                let controls = self.controls(Page::Weather);
                let mut weather = self.weather.lock().await;
                weather.invalidate(&feeds.open_meteo).await;
                PageUpdate::Weather {
                    view: weather.render(&feeds.open_meteo, controls, now).await,
                }
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PageUpdate> {
        self.updates.subscribe()
    }

    /// Push a view to subscribers; returns how many received it
    pub fn publish(&self, update: PageUpdate) -> usize {
        // No subscribers is fine, the view is simply dropped
        self.updates.send(update).unwrap_or(0)
    }

    /// Apply new auto-refresh settings. Any running loop is replaced (or
    /// stopped when disabled), so a loop always runs with the current interval.
    pub fn configure_auto_refresh(
        self: &Arc<Self>,
        page: Page,
        enabled: bool,
        interval_secs: Option<u64>,
        feeds: &Feeds,
    ) -> RefreshControls {
        let mut slot = self.slot(page).lock();

        if let Some(interval_secs) = interval_secs {
            slot.settings.set_interval(interval_secs);
        }
        slot.settings.set_enabled(enabled);

        // Dropping the old handle aborts its loop
        slot.task = None;

        if enabled {
            let interval = Duration::from_secs(slot.settings.interval_secs());
            slot.task = Some(start_auto_refresh(
                Arc::downgrade(self),
                feeds.clone(),
                page,
                interval,
            ));
            info!(
                "Auto-refresh for {} on session {} every {:?}",
                page, self.id, interval
            );
        } else {
            info!("Auto-refresh for {} on session {} disabled", page, self.id);
        }

        slot.settings.controls()
    }

    pub fn auto_refresh_running(&self, page: Page) -> bool {
        self.slot(page)
            .lock()
            .task
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    pub fn stop_auto_refresh(&self) {
        for page in [Page::Prices, Page::Weather] {
            let mut slot = self.slot(page).lock();
            slot.settings.set_enabled(false);
            slot.task = None;
        }
    }

    /// Stop both loops and tell every watcher the session is over
    pub fn end(&self) {
        self.stop_auto_refresh();
        self.ended.send_replace(true);
    }

    pub fn is_ended(&self) -> bool {
        *self.ended.borrow()
    }

    /// Flips to `true` once the session has ended
    pub fn end_signal(&self) -> watch::Receiver<bool> {
        self.ended.subscribe()
    }
}

/// All live sessions, evicted after a period of inactivity
#[derive(Clone)]
pub struct SessionStore {
    sessions: Cache<Uuid, Arc<DashboardSession>>,
    idle_timeout: Duration,
}

impl SessionStore {
    pub fn new(idle_timeout: Duration) -> Self {
        let sessions = Cache::builder()
            .max_capacity(MAX_SESSIONS)
            .time_to_idle(idle_timeout)
            .eviction_listener(
                |id: Arc<Uuid>, session: Arc<DashboardSession>, cause: RemovalCause| {
                    info!("Session {} ended ({:?})", id, cause);
                    session.end();
                },
            )
            .build();

        Self {
            sessions,
            idle_timeout,
        }
    }

    /// How often a connected client must touch its session to keep it alive
    pub fn keepalive_interval(&self) -> Duration {
        (self.idle_timeout / 3).max(MIN_KEEPALIVE)
    }

    pub async fn create(&self) -> Arc<DashboardSession> {
        let id = Uuid::new_v4();
        let session = Arc::new(DashboardSession::new(id));
        self.sessions.insert(id, session.clone()).await;
        info!("Session {} started", id);
        session
    }

    pub async fn get(&self, id: &Uuid) -> Option<Arc<DashboardSession>> {
        let session = self.sessions.get(id).await;
        if session.is_none() {
            debug!("Unknown session {}", id);
        }
        session
    }

    /// Reset the idle timer; false once the session is gone
    pub async fn touch(&self, id: &Uuid) -> bool {
        self.sessions.get(id).await.is_some()
    }

    /// End a session now; returns false if it didn't exist
    pub async fn remove(&self, id: &Uuid) -> bool {
        self.sessions.remove(id).await.is_some()
    }

    pub async fn count(&self) -> u64 {
        self.sessions.run_pending_tasks().await;
        self.sessions.entry_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let store = SessionStore::new(Duration::from_secs(60));
        let a = store.create().await;
        let b = store.create().await;

        assert_ne!(a.id(), b.id());
        assert!(store.get(&a.id()).await.is_some());
        assert_eq!(store.count().await, 2);
    }

    #[tokio::test]
    async fn test_remove_session() {
        let store = SessionStore::new(Duration::from_secs(60));
        let session = store.create().await;

        assert!(store.remove(&session.id()).await);
        assert!(store.get(&session.id()).await.is_none());
        assert!(!store.remove(&session.id()).await);
    }

    #[tokio::test]
    async fn test_idle_session_is_evicted() {
        let store = SessionStore::new(Duration::from_millis(50));
        let session = store.create().await;
        let id = session.id();
        drop(session);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(store.get(&id).await.is_none());
    }

    #[tokio::test]
    async fn test_eviction_ends_session() {
        let store = SessionStore::new(Duration::from_millis(50));
        let session = store.create().await;
        let mut ended = session.end_signal();
        assert!(!*ended.borrow());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(store.count().await, 0);

        assert!(session.is_ended());
        assert!(ended.has_changed().unwrap());
        assert!(*ended.borrow_and_update());
    }

    #[tokio::test]
    async fn test_touch_keeps_session_alive() {
        let store = SessionStore::new(Duration::from_millis(200));
        let session = store.create().await;

        for _ in 0..6 {
            tokio::time::sleep(store.keepalive_interval()).await;
            assert!(store.touch(&session.id()).await);
        }
        assert!(!session.is_ended());

        store.remove(&session.id()).await;
        assert!(!store.touch(&session.id()).await);
    }

    #[test]
    fn test_keepalive_interval() {
        assert_eq!(
            SessionStore::new(Duration::from_secs(1800)).keepalive_interval(),
            Duration::from_secs(600)
        );
        assert_eq!(
            SessionStore::new(Duration::from_millis(3)).keepalive_interval(),
            MIN_KEEPALIVE
        );
    }

    #[test]
    fn test_end_stops_loops_and_signals() {
        let session = DashboardSession::new(Uuid::new_v4());
        let ended = session.end_signal();

        session.end();
        assert!(*ended.borrow());
        assert!(!session.controls(Page::Prices).auto_refresh);
        assert!(!session.auto_refresh_running(Page::Weather));
    }

    #[test]
    fn test_default_controls() {
        let session = DashboardSession::new(Uuid::new_v4());
        let controls = session.controls(Page::Weather);
        assert_eq!(controls.interval_secs, 30);
        assert!(!controls.auto_refresh);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let session = DashboardSession::new(Uuid::new_v4());
        let update = PageUpdate::Weather {
            view: crate::models::dashboard::WeatherPageView {
                title: String::new(),
                caption: String::new(),
                last_refreshed: Utc::now().naive_utc(),
                last_refreshed_label: String::new(),
                controls: session.controls(Page::Weather),
                current: crate::services::open_meteo::WeatherReading::placeholder(
                    Utc::now().naive_utc(),
                ),
                failure: None,
                warning: None,
                chart: None,
                info: None,
                metrics: Vec::new(),
            },
        };
        assert_eq!(session.publish(update), 0);
    }
}
