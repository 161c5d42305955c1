use anyhow::Result;
use chrono::Local;
use std::sync::Arc;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

use crate::database::connection::Database;
use crate::models::night::{MAX_QUALITY, SleepNight};
use crate::ui::format;
use crate::ui::observable::OneShot;
use crate::ui::scope::TaskScope;

/// Mediates between the screens and the store.
///
/// Owns the cached open night ("tonight"), derives what each screen should
/// offer from it and from the live listing, and runs every store call as a
/// task in its own [`TaskScope`]. Clones share all state; the scope is
/// cancelled when the last clone goes away.
#[derive(Clone)]
pub struct SleepTracker {
    inner: Arc<TrackerInner>,
}

struct TrackerInner {
    database: Database,
    scope: TaskScope,
    // Serializes every task that reads or writes tonight, so a late initial
    // load cannot overwrite a night started meanwhile.
    write_lock: Arc<Mutex<()>>,
    tonight: Arc<watch::Sender<Option<SleepNight>>>,
    nights: watch::Receiver<Vec<SleepNight>>,
    nights_string: watch::Receiver<String>,
    start_button_visible: watch::Receiver<bool>,
    stop_button_visible: watch::Receiver<bool>,
    clear_button_visible: watch::Receiver<bool>,
    navigate_to_sleep_quality: OneShot<SleepNight>,
    navigate_to_sleep_tracker: OneShot<()>,
    navigate_to_sleep_data_quality: OneShot<i64>,
    show_snackbar_event: OneShot<()>,
}

impl Drop for TrackerInner {
    fn drop(&mut self) {
        self.scope.cancel();
    }
}

fn now_millis() -> i64 {
    Local::now().timestamp_millis()
}

/// The most recent night, but only while it is still open.
async fn get_tonight_from_database(database: &Database) -> Result<Option<SleepNight>> {
    Ok(database.get_tonight().await?.filter(SleepNight::is_open))
}

impl SleepTracker {
    /// Must be called inside a tokio runtime. Loading tonight from the store
    /// starts immediately in the background.
    pub fn new(database: Database) -> Self {
        let scope = TaskScope::new();
        let (tonight_tx, tonight_rx) = watch::channel(None::<SleepNight>);
        let nights = database.observe_all();

        let nights_string = scope.watch_map(nights.clone(), |nights: &Vec<SleepNight>| {
            format::format_nights(nights, &Local)
        });
        let start_button_visible =
            scope.watch_map(tonight_rx.clone(), |tonight: &Option<SleepNight>| tonight.is_none());
        let stop_button_visible =
            scope.watch_map(tonight_rx, |tonight: &Option<SleepNight>| tonight.is_some());
        let clear_button_visible =
            scope.watch_map(nights.clone(), |nights: &Vec<SleepNight>| !nights.is_empty());

        let tracker = Self {
            inner: Arc::new(TrackerInner {
                database,
                scope,
                write_lock: Arc::new(Mutex::new(())),
                tonight: Arc::new(tonight_tx),
                nights,
                nights_string,
                start_button_visible,
                stop_button_visible,
                clear_button_visible,
                navigate_to_sleep_quality: OneShot::new(),
                navigate_to_sleep_tracker: OneShot::new(),
                navigate_to_sleep_data_quality: OneShot::new(),
                show_snackbar_event: OneShot::new(),
            }),
        };
        tracker.initialize_tonight();
        tracker
    }

    fn initialize_tonight(&self) -> JoinHandle<()> {
        let database = self.inner.database.clone();
        let tonight = Arc::clone(&self.inner.tonight);
        let write_lock = Arc::clone(&self.inner.write_lock);
        self.inner.scope.launch("initialize tonight", async move {
            let _guard = write_lock.lock().await;
            let night = get_tonight_from_database(&database).await?;
            if let Some(ref night) = night {
                log::info!("Resuming open night {}", night.night_id);
            }
            tonight.send_replace(night);
            Ok(())
        })
    }

    /// Starts a new night. Ignored while a night is already open: the open
    /// night is adopted as tonight instead of inserting a second one.
    pub fn on_start_tracking(&self) -> JoinHandle<()> {
        let database = self.inner.database.clone();
        let tonight = Arc::clone(&self.inner.tonight);
        let write_lock = Arc::clone(&self.inner.write_lock);
        self.inner.scope.launch("start tracking", async move {
            let _guard = write_lock.lock().await;

            if let Some(open) = get_tonight_from_database(&database).await? {
                log::warn!("Night {} is still open, ignoring start", open.night_id);
                tonight.send_replace(Some(open));
                return Ok(());
            }

            let new_night = SleepNight::starting_at(now_millis());
            let id = database.insert(&new_night).await?;
            log::info!("Started night {}", id);
            tonight.send_replace(get_tonight_from_database(&database).await?);
            Ok(())
        })
    }

    /// Closes tonight and asks for a quality rating. Without an open night
    /// this does nothing.
    pub fn on_stop_tracking(&self) -> JoinHandle<()> {
        let database = self.inner.database.clone();
        let tonight = Arc::clone(&self.inner.tonight);
        let write_lock = Arc::clone(&self.inner.write_lock);
        let navigate = self.inner.navigate_to_sleep_quality.clone();
        self.inner.scope.launch("stop tracking", async move {
            let _guard = write_lock.lock().await;

            let current = tonight.borrow().clone();
            let Some(mut old_night) = current else {
                log::debug!("Stop requested without an open night");
                return Ok(());
            };
            // A stop in the same millisecond as the start must still close it.
            old_night.end_time_milli = now_millis().max(old_night.start_time_milli + 1);
            database.update(&old_night).await?;
            log::info!(
                "Stopped night {} after {}",
                old_night.night_id,
                format::format_hours_minutes_seconds(old_night.duration_millis())
            );

            tonight.send_replace(None);
            navigate.emit(old_night);
            Ok(())
        })
    }

    /// Rates a night and heads back to the tracker. Unknown ids and ratings
    /// outside `0..=5` are ignored.
    pub fn on_set_sleep_quality(&self, night_id: i64, quality: i32) -> JoinHandle<()> {
        let database = self.inner.database.clone();
        let write_lock = Arc::clone(&self.inner.write_lock);
        let navigate = self.inner.navigate_to_sleep_tracker.clone();
        self.inner.scope.launch("set sleep quality", async move {
            if !(0..=MAX_QUALITY).contains(&quality) {
                log::warn!("Rejected quality {} for night {}", quality, night_id);
                return Ok(());
            }
            let _guard = write_lock.lock().await;

            let Some(mut night) = database.get(night_id).await? else {
                log::debug!("Night {} not found, quality not set", night_id);
                return Ok(());
            };
            night.sleep_quality_rating = quality;
            database.update(&night).await?;
            log::info!("Rated night {} as {}", night_id, quality);

            navigate.emit(());
            Ok(())
        })
    }

    pub fn on_clear(&self) -> JoinHandle<()> {
        let database = self.inner.database.clone();
        let tonight = Arc::clone(&self.inner.tonight);
        let write_lock = Arc::clone(&self.inner.write_lock);
        let snackbar = self.inner.show_snackbar_event.clone();
        self.inner.scope.launch("clear nights", async move {
            let _guard = write_lock.lock().await;
            database.clear().await?;
            tonight.send_replace(None);
            snackbar.emit(());
            Ok(())
        })
    }

    pub fn on_sleep_night_clicked(&self, night_id: i64) {
        self.inner.navigate_to_sleep_data_quality.emit(night_id);
    }

    pub fn done_navigating(&self) {
        self.inner.navigate_to_sleep_quality.consume();
    }

    pub fn done_navigating_to_tracker(&self) {
        self.inner.navigate_to_sleep_tracker.consume();
    }

    pub fn on_sleep_data_quality_navigated(&self) {
        self.inner.navigate_to_sleep_data_quality.consume();
    }

    pub fn done_showing_snackbar(&self) {
        self.inner.show_snackbar_event.consume();
    }

    /// Looks a night up for the detail screen.
    pub async fn night_with_id(&self, night_id: i64) -> Result<Option<SleepNight>> {
        self.inner.database.get(night_id).await
    }

    pub fn tonight(&self) -> watch::Receiver<Option<SleepNight>> {
        self.inner.tonight.subscribe()
    }

    pub fn nights(&self) -> watch::Receiver<Vec<SleepNight>> {
        self.inner.nights.clone()
    }

    pub fn nights_string(&self) -> watch::Receiver<String> {
        self.inner.nights_string.clone()
    }

    pub fn start_button_visible(&self) -> watch::Receiver<bool> {
        self.inner.start_button_visible.clone()
    }

    pub fn stop_button_visible(&self) -> watch::Receiver<bool> {
        self.inner.stop_button_visible.clone()
    }

    pub fn clear_button_visible(&self) -> watch::Receiver<bool> {
        self.inner.clear_button_visible.clone()
    }

    pub fn navigate_to_sleep_quality(&self) -> &OneShot<SleepNight> {
        &self.inner.navigate_to_sleep_quality
    }

    pub fn navigate_to_sleep_tracker(&self) -> &OneShot<()> {
        &self.inner.navigate_to_sleep_tracker
    }

    pub fn navigate_to_sleep_data_quality(&self) -> &OneShot<i64> {
        &self.inner.navigate_to_sleep_data_quality
    }

    pub fn show_snackbar_event(&self) -> &OneShot<()> {
        &self.inner.show_snackbar_event
    }

    /// Waits for every store task launched so far to finish.
    pub async fn wait_idle(&self) {
        self.inner.scope.wait_idle().await;
    }

    /// Cancels all in-flight work. Later operations are dropped unrun.
    pub fn on_cleared(&self) {
        log::debug!("Tracker cleared, cancelling background work");
        self.inner.scope.cancel();
    }
}
