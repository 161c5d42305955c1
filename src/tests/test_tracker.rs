#[cfg(test)]
mod tests {
    use chrono::Local;
    use tokio::time::timeout;

    use crate::models::night::{SleepNight, UNRATED};
    use crate::tests::{WAIT, memory_database};
    use crate::ui::tracker::SleepTracker;

    async fn started_tracker() -> (SleepTracker, SleepNight) {
        let db = memory_database().await;
        let tracker = SleepTracker::new(db);
        tracker.wait_idle().await;
        tracker.on_start_tracking().await.unwrap();
        let tonight = tracker.tonight().borrow().clone().expect("start opens a night");
        (tracker, tonight)
    }

    #[tokio::test]
    async fn test_initialize_adopts_open_night() {
        let db = memory_database().await;
        let id = db.insert(&SleepNight::starting_at(1_000)).await.unwrap();

        let tracker = SleepTracker::new(db);
        tracker.wait_idle().await;

        let tonight = tracker.tonight().borrow().clone();
        assert_eq!(tonight.map(|n| n.night_id), Some(id));
    }

    #[tokio::test]
    async fn test_initialize_ignores_closed_night() {
        let db = memory_database().await;
        let mut night = SleepNight::starting_at(1_000);
        night.end_time_milli = 2_000;
        db.insert(&night).await.unwrap();

        let tracker = SleepTracker::new(db);
        tracker.wait_idle().await;

        assert!(tracker.tonight().borrow().is_none());
        assert!(*tracker.start_button_visible().borrow());
    }

    #[tokio::test]
    async fn test_start_inserts_one_open_night() {
        let db = memory_database().await;
        let tracker = SleepTracker::new(db.clone());
        tracker.wait_idle().await;
        let before = db.get_all_nights().await.unwrap().len();

        let captured_from = Local::now().timestamp_millis();
        tracker.on_start_tracking().await.unwrap();
        let captured_to = Local::now().timestamp_millis();

        let nights = db.get_all_nights().await.unwrap();
        assert_eq!(nights.len(), before + 1);

        let night = &nights[0];
        assert!(night.is_open());
        assert_eq!(night.start_time_milli, night.end_time_milli);
        assert!((captured_from..=captured_to).contains(&night.start_time_milli));
        assert_eq!(night.sleep_quality_rating, UNRATED);
        assert_eq!(tracker.tonight().borrow().as_ref(), Some(night));
    }

    #[tokio::test]
    async fn test_start_while_open_is_ignored() {
        let (tracker, tonight) = started_tracker().await;

        // Two more presses, one awaited and one racing
        let racing = tracker.on_start_tracking();
        tracker.on_start_tracking().await.unwrap();
        racing.await.unwrap();

        let nights = tracker.nights().borrow().clone();
        assert_eq!(nights.len(), 1);
        assert_eq!(tracker.tonight().borrow().as_ref(), Some(&tonight));
    }

    #[tokio::test]
    async fn test_concurrent_starts_create_single_night() {
        let db = memory_database().await;
        let tracker = SleepTracker::new(db.clone());
        let first = tracker.on_start_tracking();
        let second = tracker.on_start_tracking();
        first.await.unwrap();
        second.await.unwrap();

        let open: Vec<_> = db.get_all_nights().await.unwrap().into_iter().filter(SleepNight::is_open).collect();
        assert_eq!(open.len(), 1);
    }

    #[tokio::test]
    async fn test_stop_closes_night_and_requests_rating() {
        let (tracker, tonight) = started_tracker().await;

        tracker.on_stop_tracking().await.unwrap();

        let stored = tracker.night_with_id(tonight.night_id).await.unwrap().unwrap();
        assert!(stored.end_time_milli > stored.start_time_milli);
        assert_eq!(stored.start_time_milli, tonight.start_time_milli);

        let signalled = tracker.navigate_to_sleep_quality().peek().expect("rating requested");
        assert_eq!(signalled.night_id, tonight.night_id);
        assert!(tracker.tonight().borrow().is_none());
    }

    #[tokio::test]
    async fn test_stop_without_open_night_is_noop() {
        let db = memory_database().await;
        let tracker = SleepTracker::new(db.clone());
        tracker.wait_idle().await;

        tracker.on_stop_tracking().await.unwrap();

        assert!(tracker.navigate_to_sleep_quality().peek().is_none());
        assert!(db.get_all_nights().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_set_quality_changes_only_rating() {
        let (tracker, tonight) = started_tracker().await;
        tracker.on_stop_tracking().await.unwrap();
        let closed = tracker.night_with_id(tonight.night_id).await.unwrap().unwrap();

        tracker.on_set_sleep_quality(closed.night_id, 4).await.unwrap();

        let rated = tracker.night_with_id(closed.night_id).await.unwrap().unwrap();
        assert_eq!(rated.sleep_quality_rating, 4);
        assert_eq!(rated.start_time_milli, closed.start_time_milli);
        assert_eq!(rated.end_time_milli, closed.end_time_milli);
        assert!(tracker.navigate_to_sleep_tracker().peek().is_some());
    }

    #[tokio::test]
    async fn test_set_quality_ignores_unknown_night_and_bad_rating() {
        let (tracker, tonight) = started_tracker().await;

        tracker.on_set_sleep_quality(tonight.night_id + 100, 3).await.unwrap();
        assert!(tracker.navigate_to_sleep_tracker().peek().is_none());

        tracker.on_set_sleep_quality(tonight.night_id, 6).await.unwrap();
        tracker.on_set_sleep_quality(tonight.night_id, -1).await.unwrap();
        assert!(tracker.navigate_to_sleep_tracker().peek().is_none());

        let stored = tracker.night_with_id(tonight.night_id).await.unwrap().unwrap();
        assert_eq!(stored.sleep_quality_rating, UNRATED);
    }

    #[tokio::test]
    async fn test_clear_empties_listing_and_tonight() {
        let (tracker, _) = started_tracker().await;

        tracker.on_clear().await.unwrap();

        assert!(tracker.nights().borrow().is_empty());
        assert!(tracker.tonight().borrow().is_none());
        assert!(tracker.show_snackbar_event().peek().is_some());

        let mut clear_visible = tracker.clear_button_visible();
        timeout(WAIT, clear_visible.wait_for(|visible| !*visible)).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_button_visibility_follows_tonight() {
        let db = memory_database().await;
        let tracker = SleepTracker::new(db);
        tracker.wait_idle().await;

        let mut start = tracker.start_button_visible();
        let mut stop = tracker.stop_button_visible();
        let mut clear = tracker.clear_button_visible();
        assert!(*start.borrow());
        assert!(!*stop.borrow());
        assert!(!*clear.borrow());

        tracker.on_start_tracking().await.unwrap();
        timeout(WAIT, start.wait_for(|visible| !*visible)).await.unwrap().unwrap();
        timeout(WAIT, stop.wait_for(|visible| *visible)).await.unwrap().unwrap();
        timeout(WAIT, clear.wait_for(|visible| *visible)).await.unwrap().unwrap();

        tracker.on_stop_tracking().await.unwrap();
        timeout(WAIT, start.wait_for(|visible| *visible)).await.unwrap().unwrap();
        timeout(WAIT, stop.wait_for(|visible| !*visible)).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_nights_string_tracks_listing() {
        let (tracker, _) = started_tracker().await;
        tracker.on_stop_tracking().await.unwrap();

        let mut summary = tracker.nights_string();
        let text = timeout(WAIT, summary.wait_for(|text| text.contains("Quality:")))
            .await
            .unwrap()
            .unwrap()
            .clone();
        assert!(text.starts_with("Here is your sleep data"));
        assert_eq!(text.matches("Start:").count(), 1);
    }

    #[tokio::test]
    async fn test_consumed_signal_is_not_redelivered() {
        let (tracker, _) = started_tracker().await;
        tracker.on_stop_tracking().await.unwrap();
        assert!(tracker.navigate_to_sleep_quality().peek().is_some());

        tracker.done_navigating();

        assert!(tracker.navigate_to_sleep_quality().peek().is_none());
        let resubscribed = tracker.navigate_to_sleep_quality().subscribe();
        assert!(resubscribed.borrow().is_none());
    }

    #[tokio::test]
    async fn test_row_click_signals_detail_once() {
        let db = memory_database().await;
        let tracker = SleepTracker::new(db);

        tracker.on_sleep_night_clicked(7);
        assert_eq!(tracker.navigate_to_sleep_data_quality().peek(), Some(7));

        tracker.on_sleep_data_quality_navigated();
        assert_eq!(tracker.navigate_to_sleep_data_quality().peek(), None);
    }

    #[tokio::test]
    async fn test_snackbar_consumed() {
        let (tracker, _) = started_tracker().await;
        tracker.on_clear().await.unwrap();

        tracker.done_showing_snackbar();
        assert!(tracker.show_snackbar_event().peek().is_none());
    }

    #[tokio::test]
    async fn test_cleared_tracker_drops_new_work() {
        let db = memory_database().await;
        let tracker = SleepTracker::new(db.clone());
        tracker.wait_idle().await;

        tracker.on_cleared();
        tracker.on_start_tracking().await.unwrap();

        assert!(db.get_all_nights().await.unwrap().is_empty());
        assert!(tracker.tonight().borrow().is_none());
    }
}
