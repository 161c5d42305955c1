#[cfg(test)]
mod tests {
    use crate::database::connection::Database;
    use crate::models::night::{SleepNight, UNRATED};
    use crate::tests::{WAIT, memory_database};

    fn closed_night(start: i64, end: i64, quality: i32) -> SleepNight {
        SleepNight {
            night_id: 0,
            start_time_milli: start,
            end_time_milli: end,
            sleep_quality_rating: quality,
        }
    }

    #[test]
    fn test_open_iff_end_equals_start() {
        let open = SleepNight::starting_at(1_000);
        assert!(open.is_open());
        assert_eq!(open.sleep_quality_rating, UNRATED);
        assert!(!open.is_rated());

        let closed = closed_night(1_000, 1_001, 3);
        assert!(!closed.is_open());
        assert!(closed.is_rated());
        assert_eq!(closed.duration_millis(), 1);
    }

    #[tokio::test]
    async fn test_insert_assigns_increasing_ids() {
        let db = memory_database().await;
        let first = db.insert(&SleepNight::starting_at(10)).await.unwrap();
        let second = db.insert(&SleepNight::starting_at(20)).await.unwrap();
        assert!(second > first);

        let stored = db.get(first).await.unwrap().expect("first night stored");
        assert_eq!(stored.night_id, first);
        assert_eq!(stored.start_time_milli, 10);
        assert_eq!(stored.end_time_milli, 10);
        assert_eq!(stored.sleep_quality_rating, UNRATED);
    }

    #[tokio::test]
    async fn test_missing_rows_are_absent_not_errors() {
        let db = memory_database().await;
        assert_eq!(db.get(42).await.unwrap(), None);
        assert_eq!(db.get_tonight().await.unwrap(), None);
        assert!(db.get_all_nights().await.unwrap().is_empty());

        // Updating a row that does not exist is a silent no-op
        let mut ghost = SleepNight::starting_at(5);
        ghost.night_id = 99;
        db.update(&ghost).await.unwrap();
        assert!(db.get_all_nights().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_tonight_returns_highest_id() {
        let db = memory_database().await;
        db.insert(&closed_night(100, 200, 4)).await.unwrap();
        let latest = db.insert(&closed_night(50, 60, 1)).await.unwrap();

        // Ordering is by id, not by start time
        let tonight = db.get_tonight().await.unwrap().unwrap();
        assert_eq!(tonight.night_id, latest);
    }

    #[tokio::test]
    async fn test_update_replaces_full_row() {
        let db = memory_database().await;
        let id = db.insert(&SleepNight::starting_at(1_000)).await.unwrap();

        let mut night = db.get(id).await.unwrap().unwrap();
        night.end_time_milli = 9_000;
        night.sleep_quality_rating = 5;
        db.update(&night).await.unwrap();

        assert_eq!(db.get(id).await.unwrap(), Some(night));
    }

    #[tokio::test]
    async fn test_all_nights_newest_first() {
        let db = memory_database().await;
        let a = db.insert(&closed_night(1, 2, 0)).await.unwrap();
        let b = db.insert(&closed_night(3, 4, 1)).await.unwrap();
        let c = db.insert(&closed_night(5, 6, 2)).await.unwrap();

        let ids: Vec<i64> = db.get_all_nights().await.unwrap().iter().map(|n| n.night_id).collect();
        assert_eq!(ids, vec![c, b, a]);
    }

    #[tokio::test]
    async fn test_clear_removes_everything_and_ids_are_not_reused() {
        let db = memory_database().await;
        db.insert(&closed_night(1, 2, 0)).await.unwrap();
        let before_clear = db.insert(&closed_night(3, 4, 1)).await.unwrap();

        db.clear().await.unwrap();
        assert!(db.get_all_nights().await.unwrap().is_empty());

        let after_clear = db.insert(&SleepNight::starting_at(7)).await.unwrap();
        assert!(after_clear > before_clear, "ids must stay monotonic across a clear");
    }

    #[tokio::test]
    async fn test_observe_all_pushes_every_change() {
        let db = memory_database().await;
        let mut nights = db.observe_all();
        assert!(nights.borrow_and_update().is_empty());

        let id = db.insert(&SleepNight::starting_at(1)).await.unwrap();
        tokio::time::timeout(WAIT, nights.changed()).await.unwrap().unwrap();
        assert_eq!(nights.borrow_and_update()[0].night_id, id);

        // A mutation made through a clone reaches the same observers
        let clone = db.clone();
        clone.clear().await.unwrap();
        tokio::time::timeout(WAIT, nights.changed()).await.unwrap().unwrap();
        assert!(nights.borrow_and_update().is_empty());
    }

    #[tokio::test]
    async fn test_unchanged_listing_does_not_notify() {
        let db = memory_database().await;
        let mut nights = db.observe_all();
        nights.borrow_and_update();

        // Clearing an empty table leaves the listing as it was
        db.clear().await.unwrap();
        assert!(!nights.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_schema_mismatch_recreates_table() {
        let path = std::env::temp_dir().join(format!(
            "sleep_tracker_schema_{}_{}.db",
            std::process::id(),
            chrono::Local::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        let url = format!("sqlite://{}", path.display());

        {
            let db = Database::connect(&url, 1).await.unwrap();
            db.insert(&closed_night(1, 2, 3)).await.unwrap();
        }

        // Reopening with the same schema keeps the data
        {
            let db = Database::connect(&url, 1).await.unwrap();
            assert_eq!(db.get_all_nights().await.unwrap().len(), 1);
        }

        // Pretend the file was written by a different schema
        {
            let pool = sqlx::SqlitePool::connect(&url).await.unwrap();
            sqlx::query("PRAGMA user_version = 99").execute(&pool).await.unwrap();
            pool.close().await;
        }

        let db = Database::connect(&url, 1).await.unwrap();
        assert!(db.get_all_nights().await.unwrap().is_empty());
        let id = db.insert(&SleepNight::starting_at(5)).await.unwrap();
        assert!(db.get(id).await.unwrap().is_some());

        drop(db);
        let _ = std::fs::remove_file(&path);
    }
}
