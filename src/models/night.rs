use serde::{Deserialize, Serialize};

/// Rating stored for a night that has not been rated yet.
pub const UNRATED: i32 = -1;

/// Highest rating the quality step accepts; ratings run `0..=MAX_QUALITY`.
pub const MAX_QUALITY: i32 = 5;

/// One sleep-tracking entry. A night is open while its end time still equals
/// its start time.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, Serialize, Deserialize)]
pub struct SleepNight {
    pub night_id: i64,
    pub start_time_milli: i64, // epoch millis
    pub end_time_milli: i64,
    #[sqlx(rename = "quality_rating")]
    pub sleep_quality_rating: i32,
}

impl SleepNight {
    /// A fresh open, unrated night. The id is assigned by the store on insert.
    pub fn starting_at(now_millis: i64) -> Self {
        Self {
            night_id: 0,
            start_time_milli: now_millis,
            end_time_milli: now_millis,
            sleep_quality_rating: UNRATED,
        }
    }

    pub fn is_open(&self) -> bool {
        self.end_time_milli == self.start_time_milli
    }

    pub fn duration_millis(&self) -> i64 {
        self.end_time_milli - self.start_time_milli
    }

    pub fn is_rated(&self) -> bool {
        (0..=MAX_QUALITY).contains(&self.sleep_quality_rating)
    }
}
