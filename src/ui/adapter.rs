use chrono::Local;
use ratatui::style::Color;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use crate::models::night::SleepNight;
use crate::ui::format;

/// Decides how two snapshots of a list relate: which entries are the same
/// item, and whether a matched item's contents changed.
pub trait ItemCallback<T> {
    type Key: Eq + Hash;

    fn item_key(&self, item: &T) -> Self::Key;

    fn are_contents_the_same(&self, old_item: &T, new_item: &T) -> bool;
}

/// Two nights are the same item when their ids match, and unchanged when
/// every field matches.
#[derive(Debug, Default, Clone, Copy)]
pub struct SleepNightDiffCallback;

impl ItemCallback<SleepNight> for SleepNightDiffCallback {
    type Key = i64;

    fn item_key(&self, item: &SleepNight) -> i64 {
        item.night_id
    }

    fn are_contents_the_same(&self, old_item: &SleepNight, new_item: &SleepNight) -> bool {
        old_item == new_item
    }
}

/// One row-level change between two snapshots. `Removed` positions refer to
/// the old list; all other positions refer to the new one, except
/// `Moved::from`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListUpdate {
    Removed { position: usize },
    Inserted { position: usize },
    Moved { from: usize, to: usize },
    Changed { position: usize },
}

/// Computes the row updates that turn `old` into `new`.
///
/// Items are matched by key. Among matched items, the longest run that kept
/// its relative order stays put and everything else is reported as moved, so
/// the number of `Moved` updates is minimal. Output order: removals from the
/// back of the old list, then insertions, then moves and changes in new-list
/// order.
pub fn calculate_diff<T, C>(old: &[T], new: &[T], callback: &C) -> Vec<ListUpdate>
where
    C: ItemCallback<T>,
{
    let mut old_positions: HashMap<C::Key, usize> = HashMap::with_capacity(old.len());
    for (position, item) in old.iter().enumerate() {
        old_positions.entry(callback.item_key(item)).or_insert(position);
    }

    let mut matched_old = vec![false; old.len()];
    let mut new_to_old: Vec<Option<usize>> = Vec::with_capacity(new.len());
    for item in new {
        let matched = old_positions
            .get(&callback.item_key(item))
            .copied()
            .filter(|&position| !matched_old[position]);
        if let Some(position) = matched {
            matched_old[position] = true;
        }
        new_to_old.push(matched);
    }

    // (new position, old position) for every matched item, in new order
    let pairs: Vec<(usize, usize)> = new_to_old
        .iter()
        .enumerate()
        .filter_map(|(to, from)| from.map(|from| (to, from)))
        .collect();
    let old_order: Vec<usize> = pairs.iter().map(|&(_, from)| from).collect();
    let stable = longest_increasing_run(&old_order);

    let mut updates = Vec::new();
    for (position, matched) in matched_old.iter().enumerate().rev() {
        if !matched {
            updates.push(ListUpdate::Removed { position });
        }
    }
    for (position, from) in new_to_old.iter().enumerate() {
        if from.is_none() {
            updates.push(ListUpdate::Inserted { position });
        }
    }
    for (index, &(to, from)) in pairs.iter().enumerate() {
        if !stable[index] {
            updates.push(ListUpdate::Moved { from, to });
        }
        if !callback.are_contents_the_same(&old[from], &new[to]) {
            updates.push(ListUpdate::Changed { position: to });
        }
    }
    updates
}

/// Marks the members of one longest strictly increasing subsequence.
fn longest_increasing_run(values: &[usize]) -> Vec<bool> {
    // tails[k]: index of the smallest tail of an increasing run of length k + 1
    let mut tails: Vec<usize> = Vec::new();
    let mut previous: Vec<Option<usize>> = vec![None; values.len()];

    for (index, &value) in values.iter().enumerate() {
        let slot = tails.partition_point(|&tail| values[tail] < value);
        if slot > 0 {
            previous[index] = Some(tails[slot - 1]);
        }
        if slot == tails.len() {
            tails.push(index);
        } else {
            tails[slot] = index;
        }
    }

    let mut in_run = vec![false; values.len()];
    let mut cursor = tails.last().copied();
    while let Some(index) = cursor {
        in_run[index] = true;
        cursor = previous[index];
    }
    in_run
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityIcon {
    Sleep0,
    Sleep1,
    Sleep2,
    Sleep3,
    Sleep4,
    Sleep5,
    /// Night still running or not rated yet.
    Active,
}

impl QualityIcon {
    pub fn from_rating(rating: i32) -> Self {
        match rating {
            0 => QualityIcon::Sleep0,
            1 => QualityIcon::Sleep1,
            2 => QualityIcon::Sleep2,
            3 => QualityIcon::Sleep3,
            4 => QualityIcon::Sleep4,
            5 => QualityIcon::Sleep5,
            _ => QualityIcon::Active,
        }
    }

    pub fn glyph(&self) -> &'static str {
        match self {
            QualityIcon::Sleep0 => "😫",
            QualityIcon::Sleep1 => "😞",
            QualityIcon::Sleep2 => "😐",
            QualityIcon::Sleep3 => "🙂",
            QualityIcon::Sleep4 => "😊",
            QualityIcon::Sleep5 => "😴",
            QualityIcon::Active => "🌙",
        }
    }

    pub fn color(&self) -> Color {
        match self {
            QualityIcon::Sleep0 => Color::Red,
            QualityIcon::Sleep1 => Color::LightRed,
            QualityIcon::Sleep2 => Color::Yellow,
            QualityIcon::Sleep3 => Color::LightYellow,
            QualityIcon::Sleep4 => Color::LightGreen,
            QualityIcon::Sleep5 => Color::Green,
            QualityIcon::Active => Color::Cyan,
        }
    }
}

/// What one grid cell shows for a night.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NightRow {
    pub night_id: i64,
    pub icon: QualityIcon,
    pub quality_text: String,
    pub duration_text: String,
}

impl NightRow {
    pub fn bind(night: &SleepNight) -> Self {
        Self {
            night_id: night.night_id,
            icon: QualityIcon::from_rating(night.sleep_quality_rating),
            quality_text: format::convert_numeric_quality_to_string(night.sleep_quality_rating)
                .to_string(),
            duration_text: format::convert_duration_to_formatted(
                night.start_time_milli,
                night.end_time_milli,
                &Local,
            ),
        }
    }
}

/// Receives the id of a clicked night.
pub struct SleepNightListener {
    click_listener: Box<dyn Fn(i64) + Send + Sync>,
}

impl SleepNightListener {
    pub fn new<F>(click_listener: F) -> Self
    where
        F: Fn(i64) + Send + Sync + 'static,
    {
        Self {
            click_listener: Box::new(click_listener),
        }
    }

    pub fn on_click(&self, night: &SleepNight) {
        (self.click_listener)(night.night_id)
    }
}

/// Keeps the rendered rows for the latest listing and re-renders only what a
/// new listing actually changed.
pub struct SleepNightAdapter {
    items: Vec<SleepNight>,
    rows: Vec<NightRow>,
    callback: SleepNightDiffCallback,
    listener: SleepNightListener,
}

impl SleepNightAdapter {
    pub fn new(listener: SleepNightListener) -> Self {
        Self {
            items: Vec::new(),
            rows: Vec::new(),
            callback: SleepNightDiffCallback,
            listener,
        }
    }

    /// Replaces the snapshot and returns the updates that were applied.
    /// Inserted and changed rows are rendered again; every other row is
    /// carried over from the previous snapshot untouched.
    pub fn submit_list(&mut self, list: Vec<SleepNight>) -> Vec<ListUpdate> {
        let updates = calculate_diff(&self.items, &list, &self.callback);
        if updates.is_empty() {
            self.items = list;
            return updates;
        }

        let changed: HashSet<usize> = updates
            .iter()
            .filter_map(|update| match update {
                ListUpdate::Changed { position } => Some(*position),
                _ => None,
            })
            .collect();
        let old_positions: HashMap<i64, usize> = self
            .items
            .iter()
            .enumerate()
            .map(|(position, night)| (night.night_id, position))
            .collect();
        let mut old_rows: Vec<Option<NightRow>> =
            std::mem::take(&mut self.rows).into_iter().map(Some).collect();

        let mut rendered = 0usize;
        self.rows = list
            .iter()
            .enumerate()
            .map(|(position, night)| {
                let reused = if changed.contains(&position) {
                    None
                } else {
                    old_positions
                        .get(&night.night_id)
                        .and_then(|&old| old_rows.get_mut(old).and_then(Option::take))
                };
                reused.unwrap_or_else(|| {
                    rendered += 1;
                    NightRow::bind(night)
                })
            })
            .collect();
        self.items = list;

        log::debug!(
            "Adapter applied {} updates, rendered {} of {} rows",
            updates.len(),
            rendered,
            self.rows.len()
        );
        updates
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn rows(&self) -> &[NightRow] {
        &self.rows
    }

    /// Forwards a click on `position` to the listener. Returns the clicked
    /// night's id, or `None` if there is no row there.
    pub fn on_click(&self, position: usize) -> Option<i64> {
        let night = self.items.get(position)?;
        self.listener.on_click(night);
        Some(night.night_id)
    }
}
