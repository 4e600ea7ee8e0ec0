use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::{detection::Thumbnail, scorer::HiddenState};

/// Past appearance thumbnails of a track, most recent last.
///
/// Only the newest `capacity` entries are kept, enough to serve the largest
/// query lag.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackHistory {
    entries: VecDeque<Thumbnail>,
    capacity: usize,
}

impl TrackHistory {
    pub fn new(first: Thumbnail, capacity: usize) -> Self {
        let mut history = Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        };
        history.push(first);
        history
    }

    pub fn push(&mut self, thumbnail: Thumbnail) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(thumbnail);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The thumbnail `lag` entries back, `lag = 1` being the newest.
    pub fn at_lag(&self, lag: usize) -> Option<&Thumbnail> {
        if lag == 0 || lag > self.entries.len() {
            return None;
        }
        self.entries.get(self.entries.len() - lag)
    }

    /// `(lag, thumbnail)` for every lag of `lags` the history can serve.
    pub fn lagged<'a>(&'a self, lags: &[usize]) -> impl Iterator<Item = (usize, &'a Thumbnail)> {
        lags.iter()
            .filter_map(move |&lag| self.at_lag(lag).map(|thumbnail| (lag, thumbnail)))
    }
}

/// One tracked object of a slice.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: u64,
    /// Index into the latest frame's detections, `None` when unmatched there.
    pub slot: Option<usize>,
    pub hidden: HiddenState,
    /// Frames since the last confirmed match.
    pub age: u32,
    pub history: TrackHistory,
}

impl Track {
    pub fn new(
        id: u64,
        slot: usize,
        hidden_size: usize,
        thumbnail: Thumbnail,
        history_capacity: usize,
    ) -> Self {
        Self {
            id,
            slot: Some(slot),
            hidden: HiddenState::zeros(hidden_size),
            age: 0,
            history: TrackHistory::new(thumbnail, history_capacity),
        }
    }

    /// Confirms the track against detection `slot` of the current frame.
    pub fn matched(mut self, slot: usize, hidden: HiddenState, thumbnail: Thumbnail) -> Self {
        self.slot = Some(slot);
        self.hidden = hidden;
        self.age = 0;
        self.history.push(thumbnail);
        self
    }

    /// Ages an unmatched track, or drops it once it reaches `max_age`.
    pub fn unmatched(mut self, max_age: u32) -> Option<Self> {
        let age = self.age + 1;
        if age >= max_age {
            return None;
        }
        self.slot = None;
        self.age = age;
        Some(self)
    }
}
