use serde::{Deserialize, Serialize};

use crate::{detection::Thumbnail, track::Track};

/// The active tracks of a single slice.
///
/// A slice is processed by one caller at a time, so the store needs no
/// synchronisation of its own.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackStore {
    tracks: Vec<Track>,
}

impl TrackStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tracks(tracks: Vec<Track>) -> Self {
        Self { tracks }
    }

    pub fn get(&self, id: u64) -> Option<&Track> {
        self.tracks.iter().find(|track| track.id == id)
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Swaps in the active set produced by a matching round.
    pub fn replace(&mut self, tracks: Vec<Track>) -> Vec<Track> {
        std::mem::replace(&mut self.tracks, tracks)
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
    }

    pub fn into_tracks(self) -> Vec<Track> {
        self.tracks
    }

    /// Every track in active-set order, with the `(lag, thumbnail)` pairs of
    /// `lags` its history can serve. Nothing outside the lag set is read.
    pub fn lagged_history<'a>(
        &'a self,
        lags: &[usize],
    ) -> Vec<(&'a Track, Vec<(usize, &'a Thumbnail)>)> {
        self.tracks
            .iter()
            .map(|track| (track, track.history.lagged(lags).collect()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(id: u64) -> Track {
        Track::new(id, 0, 2, vec![id as u8].into(), 16)
    }

    #[test]
    fn test_lookup_by_id() {
        let store = TrackStore::from_tracks(vec![track(4), track(9)]);

        assert_eq!(store.get(9).map(|t| t.id), Some(9));
        assert!(store.get(5).is_none());
    }

    #[test]
    fn test_replace_returns_previous_active_set() {
        let mut store = TrackStore::from_tracks(vec![track(1)]);

        let old = store.replace(vec![track(2), track(3)]);

        assert_eq!(old.len(), 1);
        assert_eq!(store.len(), 2);
        assert!(store.get(1).is_none());
    }

    #[test]
    fn test_lagged_history_reads_only_available_lags() {
        let mut old = track(1);
        for step in 0..19u8 {
            old.history.push(vec![step].into());
        }
        let store = TrackStore::from_tracks(vec![old, track(2)]);

        let lagged = store.lagged_history(&[1, 2, 4, 8, 16]);

        assert_eq!(lagged.len(), 2);
        assert_eq!(lagged[0].0.id, 1);
        let lags: Vec<usize> = lagged[0].1.iter().map(|&(lag, _)| lag).collect();
        assert_eq!(lags, vec![1, 2, 4, 8, 16]);
        assert_eq!(&lagged[0].1[0].1[..], &[18u8]);
        assert_eq!(&lagged[0].1[4].1[..], &[3u8]);
        assert_eq!(lagged[1].1.len(), 1);
    }
}
