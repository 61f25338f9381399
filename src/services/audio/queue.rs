use std::collections::VecDeque;

use rand::seq::SliceRandom;

use crate::services::audio::track::{Rejection, Track};

/// Outcome of adding several tracks at once
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdmissionReport {
    pub added: Vec<Track>,
    pub skipped: Vec<(Track, Rejection)>,
}

impl AdmissionReport {
    pub fn total(&self) -> usize {
        self.added.len() + self.skipped.len()
    }

    pub fn summary(&self) -> String {
        format!(
            "Added {}, skipped {} out of {}",
            self.added.len(),
            self.skipped.len(),
            self.total()
        )
    }
}

/// FIFO of upcoming tracks
#[derive(Debug, Clone, Default)]
pub struct TrackQueue {
    tracks: VecDeque<Track>,
}

impl TrackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter()
    }

    pub fn front(&self) -> Option<&Track> {
        self.tracks.front()
    }

    /// Append a user-requested track, returning its 1-based position
    pub fn enqueue(&mut self, track: Track) -> Result<usize, (Track, Rejection)> {
        if let Err(rejection) = track.admission() {
            return Err((track, rejection));
        }
        self.tracks.push_back(track);
        Ok(self.tracks.len())
    }

    pub fn enqueue_many(&mut self, tracks: Vec<Track>) -> AdmissionReport {
        let mut report = AdmissionReport::default();
        for track in tracks {
            match track.admission() {
                Ok(()) => {
                    report.added.push(track.clone());
                    self.tracks.push_back(track);
                }
                Err(rejection) => report.skipped.push((track, rejection)),
            }
        }
        report
    }

    /// Re-append a track that already played, without admission checks
    pub fn requeue(&mut self, track: Track) {
        self.tracks.push_back(track);
    }

    pub fn pop_front(&mut self) -> Option<Track> {
        self.tracks.pop_front()
    }

    /// Remove by 0-based index
    pub fn remove(&mut self, index: usize) -> Option<Track> {
        self.tracks.remove(index)
    }

    pub fn clear(&mut self) -> usize {
        let count = self.tracks.len();
        self.tracks.clear();
        count
    }

    pub fn shuffle(&mut self) {
        self.tracks.make_contiguous().shuffle(&mut rand::rng());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::audio::track::test_track;

    fn ids(queue: &TrackQueue) -> Vec<String> {
        queue.iter().map(|t| t.identifier().to_string()).collect()
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = TrackQueue::new();
        for id in ["a", "b", "c"] {
            queue.enqueue(test_track(id, 180_000, false)).unwrap();
        }
        let drained: Vec<String> = std::iter::from_fn(|| queue.pop_front())
            .map(|t| t.identifier().to_string())
            .collect();
        assert_eq!(drained, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_playlist_admission_summary() {
        let mut queue = TrackQueue::new();
        let report = queue.enqueue_many(vec![
            test_track("a", 180_000, false),
            test_track("b", 3_700_000, false),
            test_track("c", 240_000, false),
        ]);

        assert_eq!(queue.len(), 2);
        assert_eq!(report.summary(), "Added 2, skipped 1 out of 3");
        assert_eq!(report.skipped[0].1, Rejection::TooLong);
        assert_eq!(ids(&queue), vec!["a", "c"]);
    }

    #[test]
    fn test_streams_are_rejected() {
        let mut queue = TrackQueue::new();
        let (track, rejection) = queue.enqueue(test_track("live", 0, true)).unwrap_err();
        assert_eq!(rejection, Rejection::Stream);
        assert_eq!(track.identifier(), "live");
        assert!(queue.is_empty());
    }

    #[test]
    fn test_remove_and_clear() {
        let mut queue = TrackQueue::new();
        for id in ["a", "b", "c"] {
            queue.enqueue(test_track(id, 1_000, false)).unwrap();
        }
        assert_eq!(queue.remove(1).unwrap().identifier(), "b");
        assert!(queue.remove(5).is_none());
        assert_eq!(ids(&queue), vec!["a", "c"]);
        assert_eq!(queue.clear(), 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_shuffle_keeps_tracks() {
        let mut queue = TrackQueue::new();
        for i in 0..20 {
            queue.enqueue(test_track(&i.to_string(), 1_000, false)).unwrap();
        }
        queue.shuffle();
        let mut after = ids(&queue);
        after.sort();
        let mut expected: Vec<String> = (0..20).map(|i| i.to_string()).collect();
        expected.sort();
        assert_eq!(after, expected);
    }
}
