use crate::types::{Embedding, KnownIdentity};

/// Outcome of comparing one probe embedding against the gallery.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    /// Whether the nearest gallery entry cleared the threshold.
    pub matched: bool,
    /// Canonical name of the winning entry, present iff `matched`.
    pub name: Option<String>,
    /// Distance to the nearest gallery entry; `f32::INFINITY` when the
    /// gallery is empty.
    pub distance: f32,
}

impl MatchResult {
    fn no_match(distance: f32) -> Self {
        Self {
            matched: false,
            name: None,
            distance,
        }
    }
}

/// Probe-against-gallery comparison seam.
pub trait Matcher {
    fn best_match(
        &self,
        probe: &Embedding,
        gallery: &[KnownIdentity],
        threshold: f32,
    ) -> MatchResult;
}

/// Nearest-neighbour matching under Euclidean distance.
///
/// The entry with minimum distance wins; equal distances keep the earliest
/// gallery entry. A match requires the minimum distance to be strictly
/// below the threshold. An empty gallery is a non-match, never an error.
pub struct EuclideanMatcher;

impl Matcher for EuclideanMatcher {
    fn best_match(
        &self,
        probe: &Embedding,
        gallery: &[KnownIdentity],
        threshold: f32,
    ) -> MatchResult {
        let mut best: Option<(usize, f32)> = None;
        for (i, known) in gallery.iter().enumerate() {
            let distance = probe.euclidean_distance(&known.embedding);
            let closer = match best {
                None => true,
                Some((_, best_distance)) => distance < best_distance,
            };
            if closer {
                best = Some((i, distance));
            }
        }

        let Some((index, distance)) = best else {
            return MatchResult::no_match(f32::INFINITY);
        };

        if distance < threshold {
            MatchResult {
                matched: true,
                name: Some(gallery[index].name.clone()),
                distance,
            }
        } else {
            MatchResult::no_match(distance)
        }
    }
}
