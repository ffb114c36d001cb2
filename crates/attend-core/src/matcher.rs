//! Nearest-neighbour matching of a query embedding against the gallery.

use crate::types::{Embedding, IdentityRecord};

/// Best gallery entry for a query, with its distance.
#[derive(Debug, Clone, Copy)]
pub struct Match<'a> {
    pub identity: &'a IdentityRecord,
    pub distance: f32,
}

/// Strategy for comparing a query embedding against a gallery of enrolled faces.
pub trait Matcher {
    /// Closest gallery entry regardless of tolerance, or `None` for an empty gallery.
    fn nearest<'a>(&self, query: &Embedding, gallery: &'a [IdentityRecord]) -> Option<Match<'a>>;

    /// Closest gallery entry if its distance is strictly below `tolerance`.
    ///
    /// A distance exactly equal to `tolerance` is rejected. The tolerance is
    /// not clamped or validated.
    fn compare<'a>(
        &self,
        query: &Embedding,
        gallery: &'a [IdentityRecord],
        tolerance: f32,
    ) -> Option<Match<'a>> {
        self.nearest(query, gallery)
            .filter(|m| m.distance < tolerance)
    }
}

/// Euclidean distance matcher.
///
/// Always iterates every gallery entry. When several entries share the exact
/// minimum distance the one with the lowest identity id wins, so the result
/// does not depend on gallery order.
///
/// # Panics
///
/// Panics if the query and a gallery embedding differ in dimensionality;
/// all embeddings must come from the same encoder.
pub struct EuclideanMatcher;

impl Matcher for EuclideanMatcher {
    fn nearest<'a>(&self, query: &Embedding, gallery: &'a [IdentityRecord]) -> Option<Match<'a>> {
        let mut best: Option<Match<'a>> = None;

        for identity in gallery {
            assert_eq!(
                query.dim(),
                identity.embedding.dim(),
                "embedding dimensionality mismatch for identity {}",
                identity.id
            );

            let distance = query.euclidean_distance(&identity.embedding);
            if distance.is_nan() {
                continue;
            }

            let is_better = match &best {
                None => true,
                Some(prev) => {
                    distance < prev.distance
                        || (distance == prev.distance && identity.id < prev.identity.id)
                }
            };
            if is_better {
                best = Some(Match { identity, distance });
            }
        }

        best
    }
}
