//! Spatial index over catchment bounding boxes.

use catchment_common::{BoundingBox, CatchmentId, EngineError, EngineResult};
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{RTree, AABB};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

/// How many candidates to scan between cancellation checks.
const CANCEL_CHECK_INTERVAL: usize = 1024;

type IndexEntry = GeomWithData<Rectangle<[f64; 2]>, CatchmentId>;

/// Result of a viewport query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewportSelection {
    /// Selected ids, ascending.
    pub ids: Vec<CatchmentId>,
    /// True when more catchments matched than `ids` holds.
    pub truncated: bool,
    /// Number of catchments whose box intersects the viewport.
    pub total_matches: usize,
}

impl ViewportSelection {
    fn empty() -> Self {
        Self {
            ids: Vec::new(),
            truncated: false,
            total_matches: 0,
        }
    }
}

/// Immutable R-tree of catchment bounding boxes, built once at load.
pub struct SpatialIndex {
    tree: RTree<IndexEntry>,
}

impl SpatialIndex {
    pub fn build(entries: impl IntoIterator<Item = (CatchmentId, BoundingBox)>) -> Self {
        let entries: Vec<IndexEntry> = entries
            .into_iter()
            .filter(|(_, bbox)| bbox_is_finite(bbox))
            .map(|(id, bbox)| {
                GeomWithData::new(
                    Rectangle::from_corners([bbox.min_x, bbox.min_y], [bbox.max_x, bbox.max_y]),
                    id,
                )
            })
            .collect();

        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Catchments whose bounding box intersects `bbox`, at most `limit` of them.
    ///
    /// Matches are ordered by ascending id before truncation, so identical
    /// queries always select the same ids. Boxes that only touch the
    /// viewport edge count as intersecting.
    pub fn query_viewport(
        &self,
        bbox: &BoundingBox,
        limit: usize,
        cancel: &CancellationToken,
    ) -> EngineResult<ViewportSelection> {
        if bbox.is_empty() {
            return Ok(ViewportSelection::empty());
        }

        let envelope = AABB::from_corners([bbox.min_x, bbox.min_y], [bbox.max_x, bbox.max_y]);
        let mut ids = Vec::new();
        for (i, entry) in self.tree.locate_in_envelope_intersecting(&envelope).enumerate() {
            if i % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            ids.push(entry.data);
        }

        ids.sort_unstable();
        ids.dedup();
        let total_matches = ids.len();
        let truncated = total_matches > limit;
        ids.truncate(limit);

        Ok(ViewportSelection {
            ids,
            truncated,
            total_matches,
        })
    }
}

fn bbox_is_finite(bbox: &BoundingBox) -> bool {
    bbox.to_array().iter().all(|v| v.is_finite())
}
