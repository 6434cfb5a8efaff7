use std::collections::BTreeSet;

use log::debug;

use super::{BodySource, BroadPhase, CandidatePair, Gizmo, GizmoKind, QueryStats};
use crate::collision::AABB;
use crate::error::{CollisionError, Result};

/// All-pairs tight-box test. Quadratic; kept as a reference to check the tree against.
#[derive(Debug, Clone, Default)]
pub struct BruteForce {
    tracked: BTreeSet<usize>,
    initialized: bool,
    /// Tight boxes from the last query, in body order.
    last_boxes: Vec<(usize, AABB)>,
    stats: QueryStats,
}

impl BruteForce {
    pub fn len(&self) -> usize {
        self.tracked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracked.is_empty()
    }
}

impl BroadPhase for BruteForce {
    fn init(&mut self, bodies: &dyn BodySource) -> Result<()> {
        self.tracked.extend(0..bodies.body_count());
        self.initialized = true;
        Ok(())
    }

    fn insert(&mut self, body: usize, bodies: &dyn BodySource) -> Result<()> {
        if bodies.body(body).is_none() {
            return Err(CollisionError::UnknownBody(body));
        }
        self.tracked.insert(body);
        Ok(())
    }

    fn remove(&mut self, body: usize) -> Result<()> {
        if self.tracked.remove(&body) {
            Ok(())
        } else {
            Err(CollisionError::InvalidHandle)
        }
    }

    fn candidate_pairs(&mut self, bodies: &dyn BodySource) -> Result<Vec<CandidatePair>> {
        if !self.initialized {
            self.init(bodies)?;
        }

        self.last_boxes.clear();
        for &index in &self.tracked {
            let body = bodies.body(index).ok_or(CollisionError::UnknownBody(index))?;
            self.last_boxes.push((index, body.calculate_aabb()));
        }

        let mut pairs = Vec::new();
        for (i, (a, box_a)) in self.last_boxes.iter().enumerate() {
            for (b, box_b) in self.last_boxes.iter().skip(i + 1) {
                if box_a.collides(box_b) {
                    pairs.push(CandidatePair::new(*a, *b));
                }
            }
        }

        self.stats = QueryStats {
            invalid_nodes: 0,
            potential_pairs: pairs.len(),
        };
        debug!("Brute-force broad phase: {} potential pairs", pairs.len());
        Ok(pairs)
    }

    fn gizmos(&self) -> Vec<Gizmo> {
        self.last_boxes
            .iter()
            .map(|(_, aabb)| Gizmo {
                aabb: *aabb,
                kind: GizmoKind::TightLeaf,
            })
            .collect()
    }

    fn last_query_stats(&self) -> QueryStats {
        self.stats
    }
}
