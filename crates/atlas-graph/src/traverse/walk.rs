//! Breadth-first walk driver.

use super::{
    Evaluation, MembershipEvaluator, PathEvaluator, PathExpander, TraversalPath, TraversalStats,
    TraversalStrategy,
};
use crate::connection::GraphConnection;
use crate::graph::{GraphEdge, NodeId};
use atlas_core::{ProjectRelationship, ProjectVersionRef};
use petgraph::Direction;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet, VecDeque};
use std::sync::Arc;
use tracing::debug;

/// What a walk found.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TraversalOutcome {
    /// Accepted relationships after mediation, in discovery order.
    pub accepted: Vec<ProjectRelationship>,
    /// One entry per pass.
    pub stats: Vec<TraversalStats>,
}

impl TraversalOutcome {
    /// Distinct targets of the accepted relationships.
    pub fn targets(&self) -> BTreeSet<ProjectVersionRef> {
        self.accepted.iter().map(|rel| rel.target().clone()).collect()
    }
}

/// Walks the view from its roots, once per strategy pass.
///
/// `Direction::Outgoing` follows relationships from declaring to target,
/// `Direction::Incoming` walks back to the projects that declare them.
/// Roots with no stored node are skipped.
pub fn walk(
    connection: &dyn GraphConnection,
    strategy: Arc<dyn TraversalStrategy>,
    direction: Direction,
) -> TraversalOutcome {
    let roots: Vec<NodeId> = connection
        .view()
        .roots()
        .iter()
        .filter_map(|gav| {
            let node = connection.node_for(gav);
            if node.is_none() {
                debug!("Root {} is not in the graph", gav);
            }
            node
        })
        .collect();

    let mut outcome = TraversalOutcome::default();
    let mut found: HashSet<ProjectRelationship> = HashSet::new();

    for pass in 0..strategy.passes() {
        let mut evaluator = MembershipEvaluator::new(connection, strategy.clone(), pass);
        if direction == Direction::Incoming {
            evaluator = evaluator.reverse();
        }

        let mut queue: VecDeque<TraversalPath> =
            roots.iter().map(|node| TraversalPath::root(*node)).collect();

        while let Some(path) = queue.pop_front() {
            for edge in evaluator.expand(&path) {
                let next = path.extend(edge, next_node(connection, &evaluator, &edge));

                match evaluator.evaluate(&next) {
                    Evaluation::IncludeAndContinue => {
                        if let Some(rel) = evaluator.mediated(&edge.id) {
                            if found.insert(rel.clone()) {
                                outcome.accepted.push(rel.clone());
                            }
                        }
                        queue.push_back(next);
                    }
                    Evaluation::ExcludeAndContinue => queue.push_back(next),
                    Evaluation::ExcludeAndPrune => {}
                }
            }
        }

        evaluator.log_stats();
        outcome.stats.push(evaluator.stats());
    }

    outcome
}

/// Where a walk continues after `edge`. Forward walks follow the mediated
/// target when it is stored.
fn next_node(
    connection: &dyn GraphConnection,
    evaluator: &MembershipEvaluator<'_>,
    edge: &GraphEdge,
) -> NodeId {
    if evaluator.is_reversed() {
        return edge.source;
    }

    evaluator
        .mediated(&edge.id)
        .and_then(|rel| connection.node_for(rel.target()))
        .unwrap_or(edge.target)
}
