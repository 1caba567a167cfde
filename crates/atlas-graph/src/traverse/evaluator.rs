//! The membership-wrapped evaluator.
//!
//! Wraps a [`TraversalStrategy`] with the view's membership rules and a
//! per-instance verdict cache keyed by relationship id. Each edge is
//! pre-checked at most once per instance; later visits reuse the verdict,
//! and a second evaluation of the same edge is pruned as a duplicate.

use super::{Evaluation, PathEvaluator, PathExpander, TraversalPath, TraversalStrategy};
use crate::codec::RelationshipId;
use crate::connection::GraphConnection;
use crate::graph::{GraphEdge, NodeId};
use atlas_core::ProjectRelationship;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Counters gathered over one traversal pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraversalStats {
    pub pass: usize,
    pub reversed: bool,
    pub expander_hits: usize,
    pub expander_member_hits: usize,
    pub expander_member_misses: usize,
    pub expander_pre_checks: usize,
    pub evaluator_hits: usize,
    pub evaluator_member_hits: usize,
    pub evaluator_member_misses: usize,
    pub evaluator_duplicates: usize,
    pub evaluator_pre_checks: usize,
}

impl TraversalStats {
    /// Total strategy invocations.
    pub fn pre_checks(&self) -> usize {
        self.expander_pre_checks + self.evaluator_pre_checks
    }
}

impl fmt::Display for TraversalStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "pass {}{}",
            self.pass,
            if self.reversed { " (reversed)" } else { "" }
        )?;
        writeln!(f, "  expander hits:              {}", self.expander_hits)?;
        writeln!(f, "  expander membership hits:   {}", self.expander_member_hits)?;
        writeln!(f, "  expander membership misses: {}", self.expander_member_misses)?;
        writeln!(f, "  expander pre-checks:        {}", self.expander_pre_checks)?;
        writeln!(f, "  evaluator hits:             {}", self.evaluator_hits)?;
        writeln!(f, "  evaluator membership hits:  {}", self.evaluator_member_hits)?;
        writeln!(f, "  evaluator membership misses: {}", self.evaluator_member_misses)?;
        writeln!(f, "  evaluator duplicates:       {}", self.evaluator_duplicates)?;
        write!(f, "  evaluator pre-checks:       {}", self.evaluator_pre_checks)
    }
}

/// Evaluator and expander for one pass of a traversal.
///
/// Not shared between threads: run one instance per pass and direction.
pub struct MembershipEvaluator<'a> {
    connection: &'a dyn GraphConnection,
    strategy: Arc<dyn TraversalStrategy>,
    pass: usize,
    reversed: bool,
    seen: HashSet<RelationshipId>,
    accepted: HashSet<RelationshipId>,
    rejected: HashSet<RelationshipId>,
    /// Mediated form of each accepted relationship, as first accepted.
    selected: HashMap<RelationshipId, ProjectRelationship>,
    stats: TraversalStats,
}

impl<'a> MembershipEvaluator<'a> {
    pub fn new(
        connection: &'a dyn GraphConnection,
        strategy: Arc<dyn TraversalStrategy>,
        pass: usize,
    ) -> Self {
        Self {
            connection,
            strategy,
            pass,
            reversed: false,
            seen: HashSet::new(),
            accepted: HashSet::new(),
            rejected: HashSet::new(),
            selected: HashMap::new(),
            stats: TraversalStats {
                pass,
                ..TraversalStats::default()
            },
        }
    }

    pub fn pass(&self) -> usize {
        self.pass
    }

    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    /// Direction edges are followed in.
    pub fn direction(&self) -> Direction {
        if self.reversed {
            Direction::Incoming
        } else {
            Direction::Outgoing
        }
    }

    pub fn stats(&self) -> TraversalStats {
        self.stats
    }

    pub fn log_stats(&self) {
        debug!("Traversal statistics:\n{}", self.stats);
    }

    pub fn is_seen(&self, id: &RelationshipId) -> bool {
        self.seen.contains(id)
    }

    pub fn is_accepted(&self, id: &RelationshipId) -> bool {
        self.accepted.contains(id)
    }

    pub fn is_rejected(&self, id: &RelationshipId) -> bool {
        self.rejected.contains(id)
    }

    /// The mediated relationship accepted for `id`.
    pub fn mediated(&self, id: &RelationshipId) -> Option<&ProjectRelationship> {
        self.selected.get(id)
    }

    /// The node an edge leads to in this evaluator's direction.
    fn far_node(&self, edge: &GraphEdge) -> NodeId {
        if self.reversed {
            edge.source
        } else {
            edge.target
        }
    }

    fn decode(&self, edge: &GraphEdge) -> Option<ProjectRelationship> {
        match self.connection.relationship(edge) {
            Ok(rel) => rel,
            Err(e) => {
                warn!("Cannot decode relationship {}: {}", edge.id.short(), e);
                None
            }
        }
    }

    /// Applies the view's mutator. Reversed walks follow declared versions.
    fn mediate(
        &self,
        rel: ProjectRelationship,
        context: &[ProjectRelationship],
    ) -> ProjectRelationship {
        if self.reversed {
            return rel;
        }

        let view = self.connection.view();
        let rewritten = match view.mutator().select_for(&rel, context, self.connection, view) {
            Cow::Owned(rewritten) => Some(rewritten),
            Cow::Borrowed(_) => None,
        };
        rewritten.unwrap_or(rel)
    }

    /// Relationships along `edges`, each mediated against the ones before it.
    fn relationships_along(&self, edges: &[GraphEdge]) -> Vec<ProjectRelationship> {
        let mut rels = Vec::with_capacity(edges.len());
        for rel in self.connection.decode_path(edges) {
            let mediated = self.mediate(rel, &rels);
            rels.push(mediated);
        }
        rels
    }

    /// Context handed to the strategy during expansion.
    fn expansion_context(&self, path: &TraversalPath) -> Vec<ProjectRelationship> {
        let mut rels = self.relationships_along(path.edges());
        if self.reversed {
            rels.reverse();
        }
        rels
    }

    fn record_verdict(&mut self, id: RelationshipId, rel: ProjectRelationship, accept: bool) {
        if accept {
            self.accepted.insert(id);
            self.selected.entry(id).or_insert(rel);
        } else {
            self.rejected.insert(id);
        }
    }
}

impl PathEvaluator for MembershipEvaluator<'_> {
    fn evaluate(&mut self, path: &TraversalPath) -> Evaluation {
        self.stats.evaluator_hits += 1;

        let Some(edge) = path.last_edge().copied() else {
            return Evaluation::ExcludeAndContinue;
        };

        if !self.seen.insert(edge.id) {
            self.stats.evaluator_duplicates += 1;
            return Evaluation::ExcludeAndPrune;
        }

        if self.accepted.contains(&edge.id) {
            self.stats.evaluator_member_hits += 1;
            return Evaluation::IncludeAndContinue;
        }
        if self.rejected.contains(&edge.id) {
            self.stats.evaluator_member_hits += 1;
            return Evaluation::ExcludeAndPrune;
        }

        if !self.connection.node_in_membership(path.end_node())
            || !self.connection.edge_in_membership(&edge)
        {
            self.stats.evaluator_member_misses += 1;
            return Evaluation::ExcludeAndPrune;
        }
        self.stats.evaluator_member_hits += 1;

        let edges = path.edges();
        let mut context = self.relationships_along(&edges[..edges.len() - 1]);

        let Some(decoded) = self.decode(&edge) else {
            self.rejected.insert(edge.id);
            return Evaluation::ExcludeAndPrune;
        };
        let rel = self.mediate(decoded, &context);

        // The trailing relationship is dropped from its own context unless it
        // already appears earlier on the path.
        if context.contains(&rel) {
            debug!("{} repeats on its own path", rel);
            context.push(rel.clone());
        }

        if context.is_empty() {
            return Evaluation::ExcludeAndContinue;
        }

        self.stats.evaluator_pre_checks += 1;
        let accept = self.strategy.pre_check(&rel, &context, self.pass);
        self.record_verdict(edge.id, rel, accept);

        if accept {
            Evaluation::IncludeAndContinue
        } else {
            Evaluation::ExcludeAndPrune
        }
    }
}

impl PathExpander for MembershipEvaluator<'_> {
    fn expand(&mut self, path: &TraversalPath) -> Vec<GraphEdge> {
        self.stats.expander_hits += 1;

        let node = path.end_node();
        // An empty path sits on a root and is not gated on membership.
        if !path.is_empty() && !self.connection.node_in_membership(node) {
            self.stats.expander_member_misses += 1;
            return Vec::new();
        }

        if let Some(edge) = path.last_edge() {
            if !self.connection.edge_in_membership(edge) {
                self.stats.expander_member_misses += 1;
                return Vec::new();
            }
        }
        self.stats.expander_member_hits += 1;

        let mut context: Option<Vec<ProjectRelationship>> = None;
        let mut result = Vec::new();

        for candidate in self.connection.adjacency(node, self.direction()) {
            if self.accepted.contains(&candidate.id) {
                result.push(candidate);
                continue;
            }
            if self.rejected.contains(&candidate.id) {
                continue;
            }

            if !self.connection.edge_in_membership(&candidate)
                || !self.connection.node_in_membership(self.far_node(&candidate))
            {
                self.stats.expander_member_misses += 1;
                continue;
            }

            let Some(decoded) = self.decode(&candidate) else {
                self.rejected.insert(candidate.id);
                continue;
            };

            let rels = match context.take() {
                Some(rels) => rels,
                None => self.expansion_context(path),
            };
            let rel = self.mediate(decoded, &rels);

            self.stats.expander_pre_checks += 1;
            let accept = self.strategy.pre_check(&rel, &rels, self.pass);
            context = Some(rels);

            self.record_verdict(candidate.id, rel, accept);
            if accept {
                result.push(candidate);
            }
        }

        result
    }

    /// A fresh evaluator for the opposite direction. Nothing learned by this
    /// instance carries over.
    fn reverse(&self) -> Self {
        let reversed = !self.reversed;
        Self {
            connection: self.connection,
            strategy: self.strategy.clone(),
            pass: self.pass,
            reversed,
            seen: HashSet::new(),
            accepted: HashSet::new(),
            rejected: HashSet::new(),
            selected: HashMap::new(),
            stats: TraversalStats {
                pass: self.pass,
                reversed,
                ..TraversalStats::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{EncodedRelationship, GraphRelType, PropertyBag};
    use crate::graph::{Provenance, RelationshipGraph};
    use crate::view::ViewParams;
    use atlas_core::{DependencyRelationship, DependencyScope, ParentRelationship, ProjectVersionRef};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use url::Url;

    /// Accepts everything and remembers what it was asked.
    #[derive(Default)]
    struct Recording {
        calls: AtomicUsize,
        targets: Mutex<Vec<ProjectVersionRef>>,
        context_lengths: Mutex<Vec<usize>>,
    }

    impl TraversalStrategy for Recording {
        fn pre_check(&self, rel: &ProjectRelationship, path: &[ProjectRelationship], _pass: usize) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.targets.lock().unwrap().push(rel.target().clone());
            self.context_lengths.lock().unwrap().push(path.len());
            true
        }
    }

    struct RejectAll;

    impl TraversalStrategy for RejectAll {
        fn pre_check(&self, _rel: &ProjectRelationship, _path: &[ProjectRelationship], _pass: usize) -> bool {
            false
        }
    }

    fn gav(s: &str) -> ProjectVersionRef {
        s.parse().unwrap()
    }

    fn dependency(from: &str, to: &str) -> ProjectRelationship {
        DependencyRelationship::new(
            gav(from),
            gav(to).as_artifact("jar"),
            DependencyScope::Compile,
            0,
            false,
        )
        .into()
    }

    fn chain_graph() -> RelationshipGraph {
        let mut graph = RelationshipGraph::new();
        graph.add_relationship(&dependency("g:a:1", "g:b:1"), Provenance::default());
        graph.add_relationship(&dependency("g:b:1", "g:c:1"), Provenance::default());
        graph
    }

    fn view(root: &str) -> Arc<ViewParams> {
        Arc::new(
            ViewParams::builder("ws")
                .with_roots(vec![gav(root)])
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_root_path_continues_without_including() {
        let graph = chain_graph();
        let conn = graph.connect(view("g:a:1"));
        let mut evaluator = MembershipEvaluator::new(&conn, Arc::new(Recording::default()), 0);

        let root = TraversalPath::root(graph.node_for(&gav("g:a:1")).unwrap());
        assert_eq!(evaluator.evaluate(&root), Evaluation::ExcludeAndContinue);
    }

    #[test]
    fn test_expand_then_evaluate() {
        let graph = chain_graph();
        let conn = graph.connect(view("g:a:1"));
        let strategy = Arc::new(Recording::default());
        let mut evaluator = MembershipEvaluator::new(&conn, strategy.clone(), 0);

        let a = graph.node_for(&gav("g:a:1")).unwrap();
        let root = TraversalPath::root(a);
        let edges = evaluator.expand(&root);
        assert_eq!(edges.len(), 1);

        let next = root.extend(edges[0], edges[0].target);
        assert_eq!(evaluator.evaluate(&next), Evaluation::IncludeAndContinue);
        assert_eq!(evaluator.evaluate(&next), Evaluation::ExcludeAndPrune);

        let deeper = evaluator.expand(&next);
        assert_eq!(deeper.len(), 1);
        assert_eq!(*strategy.context_lengths.lock().unwrap(), vec![0, 1]);

        let stats = evaluator.stats();
        assert_eq!(stats.evaluator_duplicates, 1);
        assert_eq!(stats.expander_pre_checks, 2);
        assert_eq!(stats.evaluator_pre_checks, 0);
    }

    #[test]
    fn test_pre_check_runs_once_per_edge() {
        let graph = chain_graph();
        let conn = graph.connect(view("g:a:1"));
        let strategy = Arc::new(Recording::default());
        let mut evaluator = MembershipEvaluator::new(&conn, strategy.clone(), 0);

        let root = TraversalPath::root(graph.node_for(&gav("g:a:1")).unwrap());
        evaluator.expand(&root);
        evaluator.expand(&root);
        evaluator.expand(&root);

        assert_eq!(strategy.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_rejected_edges_are_pruned() {
        let graph = chain_graph();
        let conn = graph.connect(view("g:a:1"));
        let mut evaluator = MembershipEvaluator::new(&conn, Arc::new(RejectAll), 0);

        let root = TraversalPath::root(graph.node_for(&gav("g:a:1")).unwrap());
        assert!(evaluator.expand(&root).is_empty());

        let edge = graph.edges_directed(root.end_node(), Direction::Outgoing)[0];
        assert!(evaluator.is_rejected(&edge.id));
        let next = root.extend(edge, edge.target);
        assert_eq!(evaluator.evaluate(&next), Evaluation::ExcludeAndPrune);
    }

    #[test]
    fn test_non_member_targets_never_reach_strategy() {
        let mut graph = RelationshipGraph::new();
        let central = Url::parse("http://central/").unwrap();
        graph.add_relationship(
            &dependency("g:a:1", "g:b:1"),
            Provenance::from_source(central.clone()),
        );
        graph.add_relationship(
            &dependency("g:a:1", "g:c:1"),
            Provenance::from_source(Url::parse("http://elsewhere/").unwrap()),
        );

        let view = Arc::new(
            ViewParams::builder("ws")
                .with_roots(vec![gav("g:a:1")])
                .with_active_sources(vec![central])
                .build()
                .unwrap(),
        );
        let conn = graph.connect(view);
        let strategy = Arc::new(Recording::default());
        let mut evaluator = MembershipEvaluator::new(&conn, strategy.clone(), 0);

        let root = TraversalPath::root(graph.node_for(&gav("g:a:1")).unwrap());
        let edges = evaluator.expand(&root);

        assert_eq!(edges.len(), 1);
        assert_eq!(*strategy.targets.lock().unwrap(), vec![gav("g:b:1")]);
        assert_eq!(evaluator.stats().expander_member_misses, 1);

        let c_edge = graph
            .edges_directed(root.end_node(), Direction::Outgoing)
            .into_iter()
            .find(|e| e.target == graph.node_for(&gav("g:c:1")).unwrap())
            .unwrap();
        let next = root.extend(c_edge, c_edge.target);
        assert_eq!(evaluator.evaluate(&next), Evaluation::ExcludeAndPrune);
        assert_eq!(evaluator.stats().evaluator_member_misses, 1);
        assert_eq!(strategy.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_repeated_edge_keeps_its_context() {
        let mut graph = RelationshipGraph::new();
        let terminus: ProjectRelationship = ParentRelationship::terminus(gav("g:p:1")).into();
        let id = graph.add_relationship(&terminus, Provenance::default());

        let conn = graph.connect(view("g:p:1"));
        let strategy = Arc::new(Recording::default());
        let mut evaluator = MembershipEvaluator::new(&conn, strategy.clone(), 0);

        // A self-loop followed twice: the edge shows up in its own context.
        let edge = graph.edge_for(&id).unwrap();
        let path = TraversalPath::root(edge.source)
            .extend(edge, edge.target)
            .extend(edge, edge.target);

        assert_eq!(evaluator.evaluate(&path), Evaluation::IncludeAndContinue);
        assert_eq!(strategy.calls.load(Ordering::SeqCst), 1);
        assert_eq!(*strategy.context_lengths.lock().unwrap(), vec![2]);
        assert_eq!(evaluator.stats().evaluator_pre_checks, 1);
    }

    #[test]
    fn test_first_edge_has_no_context() {
        let graph = chain_graph();
        let conn = graph.connect(view("g:a:1"));
        let strategy = Arc::new(Recording::default());
        let mut evaluator = MembershipEvaluator::new(&conn, strategy.clone(), 0);

        let root = TraversalPath::root(graph.node_for(&gav("g:a:1")).unwrap());
        let edge = graph.edges_directed(root.end_node(), Direction::Outgoing)[0];
        let next = root.extend(edge, edge.target);

        assert_eq!(evaluator.evaluate(&next), Evaluation::ExcludeAndContinue);
        assert_eq!(strategy.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unmodeled_edges_are_skipped() {
        let mut graph = chain_graph();
        graph.add_raw_edge(
            &gav("g:a:1"),
            &gav("g:c:1"),
            EncodedRelationship {
                rel_type: GraphRelType::Cycle,
                properties: PropertyBag::new(),
            },
            Provenance::default(),
        );

        let conn = graph.connect(view("g:a:1"));
        let strategy = Arc::new(Recording::default());
        let mut evaluator = MembershipEvaluator::new(&conn, strategy.clone(), 0);

        let root = TraversalPath::root(graph.node_for(&gav("g:a:1")).unwrap());
        let edges = evaluator.expand(&root);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].rel_type, GraphRelType::Dependency);
        assert_eq!(strategy.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reverse_starts_clean() {
        let graph = chain_graph();
        let conn = graph.connect(view("g:a:1"));
        let mut forward = MembershipEvaluator::new(&conn, Arc::new(Recording::default()), 0);

        let root = TraversalPath::root(graph.node_for(&gav("g:a:1")).unwrap());
        let edge = forward.expand(&root)[0];
        let next = root.extend(edge, edge.target);
        assert_eq!(forward.evaluate(&next), Evaluation::IncludeAndContinue);

        let mut reverse = forward.reverse();
        assert!(reverse.is_reversed());
        assert_eq!(reverse.direction(), Direction::Incoming);
        assert!(!reverse.is_seen(&edge.id));
        assert!(!reverse.is_accepted(&edge.id));
        assert_eq!(reverse.stats().evaluator_hits, 0);

        // Walking back from b finds the same edge, fresh.
        let b = TraversalPath::root(edge.target);
        let back = reverse.expand(&b);
        assert_eq!(back, vec![edge]);
        let path = b.extend(edge, edge.source);
        assert_ne!(reverse.evaluate(&path), Evaluation::ExcludeAndPrune);
        assert!(forward.is_seen(&edge.id));
    }
}
