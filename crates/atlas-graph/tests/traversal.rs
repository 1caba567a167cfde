use atlas_core::{
    DependencyRelationship, DependencyScope, ParentRelationship, ProjectRef, ProjectRelationship,
    ProjectVersionRef,
};
use atlas_graph::{
    walk, DependencyFilter, Direction, FilteringTraversal, GraphConnection, MembershipEvaluator,
    PathEvaluator, PathExpander, Provenance, RelationshipGraph, TraversalPath, TraversalStrategy,
    ViewParams,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use url::Url;

fn gav(s: &str) -> ProjectVersionRef {
    s.parse().unwrap()
}

fn dependency(from: &str, to: &str, scope: DependencyScope, managed: bool) -> ProjectRelationship {
    DependencyRelationship::new(gav(from), gav(to).as_artifact("jar"), scope, 0, managed).into()
}

fn compile(from: &str, to: &str) -> ProjectRelationship {
    dependency(from, to, DependencyScope::Compile, false)
}

fn managed(from: &str, to: &str) -> ProjectRelationship {
    dependency(from, to, DependencyScope::Compile, true)
}

fn rooted(root: &str) -> Arc<ViewParams> {
    Arc::new(
        ViewParams::builder("it")
            .with_roots(vec![gav(root)])
            .build()
            .unwrap(),
    )
}

fn accept_all(view: &ViewParams) -> Arc<dyn TraversalStrategy> {
    Arc::new(FilteringTraversal::from_view(view))
}

/// Concrete (non-managed) dependency targets, in discovery order.
fn concrete_targets(accepted: &[ProjectRelationship]) -> Vec<ProjectVersionRef> {
    accepted
        .iter()
        .filter(|rel| !rel.is_managed())
        .map(|rel| rel.target().clone())
        .collect()
}

/// A:1.0 depends on B:1.0 and manages B at 1.2; B:1.2 depends on C:1.0.
fn managed_scenario() -> RelationshipGraph {
    let mut graph = RelationshipGraph::new();
    let provenance = Provenance::default();
    graph.add_relationship(&compile("g:a:1.0", "g:b:1.0"), provenance.clone());
    graph.add_relationship(&managed("g:a:1.0", "g:b:1.2"), provenance.clone());
    graph.add_relationship(&compile("g:b:1.0", "g:old:1.0"), provenance.clone());
    graph.add_relationship(&compile("g:b:1.2", "g:c:1.0"), provenance);
    graph
}

#[test]
fn managed_declaration_mediates_the_walk() {
    let graph = managed_scenario();
    let view = rooted("g:a:1.0");
    let conn = graph.connect(view.clone());

    let outcome = walk(&conn, accept_all(&view), Direction::Outgoing);
    let targets = concrete_targets(&outcome.accepted);

    assert!(targets.contains(&gav("g:b:1.2")));
    assert!(!targets.contains(&gav("g:b:1.0")));
    // The walk continues from the mediated version, not the declared one.
    assert!(targets.contains(&gav("g:c:1.0")));
    assert!(!targets.contains(&gav("g:old:1.0")));

    let mediated = outcome
        .accepted
        .iter()
        .find(|rel| !rel.is_managed() && rel.declaring() == &gav("g:a:1.0"))
        .unwrap();
    assert_eq!(mediated.target(), &gav("g:b:1.2"));
}

#[test]
fn explicit_selection_wins_over_managed() {
    let mut graph = managed_scenario();
    graph.add_relationship(&compile("g:b:1.1", "g:new:1.0"), Provenance::default());
    let view = Arc::new(
        ViewParams::builder("it")
            .with_roots(vec![gav("g:a:1.0")])
            .with_selection("g:b".parse::<ProjectRef>().unwrap(), gav("g:b:1.1"))
            .build()
            .unwrap(),
    );
    let conn = graph.connect(view.clone());

    let outcome = walk(&conn, accept_all(&view), Direction::Outgoing);
    let targets = concrete_targets(&outcome.accepted);

    assert!(targets.contains(&gav("g:b:1.1")));
    assert!(targets.contains(&gav("g:new:1.0")));
    assert!(!targets.contains(&gav("g:b:1.2")));
    assert!(!targets.contains(&gav("g:c:1.0")));
    assert!(!targets.contains(&gav("g:old:1.0")));
}

#[test]
fn selecting_the_declared_version_leaves_managed_in_charge() {
    let graph = managed_scenario();
    let view = Arc::new(
        ViewParams::builder("it")
            .with_roots(vec![gav("g:a:1.0")])
            .with_selection(gav("g:b:1.0"), gav("g:b:1.0"))
            .build()
            .unwrap(),
    );
    let conn = graph.connect(view.clone());

    let outcome = walk(&conn, accept_all(&view), Direction::Outgoing);
    let targets = concrete_targets(&outcome.accepted);

    assert!(targets.contains(&gav("g:b:1.2")));
    assert!(targets.contains(&gav("g:c:1.0")));
    assert!(!targets.contains(&gav("g:old:1.0")));
}

#[test]
fn unmanaged_targets_stay_as_declared() {
    let mut graph = RelationshipGraph::new();
    graph.add_relationship(&compile("g:a:1.0", "g:b:1.0"), Provenance::default());

    let view = rooted("g:a:1.0");
    let conn = graph.connect(view.clone());
    let outcome = walk(&conn, accept_all(&view), Direction::Outgoing);

    assert_eq!(outcome.accepted, vec![compile("g:a:1.0", "g:b:1.0")]);
}

#[test]
fn nearest_managed_declaration_wins() {
    let mut graph = RelationshipGraph::new();
    let provenance = Provenance::default();
    graph.add_relationship(&compile("g:root:1", "g:mid:1"), provenance.clone());
    graph.add_relationship(&managed("g:root:1", "g:lib:3"), provenance.clone());
    graph.add_relationship(&compile("g:mid:1", "g:lib:1"), provenance.clone());
    graph.add_relationship(&compile("g:other:1", "g:lib:1"), provenance.clone());
    graph.add_relationship(&compile("g:root:1", "g:other:1"), provenance.clone());
    graph.add_relationship(&managed("g:other:1", "g:lib:2"), provenance);

    let view = rooted("g:root:1");
    let conn = graph.connect(view.clone());
    let outcome = walk(&conn, accept_all(&view), Direction::Outgoing);

    let lib_from = |declaring: &str| {
        outcome
            .accepted
            .iter()
            .find(|rel| !rel.is_managed() && rel.declaring() == &gav(declaring))
            .filter(|rel| rel.target().artifact() == "lib")
            .map(|rel| rel.target().clone())
    };

    // mid declares nothing itself, so the root's declaration applies.
    assert_eq!(lib_from("g:mid:1"), Some(gav("g:lib:3")));
    // other manages lib directly.
    assert_eq!(lib_from("g:other:1"), Some(gav("g:lib:2")));
}

#[test]
fn managed_versions_inherit_from_parents() {
    let mut graph = RelationshipGraph::new();
    let provenance = Provenance::default();
    graph.add_relationship(
        &ParentRelationship::new(gav("g:app:1"), gav("g:parent:1")).into(),
        provenance.clone(),
    );
    graph.add_relationship(
        &ParentRelationship::terminus(gav("g:parent:1")).into(),
        provenance.clone(),
    );
    graph.add_relationship(&managed("g:parent:1", "g:lib:5"), provenance.clone());
    graph.add_relationship(&compile("g:app:1", "g:lib:1"), provenance);

    let view = rooted("g:app:1");
    let conn = graph.connect(view.clone());
    let outcome = walk(&conn, accept_all(&view), Direction::Outgoing);

    assert!(concrete_targets(&outcome.accepted).contains(&gav("g:lib:5")));
}

#[test]
fn walks_are_deterministic() {
    let graph = managed_scenario();

    let first = Arc::new(
        ViewParams::builder("it")
            .with_roots(vec![gav("g:a:1.0"), gav("g:b:1.0")])
            .build()
            .unwrap(),
    );
    let second = Arc::new(
        ViewParams::builder("it")
            .with_roots(vec![gav("g:b:1.0"), gav("g:a:1.0")])
            .build()
            .unwrap(),
    );
    assert_eq!(first.short_id(), second.short_id());

    let one = walk(&graph.connect(first.clone()), accept_all(&first), Direction::Outgoing);
    let two = walk(&graph.connect(second.clone()), accept_all(&second), Direction::Outgoing);
    let three = walk(&graph.connect(first.clone()), accept_all(&first), Direction::Outgoing);

    assert_eq!(one.accepted, two.accepted);
    assert_eq!(one.accepted, three.accepted);
    assert_eq!(one.stats, three.stats);
}

struct Counting {
    calls: AtomicUsize,
}

impl TraversalStrategy for Counting {
    fn pre_check(&self, _rel: &ProjectRelationship, _path: &[ProjectRelationship], _pass: usize) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        true
    }
}

#[test]
fn each_edge_is_pre_checked_once() {
    // A diamond: d is reachable twice, its outgoing edge is shared.
    let mut graph = RelationshipGraph::new();
    let provenance = Provenance::default();
    for (from, to) in [
        ("g:a:1", "g:b:1"),
        ("g:a:1", "g:c:1"),
        ("g:b:1", "g:d:1"),
        ("g:c:1", "g:d:1"),
        ("g:d:1", "g:e:1"),
    ] {
        graph.add_relationship(&compile(from, to), provenance.clone());
    }

    let view = rooted("g:a:1");
    let conn = graph.connect(view);
    let strategy = Arc::new(Counting {
        calls: AtomicUsize::new(0),
    });
    let outcome = walk(&conn, strategy.clone(), Direction::Outgoing);

    assert_eq!(strategy.calls.load(Ordering::SeqCst), graph.edge_count());
    assert_eq!(outcome.accepted.len(), graph.edge_count());
    assert_eq!(outcome.stats[0].pre_checks(), graph.edge_count());
}

#[test]
fn revisiting_an_edge_is_pruned() {
    let mut graph = RelationshipGraph::new();
    graph.add_relationship(&compile("g:a:1", "g:b:1"), Provenance::default());

    let view = rooted("g:a:1");
    let conn = graph.connect(view.clone());
    let mut evaluator = MembershipEvaluator::new(&conn, accept_all(&view), 0);

    let root = TraversalPath::root(conn.node_for(&gav("g:a:1")).unwrap());
    let edge = evaluator.expand(&root)[0];
    let path = root.extend(edge, edge.target);

    assert!(evaluator.evaluate(&path).includes());
    assert!(!evaluator.evaluate(&path).continues());
    assert!(!evaluator.evaluate(&path).continues());
    assert_eq!(evaluator.stats().evaluator_duplicates, 2);
}

#[test]
fn cycles_terminate() {
    let mut graph = RelationshipGraph::new();
    let provenance = Provenance::default();
    graph.add_relationship(&compile("g:a:1", "g:b:1"), provenance.clone());
    graph.add_relationship(&compile("g:b:1", "g:a:1"), provenance);

    let view = rooted("g:a:1");
    let conn = graph.connect(view.clone());
    let outcome = walk(&conn, accept_all(&view), Direction::Outgoing);

    assert_eq!(outcome.accepted.len(), 2);
}

#[test]
fn inactive_sources_are_not_walked() {
    let central = Url::parse("https://repo.example/central/").unwrap();
    let snapshots = Url::parse("https://repo.example/snapshots/").unwrap();

    let mut graph = RelationshipGraph::new();
    graph.add_relationship(
        &compile("g:a:1", "g:b:1"),
        Provenance::from_source(central.clone()),
    );
    graph.add_relationship(
        &compile("g:a:1", "g:snap:1-SNAPSHOT"),
        Provenance::from_source(snapshots),
    );
    graph.add_relationship(
        &compile("g:b:1", "g:c:1"),
        Provenance::from_source(central.clone()),
    );

    let view = Arc::new(
        ViewParams::builder("it")
            .with_roots(vec![gav("g:a:1")])
            .with_active_sources(vec![central])
            .build()
            .unwrap(),
    );
    let conn = graph.connect(view.clone());
    let strategy = Arc::new(Counting {
        calls: AtomicUsize::new(0),
    });
    let outcome = walk(&conn, strategy.clone(), Direction::Outgoing);

    assert_eq!(
        concrete_targets(&outcome.accepted),
        vec![gav("g:b:1"), gav("g:c:1")]
    );
    assert_eq!(strategy.calls.load(Ordering::SeqCst), 2);
    assert!(outcome.stats[0].expander_member_misses >= 1);
}

#[test]
fn reverse_evaluator_shares_nothing() {
    let mut graph = RelationshipGraph::new();
    graph.add_relationship(&compile("g:a:1", "g:b:1"), Provenance::default());

    let view = rooted("g:a:1");
    let conn = graph.connect(view.clone());
    let mut forward = MembershipEvaluator::new(&conn, accept_all(&view), 0);

    let root = TraversalPath::root(conn.node_for(&gav("g:a:1")).unwrap());
    let edge = forward.expand(&root)[0];
    assert!(forward.evaluate(&root.extend(edge, edge.target)).includes());

    let reverse = forward.reverse();
    assert!(!reverse.is_seen(&edge.id));
    assert!(!reverse.is_accepted(&edge.id));
    assert!(reverse.mediated(&edge.id).is_none());
}

#[test]
fn scoped_walk_from_json_fixture() {
    let fixture = r#"[
        {"type": "dependency", "declaring": "org.example:app:1.0",
         "target": {"gav": "org.example:core:2.0", "type": "jar"}, "index": 0, "scope": "compile"},
        {"type": "dependency", "declaring": "org.example:app:1.0",
         "target": {"gav": "junit:junit:4.13", "type": "jar"}, "index": 1, "scope": "test"},
        {"type": "dependency", "declaring": "org.example:core:2.0",
         "target": {"gav": "org.example:util:1.1", "type": "jar"}, "index": 0, "scope": "runtime"},
        {"type": "parent", "declaring": "org.example:app:1.0", "target": "org.example:parent:3"}
    ]"#;
    let rels: Vec<ProjectRelationship> = serde_json::from_str(fixture).unwrap();

    let mut graph = RelationshipGraph::new();
    graph.add_relationships(&rels, &Provenance::default());
    assert_eq!(graph.edge_count(), 4);

    let view = Arc::new(
        ViewParams::builder("it")
            .with_roots(vec![gav("org.example:app:1.0")])
            .with_filter(Arc::new(DependencyFilter::new(DependencyScope::Runtime)))
            .build()
            .unwrap(),
    );
    let conn = graph.connect(view.clone());
    let outcome = walk(
        &conn,
        Arc::new(FilteringTraversal::from_view(&view)),
        Direction::Outgoing,
    );

    let targets = outcome.targets();
    assert!(targets.contains(&gav("org.example:core:2.0")));
    assert!(targets.contains(&gav("org.example:util:1.1")));
    assert!(targets.contains(&gav("org.example:parent:3")));
    assert!(!targets.contains(&gav("junit:junit:4.13")));
}
