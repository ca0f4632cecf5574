// Ordering, at-most-once and throttling guarantees of the tree walks


use brewc::traverse::{FAN_OUT_WIDTH, Order, traverse};
use brewc::{BrewcError, FormulaTree, NodeId, child_first, parent_first};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use test_helpers::formula;

/// app -> [libA, libB], libB -> [libC]
fn scenario_a() -> FormulaTree {
    let tree = FormulaTree::new(formula("app", &["libA", "libB"]), true);
    tree.insert(tree.root(), formula("libA", &[])).unwrap();
    let lib_b = tree.insert(tree.root(), formula("libB", &["libC"])).unwrap();
    tree.insert(lib_b, formula("libC", &[])).unwrap();
    tree
}

/// Three levels, fan-out of three at each level (40 nodes)
fn wide_tree() -> FormulaTree {
    let tree = FormulaTree::new(formula("root", &[]), true);
    let mut level = vec![tree.root()];
    for depth in 0..3 {
        let mut next = Vec::new();
        for (i, parent) in level.iter().enumerate() {
            for j in 0..3 {
                let name = format!("n{depth}-{i}-{j}");
                next.push(tree.insert(*parent, formula(&name, &[])).unwrap());
            }
        }
        level = next;
    }
    tree
}

fn descendants(tree: &FormulaTree, node: NodeId) -> Vec<String> {
    let mut out = Vec::new();
    let mut stack = tree.children(node);
    while let Some(id) = stack.pop() {
        out.push(tree.formula(id).name.clone());
        stack.extend(tree.children(id));
    }
    out
}

type Log = Arc<Mutex<Vec<String>>>;

async fn record(tree: &FormulaTree, budget: usize, order: Order) -> Vec<String> {
    let log: Log = Arc::default();
    let sink = Arc::clone(&log);
    let report = traverse(tree, budget, order, move |f| {
        let sink = Arc::clone(&sink);
        async move {
            tokio::task::yield_now().await;
            sink.lock().push(f.name.clone());
            Ok::<(), BrewcError>(())
        }
    })
    .await;

    assert!(report.is_success());
    assert_eq!(report.visited, tree.len());
    let visited = log.lock().clone();
    visited
}

fn position(order: &[String]) -> HashMap<&str, usize> {
    order
        .iter()
        .enumerate()
        .map(|(i, n)| (n.as_str(), i))
        .collect()
}

#[tokio::test]
async fn test_child_first_scenario_a() {
    let tree = scenario_a();
    let order = record(&tree, 10, Order::ChildFirst).await;
    let pos = position(&order);

    assert_eq!(order.len(), 4);
    assert!(pos["libC"] < pos["libB"]);
    assert!(pos["libA"] < pos["app"]);
    assert!(pos["libB"] < pos["app"]);
    assert_eq!(order.last().map(String::as_str), Some("app"));
}

#[tokio::test]
async fn test_parent_first_scenario_a() {
    let tree = scenario_a();
    let order = record(&tree, 10, Order::ParentFirst).await;
    let pos = position(&order);

    assert_eq!(order.first().map(String::as_str), Some("app"));
    assert!(pos["libB"] < pos["libC"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_child_first_runs_after_every_descendant() {
    let tree = wide_tree();
    for budget in [0, 1, 3, 50] {
        let order = record(&tree, budget, Order::ChildFirst).await;
        let pos = position(&order);

        for (id, _) in tree.nodes_with_depth() {
            let name = tree.formula(id).name.clone();
            for desc in descendants(&tree, id) {
                assert!(pos[desc.as_str()] < pos[name.as_str()], "{desc} before {name}");
            }
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parent_first_runs_before_every_descendant() {
    let tree = wide_tree();
    for budget in [0, 1, 3, 50] {
        let order = record(&tree, budget, Order::ParentFirst).await;
        let pos = position(&order);

        for (id, _) in tree.nodes_with_depth() {
            let name = tree.formula(id).name.clone();
            for desc in descendants(&tree, id) {
                assert!(pos[name.as_str()] < pos[desc.as_str()], "{name} before {desc}");
            }
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_each_node_visited_exactly_once() {
    let tree = wide_tree();
    let order = record(&tree, 10, Order::ChildFirst).await;

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for name in &order {
        *counts.entry(name.as_str()).or_default() += 1;
    }
    assert_eq!(counts.len(), tree.len());
    assert!(counts.values().all(|c| *c == 1));
}

#[tokio::test]
async fn test_failures_do_not_stop_the_walk() {
    let tree = scenario_a();
    let ran: Log = Arc::default();
    let sink = Arc::clone(&ran);

    let report = child_first(&tree, 10, move |f| {
        let sink = Arc::clone(&sink);
        async move {
            sink.lock().push(f.name.clone());
            if f.name == "libC" {
                return Err(BrewcError::Configuration("boom".into()));
            }
            Ok(())
        }
    })
    .await;

    assert_eq!(report.visited, 4);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].name, "libC");
    assert!(!report.is_success());
    assert!(ran.lock().contains(&"app".to_string()));
}

/// Run a slow action everywhere and return the peak number of concurrent actions
async fn peak_concurrency(tree: &FormulaTree, budget: usize) -> usize {
    let current = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let (c, p) = (Arc::clone(&current), Arc::clone(&peak));

    let report = parent_first(tree, budget, move |_| {
        let (c, p) = (Arc::clone(&c), Arc::clone(&p));
        async move {
            let now = c.fetch_add(1, Ordering::SeqCst) + 1;
            p.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(15)).await;
            c.fetch_sub(1, Ordering::SeqCst);
            Ok::<(), BrewcError>(())
        }
    })
    .await;

    assert_eq!(report.visited, tree.len());
    peak.load(Ordering::SeqCst)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_exhausted_budget_degrades_to_sequential() {
    let tree = wide_tree();
    assert_eq!(peak_concurrency(&tree, 0).await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_wide_fan_out_runs_concurrently() {
    let tree = FormulaTree::new(formula("root", &[]), true);
    for i in 0..12 {
        tree.insert(tree.root(), formula(&format!("leaf{i}"), &[]))
            .unwrap();
    }

    let peak = peak_concurrency(&tree, 10).await;
    assert!(peak >= 2, "peak {peak}");
    assert!(peak <= FAN_OUT_WIDTH, "peak {peak}");
}

#[tokio::test]
async fn test_single_node_tree() {
    let tree = FormulaTree::new(formula("solo", &[]), true);
    let order = record(&tree, 10, Order::ChildFirst).await;
    assert_eq!(order, vec!["solo"]);
}
