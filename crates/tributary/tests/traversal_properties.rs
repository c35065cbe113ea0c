//! Property tests for traversal queries over generated lineage graphs.

mod common;

use std::collections::BTreeSet;

use proptest::prelude::*;
use tributary::domain::{AssetId, Direction};
use tributary::graph::Traversal;
use tributary::LineageGraph;

const MAX_HOPS: usize = 16;

fn name(i: usize) -> String {
    format!("n{i:02}")
}

/// Random edge lists over up to 8 assets, self loops and duplicates included.
fn edges() -> impl Strategy<Value = (usize, Vec<(usize, usize, f64)>)> {
    (2_usize..8).prop_flat_map(|n| {
        (
            Just(n),
            prop::collection::vec((0..n, 0..n, 0.05_f64..=1.0), 1..20),
        )
    })
}

fn build(n: usize, edges: &[(usize, usize, f64)]) -> LineageGraph {
    let names: Vec<String> = (0..n).map(name).collect();
    let names: Vec<&str> = names.iter().map(String::as_str).collect();
    let edges: Vec<(String, String, f64)> = edges
        .iter()
        .map(|&(s, t, c)| (name(s), name(t), c))
        .collect();
    let edges: Vec<(&str, &str, f64)> = edges
        .iter()
        .map(|(s, t, c)| (s.as_str(), t.as_str(), *c))
        .collect();

    let engine = common::engine(common::catalog(&names, &edges));
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(engine.build_lineage(&AssetId::new(name(0)), n, n))
        .unwrap()
}

fn is_walk(graph: &LineageGraph, path: &[AssetId], direction: Direction) -> bool {
    path.windows(2).all(|pair| {
        graph
            .neighbors(&pair[0], direction)
            .iter()
            .any(|rel| match direction {
                Direction::Outgoing => rel.source == pair[0] && rel.target == pair[1],
                Direction::Incoming => rel.target == pair[0] && rel.source == pair[1],
                Direction::Both => {
                    (rel.source == pair[0] && rel.target == pair[1])
                        || (rel.target == pair[0] && rel.source == pair[1])
                }
            })
    })
}

proptest! {
    #[test]
    fn shortest_path_matches_hop_distance((n, edges) in edges()) {
        let graph = build(n, &edges);
        let traversal = Traversal::new(&graph);
        let ids: Vec<AssetId> = graph.assets().map(|a| a.id.clone()).collect();

        for direction in [Direction::Outgoing, Direction::Incoming, Direction::Both] {
            for from in &ids {
                let distances = traversal.hop_distances(from, direction, MAX_HOPS);
                for to in &ids {
                    let path = traversal.shortest_path(from, to, direction, MAX_HOPS);
                    if from == to {
                        prop_assert_eq!(path, vec![from.clone()]);
                        continue;
                    }
                    match distances.get(to) {
                        Some(&hops) => {
                            prop_assert_eq!(path.len(), hops + 1);
                            prop_assert_eq!(path.first(), Some(from));
                            prop_assert_eq!(path.last(), Some(to));
                            prop_assert!(is_walk(&graph, &path, direction));
                            let unique: BTreeSet<_> = path.iter().collect();
                            prop_assert_eq!(unique.len(), path.len());
                        }
                        None => prop_assert!(path.is_empty()),
                    }
                }
            }
        }
    }

    #[test]
    fn paths_are_identical_read_from_either_end((n, edges) in edges()) {
        let graph = build(n, &edges);
        let traversal = Traversal::new(&graph);
        let ids: Vec<AssetId> = graph.assets().map(|a| a.id.clone()).collect();

        for from in &ids {
            for to in &ids {
                for direction in [Direction::Outgoing, Direction::Incoming, Direction::Both] {
                    let there = traversal.shortest_path(from, to, direction, MAX_HOPS);
                    let mut back =
                        traversal.shortest_path(to, from, direction.reversed(), MAX_HOPS);
                    back.reverse();
                    prop_assert_eq!(&there, &back, "{:?} {} -> {}", direction, from, to);
                }
            }
        }
    }

    #[test]
    fn reachability_respects_direction((n, edges) in edges()) {
        let graph = build(n, &edges);
        let traversal = Traversal::new(&graph);
        let ids: Vec<AssetId> = graph.assets().map(|a| a.id.clone()).collect();

        for from in &ids {
            let downstream = traversal.reachable_from(from, Direction::Outgoing, MAX_HOPS);
            for to in &downstream {
                let upstream = traversal.reachable_from(to, Direction::Incoming, MAX_HOPS);
                prop_assert!(upstream.contains(from) || to == from);
            }
            let both = traversal.reachable_from(from, Direction::Both, MAX_HOPS);
            prop_assert!(downstream.is_subset(&both));
        }
    }

    #[test]
    fn generated_builds_stay_within_bounds((n, edges) in edges()) {
        let graph = build(n, &edges);

        prop_assert!(graph.node_count() <= n);
        prop_assert!(graph.depth_reached() <= n);
        prop_assert!(graph.contains(graph.seed()));
        for rel in graph.relationships() {
            prop_assert!(graph.contains(&rel.source) && graph.contains(&rel.target));
        }
    }
}
