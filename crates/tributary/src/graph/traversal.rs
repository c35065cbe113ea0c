//! Bounded breadth-first queries over a [`LineageGraph`].
//!
//! Every query keeps a visited set, so cyclic graphs terminate. Boundary
//! edges are never part of the graph's adjacency and so are never followed.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use crate::domain::{AssetId, Direction, RelationshipKind};

use super::LineageGraph;

/// Read-only traversal over one snapshot, optionally restricted to some
/// relationship kinds.
#[derive(Debug, Clone, Copy)]
pub struct Traversal<'g> {
    graph: &'g LineageGraph,
    kinds: Option<&'g [RelationshipKind]>,
}

impl<'g> Traversal<'g> {
    /// Traverse every relationship kind.
    #[must_use]
    pub fn new(graph: &'g LineageGraph) -> Self {
        Self { graph, kinds: None }
    }

    /// Only follow relationships of the given kinds.
    #[must_use]
    pub fn with_kinds(mut self, kinds: &'g [RelationshipKind]) -> Self {
        self.kinds = Some(kinds);
        self
    }

    /// Assets reachable from `id` within `max_hops`, excluding `id` itself.
    #[must_use]
    pub fn reachable_from(
        &self,
        id: &AssetId,
        direction: Direction,
        max_hops: usize,
    ) -> BTreeSet<AssetId> {
        self.hop_distances(id, direction, max_hops)
            .into_keys()
            .collect()
    }

    /// Hop distance of every asset reachable from `id` within `max_hops`.
    ///
    /// `id` itself is not included, even when a cycle leads back to it.
    #[must_use]
    pub fn hop_distances(
        &self,
        id: &AssetId,
        direction: Direction,
        max_hops: usize,
    ) -> BTreeMap<AssetId, usize> {
        let mut distances = self.bfs(id, direction, max_hops);
        distances.remove(id);
        distances
            .into_iter()
            .map(|(id, distance)| (id.clone(), distance))
            .collect()
    }

    /// Shortest path from `from` to `to`, following edges in `direction`.
    ///
    /// Among equally short paths the one whose weakest edge has the highest
    /// confidence wins; remaining ties go to the lexicographically smallest
    /// id sequence read from the smaller endpoint. The query is therefore
    /// orientation independent: `shortest_path(b, a, d.reversed(), ..)` is
    /// exactly `shortest_path(a, b, d, ..)` reversed.
    ///
    /// Returns an empty list when `to` is not reachable within `max_hops`,
    /// and `[from]` when `from == to`.
    #[must_use]
    pub fn shortest_path(
        &self,
        from: &AssetId,
        to: &AssetId,
        direction: Direction,
        max_hops: usize,
    ) -> Vec<AssetId> {
        if !self.graph.contains(from) || !self.graph.contains(to) {
            return Vec::new();
        }
        if from == to {
            return vec![from.clone()];
        }
        if from > to {
            let mut path = self.oriented_path(to, from, direction.reversed(), max_hops);
            path.reverse();
            return path;
        }
        self.oriented_path(from, to, direction, max_hops)
    }

    /// Best path walked from `from`; callers guarantee `from < to`.
    fn oriented_path(
        &self,
        from: &AssetId,
        to: &AssetId,
        direction: Direction,
        max_hops: usize,
    ) -> Vec<AssetId> {
        let forward = self.bfs(from, direction, max_hops);
        let Some(&length) = forward.get(to) else {
            return Vec::new();
        };
        let backward = self.bfs(to, direction.reversed(), length);

        // Nodes on some shortest path, grouped by distance from `from`.
        let mut layers: Vec<Vec<&AssetId>> = vec![Vec::new(); length + 1];
        for (id, &d) in &forward {
            if backward.get(*id).is_some_and(|&back| d + back == length) {
                layers[d].push(*id);
            }
        }

        // best[v]: highest achievable minimum confidence from v to `to`.
        let mut best: HashMap<&AssetId, f64> = HashMap::new();
        best.insert(to, f64::INFINITY);
        for layer in layers.iter().rev().skip(1) {
            for &node in layer {
                let value = self
                    .successors(node, direction, &forward, &backward, length)
                    .filter_map(|(next, confidence)| {
                        best.get(next).map(|&rest| confidence.min(rest))
                    })
                    .fold(f64::NEG_INFINITY, f64::max);
                best.insert(node, value);
            }
        }

        let Some(&bottleneck) = best.get(from) else {
            return Vec::new();
        };

        let mut path = vec![from.clone()];
        let mut current = from;
        while current != to {
            let next = self
                .successors(current, direction, &forward, &backward, length)
                .filter(|(next, confidence)| {
                    *confidence >= bottleneck
                        && best.get(*next).is_some_and(|&rest| rest >= bottleneck)
                })
                .map(|(next, _)| next)
                .min();
            let Some(next) = next else {
                // Unreachable: `best` guarantees a continuation exists.
                return Vec::new();
            };
            path.push(next.clone());
            current = next;
        }
        path
    }

    /// Distances (including `start` at 0) of everything within `max_hops`.
    fn bfs(
        &self,
        start: &AssetId,
        direction: Direction,
        max_hops: usize,
    ) -> HashMap<&'g AssetId, usize> {
        let mut distances = HashMap::new();
        let Some(start) = self.graph.get_asset(start) else {
            return distances;
        };
        distances.insert(&start.id, 0);

        let mut queue = VecDeque::from([&start.id]);
        while let Some(current) = queue.pop_front() {
            let distance = distances[current];
            if distance >= max_hops {
                continue;
            }
            for (far, relationship) in self.graph.steps(current, direction) {
                if !self.follows(relationship.kind) {
                    continue;
                }
                if !distances.contains_key(&far.id) {
                    distances.insert(&far.id, distance + 1);
                    queue.push_back(&far.id);
                }
            }
        }
        distances
    }

    /// Successors of `node` that lie one layer closer to the target on some
    /// shortest path, with the best confidence among parallel edges.
    fn successors<'a>(
        &'a self,
        node: &'a AssetId,
        direction: Direction,
        forward: &'a HashMap<&'g AssetId, usize>,
        backward: &'a HashMap<&'g AssetId, usize>,
        length: usize,
    ) -> impl Iterator<Item = (&'g AssetId, f64)> + 'a {
        let next_depth = forward.get(node).map(|depth| depth + 1);
        let mut best: BTreeMap<&'g AssetId, f64> = BTreeMap::new();
        for (far, relationship) in self.graph.steps(node, direction) {
            if !self.follows(relationship.kind) {
                continue;
            }
            let on_path = next_depth.is_some_and(|depth| {
                forward.get(&far.id) == Some(&depth)
                    && backward
                        .get(&far.id)
                        .is_some_and(|&back| depth + back == length)
            });
            if on_path {
                let entry = best.entry(&far.id).or_insert(f64::NEG_INFINITY);
                *entry = entry.max(relationship.confidence);
            }
        }
        best.into_iter()
    }

    fn follows(&self, kind: RelationshipKind) -> bool {
        self.kinds.is_none_or(|kinds| kinds.contains(&kind))
    }
}
