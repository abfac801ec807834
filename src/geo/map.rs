use std::collections::{BTreeSet, HashMap};

use petgraph::graphmap::UnGraphMap;
use petgraph::visit::Bfs;

use super::{Adjacency, Territory};
use crate::ids::TerritoryId;

/// A snapshot of a tenant's territories and the undirected borders between
/// them, loaded once per phase by the resolvers that need reachability.
#[derive(Debug, Clone, Default)]
pub struct WorldMap {
    territories: HashMap<TerritoryId, Territory>,
    edges: Vec<Adjacency>,
    neighbors: HashMap<TerritoryId, BTreeSet<TerritoryId>>,
}

impl WorldMap {
    pub fn new(territories: Vec<Territory>, edges: Vec<Adjacency>) -> Self {
        let mut neighbors: HashMap<TerritoryId, BTreeSet<TerritoryId>> = HashMap::new();
        for edge in &edges {
            neighbors
                .entry(edge.territory_a.clone())
                .or_default()
                .insert(edge.territory_b.clone());
            neighbors
                .entry(edge.territory_b.clone())
                .or_default()
                .insert(edge.territory_a.clone());
        }

        WorldMap {
            territories: territories
                .into_iter()
                .map(|t| (t.territory_id.clone(), t))
                .collect(),
            edges,
            neighbors,
        }
    }

    pub fn territory(&self, id: &TerritoryId) -> Option<&Territory> {
        self.territories.get(id)
    }

    pub fn territories(&self) -> impl Iterator<Item = &Territory> {
        self.territories.values()
    }

    /// Neighbors of a territory in canonical (lexicographic) order.
    pub fn neighbors(&self, id: &TerritoryId) -> impl Iterator<Item = &TerritoryId> {
        self.neighbors.get(id).into_iter().flatten()
    }

    pub fn are_adjacent(&self, a: &TerritoryId, b: &TerritoryId) -> bool {
        self.neighbors
            .get(a)
            .map(|set| set.contains(b))
            .unwrap_or(false)
    }

    /// Build a petgraph view over every territory, ignoring terrain.
    pub fn to_graph(&self) -> UnGraphMap<&str, ()> {
        let mut graph = UnGraphMap::new();
        for id in self.territories.keys() {
            graph.add_node(id.as_str());
        }
        for edge in &self.edges {
            graph.add_edge(edge.territory_a.as_str(), edge.territory_b.as_str(), ());
        }
        graph
    }

    /// Build a petgraph view restricted to territories the predicate keeps.
    /// Edges survive only when both endpoints survive.
    pub fn filtered_graph(&self, keep: impl Fn(&Territory) -> bool) -> UnGraphMap<&str, ()> {
        let mut graph = UnGraphMap::new();
        for territory in self.territories.values() {
            if keep(territory) {
                graph.add_node(territory.territory_id.as_str());
            }
        }
        for edge in &self.edges {
            let a = edge.territory_a.as_str();
            let b = edge.territory_b.as_str();
            if graph.contains_node(a) && graph.contains_node(b) {
                graph.add_edge(a, b, ());
            }
        }
        graph
    }

    /// Breadth-first distances from `start` over the full adjacency graph,
    /// regardless of terrain. Distance is counted in edges.
    pub fn distances_from(&self, start: &TerritoryId) -> HashMap<TerritoryId, u32> {
        let mut distances = HashMap::new();
        if !self.territories.contains_key(start) {
            return distances;
        }
        distances.insert(start.clone(), 0);
        let mut frontier = vec![start.clone()];
        while !frontier.is_empty() {
            let mut next = Vec::new();
            for id in frontier {
                let here = distances[&id];
                for neighbor in self.neighbors(&id) {
                    if !distances.contains_key(neighbor) {
                        distances.insert(neighbor.clone(), here + 1);
                        next.push(neighbor.clone());
                    }
                }
            }
            frontier = next;
        }
        distances
    }

    /// The set of territory ids reachable from `start` when traversal is
    /// restricted to territories the predicate keeps. `start` must itself be
    /// kept or the result is empty.
    pub fn reachable_from(
        &self,
        start: &TerritoryId,
        keep: impl Fn(&Territory) -> bool,
    ) -> BTreeSet<TerritoryId> {
        let graph = self.filtered_graph(keep);
        let mut reached = BTreeSet::new();
        if !graph.contains_node(start.as_str()) {
            return reached;
        }
        let mut bfs = Bfs::new(&graph, start.as_str());
        while let Some(node) = bfs.next(&graph) {
            reached.insert(TerritoryId::from(node));
        }
        reached
    }
}
