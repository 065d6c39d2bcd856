//! Hierarchical Navigable Small World graph over dense integer ids.
//!
//! Nodes reference each other by index into the caller-owned vector
//! array rather than by pointer. This sidesteps cyclic ownership,
//! keeps the node storage contiguous, and makes the graph cheap to
//! drop wholesale when the index is rebuilt.
//!
//! Construction inserts nodes in id order: a greedy descent from the
//! entry point narrows the search region, a bounded beam search finds
//! candidate neighbors per layer, and a diversified selection picks
//! the edges. Peer neighbor lists are not pruned when a link pushes
//! them past the target degree; every mutation of the service rebuilds
//! the graph from scratch, which bounds the drift.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

use super::types::euclidean_distance;

/// Seed for the level-generation PRNG. Fixed so that rebuilding the
/// same inventory yields the same graph.
const LEVEL_SEED: u64 = 0x9e37_79b9;

/// Construction and search parameters.
#[derive(Debug, Clone)]
pub struct HnswParams {
    /// Target neighbor count per node at layers >= 1.
    pub max_neighbors: usize,
    /// Target neighbor count per node at layer 0.
    pub max_neighbors_layer0: usize,
    /// Level-generation factor in (0, 1); higher produces taller graphs.
    pub level_factor: f64,
    /// Candidate list width during insertion.
    pub ef_construction: usize,
}

impl Default for HnswParams {
    fn default() -> Self {
        let max_neighbors = 16;
        Self {
            max_neighbors,
            max_neighbors_layer0: max_neighbors * 2,
            level_factor: 1.0 / (max_neighbors as f64).ln(),
            ef_construction: max_neighbors * 2,
        }
    }
}

/// Heap entry ordered by distance, then id for determinism.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Candidate {
    distance: f32,
    id: u32,
}

impl Eq for Candidate {}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug)]
struct HnswNode {
    max_layer: usize,
    /// One duplicate-free neighbor list per layer in `0..=max_layer`.
    neighbors: Vec<Vec<u32>>,
}

impl HnswNode {
    fn new(max_layer: usize) -> Self {
        Self {
            max_layer,
            neighbors: vec![Vec::new(); max_layer + 1],
        }
    }
}

/// Layered proximity graph supporting logarithmic-expected k-NN search.
///
/// The graph owns its node storage; vectors stay with the caller and
/// are passed into `build` and `search` by slice.
#[derive(Debug)]
pub struct HnswGraph {
    nodes: Vec<HnswNode>,
    entry_point: u32,
    top_layer: usize,
    params: HnswParams,
}

impl HnswGraph {
    /// Builds a graph over `vectors`, inserting nodes in id order.
    ///
    /// Node 0 seeds the graph at its drawn layer; the entry point
    /// moves whenever a later insert draws a higher layer.
    ///
    /// # Panics
    /// Panics if `vectors` is empty. The store never builds a graph
    /// for an empty index.
    pub fn build(vectors: &[Vec<f32>], params: HnswParams) -> Self {
        assert!(!vectors.is_empty(), "cannot build a graph over no vectors");

        let mut rng = StdRng::seed_from_u64(LEVEL_SEED);
        let first_layer = draw_level(&mut rng, params.level_factor);
        let mut graph = Self {
            nodes: Vec::with_capacity(vectors.len()),
            entry_point: 0,
            top_layer: first_layer,
            params,
        };
        graph.nodes.push(HnswNode::new(first_layer));

        for id in 1..vectors.len() {
            let level = draw_level(&mut rng, graph.params.level_factor);
            graph.insert(vectors, id as u32, level);
        }

        graph
    }

    /// Returns the k nearest vector ids in ascending-distance order.
    ///
    /// `ef` is the beam width at layer 0 and is clamped to at least k.
    pub fn search(&self, vectors: &[Vec<f32>], query: &[f32], k: usize, ef: usize) -> Vec<u32> {
        let mut current = self.entry_point;
        for layer in (1..=self.top_layer).rev() {
            current = self.greedy_search(vectors, query, current, layer);
        }

        let results = self.search_layer(vectors, query, current, 0, ef.max(k));
        results.into_iter().take(k).map(|c| c.id).collect()
    }

    /// Number of nodes in the graph.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn insert(&mut self, vectors: &[Vec<f32>], id: u32, level: usize) {
        self.nodes.push(HnswNode::new(level));
        let query = &vectors[id as usize];

        // Descent phase: walk to a local minimum at every layer above
        // the new node's top.
        let mut current = self.entry_point;
        for layer in (level + 1..=self.top_layer).rev() {
            current = self.greedy_search(vectors, query, current, layer);
        }

        // Insertion phase: beam search per layer, diversified edge
        // selection, bidirectional links.
        for layer in (0..=level.min(self.top_layer)).rev() {
            let candidates =
                self.search_layer(vectors, query, current, layer, self.params.ef_construction);
            if let Some(closest) = candidates.first() {
                current = closest.id;
            }

            let limit = if layer == 0 {
                self.params.max_neighbors_layer0
            } else {
                self.params.max_neighbors
            };
            let selected = self.select_neighbors(vectors, id, &candidates, limit);

            for peer in selected {
                self.link(id, peer, layer);
                self.link(peer, id, layer);
            }
        }

        if level > self.top_layer {
            self.top_layer = level;
            self.entry_point = id;
        }
    }

    /// Greedy walk at one layer: move to any strictly closer neighbor
    /// until no improvement remains.
    fn greedy_search(&self, vectors: &[Vec<f32>], query: &[f32], start: u32, layer: usize) -> u32 {
        let mut current = start;
        let mut best = euclidean_distance(query, &vectors[current as usize]);

        loop {
            let node = &self.nodes[current as usize];
            if layer > node.max_layer {
                return current;
            }

            let mut improved = false;
            for &neighbor in &node.neighbors[layer] {
                let distance = euclidean_distance(query, &vectors[neighbor as usize]);
                if distance < best {
                    best = distance;
                    current = neighbor;
                    improved = true;
                }
            }
            if !improved {
                return current;
            }
        }
    }

    /// Bounded beam search at one layer.
    ///
    /// Maintains a candidate min-heap and a result max-heap of capacity
    /// `ef`. Stops when the closest remaining candidate is farther than
    /// the worst retained result and the result set is full. Returns
    /// the retained candidates in ascending-distance order.
    fn search_layer(
        &self,
        vectors: &[Vec<f32>],
        query: &[f32],
        entry: u32,
        layer: usize,
        ef: usize,
    ) -> Vec<Candidate> {
        let mut visited = vec![false; self.nodes.len()];
        let mut candidates: BinaryHeap<Reverse<Candidate>> = BinaryHeap::new();
        let mut results: BinaryHeap<Candidate> = BinaryHeap::new();

        let entry_distance = euclidean_distance(query, &vectors[entry as usize]);
        visited[entry as usize] = true;
        candidates.push(Reverse(Candidate {
            distance: entry_distance,
            id: entry,
        }));
        results.push(Candidate {
            distance: entry_distance,
            id: entry,
        });

        while let Some(Reverse(current)) = candidates.pop() {
            let worst = results.peek().map(|c| c.distance).unwrap_or(f32::INFINITY);
            if results.len() >= ef && current.distance > worst {
                break;
            }

            let node = &self.nodes[current.id as usize];
            if layer > node.max_layer {
                continue;
            }
            for &neighbor in &node.neighbors[layer] {
                if visited[neighbor as usize] {
                    continue;
                }
                visited[neighbor as usize] = true;

                let distance = euclidean_distance(query, &vectors[neighbor as usize]);
                let worst = results.peek().map(|c| c.distance).unwrap_or(f32::INFINITY);
                if results.len() < ef || distance < worst {
                    candidates.push(Reverse(Candidate {
                        distance,
                        id: neighbor,
                    }));
                    results.push(Candidate {
                        distance,
                        id: neighbor,
                    });
                    if results.len() > ef {
                        results.pop();
                    }
                }
            }
        }

        results.into_sorted_vec()
    }

    /// Diversified neighbor selection.
    ///
    /// The closest candidate is always taken. Each subsequent candidate
    /// is rejected when it sits closer to an already-selected neighbor
    /// than 0.7x its own distance to the new node; remaining slots are
    /// backfilled in closeness order ignoring the diversity rule. The
    /// new node never selects itself.
    fn select_neighbors(
        &self,
        vectors: &[Vec<f32>],
        new_id: u32,
        candidates: &[Candidate],
        limit: usize,
    ) -> Vec<u32> {
        let mut selected: Vec<u32> = Vec::with_capacity(limit);

        for candidate in candidates {
            if selected.len() >= limit {
                break;
            }
            if candidate.id == new_id {
                continue;
            }
            let diverse = selected.iter().all(|&chosen| {
                let between =
                    euclidean_distance(&vectors[candidate.id as usize], &vectors[chosen as usize]);
                between >= 0.7 * candidate.distance
            });
            if diverse {
                selected.push(candidate.id);
            }
        }

        if selected.len() < limit {
            for candidate in candidates {
                if selected.len() >= limit {
                    break;
                }
                if candidate.id == new_id || selected.contains(&candidate.id) {
                    continue;
                }
                selected.push(candidate.id);
            }
        }

        selected
    }

    /// Adds `to` to `from`'s layer list. Duplicate edges and self-edges
    /// are silently ignored, as are layers above the node's top.
    fn link(&mut self, from: u32, to: u32, layer: usize) {
        if from == to {
            return;
        }
        let node = &mut self.nodes[from as usize];
        if layer > node.max_layer {
            return;
        }
        let list = &mut node.neighbors[layer];
        if !list.contains(&to) {
            list.push(to);
        }
    }
}

/// Geometric level draw: count successes of `U < level_factor`.
fn draw_level(rng: &mut StdRng, level_factor: f64) -> usize {
    let mut level = 0;
    while rng.gen::<f64>() < level_factor {
        level += 1;
    }
    level
}
