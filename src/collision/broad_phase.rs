//! Broad phase: candidate pairs from the dynamic tree.

use super::aabb::AABB;
use super::dynamic_tree::DynamicTree;
use super::ray::RayCastInput;
use crate::math::Vec2;
use tracing::trace;

/// Tracks proxies in a [`DynamicTree`] and reports new overlapping pairs.
///
/// Only proxies that were created or re-inserted since the last
/// [`update_pairs`](BroadPhase::update_pairs) are queried, so a resting
/// world produces no pair work.
#[derive(Debug, Clone)]
pub struct BroadPhase<T: Copy> {
    tree: DynamicTree<T>,
    move_buffer: Vec<usize>,
    pair_buffer: Vec<(usize, usize)>,
}

impl<T: Copy> Default for BroadPhase<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy> BroadPhase<T> {
    pub fn new() -> Self {
        Self {
            tree: DynamicTree::new(),
            move_buffer: Vec::new(),
            pair_buffer: Vec::new(),
        }
    }

    /// Creates a proxy and schedules it for pair finding.
    pub fn create_proxy(&mut self, aabb: AABB, user_data: T) -> usize {
        let proxy_id = self.tree.create_proxy(aabb, user_data);
        self.buffer_move(proxy_id);
        proxy_id
    }

    pub fn destroy_proxy(&mut self, proxy_id: usize) {
        self.unbuffer_move(proxy_id);
        self.tree.destroy_proxy(proxy_id);
    }

    /// Moves a proxy; it is queried for pairs only if its fat AABB changed.
    pub fn move_proxy(&mut self, proxy_id: usize, aabb: AABB, displacement: Vec2) {
        if self.tree.move_proxy(proxy_id, aabb, displacement) {
            self.buffer_move(proxy_id);
        }
    }

    /// Forces a pair re-check for a proxy that did not move.
    pub fn touch_proxy(&mut self, proxy_id: usize) {
        self.buffer_move(proxy_id);
    }

    fn buffer_move(&mut self, proxy_id: usize) {
        self.move_buffer.push(proxy_id);
    }

    fn unbuffer_move(&mut self, proxy_id: usize) {
        self.move_buffer.retain(|&id| id != proxy_id);
    }

    pub fn fat_aabb(&self, proxy_id: usize) -> AABB {
        self.tree.fat_aabb(proxy_id)
    }

    pub fn user_data(&self, proxy_id: usize) -> Option<T> {
        self.tree.user_data(proxy_id)
    }

    /// Whether the fat AABBs of two proxies overlap.
    pub fn test_overlap(&self, proxy_a: usize, proxy_b: usize) -> bool {
        self.tree
            .fat_aabb(proxy_a)
            .overlaps(&self.tree.fat_aabb(proxy_b))
    }

    pub fn proxy_count(&self) -> usize {
        self.tree.proxy_count()
    }

    pub fn tree_height(&self) -> i32 {
        self.tree.height()
    }

    pub fn tree(&self) -> &DynamicTree<T> {
        &self.tree
    }

    /// Reports every new overlapping pair exactly once, in ascending proxy
    /// order, then clears the move buffer.
    pub fn update_pairs<F>(&mut self, mut callback: F)
    where
        F: FnMut(T, T),
    {
        self.pair_buffer.clear();

        for &query_id in &self.move_buffer {
            let fat_aabb = self.tree.fat_aabb(query_id);
            let tree = &self.tree;
            let pairs = &mut self.pair_buffer;

            tree.query(&fat_aabb, |proxy_id| {
                if proxy_id == query_id {
                    return true;
                }
                // Both moved: the pair is reported from the lower id only.
                if tree.was_moved(proxy_id) && proxy_id > query_id {
                    return true;
                }
                pairs.push((proxy_id.min(query_id), proxy_id.max(query_id)));
                true
            });
        }

        self.pair_buffer.sort_unstable();
        self.pair_buffer.dedup();

        trace!(
            moved = self.move_buffer.len(),
            pairs = self.pair_buffer.len(),
            "broad phase update"
        );

        for &(a, b) in &self.pair_buffer {
            if let (Some(user_a), Some(user_b)) = (self.tree.user_data(a), self.tree.user_data(b)) {
                callback(user_a, user_b);
            }
        }

        for &proxy_id in &self.move_buffer {
            self.tree.clear_moved(proxy_id);
        }
        self.move_buffer.clear();
    }

    pub fn query<F>(&self, aabb: &AABB, callback: F)
    where
        F: FnMut(usize) -> bool,
    {
        self.tree.query(aabb, callback);
    }

    pub fn ray_cast<F>(&self, input: &RayCastInput, callback: F)
    where
        F: FnMut(&RayCastInput, usize) -> f64,
    {
        self.tree.ray_cast(input, callback);
    }
}
