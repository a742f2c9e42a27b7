//! Dynamic AABB tree.
//!
//! A binary tree of fat AABBs with incremental insert, remove and move.
//! Leaves hold user data; internal nodes hold the union of their children.
//! The tree is kept balanced with AVL-style rotations and new leaves are
//! placed by the surface area heuristic (perimeter in 2D).

use super::aabb::AABB;
use super::ray::RayCastInput;
use crate::math::Vec2;
use crate::settings::{AABB_EXTENSION, AABB_MULTIPLIER};

/// Sentinel for "no node".
pub const NULL_NODE: usize = usize::MAX;

#[derive(Debug, Clone)]
struct TreeNode<T> {
    /// Fat AABB.
    aabb: AABB,
    user_data: Option<T>,
    /// `NULL_NODE` for the root.
    parent: usize,
    child1: usize,
    child2: usize,
    /// Leaf = 0, free node = -1.
    height: i32,
    /// Set when the leaf was created or re-inserted.
    moved: bool,
}

impl<T> TreeNode<T> {
    fn free() -> Self {
        Self {
            aabb: AABB::default(),
            user_data: None,
            parent: NULL_NODE,
            child1: NULL_NODE,
            child2: NULL_NODE,
            height: -1,
            moved: false,
        }
    }

    fn is_leaf(&self) -> bool {
        self.child1 == NULL_NODE
    }
}

/// Bounding volume hierarchy over proxies carrying user data `T`.
///
/// Proxy ids are node indices and stay stable until the proxy is destroyed.
#[derive(Debug, Clone)]
pub struct DynamicTree<T: Copy> {
    root: usize,
    nodes: Vec<TreeNode<T>>,
    free_list: Vec<usize>,
    proxy_count: usize,
}

impl<T: Copy> Default for DynamicTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy> DynamicTree<T> {
    pub fn new() -> Self {
        Self {
            root: NULL_NODE,
            nodes: Vec::with_capacity(16),
            free_list: Vec::new(),
            proxy_count: 0,
        }
    }

    fn allocate_node(&mut self) -> usize {
        match self.free_list.pop() {
            Some(id) => {
                self.nodes[id] = TreeNode {
                    height: 0,
                    ..TreeNode::free()
                };
                id
            }
            None => {
                self.nodes.push(TreeNode {
                    height: 0,
                    ..TreeNode::free()
                });
                self.nodes.len() - 1
            }
        }
    }

    fn free_node(&mut self, id: usize) {
        debug_assert!(id < self.nodes.len());
        self.nodes[id] = TreeNode::free();
        self.free_list.push(id);
    }

    /// Creates a proxy for `aabb`, stored fattened by [`AABB_EXTENSION`].
    pub fn create_proxy(&mut self, aabb: AABB, user_data: T) -> usize {
        let id = self.allocate_node();

        let node = &mut self.nodes[id];
        node.aabb = aabb.fattened(AABB_EXTENSION);
        node.user_data = Some(user_data);
        node.height = 0;
        node.moved = true;

        self.insert_leaf(id);
        self.proxy_count += 1;
        id
    }

    pub fn destroy_proxy(&mut self, proxy_id: usize) {
        debug_assert!(self.is_proxy(proxy_id));
        self.remove_leaf(proxy_id);
        self.free_node(proxy_id);
        self.proxy_count -= 1;
    }

    /// Updates a proxy after its shape moved by `displacement`.
    ///
    /// Nothing happens while the fat AABB still contains `aabb` and is not
    /// oversized. Otherwise the leaf is re-inserted with a new fat AABB that
    /// is also stretched along the displacement. Returns whether the leaf
    /// was re-inserted.
    pub fn move_proxy(&mut self, proxy_id: usize, aabb: AABB, displacement: Vec2) -> bool {
        debug_assert!(self.is_proxy(proxy_id));

        let mut fat_aabb = aabb.fattened(AABB_EXTENSION);

        // Predict motion.
        let d = displacement * AABB_MULTIPLIER;
        if d.x < 0.0 {
            fat_aabb.min.x += d.x;
        } else {
            fat_aabb.max.x += d.x;
        }
        if d.y < 0.0 {
            fat_aabb.min.y += d.y;
        } else {
            fat_aabb.max.y += d.y;
        }

        let tree_aabb = self.nodes[proxy_id].aabb;
        if tree_aabb.contains(&aabb) {
            // Still inside. A huge tree AABB, e.g. after a fast body came
            // to rest, is shrunk instead of kept.
            let huge_aabb = fat_aabb.fattened(4.0 * AABB_EXTENSION);
            if huge_aabb.contains(&tree_aabb) {
                return false;
            }
        }

        self.remove_leaf(proxy_id);
        self.nodes[proxy_id].aabb = fat_aabb;
        self.insert_leaf(proxy_id);
        self.nodes[proxy_id].moved = true;
        true
    }

    fn is_proxy(&self, proxy_id: usize) -> bool {
        self.nodes
            .get(proxy_id)
            .is_some_and(|n| n.height >= 0 && n.is_leaf())
    }

    pub fn user_data(&self, proxy_id: usize) -> Option<T> {
        self.nodes.get(proxy_id).and_then(|n| n.user_data)
    }

    pub fn fat_aabb(&self, proxy_id: usize) -> AABB {
        debug_assert!(proxy_id < self.nodes.len());
        self.nodes[proxy_id].aabb
    }

    pub fn was_moved(&self, proxy_id: usize) -> bool {
        self.nodes.get(proxy_id).is_some_and(|n| n.moved)
    }

    pub fn clear_moved(&mut self, proxy_id: usize) {
        if let Some(node) = self.nodes.get_mut(proxy_id) {
            node.moved = false;
        }
    }

    pub fn proxy_count(&self) -> usize {
        self.proxy_count
    }

    /// Visits every proxy whose fat AABB overlaps `aabb`. The callback
    /// returns `false` to stop the query.
    pub fn query<F>(&self, aabb: &AABB, mut callback: F)
    where
        F: FnMut(usize) -> bool,
    {
        let mut stack = Vec::with_capacity(64);
        stack.push(self.root);

        while let Some(node_id) = stack.pop() {
            if node_id == NULL_NODE {
                continue;
            }

            let node = &self.nodes[node_id];
            if !node.aabb.overlaps(aabb) {
                continue;
            }

            if node.is_leaf() {
                if !callback(node_id) {
                    return;
                }
            } else {
                stack.push(node.child1);
                stack.push(node.child2);
            }
        }
    }

    /// Casts a ray against the proxies' fat AABBs.
    ///
    /// The callback receives the current (possibly clipped) input and a
    /// proxy id, and returns the new max fraction: `0` terminates, a
    /// positive value clips the ray, a negative value leaves it unchanged.
    pub fn ray_cast<F>(&self, input: &RayCastInput, mut callback: F)
    where
        F: FnMut(&RayCastInput, usize) -> f64,
    {
        let p1 = input.p1;
        let p2 = input.p2;
        let r = (p2 - p1).normalize();
        debug_assert!(r.magnitude_squared() > 0.0);

        // v is perpendicular to the segment.
        let v = Vec2::scalar_cross(1.0, r);
        let abs_v = v.abs();

        let mut max_fraction = input.max_fraction;
        let segment_aabb = |max_fraction: f64| {
            let t = p1 + (p2 - p1) * max_fraction;
            AABB::new(p1.min(t), p1.max(t))
        };
        let mut bounds = segment_aabb(max_fraction);

        let mut stack = Vec::with_capacity(64);
        stack.push(self.root);

        while let Some(node_id) = stack.pop() {
            if node_id == NULL_NODE {
                continue;
            }

            let node = &self.nodes[node_id];
            if !node.aabb.overlaps(&bounds) {
                continue;
            }

            // Separating axis for segment: |dot(v, p1 - c)| > dot(|v|, h)
            let c = node.aabb.center();
            let h = node.aabb.extents();
            let separation = v.dot(p1 - c).abs() - abs_v.dot(h);
            if separation > 0.0 {
                continue;
            }

            if node.is_leaf() {
                let sub_input = RayCastInput {
                    p1,
                    p2,
                    max_fraction,
                };

                let value = callback(&sub_input, node_id);

                if value == 0.0 {
                    // The client has terminated the ray cast.
                    return;
                }

                if value > 0.0 {
                    max_fraction = value;
                    bounds = segment_aabb(max_fraction);
                }
            } else {
                stack.push(node.child1);
                stack.push(node.child2);
            }
        }
    }

    fn insert_leaf(&mut self, leaf: usize) {
        if self.root == NULL_NODE {
            self.root = leaf;
            self.nodes[leaf].parent = NULL_NODE;
            return;
        }

        // Find the best sibling for this node.
        let leaf_aabb = self.nodes[leaf].aabb;
        let mut index = self.root;
        while !self.nodes[index].is_leaf() {
            let child1 = self.nodes[index].child1;
            let child2 = self.nodes[index].child2;

            let area = self.nodes[index].aabb.perimeter();

            let combined_area = AABB::combine(&self.nodes[index].aabb, &leaf_aabb).perimeter();

            // Cost of creating a new parent for this node and the new leaf.
            let cost = 2.0 * combined_area;

            // Minimum cost of pushing the leaf further down the tree.
            let inheritance_cost = 2.0 * (combined_area - area);

            let descend_cost = |child: usize| {
                let node = &self.nodes[child];
                let combined = AABB::combine(&leaf_aabb, &node.aabb).perimeter();
                if node.is_leaf() {
                    combined + inheritance_cost
                } else {
                    combined - node.aabb.perimeter() + inheritance_cost
                }
            };
            let cost1 = descend_cost(child1);
            let cost2 = descend_cost(child2);

            if cost < cost1 && cost < cost2 {
                break;
            }

            index = if cost1 < cost2 { child1 } else { child2 };
        }

        let sibling = index;

        // Create a new parent.
        let old_parent = self.nodes[sibling].parent;
        let new_parent = self.allocate_node();
        {
            let sibling_aabb = self.nodes[sibling].aabb;
            let sibling_height = self.nodes[sibling].height;
            let node = &mut self.nodes[new_parent];
            node.parent = old_parent;
            node.user_data = None;
            node.aabb = AABB::combine(&leaf_aabb, &sibling_aabb);
            node.height = sibling_height + 1;
            node.child1 = sibling;
            node.child2 = leaf;
        }

        if old_parent != NULL_NODE {
            // The sibling was not the root.
            if self.nodes[old_parent].child1 == sibling {
                self.nodes[old_parent].child1 = new_parent;
            } else {
                self.nodes[old_parent].child2 = new_parent;
            }
        } else {
            // The sibling was the root.
            self.root = new_parent;
        }
        self.nodes[sibling].parent = new_parent;
        self.nodes[leaf].parent = new_parent;

        // Walk back up the tree fixing heights and AABBs.
        self.refit_from(self.nodes[leaf].parent);
    }

    fn remove_leaf(&mut self, leaf: usize) {
        if leaf == self.root {
            self.root = NULL_NODE;
            return;
        }

        let parent = self.nodes[leaf].parent;
        let grand_parent = self.nodes[parent].parent;
        let sibling = if self.nodes[parent].child1 == leaf {
            self.nodes[parent].child2
        } else {
            self.nodes[parent].child1
        };

        if grand_parent != NULL_NODE {
            // Destroy parent and connect sibling to grand_parent.
            if self.nodes[grand_parent].child1 == parent {
                self.nodes[grand_parent].child1 = sibling;
            } else {
                self.nodes[grand_parent].child2 = sibling;
            }
            self.nodes[sibling].parent = grand_parent;
            self.free_node(parent);

            self.refit_from(grand_parent);
        } else {
            self.root = sibling;
            self.nodes[sibling].parent = NULL_NODE;
            self.free_node(parent);
        }
    }

    /// Rebalances and refits every ancestor starting at `index`.
    fn refit_from(&mut self, mut index: usize) {
        while index != NULL_NODE {
            index = self.balance(index);

            let child1 = self.nodes[index].child1;
            let child2 = self.nodes[index].child2;
            debug_assert!(child1 != NULL_NODE && child2 != NULL_NODE);

            let height = 1 + self.nodes[child1].height.max(self.nodes[child2].height);
            let aabb = AABB::combine(&self.nodes[child1].aabb, &self.nodes[child2].aabb);
            self.nodes[index].height = height;
            self.nodes[index].aabb = aabb;

            index = self.nodes[index].parent;
        }
    }

    /// Performs a left or right rotation if node `i_a` is imbalanced.
    /// Returns the new root of the subtree.
    fn balance(&mut self, i_a: usize) -> usize {
        debug_assert!(i_a != NULL_NODE);

        if self.nodes[i_a].is_leaf() || self.nodes[i_a].height < 2 {
            return i_a;
        }

        let i_b = self.nodes[i_a].child1;
        let i_c = self.nodes[i_a].child2;

        let balance = self.nodes[i_c].height - self.nodes[i_b].height;

        // Rotate C up
        if balance > 1 {
            let i_f = self.nodes[i_c].child1;
            let i_g = self.nodes[i_c].child2;

            // Swap A and C
            self.nodes[i_c].child1 = i_a;
            self.nodes[i_c].parent = self.nodes[i_a].parent;
            self.nodes[i_a].parent = i_c;

            // A's old parent should point to C
            self.replace_child(self.nodes[i_c].parent, i_a, i_c);

            // Rotate
            let (keep, moved) = if self.nodes[i_f].height > self.nodes[i_g].height {
                (i_f, i_g)
            } else {
                (i_g, i_f)
            };
            self.nodes[i_c].child2 = keep;
            self.nodes[i_a].child2 = moved;
            self.nodes[moved].parent = i_a;
            self.nodes[i_a].aabb = AABB::combine(&self.nodes[i_b].aabb, &self.nodes[moved].aabb);
            self.nodes[i_c].aabb = AABB::combine(&self.nodes[i_a].aabb, &self.nodes[keep].aabb);

            self.nodes[i_a].height = 1 + self.nodes[i_b].height.max(self.nodes[moved].height);
            self.nodes[i_c].height = 1 + self.nodes[i_a].height.max(self.nodes[keep].height);

            return i_c;
        }

        // Rotate B up
        if balance < -1 {
            let i_d = self.nodes[i_b].child1;
            let i_e = self.nodes[i_b].child2;

            // Swap A and B
            self.nodes[i_b].child1 = i_a;
            self.nodes[i_b].parent = self.nodes[i_a].parent;
            self.nodes[i_a].parent = i_b;

            // A's old parent should point to B
            self.replace_child(self.nodes[i_b].parent, i_a, i_b);

            // Rotate
            let (keep, moved) = if self.nodes[i_d].height > self.nodes[i_e].height {
                (i_d, i_e)
            } else {
                (i_e, i_d)
            };
            self.nodes[i_b].child2 = keep;
            self.nodes[i_a].child1 = moved;
            self.nodes[moved].parent = i_a;
            self.nodes[i_a].aabb = AABB::combine(&self.nodes[i_c].aabb, &self.nodes[moved].aabb);
            self.nodes[i_b].aabb = AABB::combine(&self.nodes[i_a].aabb, &self.nodes[keep].aabb);

            self.nodes[i_a].height = 1 + self.nodes[i_c].height.max(self.nodes[moved].height);
            self.nodes[i_b].height = 1 + self.nodes[i_a].height.max(self.nodes[keep].height);

            return i_b;
        }

        i_a
    }

    fn replace_child(&mut self, parent: usize, old: usize, new: usize) {
        if parent == NULL_NODE {
            self.root = new;
        } else if self.nodes[parent].child1 == old {
            self.nodes[parent].child1 = new;
        } else {
            debug_assert!(self.nodes[parent].child2 == old);
            self.nodes[parent].child2 = new;
        }
    }

    /// Height of the tree, zero when empty or a single leaf.
    pub fn height(&self) -> i32 {
        if self.root == NULL_NODE {
            0
        } else {
            self.nodes[self.root].height
        }
    }

    /// Largest height difference between the two children of any node.
    pub fn max_balance(&self) -> i32 {
        self.nodes
            .iter()
            .filter(|n| n.height > 1)
            .map(|n| (self.nodes[n.child2].height - self.nodes[n.child1].height).abs())
            .max()
            .unwrap_or(0)
    }

    /// Sum of node perimeters over the root perimeter.
    pub fn area_ratio(&self) -> f64 {
        if self.root == NULL_NODE {
            return 0.0;
        }
        let root_area = self.nodes[self.root].aabb.perimeter();
        let total_area: f64 = self
            .nodes
            .iter()
            .filter(|n| n.height >= 0)
            .map(|n| n.aabb.perimeter())
            .sum();
        total_area / root_area
    }

    /// Checks parent links, heights, bounds and the free list.
    pub fn validate(&self) -> bool {
        if self.root != NULL_NODE && self.nodes[self.root].parent != NULL_NODE {
            return false;
        }
        if !self.validate_node(self.root) {
            return false;
        }
        let used = self.nodes.iter().filter(|n| n.height >= 0).count();
        used + self.free_list.len() == self.nodes.len()
            && self.height() == self.compute_height(self.root)
    }

    fn validate_node(&self, index: usize) -> bool {
        if index == NULL_NODE {
            return true;
        }
        let node = &self.nodes[index];
        if node.is_leaf() {
            return node.child2 == NULL_NODE && node.height == 0 && node.user_data.is_some();
        }

        let (c1, c2) = (node.child1, node.child2);
        if c1 >= self.nodes.len() || c2 >= self.nodes.len() {
            return false;
        }
        let (n1, n2) = (&self.nodes[c1], &self.nodes[c2]);
        n1.parent == index
            && n2.parent == index
            && node.height == 1 + n1.height.max(n2.height)
            && node.aabb == AABB::combine(&n1.aabb, &n2.aabb)
            && self.validate_node(c1)
            && self.validate_node(c2)
    }

    fn compute_height(&self, index: usize) -> i32 {
        if index == NULL_NODE {
            return 0;
        }
        let node = &self.nodes[index];
        if node.is_leaf() {
            0
        } else {
            1 + self.compute_height(node.child1).max(self.compute_height(node.child2))
        }
    }
}
