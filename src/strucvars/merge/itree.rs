//! Augmented interval BST with deletion.
//!
//! `bio::data_structures::interval_tree::IntervalTree` has no way to
//! remove an interval once inserted. The partitioner's coalescing step
//! needs exactly that: pull out every interval overlapping a new target,
//! merge their payloads, and reinsert one interval in their place. So this
//! is a small arena-backed augmented BST instead, ordered by interval
//! start and additionally tracking each subtree's maximum end so overlap
//! queries can prune branches.

#[derive(Debug, Clone)]
struct Node<T> {
    start: i64,
    end: i64,
    max_end: i64,
    data: T,
    left: Option<usize>,
    right: Option<usize>,
}

/// Opaque handle to a stored interval, returned by [`IntervalTree::insert`]
/// and [`IntervalTree::query_overlapping`].
pub type Key = usize;

#[derive(Debug, Clone)]
pub struct IntervalTree<T> {
    nodes: Vec<Option<Node<T>>>,
    root: Option<usize>,
    free: Vec<usize>,
}

impl<T> Default for IntervalTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> IntervalTree<T> {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            root: None,
            free: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn insert(&mut self, start: i64, end: i64, data: T) -> Key {
        let key = self.alloc(Node {
            start,
            end,
            max_end: end,
            data,
            left: None,
            right: None,
        });
        self.root = Some(self.insert_at(self.root, key));
        key
    }

    fn alloc(&mut self, node: Node<T>) -> Key {
        if let Some(k) = self.free.pop() {
            self.nodes[k] = Some(node);
            k
        } else {
            self.nodes.push(Some(node));
            self.nodes.len() - 1
        }
    }

    fn insert_at(&mut self, root: Option<Key>, key: Key) -> Key {
        match root {
            None => key,
            Some(r) => {
                let rs = self.nodes[r].as_ref().unwrap().start;
                let ks = self.nodes[key].as_ref().unwrap().start;
                if ks < rs {
                    let left = self.nodes[r].as_ref().unwrap().left;
                    let new_left = self.insert_at(left, key);
                    self.nodes[r].as_mut().unwrap().left = Some(new_left);
                } else {
                    let right = self.nodes[r].as_ref().unwrap().right;
                    let new_right = self.insert_at(right, key);
                    self.nodes[r].as_mut().unwrap().right = Some(new_right);
                }
                self.recompute_max(r);
                r
            }
        }
    }

    fn recompute_max(&mut self, key: Key) {
        let (end, left, right) = {
            let n = self.nodes[key].as_ref().unwrap();
            (n.end, n.left, n.right)
        };
        let mut max_end = end;
        if let Some(l) = left {
            max_end = max_end.max(self.nodes[l].as_ref().unwrap().max_end);
        }
        if let Some(r) = right {
            max_end = max_end.max(self.nodes[r].as_ref().unwrap().max_end);
        }
        self.nodes[key].as_mut().unwrap().max_end = max_end;
    }

    /// Keys of every stored interval overlapping the half-open range
    /// `[qstart, qend)`.
    pub fn query_overlapping(&self, qstart: i64, qend: i64) -> Vec<Key> {
        let mut out = Vec::new();
        self.query_at(self.root, qstart, qend, &mut out);
        out
    }

    fn query_at(&self, root: Option<Key>, qstart: i64, qend: i64, out: &mut Vec<Key>) {
        let Some(r) = root else { return };
        let node = self.nodes[r].as_ref().unwrap();
        if let Some(l) = node.left {
            if self.nodes[l].as_ref().unwrap().max_end > qstart {
                self.query_at(Some(l), qstart, qend, out);
            }
        }
        if node.start < qend && node.end > qstart {
            out.push(r);
        }
        if node.start < qend {
            if let Some(rr) = node.right {
                self.query_at(Some(rr), qstart, qend, out);
            }
        }
    }

    /// Remove the interval stored under `key`, returning its bounds and
    /// payload. Panics if `key` is not currently present.
    pub fn remove(&mut self, key: Key) -> (i64, i64, T) {
        let (new_root, start, end, data) = self.remove_at(self.root, key);
        self.root = new_root;
        (start, end, data)
    }

    #[allow(clippy::type_complexity)]
    fn remove_at(&mut self, root: Option<Key>, key: Key) -> (Option<Key>, i64, i64, T) {
        let r = root.expect("interval key not found in tree");
        if r == key {
            let (left, right) = {
                let n = self.nodes[r].as_ref().unwrap();
                (n.left, n.right)
            };
            let removed = self.nodes[r].take().unwrap();
            self.free.push(r);
            let new_root = match (left, right) {
                (None, None) => None,
                (Some(l), None) => Some(l),
                (None, Some(rr)) => Some(rr),
                (Some(l), Some(rr)) => {
                    let (new_right, min_key) = self.detach_min(rr);
                    {
                        let min_node = self.nodes[min_key].as_mut().unwrap();
                        min_node.left = Some(l);
                        min_node.right = new_right;
                    }
                    self.recompute_max(min_key);
                    Some(min_key)
                }
            };
            (new_root, removed.start, removed.end, removed.data)
        } else {
            let rs = self.nodes[r].as_ref().unwrap().start;
            let ks = self.nodes[key].as_ref().unwrap().start;
            let (start, end, data);
            if ks < rs {
                let left = self.nodes[r].as_ref().unwrap().left;
                let (new_left, s, e, d) = self.remove_at(left, key);
                self.nodes[r].as_mut().unwrap().left = new_left;
                start = s;
                end = e;
                data = d;
            } else {
                let right = self.nodes[r].as_ref().unwrap().right;
                let (new_right, s, e, d) = self.remove_at(right, key);
                self.nodes[r].as_mut().unwrap().right = new_right;
                start = s;
                end = e;
                data = d;
            }
            self.recompute_max(r);
            (Some(r), start, end, data)
        }
    }

    /// Detach the minimum-start node from `root`'s subtree, returning the
    /// new subtree root (without the minimum) and the minimum's own key
    /// (still populated, just unlinked).
    fn detach_min(&mut self, root: Key) -> (Option<Key>, Key) {
        let left = self.nodes[root].as_ref().unwrap().left;
        match left {
            None => {
                let right = self.nodes[root].as_ref().unwrap().right;
                (right, root)
            }
            Some(l) => {
                let (new_left, min_key) = self.detach_min(l);
                self.nodes[root].as_mut().unwrap().left = new_left;
                self.recompute_max(root);
                (Some(root), min_key)
            }
        }
    }

    /// Remove and return every remaining interval, in arbitrary order.
    /// Leaves the tree empty.
    pub fn drain(&mut self) -> Vec<(i64, i64, T)> {
        let mut out = Vec::new();
        for slot in self.nodes.iter_mut() {
            if let Some(node) = slot.take() {
                out.push((node.start, node.end, node.data));
            }
        }
        self.root = None;
        self.free.clear();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn query_finds_overlapping_only() {
        let mut t: IntervalTree<&str> = IntervalTree::new();
        t.insert(0, 10, "a");
        t.insert(20, 30, "b");
        t.insert(5, 15, "c");

        let mut hits: Vec<&str> = t
            .query_overlapping(8, 12)
            .into_iter()
            .map(|k| t.nodes[k].as_ref().unwrap().data)
            .collect();
        hits.sort_unstable();
        assert_eq!(hits, vec!["a", "c"]);
    }

    #[test]
    fn remove_then_query_no_longer_finds_it() {
        let mut t: IntervalTree<&str> = IntervalTree::new();
        let k = t.insert(0, 10, "a");
        t.insert(20, 30, "b");

        let (s, e, data) = t.remove(k);
        assert_eq!((s, e, data), (0, 10, "a"));
        assert!(t.query_overlapping(0, 10).is_empty());
        assert_eq!(t.query_overlapping(20, 30).len(), 1);
    }

    #[test]
    fn remove_node_with_two_children_keeps_others_queryable() {
        let mut t: IntervalTree<i32> = IntervalTree::new();
        let k_mid = t.insert(10, 20, 1);
        t.insert(0, 5, 2);
        t.insert(30, 40, 3);
        t.insert(25, 35, 4);

        t.remove(k_mid);

        assert_eq!(t.query_overlapping(0, 5).len(), 1);
        assert_eq!(t.query_overlapping(30, 40).len(), 2);
    }

    #[test]
    fn drain_returns_everything_and_empties_tree() {
        let mut t: IntervalTree<i32> = IntervalTree::new();
        t.insert(0, 10, 1);
        t.insert(5, 15, 2);

        let mut drained = t.drain();
        drained.sort_by_key(|&(s, _, _)| s);
        assert_eq!(drained, vec![(0, 10, 1), (5, 15, 2)]);
        assert!(t.is_empty());
        assert!(t.query_overlapping(0, 100).is_empty());
    }

    #[test]
    fn insert_remove_many_stays_consistent() {
        let mut t: IntervalTree<i64> = IntervalTree::new();
        let mut keys = Vec::new();
        for i in 0..200i64 {
            keys.push(t.insert(i, i + 5, i));
        }
        for &k in keys.iter().step_by(2) {
            t.remove(k);
        }
        assert_eq!(t.drain().len(), 100);
    }
}
