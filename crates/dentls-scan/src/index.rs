//! Ordered index over entry names and its dual-position walk.
//!
//! The index is a red-black tree ordered by ascending byte-wise name
//! comparison. It is never searched. It exists to produce a replay order:
//! [`EntryIndex::walk`] acts on a node only when it is a leaf or once both
//! of its subtrees are done, which yields a postorder sweep of the balanced
//! tree. Deleting in that order, from a tree built with the ascending
//! comparator, triggers far less rebalancing in btree-backed directories
//! than deleting in raw `getdents` order or from a descending tree.
//!
//! Insertion splits 4-nodes top-down on the way to the insertion point, the
//! way the C library's `tsearch` does. The replay order depends on the
//! exact tree shape, so for the same insertion sequence the walk visits
//! names in the same order as a `twalk` over a `tsearch` tree.

use std::cmp::Ordering;

use dentls_core::{DentError, EntryRef};

use crate::arena::BufferChain;

const NIL: u32 = u32::MAX;

/// The two moments of a walk at which the visitor is called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    /// The node has no children.
    Leaf,
    /// Both subtrees of an internal node have been fully visited.
    End,
}

/// Outcome of an insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inserted {
    /// A node was created for the name.
    New,
    /// An equal name was already indexed; nothing changed.
    Existing,
}

/// Receives each name of a walk at a [`Visit`] moment.
///
/// The first error stops the walk and is handed back to its caller.
pub trait Visitor {
    type Error;

    fn visit(&mut self, name: &[u8], visit: Visit) -> Result<(), Self::Error>;
}

impl<F, E> Visitor for F
where
    F: FnMut(&[u8], Visit) -> Result<(), E>,
{
    type Error = E;

    fn visit(&mut self, name: &[u8], visit: Visit) -> Result<(), E> {
        self(name, visit)
    }
}

#[derive(Debug, Clone, Copy)]
struct Node {
    entry: EntryRef,
    left: u32,
    right: u32,
    red: bool,
}

/// A slot that holds a node index: the root slot or one side of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Link {
    Root,
    Left(u32),
    Right(u32),
}

/// Balanced binary search tree of [`EntryRef`] handles.
#[derive(Debug)]
pub struct EntryIndex {
    nodes: Vec<Node>,
    root: u32,
}

impl Default for EntryIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl EntryIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            root: NIL,
        }
    }

    /// Number of indexed names.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if nothing has been indexed.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Insert a name, comparing against existing names in `chain`.
    ///
    /// Any node on the way down whose children are both red is split
    /// before descending past it, so the new red leaf needs at most one
    /// rotation.
    pub fn insert(&mut self, entry: EntryRef, chain: &BufferChain) -> Result<Inserted, DentError> {
        let name = chain.name(entry);
        if self.root != NIL {
            let root = self.root;
            self.node_mut(root).red = false;
        }

        let mut link = Link::Root;
        let mut parent: Option<Link> = None;
        let mut grandparent: Option<Link> = None;
        let mut dir = Ordering::Equal;
        let mut parent_dir = Ordering::Equal;
        let mut grandparent_dir = Ordering::Equal;
        let mut next = link;

        while self.get(next) != NIL {
            let idx = self.get(link);
            dir = name.cmp(chain.name(self.node(idx).entry));
            if dir == Ordering::Equal {
                return Ok(Inserted::Existing);
            }

            // A rotation here leaves `parent` and `grandparent` stale; they
            // are shifted out before anything reads them again.
            self.split(link, parent, grandparent, parent_dir, grandparent_dir, false);

            next = if dir == Ordering::Less {
                Link::Left(idx)
            } else {
                Link::Right(idx)
            };
            if self.get(next) == NIL {
                break;
            }

            grandparent = parent;
            parent = Some(link);
            link = next;
            grandparent_dir = parent_dir;
            parent_dir = dir;
        }

        let node_size = std::mem::size_of::<Node>();
        let idx = u32::try_from(self.nodes.len())
            .ok()
            .filter(|&i| i != NIL)
            .ok_or(DentError::Allocation { size: node_size })?;
        self.nodes
            .try_reserve(1)
            .map_err(|_| DentError::Allocation { size: node_size })?;
        self.nodes.push(Node {
            entry,
            left: NIL,
            right: NIL,
            red: true,
        });
        self.set(next, idx);

        if next != link {
            // Two red edges in a row may now exist below `link`.
            self.split(next, Some(link), parent, dir, parent_dir, true);
        }
        Ok(Inserted::New)
    }

    /// Walk the tree, calling `visitor` at leaf and end positions only.
    ///
    /// Every indexed name is visited exactly once. Each subtree is fully
    /// resolved before its parent.
    pub fn walk<V: Visitor>(&self, chain: &BufferChain, visitor: &mut V) -> Result<(), V::Error> {
        if self.root == NIL {
            return Ok(());
        }

        // (node, children already scheduled)
        let mut stack: Vec<(u32, bool)> = Vec::with_capacity(64);
        stack.push((self.root, false));

        while let Some((idx, expanded)) = stack.pop() {
            let node = self.node(idx);
            let name = chain.name(node.entry);

            if node.left == NIL && node.right == NIL {
                visitor.visit(name, Visit::Leaf)?;
            } else if expanded {
                visitor.visit(name, Visit::End)?;
            } else {
                stack.push((idx, true));
                if node.right != NIL {
                    stack.push((node.right, false));
                }
                if node.left != NIL {
                    stack.push((node.left, false));
                }
            }
        }

        Ok(())
    }

    /// Number of nodes on the longest root-to-leaf path.
    pub fn height(&self) -> usize {
        let mut max = 0;
        let mut stack = Vec::new();
        if self.root != NIL {
            stack.push((self.root, 1usize));
        }
        while let Some((idx, depth)) = stack.pop() {
            max = max.max(depth);
            let node = self.node(idx);
            for child in [node.left, node.right] {
                if child != NIL {
                    stack.push((child, depth + 1));
                }
            }
        }
        max
    }

    /// Drop every node at once. Names are owned by the chain and untouched.
    pub fn clear(&mut self) {
        self.nodes = Vec::new();
        self.root = NIL;
    }

    fn node(&self, idx: u32) -> &Node {
        &self.nodes[idx as usize]
    }

    fn node_mut(&mut self, idx: u32) -> &mut Node {
        &mut self.nodes[idx as usize]
    }

    fn is_red(&self, idx: u32) -> bool {
        idx != NIL && self.node(idx).red
    }

    fn get(&self, link: Link) -> u32 {
        match link {
            Link::Root => self.root,
            Link::Left(idx) => self.node(idx).left,
            Link::Right(idx) => self.node(idx).right,
        }
    }

    fn set(&mut self, link: Link, value: u32) {
        match link {
            Link::Root => self.root = value,
            Link::Left(idx) => self.node_mut(idx).left = value,
            Link::Right(idx) => self.node_mut(idx).right = value,
        }
    }

    /// Split the node in `link` if `force` is set or both its children are
    /// red, then rotate if that left two red nodes in a row.
    ///
    /// `parent_dir` is the side `link` hangs from its parent, and
    /// `grandparent_dir` the side the parent hangs from the grandparent.
    fn split(
        &mut self,
        link: Link,
        parent: Option<Link>,
        grandparent: Option<Link>,
        parent_dir: Ordering,
        grandparent_dir: Ordering,
        force: bool,
    ) {
        let node = self.get(link);
        let right = self.node(node).right;
        let left = self.node(node).left;

        if !force && !(self.is_red(left) && self.is_red(right)) {
            return;
        }

        self.node_mut(node).red = true;
        if right != NIL {
            self.node_mut(right).red = false;
        }
        if left != NIL {
            self.node_mut(left).red = false;
        }

        let Some(parent) = parent else {
            return;
        };
        let p = self.get(parent);
        if !self.is_red(p) {
            return;
        }
        // A red parent always has a grandparent here.
        let Some(grandparent) = grandparent else {
            return;
        };
        let gp = self.get(grandparent);

        if (parent_dir == Ordering::Greater) != (grandparent_dir == Ordering::Greater) {
            // Zig-zag: the node moves up over both parent and grandparent.
            self.node_mut(p).red = true;
            self.node_mut(gp).red = true;
            self.node_mut(node).red = false;
            if parent_dir == Ordering::Less {
                self.node_mut(p).left = right;
                self.node_mut(node).right = p;
                self.node_mut(gp).right = left;
                self.node_mut(node).left = gp;
            } else {
                self.node_mut(p).right = left;
                self.node_mut(node).left = p;
                self.node_mut(gp).left = right;
                self.node_mut(node).right = gp;
            }
            self.set(grandparent, node);
        } else {
            // Zig-zig: the parent moves up over the grandparent.
            self.set(grandparent, p);
            self.node_mut(p).red = false;
            self.node_mut(gp).red = true;
            if parent_dir == Ordering::Less {
                let p_right = self.node(p).right;
                self.node_mut(gp).left = p_right;
                self.node_mut(p).right = gp;
            } else {
                let p_left = self.node(p).left;
                self.node_mut(gp).right = p_left;
                self.node_mut(p).left = gp;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Lay names out back to back in one block, like a batch would.
    fn chain_with(names: &[&str]) -> (BufferChain, Vec<EntryRef>) {
        let mut chain = BufferChain::new();
        let total: usize = names.iter().map(|n| n.len()).sum();
        let id = chain.allocate(total.max(1)).unwrap();
        let mut refs = Vec::new();
        let mut offset = 0;
        for name in names {
            chain.block_mut(id)[offset..offset + name.len()].copy_from_slice(name.as_bytes());
            refs.push(EntryRef::new(id, offset as u32, name.len() as u16));
            offset += name.len();
        }
        (chain, refs)
    }

    fn build(names: &[&str]) -> (BufferChain, EntryIndex) {
        let (chain, refs) = chain_with(names);
        let mut index = EntryIndex::new();
        for entry in refs {
            index.insert(entry, &chain).unwrap();
        }
        (chain, index)
    }

    fn collect(index: &EntryIndex, chain: &BufferChain) -> Vec<(String, Visit)> {
        let mut out = Vec::new();
        index
            .walk(chain, &mut |name: &[u8], visit: Visit| {
                out.push((String::from_utf8_lossy(name).into_owned(), visit));
                Ok::<(), ()>(())
            })
            .unwrap();
        out
    }

    fn postorder(index: &EntryIndex, idx: u32, chain: &BufferChain, out: &mut Vec<String>) {
        if idx == NIL {
            return;
        }
        let node = index.node(idx);
        postorder(index, node.left, chain, out);
        postorder(index, node.right, chain, out);
        out.push(String::from_utf8_lossy(chain.name(node.entry)).into_owned());
    }

    /// Black height of a subtree, asserting the red-black rules on the way.
    fn black_height(index: &EntryIndex, idx: u32, chain: &BufferChain) -> usize {
        if idx == NIL {
            return 1;
        }
        let node = index.node(idx);
        if node.red {
            assert!(!index.is_red(node.left) && !index.is_red(node.right));
        }
        if node.left != NIL {
            assert!(chain.name(index.node(node.left).entry) < chain.name(node.entry));
        }
        if node.right != NIL {
            assert!(chain.name(index.node(node.right).entry) > chain.name(node.entry));
        }
        let left = black_height(index, node.left, chain);
        let right = black_height(index, node.right, chain);
        assert_eq!(left, right);
        left + usize::from(!node.red)
    }

    /// Names from a fixed linear congruential sequence, in insertion order.
    fn lcg_names(count: usize, seed: u32) -> Vec<String> {
        let mut x = seed;
        (0..count)
            .map(|_| {
                x = x.wrapping_mul(1_103_515_245).wrapping_add(12_345) & 0x7fff_ffff;
                format!("m{x:08x}")
            })
            .collect()
    }

    /// Walk order as insertion positions.
    fn walk_positions(names: &[String]) -> Vec<usize> {
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let (chain, index) = build(&refs);
        let position: HashMap<&str, usize> =
            refs.iter().enumerate().map(|(i, n)| (*n, i)).collect();
        collect(&index, &chain)
            .iter()
            .map(|(name, _)| position[name.as_str()])
            .collect()
    }

    /// `twalk` leaf/endorder positions of a `tsearch` tree built from
    /// `lcg_names(256, 2024)` with `strcmp`.
    const TSEARCH_ORDER_256: [usize; 256] = [
        8, 61, 67, 234, 223, 255, 99, 235, 153, 4, 189, 106, 229, 195, 58, 35,
        208, 196, 238, 86, 0, 242, 200, 243, 190, 131, 191, 225, 29, 149, 63, 2,
        82, 171, 253, 54, 186, 65, 129, 95, 198, 122, 68, 105, 15, 48, 164, 214,
        127, 170, 179, 40, 185, 154, 83, 44, 77, 128, 219, 230, 138, 111, 220, 41,
        88, 56, 107, 20, 104, 213, 182, 240, 89, 74, 85, 28, 9, 49, 244, 188,
        71, 232, 180, 115, 211, 118, 148, 52, 201, 110, 175, 114, 80, 113, 209, 215,
        187, 173, 102, 248, 109, 176, 231, 236, 142, 222, 241, 79, 47, 76, 16, 172,
        75, 60, 159, 157, 120, 140, 11, 32, 156, 137, 147, 117, 18, 7, 251, 166,
        132, 212, 155, 184, 163, 42, 135, 245, 24, 36, 151, 13, 3, 1, 133, 237,
        199, 31, 226, 108, 66, 221, 97, 116, 194, 254, 123, 160, 126, 192, 57, 178,
        103, 73, 203, 162, 33, 14, 84, 177, 152, 169, 55, 168, 227, 143, 69, 174,
        193, 112, 121, 43, 141, 165, 252, 239, 167, 46, 119, 228, 150, 93, 6, 161,
        101, 37, 181, 92, 136, 21, 100, 12, 30, 130, 62, 25, 217, 250, 124, 139,
        38, 27, 218, 26, 144, 224, 64, 206, 205, 96, 91, 145, 53, 50, 216, 202,
        94, 23, 72, 10, 70, 210, 249, 246, 197, 78, 233, 90, 207, 146, 45, 98,
        39, 158, 81, 204, 134, 59, 183, 125, 22, 247, 51, 87, 34, 17, 19, 5,
    ];

    #[test]
    fn test_walk_order_matches_tsearch_small() {
        assert_eq!(walk_positions(&lcg_names(7, 2024)), vec![4, 0, 1, 6, 5, 3, 2]);
    }

    #[test]
    fn test_walk_order_matches_tsearch() {
        let names = lcg_names(256, 2024);
        assert_eq!(walk_positions(&names), TSEARCH_ORDER_256);
    }

    #[test]
    fn test_random_insertion_keeps_red_black_rules() {
        let names = lcg_names(3000, 9);
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let (chain, index) = build(&refs);

        black_height(&index, index.root, &chain);
        assert_eq!(index.len(), 3000);
        assert!(index.height() <= 2 * 12);
    }

    #[test]
    fn test_lone_root_is_leaf() {
        let (chain, index) = build(&["solo"]);
        assert_eq!(collect(&index, &chain), vec![("solo".to_string(), Visit::Leaf)]);
    }

    #[test]
    fn test_three_nodes_leaf_then_end() {
        let (chain, index) = build(&["b", "a", "c"]);
        assert_eq!(
            collect(&index, &chain),
            vec![
                ("a".to_string(), Visit::Leaf),
                ("c".to_string(), Visit::Leaf),
                ("b".to_string(), Visit::End),
            ]
        );
    }

    #[test]
    fn test_single_child_node_is_end() {
        let (chain, index) = build(&["m", "z"]);
        assert_eq!(
            collect(&index, &chain),
            vec![("z".to_string(), Visit::Leaf), ("m".to_string(), Visit::End)]
        );
    }

    #[test]
    fn test_walk_is_postorder_and_complete() {
        let names: Vec<String> = (0..500).map(|i| format!("f{:05}", (i * 7919) % 500)).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let (chain, index) = build(&refs);

        let visited = collect(&index, &chain);
        assert_eq!(visited.len(), 500);

        let mut expected = Vec::new();
        postorder(&index, index.root, &chain, &mut expected);
        let order: Vec<String> = visited.iter().map(|(n, _)| n.clone()).collect();
        assert_eq!(order, expected);

        let mut sorted = order.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), 500);
    }

    #[test]
    fn test_leaf_only_for_childless_nodes() {
        let names: Vec<String> = (0..64).map(|i| format!("n{i:03}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let (chain, index) = build(&refs);

        let leaves = index
            .nodes
            .iter()
            .filter(|n| n.left == NIL && n.right == NIL)
            .count();
        let visited = collect(&index, &chain);
        let leaf_visits = visited.iter().filter(|(_, v)| *v == Visit::Leaf).count();
        assert_eq!(leaf_visits, leaves);
        assert_eq!(visited.len() - leaf_visits, index.len() - leaves);
    }

    #[test]
    fn test_sorted_insertion_stays_balanced() {
        let names: Vec<String> = (0..4096).map(|i| format!("{i:06}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let (chain, index) = build(&refs);

        assert!(!index.is_red(index.root));
        black_height(&index, index.root, &chain);
        // Red-black bound: height <= 2 * log2(n + 1).
        assert!(index.height() <= 2 * 13);
    }

    #[test]
    fn test_duplicate_names_are_tolerated() {
        let (chain, refs) = chain_with(&["dup", "dup", "other"]);
        let mut index = EntryIndex::new();

        assert_eq!(index.insert(refs[0], &chain).unwrap(), Inserted::New);
        assert_eq!(index.insert(refs[1], &chain).unwrap(), Inserted::Existing);
        assert_eq!(index.insert(refs[2], &chain).unwrap(), Inserted::New);
        assert_eq!(index.len(), 2);
        assert_eq!(collect(&index, &chain).len(), 2);
    }

    #[test]
    fn test_bytewise_ascending_order() {
        // Byte order, not locale order: uppercase sorts before lowercase.
        let (chain, index) = build(&["b", "B", "a", "A"]);
        let mut inorder = Vec::new();
        let mut stack = Vec::new();
        let mut cur = index.root;
        while cur != NIL || !stack.is_empty() {
            while cur != NIL {
                stack.push(cur);
                cur = index.node(cur).left;
            }
            let idx = stack.pop().unwrap();
            inorder.push(chain.name(index.node(idx).entry).to_vec());
            cur = index.node(idx).right;
        }
        assert_eq!(inorder, vec![b"A".to_vec(), b"B".to_vec(), b"a".to_vec(), b"b".to_vec()]);
    }

    #[test]
    fn test_visitor_error_stops_walk() {
        let (chain, index) = build(&["a", "b", "c", "d", "e"]);
        let mut seen = 0;
        let result = index.walk(&chain, &mut |_: &[u8], _: Visit| {
            seen += 1;
            if seen == 2 { Err("stop") } else { Ok(()) }
        });
        assert_eq!(result, Err("stop"));
        assert_eq!(seen, 2);
    }

    #[test]
    fn test_clear_and_empty_walk() {
        let (chain, mut index) = build(&["x", "y"]);
        index.clear();
        assert!(index.is_empty());
        assert_eq!(index.height(), 0);
        assert!(collect(&index, &chain).is_empty());
    }
}
