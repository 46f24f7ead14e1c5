use crate::parsing::{LabelDict, LabelId, ParsedTree};
use indextree::NodeId;

use rustc_hash::FxHashMap;

pub trait Indexer {
    fn index_tree(tree: &ParsedTree, label_dict: &LabelDict) -> Self
    where
        Self: Sized;
}

#[derive(Debug)]
pub struct ConstantsIndex {
    pub tree_size: usize,
}

/// Inverted list of nodes, key is the label id in the label dict and the
/// postings list contains ascending postorder ids of nodes with that label.
pub type InvListLblPost = FxHashMap<LabelId, Vec<usize>>;

/// Per-tree index for tree edit distance verification. Built in a single
/// depth-first pass assigning 0-based postorder ids in children-before-parent
/// order.
#[derive(Debug)]
pub struct TedIndex {
    /// Label id of each node, indexed by postorder id.
    pub postorder_labels: Vec<LabelId>,
    /// Postorder id of the leftmost leaf descendant of each node.
    pub lld: Vec<usize>,
    /// Keyroots in ascending order. A node is a keyroot if it is the root
    /// or has a left sibling; the last entry is always the root.
    pub kr: Vec<usize>,
    pub inverted_list: InvListLblPost,
    pub c: ConstantsIndex,
}

impl Indexer for TedIndex {
    fn index_tree(tree: &ParsedTree, _label_dict: &LabelDict) -> Self {
        let tree_size = tree.count();
        let mut index = TedIndex {
            postorder_labels: Vec::with_capacity(tree_size),
            lld: vec![0; tree_size],
            kr: Vec::new(),
            inverted_list: InvListLblPost::default(),
            c: ConstantsIndex { tree_size },
        };
        if tree_size == 0 {
            return index;
        }

        let Some(root) = tree.iter().next() else {
            panic!("Unable to get root but tree is not empty!");
        };
        let root_id = tree.get_node_id(root).unwrap();

        let mut cursor = 0;
        traverse(root_id, tree, &mut cursor, &mut index);
        // the root is a keyroot but has no left sibling, so the recursion
        // never pushes it
        index.kr.push(tree_size - 1);
        index
    }
}

impl TedIndex {
    /// True iff `ancestor` is a proper ancestor of `node`. In postorder a
    /// node's descendants occupy the interval `[lld[v], v)`.
    pub fn is_ancestor(&self, ancestor: usize, node: usize) -> bool {
        self.lld[ancestor] <= node && node < ancestor
    }
}

/// Returns `(postorder id, lld)` of the subtree rooted at `nid`.
fn traverse(
    nid: NodeId,
    tree: &ParsedTree,
    cursor: &mut usize,
    index: &mut TedIndex,
) -> (usize, usize) {
    let mut first_child_lld = None;
    for (i, cnid) in nid.children(tree).enumerate() {
        let (child_postorder, child_lld) = traverse(cnid, tree, cursor, index);
        if i == 0 {
            first_child_lld = Some(child_lld);
        } else {
            // every non-first child starts a new keyroot
            index.kr.push(child_postorder);
        }
    }

    let postorder = *cursor;
    *cursor += 1;

    let lld = first_child_lld.unwrap_or(postorder);
    index.lld[postorder] = lld;

    let label = *tree.get(nid).unwrap().get();
    index.postorder_labels.push(label);
    index.inverted_list.entry(label).or_default().push(postorder);

    (postorder, lld)
}
