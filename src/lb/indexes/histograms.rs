use crate::parsing::ParsedTree;
use indextree::NodeId;
use rayon::prelude::*;
use rustc_hash::FxHashMap;

/// Sparse integer multiset. Keys absent from a tree are implicitly zero and
/// never stored.
pub type Histogram = FxHashMap<u32, u32>;

/// Per-tree histograms paired with the tree size for constant-time size
/// difference filtering.
pub type HistogramCollection = Vec<(usize, Histogram)>;

/// The three histogram collections of a tree collection plus the maximum
/// key seen per kind (the key universe, used to size inverted indexes).
#[derive(Debug, Default)]
pub struct CollectionHistograms {
    pub label: HistogramCollection,
    pub degree: HistogramCollection,
    pub leaf_dist: HistogramCollection,
    pub max_label_key: u32,
    pub max_degree_key: u32,
    pub max_leaf_dist_key: u32,
}

/// Converts every tree into its label, degree and leaf distance histograms.
pub fn create_collection_histograms(tree_collection: &[ParsedTree]) -> CollectionHistograms {
    let per_tree: Vec<_> = tree_collection
        .par_iter()
        .map(|tree| (tree.count(), create_tree_histograms(tree)))
        .collect();

    let mut hists = CollectionHistograms {
        label: Vec::with_capacity(tree_collection.len()),
        degree: Vec::with_capacity(tree_collection.len()),
        leaf_dist: Vec::with_capacity(tree_collection.len()),
        ..Default::default()
    };

    for (size, (label, degree, leaf_dist)) in per_tree {
        hists.max_label_key = max_key(&label).max(hists.max_label_key);
        hists.max_degree_key = max_key(&degree).max(hists.max_degree_key);
        hists.max_leaf_dist_key = max_key(&leaf_dist).max(hists.max_leaf_dist_key);
        hists.label.push((size, label));
        hists.degree.push((size, degree));
        hists.leaf_dist.push((size, leaf_dist));
    }

    hists
}

fn max_key(hist: &Histogram) -> u32 {
    hist.keys().max().copied().unwrap_or(0)
}

/// Creates and returns the label, degree and leaf distance histograms of a
/// single tree in one fused traversal.
pub fn create_tree_histograms(tree: &ParsedTree) -> (Histogram, Histogram, Histogram) {
    let (mut label, mut degree, mut leaf_dist) =
        (Histogram::default(), Histogram::default(), Histogram::default());

    let Some(root) = tree.iter().next() else {
        return (label, degree, leaf_dist);
    };
    let root_id = tree.get_node_id(root).unwrap();
    traverse_tree(&root_id, tree, &mut label, &mut degree, &mut leaf_dist);

    (label, degree, leaf_dist)
}

/// Returns the leaf distance of the node: 0 for leaves, otherwise one more
/// than the minimum over its children.
fn traverse_tree(
    node_id: &NodeId,
    tree: &ParsedTree,
    label_hist: &mut Histogram,
    degree_hist: &mut Histogram,
    leaf_dist_hist: &mut Histogram,
) -> u32 {
    let mut degree = 0u32;
    let mut min_child_leaf_dist: Option<u32> = None;
    for cnid in node_id.children(tree) {
        degree += 1;
        let child_dist = traverse_tree(&cnid, tree, label_hist, degree_hist, leaf_dist_hist);
        min_child_leaf_dist = Some(match min_child_leaf_dist {
            Some(d) => d.min(child_dist),
            None => child_dist,
        });
    }
    let leaf_dist = min_child_leaf_dist.map_or(0, |d| d + 1);

    bump(degree_hist, degree);
    bump(leaf_dist_hist, leaf_dist);
    let label = tree.get(*node_id).unwrap().get();
    bump(label_hist, *label as u32);

    leaf_dist
}

fn bump(hist: &mut Histogram, key: u32) {
    hist.entry(key).and_modify(|count| *count += 1).or_insert(1);
}

/// L1 distance between two histograms, `N_1 + N_2 - 2 * overlap`.
pub fn l1_distance(h1: &(usize, Histogram), h2: &(usize, Histogram)) -> u64 {
    let overlap: u64 = h1
        .1
        .iter()
        .map(|(key, count)| u64::from(*count.min(h2.1.get(key).unwrap_or(&0))))
        .sum();
    (h1.0 + h2.0) as u64 - 2 * overlap
}
