use crate::indexing::TedIndex;
use itertools::Itertools;

/// Label-guided greedy mapping upper bound on the tree edit distance.
///
/// Builds a one-to-one mapping between equal-label nodes of both trees that
/// preserves postorder and ancestorship, which makes it a valid edit
/// mapping. Every unmapped node costs one deletion or insertion, no mapped
/// node costs anything, so `size_1 + size_2 - 2 * mapped` bounds the exact
/// distance from above.
pub fn lgm(t1: &TedIndex, t2: &TedIndex) -> usize {
    // labels present in both trees, rarest first; ties by label id
    let common_labels = t1
        .inverted_list
        .iter()
        .filter_map(|(label, postings)| {
            t2.inverted_list
                .get(label)
                .map(|other| (postings.len() + other.len(), *label))
        })
        .sorted_unstable()
        .collect_vec();

    let mut mapping: Vec<(usize, usize)> = Vec::new();
    for (_, label) in common_labels {
        let postings1 = &t1.inverted_list[&label];
        let postings2 = &t2.inverted_list[&label];

        // positions are ascending, so matched pairs of one label advance
        // through postings2 left to right
        let mut cursor = 0;
        for &a in postings1.iter() {
            for (offset, &b) in postings2[cursor..].iter().enumerate() {
                if is_consistent(a, b, &mapping, t1, t2) {
                    mapping.push((a, b));
                    cursor += offset + 1;
                    break;
                }
            }
            if cursor >= postings2.len() {
                break;
            }
        }
    }

    t1.c.tree_size + t2.c.tree_size - 2 * mapping.len()
}

/// A new pair may enter the mapping only if it preserves postorder and
/// ancestorship against every pair already mapped.
fn is_consistent(
    a: usize,
    b: usize,
    mapping: &[(usize, usize)],
    t1: &TedIndex,
    t2: &TedIndex,
) -> bool {
    for &(x, y) in mapping.iter() {
        if (a < x) != (b < y) {
            return false;
        }
        if t1.is_ancestor(x, a) != t2.is_ancestor(y, b) {
            return false;
        }
        if t1.is_ancestor(a, x) != t2.is_ancestor(b, y) {
            return false;
        }
    }
    true
}
