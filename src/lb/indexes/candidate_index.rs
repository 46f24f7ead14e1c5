use crate::lb::indexes::histograms::{l1_distance, CollectionHistograms, HistogramCollection};
use rayon::prelude::*;

pub type Candidate = (usize, usize);
pub type Candidates = Vec<Candidate>;

/// One edit operation changes the label histogram by at most two entries,
/// so a matching pair satisfies `L1 <= 2 * threshold`.
pub const LABEL_L1_FACTOR: u64 = 2;
/// Deleting a node touches its own degree entry and moves the parent's,
/// three entries in the worst case.
pub const DEGREE_L1_FACTOR: u64 = 3;
/// Leaf distances of ancestors can shift as well, giving the weakest of
/// the three bounds.
pub const LEAF_DIST_L1_FACTOR: u64 = 5;

/// Inverted-index candidate generator. Given a histogram collection and a
/// distance threshold, emits every pair whose histogram L1 distance stays
/// within `l1_factor * threshold`, a necessary condition for the pair to be
/// in the join result.
#[derive(Debug, Default)]
pub struct CandidateIndex {
    pre_candidates: u64,
    il_lookups: u64,
}

impl CandidateIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pairs whose size difference passed the filter.
    pub fn pre_candidates(&self) -> u64 {
        self.pre_candidates
    }

    /// Inverted list entries touched during lookup.
    pub fn il_lookups(&self) -> u64 {
        self.il_lookups
    }

    /// Candidate retrieval for the full lower bound stack: the label index
    /// generates pairs, the degree and leaf distance bounds intersect them.
    /// Survivors are sorted lexicographically.
    pub fn retrieve_candidates(
        &mut self,
        histograms: &CollectionHistograms,
        threshold: f64,
    ) -> Candidates {
        let mut candidates = self.lookup(
            &histograms.label,
            histograms.max_label_key,
            LABEL_L1_FACTOR,
            threshold,
        );

        candidates.retain(|&(i, j)| {
            l1_distance(&histograms.degree[i], &histograms.degree[j]) as f64
                <= DEGREE_L1_FACTOR as f64 * threshold
        });
        candidates.retain(|&(i, j)| {
            l1_distance(&histograms.leaf_dist[i], &histograms.leaf_dist[j]) as f64
                <= LEAF_DIST_L1_FACTOR as f64 * threshold
        });

        candidates.par_sort_unstable();
        candidates
    }

    /// Single-kind inverted index lookup. Trees are processed in ascending
    /// size order, so every posting list stays sorted by tree size and the
    /// size filter skips a prefix of each list.
    pub fn lookup(
        &mut self,
        histograms: &HistogramCollection,
        key_universe: u32,
        l1_factor: u64,
        threshold: f64,
    ) -> Candidates {
        let limit = l1_factor as f64 * threshold;

        let mut order: Vec<usize> = (0..histograms.len()).collect();
        order.sort_unstable_by_key(|&id| (histograms[id].0, id));

        // posting list entry: (tree id, tree size, key count)
        let mut il_index: Vec<Vec<(usize, usize, u32)>> =
            vec![vec![]; key_universe as usize + 1];
        let mut overlap = vec![0u64; histograms.len()];
        let mut touched = vec![false; histograms.len()];
        // previously processed trees in insertion (= ascending size) order
        let mut inserted: Vec<(usize, usize)> = Vec::with_capacity(histograms.len());
        let mut candidates = vec![];

        for &tree_id in order.iter() {
            let (tree_size, histogram) = &histograms[tree_id];
            let mut pre_candidates: Vec<usize> = vec![];

            // a pair without any common key still satisfies the L1 condition
            // when the sizes alone stay within the bound
            for &(other_id, other_size) in inserted.iter() {
                if (tree_size + other_size) as f64 > limit {
                    break;
                }
                touched[other_id] = true;
                pre_candidates.push(other_id);
            }

            for (key, count) in histogram.iter() {
                let postings = &il_index[*key as usize];
                for &(other_id, _, other_count) in postings
                    .iter()
                    .skip_while(|(_, other_size, _)| (tree_size - other_size) as f64 > limit)
                {
                    self.il_lookups = self.il_lookups.saturating_add(1);
                    if !touched[other_id] {
                        touched[other_id] = true;
                        pre_candidates.push(other_id);
                    }
                    overlap[other_id] += u64::from((*count).min(other_count));
                }
                il_index[*key as usize].push((tree_id, *tree_size, *count));
            }

            self.pre_candidates = self
                .pre_candidates
                .saturating_add(pre_candidates.len() as u64);

            for other_id in pre_candidates {
                let other_size = histograms[other_id].0;
                let l1 = (tree_size + other_size) as u64 - 2 * overlap[other_id];
                if l1 as f64 <= limit {
                    candidates.push((tree_id.min(other_id), tree_id.max(other_id)));
                }
                overlap[other_id] = 0;
                touched[other_id] = false;
            }

            inserted.push((tree_id, *tree_size));
        }

        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lb::indexes::histograms::create_collection_histograms;
    use crate::parsing::{parse_single, LabelDict, ParsedTree};
    use itertools::Itertools;

    fn collection(inputs: &[&str]) -> (Vec<ParsedTree>, LabelDict) {
        let mut ld = LabelDict::new();
        let trees = inputs.iter().map(|s| parse_single(*s, &mut ld)).collect();
        (trees, ld)
    }

    #[test]
    fn test_disjoint_labels_pruned() {
        let (trees, _) = collection(&["{a{b}{c}}", "{x{y}{z}{w}}"]);
        let hists = create_collection_histograms(&trees);
        let mut index = CandidateIndex::new();
        let candidates = index.retrieve_candidates(&hists, 1.0);
        assert!(candidates.is_empty());
        assert_eq!(index.pre_candidates(), 0);
    }

    #[test]
    fn test_small_disjoint_pair_survives() {
        // no shared label, but both singletons: L1 = 2 <= 2 * 1
        let (trees, _) = collection(&["{a}", "{b}"]);
        let hists = create_collection_histograms(&trees);
        let mut index = CandidateIndex::new();
        let candidates = index.retrieve_candidates(&hists, 1.0);
        assert_eq!(candidates, vec![(0, 1)]);
    }

    #[test]
    fn test_zero_threshold_keeps_equal_histograms_only() {
        let (trees, _) = collection(&["{a{b}}", "{a{b}}", "{a{c}}"]);
        let hists = create_collection_histograms(&trees);
        let mut index = CandidateIndex::new();
        let candidates = index.retrieve_candidates(&hists, 0.0);
        assert_eq!(candidates, vec![(0, 1)]);
    }

    #[test]
    fn test_lookup_matches_pairwise_l1() {
        let (trees, _) = collection(&[
            "{a{b{c}{d}}{e}}",
            "{a{b{c}}{e}}",
            "{a{b}{c}{d}{e}}",
            "{f{f{f}}}",
            "{a}",
            "{b{c{d{e}}}}",
        ]);
        let hists = create_collection_histograms(&trees);

        for threshold in [0.0, 1.0, 2.0, 5.0] {
            let mut index = CandidateIndex::new();
            let got = index.lookup(&hists.label, hists.max_label_key, LABEL_L1_FACTOR, threshold);
            let got = got.into_iter().sorted().collect_vec();

            let expected = (0..trees.len())
                .tuple_combinations()
                .filter(|&(i, j)| {
                    l1_distance(&hists.label[i], &hists.label[j]) as f64
                        <= LABEL_L1_FACTOR as f64 * threshold
                })
                .collect_vec();
            assert_eq!(got, expected, "threshold {threshold}");
        }
    }

    #[test]
    fn test_counters_monotone() {
        let (trees, _) = collection(&["{a{b}}", "{a{b}}", "{a{c}}", "{a{b}{c}}"]);
        let hists = create_collection_histograms(&trees);
        let mut index = CandidateIndex::new();
        let candidates = index.retrieve_candidates(&hists, 1.0);
        assert!(index.pre_candidates() >= candidates.len() as u64);
        assert!(index.il_lookups() > 0);
    }
}
