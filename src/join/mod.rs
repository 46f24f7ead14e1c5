use crate::cost_model::{CostModel, UnitCostModel};
use crate::indexing::{Indexer, TedIndex};
use crate::lb::indexes::candidate_index::CandidateIndex;
use crate::lb::indexes::histograms::create_collection_histograms;
use crate::parsing::{LabelDict, ParsedTree};
use crate::ted::zhang_shasha::ZhangShasha;
use crate::ub::label_guided::lgm;
use rayon::prelude::*;
use thiserror::Error;

/// One matching pair of the join result, with `tree_id_1 < tree_id_2`.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinResultElement {
    pub tree_id_1: usize,
    pub tree_id_2: usize,
    pub ted: f64,
}

impl JoinResultElement {
    fn new(tree_id_1: usize, tree_id_2: usize, ted: f64) -> Self {
        Self {
            tree_id_1,
            tree_id_2,
            ted,
        }
    }
}

/// Counters accumulated over a single `execute_join` call. All saturate
/// instead of wrapping.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct JoinStats {
    /// Pairs whose size difference passed the candidate index filter.
    pub pre_candidates: u64,
    /// Inverted list entries touched while retrieving candidates.
    pub il_lookups: u64,
    /// Forest distance cells filled across all exact verifications.
    pub subproblem_count: u64,
    /// Number of slots of the label inverted index.
    pub inverted_list_size: u64,
}

#[derive(Error, Debug)]
pub enum JoinError {
    #[error("distance threshold must be non-negative, got {0}")]
    InvalidThreshold(f64),
}

/// The histogram-filtered similarity join: candidates are generated from
/// the label inverted index, tightened by the degree and leaf distance
/// bounds, admitted early through the label guided mapping upper bound and
/// only then verified exactly.
#[derive(Debug, Default)]
pub struct HistogramJoin<C: CostModel = UnitCostModel> {
    costs: C,
    stats: JoinStats,
}

impl<C: CostModel> HistogramJoin<C> {
    pub fn new(costs: C) -> Self {
        Self {
            costs,
            stats: JoinStats::default(),
        }
    }

    /// Counters of the most recent join.
    pub fn stats(&self) -> JoinStats {
        self.stats
    }

    /// Returns every pair of trees within `threshold` edit operations of
    /// each other, ascending by tree id pair.
    pub fn execute_join(
        &mut self,
        trees: &[ParsedTree],
        label_dict: &LabelDict,
        threshold: f64,
    ) -> Result<Vec<JoinResultElement>, JoinError> {
        if !(threshold >= 0.0) {
            return Err(JoinError::InvalidThreshold(threshold));
        }
        self.stats = JoinStats::default();

        let histograms = create_collection_histograms(trees);
        let mut candidate_index = CandidateIndex::new();
        let candidates = candidate_index.retrieve_candidates(&histograms, threshold);

        self.stats.pre_candidates = candidate_index.pre_candidates();
        self.stats.il_lookups = candidate_index.il_lookups();
        self.stats.inverted_list_size = u64::from(histograms.max_label_key) + 1;

        let indexes: Vec<TedIndex> = trees
            .par_iter()
            .map(|tree| TedIndex::index_tree(tree, label_dict))
            .collect();

        let mut verifier = ZhangShasha::new();
        let mut results = Vec::new();
        for (i, j) in candidates {
            let upper_bound = lgm(&indexes[i], &indexes[j]);
            if upper_bound as f64 <= threshold {
                results.push(JoinResultElement::new(i, j, upper_bound as f64));
                continue;
            }

            let ted = verifier.ted(&indexes[i], &indexes[j], &self.costs);
            self.stats.subproblem_count = self
                .stats
                .subproblem_count
                .saturating_add(verifier.subproblem_count());
            if ted <= threshold {
                results.push(JoinResultElement::new(i, j, ted));
            }
        }

        Ok(results)
    }
}

/// Baseline join verifying every pair exactly. Quadratic, but the result
/// oracle for everything else.
#[derive(Debug, Default)]
pub struct NaiveJoin<C: CostModel = UnitCostModel> {
    costs: C,
    stats: JoinStats,
}

impl<C: CostModel> NaiveJoin<C> {
    pub fn new(costs: C) -> Self {
        Self {
            costs,
            stats: JoinStats::default(),
        }
    }

    pub fn stats(&self) -> JoinStats {
        self.stats
    }

    pub fn execute_join(
        &mut self,
        trees: &[ParsedTree],
        label_dict: &LabelDict,
        threshold: f64,
    ) -> Result<Vec<JoinResultElement>, JoinError> {
        if !(threshold >= 0.0) {
            return Err(JoinError::InvalidThreshold(threshold));
        }
        self.stats = JoinStats::default();

        let indexes: Vec<TedIndex> = trees
            .par_iter()
            .map(|tree| TedIndex::index_tree(tree, label_dict))
            .collect();

        let mut verifier = ZhangShasha::new();
        let mut results = Vec::new();
        for i in 0..indexes.len() {
            for j in (i + 1)..indexes.len() {
                self.stats.pre_candidates = self.stats.pre_candidates.saturating_add(1);
                let ted = verifier.ted(&indexes[i], &indexes[j], &self.costs);
                self.stats.subproblem_count = self
                    .stats
                    .subproblem_count
                    .saturating_add(verifier.subproblem_count());
                if ted <= threshold {
                    results.push(JoinResultElement::new(i, j, ted));
                }
            }
        }

        Ok(results)
    }
}
