//! Exact tree edit distance by Zhang and Shasha: a dynamic program over
//! keyroot pairs, each solving the distance of the subforests delimited by
//! the keyroots' leftmost leaf descendants.

use crate::cost_model::CostModel;
use crate::indexing::TedIndex;

/// Zhang-Shasha verifier. Owns its scratch matrices for the duration of a
/// single distance computation; the subproblem counter is reset per call.
#[derive(Debug, Default)]
pub struct ZhangShasha {
    subproblem_count: u64,
}

impl ZhangShasha {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of forest distance cells filled by the last `ted` call.
    pub fn subproblem_count(&self) -> u64 {
        self.subproblem_count
    }

    /// Exact tree edit distance between two indexed trees under the given
    /// cost model. Does not terminate early on any threshold.
    pub fn ted<C: CostModel>(&mut self, t1: &TedIndex, t2: &TedIndex, costs: &C) -> f64 {
        self.subproblem_count = 0;
        let n1 = t1.c.tree_size;
        let n2 = t2.c.tree_size;

        // transforming from or to the empty tree touches every node once
        if n1 == 0 {
            return t2.postorder_labels.iter().map(|&l| costs.ins(l)).sum();
        }
        if n2 == 0 {
            return t1.postorder_labels.iter().map(|&l| costs.del(l)).sum();
        }

        let mut td = vec![0.0f64; n1 * n2];
        let mut fd = vec![0.0f64; (n1 + 1) * (n2 + 1)];

        for &kr1 in t1.kr.iter() {
            for &kr2 in t2.kr.iter() {
                self.forest_dist(t1, t2, kr1, kr2, &mut td, &mut fd, costs);
            }
        }

        td[(n1 - 1) * n2 + (n2 - 1)]
    }

    /// Fills the forest distance matrix for the subforests rooted between
    /// `lld(i)..=i` and `lld(j)..=j`. Cells whose prefixes are whole
    /// subtrees are persisted into the tree distance matrix `td`.
    fn forest_dist<C: CostModel>(
        &mut self,
        t1: &TedIndex,
        t2: &TedIndex,
        i: usize,
        j: usize,
        td: &mut [f64],
        fd: &mut [f64],
        costs: &C,
    ) {
        let n2 = t2.c.tree_size;
        let li = t1.lld[i];
        let lj = t2.lld[j];
        // row p / column q describe the first p resp. q nodes of the forests
        let rows = i - li + 2;
        let cols = j - lj + 2;
        let at = |p: usize, q: usize| p * cols + q;

        fd[at(0, 0)] = 0.0;
        for p in 1..rows {
            let a = li + p - 1;
            fd[at(p, 0)] = fd[at(p - 1, 0)] + costs.del(t1.postorder_labels[a]);
        }
        for q in 1..cols {
            let b = lj + q - 1;
            fd[at(0, q)] = fd[at(0, q - 1)] + costs.ins(t2.postorder_labels[b]);
        }

        for p in 1..rows {
            let a = li + p - 1;
            let label_a = t1.postorder_labels[a];
            for q in 1..cols {
                let b = lj + q - 1;
                let label_b = t2.postorder_labels[b];

                let del = fd[at(p - 1, q)] + costs.del(label_a);
                let ins = fd[at(p, q - 1)] + costs.ins(label_b);

                if t1.lld[a] == li && t2.lld[b] == lj {
                    // both prefixes end in whole subtrees rooted at a and b
                    let ren = fd[at(p - 1, q - 1)] + costs.ren(label_a, label_b);
                    let dist = del.min(ins).min(ren);
                    fd[at(p, q)] = dist;
                    td[a * n2 + b] = dist;
                } else {
                    let tree = fd[at(t1.lld[a] - li, t2.lld[b] - lj)] + td[a * n2 + b];
                    fd[at(p, q)] = del.min(ins).min(tree);
                }
            }
        }

        self.subproblem_count = self.subproblem_count.saturating_add((rows * cols) as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost_model::UnitCostModel;
    use crate::indexing::Indexer;
    use crate::parsing::{parse_single, LabelDict, LabelId, ParsedTree};

    fn ted_of(s1: &str, s2: &str) -> f64 {
        let mut ld = LabelDict::new();
        let t1 = parse_single(s1, &mut ld);
        let t2 = parse_single(s2, &mut ld);
        let i1 = TedIndex::index_tree(&t1, &ld);
        let i2 = TedIndex::index_tree(&t2, &ld);
        ZhangShasha::new().ted(&i1, &i2, &UnitCostModel)
    }

    #[test]
    fn test_identity() {
        for s in ["{a}", "{a{b{c}}}", "{a{b{c}{d}}{e{f}}}"] {
            assert_eq!(ted_of(s, s), 0.0, "distance of {s} to itself");
        }
    }

    #[test]
    fn test_singletons() {
        assert_eq!(ted_of("{a}", "{a}"), 0.0);
        assert_eq!(ted_of("{a}", "{b}"), 1.0);
    }

    #[test]
    fn test_single_insertion() {
        assert_eq!(ted_of("{a}", "{a{b}}"), 1.0);
        assert_eq!(ted_of("{a{b}}", "{a{b}{c}}"), 1.0);
    }

    #[test]
    fn test_single_rename() {
        assert_eq!(ted_of("{a{b}{c}}", "{a{b}{d}}"), 1.0);
    }

    #[test]
    fn test_zhang_shasha_paper_example() {
        // f(d(a c(b)) e) vs f(c(d(a b)) e), known distance 2
        assert_eq!(ted_of("{f{d{a}{c{b}}}{e}}", "{f{c{d{a}{b}}}{e}}"), 2.0);
    }

    #[test]
    fn test_symmetry_under_unit_costs() {
        let pairs = [
            ("{a{b{c}{d}}{e}}", "{a{b}{c}{d}{e}}"),
            ("{x{y}}", "{x{y{z}{w}}}"),
            ("{a}", "{b{c{d}}}"),
        ];
        for (s1, s2) in pairs {
            assert_eq!(ted_of(s1, s2), ted_of(s2, s1));
        }
    }

    #[test]
    fn test_empty_tree_distance_is_other_size() {
        let mut ld = LabelDict::new();
        let t1 = ParsedTree::new();
        let t2 = parse_single("{a{b}{c}}", &mut ld);
        let i1 = TedIndex::index_tree(&t1, &ld);
        let i2 = TedIndex::index_tree(&t2, &ld);
        let mut verifier = ZhangShasha::new();
        assert_eq!(verifier.ted(&i1, &i2, &UnitCostModel), 3.0);
        assert_eq!(verifier.ted(&i2, &i1, &UnitCostModel), 3.0);
        assert_eq!(verifier.ted(&i1, &i1, &UnitCostModel), 0.0);
    }

    #[test]
    fn test_injected_cost_model() {
        struct FreeRename;
        impl CostModel for FreeRename {
            fn del(&self, _: LabelId) -> f64 {
                1.0
            }
            fn ins(&self, _: LabelId) -> f64 {
                1.0
            }
            fn ren(&self, _: LabelId, _: LabelId) -> f64 {
                0.0
            }
        }

        let mut ld = LabelDict::new();
        let t1 = parse_single("{a{b}}", &mut ld);
        let t2 = parse_single("{x{y}}", &mut ld);
        let i1 = TedIndex::index_tree(&t1, &ld);
        let i2 = TedIndex::index_tree(&t2, &ld);
        assert_eq!(ZhangShasha::new().ted(&i1, &i2, &FreeRename), 0.0);
    }

    #[test]
    fn test_subproblem_count_resets_per_call() {
        let mut ld = LabelDict::new();
        let t1 = parse_single("{a{b{c}{d}}{e}}", &mut ld);
        let t2 = parse_single("{a{b{c}}{e{f}}}", &mut ld);
        let i1 = TedIndex::index_tree(&t1, &ld);
        let i2 = TedIndex::index_tree(&t2, &ld);

        let mut verifier = ZhangShasha::new();
        verifier.ted(&i1, &i2, &UnitCostModel);
        let first = verifier.subproblem_count();
        assert!(first > 0);
        verifier.ted(&i1, &i2, &UnitCostModel);
        assert_eq!(verifier.subproblem_count(), first);
    }
}
