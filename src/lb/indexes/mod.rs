pub mod candidate_index;
pub mod histograms;
