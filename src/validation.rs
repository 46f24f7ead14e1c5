use crate::join::JoinResultElement;
use itertools::Itertools;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Reads a `t1,t2,ted` result file and keeps the pairs within `k`.
pub fn read_results(
    results_path: impl AsRef<Path>,
    k: f64,
) -> Result<Vec<(usize, usize)>, anyhow::Error> {
    let rfile = File::open(results_path.as_ref())?;
    let rreader = BufReader::new(rfile);
    let mut rreader = csv::Reader::from_reader(rreader);
    let mut real_results = vec![];
    for result in rreader.records() {
        let record = result?;
        let (t1, t2, dist): (usize, usize, f64) =
            (record[0].parse()?, record[1].parse()?, record[2].parse()?);
        if dist <= k {
            real_results.push((t1, t2));
        }
    }
    real_results.sort_unstable();
    Ok(real_results)
}

/// Compares computed join results against a reference result file and
/// returns `(correct, extra, precision)`.
pub fn get_precision(
    results: &[JoinResultElement],
    results_path: impl AsRef<Path>,
    k: f64,
) -> Result<(usize, usize, f32), anyhow::Error> {
    let real_results = read_results(results_path, k)?;
    let computed = results
        .iter()
        .map(|r| (r.tree_id_1, r.tree_id_2))
        .sorted_unstable()
        .collect_vec();

    let extra = computed.iter().fold(0usize, |acc, pair| {
        match real_results.binary_search(pair) {
            Ok(_) => acc,
            Err(_) => acc + 1,
        }
    });

    let correct = computed.len() - extra;
    let precision = correct as f32 / computed.len() as f32;

    Ok((correct, extra, precision))
}

/// Returns the reference pairs the join failed to report.
pub fn missing_pairs(
    results: &[JoinResultElement],
    results_path: impl AsRef<Path>,
    k: f64,
) -> Result<Vec<(usize, usize)>, anyhow::Error> {
    let real_results = read_results(results_path, k)?;
    let computed = results
        .iter()
        .map(|r| (r.tree_id_1, r.tree_id_2))
        .sorted_unstable()
        .collect_vec();

    let not_found = real_results
        .into_iter()
        .filter(|pair| computed.binary_search(pair).is_err())
        .collect_vec();

    Ok(not_found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_reference(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "t1,t2,ted").unwrap();
        for line in lines {
            writeln!(f, "{line}").unwrap();
        }
        f
    }

    fn result(t1: usize, t2: usize, ted: f64) -> JoinResultElement {
        JoinResultElement {
            tree_id_1: t1,
            tree_id_2: t2,
            ted,
        }
    }

    #[test]
    fn test_precision_against_reference() {
        let reference = write_reference(&["0,1,1", "0,2,3", "1,2,0"]);
        let results = vec![result(0, 1, 1.0), result(1, 2, 0.0), result(3, 4, 1.0)];

        let (correct, extra, precision) = get_precision(&results, reference.path(), 1.0).unwrap();
        assert_eq!(correct, 2);
        assert_eq!(extra, 1);
        assert!((precision - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_missing_pairs() {
        let reference = write_reference(&["0,1,1", "1,2,0"]);
        let results = vec![result(0, 1, 1.0)];
        let missing = missing_pairs(&results, reference.path(), 2.0).unwrap();
        assert_eq!(missing, vec![(1, 2)]);
    }

    #[test]
    fn test_threshold_filters_reference() {
        let reference = write_reference(&["0,1,1", "0,2,5"]);
        let pairs = read_results(reference.path(), 2.0).unwrap();
        assert_eq!(pairs, vec![(0, 1)]);
    }
}
