use std::collections::BTreeMap;
use std::collections::hash_map::DefaultHasher;
use std::fs::File;
use std::hash::{Hash, Hasher};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Stratified cross-validation splitting with an on-disk index cache.
///
/// Each of the `k_folds` folds gets a unique test set (the folds' test sets
/// partition the dataset) and the remainder is stratified-split again into
/// train and val. Indices are persisted as `<key>_train.index`,
/// `<key>_val.index`, `<key>_test.index` under the cache root, one
/// comma-separated line per fold; existing files are loaded verbatim and
/// never recomputed. The key hashes the dataset name together with the
/// split parameters so a changed seed or fold count cannot silently reuse
/// stale indices.
#[derive(Debug, Clone, Copy)]
pub struct SplitConfig {
    pub k_folds: usize,
    pub val_fraction: f64,
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            // 10-fold cross val to compare with benchmark papers;
            // 0.111 of the 90% remainder makes the overall split 80:10:10
            k_folds: 10,
            val_fraction: 0.111,
            seed: 42,
        }
    }
}

impl SplitConfig {
    fn cache_key(&self, name: &str) -> String {
        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        self.k_folds.hash(&mut hasher);
        self.val_fraction.to_bits().hash(&mut hasher);
        self.seed.hash(&mut hasher);
        format!("{}_{:016x}", name, hasher.finish())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndex {
    pub train: Vec<Vec<usize>>,
    pub val: Vec<Vec<usize>>,
    pub test: Vec<Vec<usize>>,
}

pub fn get_all_split_idx<P: AsRef<Path>>(
    name: &str,
    labels: &[i64],
    config: &SplitConfig,
    root: P,
) -> Result<SplitIndex> {
    let root = root.as_ref();
    std::fs::create_dir_all(root)?;
    let key = config.cache_key(name);

    if !index_path(root, &key, "train").exists() {
        println!("[!] Splitting the data into train/val/test ...");
        let split = compute_split(labels, config)?;
        for (section, folds) in [
            ("train", &split.train),
            ("val", &split.val),
            ("test", &split.test),
        ] {
            write_index_file(&index_path(root, &key, section), folds)?;
        }
        println!("[!] Splitting done!");
    }

    let train = read_index_file(&index_path(root, &key, "train"))?;
    let val = read_index_file(&index_path(root, &key, "val"))?;
    let test = read_index_file(&index_path(root, &key, "test"))?;
    Ok(SplitIndex { train, val, test })
}

fn index_path(root: &Path, key: &str, section: &str) -> PathBuf {
    root.join(format!("{}_{}.index", key, section))
}

fn write_index_file(path: &Path, folds: &[Vec<usize>]) -> Result<()> {
    let mut file = File::create(path)?;
    for fold in folds {
        let line = fold
            .iter()
            .map(|idx| idx.to_string())
            .collect::<Vec<_>>()
            .join(",");
        writeln!(file, "{}", line)?;
    }
    Ok(())
}

fn read_index_file(path: &Path) -> Result<Vec<Vec<usize>>> {
    let reader = BufReader::new(
        File::open(path).with_context(|| format!("missing index file {:?}", path))?,
    );
    let mut folds = Vec::new();
    for buf in reader.lines() {
        let line = buf?;
        if line.is_empty() {
            folds.push(Vec::new());
            continue;
        }
        folds.push(
            line.split(',')
                .map(|tok| tok.trim().parse::<usize>().map_err(Into::into))
                .collect::<Result<Vec<usize>>>()?,
        );
    }
    Ok(folds)
}

/// Stratified K-fold plus an inner stratified train/val split, driven by an
/// explicit seed rather than global RNG state. Index recovery uses
/// (index, label) pairs throughout.
fn compute_split(labels: &[i64], config: &SplitConfig) -> Result<SplitIndex> {
    ensure!(config.k_folds >= 2, "need at least 2 folds");
    ensure!(
        labels.len() >= config.k_folds,
        "cannot split {} graphs into {} folds",
        labels.len(),
        config.k_folds
    );
    let mut rng = StdRng::seed_from_u64(config.seed);

    // shuffled member lists per class
    let mut by_class: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (idx, &label) in labels.iter().enumerate() {
        by_class.entry(label).or_default().push(idx);
    }
    for members in by_class.values_mut() {
        members.shuffle(&mut rng);
    }

    // fold i's test set takes the i-th chunk of every class
    let k = config.k_folds;
    let mut test_folds = vec![Vec::new(); k];
    for members in by_class.values() {
        let m = members.len();
        for i in 0..k {
            let lo = i * m / k;
            let hi = (i + 1) * m / k;
            test_folds[i].extend_from_slice(&members[lo..hi]);
        }
    }

    let mut split = SplitIndex {
        train: Vec::with_capacity(k),
        val: Vec::with_capacity(k),
        test: Vec::with_capacity(k),
    };
    for test in test_folds {
        let mut in_test = vec![false; labels.len()];
        for &idx in &test {
            in_test[idx] = true;
        }
        let remain: Vec<usize> = (0..labels.len()).filter(|&idx| !in_test[idx]).collect();
        let (train, val) = stratified_holdout(&remain, labels, config.val_fraction, &mut rng);
        split.train.push(train);
        split.val.push(val);
        split.test.push(test);
    }
    Ok(split)
}

/// Splits `indices` into (kept, held-out) preserving per-class proportions.
fn stratified_holdout(
    indices: &[usize],
    labels: &[i64],
    holdout_fraction: f64,
    rng: &mut StdRng,
) -> (Vec<usize>, Vec<usize>) {
    let mut by_class: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for &idx in indices {
        by_class.entry(labels[idx]).or_default().push(idx);
    }
    let mut kept = Vec::new();
    let mut held = Vec::new();
    for members in by_class.values_mut() {
        members.shuffle(rng);
        let cut = (members.len() as f64 * holdout_fraction).round() as usize;
        held.extend_from_slice(&members[..cut]);
        kept.extend_from_slice(&members[cut..]);
    }
    (kept, held)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(n: usize) -> Vec<i64> {
        (0..n).map(|i| (i % 2) as i64).collect()
    }

    #[test]
    fn folds_are_disjoint_and_cover_everything() {
        let labels = labels(60);
        let config = SplitConfig::default();
        let dir = tempfile::tempdir().unwrap();
        let split = get_all_split_idx("toy", &labels, &config, dir.path()).unwrap();
        assert_eq!(split.train.len(), 10);
        assert_eq!(split.val.len(), 10);
        assert_eq!(split.test.len(), 10);

        let mut seen_in_test = vec![0usize; labels.len()];
        for fold in 0..10 {
            let mut marks = vec![0u8; labels.len()];
            for &idx in &split.train[fold] {
                marks[idx] += 1;
            }
            for &idx in &split.val[fold] {
                marks[idx] += 1;
            }
            for &idx in &split.test[fold] {
                marks[idx] += 1;
                seen_in_test[idx] += 1;
            }
            // pairwise disjoint and jointly exhaustive within one fold
            assert!(marks.iter().all(|&m| m == 1), "fold {} overlaps", fold);
        }
        // test sets partition the dataset across folds
        assert!(seen_in_test.iter().all(|&m| m == 1));
    }

    #[test]
    fn splits_are_stratified() {
        let labels = labels(100);
        let config = SplitConfig::default();
        let dir = tempfile::tempdir().unwrap();
        let split = get_all_split_idx("toy", &labels, &config, dir.path()).unwrap();
        for fold in 0..10 {
            let ones = split.test[fold]
                .iter()
                .filter(|&&idx| labels[idx] == 1)
                .count();
            assert_eq!(ones * 2, split.test[fold].len());
        }
    }

    #[test]
    fn cached_reload_is_identical() {
        let labels = labels(50);
        let config = SplitConfig::default();
        let dir = tempfile::tempdir().unwrap();
        let first = get_all_split_idx("toy", &labels, &config, dir.path()).unwrap();
        let second = get_all_split_idx("toy", &labels, &config, dir.path()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn cache_key_depends_on_parameters() {
        let a = SplitConfig::default().cache_key("toy");
        let b = SplitConfig {
            seed: 43,
            ..SplitConfig::default()
        }
        .cache_key("toy");
        assert_ne!(a, b);
        assert_ne!(a, SplitConfig::default().cache_key("other"));
    }

    #[test]
    fn same_seed_reproduces_same_split() {
        let labels = labels(40);
        let config = SplitConfig::default();
        let a = compute_split(&labels, &config).unwrap();
        let b = compute_split(&labels, &config).unwrap();
        assert_eq!(a, b);
    }
}
