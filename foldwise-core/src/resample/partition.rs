//! Seeded, optionally stratified partitioning of a [`DataView`].

use crate::data::{DataView, category_of};
use crate::error::{EngineError, EngineResult};
use crate::resample::{Fold, ResampleSet, Split};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::collections::BTreeMap;

/// Fold id used for the single resample of a validation split.
pub const VALIDATION_FOLD_ID: &str = "validation";

/// Split rows into train and holdout; `fraction` is the share kept for training.
///
/// Rows are shuffled with a generator seeded from `seed` and the first
/// ⌈fraction × n⌉ become the training rows. With `stratify_by`, that total is
/// apportioned over the classes by largest remainder and each class is cut
/// separately, so every class lands within one row of its exact share in
/// both parts.
pub fn split(
    view: DataView<'_>,
    fraction: f64,
    stratify_by: Option<&str>,
    seed: u64,
) -> EngineResult<Split> {
    check_fraction(fraction)?;
    let groups = strata(view, stratify_by)?;
    let mut rng = StdRng::seed_from_u64(seed);

    let sizes: Vec<usize> = groups.values().map(Vec::len).collect();
    let cuts = apportion(ceil_share(fraction, view.len()), &sizes);

    let mut train = Vec::with_capacity(view.len());
    let mut holdout = Vec::with_capacity(view.len());
    for ((_, mut rows), cut) in groups.into_iter().zip(cuts) {
        rows.shuffle(&mut rng);
        holdout.extend_from_slice(&rows[cut..]);
        rows.truncate(cut);
        train.extend(rows);
    }

    if train.is_empty() || holdout.is_empty() {
        return Err(EngineError::insufficient_rows(format!(
            "splitting {} row(s) at fraction {fraction} leaves an empty partition",
            view.len()
        )));
    }
    tracing::debug!(
        rows = view.len(),
        train = train.len(),
        holdout = holdout.len(),
        stratified = stratify_by.is_some(),
        seed,
        "Split rows"
    );
    Ok(Split::new(train, holdout))
}

/// Validation split packaged as a one-fold [`ResampleSet`].
pub fn validation_split(
    view: DataView<'_>,
    fraction: f64,
    stratify_by: Option<&str>,
    seed: u64,
) -> EngineResult<ResampleSet> {
    let split = split(view, fraction, stratify_by, seed)?;
    Ok(ResampleSet::new(
        vec![Fold::new(VALIDATION_FOLD_ID, split)],
        seed,
        stratify_by.map(str::to_string),
    ))
}

/// Partition rows into `k` folds of near-equal size.
///
/// Rows are shuffled (within each class when stratified) and dealt
/// round-robin across the folds; the dealing counter carries over from one
/// class to the next, so both overall fold sizes and per-class counts per fold
/// differ by at most one.
pub fn kfold(
    view: DataView<'_>,
    k: usize,
    stratify_by: Option<&str>,
    seed: u64,
) -> EngineResult<ResampleSet> {
    let assignments = assign_folds(view, k, stratify_by, seed)?;
    let width = digits(k);
    let folds = build_folds(view, &assignments, k, |i| {
        format!("Fold{:0width$}", i + 1)
    });
    tracing::debug!(rows = view.len(), folds = k, seed, "Built k-fold resamples");
    Ok(ResampleSet::new(folds, seed, stratify_by.map(str::to_string)))
}

/// `repeats` independent k-fold partitions. Repeat `r` draws from a seed
/// derived from (`seed`, `r`); fold ids read `Repeat1/Fold1` and so on.
pub fn repeated_kfold(
    view: DataView<'_>,
    k: usize,
    repeats: usize,
    stratify_by: Option<&str>,
    seed: u64,
) -> EngineResult<ResampleSet> {
    if repeats == 0 {
        return Err(EngineError::invalid_input("repeats must be at least 1"));
    }
    if repeats == 1 {
        return kfold(view, k, stratify_by, seed);
    }
    let (fold_width, repeat_width) = (digits(k), digits(repeats));
    let mut folds = Vec::with_capacity(k * repeats);
    for r in 0..repeats {
        let assignments = assign_folds(view, k, stratify_by, derive_seed(seed, r))?;
        folds.extend(build_folds(view, &assignments, k, |i| {
            format!("Repeat{:0repeat_width$}/Fold{:0fold_width$}", r + 1, i + 1)
        }));
    }
    Ok(ResampleSet::new(folds, seed, stratify_by.map(str::to_string)))
}

/// Fold number for every view position.
fn assign_folds(
    view: DataView<'_>,
    k: usize,
    stratify_by: Option<&str>,
    seed: u64,
) -> EngineResult<Vec<(usize, usize)>> {
    if k < 2 {
        return Err(EngineError::InvalidFoldCount { folds: k });
    }
    if view.len() < k {
        return Err(EngineError::insufficient_rows(format!(
            "{} row(s) cannot fill {k} folds",
            view.len()
        )));
    }
    let groups = strata(view, stratify_by)?;
    if let Some((class, rows)) = groups.iter().find(|(_, rows)| rows.len() < k) {
        return Err(EngineError::insufficient_rows(format!(
            "class '{class}' has {} row(s), fewer than the {k} folds requested",
            rows.len()
        )));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut counter = 0usize;
    let mut assignments = Vec::with_capacity(view.len());
    for (_, mut rows) in groups {
        rows.shuffle(&mut rng);
        for row in rows {
            assignments.push((row, counter % k));
            counter += 1;
        }
    }
    Ok(assignments)
}

fn build_folds(
    view: DataView<'_>,
    assignments: &[(usize, usize)],
    k: usize,
    id: impl Fn(usize) -> String,
) -> Vec<Fold> {
    (0..k)
        .map(|fold| {
            let mut train = Vec::with_capacity(view.len());
            let mut holdout = Vec::with_capacity(view.len() / k + 1);
            for &(row, assigned) in assignments {
                if assigned == fold {
                    holdout.push(row);
                } else {
                    train.push(row);
                }
            }
            Fold::new(id(fold), Split::new(train, holdout))
        })
        .collect()
}

/// Row ids grouped by class label (label order), or one group when unstratified.
fn strata(
    view: DataView<'_>,
    stratify_by: Option<&str>,
) -> EngineResult<BTreeMap<String, Vec<usize>>> {
    let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    let Some(column) = stratify_by else {
        groups.insert(String::new(), view.row_ids().collect());
        return Ok(groups);
    };
    let col = view.dataset().column_index(column)?;
    for pos in 0..view.len() {
        let value = view.value(pos, col);
        let label = category_of(value).ok_or_else(|| EngineError::NonCategorical {
            column: column.to_string(),
            row: view.row_id(pos),
            value: value.to_string(),
        })?;
        groups.entry(label).or_default().push(view.row_id(pos));
    }
    Ok(groups)
}

fn check_fraction(fraction: f64) -> EngineResult<()> {
    if fraction.is_finite() && fraction > 0.0 && fraction < 1.0 {
        Ok(())
    } else {
        Err(EngineError::InvalidFraction { fraction })
    }
}

/// ⌈fraction × n⌉, ignoring representation noise such as `0.7 * 10 = 7.000000000000001`.
fn ceil_share(fraction: f64, n: usize) -> usize {
    let raw = fraction * n as f64;
    ((raw - 1e-9).ceil().max(0.0) as usize).min(n)
}

/// Split `total` rows over groups of the given sizes in proportion to their
/// size. Each group gets ⌊total × size / n⌋ and the leftover rows go to the
/// largest remainders, earlier groups first on ties.
fn apportion(total: usize, sizes: &[usize]) -> Vec<usize> {
    let n: usize = sizes.iter().sum();
    if n == 0 {
        return vec![0; sizes.len()];
    }
    let mut shares: Vec<usize> = sizes.iter().map(|&size| total * size / n).collect();
    let leftover = total - shares.iter().sum::<usize>();
    let mut order: Vec<usize> = (0..sizes.len()).collect();
    order.sort_by_key(|&i| std::cmp::Reverse(total * sizes[i] % n));
    for &i in order.iter().take(leftover) {
        shares[i] += 1;
    }
    shares
}

pub(crate) fn derive_seed(seed: u64, repeat: usize) -> u64 {
    seed ^ (repeat as u64).wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

fn digits(n: usize) -> usize {
    n.to_string().len()
}
