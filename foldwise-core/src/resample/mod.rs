//! Partitioning: train/test splits, validation splits, and (repeated) k-fold
//! resamples, optionally stratified on a categorical column.
//!
//! Every index set produced here holds absolute row ids of the source
//! [`Dataset`], sorted ascending, so partitions of a training pool can be
//! checked against the pool's own test set.

pub mod partition;

pub use partition::{kfold, repeated_kfold, split, validation_split};

use crate::data::{DataView, Dataset};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Two disjoint row sets: the rows to train on and the rows held out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Split {
    train: Vec<usize>,
    holdout: Vec<usize>,
}

impl Split {
    pub(crate) fn new(mut train: Vec<usize>, mut holdout: Vec<usize>) -> Self {
        train.sort_unstable();
        holdout.sort_unstable();
        Self { train, holdout }
    }

    pub fn train(&self) -> &[usize] {
        &self.train
    }

    pub fn holdout(&self) -> &[usize] {
        &self.holdout
    }

    /// View over the training rows.
    pub fn training<'a>(&'a self, data: &'a Dataset) -> DataView<'a> {
        data.subset(&self.train)
    }

    /// View over the held-out rows.
    pub fn testing<'a>(&'a self, data: &'a Dataset) -> DataView<'a> {
        data.subset(&self.holdout)
    }
}

/// One resample: its holdout rows are scored by a model fit on its train rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fold {
    id: String,
    split: Split,
}

impl Fold {
    pub(crate) fn new(id: impl Into<String>, split: Split) -> Self {
        Self {
            id: id.into(),
            split,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn train(&self) -> &[usize] {
        self.split.train()
    }

    pub fn holdout(&self) -> &[usize] {
        self.split.holdout()
    }

    pub fn analysis<'a>(&'a self, data: &'a Dataset) -> DataView<'a> {
        self.split.training(data)
    }

    pub fn assessment<'a>(&'a self, data: &'a Dataset) -> DataView<'a> {
        self.split.testing(data)
    }
}

/// The ordered folds produced by one resampling scheme and seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResampleSet {
    folds: Vec<Fold>,
    seed: u64,
    strata: Option<String>,
}

impl ResampleSet {
    pub(crate) fn new(folds: Vec<Fold>, seed: u64, strata: Option<String>) -> Self {
        Self {
            folds,
            seed,
            strata,
        }
    }

    pub fn folds(&self) -> &[Fold] {
        &self.folds
    }

    pub fn len(&self) -> usize {
        self.folds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.folds.is_empty()
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn strata(&self) -> Option<&str> {
        self.strata.as_deref()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Fold> {
        self.folds.iter()
    }

    /// Every row touched by any fold, as train or holdout.
    pub fn rows(&self) -> BTreeSet<usize> {
        self.folds
            .iter()
            .flat_map(|f| f.train().iter().chain(f.holdout()))
            .copied()
            .collect()
    }
}

impl<'a> IntoIterator for &'a ResampleSet {
    type Item = &'a Fold;
    type IntoIter = std::slice::Iter<'a, Fold>;

    fn into_iter(self) -> Self::IntoIter {
        self.folds.iter()
    }
}
