//! Out-of-bag index computation under the four honesty regimes.
//!
//! All regimes return a sorted index vector over a reference set
//! (`0..n_rows` or a caller-supplied training-row subset). Set union and
//! difference are linear merges over sorted inputs; the tree keeps its
//! sampled index vectors sorted for exactly this reason.

use std::collections::BTreeSet;

use crate::tree::Tree;

impl Tree {
    /// Standard OOB: `all_index \ (splitting ∪ averaging)`.
    pub fn oob_index(&self, all_index: &[usize]) -> Vec<usize> {
        let all = sorted(all_index);
        let sampled = sorted_union(self.splitting_index(), self.averaging_index());
        sorted_difference(&all, &sampled)
    }

    /// Honest OOB: `all_index \ averaging`.
    ///
    /// Rows the tree never averaged over; they may still have steered its
    /// splits.
    pub fn honest_oob_index(&self, all_index: &[usize]) -> Vec<usize> {
        let all = sorted(all_index);
        sorted_difference(&all, self.averaging_index())
    }

    /// Double-bootstrap OOB: rows selected by neither bootstrap.
    ///
    /// The merge is the standard one; with both index sets drawn as
    /// bootstraps, the result covers about `0.368² ≈ 13.5%` of the rows.
    pub fn double_oob_index(&self, all_index: &[usize]) -> Vec<usize> {
        self.oob_index(all_index)
    }

    /// Out-of-group index: rows whose group id never appears in the sampled
    /// sets (averaging always; splitting too when `double_oob`).
    pub fn out_of_group_index(
        &self,
        groups: &[usize],
        all_index: &[usize],
        double_oob: bool,
    ) -> Vec<usize> {
        let mut in_sample_groups: BTreeSet<usize> = self
            .averaging_index()
            .iter()
            .map(|&i| groups[i])
            .collect();
        if double_oob {
            in_sample_groups.extend(self.splitting_index().iter().map(|&i| groups[i]));
        }

        let all = sorted(all_index);
        all.into_iter()
            .filter(|&i| !in_sample_groups.contains(&groups[i]))
            .collect()
    }
}

fn sorted(indices: &[usize]) -> Vec<usize> {
    let mut out = indices.to_vec();
    out.sort_unstable();
    out
}

/// Union of two sorted index vectors, deduplicated.
pub(crate) fn sorted_union(a: &[usize], b: &[usize]) -> Vec<usize> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        let next = match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => {
                let v = a[i];
                i += 1;
                v
            }
            std::cmp::Ordering::Greater => {
                let v = b[j];
                j += 1;
                v
            }
            std::cmp::Ordering::Equal => {
                let v = a[i];
                i += 1;
                j += 1;
                v
            }
        };
        if out.last() != Some(&next) {
            out.push(next);
        }
    }
    for &v in &a[i..] {
        if out.last() != Some(&v) {
            out.push(v);
        }
    }
    for &v in &b[j..] {
        if out.last() != Some(&v) {
            out.push(v);
        }
    }
    out
}

/// Difference `a \ b` of two sorted index vectors, deduplicated.
pub(crate) fn sorted_difference(a: &[usize], b: &[usize]) -> Vec<usize> {
    let mut out = Vec::new();
    let mut j = 0;
    for &v in a {
        while j < b.len() && b[j] < v {
            j += 1;
        }
        if j < b.len() && b[j] == v {
            continue;
        }
        if out.last() != Some(&v) {
            out.push(v);
        }
    }
    out
}
