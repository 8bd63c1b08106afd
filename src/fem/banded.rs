use crate::fem::FemError;
use nalgebra::DVector;

/// Square matrix with a symmetric band of `half_bandwidth` diagonals either side of the
/// main diagonal, stored row by row.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct BandMatrix {
    n: usize,
    half_bandwidth: usize,
    data: Vec<f64>,
}

impl BandMatrix {
    pub(crate) fn zeros(n: usize, half_bandwidth: usize) -> Self {
        Self {
            n,
            half_bandwidth,
            data: vec![0.; n * (2 * half_bandwidth + 1)],
        }
    }

    pub(crate) fn dim(&self) -> usize {
        self.n
    }

    fn offset(&self, row: usize, col: usize) -> Option<usize> {
        let w = self.half_bandwidth;
        if row >= self.n || col >= self.n || col + w < row || col > row + w {
            return None;
        }
        Some(row * (2 * w + 1) + col + w - row)
    }

    pub(crate) fn get(&self, row: usize, col: usize) -> f64 {
        self.offset(row, col).map_or(0., |idx| self.data[idx])
    }

    /// Accumulate into an entry. Entries outside the band are an assembly bug.
    pub(crate) fn add(&mut self, row: usize, col: usize, value: f64) {
        let idx = self.offset(row, col);
        debug_assert!(idx.is_some(), "entry ({row}, {col}) lies outside the band");
        if let Some(idx) = idx {
            self.data[idx] += value;
        }
    }

    /// Replace a row by the corresponding row of the identity matrix.
    pub(crate) fn set_identity_row(&mut self, row: usize) {
        let w = self.half_bandwidth;
        let start = row * (2 * w + 1);
        self.data[start..start + 2 * w + 1].fill(0.);
        self.data[start + w] = 1.;
    }

    #[cfg(test)]
    pub(crate) fn mul_vec(&self, x: &DVector<f64>) -> DVector<f64> {
        let w = self.half_bandwidth;
        DVector::from_fn(self.n, |row, _| {
            let lo = row.saturating_sub(w);
            let hi = (row + w).min(self.n - 1);
            (lo..=hi).map(|col| self.get(row, col) * x[col]).sum()
        })
    }

    /// In-place LU factorisation without pivoting. The band structure is preserved,
    /// which holds for the diagonally dominated operators assembled here.
    pub(crate) fn factorise(mut self) -> Result<BandLu, FemError> {
        let n = self.n;
        let w = self.half_bandwidth;
        let row_len = 2 * w + 1;

        for k in 0..n {
            let pivot = self.data[k * row_len + w];
            if pivot.abs() < f64::MIN_POSITIVE || !pivot.is_finite() {
                return Err(FemError::ZeroPivot { row: k });
            }
            let last = (k + w).min(n - 1);
            for i in k + 1..=last {
                let ik = i * row_len + k + w - i;
                if self.data[ik] == 0. {
                    continue;
                }
                let factor = self.data[ik] / pivot;
                self.data[ik] = factor;
                for j in k + 1..=last {
                    let kj = self.data[k * row_len + j + w - k];
                    if kj != 0. {
                        self.data[i * row_len + j + w - i] -= factor * kj;
                    }
                }
            }
        }

        Ok(BandLu { factors: self })
    }
}

/// Packed L and U factors (unit lower triangle implied) of a [`BandMatrix`].
#[derive(Clone, Debug)]
pub(crate) struct BandLu {
    factors: BandMatrix,
}

impl BandLu {
    pub(crate) fn solve_into(&self, rhs: &DVector<f64>, solution: &mut DVector<f64>) {
        let lu = &self.factors;
        let n = lu.n;
        let w = lu.half_bandwidth;

        solution.copy_from(rhs);

        for i in 0..n {
            let lo = i.saturating_sub(w);
            let sum: f64 = (lo..i).map(|j| lu.get(i, j) * solution[j]).sum();
            solution[i] -= sum;
        }

        for i in (0..n).rev() {
            let hi = (i + w).min(n - 1);
            let sum: f64 = (i + 1..=hi).map(|j| lu.get(i, j) * solution[j]).sum();
            solution[i] = (solution[i] - sum) / lu.get(i, i);
        }
    }
}
