use faer::Mat;

pub type DenseMatrix = Mat<f64>;

const SINGULAR_PIVOT_EPSILON: f64 = 1.0e-300;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinearSolveError {
    #[error("LU factorization requires a square matrix, got {rows}x{cols}")]
    NonSquareMatrix { rows: usize, cols: usize },
    #[error("LU factorization requires a non-empty matrix")]
    EmptyMatrix,
    #[error("matrix is singular at pivot index {pivot_index}")]
    SingularMatrix { pivot_index: usize },
    #[error("right-hand side length mismatch: expected {expected}, got {actual}")]
    RhsLengthMismatch { expected: usize, actual: usize },
}

/// Row-pivoted LU factors of a square real matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct LuDecomposition {
    lu: DenseMatrix,
    pivots: Vec<usize>,
}

impl LuDecomposition {
    pub fn dimension(&self) -> usize {
        self.lu.nrows()
    }

    pub fn pivots(&self) -> &[usize] {
        &self.pivots
    }

    pub fn solve(&self, rhs: &[f64]) -> Result<Vec<f64>, LinearSolveError> {
        let dimension = self.dimension();
        if rhs.len() != dimension {
            return Err(LinearSolveError::RhsLengthMismatch {
                expected: dimension,
                actual: rhs.len(),
            });
        }

        let mut forward = vec![0.0; dimension];
        for row in 0..dimension {
            let mut value = rhs[self.pivots[row]];
            for col in 0..row {
                value -= self.lu[(row, col)] * forward[col];
            }
            forward[row] = value;
        }

        let mut solution = vec![0.0; dimension];
        for row in (0..dimension).rev() {
            let mut value = forward[row];
            for col in (row + 1)..dimension {
                value -= self.lu[(row, col)] * solution[col];
            }
            solution[row] = value / self.lu[(row, row)];
        }

        Ok(solution)
    }
}

pub fn lu_factorize(matrix: &DenseMatrix) -> Result<LuDecomposition, LinearSolveError> {
    let dimension = validate_square_shape(matrix)?;
    let mut lu = matrix.clone();
    let mut pivots: Vec<usize> = (0..dimension).collect();

    for pivot_col in 0..dimension {
        let pivot_row = select_pivot_row(&lu, pivot_col);
        let magnitude = lu[(pivot_row, pivot_col)].abs();
        if magnitude <= SINGULAR_PIVOT_EPSILON {
            return Err(LinearSolveError::SingularMatrix {
                pivot_index: pivot_col,
            });
        }

        if pivot_row != pivot_col {
            swap_rows(&mut lu, pivot_col, pivot_row);
            pivots.swap(pivot_col, pivot_row);
        }

        let pivot = lu[(pivot_col, pivot_col)];
        for row in (pivot_col + 1)..dimension {
            lu[(row, pivot_col)] /= pivot;
            let multiplier = lu[(row, pivot_col)];
            for col in (pivot_col + 1)..dimension {
                let updated = lu[(row, col)] - multiplier * lu[(pivot_col, col)];
                lu[(row, col)] = updated;
            }
        }
    }

    Ok(LuDecomposition { lu, pivots })
}

pub fn lu_solve(matrix: &DenseMatrix, rhs: &[f64]) -> Result<Vec<f64>, LinearSolveError> {
    lu_factorize(matrix)?.solve(rhs)
}

/// Linear least squares through the normal equations `(AᵀA) c = Aᵀb`.
///
/// `design` holds one row of basis values per observation.
pub fn solve_least_squares(
    design: &[Vec<f64>],
    observed: &[f64],
) -> Result<Vec<f64>, LinearSolveError> {
    if design.len() != observed.len() {
        return Err(LinearSolveError::RhsLengthMismatch {
            expected: design.len(),
            actual: observed.len(),
        });
    }
    let terms = design.first().map_or(0, |row| row.len());
    let mut normal = DenseMatrix::zeros(terms, terms);
    let mut rhs = vec![0.0; terms];
    for (row, value) in design.iter().zip(observed) {
        for i in 0..terms {
            rhs[i] += row[i] * value;
            for j in 0..=i {
                normal[(i, j)] += row[i] * row[j];
            }
        }
    }
    for i in 0..terms {
        for j in 0..i {
            normal[(j, i)] = normal[(i, j)];
        }
    }
    lu_solve(&normal, &rhs)
}

fn validate_square_shape(matrix: &DenseMatrix) -> Result<usize, LinearSolveError> {
    let rows = matrix.nrows();
    let cols = matrix.ncols();
    if rows == 0 || cols == 0 {
        return Err(LinearSolveError::EmptyMatrix);
    }
    if rows != cols {
        return Err(LinearSolveError::NonSquareMatrix { rows, cols });
    }

    Ok(rows)
}

fn select_pivot_row(matrix: &DenseMatrix, pivot_col: usize) -> usize {
    let mut best_row = pivot_col;
    let mut best = matrix[(pivot_col, pivot_col)].abs();

    for row in (pivot_col + 1)..matrix.nrows() {
        let candidate = matrix[(row, pivot_col)].abs();
        if candidate > best {
            best = candidate;
            best_row = row;
        }
    }

    best_row
}

fn swap_rows(matrix: &mut DenseMatrix, lhs: usize, rhs: usize) {
    for col in 0..matrix.ncols() {
        let value = matrix[(lhs, col)];
        matrix[(lhs, col)] = matrix[(rhs, col)];
        matrix[(rhs, col)] = value;
    }
}
