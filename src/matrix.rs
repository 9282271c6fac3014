use crate::error::ReaderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenseLayout {
    ColumnMajor,
    RowMajor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressedLayout {
    Csc,
    Csr,
}

impl CompressedLayout {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "CSC" => Some(CompressedLayout::Csc),
            "CSR" => Some(CompressedLayout::Csr),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompressedBuffers {
    pub values: Vec<f64>,
    pub indices: Vec<usize>,
    pub indptr: Vec<usize>,
}

pub trait CountMatrix {
    fn nrows(&self) -> usize;
    fn ncols(&self) -> usize;
}

pub trait MatrixEngine: Send + Sync {
    type Matrix: CountMatrix;

    fn from_dense(
        &self,
        rows: usize,
        columns: usize,
        values: Vec<f64>,
        layout: DenseLayout,
        force_integer: bool,
    ) -> Result<Self::Matrix, ReaderError>;

    fn from_compressed(
        &self,
        rows: usize,
        columns: usize,
        buffers: CompressedBuffers,
        layout: CompressedLayout,
        force_integer: bool,
    ) -> Result<Self::Matrix, ReaderError>;

    fn log_normalize(
        &self,
        counts: &Self::Matrix,
        size_factors: Option<&[f64]>,
    ) -> Result<Self::Matrix, ReaderError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalMatrix {
    nrows: usize,
    ncols: usize,
    indptr: Vec<usize>,
    indices: Vec<usize>,
    values: Vec<f64>,
    integer: bool,
}

fn truncate(value: f64, force_integer: bool) -> f64 {
    if force_integer { value.trunc() } else { value }
}

impl CanonicalMatrix {
    pub fn from_dense(
        rows: usize,
        columns: usize,
        values: &[f64],
        layout: DenseLayout,
        force_integer: bool,
    ) -> Result<Self, ReaderError> {
        if values.len() != rows * columns {
            return Err(ReaderError::Matrix(format!(
                "dense buffer has {} values, expected {rows} x {columns}",
                values.len()
            )));
        }

        let mut indptr = Vec::with_capacity(columns + 1);
        let mut indices = Vec::new();
        let mut stored = Vec::new();
        indptr.push(0);
        for c in 0..columns {
            for r in 0..rows {
                let value = match layout {
                    DenseLayout::ColumnMajor => values[c * rows + r],
                    DenseLayout::RowMajor => values[r * columns + c],
                };
                let value = truncate(value, force_integer);
                if value != 0.0 {
                    indices.push(r);
                    stored.push(value);
                }
            }
            indptr.push(indices.len());
        }

        Ok(Self {
            nrows: rows,
            ncols: columns,
            indptr,
            indices,
            values: stored,
            integer: force_integer,
        })
    }

    pub fn from_compressed(
        rows: usize,
        columns: usize,
        buffers: CompressedBuffers,
        layout: CompressedLayout,
        force_integer: bool,
    ) -> Result<Self, ReaderError> {
        let (primary, secondary) = match layout {
            CompressedLayout::Csc => (columns, rows),
            CompressedLayout::Csr => (rows, columns),
        };
        validate_compressed(&buffers, primary, secondary)?;

        let CompressedBuffers {
            values,
            indices,
            indptr,
        } = buffers;
        let values = values
            .into_iter()
            .map(|x| truncate(x, force_integer))
            .collect::<Vec<_>>();

        let matrix = match layout {
            CompressedLayout::Csc => Self {
                nrows: rows,
                ncols: columns,
                indptr,
                indices,
                values,
                integer: force_integer,
            },
            CompressedLayout::Csr => {
                let mut counts = vec![0usize; columns + 1];
                for &c in &indices {
                    counts[c + 1] += 1;
                }
                for c in 0..columns {
                    counts[c + 1] += counts[c];
                }
                let mut next = counts.clone();
                let mut out_indices = vec![0usize; indices.len()];
                let mut out_values = vec![0.0; values.len()];
                for r in 0..rows {
                    for k in indptr[r]..indptr[r + 1] {
                        let c = indices[k];
                        out_indices[next[c]] = r;
                        out_values[next[c]] = values[k];
                        next[c] += 1;
                    }
                }
                Self {
                    nrows: rows,
                    ncols: columns,
                    indptr: counts,
                    indices: out_indices,
                    values: out_values,
                    integer: force_integer,
                }
            }
        };
        Ok(matrix)
    }

    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    pub fn is_integer(&self) -> bool {
        self.integer
    }

    pub fn get(&self, row: usize, column: usize) -> f64 {
        if row >= self.nrows || column >= self.ncols {
            return 0.0;
        }
        (self.indptr[column]..self.indptr[column + 1])
            .find(|&k| self.indices[k] == row)
            .map(|k| self.values[k])
            .unwrap_or(0.0)
    }

    pub fn column(&self, column: usize) -> Vec<f64> {
        let mut out = vec![0.0; self.nrows];
        if column < self.ncols {
            for k in self.indptr[column]..self.indptr[column + 1] {
                out[self.indices[k]] = self.values[k];
            }
        }
        out
    }

    pub fn column_sums(&self) -> Vec<f64> {
        (0..self.ncols)
            .map(|c| self.values[self.indptr[c]..self.indptr[c + 1]].iter().sum())
            .collect()
    }

    // log2(x / sf + 1), size factors centered to mean one. Zero factors take the
    // smallest positive factor.
    pub fn log_normalize(&self, size_factors: Option<&[f64]>) -> Result<Self, ReaderError> {
        let mut factors = match size_factors {
            Some(factors) => {
                if factors.len() != self.ncols {
                    return Err(ReaderError::Matrix(format!(
                        "{} size factors supplied for {} columns",
                        factors.len(),
                        self.ncols
                    )));
                }
                factors.to_vec()
            }
            None => self.column_sums(),
        };
        if factors.iter().any(|x| !x.is_finite() || *x < 0.0) {
            return Err(ReaderError::Matrix(
                "size factors must be finite and non-negative".to_string(),
            ));
        }

        let smallest = factors
            .iter()
            .copied()
            .filter(|x| *x > 0.0)
            .fold(f64::INFINITY, f64::min);
        let replacement = if smallest.is_finite() { smallest } else { 1.0 };
        for factor in factors.iter_mut() {
            if *factor == 0.0 {
                *factor = replacement;
            }
        }
        if !factors.is_empty() {
            let mean = factors.iter().sum::<f64>() / factors.len() as f64;
            for factor in factors.iter_mut() {
                *factor /= mean;
            }
        }

        let mut values = self.values.clone();
        for c in 0..self.ncols {
            for value in &mut values[self.indptr[c]..self.indptr[c + 1]] {
                *value = (*value / factors[c] + 1.0).log2();
            }
        }

        Ok(Self {
            nrows: self.nrows,
            ncols: self.ncols,
            indptr: self.indptr.clone(),
            indices: self.indices.clone(),
            values,
            integer: false,
        })
    }
}

fn validate_compressed(
    buffers: &CompressedBuffers,
    primary: usize,
    secondary: usize,
) -> Result<(), ReaderError> {
    let CompressedBuffers {
        values,
        indices,
        indptr,
    } = buffers;
    if indptr.len() != primary + 1 {
        return Err(ReaderError::Matrix(format!(
            "pointer array has length {}, expected {}",
            indptr.len(),
            primary + 1
        )));
    }
    if values.len() != indices.len() {
        return Err(ReaderError::Matrix(
            "values and indices differ in length".to_string(),
        ));
    }
    if indptr.first() != Some(&0) || indptr.last() != Some(&indices.len()) {
        return Err(ReaderError::Matrix(
            "pointer array does not span the stored values".to_string(),
        ));
    }
    if indptr.windows(2).any(|pair| pair[0] > pair[1]) {
        return Err(ReaderError::Matrix("pointer array is not sorted".to_string()));
    }
    if let Some(bad) = indices.iter().find(|&&index| index >= secondary) {
        return Err(ReaderError::Matrix(format!(
            "index {bad} out of range for extent {secondary}"
        )));
    }
    Ok(())
}

impl CountMatrix for CanonicalMatrix {
    fn nrows(&self) -> usize {
        self.nrows
    }

    fn ncols(&self) -> usize {
        self.ncols
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NativeEngine;

impl MatrixEngine for NativeEngine {
    type Matrix = CanonicalMatrix;

    fn from_dense(
        &self,
        rows: usize,
        columns: usize,
        values: Vec<f64>,
        layout: DenseLayout,
        force_integer: bool,
    ) -> Result<Self::Matrix, ReaderError> {
        CanonicalMatrix::from_dense(rows, columns, &values, layout, force_integer)
    }

    fn from_compressed(
        &self,
        rows: usize,
        columns: usize,
        buffers: CompressedBuffers,
        layout: CompressedLayout,
        force_integer: bool,
    ) -> Result<Self::Matrix, ReaderError> {
        CanonicalMatrix::from_compressed(rows, columns, buffers, layout, force_integer)
    }

    fn log_normalize(
        &self,
        counts: &Self::Matrix,
        size_factors: Option<&[f64]>,
    ) -> Result<Self::Matrix, ReaderError> {
        counts.log_normalize(size_factors)
    }
}

#[derive(Debug)]
pub struct MatrixEntry<M> {
    name: String,
    counts: M,
    normalized: Option<M>,
}

impl<M> MatrixEntry<M> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn counts(&self) -> &M {
        &self.counts
    }

    pub fn normalized(&self) -> Option<&M> {
        self.normalized.as_ref()
    }

    pub fn preferred(&self) -> &M {
        self.normalized.as_ref().unwrap_or(&self.counts)
    }
}

#[derive(Debug)]
pub struct MultiMatrix<M> {
    entries: Vec<MatrixEntry<M>>,
}

impl<M> Default for MultiMatrix<M> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<M: CountMatrix> MultiMatrix<M> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: &str, counts: M) {
        let entry = MatrixEntry {
            name: name.to_string(),
            counts,
            normalized: None,
        };
        match self.entries.iter_mut().find(|existing| existing.name == name) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    pub fn add_normalized(&mut self, name: &str, normalized: M) -> Result<(), ReaderError> {
        let entry = self
            .entries
            .iter_mut()
            .find(|existing| existing.name == name)
            .ok_or_else(|| ReaderError::Matrix(format!("no counts stored under '{name}'")))?;
        entry.normalized = Some(normalized);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&M> {
        self.entry(name).map(MatrixEntry::preferred)
    }

    pub fn entry(&self, name: &str) -> Option<&MatrixEntry<M>> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    pub fn available(&self) -> Vec<&str> {
        self.entries.iter().map(|entry| entry.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn number_of_columns(&self) -> Option<usize> {
        self.entries.first().map(|entry| entry.counts.ncols())
    }

    pub fn free(&mut self) {
        self.entries.clear();
    }
}
