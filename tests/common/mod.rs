#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use flate2::Compression;
use flate2::write::GzEncoder;
use serde_json::{Value, json};

use kira_sce_loader::container::RawValues;
use kira_sce_loader::container::memory::{MemoryDataset, MemoryGroup, MemoryNode};
use kira_sce_loader::error::ReaderError;
use kira_sce_loader::matrix::{
    CanonicalMatrix, CompressedBuffers, CompressedLayout, CountMatrix, DenseLayout, MatrixEngine,
};
use kira_sce_loader::store::MemoryStore;

pub const PLACEHOLDER: &str = "missing-value-placeholder";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Files of an object tree, keyed by forward-slash path.
#[derive(Debug, Default, Clone)]
pub struct Tree {
    files: BTreeMap<String, Vec<u8>>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(&mut self, path: &str, bytes: impl Into<Vec<u8>>) -> &mut Self {
        self.files.insert(path.to_string(), bytes.into());
        self
    }

    pub fn remove(&mut self, path: &str) -> &mut Self {
        self.files.remove(path);
        self
    }

    pub fn json(&mut self, path: &str, value: Value) -> &mut Self {
        self.file(path, serde_json::to_vec(&value).unwrap())
    }

    /// Writes `<path>/OBJECT` as `{"type": kind, kind: meta}`.
    pub fn object(&mut self, path: &str, kind: &str, meta: Value) -> &mut Self {
        let mut object = serde_json::Map::new();
        object.insert("type".to_string(), json!(kind));
        object.insert(kind.to_string(), meta);
        self.json(&format!("{path}/OBJECT"), Value::Object(object))
    }

    pub fn container(&mut self, path: &str, root: MemoryGroup) -> &mut Self {
        self.file(path, root.to_bytes())
    }

    pub fn names(&mut self, path: &str, names: &[&str]) -> &mut Self {
        self.json(&format!("{path}/names.json"), json!(names))
    }

    /// A data frame; columns given as `None` are left out of the container and are
    /// expected as nested tables under `other_columns/<i>`.
    pub fn data_frame(
        &mut self,
        path: &str,
        rows: usize,
        row_names: Option<&[&str]>,
        columns: Vec<(&str, Option<MemoryNode>)>,
    ) -> &mut Self {
        self.object(path, "data_frame", json!({"version": "1.0"}));
        let names = columns.iter().map(|(name, _)| name.to_string()).collect();
        let mut data = MemoryGroup::new();
        for (index, (_, node)) in columns.into_iter().enumerate() {
            if let Some(node) = node {
                data.children.push((index.to_string(), node));
            }
        }

        let mut frame = MemoryGroup::new()
            .attribute("row-count", RawValues::Integer(vec![rows as i64]))
            .dataset("column_names", MemoryDataset::new(RawValues::String(names)));
        if let Some(row_names) = row_names {
            frame = frame.dataset("row_names", MemoryDataset::new(strings(row_names)));
        }
        frame = frame.group("data", data);
        self.container(
            &format!("{path}/basic_columns.h5"),
            MemoryGroup::new().group("data_frame", frame),
        )
    }

    pub fn dense_array(
        &mut self,
        path: &str,
        shape: [usize; 2],
        values: RawValues,
        transposed: bool,
        placeholder: Option<RawValues>,
    ) -> &mut Self {
        self.object(path, "dense_array", json!({"version": "1.0"}));
        let mut data = MemoryDataset::new(values).with_shape(shape.to_vec());
        if let Some(placeholder) = placeholder {
            data = data.attribute(PLACEHOLDER, placeholder);
        }
        let mut group = MemoryGroup::new();
        if transposed {
            group = group.attribute("transposed", RawValues::Integer(vec![1]));
        }
        group = group.dataset("data", data);
        self.container(
            &format!("{path}/array.h5"),
            MemoryGroup::new().group("dense_array", group),
        )
    }

    pub fn sparse_matrix(
        &mut self,
        path: &str,
        shape: [usize; 2],
        layout: &str,
        data: RawValues,
        indices: &[i64],
        indptr: &[i64],
    ) -> &mut Self {
        self.object(path, "compressed_sparse_matrix", json!({"version": "1.0"}));
        let group = MemoryGroup::new()
            .attribute(
                "shape",
                RawValues::Integer(shape.iter().map(|x| *x as i64).collect()),
            )
            .attribute("layout", RawValues::String(vec![layout.to_string()]))
            .dataset("data", MemoryDataset::new(data))
            .dataset("indices", MemoryDataset::new(RawValues::Integer(indices.to_vec())))
            .dataset("indptr", MemoryDataset::new(RawValues::Integer(indptr.to_vec())));
        self.container(
            &format!("{path}/matrix.h5"),
            MemoryGroup::new().group("compressed_sparse_matrix", group),
        )
    }

    pub fn simple_list_binary(&mut self, path: &str, root: MemoryGroup) -> &mut Self {
        self.object(path, "simple_list", json!({"version": "1.0", "format": "hdf5"}));
        self.container(
            &format!("{path}/list.h5"),
            MemoryGroup::new().group("simple_list", root),
        )
    }

    pub fn simple_list_json(&mut self, path: &str, document: Value) -> &mut Self {
        self.object(path, "simple_list", json!({"version": "1.0", "format": "json.gz"}));
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(&serde_json::to_vec(&document).unwrap())
            .unwrap();
        self.file(&format!("{path}/list.json.gz"), encoder.finish().unwrap())
    }

    pub fn summarized_experiment(&mut self, path: &str, dimensions: [usize; 2]) -> &mut Self {
        self.object(
            path,
            "summarized_experiment",
            json!({"version": "1.0", "dimensions": dimensions}),
        )
    }

    pub fn single_cell_experiment(
        &mut self,
        path: &str,
        dimensions: [usize; 2],
        main_experiment_name: Option<&str>,
    ) -> &mut Self {
        let mut sce = json!({"version": "1.0"});
        if let Some(name) = main_experiment_name {
            sce["main_experiment_name"] = json!(name);
        }
        self.json(
            &format!("{path}/OBJECT"),
            json!({
                "type": "single_cell_experiment",
                "summarized_experiment": {"version": "1.0", "dimensions": dimensions},
                "single_cell_experiment": sce,
            }),
        )
    }

    pub fn to_store(&self) -> MemoryStore {
        let mut store = MemoryStore::new();
        for (path, bytes) in &self.files {
            store.insert(path.clone(), bytes.clone());
        }
        store
    }

    pub fn write_to(&self, root: &Path) {
        for (path, bytes) in &self.files {
            let full = root.join(path);
            if let Some(parent) = full.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(full, bytes).unwrap();
        }
    }
}

pub fn strings(values: &[&str]) -> RawValues {
    RawValues::String(values.iter().map(|x| x.to_string()).collect())
}

fn typed_column(kind: &str, values: RawValues, placeholder: Option<RawValues>) -> MemoryNode {
    let mut dataset =
        MemoryDataset::new(values).attribute("type", RawValues::String(vec![kind.to_string()]));
    if let Some(placeholder) = placeholder {
        dataset = dataset.attribute(PLACEHOLDER, placeholder);
    }
    MemoryNode::Dataset(dataset)
}

pub fn string_column(values: &[&str], placeholder: Option<&str>) -> MemoryNode {
    typed_column("string", strings(values), placeholder.map(|p| strings(&[p])))
}

pub fn integer_column(values: &[i64], placeholder: Option<i64>) -> MemoryNode {
    typed_column(
        "integer",
        RawValues::Integer(values.to_vec()),
        placeholder.map(|p| RawValues::Integer(vec![p])),
    )
}

pub fn number_column(values: &[f64], placeholder: Option<f64>) -> MemoryNode {
    typed_column(
        "number",
        RawValues::Float(values.to_vec()),
        placeholder.map(|p| RawValues::Float(vec![p])),
    )
}

pub fn boolean_column(values: &[i64], placeholder: Option<i64>) -> MemoryNode {
    typed_column(
        "boolean",
        RawValues::Integer(values.to_vec()),
        placeholder.map(|p| RawValues::Integer(vec![p])),
    )
}

pub fn factor_column(codes: &[i64], levels: &[&str], placeholder: Option<i64>) -> MemoryNode {
    let mut codes = MemoryDataset::new(RawValues::Integer(codes.to_vec()));
    if let Some(placeholder) = placeholder {
        codes = codes.attribute(PLACEHOLDER, RawValues::Integer(vec![placeholder]));
    }
    MemoryNode::Group(
        MemoryGroup::new()
            .attribute("type", strings(&["factor"]))
            .dataset("codes", codes)
            .dataset("levels", MemoryDataset::new(strings(levels))),
    )
}

pub fn list_vector(kind: &str, data: MemoryDataset) -> MemoryGroup {
    MemoryGroup::new()
        .attribute("uzuki_object", strings(&["vector"]))
        .attribute("uzuki_type", strings(&[kind]))
        .dataset("data", data)
}

pub fn list_factor(codes: &[i64], levels: &[&str], placeholder: Option<i64>) -> MemoryGroup {
    let mut data = MemoryDataset::new(RawValues::Integer(codes.to_vec()));
    if let Some(placeholder) = placeholder {
        data = data.attribute(PLACEHOLDER, RawValues::Integer(vec![placeholder]));
    }
    list_vector("factor", data).dataset("levels", MemoryDataset::new(strings(levels)))
}

pub fn list_nothing() -> MemoryGroup {
    MemoryGroup::new().attribute("uzuki_object", strings(&["nothing"]))
}

fn list_children(items: Vec<MemoryGroup>) -> MemoryGroup {
    items
        .into_iter()
        .enumerate()
        .fold(MemoryGroup::new(), |data, (index, item)| {
            data.group(&index.to_string(), item)
        })
}

pub fn list_named(entries: Vec<(&str, MemoryGroup)>) -> MemoryGroup {
    let names = entries.iter().map(|(name, _)| *name).collect::<Vec<_>>();
    let items = entries.into_iter().map(|(_, item)| item).collect();
    MemoryGroup::new()
        .attribute("uzuki_object", strings(&["list"]))
        .group("data", list_children(items))
        .dataset("names", MemoryDataset::new(strings(&names)))
}

pub fn list_unnamed(items: Vec<MemoryGroup>) -> MemoryGroup {
    MemoryGroup::new()
        .attribute("uzuki_object", strings(&["list"]))
        .group("data", list_children(items))
}

/// Gene counts of the main experiment, genes by cells, row-major. Cell 2 is empty.
pub const RNA_COUNTS: [f64; 12] = [
    1.0, 0.0, 0.0, //
    5.0, 2.0, 0.0, //
    10.0, 2.0, 0.0, //
    0.0, 4.0, 0.0,
];

/// Per-cell size factors stored in the main column annotations.
pub const SIZE_FACTORS: [f64; 3] = [1.0, 1.0, 2.0];

/// A single-cell experiment with three cells:
/// - main experiment "Gene Expression": 4 genes with row names and a `symbol`
///   column; assays `counts` (dense), `logcounts` (sparse CSC) and `delayed`
///   (unsupported kind);
/// - alternative 0 "Antibody Capture": 2 features with row names, CSR counts;
/// - alternative 1 "CRISPR Guide Capture": 2 guides without row annotations,
///   transposed dense counts;
/// - reduced dimensions `PCA` (4 axes), `TSNE` (2 axes) and `UMAP-ish` (not dense);
/// - metadata `{"version": "1"}`.
pub fn single_cell_tree(root: &str) -> Tree {
    let mut tree = Tree::new();
    tree.single_cell_experiment(root, [4, 3], Some("Gene Expression"))
        .data_frame(
            &format!("{root}/row_data"),
            4,
            Some(&["g1", "g2", "g3", "g4"]),
            vec![("symbol", Some(string_column(&["A", "B", "C", "D"], None)))],
        )
        .data_frame(
            &format!("{root}/column_data"),
            3,
            Some(&["c1", "c2", "c3"]),
            vec![
                ("sizeFactor", Some(number_column(&SIZE_FACTORS, None))),
                ("label", Some(string_column(&["x", "y", "z"], None))),
            ],
        )
        .names(&format!("{root}/assays"), &["counts", "logcounts", "delayed"])
        .dense_array(
            &format!("{root}/assays/0"),
            [4, 3],
            RawValues::Float(RNA_COUNTS.to_vec()),
            false,
            None,
        )
        .sparse_matrix(
            &format!("{root}/assays/1"),
            [4, 3],
            "CSC",
            RawValues::Float(vec![0.5, 1.5]),
            &[0, 3],
            &[0, 1, 2, 2],
        )
        .object(&format!("{root}/assays/2"), "delayed_array", json!({"version": "1.0"}))
        .simple_list_binary(
            &format!("{root}/other_data"),
            list_named(vec![(
                "version",
                list_vector("string", MemoryDataset::scalar(strings(&["1"]))),
            )]),
        );

    let alternatives = format!("{root}/alternative_experiments");
    tree.names(&alternatives, &["Antibody Capture", "CRISPR Guide Capture"])
        .summarized_experiment(&format!("{alternatives}/0"), [2, 3])
        .data_frame(
            &format!("{alternatives}/0/row_data"),
            2,
            Some(&["adt1", "adt2"]),
            vec![],
        )
        .names(&format!("{alternatives}/0/assays"), &["counts"])
        // [[3, 0, 1], [0, 7, 0]]
        .sparse_matrix(
            &format!("{alternatives}/0/assays/0"),
            [2, 3],
            "CSR",
            RawValues::Integer(vec![3, 1, 7]),
            &[0, 2, 1],
            &[0, 2, 3],
        )
        .summarized_experiment(&format!("{alternatives}/1"), [2, 3])
        .names(&format!("{alternatives}/1/assays"), &["counts"])
        // [[1, 0, 2], [0, 1, 2]]
        .dense_array(
            &format!("{alternatives}/1/assays/0"),
            [3, 2],
            RawValues::Integer(vec![1, 0, 0, 1, 2, 2]),
            true,
            None,
        );

    let reduced = format!("{root}/reduced_dimensions");
    tree.names(&reduced, &["PCA", "TSNE", "UMAP-ish"])
        .dense_array(
            &format!("{reduced}/0"),
            [4, 3],
            RawValues::Float((1..=12).map(f64::from).collect()),
            true,
            None,
        )
        .dense_array(
            &format!("{reduced}/1"),
            [2, 3],
            RawValues::Float(vec![0.1, 0.2, 0.3, -0.1, -0.2, -0.3]),
            true,
            None,
        )
        .object(
            &format!("{reduced}/2"),
            "compressed_sparse_matrix",
            json!({"version": "1.0"}),
        );

    tree
}

/// Matrix engine wrapper that counts live matrices.
#[derive(Debug, Clone, Default)]
pub struct CountingEngine {
    live: Arc<AtomicUsize>,
    built: Arc<AtomicUsize>,
}

impl CountingEngine {
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn built(&self) -> usize {
        self.built.load(Ordering::SeqCst)
    }

    fn track(&self, inner: CanonicalMatrix) -> Counted {
        self.live.fetch_add(1, Ordering::SeqCst);
        self.built.fetch_add(1, Ordering::SeqCst);
        Counted {
            inner,
            live: Arc::clone(&self.live),
        }
    }
}

#[derive(Debug)]
pub struct Counted {
    pub inner: CanonicalMatrix,
    live: Arc<AtomicUsize>,
}

impl Drop for Counted {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

impl CountMatrix for Counted {
    fn nrows(&self) -> usize {
        self.inner.nrows()
    }

    fn ncols(&self) -> usize {
        self.inner.ncols()
    }
}

impl MatrixEngine for CountingEngine {
    type Matrix = Counted;

    fn from_dense(
        &self,
        rows: usize,
        columns: usize,
        values: Vec<f64>,
        layout: DenseLayout,
        force_integer: bool,
    ) -> Result<Self::Matrix, ReaderError> {
        CanonicalMatrix::from_dense(rows, columns, &values, layout, force_integer)
            .map(|matrix| self.track(matrix))
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
            .map(|matrix| self.track(matrix))
    }

    fn log_normalize(
        &self,
        counts: &Self::Matrix,
        size_factors: Option<&[f64]>,
    ) -> Result<Self::Matrix, ReaderError> {
        counts
            .inner
            .log_normalize(size_factors)
            .map(|matrix| self.track(matrix))
    }
}
