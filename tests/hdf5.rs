#![cfg(feature = "hdf5")]

use std::fs;
use std::path::Path;
use std::str::FromStr;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;
use hdf5::types::VarLenUnicode;

use kira_sce_loader::container::h5::Hdf5Engine;
use kira_sce_loader::container::{Container, ContainerEngine, NodeKind, RawValues};
use kira_sce_loader::error::ReaderError;
use kira_sce_loader::navigator::Navigator;
use kira_sce_loader::store::LocalStore;
use kira_sce_loader::table::{Column, read_table};
use kira_sce_loader::values::Values;

fn unicode(values: &[&str]) -> Vec<VarLenUnicode> {
    values
        .iter()
        .map(|value| VarLenUnicode::from_str(value).unwrap())
        .collect()
}

fn string_attribute(location: &hdf5::Location, name: &str, value: &str) {
    location
        .new_attr::<VarLenUnicode>()
        .create(name)
        .and_then(|attr| attr.write_scalar(&VarLenUnicode::from_str(value).unwrap()))
        .unwrap();
}

fn write_data_frame(path: &Path) {
    let file = hdf5::File::create(path).unwrap();
    let frame = file.create_group("data_frame").unwrap();
    frame
        .new_attr::<i64>()
        .create("row-count")
        .and_then(|attr| attr.write_scalar(&3_i64))
        .unwrap();
    frame
        .new_dataset_builder()
        .with_data(&unicode(&["symbol", "score"]))
        .create("column_names")
        .unwrap();
    frame
        .new_dataset_builder()
        .with_data(&unicode(&["g1", "g2", "g3"]))
        .create("row_names")
        .unwrap();

    let data = frame.create_group("data").unwrap();
    let symbols = data
        .new_dataset_builder()
        .with_data(&unicode(&["A", "B", "C"]))
        .create("0")
        .unwrap();
    string_attribute(&symbols, "type", "string");
    let scores = data
        .new_dataset_builder()
        .with_data(&vec![0.5_f64, 1.5, 2.5])
        .create("1")
        .unwrap();
    string_attribute(&scores, "type", "number");
}

#[test]
fn hdf5_handle_exposes_groups_datasets_and_attributes() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("basic_columns.h5");
    write_data_frame(&path);

    let handle = Hdf5Engine::new().open(fs::read(&path).unwrap()).unwrap();
    assert_eq!(
        handle.children("").unwrap(),
        vec![("data_frame".to_string(), NodeKind::Group)]
    );
    assert_eq!(
        handle.child_kind("data_frame", "column_names").unwrap(),
        Some(NodeKind::Dataset)
    );
    assert_eq!(
        handle.attribute("data_frame", "row-count").unwrap(),
        Some(RawValues::Integer(vec![3]))
    );
    assert_eq!(handle.attribute("data_frame", "absent").unwrap(), None);
    assert_eq!(handle.shape("data_frame/data/1").unwrap(), vec![3]);
    assert_eq!(
        handle.read_range("data_frame/data/1", 1, 2).unwrap(),
        RawValues::Float(vec![1.5, 2.5])
    );
    assert_eq!(
        handle.read("data_frame/row_names").unwrap(),
        RawValues::String(vec!["g1".into(), "g2".into(), "g3".into()])
    );
}

#[test]
fn table_reads_from_hdf5_files() {
    let temp = tempfile::tempdir().unwrap();
    let frame = temp.path().join("rowdata");
    fs::create_dir_all(&frame).unwrap();
    fs::write(
        frame.join("OBJECT"),
        r#"{"type": "data_frame", "data_frame": {"version": "1.0"}}"#,
    )
    .unwrap();
    write_data_frame(&frame.join("basic_columns.h5"));

    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    let navigator = Navigator::new(LocalStore::new(root), Hdf5Engine::new());
    let table = read_table("rowdata", &navigator).unwrap();

    assert_eq!(table.number_of_rows(), 3);
    assert_eq!(table.column_names(), vec!["symbol", "score"]);
    assert_eq!(
        table.column("score"),
        Some(&Column::Number(Values::Dense(vec![0.5, 1.5, 2.5])))
    );
}

#[test]
fn garbage_bytes_are_a_container_error() {
    let err = Hdf5Engine::new().open(b"not an hdf5 file".to_vec()).unwrap_err();
    assert_matches!(err, ReaderError::Container(message) if message.contains("cannot open"));
}
