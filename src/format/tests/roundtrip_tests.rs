//! Serialize-then-parse tests through the annotation buffer.

use std::cell::RefCell;
use std::rc::Rc;

use proptest::prelude::*;

use super::create_labels;
use crate::annotation::{AnnotationManager, LabelManager};
use crate::constants::NEUTRAL_CLASS_CODE;
use crate::format::{AnnotationFileSerializer, GenericAnnotationFileParser, SerializerUtf8v1};
use crate::model::{ClassCode, LabelRef};

/// Serialize `data`, parse it back with tiny chunks and load it into a fresh buffer.
fn round_trip(data: &[ClassCode], labels: &[LabelRef], chunk_size: usize) -> Vec<ClassCode> {
    let mut file = Vec::new();
    SerializerUtf8v1::new(labels)
        .with_buffer_size(7)
        .serialize(data, &mut file)
        .unwrap();

    let parsed = GenericAnnotationFileParser::new(labels)
        .with_chunk_size(chunk_size)
        .parse(file.as_slice())
        .unwrap();
    assert_eq!(parsed.count, data.len());

    let label_manager = Rc::new(RefCell::new(LabelManager::new(labels.to_vec()).unwrap()));
    let mut annotations = AnnotationManager::new(parsed.count, label_manager);
    annotations.load_annotations(&parsed.selections);
    annotations.annotations().to_vec()
}

#[test]
fn test_round_trip_scenario() {
    let labels = create_labels(2);
    let n = NEUTRAL_CLASS_CODE;
    let data = vec![0, n, 1, n, n, n, 1, n, n, n];
    assert_eq!(round_trip(&data, &labels, 3), data);
}

#[test]
fn test_round_trip_empty_buffer() {
    let labels = create_labels(3);
    assert!(round_trip(&[], &labels, 1).is_empty());
}

#[test]
fn test_export_matches_file_blocks() {
    let labels = create_labels(3);
    let label_manager = Rc::new(RefCell::new(LabelManager::new(labels.clone()).unwrap()));
    let mut annotations = AnnotationManager::new(6, label_manager);
    annotations.annotate_with_label(&labels[2], &[5, 1]);
    annotations.annotate_with_label(&labels[0], &[3]);

    let mut file = Vec::new();
    SerializerUtf8v1::new(&labels)
        .serialize(annotations.annotations(), &mut file)
        .unwrap();
    let parsed = GenericAnnotationFileParser::new(&labels).parse(file.as_slice()).unwrap();

    let exported: Vec<(ClassCode, Vec<u32>)> = annotations
        .labeled_annotations()
        .unwrap()
        .into_iter()
        .filter(|selection| !selection.label.is_neutral())
        .map(|selection| (selection.label.class_code(), selection.indices))
        .collect();
    let from_file: Vec<(ClassCode, Vec<u32>)> = parsed
        .selections
        .into_iter()
        .filter(|selection| !selection.is_empty())
        .map(|selection| (selection.label.class_code(), selection.indices))
        .collect();
    assert_eq!(exported, from_file);
}

fn buffer_strategy() -> impl Strategy<Value = (u32, Vec<ClassCode>)> {
    (1u32..6).prop_flat_map(|label_count| {
        let class = prop_oneof![
            3 => (0..label_count).prop_map(|c| c as ClassCode),
            1 => Just(NEUTRAL_CLASS_CODE),
        ];
        (Just(label_count), prop::collection::vec(class, 0..200))
    })
}

proptest! {
    #[test]
    fn prop_parse_inverts_serialize((label_count, data) in buffer_strategy(), chunk_size in 1usize..64) {
        let labels = create_labels(label_count);
        prop_assert_eq!(round_trip(&data, &labels, chunk_size), data);
    }
}
