// tests/precondition.rs

use std::collections::BTreeMap;

use taskflow::errors::TaskFlowError;
use taskflow::forward::{CompositeOutput, LeafOutput};
use taskflow::precondition::{GateTable, Precondition};
use taskflow::types::Tensor;
use taskflow_test_utils::builders::{column, mask, GroundTruthBuilder};

fn leaf_output(path: &str) -> LeafOutput {
    LeafOutput {
        path: path.to_string(),
        logits: column(&[0.0, 0.0]),
        activated: column(&[0.0, 0.0]),
        decoded: column(&[0.0, 0.0]),
    }
}

#[test]
fn test_leaf_negated_and_nested_masks() {
    let gt = GroundTruthBuilder::new()
        .with("a", &[true, true, false, false])
        .with("b", &[true, false, true, false])
        .build();

    let a = Precondition::leaf("a");
    assert_eq!(a.to_mask(&gt).unwrap(), mask(&[true, true, false, false]));
    assert_eq!((!a.clone()).to_mask(&gt).unwrap(), mask(&[false, false, true, true]));

    let nested = Precondition::nested("b", a.clone());
    assert_eq!(nested.to_mask(&gt).unwrap(), mask(&[true, false, false, false]));

    let and = !a & Precondition::leaf("b");
    assert_eq!(and.to_mask(&gt).unwrap(), mask(&[false, false, true, false]));
}

#[test]
fn test_decoded_tensors_as_mask_source() {
    let mut decoded: BTreeMap<String, Tensor> = BTreeMap::new();
    decoded.insert("a".to_string(), column(&[1.0, 0.0, 2.0]));

    let resolved = Precondition::leaf("a").to_mask(&decoded).unwrap();
    assert_eq!(resolved, mask(&[true, false, true]));
}

#[test]
fn test_multi_value_field_is_not_a_mask() {
    let mut decoded: BTreeMap<String, Tensor> = BTreeMap::new();
    decoded.insert(
        "a".to_string(),
        Tensor::from_shape_vec(vec![2, 2], vec![1.0, 0.0, 1.0, 1.0]).unwrap(),
    );

    assert!(matches!(
        Precondition::leaf("a").to_mask(&decoded),
        Err(TaskFlowError::ShapeMismatch(_))
    ));
}

#[test]
fn test_missing_field_is_an_error() {
    let gt = GroundTruthBuilder::new().with("a", &[true]).build();

    match Precondition::nested("b", Precondition::leaf("a")).to_mask(&gt) {
        Err(TaskFlowError::MissingField(path)) => assert_eq!(path, "b"),
        Err(e) => panic!("Expected MissingField, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_sources_and_display() {
    let p = Precondition::nested("inner.b", !Precondition::leaf("a")) & Precondition::leaf("a");
    assert_eq!(p.sources(), vec!["a", "inner.b"]);
    assert_eq!(p.to_string(), "((~a & inner.b) & a)");
}

#[test]
fn test_gate_table_resolve_wraps_gated_paths() {
    let mut table = GateTable::new();
    table.register("a", None).unwrap();
    table.register("b", None).unwrap();
    table.attach(Precondition::leaf("a")).unwrap();

    assert_eq!(table.resolve("a"), Precondition::leaf("a"));
    assert_eq!(
        table.resolve("b"),
        Precondition::nested("b", Precondition::leaf("a"))
    );
    assert_eq!(table.gated().count(), 1);
}

#[test]
fn test_attach_targets_only_last_merge() {
    let mut out = CompositeOutput::new("");
    out.merge(leaf_output("a")).unwrap();
    out.merge(leaf_output("b")).unwrap();
    out.attach(Precondition::leaf("a")).unwrap();

    assert!(out.precondition("a").is_none());
    assert_eq!(out.precondition("b"), Some(&Precondition::leaf("a")));
}

#[test]
fn test_attach_on_gated_child_ands_preconditions() {
    let mut child = CompositeOutput::new("inner.");
    child.merge(leaf_output("inner.local")).unwrap();
    child.merge(leaf_output("inner.target")).unwrap();
    child.attach(Precondition::leaf("inner.local")).unwrap();

    let mut root = CompositeOutput::new("");
    root.merge(leaf_output("gate")).unwrap();
    root.merge(child).unwrap();
    root.attach(Precondition::leaf("gate")).unwrap();

    assert_eq!(root.precondition("inner.local"), Some(&Precondition::leaf("gate")));
    assert_eq!(
        root.precondition("inner.target"),
        Some(&Precondition::leaf("inner.local").and(Precondition::leaf("gate")))
    );
}

#[test]
fn test_merge_collision_writes_nothing() {
    let mut child = CompositeOutput::new("x.");
    child.merge(leaf_output("x.fresh")).unwrap();
    child.merge(leaf_output("x.taken")).unwrap();

    let mut root = CompositeOutput::new("");
    root.merge(leaf_output("x.taken")).unwrap();

    match root.merge(child) {
        Err(TaskFlowError::DuplicateKey(path)) => assert_eq!(path, "x.taken"),
        Err(e) => panic!("Expected DuplicateKey, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
    assert!(!root.logits().contains_key("x.fresh"));
}

#[test]
fn test_gate_before_any_merge() {
    let mut out = CompositeOutput::new("");
    assert!(matches!(
        out.attach(Precondition::leaf("a")),
        Err(TaskFlowError::GateWithoutTarget)
    ));
}
