// tests/task_graph.rs

use std::sync::Arc;

use taskflow::errors::TaskFlowError;
use taskflow::forward::FlowInputs;
use taskflow::precondition::Precondition;
use taskflow::task::{LeafTask, Metric, Task, TaskFlow, TaskKind};
use taskflow::types::{Mask, Mode, Tensor};
use taskflow_test_utils::graphs::{nested_conditional_flow, simple_conditional_flow, yolo_anchor_flow};

struct Accuracy;

impl Metric for Accuracy {
    fn compute(&self, _activated: &Tensor, _targets: &Tensor, _mask: Option<&Mask>) -> taskflow::errors::Result<f32> {
        Ok(1.0)
    }
}

#[test]
fn test_duplicate_child_is_rejected() {
    let result = TaskFlow::builder("dup")
        .task(LeafTask::binary("a"))
        .task(LeafTask::regression("a"))
        .build();

    match result {
        Err(TaskFlowError::DuplicateChild { flow, child }) => {
            assert_eq!(flow, "dup");
            assert_eq!(child, "a");
        }
        Err(e) => panic!("Expected DuplicateChild, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_flow_without_definition_is_unimplemented() {
    let flow = TaskFlow::builder("abstract")
        .task(LeafTask::binary("a"))
        .build()
        .unwrap();

    match flow.forward(&FlowInputs::default(), Mode::Inference) {
        Err(TaskFlowError::UnimplementedFlow(name)) => assert_eq!(name, "abstract"),
        Err(e) => panic!("Expected UnimplementedFlow, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_unknown_child_is_rejected() {
    let flow = TaskFlow::builder("typo")
        .task(LeafTask::binary("is_car"))
        .flow(|out| {
            out.add("is_cat")?;
            Ok(())
        })
        .build()
        .unwrap();

    match flow.trace() {
        Err(TaskFlowError::UnknownTask { flow, task }) => {
            assert_eq!(flow, "typo");
            assert_eq!(task, "is_cat");
        }
        Err(e) => panic!("Expected UnknownTask, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_all_children_flattens_nested_flows() {
    let flow = nested_conditional_flow();

    assert_eq!(
        flow.leaf_paths(),
        vec!["outer_gate", "inner.inner_local", "inner.inner_target"]
    );
    assert_eq!(flow.labels(), vec!["outer_gate", "inner_local", "inner_target"]);
    assert_eq!(
        flow.inputs(),
        vec!["outer_gate_logits", "inner_local_logits", "features"]
    );
    assert!(flow.child("inner").unwrap().has_children());
    assert!(!flow.child("outer_gate").unwrap().has_children());
}

#[test]
fn test_leaf_flavors_follow_kind() {
    let binary = LeafTask::binary("b");
    assert!(binary.activation().is_some());
    assert!(binary.loss().is_some());

    let hardcoded = LeafTask::binary_hardcoded("h");
    assert!(hardcoded.activation().is_none());
    assert!(hardcoded.loss().is_none());
    assert!(hardcoded.decoder().is_some());

    let regression = LeafTask::regression("r");
    assert!(regression.decoder().is_none());
    assert_eq!(regression.labels(), "r");
    assert_eq!(regression.kind(), TaskKind::Regression);

    assert_eq!("bounded_regression".parse::<TaskKind>().unwrap(), TaskKind::BoundedRegression);
    assert!("ranking".parse::<TaskKind>().is_err());
}

#[test]
fn test_flow_metrics_are_keyed_by_path() {
    let inner = TaskFlow::builder("inner")
        .task(LeafTask::binary("x").with_metric("accuracy", Arc::new(Accuracy)))
        .build()
        .unwrap();
    let flow = TaskFlow::builder("outer")
        .task(LeafTask::regression("y"))
        .task(inner)
        .build()
        .unwrap();

    let metrics = flow.metrics();
    assert_eq!(metrics.len(), 1);
    assert_eq!(metrics[0].0, "inner.x");
    assert_eq!(metrics[0].1.name, "accuracy");
}

#[test]
fn test_nested_task_metrics_share_leaf_paths() {
    let inner = TaskFlow::builder("inner")
        .task(LeafTask::binary("x").with_metric("accuracy", Arc::new(Accuracy)))
        .task(LeafTask::regression("y"))
        .build()
        .unwrap();
    let task = Task::from(inner);

    let leaf_paths: Vec<String> = task.leaves().into_iter().map(|(path, _)| path).collect();
    let metric_paths: Vec<String> = task.metrics().into_iter().map(|(path, _)| path).collect();

    assert_eq!(leaf_paths, vec!["inner.x", "inner.y"]);
    assert_eq!(metric_paths, vec!["inner.x"]);
    assert!(metric_paths.iter().all(|p| leaf_paths.contains(p)));

    let leaf = Task::from(LeafTask::binary("z").with_metric("accuracy", Arc::new(Accuracy)));
    assert_eq!(leaf.metrics()[0].0, "z");
}

#[test]
fn test_trace_records_paths_and_gates() {
    let gates = nested_conditional_flow().trace().unwrap();

    let paths: Vec<&str> = gates.paths().collect();
    assert_eq!(paths, vec!["inner.inner_local", "inner.inner_target", "outer_gate"]);
    assert_eq!(gates.get("inner.inner_local"), Some(&Precondition::leaf("outer_gate")));
    assert_eq!(
        gates.get("inner.inner_target").map(|p| p.to_string()),
        Some("(inner.inner_local & outer_gate)".to_string())
    );
    assert!(gates.get("outer_gate").is_none());
}

#[test]
fn test_trace_rejects_gate_on_task_not_yet_added() {
    let flow = TaskFlow::builder("backwards")
        .task(LeafTask::binary("gate"))
        .task(LeafTask::regression("value"))
        .flow(|out| {
            let gate = out.precondition_for("gate");
            out.add("value")?.gate(gate)?;
            out.add("gate")?;
            Ok(())
        })
        .build()
        .unwrap();

    match flow.trace() {
        Err(TaskFlowError::UnknownTask { task, .. }) => assert_eq!(task, "gate"),
        Err(e) => panic!("Expected UnknownTask, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_trace_of_stock_graphs() {
    assert_eq!(simple_conditional_flow().trace().unwrap().gated().count(), 2);
    assert_eq!(yolo_anchor_flow().trace().unwrap().gated().count(), 3);
}
