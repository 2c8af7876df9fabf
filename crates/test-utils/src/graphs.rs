//! Ready-made task graphs shared by the integration tests.
//!
//! Gate tasks read their logits from a dedicated `<name>_logits` column, so
//! a test controls the decoded gate directly: positive logits decode to
//! `true`, negative ones to `false`. Regression leaves read `features`.

use taskflow::task::{LeafTask, TaskFlow};

/// `is_positive`, then `positive_func` gated by it and `negative_func`
/// gated by its negation.
pub fn simple_conditional_flow() -> TaskFlow {
    TaskFlow::builder("simple_conditional_flow")
        .task(LeafTask::binary("is_positive").with_inputs(["is_positive_logits"]))
        .task(LeafTask::regression("positive_func").with_inputs(["features"]))
        .task(LeafTask::regression("negative_func").with_inputs(["features"]))
        .flow(|out| {
            out.add("is_positive")?;
            let positive = out.precondition_for("is_positive");
            out.add("positive_func")?.gate(positive.clone())?;
            out.add("negative_func")?.gate(!positive)?;
            Ok(())
        })
        .build()
        .expect("simple_conditional_flow is well formed")
}

/// `inner_local` and `inner_target` (gated by `inner_local`) inside the
/// flow `inner`.
pub fn inner_flow() -> TaskFlow {
    TaskFlow::builder("inner")
        .task(LeafTask::binary("inner_local").with_inputs(["inner_local_logits"]))
        .task(LeafTask::regression("inner_target").with_inputs(["features"]))
        .flow(|out| {
            out.add("inner_local")?;
            let local = out.precondition_for("inner_local");
            out.add("inner_target")?.gate(local)?;
            Ok(())
        })
        .build()
        .expect("inner flow is well formed")
}

/// `outer_gate`, then the whole of [`inner_flow`] gated by it.
pub fn nested_conditional_flow() -> TaskFlow {
    TaskFlow::builder("outer")
        .task(LeafTask::binary("outer_gate").with_inputs(["outer_gate_logits"]))
        .task(inner_flow())
        .flow(|out| {
            out.add("outer_gate")?;
            let gate = out.precondition_for("outer_gate");
            out.add("inner")?.gate(gate)?;
            Ok(())
        })
        .build()
        .expect("nested_conditional_flow is well formed")
}

/// One detection anchor: `has_object`, then box and class heads gated by
/// it.
pub fn yolo_anchor_flow() -> TaskFlow {
    TaskFlow::builder("yolo_anchor")
        .task(LeafTask::binary("has_object").with_inputs(["has_object_logits"]))
        .task(LeafTask::bounded_regression("xy").with_inputs(["xy_logits"]))
        .task(LeafTask::bounded_regression("wh").with_inputs(["wh_logits"]))
        .task(LeafTask::classification("class_id").with_inputs(["class_logits"]))
        .flow(|out| {
            out.add("has_object")?;
            let has_object = out.precondition_for("has_object");
            out.add("xy")?.gate(has_object.clone())?;
            out.add("wh")?.gate(has_object.clone())?;
            out.add("class_id")?.gate(has_object)?;
            Ok(())
        })
        .build()
        .expect("yolo_anchor_flow is well formed")
}
