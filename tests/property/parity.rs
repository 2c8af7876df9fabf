use std::collections::BTreeSet;

use proptest::prelude::*;
use taskflow::dataset::FlowDataset;
use taskflow::task::{LeafTask, TaskFlow};
use taskflow::types::Mode;
use taskflow_test_utils::builders::ColumnsBuilder;

/// Leaf `i` is optionally gated by an earlier leaf, possibly negated.
type Plan = Vec<Option<(usize, bool)>>;

fn plan_strategy(max_leaves: usize) -> impl Strategy<Value = Plan> {
    proptest::collection::vec((any::<bool>(), any::<usize>(), any::<bool>()), 1..=max_leaves)
        .prop_map(|raw| {
            raw.into_iter()
                .enumerate()
                .map(|(i, (gated, source, negate))| {
                    (gated && i > 0).then(|| (source % i, negate))
                })
                .collect()
        })
}

fn flow_from_plan(plan: &Plan) -> TaskFlow {
    let leaves = (0..plan.len())
        .map(|i| LeafTask::binary(format!("t{i}")).with_inputs([format!("t{i}_logits")]));
    let steps = plan.clone();
    TaskFlow::builder("random")
        .tasks(leaves)
        .flow(move |out| {
            for (i, gate) in steps.iter().enumerate() {
                let precondition = gate.map(|(source, negate)| {
                    let p = out.precondition_for(&format!("t{source}"));
                    if negate { !p } else { p }
                });
                let added = out.add(&format!("t{i}"))?;
                if let Some(p) = precondition {
                    added.gate(p)?;
                }
            }
            Ok(())
        })
        .build()
        .unwrap()
}

proptest! {
    #[test]
    fn forward_and_label_passes_agree(
        plan in plan_strategy(6),
        labels in proptest::collection::vec(proptest::collection::vec(any::<bool>(), 6), 1..5),
    ) {
        let flow = flow_from_plan(&plan);
        let n = labels.len();

        let mut inputs = ColumnsBuilder::new();
        let mut label_columns = ColumnsBuilder::new();
        for i in 0..plan.len() {
            let values: Vec<f32> = labels.iter().map(|row| if row[i] { 1.0 } else { 0.0 }).collect();
            inputs = inputs.with_values(&format!("t{i}_logits"), &vec![0.0; n]);
            label_columns = label_columns.with_values(&format!("t{i}"), &values);
        }

        let dataset = FlowDataset::new(flow, inputs.build(), label_columns.build()).unwrap();
        let indices: Vec<usize> = (0..n).collect();
        let batch = dataset.batch(&indices).unwrap();
        let out = dataset.flow().forward(&batch.flow_inputs(), Mode::Training).unwrap();

        let forward_paths: BTreeSet<String> = out.paths().map(str::to_string).collect();
        let label_paths: BTreeSet<String> = batch.targets.keys().cloned().collect();
        prop_assert_eq!(forward_paths, label_paths);

        let gated: BTreeSet<&String> = out.preconditions().keys().collect();
        let available: BTreeSet<&String> = batch.available.keys().collect();
        prop_assert_eq!(gated, available);
        for (path, forward_mask) in out.preconditions() {
            prop_assert_eq!(Some(forward_mask), batch.available.get(path));
        }
    }
}
