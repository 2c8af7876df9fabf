use std::collections::BTreeSet;

use proptest::prelude::*;
use taskflow::errors::TaskFlowError;
use taskflow::forward::{CompositeOutput, LeafOutput};
use taskflow::precondition::Precondition;
use taskflow_test_utils::builders::{column, mask, GroundTruthBuilder};

fn flags_pair(max: usize) -> impl Strategy<Value = (Vec<bool>, Vec<bool>)> {
    (1..=max).prop_flat_map(|n| {
        (
            proptest::collection::vec(any::<bool>(), n),
            proptest::collection::vec(any::<bool>(), n),
        )
    })
}

fn leaf_output(path: &str) -> LeafOutput {
    LeafOutput {
        path: path.to_string(),
        logits: column(&[0.0]),
        activated: column(&[0.0]),
        decoded: column(&[0.0]),
    }
}

proptest! {
    #[test]
    fn nested_is_parent_and_own((parent, own) in flags_pair(16)) {
        let gt = GroundTruthBuilder::new()
            .with("parent", &parent)
            .with("own", &own)
            .build();

        let resolved = Precondition::nested("own", Precondition::leaf("parent"))
            .to_mask(&gt)
            .unwrap();

        let expected: Vec<bool> = parent.iter().zip(&own).map(|(p, o)| *p && *o).collect();
        prop_assert_eq!(resolved, mask(&expected));
    }

    #[test]
    fn double_negation_is_identity(flags in proptest::collection::vec(any::<bool>(), 1..16)) {
        let gt = GroundTruthBuilder::new().with("p", &flags).build();
        let p = Precondition::leaf("p");

        prop_assert_eq!((!!p.clone()).to_mask(&gt).unwrap(), p.to_mask(&gt).unwrap());
    }

    #[test]
    fn distinct_paths_always_merge(names in proptest::collection::btree_set("[a-z]{1,6}", 1..12)) {
        let mut out = CompositeOutput::new("");
        for name in &names {
            prop_assert!(out.merge(leaf_output(name)).is_ok());
        }
        let merged: BTreeSet<String> = out.logits().keys().cloned().collect();
        prop_assert_eq!(merged, names.clone());

        let again = names.iter().next().unwrap().clone();
        let is_duplicate = matches!(
            out.merge(leaf_output(&again)),
            Err(TaskFlowError::DuplicateKey(ref path)) if *path == again
        );
        prop_assert!(is_duplicate);
    }
}
