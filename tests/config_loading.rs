// tests/config_loading.rs

use std::io::Write;
use std::sync::Arc;

use tempfile::NamedTempFile;
use taskflow::config::{load_and_validate, load_from_str, GateExpr, GraphBuilder, GraphConfig};
use taskflow::errors::TaskFlowError;
use taskflow::task::{Linear, TaskKind};
use taskflow::types::{Mode, Reduction};
use taskflow::{describe_config, describe_flow};
use taskflow_test_utils::builders::{mask, matrix, ColumnsBuilder};
use taskflow_test_utils::init_tracing;

const NESTED: &str = r#"
[config]
loss_reduction = "per_sample"

[task.outer_gate]
kind = "binary"
inputs = ["outer_gate_logits"]

[task.inner_local]
kind = "binary"
inputs = ["inner_local_logits"]

[task.inner_target]
kind = "regression"
inputs = ["features"]
labels = "target_column"

[flow.inner]
steps = [
  { task = "inner_local" },
  { task = "inner_target", gate = "inner_local" },
]

[flow.outer]
steps = [
  { task = "outer_gate" },
  { task = "inner", gate = "outer_gate" },
]
"#;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

fn validate(contents: &str) -> taskflow::errors::Result<GraphConfig> {
    GraphConfig::try_from(load_from_str(contents)?)
}

#[test]
fn test_load_nested_config_from_file() {
    init_tracing();
    let file = write_config(NESTED);

    let cfg = load_and_validate(file.path()).unwrap();

    assert_eq!(cfg.root(), "outer");
    assert_eq!(cfg.loss_reduction(), Reduction::PerSample);
    assert_eq!(cfg.task("outer_gate").unwrap().kind, TaskKind::Binary);
    assert_eq!(cfg.flow("inner").unwrap().steps.len(), 2);
}

#[test]
fn test_config_graph_matches_hand_built_graph() {
    init_tracing();
    let cfg = validate(NESTED).unwrap();
    let flow = GraphBuilder::new(&cfg).build().unwrap();

    assert_eq!(flow.name(), "outer");
    assert_eq!(
        flow.leaf_paths(),
        vec!["outer_gate", "inner.inner_local", "inner.inner_target"]
    );
    assert_eq!(flow.labels(), vec!["outer_gate", "inner_local", "target_column"]);

    let inputs = ColumnsBuilder::new()
        .with_values("outer_gate_logits", &[4.0, 4.0, -4.0])
        .with_values("inner_local_logits", &[4.0, -4.0, 4.0])
        .with("features", matrix(3, 1, &[1.0, 2.0, 3.0]))
        .inputs();
    let out = flow.forward(&inputs, Mode::Inference).unwrap();

    assert_eq!(out.precondition("inner.inner_target"), Some(&mask(&[true, false, false])));
}

#[test]
fn test_negated_and_conjoined_gates() {
    init_tracing();
    let cfg = validate(
        r#"
[task.a]
kind = "binary"
inputs = ["a_logits"]

[task.b]
kind = "binary"
inputs = ["b_logits"]

[task.c]
kind = "regression"
inputs = ["features"]

[flow.root]
steps = [
  { task = "a" },
  { task = "b" },
  { task = "c", gate = "~a & (b)" },
]
"#,
    )
    .unwrap();
    let flow = GraphBuilder::new(&cfg).build().unwrap();
    let inputs = ColumnsBuilder::new()
        .with_values("a_logits", &[4.0, -4.0, -4.0])
        .with_values("b_logits", &[4.0, 4.0, -4.0])
        .with("features", matrix(3, 1, &[1.0, 2.0, 3.0]))
        .inputs();

    let out = flow.forward(&inputs, Mode::Inference).unwrap();

    assert_eq!(out.precondition("c"), Some(&mask(&[false, true, false])));
}

#[test]
fn test_predictor_override() {
    init_tracing();
    let cfg = validate(
        r#"
[task.score]
kind = "regression"
inputs = ["features"]

[flow.root]
steps = [{ task = "score" }]
"#,
    )
    .unwrap();
    let linear = Linear::new(
        ndarray::arr2(&[[2.0, 0.0], [0.0, 3.0]]),
        ndarray::arr1(&[1.0, 1.0]),
    )
    .unwrap();
    let flow = GraphBuilder::new(&cfg)
        .with_predictor("score", Arc::new(linear))
        .build()
        .unwrap();
    let inputs = ColumnsBuilder::new()
        .with("features", matrix(1, 2, &[1.0, 1.0]))
        .inputs();

    let out = flow.forward(&inputs, Mode::Inference).unwrap();

    assert_eq!(out.logits("score"), Some(&matrix(1, 2, &[3.0, 4.0])));

    let unknown = GraphBuilder::new(&cfg)
        .with_predictor("nope", Arc::new(taskflow::task::Identity))
        .build();
    assert!(matches!(unknown, Err(TaskFlowError::ConfigError(_))));
}

#[test]
fn test_flow_cycle_returns_structured_error() {
    let result = validate(
        r#"
[config]
root = "a"

[task.x]
kind = "binary"

[flow.a]
steps = [{ task = "x" }, { task = "b" }]

[flow.b]
steps = [{ task = "a" }]
"#,
    );

    match result {
        Err(TaskFlowError::FlowCycle(msg)) => {
            assert!(msg.contains("cycle detected"));
            assert!(msg.contains("a") || msg.contains("b"));
        }
        Err(e) => panic!("Expected FlowCycle error, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_unknown_step_returns_config_error() {
    let file = write_config(
        r#"
[flow.root]
steps = [{ task = "NonExistent" }]
"#,
    );

    match load_and_validate(file.path()) {
        Err(TaskFlowError::ConfigError(msg)) => {
            assert!(msg.contains("unknown step"));
            assert!(msg.contains("NonExistent"));
        }
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_gate_must_read_an_earlier_step() {
    let result = validate(
        r#"
[task.a]
kind = "binary"

[task.b]
kind = "regression"

[flow.root]
steps = [
  { task = "b", gate = "a" },
  { task = "a" },
]
"#,
    );

    match result {
        Err(TaskFlowError::ConfigError(msg)) => assert!(msg.contains("earlier step")),
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_dotted_gate_reaches_into_nested_flow() {
    let base = r#"
[task.g]
kind = "binary"

[task.v]
kind = "regression"

[flow.inner]
steps = [{ task = "g" }]
"#;
    let ok = format!(
        "{base}\n[flow.root]\nsteps = [{{ task = \"inner\" }}, {{ task = \"v\", gate = \"inner.g\" }}]\n"
    );
    assert!(validate(&ok).is_ok());

    let missing = format!(
        "{base}\n[flow.root]\nsteps = [{{ task = \"inner\" }}, {{ task = \"v\", gate = \"inner.zz\" }}]\n"
    );
    assert!(matches!(validate(&missing), Err(TaskFlowError::ConfigError(_))));

    let whole_flow = format!(
        "{base}\n[flow.root]\nsteps = [{{ task = \"inner\" }}, {{ task = \"v\", gate = \"inner\" }}]\n"
    );
    assert!(matches!(validate(&whole_flow), Err(TaskFlowError::ConfigError(_))));
}

#[test]
fn test_bad_gate_expression_returns_parse_error() {
    let result = validate(
        r#"
[task.a]
kind = "binary"

[task.b]
kind = "regression"

[flow.root]
steps = [{ task = "a" }, { task = "b", gate = "a |" }]
"#,
    );

    assert!(matches!(result, Err(TaskFlowError::GateParse(_))));
}

#[test]
fn test_ambiguous_root() {
    let result = validate(
        r#"
[task.a]
kind = "binary"

[flow.one]
steps = [{ task = "a" }]

[flow.two]
steps = [{ task = "a" }]
"#,
    );

    match result {
        Err(TaskFlowError::ConfigError(msg)) => assert!(msg.contains("ambiguous root")),
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_name_collision_and_duplicate_steps() {
    let collision = validate(
        r#"
[task.a]
kind = "binary"

[flow.a]
steps = [{ task = "a" }]
"#,
    );
    assert!(matches!(collision, Err(TaskFlowError::ConfigError(_))));

    let twice = validate(
        r#"
[task.a]
kind = "binary"

[flow.root]
steps = [{ task = "a" }, { task = "a" }]
"#,
    );
    assert!(matches!(twice, Err(TaskFlowError::ConfigError(_))));
}

#[test]
fn test_unknown_kind_is_a_toml_error() {
    let result = load_from_str(
        r#"
[task.a]
kind = "ranking"
"#,
    );
    assert!(matches!(result, Err(TaskFlowError::TomlError(_))));
}

#[test]
fn test_gate_expression_grammar() {
    assert_eq!(GateExpr::parse("a & b & c").unwrap().to_string(), "((a & b) & c)");
    assert_eq!(
        GateExpr::parse("~a & b").unwrap(),
        GateExpr::And(
            Box::new(GateExpr::Not(Box::new(GateExpr::Ref("a".into())))),
            Box::new(GateExpr::Ref("b".into())),
        )
    );
    assert_eq!(
        GateExpr::parse(" ~( inner.leaf & x ) ").unwrap().refs(),
        vec!["inner.leaf", "x"]
    );
    for src in ["", "a &", "(a", "a b", "a..b", "~", "a | b"] {
        assert!(
            matches!(GateExpr::parse(src), Err(TaskFlowError::GateParse(_))),
            "expected parse error for {src:?}"
        );
    }
}

#[test]
fn test_describe_output() {
    init_tracing();
    let cfg = validate(NESTED).unwrap();

    let dry = describe_config(&cfg);
    assert!(dry.starts_with("taskflow dry-run\n"));
    assert!(dry.contains("config.root = outer"));
    assert!(dry.lines().any(|l| l.trim() == "kind: binary"));
    assert!(dry.contains("inner_target if inner_local"));

    let flow = GraphBuilder::new(&cfg).build().unwrap();
    let described = describe_flow(&flow).unwrap();
    assert!(described.contains("flow outer (3 leaves):"));
    assert!(described.contains("- inner.inner_target"));
    assert!(described.contains("gate: (inner.inner_local & outer_gate)"));
    assert!(described.contains("gate: always"));
}
