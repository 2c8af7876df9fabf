// src/task/leaf.rs

use std::fmt;
use std::sync::Arc;

use crate::loss::Loss;
use crate::task::flavor::{Flavor, TaskKind};
use crate::task::policy::{Activation, Availability, Decoder, Identity, Metric, Predictor};

/// A named metric attached to a leaf.
#[derive(Clone)]
pub struct NamedMetric {
    pub name: String,
    pub metric: Arc<dyn Metric>,
}

/// An atomic predictor: one output, one label column, its own policies.
///
/// Immutable once built; the `with_*` methods consume and return `self` so
/// a leaf is fully configured before it is handed to a flow.
#[derive(Clone)]
pub struct LeafTask {
    name: String,
    kind: TaskKind,
    /// Input columns passed to the predictor when a flow adds this leaf
    /// without explicit arguments.
    inputs: Vec<String>,
    /// Label column this leaf is supervised with.
    labels: String,
    flavor: Flavor,
    predictor: Arc<dyn Predictor>,
    metrics: Vec<NamedMetric>,
}

impl LeafTask {
    /// A leaf of the given kind reading labels from a column named like the
    /// task, with an identity predictor.
    pub fn new(name: impl Into<String>, kind: TaskKind) -> Self {
        let name = name.into();
        Self {
            labels: name.clone(),
            name,
            kind,
            inputs: Vec::new(),
            flavor: kind.flavor(),
            predictor: Arc::new(Identity),
            metrics: Vec::new(),
        }
    }

    pub fn binary(name: impl Into<String>) -> Self {
        Self::new(name, TaskKind::Binary)
    }

    pub fn binary_hardcoded(name: impl Into<String>) -> Self {
        Self::new(name, TaskKind::BinaryHardcoded)
    }

    pub fn classification(name: impl Into<String>) -> Self {
        Self::new(name, TaskKind::Classification)
    }

    pub fn regression(name: impl Into<String>) -> Self {
        Self::new(name, TaskKind::Regression)
    }

    pub fn bounded_regression(name: impl Into<String>) -> Self {
        Self::new(name, TaskKind::BoundedRegression)
    }

    pub fn with_inputs<I, S>(mut self, inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs = inputs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_labels(mut self, column: impl Into<String>) -> Self {
        self.labels = column.into();
        self
    }

    pub fn with_predictor(mut self, predictor: Arc<dyn Predictor>) -> Self {
        self.predictor = predictor;
        self
    }

    pub fn with_activation(mut self, activation: Option<Arc<dyn Activation>>) -> Self {
        self.flavor.activation = activation;
        self
    }

    pub fn with_decoder(mut self, decoder: Option<Arc<dyn Decoder>>) -> Self {
        self.flavor.decoder = decoder;
        self
    }

    pub fn with_loss(mut self, loss: Option<Arc<dyn Loss>>) -> Self {
        self.flavor.loss = loss;
        self
    }

    pub fn with_availability(mut self, availability: Availability) -> Self {
        self.flavor.availability = availability;
        self
    }

    pub fn with_metric(mut self, name: impl Into<String>, metric: Arc<dyn Metric>) -> Self {
        self.metrics.push(NamedMetric {
            name: name.into(),
            metric,
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    pub fn labels(&self) -> &str {
        &self.labels
    }

    pub fn activation(&self) -> Option<&Arc<dyn Activation>> {
        self.flavor.activation.as_ref()
    }

    pub fn decoder(&self) -> Option<&Arc<dyn Decoder>> {
        self.flavor.decoder.as_ref()
    }

    /// The loss used for both `mean` and `per_sample` reductions; the
    /// reduction is chosen by the caller.
    pub fn loss(&self) -> Option<&Arc<dyn Loss>> {
        self.flavor.loss.as_ref()
    }

    pub fn availability(&self) -> Availability {
        self.flavor.availability
    }

    pub fn predictor(&self) -> &Arc<dyn Predictor> {
        &self.predictor
    }

    pub fn metrics(&self) -> &[NamedMetric] {
        &self.metrics
    }
}

impl fmt::Debug for LeafTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeafTask")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("inputs", &self.inputs)
            .field("labels", &self.labels)
            .field("flavor", &self.flavor)
            .field("metrics", &self.metrics.iter().map(|m| &m.name).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
