// src/scope.rs

//! The interface a flow definition is written against.
//!
//! A flow definition is a single closure over `&mut dyn FlowScope`. The same
//! closure is run by three scopes:
//! - [`crate::forward::ForwardScope`] runs predictors and collects tensors,
//! - [`crate::dataset::LabelScope`] looks up label rows for one sample,
//! - [`crate::trace::TraceScope`] records paths and gates without any data.
//!
//! So the task topology is defined exactly once, and every pass sees the
//! same dotted paths and the same preconditions.
//!
//! ```ignore
//! |out: &mut dyn FlowScope| {
//!     out.add("is_positive")?;
//!     let positive = out.precondition_for("is_positive");
//!     out.add("positive_func")?.gate(positive.clone())?;
//!     out.add("negative_func")?.gate(!positive)?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use crate::errors::Result;
use crate::precondition::Precondition;

/// Flow-definition closure shared by every pass.
pub type FlowFn = Arc<dyn Fn(&mut dyn FlowScope) -> Result<()> + Send + Sync>;

/// Argument descriptor for [`FlowScope::add_with`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    /// A named column of the flow's input view.
    Input(String),
    /// The whole input view; the only argument a nested flow accepts.
    Inputs,
    /// Decoded output of a task added earlier in the same flow.
    Decoded(String),
}

impl Arg {
    pub fn input(name: impl Into<String>) -> Self {
        Arg::Input(name.into())
    }

    pub fn decoded(task: impl Into<String>) -> Self {
        Arg::Decoded(task.into())
    }
}

pub trait FlowScope {
    /// Run the child `task` with explicit arguments and merge its result.
    ///
    /// An empty `args` slice means "the default arguments": a leaf's
    /// declared input columns, or the whole input view for a nested flow.
    fn add_with(&mut self, task: &str, args: &[Arg]) -> Result<&mut dyn FlowScope>;

    /// Gate every path written by the most recent `add`.
    fn gate(&mut self, precondition: Precondition) -> Result<()>;

    /// Precondition that uses the output of an already-added `task` as a
    /// gate. `task` is relative to this flow and may be dotted to reach into
    /// a nested flow (`"inner.leaf"`).
    fn precondition_for(&self, task: &str) -> Precondition;

    /// Dotted prefix of this flow (`""` for the root).
    fn prefix(&self) -> &str;

    /// Run the child `task` with its default arguments.
    fn add(&mut self, task: &str) -> Result<&mut dyn FlowScope> {
        self.add_with(task, &[])
    }
}
