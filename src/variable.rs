//! Graph nodes
//!
//! A [`Variable`] wraps a tensor and remembers the operator application
//! that produced it. Only one backward step is supported per node: the
//! creator's context is handed out once, after which the node reports
//! `BackwardConsumed`. Walking the whole graph is left to callers.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::trace;

use crate::dtype::DType;
use crate::error::{EmberError, Result};
use crate::function::{self, Context, Function};
use crate::tensor::Tensor;

/// A tensor plus the application that created it
///
/// Cloning is cheap and shares the node.
#[derive(Clone)]
pub struct Variable(Rc<Node>);

struct Node {
    data: Tensor,
    creator: RefCell<Option<Creator>>,
}

struct Creator {
    function: Box<dyn Function>,
    inputs: Vec<Variable>,
    /// Taken by the first backward step
    context: Option<Context>,
}

impl Variable {
    /// A leaf node with no creator
    pub fn new(data: Tensor) -> Self {
        Variable(Rc::new(Node {
            data,
            creator: RefCell::new(None),
        }))
    }

    pub fn data(&self) -> &Tensor {
        &self.0.data
    }

    pub fn shape(&self) -> &[usize] {
        self.0.data.shape()
    }

    pub fn dtype(&self) -> DType {
        self.0.data.dtype()
    }

    /// Whether both handles point at the same node
    pub fn ptr_eq(&self, other: &Variable) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn is_leaf(&self) -> bool {
        self.0.creator.borrow().is_none()
    }

    /// Label of the operator that produced this node
    pub fn creator_label(&self) -> Option<String> {
        self.0
            .creator
            .borrow()
            .as_ref()
            .map(|c| c.function.label())
    }

    /// Nodes the creator was applied to, in order
    pub fn creator_inputs(&self) -> Vec<Variable> {
        self.0
            .creator
            .borrow()
            .as_ref()
            .map(|c| c.inputs.clone())
            .unwrap_or_default()
    }

    /// Run `function` on `inputs` and record it as the creator of the result
    ///
    /// # Errors
    /// Anything the forward driver reports, or a `TypeConstraint` if the
    /// operator yields more than one output.
    pub fn apply(function: Box<dyn Function>, inputs: &[&Variable]) -> Result<Variable> {
        let tensors: Vec<&Tensor> = inputs.iter().map(|v| v.data()).collect();
        let (outputs, context) = function::forward(function.as_ref(), &tensors)?;
        let [data] = <[Tensor; 1]>::try_from(outputs).map_err(|outputs| {
            EmberError::TypeConstraint {
                function: function.label(),
                reason: format!("expected a single output, got {}", outputs.len()),
            }
        })?;
        trace!(function = function.name(), shape = ?data.shape(), "applied");

        Ok(Variable(Rc::new(Node {
            data,
            creator: RefCell::new(Some(Creator {
                function,
                inputs: inputs.iter().map(|v| (*v).clone()).collect(),
                context: Some(context),
            })),
        })))
    }

    /// Gradients for the creator's inputs given the gradient of this node
    ///
    /// # Errors
    /// `NoCreator` on a leaf, `BackwardConsumed` on a second call, plus
    /// anything the backward driver reports.
    pub fn backward_step(&self, grad_output: &Tensor) -> Result<Vec<Tensor>> {
        let mut slot = self.0.creator.borrow_mut();
        let creator = slot.as_mut().ok_or(EmberError::NoCreator)?;
        if creator.context.is_none() {
            return Err(EmberError::BackwardConsumed(creator.function.label()));
        }
        let inputs: Vec<&Tensor> = creator.inputs.iter().map(Variable::data).collect();
        let op = creator.function.as_ref();
        // a rejected gradient must not use up the context
        let xp = function::prepare_backward(op, &inputs, &[grad_output])?;
        let context = creator
            .context
            .take()
            .ok_or_else(|| EmberError::BackwardConsumed(op.label()))?;
        function::run_backward(op, xp, &inputs, &[grad_output], context)
    }
}

impl std::fmt::Debug for Variable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Variable")
            .field("data", &self.0.data)
            .field("creator", &self.creator_label())
            .finish()
    }
}

impl From<Tensor> for Variable {
    fn from(data: Tensor) -> Self {
        Variable::new(data)
    }
}
