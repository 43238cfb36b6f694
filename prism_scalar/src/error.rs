//! Error types.
//!
//! Malformed graphs are caller defects: [`GraphError`] reports them before a
//! pass touches the graph, and the caller falls back to the unoptimized
//! graph. [`EvalError`] belongs to the reference evaluator, where a
//! division-by-zero fault is an expected, observable outcome.

use thiserror::Error;

use crate::ir::node::NodeId;
use crate::ir::operators::{Operator, ScalarKind};

/// Result alias for pass entry points.
pub type OptResult<T> = Result<T, OptError>;

/// Structural defects found by [`Graph::verify`](crate::ir::graph::Graph::verify).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Wrong number of operands for the operator.
    #[error("node {node}: {op:?} expects {expected} inputs, found {found}")]
    Arity {
        node: NodeId,
        op: Operator,
        expected: usize,
        found: usize,
    },

    /// An operand refers outside the arena or to a reclaimed node.
    #[error("node {node}: input {index} refers to missing node {input}")]
    MissingInput {
        node: NodeId,
        index: usize,
        input: NodeId,
    },

    /// Operand or result kind does not fit the operator.
    #[error("node {node}: input {index} has kind {found:?}, expected {expected:?}")]
    KindMismatch {
        node: NodeId,
        index: usize,
        expected: ScalarKind,
        found: ScalarKind,
    },

    /// Operator is not defined for the node's result kind.
    #[error("node {node}: {op:?} cannot produce {kind:?}")]
    BadResultKind {
        node: NodeId,
        op: Operator,
        kind: ScalarKind,
    },

    /// The def-use graph has a cycle.
    #[error("cycle through node {0}")]
    Cycle(NodeId),
}

/// Failure of an optimization entry point.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OptError {
    #[error("invalid input graph: {0}")]
    InvalidGraph(#[from] GraphError),
}

/// Failure of [`evaluate`](crate::ir::eval::evaluate).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    /// Runtime fault of an integer division or remainder.
    #[error("division by zero at node {0}")]
    DivisionByZero(NodeId),

    #[error("parameter {index} was not supplied")]
    MissingParameter { index: u16 },

    #[error("parameter {index} expects {expected:?}, got {found:?}")]
    ParameterKind {
        index: u16,
        expected: ScalarKind,
        found: ScalarKind,
    },

    #[error("node {0} has been reclaimed")]
    DeadNode(NodeId),

    #[error("node {0} produced no value")]
    NoValue(NodeId),
}
