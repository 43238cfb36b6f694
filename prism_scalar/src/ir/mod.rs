//! Sea-of-nodes value graph for scalar computations.
//!
//! - `arena`: typed indices and dense side tables
//! - `operators` / `node`: what a node is
//! - `types` / `range`: the type lattice and its transfer functions
//! - `graph`: the hash-consed store
//! - `builder`: construction API
//! - `eval`: reference semantics
//! - `inspect`: shape queries

pub mod arena;
pub mod builder;
pub mod eval;
pub mod graph;
pub mod inspect;
pub mod node;
pub mod operators;
pub mod range;
pub mod types;

pub use builder::GraphBuilder;
pub use eval::{evaluate, Value};
pub use graph::Graph;
pub use inspect::{contains_node_of_kind, count_nodes_of_kind, count_nodes_of_kind_in};
pub use node::{Node, NodeFlags, NodeId};
pub use operators::{ArithOp, BitwiseOp, CmpOp, ConvOp, Opcode, Operator, ScalarKind};
pub use types::{FloatValue, IntRange, Type};
