//! Scalar arithmetic canonicalization for Prism.
//!
//! A hash-consed sea-of-nodes value graph for integer and floating-point
//! scalar code, plus the passes that rewrite it into a canonical, cheaper
//! form with bit-identical results:
//! - Identities and reassociation with two's-complement wraparound
//! - Division and modulo by constants as multiply-high sequences
//! - Compare-select fusion into `CMove`, `Min` and `Max`
//! - Range-driven constant folding that keeps division traps alive
//!
//! ```
//! use prism_scalar::{optimize, GraphBuilder, OptConfig, ScalarKind};
//!
//! let mut b = GraphBuilder::new();
//! let x = b.parameter(0, ScalarKind::Int);
//! let zero = b.int(0);
//! let sum = b.add(x, zero);
//! let ret = b.ret(sum);
//! let mut graph = b.finish();
//!
//! optimize(&mut graph, &OptConfig::default()).unwrap();
//! assert_eq!(graph.input(ret, 0), x);
//! ```

pub mod error;
pub mod ir;
pub mod opt;

pub use error::{EvalError, GraphError, OptError, OptResult};
pub use ir::{
    contains_node_of_kind, count_nodes_of_kind, evaluate, ArithOp, BitwiseOp, CmpOp, ConvOp,
    Graph, GraphBuilder, NodeId, Opcode, Operator, ScalarKind, Type, Value,
};
pub use opt::{optimize, OptConfig, OptStats};
