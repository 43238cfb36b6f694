//! Shape queries over a graph.
//!
//! These count live nodes by [`Opcode`], ignoring constant payloads and
//! comparator tags, and are what post-pass shape assertions are written in.

use super::graph::Graph;
use super::operators::{Opcode, ScalarKind};

/// Number of live nodes with the given opcode.
pub fn count_nodes_of_kind(graph: &Graph, opcode: Opcode) -> usize {
    graph
        .iter()
        .filter(|(_, node)| node.op.opcode() == opcode)
        .count()
}

/// Whether any live node has the given opcode.
pub fn contains_node_of_kind(graph: &Graph, opcode: Opcode) -> bool {
    graph.iter().any(|(_, node)| node.op.opcode() == opcode)
}

/// Like [`count_nodes_of_kind`], restricted to one result kind.
pub fn count_nodes_of_kind_in(graph: &Graph, opcode: Opcode, kind: ScalarKind) -> usize {
    graph
        .iter()
        .filter(|(_, node)| node.op.opcode() == opcode && node.kind == kind)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::builder::GraphBuilder;

    #[test]
    fn test_counts_ignore_payload() {
        let mut b = GraphBuilder::new();
        let x = b.parameter(0, ScalarKind::Int);
        let one = b.int(1);
        let two = b.int(2);
        let a = b.add(x, one);
        let c = b.add(a, two);
        b.ret(c);
        let g = b.finish();

        assert_eq!(count_nodes_of_kind(&g, Opcode::Add), 2);
        assert_eq!(count_nodes_of_kind(&g, Opcode::Const), 2);
        assert!(contains_node_of_kind(&g, Opcode::Return));
        assert!(!contains_node_of_kind(&g, Opcode::Sub));
        assert_eq!(count_nodes_of_kind_in(&g, Opcode::Add, ScalarKind::Long), 0);
    }

    #[test]
    fn test_counts_skip_dead_nodes() {
        let mut b = GraphBuilder::new();
        let x = b.parameter(0, ScalarKind::Int);
        let one = b.int(1);
        let sum = b.add(x, one);
        let mut g = b.finish();

        assert_eq!(g.reclaim(sum), 2);
        assert_eq!(count_nodes_of_kind(&g, Opcode::Add), 0);
        assert_eq!(count_nodes_of_kind(&g, Opcode::Const), 0);
    }
}
