//! Block orders over the linear control flow graph.
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::DfsPostOrder;
use waitcnt_idx::IndexRef;
use waitcnt_ir::{self as ir, BlockIdx};

/// Blocks of `prog` in reverse postorder of the linear CFG starting at the
/// first block. Blocks unreachable from the entry follow in index order.
///
/// Every block appears exactly once, and every block appears after all of
/// its predecessors except along back edges.
pub fn reverse_postorder(prog: &ir::Program) -> Vec<BlockIdx> {
    let n = prog.num_blocks();
    if n == 0 {
        return Vec::new();
    }

    let mut graph: DiGraph<BlockIdx, ()> = DiGraph::with_capacity(n, n);
    for block in prog.blocks.values() {
        graph.add_node(block.index);
    }
    for block in prog.blocks.values() {
        for succ in &block.linear_succs {
            graph.add_edge(
                NodeIndex::new(block.index.index()),
                NodeIndex::new(succ.index()),
                (),
            );
        }
    }

    let mut post = Vec::with_capacity(n);
    let mut dfs = DfsPostOrder::new(&graph, NodeIndex::new(0));
    while let Some(node) = dfs.next(&graph) {
        post.push(graph[node]);
    }

    let mut order: Vec<BlockIdx> = post.into_iter().rev().collect();
    let mut seen = vec![false; n];
    for idx in &order {
        seen[idx.index()] = true;
    }
    order.extend(
        prog.blocks
            .keys()
            .filter(|idx| !seen[idx.index()]),
    );
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use ir::BlockKind;

    fn position(order: &[BlockIdx], b: BlockIdx) -> usize {
        order.iter().position(|x| *x == b).unwrap()
    }

    #[test]
    fn diamond() {
        let mut prog = ir::Program::new();
        let [entry, left, right, merge] = [
            BlockKind::TOP_LEVEL | BlockKind::BRANCH,
            BlockKind::empty(),
            BlockKind::empty(),
            BlockKind::TOP_LEVEL | BlockKind::MERGE,
        ]
        .map(|kind| prog.add_block(kind));
        prog.add_edge(entry, left);
        prog.add_edge(entry, right);
        prog.add_edge(left, merge);
        prog.add_edge(right, merge);

        let order = reverse_postorder(&prog);
        assert_eq!(order.len(), 4);
        assert_eq!(order[0], entry);
        assert_eq!(order[3], merge);
    }

    #[test]
    fn loops_and_unreachable_blocks() {
        let mut prog = ir::Program::new();
        let entry = prog.add_block(BlockKind::TOP_LEVEL);
        let header = prog.add_block(BlockKind::LOOP_HEADER);
        let body = prog.add_block(BlockKind::empty());
        let exit = prog.add_block(BlockKind::LOOP_EXIT);
        let dead = prog.add_block(BlockKind::empty());
        prog.add_edge(entry, header);
        prog.add_edge(header, body);
        prog.add_edge(body, header);
        prog.add_edge(body, exit);

        let order = reverse_postorder(&prog);
        assert_eq!(order.len(), 5);
        assert!(position(&order, header) < position(&order, body));
        assert!(position(&order, body) < position(&order, exit));
        assert_eq!(*order.last().unwrap(), dead);
    }
}
