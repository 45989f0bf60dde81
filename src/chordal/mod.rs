//! Chordal decomposition of large PSD cones: supernode/clique-tree
//! bookkeeping (F), iterative clique merging (G), and the decomposer plus
//! post-solve PSD completion (H).

pub mod clique_graph;
pub mod decompose;
pub mod merge;
pub mod supernode;

pub use clique_graph::{build_reduced_clique_graph, ReducedCliqueGraph};
pub use decompose::{complete_psd, consistency_constraints, decompose, CliqueCone};
pub use merge::{run_clique_graph_merge, run_no_merge, run_parent_child_merge, recompute_clique_tree, MergeLogEntry, MergeStrategy};
pub use supernode::SuperNodeTree;

/// Runs the full setup pipeline for one chordal PSD cone: build the
/// reduced clique graph (F), merge cliques per `strategy` (G), and return
/// the decomposed cones (H) ready for the surrounding assembler.
pub fn setup_chordal_cone(
    mut tree: SuperNodeTree,
    strategy: MergeStrategy,
) -> (SuperNodeTree, Vec<CliqueCone>, Vec<MergeLogEntry>) {
    let snd_snapshot: Vec<_> = tree.snd.clone();
    let sep_snapshot: Vec<_> = tree.sep.clone();

    let log = match strategy {
        MergeStrategy::NoMerge => run_no_merge(&mut tree),
        MergeStrategy::ParentChildMerge { t_fill, t_size } => {
            run_parent_child_merge(&mut tree, t_fill, t_size)
        }
        MergeStrategy::CliqueGraphMerge => {
            let mut graph = build_reduced_clique_graph(&snd_snapshot, &sep_snapshot);
            let log = run_clique_graph_merge(&mut tree, &mut graph);
            if tree.num > 1 {
                recompute_clique_tree(&mut tree, &mut graph);
            }
            log
        }
    };

    let cones = decompose(&tree);
    (tree, cones, log)
}
