//! The two safety predicates §4.1 names explicitly: `extends` and
//! `safe_block`.

use std::collections::HashMap;

use hotstuff_types::{Block, BlockHash, QC};

/// Walks `block`'s parent chain, looking each ancestor up in `chain`,
/// until it reaches `target` (true) or a hash `chain` has no entry for
/// (false — the chain is unknown this far back, so it cannot be proven to
/// extend `target`).
pub fn extends(block: &Block, target: BlockHash, chain: &HashMap<BlockHash, Block>) -> bool {
    let mut current = block;
    loop {
        if current.hash() == target {
            return true;
        }
        let Some(parent_hash) = current.parent_hash else {
            return false;
        };
        match chain.get(&parent_hash) {
            Some(parent) => current = parent,
            None => return false,
        }
    }
}

/// `safe_block(block, justify) := extends(block, locked_qc.block) ∨
/// justify.view > locked_qc.view` (§4.1): the classical HotStuff
/// liveness/safety hinge. A replica locked on an older branch still votes
/// for a newer branch once it sees a QC from a more recent view, so
/// leader changes don't stall progress, without ever letting a replica
/// vote for a block that neither extends its lock nor supersedes it.
pub fn safe_block(block: &Block, justify: &QC, locked_qc: &QC, chain: &HashMap<BlockHash, Block>) -> bool {
    extends(block, locked_qc.block_hash(), chain) || justify.view > locked_qc.view
}
