use crate::core::{Block, Blockchain, ProofOfWork};
use log::{error, info, warn};

/// Checks linkage and proof-of-work for every block after the first.
///
/// The first block is taken as given, so a single-block chain is valid. An
/// empty chain is not.
pub fn valid_chain(chain: &[Block], difficulty: usize) -> bool {
    if chain.is_empty() {
        return false;
    }
    chain.windows(2).all(|pair| {
        let (prev, block) = (&pair[0], &pair[1]);
        block.get_prev_hash() == prev.get_hash() && ProofOfWork::validate(block, difficulty)
    })
}

impl Blockchain {
    pub fn valid_chain(&self, chain: &[Block]) -> bool {
        valid_chain(chain, self.get_difficulty())
    }

    /// Adopts the longest valid neighbor chain if it is strictly longer than
    /// the local one. Returns whether the local chain was replaced.
    ///
    /// Ties go to the neighbor listed first. The pool is left alone.
    pub fn resolve_conflicts(&self) -> bool {
        let mut max_length = self.chain_len();
        let mut longest: Option<(String, Vec<Block>)> = None;

        for neighbor in self.get_neighbors() {
            let chain = match self.peers.fetch_chain(&neighbor) {
                Ok(chain) => chain,
                Err(e) => {
                    error!("Failed to fetch chain from {neighbor}: {e}");
                    continue;
                }
            };
            if chain.len() <= max_length {
                continue;
            }
            if !self.valid_chain(&chain) {
                warn!(
                    "Ignoring invalid chain of length {} from {neighbor}",
                    chain.len()
                );
                continue;
            }
            max_length = chain.len();
            longest = Some((neighbor, chain));
        }

        let Some((source, chain)) = longest else {
            info!("Resolve conflicts: local chain kept");
            return false;
        };

        let mut state = self.state();
        if chain.len() <= state.chain.len() {
            info!("Local chain grew while resolving, keeping it");
            return false;
        }
        info!(
            "Replacing local chain ({} blocks) with {} blocks from {source}",
            state.chain.len(),
            chain.len()
        );
        state.chain = chain;
        self.persist(&state);
        true
    }
}
