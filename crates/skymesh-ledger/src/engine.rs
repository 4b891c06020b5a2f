//! The ledger engine: open block, candidate pool, quorum voting.

use tracing::{debug, trace, warn};

use skymesh_identity::AircraftId;
use skymesh_protocol::SwarmMessage;

use crate::block::{digest_transactions, Block, TxDigest};
use crate::{Error, Result};

/// Number of transactions that triggers sealing of the open block.
pub const SEAL_THRESHOLD: usize = 10;

/// A single node's ledger replica.
///
/// State machine per block: open (accumulating transactions) → sealed
/// candidate → committed or discarded. Committing folds the candidate into
/// the canonical chain; discarding clears the candidate pool without a
/// commit (round timeout, caller-driven retry).
#[derive(Debug)]
pub struct Ledger {
    local: AircraftId,
    chain: Vec<Block>,
    open: Vec<SwarmMessage>,
    open_digest: TxDigest,
    candidates: Vec<Block>,
    round: u32,
    difficulty: u32,
    seal_threshold: usize,
    /// Invalid candidates rejected since bootstrap.
    rejected: u64,
}

impl Ledger {
    /// A ledger with no blocks. [`create_genesis`](Self::create_genesis)
    /// must run before transactions can be appended.
    pub fn new(local: AircraftId) -> Self {
        Self {
            local,
            chain: Vec::new(),
            open: Vec::new(),
            open_digest: digest_transactions(&[]),
            candidates: Vec::new(),
            round: 0,
            difficulty: 1,
            seal_threshold: SEAL_THRESHOLD,
            rejected: 0,
        }
    }

    /// Override the seal threshold (default [`SEAL_THRESHOLD`]).
    pub fn with_seal_threshold(mut self, threshold: usize) -> Self {
        self.seal_threshold = threshold.max(1);
        self
    }

    /// Create the deterministic genesis block. Called exactly once at node
    /// bootstrap; a repeated call is a no-op.
    pub fn create_genesis(&mut self) -> &Block {
        if self.chain.is_empty() {
            debug!(node = %self.local, "creating genesis block");
            self.chain.push(Block::genesis());
        }
        &self.chain[0]
    }

    /// Append a transaction to the open block and recompute its digest.
    pub fn append_transaction(&mut self, tx: SwarmMessage) -> Result<()> {
        if self.chain.is_empty() {
            return Err(Error::EmptyChain);
        }
        self.open.push(tx);
        self.open_digest = digest_transactions(&self.open);
        trace!(
            open = self.open.len(),
            digest = %self.open_digest,
            "transaction appended"
        );
        Ok(())
    }

    /// Seal the open block into a candidate if it has reached the seal
    /// threshold, mining a proof token and submitting the candidate to this
    /// node's own pool. Returns the sealed candidate for distribution to
    /// peers.
    pub fn seal_block_if_full(&mut self, timestamp_ms: u64) -> Option<Block> {
        if self.chain.is_empty() || self.open.len() < self.seal_threshold {
            return None;
        }

        let head = self.chain.last().expect("chain is non-empty");
        let transactions = std::mem::take(&mut self.open);
        let mut block = Block {
            id: head.id + 1,
            previous_hash: head.digest,
            digest: digest_transactions(&transactions),
            transactions,
            timestamp_ms,
            proposer: self.local,
            proof: 0,
        };
        self.open_digest = digest_transactions(&[]);
        block.proof = self.mine_proof(&block);

        debug!(
            block = block.id,
            digest = %block.digest,
            txs = block.transactions.len(),
            proof = block.proof,
            "sealed candidate block"
        );

        self.submit_candidate(block.clone());
        Some(block)
    }

    /// Validate a block against the current chain head and difficulty.
    pub fn validate_block(&self, block: &Block) -> Result<()> {
        if block.transactions.is_empty() {
            return Err(Error::EmptyBlock(block.id));
        }
        if digest_transactions(&block.transactions) != block.digest {
            return Err(Error::InvalidDigest(block.id));
        }
        let head = self.chain.last().ok_or(Error::EmptyChain)?;
        if block.id != head.id + 1 || block.previous_hash != head.digest {
            return Err(Error::InvalidLink(block.id));
        }
        if !self.proof_ok(block, block.proof) {
            return Err(Error::InvalidProof(block.id));
        }
        Ok(())
    }

    /// Record a candidate for the current round.
    ///
    /// Returns `false` without further effect if validation fails: an
    /// invalid block never enters the candidate pool.
    pub fn submit_candidate(&mut self, block: Block) -> bool {
        match self.validate_block(&block) {
            Ok(()) => {
                trace!(block = block.id, proposer = %block.proposer, "candidate accepted");
                self.candidates.push(block);
                true
            }
            Err(reason) => {
                self.rejected += 1;
                warn!(block = block.id, %reason, "candidate rejected");
                false
            }
        }
    }

    /// Check the candidate pool for a quorum of structurally identical
    /// candidates (>= floor(peer_count / 2) + 1).
    ///
    /// On quorum the first matching candidate is committed to the chain,
    /// the pool is cleared and the round counter resets. Without quorum the
    /// round counter advances and the pool is kept for the caller's retry.
    pub fn has_consensus(&mut self, peer_count: u32) -> bool {
        let quorum = (peer_count / 2 + 1) as usize;

        let winner = self
            .candidates
            .iter()
            .position(|c| {
                self.candidates
                    .iter()
                    .filter(|other| c.structurally_identical(other))
                    .count()
                    >= quorum
            })
            .map(|i| self.candidates[i].clone());

        match winner {
            Some(block) => {
                debug!(
                    block = block.id,
                    digest = %block.digest,
                    candidates = self.candidates.len(),
                    quorum,
                    "consensus reached, committing block"
                );
                self.chain.push(block);
                self.candidates.clear();
                self.round = 0;
                true
            }
            None => {
                self.round += 1;
                false
            }
        }
    }

    /// Discard the current round's candidates without committing (round
    /// timeout).
    pub fn discard_round(&mut self) {
        if !self.candidates.is_empty() {
            debug!(discarded = self.candidates.len(), "round discarded");
            self.candidates.clear();
        }
        self.round = 0;
    }

    /// Derive the proof difficulty from swarm size: `max(1, log2(peers))`
    /// leading zero bits. A policy knob, not a security mechanism.
    pub fn set_difficulty_for_peers(&mut self, peer_count: u32) {
        let log2 = if peer_count > 1 {
            31 - peer_count.leading_zeros()
        } else {
            0
        };
        self.difficulty = log2.max(1);
    }

    /// Walk the whole chain re-checking digests and links.
    pub fn validate_chain(&self) -> bool {
        if self.chain.is_empty() {
            return false;
        }
        for pair in self.chain.windows(2) {
            let (prev, block) = (&pair[0], &pair[1]);
            if block.previous_hash != prev.digest
                || block.id != prev.id + 1
                || digest_transactions(&block.transactions) != block.digest
            {
                return false;
            }
        }
        true
    }

    /// The last accepted block.
    pub fn latest_block(&self) -> Option<&Block> {
        self.chain.last()
    }

    /// The canonical chain.
    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    /// Transactions currently in the open block.
    pub fn open_len(&self) -> usize {
        self.open.len()
    }

    /// Digest of the open block so far.
    pub fn open_digest(&self) -> TxDigest {
        self.open_digest
    }

    /// Candidates in the current round.
    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }

    /// Consensus round counter (rounds without quorum since last commit).
    pub fn consensus_round(&self) -> u32 {
        self.round
    }

    /// Current proof difficulty in leading zero bits.
    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    /// Candidates rejected as invalid since bootstrap.
    pub fn rejected_candidates(&self) -> u64 {
        self.rejected
    }

    fn proof_ok(&self, block: &Block, proof: u64) -> bool {
        TxDigest(block.proof_bytes(proof)).leading_zero_bits() >= self.difficulty
    }

    fn mine_proof(&self, block: &Block) -> u64 {
        // Difficulty is at most log2(swarm size) bits, so this terminates
        // after a few iterations in practice.
        (0u64..)
            .find(|&proof| self.proof_ok(block, proof))
            .expect("a satisfying proof exists")
    }
}
