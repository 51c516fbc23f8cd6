pub mod execution;
use commonware_cryptography::{
    ed25519::PrivateKey,
    sha256::{Digest, Sha256},
    Hasher, Signer,
};
pub use execution::{
    transaction_namespace, Block, BlockState, Id, Transaction, MAX_BLOCK_TRANSACTIONS,
    MAX_PAYLOAD_SIZE, NAMESPACE,
};

/// Genesis message to use during initialization.
const GENESIS: &[u8] = b"ardent genesis";

/// Get the genesis block.
pub fn genesis_block() -> Block {
    let genesis_parent = Sha256::hash(GENESIS);
    let producer = PrivateKey::from_seed(0).public_key();
    Block::new(genesis_parent, 0, 0, producer, vec![])
}

/// Compute the digest of the genesis block.
pub fn genesis_digest() -> Digest {
    genesis_block().id()
}

/// The fork database entry for the genesis block, irreversible by definition.
pub fn genesis_state() -> BlockState {
    let mut state = BlockState::new(genesis_block(), 0);
    state.in_current_chain = true;
    state
}
