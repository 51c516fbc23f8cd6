use bytes::{Buf, BufMut};
use commonware_codec::{
    varint::UInt, EncodeSize, Error, RangeCfg, Read, ReadExt, ReadRangeExt, Write,
};
use commonware_cryptography::{
    ed25519::{self, PublicKey},
    sha256::{Digest, Sha256},
    Digestible, Hasher, Signer, Verifier,
};
use commonware_utils::union;
use std::sync::Arc;

pub const NAMESPACE: &[u8] = b"_ARDENT";
pub const TRANSACTION_SUFFIX: &[u8] = b"_TX";
pub const MAX_BLOCK_TRANSACTIONS: usize = 500;
pub const MAX_PAYLOAD_SIZE: usize = 64 * 1024;

/// Identifier of a transaction or block (SHA-256 of its unsigned contents).
pub type Id = Digest;

#[inline]
pub fn transaction_namespace(namespace: &[u8]) -> Vec<u8> {
    union(namespace, TRANSACTION_SUFFIX)
}

/// A signed transaction.
///
/// `expiration` (seconds since the epoch) bounds how long the transaction may
/// wait to be included; nodes use it to age entries out of their dedup cache.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub expiration: u64,
    pub ref_block_num: u32,
    pub payload: Vec<u8>,

    pub public: ed25519::PublicKey,
    pub signature: ed25519::Signature,
}

impl Transaction {
    fn signing_payload(expiration: u64, ref_block_num: u32, payload: &[u8]) -> Vec<u8> {
        let mut message = Vec::with_capacity(12 + payload.len());
        expiration.write(&mut message);
        ref_block_num.write(&mut message);
        message.extend_from_slice(payload);
        message
    }

    pub fn sign(
        private: &ed25519::PrivateKey,
        expiration: u64,
        ref_block_num: u32,
        payload: Vec<u8>,
    ) -> Self {
        let signature = private.sign(
            &transaction_namespace(NAMESPACE),
            &Self::signing_payload(expiration, ref_block_num, &payload),
        );

        Self {
            expiration,
            ref_block_num,
            payload,
            public: private.public_key(),
            signature,
        }
    }

    pub fn verify(&self) -> bool {
        self.public.verify(
            &transaction_namespace(NAMESPACE),
            &Self::signing_payload(self.expiration, self.ref_block_num, &self.payload),
            &self.signature,
        )
    }

    /// Identifier used for deduplication.
    pub fn id(&self) -> Id {
        self.digest()
    }
}

impl Write for Transaction {
    fn write(&self, writer: &mut impl BufMut) {
        UInt(self.expiration).write(writer);
        self.ref_block_num.write(writer);
        self.payload.write(writer);
        self.public.write(writer);
        self.signature.write(writer);
    }
}

impl Read for Transaction {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let expiration = UInt::read(reader)?.into();
        let ref_block_num = u32::read(reader)?;
        let payload = Vec::<u8>::read_range(reader, 0..=MAX_PAYLOAD_SIZE)?;
        let public = ed25519::PublicKey::read(reader)?;
        let signature = ed25519::Signature::read(reader)?;

        Ok(Self {
            expiration,
            ref_block_num,
            payload,
            public,
            signature,
        })
    }
}

impl EncodeSize for Transaction {
    fn encode_size(&self) -> usize {
        UInt(self.expiration).encode_size()
            + self.ref_block_num.encode_size()
            + self.payload.encode_size()
            + self.public.encode_size()
            + self.signature.encode_size()
    }
}

impl Digestible for Transaction {
    type Digest = Digest;

    fn digest(&self) -> Digest {
        let mut hasher = Sha256::new();
        hasher.update(&self.expiration.to_be_bytes());
        hasher.update(&self.ref_block_num.to_be_bytes());
        hasher.update(&self.payload);
        hasher.update(self.public.as_ref());
        // Any valid signature authorizes the same transaction, so it is not part of the id.
        hasher.finalize()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub previous: Digest,
    pub block_num: u32,
    pub timestamp: u64,
    pub producer: PublicKey,

    pub transactions: Vec<Transaction>,

    digest: Digest,
}

impl Block {
    fn compute_digest(
        previous: &Digest,
        block_num: u32,
        timestamp: u64,
        producer: &PublicKey,
        transactions: &[Transaction],
    ) -> Digest {
        let mut hasher = Sha256::new();
        hasher.update(previous);
        hasher.update(&block_num.to_be_bytes());
        hasher.update(&timestamp.to_be_bytes());
        hasher.update(producer.as_ref());
        for transaction in transactions {
            hasher.update(&transaction.digest());
        }
        hasher.finalize()
    }

    pub fn new(
        previous: Digest,
        block_num: u32,
        timestamp: u64,
        producer: PublicKey,
        transactions: Vec<Transaction>,
    ) -> Self {
        assert!(transactions.len() <= MAX_BLOCK_TRANSACTIONS);
        let digest =
            Self::compute_digest(&previous, block_num, timestamp, &producer, &transactions);
        Self {
            previous,
            block_num,
            timestamp,
            producer,
            transactions,
            digest,
        }
    }

    pub fn id(&self) -> Id {
        self.digest
    }
}

impl Write for Block {
    fn write(&self, writer: &mut impl BufMut) {
        self.previous.write(writer);
        self.block_num.write(writer);
        UInt(self.timestamp).write(writer);
        self.producer.write(writer);
        self.transactions.write(writer);
    }
}

impl Read for Block {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let previous = Digest::read(reader)?;
        let block_num = u32::read(reader)?;
        let timestamp = UInt::read(reader)?.into();
        let producer = PublicKey::read(reader)?;
        let transactions = Vec::<Transaction>::read_cfg(
            reader,
            &(RangeCfg::from(0..=MAX_BLOCK_TRANSACTIONS), ()),
        )?;

        // Pre-compute the digest
        let digest =
            Self::compute_digest(&previous, block_num, timestamp, &producer, &transactions);
        Ok(Self {
            previous,
            block_num,
            timestamp,
            producer,
            transactions,
            digest,
        })
    }
}

impl EncodeSize for Block {
    fn encode_size(&self) -> usize {
        self.previous.encode_size()
            + self.block_num.encode_size()
            + UInt(self.timestamp).encode_size()
            + self.producer.encode_size()
            + self.transactions.encode_size()
    }
}

impl Digestible for Block {
    type Digest = Digest;

    fn digest(&self) -> Digest {
        self.digest
    }
}

/// A block as tracked by the fork database.
///
/// Carries the consensus bookkeeping the node indexes candidates by: the
/// irreversibility watermarks reached under DPoS and BFT confirmation, and
/// whether the block is on the branch the node currently follows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockState {
    pub id: Id,
    pub previous: Id,
    pub block_num: u32,
    pub dpos_irreversible_blocknum: u32,
    pub bft_irreversible_blocknum: u32,
    pub in_current_chain: bool,
    pub block: Arc<Block>,
}

impl BlockState {
    pub fn new(block: Block, dpos_irreversible_blocknum: u32) -> Self {
        Self {
            id: block.id(),
            previous: block.previous,
            block_num: block.block_num,
            dpos_irreversible_blocknum,
            bft_irreversible_blocknum: 0,
            in_current_chain: false,
            block: Arc::new(block),
        }
    }

    /// The highest irreversible block number this block attests to.
    pub fn irreversible_blocknum(&self) -> u32 {
        self.dpos_irreversible_blocknum
            .max(self.bft_irreversible_blocknum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commonware_codec::{DecodeExt, Encode};
    use commonware_cryptography::{ed25519::PrivateKey, Signer};

    #[test]
    fn test_transaction_sign_verify() {
        let private = PrivateKey::from_seed(1);
        let tx = Transaction::sign(&private, 60, 7, b"transfer".to_vec());
        assert!(tx.verify());

        let mut tampered = tx.clone();
        tampered.expiration += 1;
        assert!(!tampered.verify());
        assert_ne!(tampered.id(), tx.id());
    }

    #[test]
    fn test_transaction_id_ignores_signature() {
        let private = PrivateKey::from_seed(2);
        let tx = Transaction::sign(&private, 60, 7, vec![1, 2, 3]);
        let mut resigned = tx.clone();
        resigned.signature = private.sign(&b"other"[..], b"payload");
        assert_eq!(resigned.id(), tx.id());
    }

    #[test]
    fn test_block_codec_preserves_id() {
        let private = PrivateKey::from_seed(3);
        let txs = vec![
            Transaction::sign(&private, 10, 1, vec![0xAA]),
            Transaction::sign(&private, 11, 1, vec![0xBB]),
        ];
        let block = Block::new(
            Sha256::hash(b"parent"),
            2,
            1_000,
            private.public_key(),
            txs,
        );

        let decoded = Block::decode(block.encode()).unwrap();
        assert_eq!(decoded, block);
        assert_eq!(decoded.id(), block.id());
        assert_eq!(block.encode().len(), block.encode_size());
    }

    #[test]
    fn test_block_state_tracks_block() {
        let private = PrivateKey::from_seed(4);
        let parent = Sha256::hash(b"parent");
        let block = Block::new(parent, 9, 0, private.public_key(), Vec::new());
        let mut state = BlockState::new(block.clone(), 5);

        assert_eq!(state.id, block.id());
        assert_eq!(state.previous, parent);
        assert_eq!(state.block_num, 9);
        assert!(!state.in_current_chain);
        assert_eq!(state.irreversible_blocknum(), 5);
        state.bft_irreversible_blocknum = 8;
        assert_eq!(state.irreversible_blocknum(), 8);
    }
}
