//! Block model: header, data and metadata with hash-chain linkage and quorum
//! certification.
//!
//! Lifecycle:
//!
//! ```text
//! seal(tip) -> add_transaction* -> compute_data_hash -> sign_as_creator -> endorse*
//!   (open)                           (hashed)            (sealed)
//! ```
//!
//! Creator and verifiers all sign [`Block::signable_payload`], which covers
//! the transactions and the previous hash. The data hash is derived from the
//! transactions and is not itself signed.

use std::{
    collections::{BTreeMap, HashSet},
    fmt,
};

use serde::{Deserialize, Serialize};
use skrec_crypto::{KeyId, KeyPair, sha256};

use crate::{
    codec::{from_cbor, to_cbor},
    config::quorum,
    error::LedgerError,
    storage::{BlockStore, StorageError},
    transaction::{Signer, Transaction, TxId},
};

/// SHA-256 digest identifying a block's contents.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockHash(pub [u8; 32]);

impl BlockHash {
    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockHash({self})")
    }
}

/// Block header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Position in the chain, starting at 0
    pub number: u64,
    /// Chain this block belongs to
    pub chain_id: String,
    /// Hash of the block's transactions, `None` until computed
    pub data_hash: Option<BlockHash>,
    /// Data hash of the previous block, `None` for genesis
    pub previous_hash: Option<BlockHash>,
}

/// Block metadata: who created and who certified the block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockMetaData {
    /// Free-form flags set by the ordering service
    pub bitmap: Option<BTreeMap<String, String>>,
    /// Creator signature over the signable payload
    pub creator: Option<Signer>,
    /// Verifier signatures over the same payload, in collection order
    pub verifiers: Vec<Signer>,
    /// Number of the last configuration block
    pub last_config_block_number: u64,
}

#[derive(Serialize)]
struct SignablePayload<'a> {
    data: &'a [Transaction],
    previous_hash: &'a Option<BlockHash>,
}

/// One ledger entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    header: BlockHeader,
    transactions: Vec<Transaction>,
    metadata: BlockMetaData,
}

impl Block {
    /// Start a new block on top of `latest`.
    ///
    /// The new block is numbered `latest.number + 1` and links to
    /// `latest.data_hash`; with no tip it is block 0 with no previous hash.
    pub fn seal(latest: Option<&Block>, chain_id: impl Into<String>) -> Self {
        let (number, previous_hash) = match latest {
            Some(tip) => (tip.header.number + 1, tip.header.data_hash),
            None => (0, None),
        };

        let chain_id = chain_id.into();
        Self {
            header: BlockHeader { number, chain_id, data_hash: None, previous_hash },
            transactions: Vec::new(),
            metadata: BlockMetaData::default(),
        }
    }

    /// Load and decode block `number` from `store`.
    pub fn from_number<S: BlockStore>(store: &S, number: u64) -> Result<Option<Self>, LedgerError> {
        store.block_by_number(number)?.map(Self::from_canonical).transpose()
    }

    /// Append a transaction and return its id.
    ///
    /// Clears a previously computed data hash.
    ///
    /// # Errors
    ///
    /// - `BlockSealed`: the creator has already signed
    pub fn add_transaction(&mut self, tx: Transaction) -> Result<TxId, LedgerError> {
        self.ensure_open()?;

        let id = tx.id().clone();
        self.transactions.push(tx);
        self.header.data_hash = None;

        Ok(id)
    }

    /// Decode a CBOR transaction and append it.
    ///
    /// # Errors
    ///
    /// - `InvalidTransaction`: bytes do not decode to a transaction
    /// - `BlockSealed`: the creator has already signed
    pub fn add_transaction_bytes(&mut self, bytes: &[u8]) -> Result<TxId, LedgerError> {
        self.ensure_open()?;
        self.add_transaction(Transaction::from_bytes(bytes)?)
    }

    /// Hash the transactions and record the result in the header.
    pub fn compute_data_hash(&mut self) -> Result<BlockHash, LedgerError> {
        self.ensure_open()?;

        let hash = self.recompute_data_hash();
        self.header.data_hash = Some(hash);
        Ok(hash)
    }

    /// Hash of the current transactions, without touching the header.
    pub fn recompute_data_hash(&self) -> BlockHash {
        BlockHash(sha256(&to_cbor(&self.transactions)))
    }

    /// Bytes signed by the creator and every verifier.
    pub fn signable_payload(&self) -> Vec<u8> {
        to_cbor(&SignablePayload {
            data: &self.transactions,
            previous_hash: &self.header.previous_hash,
        })
    }

    /// Sign as the block creator. Seals the block.
    ///
    /// # Errors
    ///
    /// - `MissingDataHash`: [`Self::compute_data_hash`] was not called
    /// - `BlockSealed`: a creator already signed
    pub fn sign_as_creator(&mut self, creator: &KeyPair) -> Result<(), LedgerError> {
        self.ensure_open()?;
        self.ensure_hashed()?;

        self.metadata.creator = Some(Signer::sign(creator, &self.signable_payload()));
        Ok(())
    }

    /// Add a verifier signature produced with `verifier`.
    pub fn endorse(&mut self, verifier: &KeyPair) -> Result<(), LedgerError> {
        self.ensure_hashed()?;

        let signer = Signer::sign(verifier, &self.signable_payload());
        self.metadata.verifiers.push(signer);
        Ok(())
    }

    /// Add a verifier signature collected elsewhere. Not checked here;
    /// [`Self::verify`] only counts signatures that verify.
    pub fn add_verifier(&mut self, signer: Signer) -> Result<(), LedgerError> {
        self.ensure_hashed()?;

        self.metadata.verifiers.push(signer);
        Ok(())
    }

    /// Whether the creator signature verifies and at least `2f + 1` distinct
    /// verifiers signed the payload. Fails closed.
    pub fn verify(&self, fault_tolerance: usize) -> bool {
        let Some(creator) = &self.metadata.creator else {
            return false;
        };

        let payload = self.signable_payload();
        if !creator.verify(&payload) {
            return false;
        }

        let endorsed: HashSet<KeyId> = self
            .metadata
            .verifiers
            .iter()
            .filter(|signer| signer.verify(&payload))
            .map(|signer| signer.key)
            .collect();

        endorsed.len() >= quorum(fault_tolerance)
    }

    /// Whether this block links to `previous`.
    ///
    /// A block without a previous hash links to nothing, so two unhashed
    /// headers never compare equal.
    pub fn verify_previous(&self, previous: &Block) -> bool {
        self.header.previous_hash.is_some()
            && self.header.previous_hash == previous.header.data_hash
    }

    /// Full integrity check against the expected predecessor.
    ///
    /// # Errors
    ///
    /// - `ChainIntegrityViolation`: stale data hash, missing quorum, wrong
    ///   number or broken linkage
    pub fn check_against(
        &self,
        previous: Option<&Block>,
        fault_tolerance: usize,
    ) -> Result<(), LedgerError> {
        let number = self.header.number;

        if self.header.data_hash != Some(self.recompute_data_hash()) {
            return Err(LedgerError::ChainIntegrityViolation(format!(
                "block {number}: data hash does not match transactions"
            )));
        }

        if !self.verify(fault_tolerance) {
            return Err(LedgerError::ChainIntegrityViolation(format!(
                "block {number}: creator or quorum signatures do not verify"
            )));
        }

        match previous {
            Some(prev) if prev.header.number.checked_add(1) != Some(number) => {
                Err(LedgerError::ChainIntegrityViolation(format!(
                    "block {number} does not follow block {}",
                    prev.header.number
                )))
            },
            Some(prev) if !self.verify_previous(prev) => {
                Err(LedgerError::ChainIntegrityViolation(format!(
                    "block {number} does not link to block {}",
                    prev.header.number
                )))
            },
            None if number != 0 || self.header.previous_hash.is_some() => {
                Err(LedgerError::ChainIntegrityViolation(format!(
                    "block {number} claims a predecessor but none was given"
                )))
            },
            _ => Ok(()),
        }
    }

    /// First transaction with id `id`.
    pub fn find_transaction(&self, id: &TxId) -> Option<&Transaction> {
        self.transactions.iter().find(|tx| tx.id() == id)
    }

    /// Block number.
    pub fn number(&self) -> u64 {
        self.header.number
    }

    /// Chain identifier.
    pub fn chain_id(&self) -> &str {
        &self.header.chain_id
    }

    /// Recorded data hash.
    pub fn data_hash(&self) -> Option<BlockHash> {
        self.header.data_hash
    }

    /// Data hash of the previous block.
    pub fn previous_hash(&self) -> Option<BlockHash> {
        self.header.previous_hash
    }

    /// Header.
    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    /// Transactions in insertion order.
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Metadata.
    pub fn metadata(&self) -> &BlockMetaData {
        &self.metadata
    }

    /// Whether the creator has signed.
    pub fn is_sealed(&self) -> bool {
        self.metadata.creator.is_some()
    }

    /// Length of the canonical encoding in bytes.
    pub fn size(&self) -> usize {
        self.to_canonical().to_bytes().len()
    }

    /// Persisted record shape.
    pub fn to_canonical(&self) -> CanonicalBlock {
        CanonicalBlock {
            id: self.header.number,
            chain_id: self.header.chain_id.clone(),
            header: self.header.clone(),
            data: self.transactions.clone(),
            metadata: self.metadata.clone(),
        }
    }

    /// Rebuild a block from its persisted record.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument`: `_id` or `chain_id` disagree with the header
    pub fn from_canonical(record: CanonicalBlock) -> Result<Self, LedgerError> {
        if record.id != record.header.number {
            return Err(LedgerError::InvalidArgument(format!(
                "record _id {} does not match header number {}",
                record.id, record.header.number
            )));
        }

        if record.chain_id != record.header.chain_id {
            return Err(LedgerError::InvalidArgument(format!(
                "record chain {} does not match header chain {}",
                record.chain_id, record.header.chain_id
            )));
        }

        Ok(Self { header: record.header, transactions: record.data, metadata: record.metadata })
    }

    fn ensure_open(&self) -> Result<(), LedgerError> {
        if self.is_sealed() {
            return Err(LedgerError::BlockSealed { number: self.header.number });
        }
        Ok(())
    }

    fn ensure_hashed(&self) -> Result<(), LedgerError> {
        if self.header.data_hash.is_none() {
            return Err(LedgerError::MissingDataHash { number: self.header.number });
        }
        Ok(())
    }
}

/// Persisted block record: `{_id, chain_id, header, data, metadata}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalBlock {
    /// Storage key, equal to `header.number`
    #[serde(rename = "_id")]
    pub id: u64,
    /// Chain identifier, equal to `header.chain_id`
    pub chain_id: String,
    /// Block header
    pub header: BlockHeader,
    /// Transactions in block order
    pub data: Vec<Transaction>,
    /// Creator, verifiers and flags
    pub metadata: BlockMetaData,
}

impl CanonicalBlock {
    /// Block number (the storage key).
    pub fn number(&self) -> u64 {
        self.id
    }

    /// CBOR encoding.
    pub fn to_bytes(&self) -> Vec<u8> {
        to_cbor(self)
    }

    /// Decode a record written by [`Self::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StorageError> {
        from_cbor(bytes).map_err(StorageError::Serialization)
    }
}
