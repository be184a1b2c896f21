//! Crash recovery tests for `RedbStore`.
//!
//! These tests verify that blocks and the transaction index persist across
//! database close/reopen cycles, and that an orderer restarted over the
//! reopened store continues the chain.

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use skrec_crypto::KeyPair;
use skrec_ledger::{
    Block, BlockStore, LedgerConfig, Orderer, OrderingService, Payload, RedbStore, Transaction,
};
use tempfile::tempdir;

fn keypair(seed: u64) -> KeyPair {
    KeyPair::generate(&mut ChaCha20Rng::seed_from_u64(seed))
}

fn tx(n: u64) -> Transaction {
    Transaction::signed("store", Payload::from([("n".to_string(), n.to_string())]), &keypair(99))
}

#[test]
fn test_blocks_survive_restart() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("ledger.redb");

    let creator = keypair(0);
    let verifiers: Vec<_> = (1..=3).map(keypair).collect();
    let block_count = 5;

    let mut committed = Vec::new();
    let mut txs = Vec::new();

    // Commit blocks, then simulate clean shutdown
    {
        let orderer = Orderer::new(RedbStore::open(&db_path).unwrap(), LedgerConfig::default());

        for n in 0..block_count {
            let tx = tx(n);
            orderer.submit(&tx).unwrap();
            committed.push(orderer.cut_block(&creator, &verifiers).unwrap());
            txs.push(tx);
        }

        // Database dropped
    }

    // Reopen and verify every block and index entry
    {
        let store = RedbStore::open(&db_path).unwrap();

        let latest = store.latest_block().unwrap().unwrap();
        assert_eq!(latest.number(), block_count - 1);

        let mut previous: Option<Block> = None;
        for (n, expected) in committed.iter().enumerate() {
            let block = Block::from_number(&store, n as u64).unwrap().unwrap();
            assert_eq!(&block, expected);
            assert!(block.check_against(previous.as_ref(), 1).is_ok());
            previous = Some(block);
        }

        for (n, tx) in txs.iter().enumerate() {
            let record = store.block_by_transaction_id(tx.id()).unwrap().unwrap();
            assert_eq!(record.number(), n as u64);
        }
    }
}

#[test]
fn test_orderer_resumes_after_restart() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("ledger.redb");

    let creator = keypair(0);
    let verifiers: Vec<_> = (1..=3).map(keypair).collect();

    let genesis = {
        let orderer = Orderer::new(RedbStore::open(&db_path).unwrap(), LedgerConfig::default());
        orderer.submit(&tx(0)).unwrap();
        orderer.cut_block(&creator, &verifiers).unwrap()
    };

    let orderer = Orderer::new(RedbStore::open(&db_path).unwrap(), LedgerConfig::default());
    orderer.submit(&tx(1)).unwrap();
    let next = orderer.cut_block(&creator, &verifiers).unwrap();

    assert_eq!(next.number(), 1);
    assert!(next.verify_previous(&genesis));
}

#[test]
fn test_write_once_survives_restart() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("ledger.redb");

    let creator = keypair(0);
    let genesis = {
        let orderer = Orderer::new(RedbStore::open(&db_path).unwrap(), LedgerConfig::default());
        orderer.submit(&tx(0)).unwrap();
        orderer.cut_block(&creator, &[]).unwrap()
    };

    let store = RedbStore::open(&db_path).unwrap();
    assert!(store.save_block(&genesis.to_canonical()).is_err());
    assert_eq!(store.latest_block().unwrap(), Some(genesis.to_canonical()));
}
