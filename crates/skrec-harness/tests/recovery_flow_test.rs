//! End-to-end recovery over a durable ledger.
//!
//! Challenge transactions are posted through the ledger facade, cut into
//! certified blocks by the orderer, read back from redb and presented to the
//! enclave windows.

use skrec_crypto::KeyPair;
use skrec_enclave::{
    Enclave, EnclaveConfig, EnclaveError, RecoveryPhase, Window, WindowStatus, WindowVerdict,
};
use skrec_harness::{Committee, EscrowClient, Requester, SeededEnv};
use skrec_ledger::{
    Block, Ledger, LedgerConfig, Orderer, Payload, QuorumValidator, RedbStore, Signer, Transaction,
};
use tempfile::tempdir;

const PERM: &[u8] = b"alice@example";
const SECRET: &[u8] = b"correct horse|battery staple";

fn enclave(seed: u64) -> Enclave<SeededEnv, QuorumValidator> {
    let enclave =
        Enclave::new(SeededEnv::with_seed(seed), QuorumValidator::new(1), EnclaveConfig::default());
    enclave.install();
    enclave
}

fn post(
    ledger: &Ledger<RedbStore, Orderer<RedbStore>>,
    poster: &KeyPair,
    tx_type: &str,
    round: usize,
) -> Transaction {
    let payload = Payload::from([("round".to_string(), round.to_string())]);
    let signer = Signer::sign(poster, &Transaction::signing_bytes(&payload));
    ledger.post(tx_type, payload, signer).unwrap()
}

#[test]
fn recovery_over_durable_ledger() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("chain.redb");
    let committee = Committee::new(1, 5);
    let poster = KeyPair::from_seed(&[9; 32]);

    let enclave = enclave(1);
    let enclave_key = enclave.verification_key().unwrap();
    let mut client = EscrowClient::new(10);
    let requester = Requester::new(20);
    let server = KeyPair::from_seed(&[2; 32]);

    client.escrow(&enclave, &enclave_key).unwrap();
    let ciphertext = client.seal_secret(PERM, SECRET);
    enclave.set_client_secret(client.key_id(), ciphertext.clone());
    assert_eq!(enclave.verify_ciphertext(&client.key_id(), PERM, &ciphertext), Ok(true));

    let stored = enclave.client_secret(&client.key_id()).unwrap();
    let id = enclave
        .begin_recovery(requester.request(client.key_id(), stored, PERM, &server))
        .unwrap();

    {
        let store = RedbStore::open(&path).unwrap();
        let ledger = Ledger::new(store.clone(), Orderer::new(store, LedgerConfig::default()));

        for round in 0..3 {
            let challenge = post(&ledger, &poster, "challenge", round);
            post(&ledger, &poster, "commitment", round);
            let block = committee.cut(ledger.orderer()).unwrap();

            let containing = ledger.find_block_containing(challenge.id()).unwrap().unwrap();
            assert_eq!(containing.number(), block.number());
        }
    }

    let store = RedbStore::open(&path).unwrap();
    let ledger = Ledger::new(store.clone(), Orderer::new(store, LedgerConfig::default()));
    assert_eq!(ledger.latest_block().unwrap().unwrap().number(), 2);

    for number in 0..3 {
        let block = ledger.block_by_number(number).unwrap().unwrap();
        assert_eq!(enclave.verify_chal_window_c(id, &block), Ok(WindowVerdict::Valid));
        assert_eq!(enclave.verify_chal_window_req(id, &block), Ok(WindowVerdict::Valid));
        assert_eq!(enclave.verify_com_window(id, &block), Ok(WindowVerdict::Valid));
    }
    assert_eq!(enclave.recovery_phase(id), Some(RecoveryPhase::Ready));

    let output = enclave.end_recovery(id).unwrap();
    let plaintext = requester.open(&output, &enclave_key, PERM).unwrap();

    assert_eq!(plaintext, [PERM, b"|", SECRET].concat());
    assert_eq!(enclave.recovery_phase(id), None);
}

#[test]
fn forked_block_invalidates_window() {
    let committee = Committee::new(1, 5);
    let main = committee.chain(3, "challenge", &KeyPair::from_seed(&[1; 32]));
    let fork = committee.chain(3, "challenge", &KeyPair::from_seed(&[2; 32]));

    let enclave = enclave(2);
    let enclave_key = enclave.verification_key().unwrap();
    let mut client = EscrowClient::new(10);
    client.escrow(&enclave, &enclave_key).unwrap();
    let requester = Requester::new(20);
    let ciphertext = client.seal_secret(PERM, SECRET);
    let id = enclave
        .begin_recovery(requester.request(
            client.key_id(),
            ciphertext,
            PERM,
            &KeyPair::from_seed(&[3; 32]),
        ))
        .unwrap();

    assert_eq!(enclave.verify_com_window(id, &main[0]), Ok(WindowVerdict::Valid));
    assert_eq!(enclave.verify_com_window(id, &fork[1]), Ok(WindowVerdict::Invalid));
    assert_eq!(enclave.verify_com_window(id, &main[1]), Ok(WindowVerdict::Declined));

    let statuses = enclave.window_status(id).unwrap();
    assert_eq!(statuses[2], (Window::Commitment, WindowStatus::Invalid));
    assert!(matches!(
        enclave.end_recovery(id),
        Err(EnclaveError::RecoveryNotAuthorized { reason }) if reason.contains("com_window")
    ));
}

#[test]
fn restarted_session_starts_clean() {
    let committee = Committee::new(1, 5);
    let blocks: Vec<Block> = committee.chain(2, "challenge", &KeyPair::from_seed(&[1; 32]));

    let enclave = enclave(3);
    let enclave_key = enclave.verification_key().unwrap();
    let mut client = EscrowClient::new(10);
    client.escrow(&enclave, &enclave_key).unwrap();
    let requester = Requester::new(20);
    let server = KeyPair::from_seed(&[3; 32]);

    let first = enclave
        .begin_recovery(requester.request(
            client.key_id(),
            client.seal_secret(PERM, SECRET),
            PERM,
            &server,
        ))
        .unwrap();
    enclave.verify_chal_window_c(first, &blocks[1]).unwrap();
    enclave.verify_chal_window_c(first, &blocks[0]).unwrap();

    let second = enclave
        .begin_recovery(requester.request(
            client.key_id(),
            client.seal_secret(PERM, SECRET),
            PERM,
            &server,
        ))
        .unwrap();

    assert_eq!(enclave.window_status(first), None);
    let statuses = enclave.window_status(second).unwrap();
    assert!(statuses.iter().all(|(_, status)| *status == WindowStatus::Unset));
}
