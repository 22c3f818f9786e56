// Koinu
// Copyright (c) 2024 Koinu Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

use std::cell::RefCell;
use std::convert::Infallible;
use std::rc::Rc;

use koinu::bitcoin_hashes::Hash;
use koinu::keys::{self, WordCount};
use koinu::wallet::persist::{ChangeSet, PersistBackend};
use koinu::{
    AddressIndex, Descriptor, Error, KeychainKind, Network, OutPoint, TxOut, Txid, Wallet,
};

const DESC: &str = "wpkh([c258d2e4/84h/1h/0h]tpubDDYkZojQFQjht8Tm4jsS3iuEmKjTiEGjG6KnuFNKKJb5A6ZUCUZKdvLdSDWofKi4ToRCwb9poe1XdqfUnP4jaJjCB2Zwv11ZLgSbnZSNecE/0/*)";

fn testnet_wallet() -> Wallet {
    let _ = env_logger::try_init();
    Wallet::new_no_persist(DESC, None, Network::Testnet).expect("wallet")
}

fn outpoint(tag: &[u8], vout: u32) -> OutPoint {
    OutPoint::new(Txid::hash(tag), vout)
}

#[test]
fn test_new_address_matches_known_derivation() {
    let mut wallet = testnet_wallet();

    let info = wallet.get_address(AddressIndex::New).unwrap();
    assert_eq!(
        info.to_string(),
        "tb1qzg4mckdh50nwdm9hkzq06528rsu73hjxxzem3e"
    );
    assert_eq!(info.index, 0);
    assert_eq!(info.keychain, KeychainKind::External);
}

#[test]
fn test_fresh_wallet_has_zero_balance() {
    let wallet = testnet_wallet();

    let balance = wallet.get_balance();
    assert_eq!(balance.confirmed, 0);
    assert_eq!(balance.unconfirmed, 0);
    assert_eq!(balance.total(), 0);
    assert!(wallet.list_unspent().is_empty());
}

#[test]
fn test_new_advances_the_watermark() {
    let mut wallet = testnet_wallet();

    let first = wallet.get_address(AddressIndex::New).unwrap();
    let second = wallet.get_address(AddressIndex::New).unwrap();
    assert_eq!(first.index, 0);
    assert_eq!(second.index, 1);
    assert_ne!(first.address, second.address);
}

#[test]
fn test_peek_is_stable_and_does_not_advance() {
    let mut wallet = testnet_wallet();

    let peeked = wallet.get_address(AddressIndex::Peek(5)).unwrap();
    assert_eq!(peeked, wallet.get_address(AddressIndex::Peek(5)).unwrap());

    // the watermark never moved, so New still starts at zero
    let first = wallet.get_address(AddressIndex::New).unwrap();
    assert_eq!(first.index, 0);
    assert_eq!(
        first.address,
        wallet.get_address(AddressIndex::Peek(0)).unwrap().address
    );

    // a peeked-but-unrevealed script is not considered owned
    assert!(!wallet.is_mine(&peeked.script_pubkey()));
}

#[test]
fn test_last_unused_reuses_until_funded() {
    let mut wallet = testnet_wallet();

    // nothing revealed yet: LastUnused behaves like New at index zero
    let first = wallet.get_address(AddressIndex::LastUnused).unwrap();
    assert_eq!(first.index, 0);

    // still unused, so it comes back unchanged
    let again = wallet.get_address(AddressIndex::LastUnused).unwrap();
    assert_eq!(again, first);

    // funding the address moves LastUnused on
    wallet
        .insert_utxo(
            outpoint(b"funding", 0),
            TxOut {
                value: 50_000,
                script_pubkey: first.script_pubkey(),
            },
            1,
        )
        .unwrap();
    let next = wallet.get_address(AddressIndex::LastUnused).unwrap();
    assert_eq!(next.index, 1);

    // only the watermark's edge is ever reused: fund it and LastUnused
    // advances again, it never goes back looking for gaps
    wallet
        .insert_utxo(
            outpoint(b"funding2", 0),
            TxOut {
                value: 20_000,
                script_pubkey: next.script_pubkey(),
            },
            0,
        )
        .unwrap();
    assert_eq!(wallet.get_address(AddressIndex::LastUnused).unwrap().index, 2);
}

#[test]
fn test_unowned_output_is_rejected_without_side_effects() {
    let mut wallet = testnet_wallet();
    wallet.get_address(AddressIndex::New).unwrap();

    let foreign = TxOut {
        value: 10_000,
        script_pubkey: koinu::Script::from_bytes(vec![0x6a]),
    };
    let op = outpoint(b"foreign", 1);
    match wallet.insert_utxo(op, foreign, 1) {
        Err(Error::UnownedOutput(rejected)) => assert_eq!(rejected, op),
        other => panic!("expected UnownedOutput, got {:?}", other),
    }

    assert_eq!(wallet.get_balance().total(), 0);
    assert!(wallet.list_unspent().is_empty());
}

#[test]
fn test_balance_splits_by_confirmation() {
    let mut wallet = testnet_wallet();
    let a = wallet.get_address(AddressIndex::New).unwrap();
    let b = wallet.get_address(AddressIndex::New).unwrap();

    wallet
        .insert_utxo(
            outpoint(b"confirmed", 0),
            TxOut {
                value: 70_000,
                script_pubkey: a.script_pubkey(),
            },
            3,
        )
        .unwrap();
    wallet
        .insert_utxo(
            outpoint(b"pending", 0),
            TxOut {
                value: 5_000,
                script_pubkey: b.script_pubkey(),
            },
            0,
        )
        .unwrap();

    let balance = wallet.get_balance();
    assert_eq!(balance.confirmed, 70_000);
    assert_eq!(balance.unconfirmed, 5_000);
    assert_eq!(balance.total(), 75_000);
    assert_eq!(wallet.list_unspent().len(), 2);
}

#[test]
fn test_bip86_wallet_from_fresh_mnemonic() {
    let mnemonic = keys::generate_mnemonic(WordCount::Words12).unwrap();
    let root = keys::master_key(Network::Testnet, &mnemonic, None).unwrap();

    let external = Descriptor::new_bip86(root, KeychainKind::External, Network::Testnet).unwrap();
    let internal = Descriptor::new_bip86(root, KeychainKind::Internal, Network::Testnet).unwrap();
    assert!(external.to_string().starts_with("tr("));

    let mut wallet = Wallet::new_no_persist(
        &external.to_string(),
        Some(&internal.to_string()),
        Network::Testnet,
    )
    .unwrap();

    let info = wallet.get_address(AddressIndex::New).unwrap();
    assert_eq!(info.index, 0);
    assert!(info.to_string().starts_with("tb1p"));
    assert_eq!(wallet.get_balance().total(), 0);

    let change = wallet.get_internal_address(AddressIndex::New).unwrap();
    assert_eq!(change.keychain, KeychainKind::Internal);
    assert_ne!(change.address, info.address);
}

/// Keeps every committed change set in memory, shared between clones so a
/// wallet can be reopened on the same backend.
#[derive(Clone, Default)]
struct MemoryBackend(Rc<RefCell<Vec<ChangeSet>>>);

impl PersistBackend<ChangeSet> for MemoryBackend {
    type WriteError = Infallible;
    type LoadError = Infallible;

    fn write_changes(&mut self, changeset: &ChangeSet) -> Result<(), Self::WriteError> {
        self.0.borrow_mut().push(changeset.clone());
        Ok(())
    }

    fn load_from_persistence(&mut self) -> Result<ChangeSet, Self::LoadError> {
        let mut aggregate = ChangeSet::default();
        for changeset in self.0.borrow().iter() {
            aggregate.append(changeset.clone());
        }
        Ok(aggregate)
    }
}

#[test]
fn test_reopened_wallet_resumes_where_it_left_off() {
    let backend = MemoryBackend::default();

    let funded = {
        let mut wallet = Wallet::new(DESC, None, Network::Testnet, backend.clone()).unwrap();
        let first = wallet.get_address(AddressIndex::New).unwrap();
        wallet.get_address(AddressIndex::New).unwrap();
        wallet.get_address(AddressIndex::New).unwrap();

        wallet
            .insert_utxo(
                outpoint(b"persisted", 0),
                TxOut {
                    value: 25_000,
                    script_pubkey: first.script_pubkey(),
                },
                2,
            )
            .unwrap();

        assert!(!wallet.staged().is_empty());
        wallet.commit().unwrap();
        assert!(wallet.staged().is_empty());
        first
    };

    let mut reopened = Wallet::new(DESC, None, Network::Testnet, backend).unwrap();

    // the watermark survived, so New continues past the revealed addresses
    assert_eq!(reopened.get_address(AddressIndex::New).unwrap().index, 3);
    // and the tracked output came back with it
    assert_eq!(reopened.get_balance().confirmed, 25_000);
    assert!(reopened.is_mine(&funded.script_pubkey()));
    // index 3 is the latest revealed and nothing pays to it
    assert_eq!(
        reopened.get_address(AddressIndex::LastUnused).unwrap().index,
        3
    );
}
