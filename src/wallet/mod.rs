// Koinu
// Copyright (c) 2024 Koinu Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Wallet
//!
//! This module defines the [`Wallet`]: one external (receive) descriptor, an
//! optional internal (change) descriptor, a watermark of revealed addresses
//! per keychain, and the set of outputs known to pay to them.

use std::fmt;
use std::ops::Deref;

use secp256k1::{All, Secp256k1};

#[allow(unused_imports)]
use log::{debug, error, info, trace};

use crate::address::Address;
use crate::descriptor::Descriptor;
use crate::error::Error;
use crate::types::{Balance, KeychainKind, LocalUtxo, Network, OutPoint, Script, TxOut};

pub mod persist;
pub mod tracker;

use persist::{ChangeSet, PersistBackend};
use tracker::SpkTracker;

pub(crate) type SecpCtx = Secp256k1<All>;

/// The address-selection policy for [`Wallet::get_address`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressIndex {
    /// Reveal the address at the watermark and advance it
    New,
    /// Return the most recently revealed address if no tracked output pays to
    /// it, otherwise behave like [`New`](Self::New). A fresh keychain with
    /// nothing revealed also behaves like [`New`](Self::New)
    LastUnused,
    /// Derive the address at a fixed index without touching the watermark.
    ///
    /// Peeking above the watermark does not reveal anything: the wallet will
    /// not consider outputs to a peeked address its own until [`New`](Self::New)
    /// catches up to it.
    Peek(u32),
}

/// A derived address, together with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressInfo {
    /// Child index the address was derived at
    pub index: u32,
    /// The address
    pub address: Address,
    /// Keychain the address was derived on
    pub keychain: KeychainKind,
}

impl Deref for AddressInfo {
    type Target = Address;

    fn deref(&self) -> &Self::Target {
        &self.address
    }
}

impl fmt::Display for AddressInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address)
    }
}

/// A descriptor-based wallet.
///
/// Generic over its persistence backend `D`; the default `()` backend keeps
/// everything in memory and forgets it on drop.
#[derive(Debug)]
pub struct Wallet<D = ()> {
    descriptor: Descriptor,
    change_descriptor: Option<Descriptor>,
    tracker: SpkTracker,
    stage: ChangeSet,
    db: D,
    network: Network,
    secp: SecpCtx,
}

impl Wallet<()> {
    /// Create a wallet with no persistence.
    pub fn new_no_persist(
        descriptor: &str,
        change_descriptor: Option<&str>,
        network: Network,
    ) -> Result<Self, Error> {
        Self::new(descriptor, change_descriptor, network, ())
    }
}

impl<D> Wallet<D>
where
    D: PersistBackend<ChangeSet>,
{
    /// Create a wallet from descriptor strings, replaying any state already
    /// recorded in `db`.
    ///
    /// Both descriptors must be declared for `network`; the embedded keys are
    /// checked against it.
    pub fn new(
        descriptor: &str,
        change_descriptor: Option<&str>,
        network: Network,
        mut db: D,
    ) -> Result<Self, Error> {
        let secp = Secp256k1::new();
        let descriptor = Descriptor::new(descriptor, network)?;
        let change_descriptor = change_descriptor
            .map(|change| Descriptor::new(change, network))
            .transpose()?;

        let changeset = db
            .load_from_persistence()
            .map_err(|err| Error::Persist(format!("{:?}", err)))?;

        let mut tracker = SpkTracker::default();
        for (&keychain, &next) in &changeset.next_index {
            let keychain_descriptor = match keychain {
                KeychainKind::External => &descriptor,
                KeychainKind::Internal => change_descriptor.as_ref().unwrap_or(&descriptor),
            };
            for index in 0..next {
                let spk = keychain_descriptor.script_pubkey_at(&secp, index)?;
                tracker.reveal(keychain, index, spk);
            }
        }
        for utxo in changeset.utxos {
            tracker.insert_utxo(utxo);
        }

        debug!(
            "loaded wallet for {}, {} receive addresses revealed",
            network,
            tracker.next_index(KeychainKind::External)
        );

        Ok(Wallet {
            descriptor,
            change_descriptor,
            tracker,
            stage: ChangeSet::default(),
            db,
            network,
            secp,
        })
    }

    /// The network this wallet was created for.
    pub fn network(&self) -> Network {
        self.network
    }

    /// Return an address from the external keychain according to `address_index`.
    pub fn get_address(&mut self, address_index: AddressIndex) -> Result<AddressInfo, Error> {
        self._get_address(address_index, KeychainKind::External)
    }

    /// Return an address from the internal keychain according to `address_index`.
    ///
    /// Falls back to the external keychain when the wallet has no change
    /// descriptor.
    pub fn get_internal_address(
        &mut self,
        address_index: AddressIndex,
    ) -> Result<AddressInfo, Error> {
        self._get_address(address_index, KeychainKind::Internal)
    }

    fn _get_address(
        &mut self,
        address_index: AddressIndex,
        keychain: KeychainKind,
    ) -> Result<AddressInfo, Error> {
        let keychain = self.map_keychain(keychain);

        let index = match address_index {
            AddressIndex::New => self.tracker.next_index(keychain),
            AddressIndex::LastUnused => self
                .tracker
                .last_unused_index(keychain)
                .unwrap_or_else(|| self.tracker.next_index(keychain)),
            AddressIndex::Peek(index) => index,
        };

        let script = self
            .keychain_descriptor(keychain)
            .script_pubkey_at(&self.secp, index)?;
        let address = Address::from_script(&script, self.network)
            .map_err(|_| Error::ScriptDoesntHaveAddressForm)?;

        if !matches!(address_index, AddressIndex::Peek(_)) {
            self.tracker.reveal(keychain, index, script);
            self.stage
                .next_index
                .insert(keychain, self.tracker.next_index(keychain));
            debug!("revealed {} address at index {}", keychain, index);
        }

        Ok(AddressInfo {
            index,
            address,
            keychain,
        })
    }

    /// Ingest an output found on chain.
    ///
    /// `confirmations` of zero means the funding transaction is unconfirmed.
    /// Errors with [`Error::UnownedOutput`] and changes nothing when the
    /// output's script was not issued by this wallet.
    pub fn insert_utxo(
        &mut self,
        outpoint: OutPoint,
        txout: TxOut,
        confirmations: u32,
    ) -> Result<LocalUtxo, Error> {
        let (keychain, index) = self
            .tracker
            .index_of_spk(&txout.script_pubkey)
            .ok_or(Error::UnownedOutput(outpoint))?;

        let utxo = LocalUtxo {
            outpoint,
            txout,
            keychain,
            confirmations,
        };
        self.tracker.insert_utxo(utxo.clone());
        self.stage.utxos.push(utxo.clone());

        debug!(
            "tracked output {} paying to {} index {}",
            utxo.outpoint, keychain, index
        );
        Ok(utxo)
    }

    /// All outputs the wallet is tracking, ordered by outpoint.
    pub fn list_unspent(&self) -> Vec<LocalUtxo> {
        self.tracker.utxos().cloned().collect()
    }

    /// The wallet balance, split by confirmation status.
    pub fn get_balance(&self) -> Balance {
        let mut balance = Balance::default();
        for utxo in self.tracker.utxos() {
            if utxo.confirmations > 0 {
                balance.confirmed += utxo.txout.value;
            } else {
                balance.unconfirmed += utxo.txout.value;
            }
        }
        balance
    }

    /// Whether `script` was issued by this wallet (at or below the watermark).
    pub fn is_mine(&self, script: &Script) -> bool {
        self.tracker.index_of_spk(script).is_some()
    }

    /// The keychain and child index that derived `script`, if this wallet
    /// revealed it.
    pub fn derivation_of_spk(&self, script: &Script) -> Option<(KeychainKind, u32)> {
        self.tracker.index_of_spk(script)
    }

    /// The descriptor text for `keychain`, checksum included.
    pub fn public_descriptor(&self, keychain: KeychainKind) -> String {
        self.keychain_descriptor(self.map_keychain(keychain)).to_string()
    }

    /// The checksum of the descriptor backing `keychain`.
    pub fn descriptor_checksum(&self, keychain: KeychainKind) -> String {
        let text = self.public_descriptor(keychain);
        text.split('#').last().unwrap_or_default().to_string()
    }

    /// Changes accumulated since the last [`commit`](Self::commit).
    pub fn staged(&self) -> &ChangeSet {
        &self.stage
    }

    /// Write the staged changes to the persistence backend and clear the
    /// stage. A no-op when nothing is staged.
    pub fn commit(&mut self) -> Result<(), Error> {
        if self.stage.is_empty() {
            return Ok(());
        }
        self.db
            .write_changes(&self.stage)
            .map_err(|err| Error::Persist(format!("{:?}", err)))?;
        self.stage = ChangeSet::default();
        Ok(())
    }

    fn keychain_descriptor(&self, keychain: KeychainKind) -> &Descriptor {
        match keychain {
            KeychainKind::External => &self.descriptor,
            KeychainKind::Internal => self.change_descriptor.as_ref().unwrap_or(&self.descriptor),
        }
    }

    fn map_keychain(&self, keychain: KeychainKind) -> KeychainKind {
        if keychain == KeychainKind::Internal && self.change_descriptor.is_none() {
            KeychainKind::External
        } else {
            keychain
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const DESC: &str = "wpkh([c258d2e4/84h/1h/0h]tpubDDYkZojQFQjht8Tm4jsS3iuEmKjTiEGjG6KnuFNKKJb5A6ZUCUZKdvLdSDWofKi4ToRCwb9poe1XdqfUnP4jaJjCB2Zwv11ZLgSbnZSNecE/0/*)";

    #[test]
    fn test_internal_maps_to_external_without_change_descriptor() {
        let mut wallet = Wallet::new_no_persist(DESC, None, Network::Testnet).unwrap();

        let info = wallet.get_internal_address(AddressIndex::New).unwrap();
        assert_eq!(info.keychain, KeychainKind::External);
        assert_eq!(info.index, 0);

        // both keychains draw from the same watermark
        let info = wallet.get_address(AddressIndex::New).unwrap();
        assert_eq!(info.index, 1);
    }

    #[test]
    fn test_descriptor_checksum_is_exported() {
        let wallet = Wallet::new_no_persist(DESC, None, Network::Testnet).unwrap();

        let checksum = wallet.descriptor_checksum(KeychainKind::External);
        assert_eq!(checksum.len(), 8);
        assert!(wallet
            .public_descriptor(KeychainKind::External)
            .ends_with(&checksum));
    }

    #[test]
    fn test_address_info_derefs_to_address() {
        let mut wallet = Wallet::new_no_persist(DESC, None, Network::Testnet).unwrap();
        let info = wallet.get_address(AddressIndex::New).unwrap();

        // script_pubkey() is an Address method reached through Deref
        assert!(wallet.is_mine(&info.script_pubkey()));
        assert_eq!(info.to_string(), info.address.to_string());
    }

    #[test]
    fn test_network_mismatch_rejected_at_creation() {
        assert!(matches!(
            Wallet::new_no_persist(DESC, None, Network::Bitcoin),
            Err(Error::Descriptor(_))
        ));
    }
}
