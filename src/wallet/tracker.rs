// Koinu
// Copyright (c) 2024 Koinu Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Index of revealed output scripts and tracked outputs.

use std::collections::{BTreeMap, HashMap};

use crate::types::{KeychainKind, LocalUtxo, OutPoint, Script};

/// Tracks the output scripts revealed per keychain and the wallet outputs
/// paying to them.
///
/// The watermark for a keychain is the number of scripts revealed on it:
/// indexes `0..next_index(keychain)` are known, everything above is not.
/// Revealed scripts are never forgotten, so index lookups stay stable across
/// the lifetime of the tracker.
#[derive(Debug, Clone, Default)]
pub struct SpkTracker {
    /// Revealed scripts, ordered by keychain then index
    spks: BTreeMap<(KeychainKind, u32), Script>,
    /// Reverse lookup from a script to the keychain and index that derived it
    spk_indices: HashMap<Script, (KeychainKind, u32)>,
    /// Watermark per keychain
    next_index: BTreeMap<KeychainKind, u32>,
    /// Outputs paying to a revealed script, keyed by location
    utxos: BTreeMap<OutPoint, LocalUtxo>,
}

impl SpkTracker {
    /// The next unrevealed index on `keychain`.
    pub fn next_index(&self, keychain: KeychainKind) -> u32 {
        self.next_index.get(&keychain).copied().unwrap_or(0)
    }

    /// Record `spk` as the script at `index` on `keychain`, advancing the
    /// watermark past it if needed.
    pub fn reveal(&mut self, keychain: KeychainKind, index: u32, spk: Script) {
        self.spk_indices.insert(spk.clone(), (keychain, index));
        self.spks.insert((keychain, index), spk);

        let next = self.next_index.entry(keychain).or_insert(0);
        if index >= *next {
            *next = index + 1;
        }
    }

    /// The script revealed at `index` on `keychain`, if any.
    pub fn spk_at(&self, keychain: KeychainKind, index: u32) -> Option<&Script> {
        self.spks.get(&(keychain, index))
    }

    /// The keychain and index that derived `spk`, if it was revealed here.
    pub fn index_of_spk(&self, spk: &Script) -> Option<(KeychainKind, u32)> {
        self.spk_indices.get(spk).copied()
    }

    /// Whether any tracked output pays to the script at `index` on `keychain`.
    pub fn is_used(&self, keychain: KeychainKind, index: u32) -> bool {
        match self.spks.get(&(keychain, index)) {
            Some(spk) => self
                .utxos
                .values()
                .any(|utxo| &utxo.txout.script_pubkey == spk),
            None => false,
        }
    }

    /// The most recently revealed index on `keychain`, if it is still unused.
    ///
    /// Earlier indexes are not inspected: reuse only ever hands out the
    /// address at the watermark's edge.
    pub fn last_unused_index(&self, keychain: KeychainKind) -> Option<u32> {
        self.next_index(keychain)
            .checked_sub(1)
            .filter(|&index| !self.is_used(keychain, index))
    }

    /// Track `utxo`, replacing any previous entry at the same outpoint.
    pub fn insert_utxo(&mut self, utxo: LocalUtxo) {
        self.utxos.insert(utxo.outpoint, utxo);
    }

    /// All tracked outputs, ordered by outpoint.
    pub fn utxos(&self) -> impl Iterator<Item = &LocalUtxo> {
        self.utxos.values()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::types::{Txid, TxOut};
    use bitcoin_hashes::Hash;

    fn spk(tag: u8) -> Script {
        Script::from_bytes(vec![0x00, 0x14, tag])
    }

    fn utxo_for(spk: Script, vout: u32) -> LocalUtxo {
        LocalUtxo {
            outpoint: OutPoint {
                txid: Txid::hash(b"tx"),
                vout,
            },
            txout: TxOut {
                value: 1_000,
                script_pubkey: spk,
            },
            keychain: KeychainKind::External,
            confirmations: 1,
        }
    }

    #[test]
    fn test_watermark_advances_monotonically() {
        let mut tracker = SpkTracker::default();
        assert_eq!(tracker.next_index(KeychainKind::External), 0);

        tracker.reveal(KeychainKind::External, 0, spk(0));
        tracker.reveal(KeychainKind::External, 1, spk(1));
        assert_eq!(tracker.next_index(KeychainKind::External), 2);

        // re-revealing a lower index must not move the watermark back
        tracker.reveal(KeychainKind::External, 0, spk(0));
        assert_eq!(tracker.next_index(KeychainKind::External), 2);

        // keychains have independent watermarks
        assert_eq!(tracker.next_index(KeychainKind::Internal), 0);
    }

    #[test]
    fn test_reverse_lookup() {
        let mut tracker = SpkTracker::default();
        tracker.reveal(KeychainKind::Internal, 3, spk(3));

        assert_eq!(
            tracker.index_of_spk(&spk(3)),
            Some((KeychainKind::Internal, 3))
        );
        assert_eq!(tracker.index_of_spk(&spk(9)), None);
        assert_eq!(tracker.spk_at(KeychainKind::Internal, 3), Some(&spk(3)));
    }

    #[test]
    fn test_last_unused_looks_at_the_watermark_edge() {
        let mut tracker = SpkTracker::default();
        assert_eq!(tracker.last_unused_index(KeychainKind::External), None);

        tracker.reveal(KeychainKind::External, 0, spk(0));
        tracker.reveal(KeychainKind::External, 1, spk(1));
        assert_eq!(tracker.last_unused_index(KeychainKind::External), Some(1));

        // funding an earlier index doesn't matter, only the latest one does
        tracker.insert_utxo(utxo_for(spk(0), 0));
        assert!(tracker.is_used(KeychainKind::External, 0));
        assert_eq!(tracker.last_unused_index(KeychainKind::External), Some(1));

        tracker.insert_utxo(utxo_for(spk(1), 1));
        assert_eq!(tracker.last_unused_index(KeychainKind::External), None);
    }

    #[test]
    fn test_insert_utxo_replaces_same_outpoint() {
        let mut tracker = SpkTracker::default();
        let mut utxo = utxo_for(spk(0), 0);
        tracker.insert_utxo(utxo.clone());

        utxo.confirmations = 6;
        tracker.insert_utxo(utxo.clone());

        let tracked: Vec<_> = tracker.utxos().collect();
        assert_eq!(tracked.len(), 1);
        assert_eq!(tracked[0].confirmations, 6);
    }
}
