// Koinu
// Copyright (c) 2024 Koinu Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Shared primitive types: networks, scripts, outpoints, tracked outputs and
//! balances.

use std::fmt;
use std::str::FromStr;

use bitcoin_hashes::{hash160, sha256d, Hash};
use secp256k1::XOnlyPublicKey;
use serde::{Deserialize, Serialize};

/// A transaction identifier, the double-SHA256 of the serialized transaction.
///
/// Txids are opaque to this crate: they arrive from an external chain-data
/// source as part of an [`OutPoint`] and are only used as UTXO keys.
pub type Txid = sha256d::Hash;

/// The network a key, descriptor or address belongs to.
///
/// Every key and descriptor is tagged with exactly one network; mixing
/// networks across a derivation chain is an error, never coerced.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Mainnet
    Bitcoin,
    /// Testnet
    Testnet,
    /// Signet
    Signet,
    /// Regtest
    Regtest,
}

impl Network {
    /// The human-readable part used for bech32/bech32m addresses on this network.
    pub fn bech32_hrp(self) -> &'static str {
        match self {
            Network::Bitcoin => "bc",
            Network::Testnet | Network::Signet => "tb",
            Network::Regtest => "bcrt",
        }
    }

    /// Whether two networks share the same key serialization class.
    ///
    /// Extended key version bytes only distinguish mainnet from the test
    /// networks, so a `tpub` is usable on testnet, signet and regtest alike.
    pub fn is_same_key_class(self, other: Network) -> bool {
        matches!(self, Network::Bitcoin) == matches!(other, Network::Bitcoin)
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Network::Bitcoin => "bitcoin",
            Network::Testnet => "testnet",
            Network::Signet => "signet",
            Network::Regtest => "regtest",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Network {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bitcoin" => Ok(Network::Bitcoin),
            "testnet" => Ok(Network::Testnet),
            "signet" => Ok(Network::Signet),
            "regtest" => Ok(Network::Regtest),
            other => Err(crate::Error::Generic(format!("unknown network: {}", other))),
        }
    }
}

/// Types of keychains
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeychainKind {
    /// External
    External = 0,
    /// Internal, usually used for change outputs
    Internal = 1,
}

impl KeychainKind {
    /// Return [`KeychainKind`] as a byte
    pub fn as_byte(&self) -> u8 {
        match self {
            KeychainKind::External => b'e',
            KeychainKind::Internal => b'i',
        }
    }

    /// The derivation sub-branch conventionally used for this keychain.
    pub fn as_child_index(&self) -> u32 {
        *self as u32
    }
}

impl fmt::Display for KeychainKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeychainKind::External => write!(f, "external"),
            KeychainKind::Internal => write!(f, "internal"),
        }
    }
}

/// An output script, stored as raw script bytes.
#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Script(Vec<u8>);

// The handful of opcodes needed to build and recognize our output scripts.
const OP_0: u8 = 0x00;
const OP_1: u8 = 0x51;
const OP_DUP: u8 = 0x76;
const OP_EQUALVERIFY: u8 = 0x88;
const OP_HASH160: u8 = 0xa9;
const OP_CHECKSIG: u8 = 0xac;

impl Script {
    /// Create a script from raw bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Script {
        Script(bytes)
    }

    /// Generate a legacy pay-to-pubkey-hash script.
    pub fn new_p2pkh(pubkey_hash: &hash160::Hash) -> Script {
        let mut script = Vec::with_capacity(25);
        script.push(OP_DUP);
        script.push(OP_HASH160);
        script.push(20);
        script.extend_from_slice(&pubkey_hash.to_byte_array());
        script.push(OP_EQUALVERIFY);
        script.push(OP_CHECKSIG);
        Script(script)
    }

    /// Generate a segwit-v0 pay-to-witness-pubkey-hash script.
    pub fn new_p2wpkh(pubkey_hash: &hash160::Hash) -> Script {
        let mut script = Vec::with_capacity(22);
        script.push(OP_0);
        script.push(20);
        script.extend_from_slice(&pubkey_hash.to_byte_array());
        Script(script)
    }

    /// Generate a taproot output script paying to the given (already tweaked)
    /// output key.
    pub fn new_p2tr_tweaked(output_key: &XOnlyPublicKey) -> Script {
        let mut script = Vec::with_capacity(34);
        script.push(OP_1);
        script.push(32);
        script.extend_from_slice(&output_key.serialize());
        Script(script)
    }

    /// The raw script bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length of the script in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the script is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Checks whether a script pubkey is a P2PKH output.
    pub fn is_p2pkh(&self) -> bool {
        self.0.len() == 25
            && self.0[0] == OP_DUP
            && self.0[1] == OP_HASH160
            && self.0[2] == 20
            && self.0[23] == OP_EQUALVERIFY
            && self.0[24] == OP_CHECKSIG
    }

    /// Checks whether a script pubkey is a P2WPKH output.
    pub fn is_p2wpkh(&self) -> bool {
        self.0.len() == 22 && self.0[0] == OP_0 && self.0[1] == 20
    }

    /// Checks whether a script pubkey is a taproot output.
    pub fn is_p2tr(&self) -> bool {
        self.0.len() == 34 && self.0[0] == OP_1 && self.0[1] == 32
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// A reference to a transaction output.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OutPoint {
    /// The referenced transaction's txid
    pub txid: Txid,
    /// The index of the referenced output in its transaction's vout
    pub vout: u32,
}

impl OutPoint {
    /// Create a new outpoint.
    pub fn new(txid: Txid, vout: u32) -> OutPoint {
        OutPoint { txid, vout }
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.vout)
    }
}

/// A transaction output.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct TxOut {
    /// The value of the output, in satoshis
    pub value: u64,
    /// The script which must be satisfied for the output to be spent
    pub script_pubkey: Script,
}

/// An unspent output owned by a [`Wallet`].
///
/// [`Wallet`]: crate::Wallet
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocalUtxo {
    /// Reference to a transaction output
    pub outpoint: OutPoint,
    /// Transaction output
    pub txout: TxOut,
    /// Type of keychain
    pub keychain: KeychainKind,
    /// Number of confirmations, `0` meaning unconfirmed
    pub confirmations: u32,
}

/// Balance, differentiated into various categories
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Balance {
    /// Confirmed balance
    pub confirmed: u64,
    /// Unconfirmed balance
    pub unconfirmed: u64,
}

impl Balance {
    /// Get the whole balance visible to the wallet.
    pub fn total(&self) -> u64 {
        self.confirmed + self.unconfirmed
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{ unconfirmed: {}, confirmed: {} }}",
            self.unconfirmed, self.confirmed
        )
    }
}

impl std::ops::Add for Balance {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            confirmed: self.confirmed + other.confirmed,
            unconfirmed: self.unconfirmed + other.unconfirmed,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn dummy_hash160() -> hash160::Hash {
        hash160::Hash::hash(b"koinu")
    }

    #[test]
    fn test_script_forms() {
        let h = dummy_hash160();

        let p2pkh = Script::new_p2pkh(&h);
        assert_eq!(p2pkh.len(), 25);
        assert!(p2pkh.is_p2pkh());
        assert!(!p2pkh.is_p2wpkh());

        let p2wpkh = Script::new_p2wpkh(&h);
        assert_eq!(p2wpkh.len(), 22);
        assert!(p2wpkh.is_p2wpkh());
        assert!(!p2wpkh.is_p2tr());
    }

    #[test]
    fn test_balance() {
        let balance = Balance {
            confirmed: 75_000,
            unconfirmed: 25_000,
        };
        assert_eq!(balance.total(), 100_000);

        let sum = balance
            + Balance {
                confirmed: 1,
                unconfirmed: 2,
            };
        assert_eq!(sum.confirmed, 75_001);
        assert_eq!(sum.unconfirmed, 25_002);
    }

    #[test]
    fn test_local_utxo_serde_round_trip() {
        let utxo = LocalUtxo {
            outpoint: OutPoint::new(Txid::hash(b"tx"), 1),
            txout: TxOut {
                value: 50_000,
                script_pubkey: Script::new_p2wpkh(&dummy_hash160()),
            },
            keychain: KeychainKind::External,
            confirmations: 6,
        };

        let json = serde_json::to_string(&utxo).unwrap();
        let decoded: LocalUtxo = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, utxo);
    }

    #[test]
    fn test_network_round_trip() {
        for network in [
            Network::Bitcoin,
            Network::Testnet,
            Network::Signet,
            Network::Regtest,
        ] {
            assert_eq!(network.to_string().parse::<Network>().unwrap(), network);
        }
        assert!(Network::Testnet.is_same_key_class(Network::Regtest));
        assert!(!Network::Testnet.is_same_key_class(Network::Bitcoin));
    }
}
