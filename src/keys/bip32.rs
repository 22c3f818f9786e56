// Koinu
// Copyright (c) 2024 Koinu Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! BIP32 hierarchical deterministic key tree.
//!
//! Extended keys carry a chain code next to the key material, which makes
//! child derivation a pure function of `(parent, child_number)`: the same
//! inputs always produce the same child, and a hardened child at index `n` is
//! unrelated to the normal child at the same index. Hardened steps need the
//! private key; [`ExtendedPubKey::derive_pub`] refuses them.

use std::fmt;
use std::str::FromStr;

use bitcoin_hashes::hmac::{Hmac, HmacEngine};
use bitcoin_hashes::{hash160, sha512, Hash, HashEngine};
use secp256k1::{PublicKey, Scalar, Secp256k1, SecretKey, Signing, Verification};

use crate::types::Network;

/// Version bytes for extended private keys on the main network (`xprv`).
const VERSION_MAINNET_PRIVATE: [u8; 4] = [0x04, 0x88, 0xAD, 0xE4];
/// Version bytes for extended public keys on the main network (`xpub`).
const VERSION_MAINNET_PUBLIC: [u8; 4] = [0x04, 0x88, 0xB2, 0x1E];
/// Version bytes for extended private keys on the test networks (`tprv`).
const VERSION_TESTNET_PRIVATE: [u8; 4] = [0x04, 0x35, 0x83, 0x94];
/// Version bytes for extended public keys on the test networks (`tpub`).
const VERSION_TESTNET_PUBLIC: [u8; 4] = [0x04, 0x35, 0x87, 0xCF];

const HARDENED_BIT: u32 = 1 << 31;

/// A BIP32 error.
#[derive(Debug)]
pub enum Error {
    /// A child number was provided that was out of range
    InvalidChildNumber(u32),
    /// A child number string was malformed
    InvalidChildNumberFormat(String),
    /// A derivation path string didn't start with `m` or contained junk
    InvalidDerivationPathFormat(String),
    /// Attempted to derive a hardened child of an extended public key
    CannotDeriveFromHardenedKey,
    /// Unrecognized or unsupported extended key version bytes
    UnknownVersion([u8; 4]),
    /// A serialized extended key had the wrong length
    WrongExtendedKeyLength(usize),
    /// An extended key was tagged for a different network than expected
    NetworkMismatch {
        /// Network encoded in the key's version bytes
        found: Network,
        /// Network the key was expected to belong to
        expected: Network,
    },
    /// Base58check decoding error
    Base58(bs58::decode::Error),
    /// A secp256k1 error
    Secp256k1(secp256k1::Error),
    /// A hex string was malformed
    Hex(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidChildNumber(index) => {
                write!(f, "Child number {} is out of range [0, 2^31)", index)
            }
            Self::InvalidChildNumberFormat(s) => write!(f, "Invalid child number: `{}`", s),
            Self::InvalidDerivationPathFormat(s) => write!(f, "Invalid derivation path: `{}`", s),
            Self::CannotDeriveFromHardenedKey => {
                write!(f, "Hardened derivation requires the private key")
            }
            Self::UnknownVersion(version) => write!(
                f,
                "Unknown extended key version bytes: {:02x}{:02x}{:02x}{:02x}",
                version[0], version[1], version[2], version[3]
            ),
            Self::WrongExtendedKeyLength(len) => {
                write!(f, "Extended key is {} bytes long, expected 78", len)
            }
            Self::NetworkMismatch { found, expected } => write!(
                f,
                "Extended key belongs to {} but {} was expected",
                found, expected
            ),
            Self::Base58(err) => write!(f, "Base58 error: {}", err),
            Self::Secp256k1(err) => write!(f, "Secp256k1 error: {}", err),
            Self::Hex(s) => write!(f, "Invalid hex string: `{}`", s),
        }
    }
}

impl std::error::Error for Error {}

impl From<bs58::decode::Error> for Error {
    fn from(err: bs58::decode::Error) -> Self {
        Error::Base58(err)
    }
}

impl From<secp256k1::Error> for Error {
    fn from(err: secp256k1::Error) -> Self {
        Error::Secp256k1(err)
    }
}

/// A single step in a derivation path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChildNumber {
    /// Non-hardened derivation step, can be performed on public keys
    Normal {
        /// Step index, in `[0, 2^31)`
        index: u32,
    },
    /// Hardened derivation step, requires the private key
    Hardened {
        /// Step index, in `[0, 2^31)`
        index: u32,
    },
}

impl ChildNumber {
    /// Create a [`ChildNumber::Normal`] from an index, erroring if the index has the hardened bit set.
    pub fn from_normal_idx(index: u32) -> Result<Self, Error> {
        if index & HARDENED_BIT == 0 {
            Ok(ChildNumber::Normal { index })
        } else {
            Err(Error::InvalidChildNumber(index))
        }
    }

    /// Create a [`ChildNumber::Hardened`] from an index, erroring if the index has the hardened bit set.
    pub fn from_hardened_idx(index: u32) -> Result<Self, Error> {
        if index & HARDENED_BIT == 0 {
            Ok(ChildNumber::Hardened { index })
        } else {
            Err(Error::InvalidChildNumber(index))
        }
    }

    /// Whether this is a hardened step.
    pub fn is_hardened(&self) -> bool {
        matches!(self, ChildNumber::Hardened { .. })
    }

    fn to_u32(self) -> u32 {
        match self {
            ChildNumber::Normal { index } => index,
            ChildNumber::Hardened { index } => index | HARDENED_BIT,
        }
    }

    fn from_u32(n: u32) -> Self {
        if n & HARDENED_BIT == 0 {
            ChildNumber::Normal { index: n }
        } else {
            ChildNumber::Hardened {
                index: n & !HARDENED_BIT,
            }
        }
    }
}

impl fmt::Display for ChildNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChildNumber::Normal { index } => write!(f, "{}", index),
            ChildNumber::Hardened { index } => write!(f, "{}'", index),
        }
    }
}

impl FromStr for ChildNumber {
    type Err = Error;

    fn from_str(inp: &str) -> Result<Self, Self::Err> {
        let stripped = inp
            .strip_suffix('\'')
            .or_else(|| inp.strip_suffix('h'))
            .or_else(|| inp.strip_suffix('H'));
        let (num, hardened) = match stripped {
            Some(num) => (num, true),
            None => (inp, false),
        };

        let index: u32 = num
            .parse()
            .map_err(|_| Error::InvalidChildNumberFormat(inp.to_string()))?;
        if hardened {
            ChildNumber::from_hardened_idx(index)
        } else {
            ChildNumber::from_normal_idx(index)
        }
    }
}

/// An ordered sequence of [`ChildNumber`] steps.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DerivationPath(Vec<ChildNumber>);

impl DerivationPath {
    /// The empty path, also known as the master path `m`.
    pub fn master() -> Self {
        DerivationPath(vec![])
    }

    /// Whether the path is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of steps in the path.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Create a new path with one extra step appended.
    pub fn child(&self, child: ChildNumber) -> Self {
        let mut path = self.0.clone();
        path.push(child);
        DerivationPath(path)
    }

    /// Concatenate two paths.
    pub fn extend<P: AsRef<[ChildNumber]>>(&self, path: P) -> Self {
        let mut new = self.0.clone();
        new.extend_from_slice(path.as_ref());
        DerivationPath(new)
    }
}

impl AsRef<[ChildNumber]> for DerivationPath {
    fn as_ref(&self) -> &[ChildNumber] {
        &self.0
    }
}

impl From<Vec<ChildNumber>> for DerivationPath {
    fn from(path: Vec<ChildNumber>) -> Self {
        DerivationPath(path)
    }
}

impl<'a> IntoIterator for &'a DerivationPath {
    type Item = &'a ChildNumber;
    type IntoIter = std::slice::Iter<'a, ChildNumber>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m")?;
        for child in &self.0 {
            write!(f, "/{}", child)?;
        }
        Ok(())
    }
}

impl FromStr for DerivationPath {
    type Err = Error;

    fn from_str(inp: &str) -> Result<Self, Self::Err> {
        let mut parts = inp.split('/');
        if parts.next() != Some("m") {
            return Err(Error::InvalidDerivationPathFormat(inp.to_string()));
        }

        let path = parts
            .map(ChildNumber::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(DerivationPath(path))
    }
}

/// The first four bytes of a key's identifier (the hash160 of the public key).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fingerprint([u8; 4]);

impl Fingerprint {
    /// The raw fingerprint bytes.
    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl From<[u8; 4]> for Fingerprint {
    fn from(bytes: [u8; 4]) -> Self {
        Fingerprint(bytes)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl FromStr for Fingerprint {
    type Err = Error;

    fn from_str(inp: &str) -> Result<Self, Self::Err> {
        // length is in bytes, so reject multi-byte characters before slicing
        if inp.len() != 8 || !inp.is_ascii() {
            return Err(Error::Hex(inp.to_string()));
        }
        let mut bytes = [0u8; 4];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&inp[i * 2..i * 2 + 2], 16)
                .map_err(|_| Error::Hex(inp.to_string()))?;
        }
        Ok(Fingerprint(bytes))
    }
}

/// An extended private key: private key material plus a chain code.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ExtendedPrivKey {
    /// The network this key is meant for
    pub network: Network,
    /// How many derivation steps separate this key from the master
    pub depth: u8,
    /// Fingerprint of the parent key
    pub parent_fingerprint: Fingerprint,
    /// The child number used to derive this key from its parent
    pub child_number: ChildNumber,
    /// Secret key material
    pub private_key: SecretKey,
    /// Chain code
    pub chain_code: [u8; 32],
}

impl ExtendedPrivKey {
    /// Construct a new master key from a seed.
    pub fn new_master(network: Network, seed: &[u8]) -> Result<ExtendedPrivKey, Error> {
        let mut engine = HmacEngine::<sha512::Hash>::new(b"Bitcoin seed");
        engine.input(seed);
        let hmac = Hmac::<sha512::Hash>::from_engine(engine).to_byte_array();

        let private_key = SecretKey::from_slice(&hmac[..32])?;
        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&hmac[32..]);

        Ok(ExtendedPrivKey {
            network,
            depth: 0,
            parent_fingerprint: Fingerprint::default(),
            child_number: ChildNumber::Normal { index: 0 },
            private_key,
            chain_code,
        })
    }

    /// Derive the child key at every step of `path`.
    pub fn derive_priv<C: Signing, P: AsRef<[ChildNumber]>>(
        &self,
        secp: &Secp256k1<C>,
        path: &P,
    ) -> Result<ExtendedPrivKey, Error> {
        let mut key = *self;
        for child in path.as_ref() {
            key = key.ckd_priv(secp, *child)?;
        }
        Ok(key)
    }

    /// Private-to-private child key derivation.
    fn ckd_priv<C: Signing>(
        &self,
        secp: &Secp256k1<C>,
        child: ChildNumber,
    ) -> Result<ExtendedPrivKey, Error> {
        let mut engine = HmacEngine::<sha512::Hash>::new(&self.chain_code);
        match child {
            ChildNumber::Normal { .. } => {
                engine.input(&PublicKey::from_secret_key(secp, &self.private_key).serialize());
            }
            ChildNumber::Hardened { .. } => {
                engine.input(&[0u8]);
                engine.input(&self.private_key.secret_bytes());
            }
        }
        engine.input(&child.to_u32().to_be_bytes());
        let hmac = Hmac::<sha512::Hash>::from_engine(engine).to_byte_array();

        let tweak = SecretKey::from_slice(&hmac[..32])?;
        let private_key = tweak.add_tweak(&Scalar::from(self.private_key))?;
        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&hmac[32..]);

        Ok(ExtendedPrivKey {
            network: self.network,
            depth: self.depth + 1,
            parent_fingerprint: self.fingerprint(secp),
            child_number: child,
            private_key,
            chain_code,
        })
    }

    /// The identifier of this key, the hash160 of the serialized public key.
    pub fn identifier<C: Signing>(&self, secp: &Secp256k1<C>) -> hash160::Hash {
        ExtendedPubKey::from_priv(secp, self).identifier()
    }

    /// The first four bytes of the identifier.
    pub fn fingerprint<C: Signing>(&self, secp: &Secp256k1<C>) -> Fingerprint {
        ExtendedPubKey::from_priv(secp, self).fingerprint()
    }

    /// Serialize to the fixed 78-byte layout.
    pub fn encode(&self) -> [u8; 78] {
        let mut buf = [0u8; 78];
        buf[0..4].copy_from_slice(&match self.network {
            Network::Bitcoin => VERSION_MAINNET_PRIVATE,
            _ => VERSION_TESTNET_PRIVATE,
        });
        buf[4] = self.depth;
        buf[5..9].copy_from_slice(self.parent_fingerprint.as_bytes());
        buf[9..13].copy_from_slice(&self.child_number.to_u32().to_be_bytes());
        buf[13..45].copy_from_slice(&self.chain_code);
        buf[45] = 0;
        buf[46..78].copy_from_slice(&self.private_key.secret_bytes());
        buf
    }

    /// Check this key against the network the caller expects, refining the
    /// tag on success.
    ///
    /// The test networks share version bytes, so a `tprv` passes for testnet,
    /// signet and regtest alike; crossing the mainnet boundary is an error.
    pub fn require_network(self, expected: Network) -> Result<ExtendedPrivKey, Error> {
        if self.network.is_same_key_class(expected) {
            Ok(ExtendedPrivKey {
                network: expected,
                ..self
            })
        } else {
            Err(Error::NetworkMismatch {
                found: self.network,
                expected,
            })
        }
    }

    /// Deserialize from the fixed 78-byte layout.
    pub fn decode(data: &[u8]) -> Result<ExtendedPrivKey, Error> {
        if data.len() != 78 {
            return Err(Error::WrongExtendedKeyLength(data.len()));
        }

        let network = match &data[0..4] {
            v if v == VERSION_MAINNET_PRIVATE => Network::Bitcoin,
            v if v == VERSION_TESTNET_PRIVATE => Network::Testnet,
            v => {
                let mut version = [0u8; 4];
                version.copy_from_slice(v);
                return Err(Error::UnknownVersion(version));
            }
        };

        let mut parent_fingerprint = [0u8; 4];
        parent_fingerprint.copy_from_slice(&data[5..9]);
        let mut child_number = [0u8; 4];
        child_number.copy_from_slice(&data[9..13]);
        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&data[13..45]);

        Ok(ExtendedPrivKey {
            network,
            depth: data[4],
            parent_fingerprint: Fingerprint::from(parent_fingerprint),
            child_number: ChildNumber::from_u32(u32::from_be_bytes(child_number)),
            private_key: SecretKey::from_slice(&data[46..78])?,
            chain_code,
        })
    }
}

impl fmt::Display for ExtendedPrivKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", bs58::encode(self.encode()).with_check().into_string())
    }
}

impl FromStr for ExtendedPrivKey {
    type Err = Error;

    fn from_str(inp: &str) -> Result<Self, Self::Err> {
        let data = bs58::decode(inp).with_check(None).into_vec()?;
        ExtendedPrivKey::decode(&data)
    }
}

/// An extended public key: public key material plus a chain code.
///
/// Never stores private material; it is a one-way projection of an
/// [`ExtendedPrivKey`] that can still derive non-hardened children.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ExtendedPubKey {
    /// The network this key is meant for
    pub network: Network,
    /// How many derivation steps separate this key from the master
    pub depth: u8,
    /// Fingerprint of the parent key
    pub parent_fingerprint: Fingerprint,
    /// The child number used to derive this key from its parent
    pub child_number: ChildNumber,
    /// Public key material
    pub public_key: PublicKey,
    /// Chain code
    pub chain_code: [u8; 32],
}

impl ExtendedPubKey {
    /// Project an extended private key to its public counterpart.
    pub fn from_priv<C: Signing>(secp: &Secp256k1<C>, xprv: &ExtendedPrivKey) -> ExtendedPubKey {
        ExtendedPubKey {
            network: xprv.network,
            depth: xprv.depth,
            parent_fingerprint: xprv.parent_fingerprint,
            child_number: xprv.child_number,
            public_key: PublicKey::from_secret_key(secp, &xprv.private_key),
            chain_code: xprv.chain_code,
        }
    }

    /// Derive the child key at every step of `path`.
    ///
    /// Fails with [`Error::CannotDeriveFromHardenedKey`] on the first hardened
    /// step, before any derivation is performed.
    pub fn derive_pub<C: Verification, P: AsRef<[ChildNumber]>>(
        &self,
        secp: &Secp256k1<C>,
        path: &P,
    ) -> Result<ExtendedPubKey, Error> {
        if path.as_ref().iter().any(ChildNumber::is_hardened) {
            return Err(Error::CannotDeriveFromHardenedKey);
        }

        let mut key = *self;
        for child in path.as_ref() {
            key = key.ckd_pub(secp, *child)?;
        }
        Ok(key)
    }

    /// Public-to-public child key derivation.
    fn ckd_pub<C: Verification>(
        &self,
        secp: &Secp256k1<C>,
        child: ChildNumber,
    ) -> Result<ExtendedPubKey, Error> {
        if child.is_hardened() {
            return Err(Error::CannotDeriveFromHardenedKey);
        }

        let mut engine = HmacEngine::<sha512::Hash>::new(&self.chain_code);
        engine.input(&self.public_key.serialize());
        engine.input(&child.to_u32().to_be_bytes());
        let hmac = Hmac::<sha512::Hash>::from_engine(engine).to_byte_array();

        let tweak = SecretKey::from_slice(&hmac[..32])?;
        let public_key = self.public_key.add_exp_tweak(secp, &Scalar::from(tweak))?;
        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&hmac[32..]);

        Ok(ExtendedPubKey {
            network: self.network,
            depth: self.depth + 1,
            parent_fingerprint: self.fingerprint(),
            child_number: child,
            public_key,
            chain_code,
        })
    }

    /// The identifier of this key, the hash160 of the serialized public key.
    pub fn identifier(&self) -> hash160::Hash {
        hash160::Hash::hash(&self.public_key.serialize())
    }

    /// The first four bytes of the identifier.
    pub fn fingerprint(&self) -> Fingerprint {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&self.identifier().to_byte_array()[..4]);
        Fingerprint::from(bytes)
    }

    /// Check this key against the network the caller expects, refining the
    /// tag on success.
    pub fn require_network(self, expected: Network) -> Result<ExtendedPubKey, Error> {
        if self.network.is_same_key_class(expected) {
            Ok(ExtendedPubKey {
                network: expected,
                ..self
            })
        } else {
            Err(Error::NetworkMismatch {
                found: self.network,
                expected,
            })
        }
    }

    /// Serialize to the fixed 78-byte layout.
    pub fn encode(&self) -> [u8; 78] {
        let mut buf = [0u8; 78];
        buf[0..4].copy_from_slice(&match self.network {
            Network::Bitcoin => VERSION_MAINNET_PUBLIC,
            _ => VERSION_TESTNET_PUBLIC,
        });
        buf[4] = self.depth;
        buf[5..9].copy_from_slice(self.parent_fingerprint.as_bytes());
        buf[9..13].copy_from_slice(&self.child_number.to_u32().to_be_bytes());
        buf[13..45].copy_from_slice(&self.chain_code);
        buf[45..78].copy_from_slice(&self.public_key.serialize());
        buf
    }

    /// Deserialize from the fixed 78-byte layout.
    pub fn decode(data: &[u8]) -> Result<ExtendedPubKey, Error> {
        if data.len() != 78 {
            return Err(Error::WrongExtendedKeyLength(data.len()));
        }

        let network = match &data[0..4] {
            v if v == VERSION_MAINNET_PUBLIC => Network::Bitcoin,
            v if v == VERSION_TESTNET_PUBLIC => Network::Testnet,
            v => {
                let mut version = [0u8; 4];
                version.copy_from_slice(v);
                return Err(Error::UnknownVersion(version));
            }
        };

        let mut parent_fingerprint = [0u8; 4];
        parent_fingerprint.copy_from_slice(&data[5..9]);
        let mut child_number = [0u8; 4];
        child_number.copy_from_slice(&data[9..13]);
        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&data[13..45]);

        Ok(ExtendedPubKey {
            network,
            depth: data[4],
            parent_fingerprint: Fingerprint::from(parent_fingerprint),
            child_number: ChildNumber::from_u32(u32::from_be_bytes(child_number)),
            public_key: PublicKey::from_slice(&data[45..78])?,
            chain_code,
        })
    }
}

impl fmt::Display for ExtendedPubKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", bs58::encode(self.encode()).with_check().into_string())
    }
}

impl FromStr for ExtendedPubKey {
    type Err = Error;

    fn from_str(inp: &str) -> Result<Self, Self::Err> {
        let data = bs58::decode(inp).with_check(None).into_vec()?;
        ExtendedPubKey::decode(&data)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    // Seed from the BIP32 test vector 1.
    const TV1_SEED: [u8; 16] = [
        0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e,
        0x0f,
    ];

    fn tv1_master() -> ExtendedPrivKey {
        ExtendedPrivKey::new_master(Network::Bitcoin, &TV1_SEED).unwrap()
    }

    #[test]
    fn test_vector_1_master() {
        let secp = Secp256k1::new();
        let master = tv1_master();

        assert_eq!(
            master.to_string(),
            "xprv9s21ZrQH143K3QTDL4LXw2F7HEK3wJUD2nW2nRk4stbPy6cq3jPPqjiChkVvvNKmPGJxWUtg6LnF5kejMRNNU3TGtRBeJgk33yuGBxrMPHi"
        );
        assert_eq!(
            ExtendedPubKey::from_priv(&secp, &master).to_string(),
            "xpub661MyMwAqRbcFtXgS5sYJABqqG9YLmC4Q1Rdap9gSE8NqtwybGhePY2gZ29ESFjqJoCu1Rupje8YtGqsefD265TMg7usUDFdp6W1EGMcet8"
        );
    }

    #[test]
    fn test_vector_1_first_hardened_child() {
        let secp = Secp256k1::new();
        let master = tv1_master();
        let path = DerivationPath::from_str("m/0'").unwrap();
        let child = master.derive_priv(&secp, &path).unwrap();

        assert_eq!(
            child.to_string(),
            "xprv9uHRZZhk6KAJC1avXpDAp4MDc3sQKNxDiPvvkX8Br5ngLNv1TxvUxt4cV1rGL5hj6KCesnDYUhd7oWgT11eZG7XnxHrnYeSvkzY7d2bhkJ7"
        );
        assert_eq!(
            ExtendedPubKey::from_priv(&secp, &child).to_string(),
            "xpub68Gmy5EdvgibQVfPdqkBBCHxA5htiqg55crXYuXoQRKfDBFA1WEjWgP6LHhwBZeNK1VTsfTFUHCdrfp1bgwQ9xv5ski8PX9rL2dZXvgGDnw"
        );
        assert_eq!(child.depth, 1);
        assert_eq!(child.child_number, ChildNumber::Hardened { index: 0 });
    }

    #[test]
    fn test_serialization_round_trip() {
        let secp = Secp256k1::new();
        let master = tv1_master();
        let xprv = master
            .derive_priv(&secp, &DerivationPath::from_str("m/44'/0'/0'").unwrap())
            .unwrap();
        let xpub = ExtendedPubKey::from_priv(&secp, &xprv);

        assert_eq!(
            ExtendedPrivKey::from_str(&xprv.to_string()).unwrap(),
            xprv
        );
        assert_eq!(ExtendedPubKey::from_str(&xpub.to_string()).unwrap(), xpub);
    }

    #[test]
    fn test_path_composition() {
        let secp = Secp256k1::new();
        let master = tv1_master();

        let full = DerivationPath::from_str("m/0'/1/2'/2").unwrap();
        let prefix = DerivationPath::from_str("m/0'/1").unwrap();
        let suffix = DerivationPath::from_str("m/2'/2").unwrap();

        let in_one_go = master.derive_priv(&secp, &full).unwrap();
        let step_wise = master
            .derive_priv(&secp, &prefix)
            .unwrap()
            .derive_priv(&secp, &suffix)
            .unwrap();

        assert_eq!(in_one_go.private_key, step_wise.private_key);
        assert_eq!(in_one_go.chain_code, step_wise.chain_code);
        assert_eq!(prefix.extend(&suffix), full);
    }

    #[test]
    fn test_hardened_and_normal_children_differ() {
        let secp = Secp256k1::new();
        let master = tv1_master();

        let normal = master
            .derive_priv(&secp, &DerivationPath::from_str("m/7").unwrap())
            .unwrap();
        let hardened = master
            .derive_priv(&secp, &DerivationPath::from_str("m/7'").unwrap())
            .unwrap();

        assert_ne!(normal.private_key, hardened.private_key);
    }

    #[test]
    fn test_public_derivation_matches_private() {
        let secp = Secp256k1::new();
        let master = tv1_master();
        let account = master
            .derive_priv(&secp, &DerivationPath::from_str("m/84'/0'/0'").unwrap())
            .unwrap();
        let account_xpub = ExtendedPubKey::from_priv(&secp, &account);

        let path = DerivationPath::from_str("m/0/5").unwrap();
        let from_priv =
            ExtendedPubKey::from_priv(&secp, &account.derive_priv(&secp, &path).unwrap());
        let from_pub = account_xpub.derive_pub(&secp, &path).unwrap();

        assert_eq!(from_priv.public_key, from_pub.public_key);
        assert_eq!(from_priv.chain_code, from_pub.chain_code);
    }

    #[test]
    fn test_hardened_derivation_on_xpub_fails() {
        let secp = Secp256k1::new();
        let xpub = ExtendedPubKey::from_priv(&secp, &tv1_master());
        let path = DerivationPath::from_str("m/0/1'").unwrap();

        assert!(matches!(
            xpub.derive_pub(&secp, &path),
            Err(Error::CannotDeriveFromHardenedKey)
        ));
    }

    #[test]
    fn test_fingerprint_parsing() {
        let fingerprint = Fingerprint::from_str("c258d2e4").unwrap();
        assert_eq!(fingerprint.to_string(), "c258d2e4");

        assert!(matches!(
            Fingerprint::from_str("c258d2e"),
            Err(Error::Hex(_))
        ));
        assert!(matches!(
            Fingerprint::from_str("c258d2g4"),
            Err(Error::Hex(_))
        ));
        // eight bytes but only seven characters; must error, never slice
        // through the middle of a character
        assert!(matches!(
            Fingerprint::from_str("aaaéaaa"),
            Err(Error::Hex(_))
        ));
    }

    #[test]
    fn test_require_network() {
        let secp = Secp256k1::new();
        let mainnet = tv1_master();
        let xpub = ExtendedPubKey::from_priv(&secp, &mainnet);

        assert!(mainnet.require_network(Network::Bitcoin).is_ok());
        assert!(matches!(
            mainnet.require_network(Network::Testnet),
            Err(Error::NetworkMismatch {
                found: Network::Bitcoin,
                expected: Network::Testnet,
            })
        ));
        assert!(matches!(
            xpub.require_network(Network::Regtest),
            Err(Error::NetworkMismatch { .. })
        ));

        // test networks share the same version bytes, so the tag refines
        let testnet = ExtendedPrivKey::new_master(Network::Testnet, &TV1_SEED).unwrap();
        let signet = testnet.require_network(Network::Signet).unwrap();
        assert_eq!(signet.network, Network::Signet);
        assert_eq!(signet.private_key, testnet.private_key);
    }

    #[test]
    fn test_decode_rejects_unknown_version() {
        let mut data = tv1_master().encode();
        data[0] = 0xff;
        assert!(matches!(
            ExtendedPrivKey::decode(&data),
            Err(Error::UnknownVersion(_))
        ));
    }

    #[test]
    fn test_path_parsing() {
        let path = DerivationPath::from_str("m/86'/1h/0'/1/42").unwrap();
        assert_eq!(path.len(), 5);
        assert_eq!(path.as_ref()[0], ChildNumber::Hardened { index: 86 });
        assert_eq!(path.as_ref()[4], ChildNumber::Normal { index: 42 });
        assert_eq!(path.to_string(), "m/86'/1'/0'/1/42");

        assert!(DerivationPath::from_str("86'/1'").is_err());
        assert!(DerivationPath::from_str("m/2147483648").is_err());
        assert_eq!(DerivationPath::from_str("m").unwrap(), DerivationPath::master());
    }
}
