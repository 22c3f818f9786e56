// Koinu
// Copyright (c) 2024 Koinu Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Descriptor parsing and evaluation.
//!
//! A descriptor is a script template applied to a key expression, written as
//! `template(keyexpr)` with an optional `#checksum` suffix, for example:
//!
//! ```text
//! wpkh([c258d2e4/84h/1h/0h]tpubDDYkZojQFQjht8.../0/*)
//! ```
//!
//! The key expression carries an optional `[fingerprint/path]` origin, an
//! extended key, a further derivation path, and an optional `/*` wildcard
//! that turns the descriptor into a *ranged* one: an infinite family of
//! output scripts indexed by a non-negative integer.

use std::fmt;
use std::str::FromStr;

use bitcoin_hashes::{hash160, sha256, Hash, HashEngine};
use secp256k1::{PublicKey, Scalar, Secp256k1, Signing, Verification, XOnlyPublicKey};

#[allow(unused_imports)]
use log::{debug, error, info, trace};

use crate::address::Address;
use crate::keys::bip32::{
    self, ChildNumber, DerivationPath, ExtendedPrivKey, ExtendedPubKey, Fingerprint,
};
use crate::types::{KeychainKind, Network, Script};

pub mod checksum;
pub mod error;

pub use checksum::calc_checksum;
pub use error::Error;

/// The script template of a descriptor.
///
/// A closed set: adding a template means extending every `match` that builds
/// output scripts, which the compiler enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptTemplate {
    /// Legacy pay-to-pubkey-hash, `pkh(...)`
    Pkh,
    /// Segwit-v0 pay-to-witness-pubkey-hash, `wpkh(...)`
    Wpkh,
    /// Taproot single-key (BIP86-style), `tr(...)`
    Tr,
}

impl ScriptTemplate {
    /// The textual tag of this template.
    pub fn tag(&self) -> &'static str {
        match self {
            ScriptTemplate::Pkh => "pkh",
            ScriptTemplate::Wpkh => "wpkh",
            ScriptTemplate::Tr => "tr",
        }
    }
}

/// Whether (and how) a key expression ends in a wildcard index placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wildcard {
    /// No wildcard: the descriptor describes a single output script
    None,
    /// `/*`, substituted with a normal child index
    Unhardened,
    /// `/*'`, substituted with a hardened child index (private keys only)
    Hardened,
}

/// An extended key expression inside a descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorXKey {
    /// Origin information: fingerprint of the master key and the hardened
    /// path from it to this key
    pub origin: Option<(Fingerprint, DerivationPath)>,
    /// The extended public key
    pub pubkey: ExtendedPubKey,
    /// The extended private key, when the expression contains one
    pub secret: Option<ExtendedPrivKey>,
    /// Derivation steps applied below the key, before the wildcard
    pub derivation_path: DerivationPath,
    /// The trailing wildcard, if any
    pub wildcard: Wildcard,
}

impl DescriptorXKey {
    fn parse<C: Signing>(s: &str, secp: &Secp256k1<C>) -> Result<Self, Error> {
        let (origin, rest) = match s.strip_prefix('[') {
            Some(stripped) => {
                let (origin, rest) = stripped.split_once(']').ok_or(Error::MalformedInput)?;
                let (fingerprint, path) = match origin.split_once('/') {
                    Some((fingerprint, path)) => (fingerprint, Some(path)),
                    None => (origin, None),
                };
                let fingerprint = Fingerprint::from_str(fingerprint)?;
                let path = match path {
                    Some(path) => DerivationPath::from_str(&format!("m/{}", path))?,
                    None => DerivationPath::master(),
                };
                (Some((fingerprint, path)), rest)
            }
            None => (None, s),
        };

        let (key_str, path_str) = match rest.find('/') {
            Some(pos) => (&rest[..pos], &rest[pos..]),
            None => (rest, ""),
        };

        let data = bs58::decode(key_str)
            .with_check(None)
            .into_vec()
            .map_err(bip32::Error::Base58)?;
        let (pubkey, secret) = match ExtendedPubKey::decode(&data) {
            Ok(xpub) => (xpub, None),
            Err(bip32::Error::UnknownVersion(_)) => {
                let xprv = ExtendedPrivKey::decode(&data)?;
                (ExtendedPubKey::from_priv(secp, &xprv), Some(xprv))
            }
            Err(err) => return Err(err.into()),
        };

        let (path_str, wildcard) = if let Some(stripped) = path_str
            .strip_suffix("/*'")
            .or_else(|| path_str.strip_suffix("/*h"))
        {
            (stripped, Wildcard::Hardened)
        } else if let Some(stripped) = path_str.strip_suffix("/*") {
            (stripped, Wildcard::Unhardened)
        } else {
            (path_str, Wildcard::None)
        };

        if wildcard == Wildcard::Hardened && secret.is_none() {
            return Err(Error::HardenedDerivationOnXpub);
        }

        let derivation_path = if path_str.is_empty() {
            DerivationPath::master()
        } else {
            DerivationPath::from_str(&format!("m{}", path_str))?
        };
        if secret.is_none()
            && derivation_path
                .as_ref()
                .iter()
                .any(ChildNumber::is_hardened)
        {
            return Err(Error::HardenedDerivationOnXpub);
        }

        Ok(DescriptorXKey {
            origin,
            pubkey,
            secret,
            derivation_path,
            wildcard,
        })
    }

    /// The full path below this key for a given wildcard index.
    fn path_with_index(&self, index: u32) -> Result<DerivationPath, Error> {
        let child = match self.wildcard {
            Wildcard::None => return Err(Error::MissingWildcard),
            Wildcard::Unhardened => ChildNumber::from_normal_idx(index)?,
            Wildcard::Hardened => ChildNumber::from_hardened_idx(index)?,
        };
        Ok(self.derivation_path.child(child))
    }

    /// Derive the concrete public key at a wildcard index.
    pub fn derive_public_key<C: Signing + Verification>(
        &self,
        secp: &Secp256k1<C>,
        index: u32,
    ) -> Result<PublicKey, Error> {
        let path = self.path_with_index(index)?;
        let xpub = match self.secret {
            Some(ref xprv) => ExtendedPubKey::from_priv(secp, &xprv.derive_priv(secp, &path)?),
            None => self.pubkey.derive_pub(secp, &path)?,
        };
        Ok(xpub.public_key)
    }
}

impl fmt::Display for DescriptorXKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some((fingerprint, path)) = &self.origin {
            write!(f, "[{}", fingerprint)?;
            for child in path {
                write!(f, "/{}", child)?;
            }
            write!(f, "]")?;
        }

        match &self.secret {
            Some(xprv) => write!(f, "{}", xprv)?,
            None => write!(f, "{}", self.pubkey)?,
        }

        for child in &self.derivation_path {
            write!(f, "/{}", child)?;
        }
        match self.wildcard {
            Wildcard::None => Ok(()),
            Wildcard::Unhardened => write!(f, "/*"),
            Wildcard::Hardened => write!(f, "/*'"),
        }
    }
}

/// A parsed descriptor: a script template over a key expression, tagged with
/// the network it was declared for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    template: ScriptTemplate,
    key: DescriptorXKey,
    network: Network,
}

impl Descriptor {
    /// Parse a descriptor string declared for `network`.
    ///
    /// A trailing `#checksum` is verified when present and never required.
    pub fn new(descriptor: &str, network: Network) -> Result<Descriptor, Error> {
        let descriptor = descriptor.trim();
        let body = match descriptor.split_once('#') {
            Some((body, checksum)) => {
                checksum::verify_checksum(body, checksum)?;
                body
            }
            None => descriptor,
        };

        let (tag, rest) = body.split_once('(').ok_or(Error::MalformedInput)?;
        let inner = rest.strip_suffix(')').ok_or(Error::MalformedInput)?;
        let template = match tag {
            "pkh" => ScriptTemplate::Pkh,
            "wpkh" => ScriptTemplate::Wpkh,
            "tr" => ScriptTemplate::Tr,
            other => return Err(Error::UnsupportedDescriptor(other.to_string())),
        };

        let secp = Secp256k1::new();
        let key = DescriptorXKey::parse(inner, &secp)?;
        if !key.pubkey.network.is_same_key_class(network) {
            return Err(Error::KeyNetworkMismatch {
                key: key.pubkey.network,
                expected: network,
            });
        }

        trace!("parsed {} descriptor for {}", template.tag(), network);
        Ok(Descriptor {
            template,
            key,
            network,
        })
    }

    /// Build a canonical BIP44 legacy descriptor (`pkh`) from a root key.
    pub fn new_bip44(
        root: ExtendedPrivKey,
        keychain: KeychainKind,
        network: Network,
    ) -> Result<Descriptor, Error> {
        Self::with_standard_path(ScriptTemplate::Pkh, 44, root, keychain, network)
    }

    /// Build a canonical BIP84 segwit-v0 descriptor (`wpkh`) from a root key.
    pub fn new_bip84(
        root: ExtendedPrivKey,
        keychain: KeychainKind,
        network: Network,
    ) -> Result<Descriptor, Error> {
        Self::with_standard_path(ScriptTemplate::Wpkh, 84, root, keychain, network)
    }

    /// Build a canonical BIP86 taproot single-key descriptor (`tr`) from a
    /// root key, at `m/86'/{0,1}'/0'` with the keychain's `/0/*` or `/1/*`
    /// suffix.
    pub fn new_bip86(
        root: ExtendedPrivKey,
        keychain: KeychainKind,
        network: Network,
    ) -> Result<Descriptor, Error> {
        Self::with_standard_path(ScriptTemplate::Tr, 86, root, keychain, network)
    }

    fn with_standard_path(
        template: ScriptTemplate,
        purpose: u32,
        root: ExtendedPrivKey,
        keychain: KeychainKind,
        network: Network,
    ) -> Result<Descriptor, Error> {
        if !root.network.is_same_key_class(network) {
            return Err(Error::KeyNetworkMismatch {
                key: root.network,
                expected: network,
            });
        }

        let secp = Secp256k1::new();
        let coin_type = if network == Network::Bitcoin { 0 } else { 1 };
        let origin_path: DerivationPath = vec![
            ChildNumber::from_hardened_idx(purpose)?,
            ChildNumber::from_hardened_idx(coin_type)?,
            ChildNumber::from_hardened_idx(0)?,
        ]
        .into();

        let account = root.derive_priv(&secp, &origin_path)?;
        let key = DescriptorXKey {
            origin: Some((root.fingerprint(&secp), origin_path)),
            pubkey: ExtendedPubKey::from_priv(&secp, &account),
            secret: Some(account),
            derivation_path: vec![ChildNumber::from_normal_idx(keychain.as_child_index())?].into(),
            wildcard: Wildcard::Unhardened,
        };

        Ok(Descriptor {
            template,
            key,
            network,
        })
    }

    /// The network this descriptor was declared for.
    pub fn network(&self) -> Network {
        self.network
    }

    /// The script template of this descriptor.
    pub fn template(&self) -> ScriptTemplate {
        self.template
    }

    /// Whether this descriptor ends in a wildcard and thus describes a family
    /// of output scripts.
    pub fn is_ranged(&self) -> bool {
        self.key.wildcard != Wildcard::None
    }

    /// Substitute the wildcard with `index`, derive the concrete key, and
    /// build the output script for this descriptor's template.
    pub fn script_pubkey_at<C: Signing + Verification>(
        &self,
        secp: &Secp256k1<C>,
        index: u32,
    ) -> Result<Script, Error> {
        let public_key = self.key.derive_public_key(secp, index)?;

        Ok(match self.template {
            ScriptTemplate::Pkh => {
                Script::new_p2pkh(&hash160::Hash::hash(&public_key.serialize()))
            }
            ScriptTemplate::Wpkh => {
                Script::new_p2wpkh(&hash160::Hash::hash(&public_key.serialize()))
            }
            ScriptTemplate::Tr => {
                let (internal_key, _) = public_key.x_only_public_key();
                let tweak = Scalar::from_be_bytes(tap_tweak(&internal_key))
                    .map_err(|_| Error::Secp256k1(secp256k1::Error::InvalidTweak))?;
                let (output_key, _) = internal_key.add_tweak(secp, &tweak)?;
                Script::new_p2tr_tweaked(&output_key)
            }
        })
    }

    /// Derive the address at `index`, encoded for this descriptor's network.
    pub fn address_at<C: Signing + Verification>(
        &self,
        secp: &Secp256k1<C>,
        index: u32,
    ) -> Result<Address, Error> {
        let script = self.script_pubkey_at(secp, index)?;
        Address::from_script(&script, self.network).map_err(|_| Error::ScriptWithoutAddressForm)
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = format!("{}({})", self.template.tag(), self.key);
        let checksum = calc_checksum(&body).map_err(|_| fmt::Error)?;
        write!(f, "{}#{}", body, checksum)
    }
}

/// The BIP341 key-path commitment of an internal key with no script tree.
fn tap_tweak(internal_key: &XOnlyPublicKey) -> [u8; 32] {
    let tag = sha256::Hash::hash(b"TapTweak").to_byte_array();
    let mut engine = sha256::Hash::engine();
    engine.input(&tag);
    engine.input(&tag);
    engine.input(&internal_key.serialize());
    sha256::Hash::from_engine(engine).to_byte_array()
}
