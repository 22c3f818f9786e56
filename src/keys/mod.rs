// Koinu
// Copyright (c) 2024 Koinu Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Key generation: BIP39 mnemonics, seeds and master keys.
//!
//! The mnemonic encoding itself is delegated to the [`bip39`] crate; this
//! module picks the entropy, maps word counts, and turns seeds into
//! [`ExtendedPrivKey`] roots for the [`bip32`] tree.

use std::fmt;

use bip39::Language;
pub use bip39::Mnemonic;
use rand::RngCore;

#[allow(unused_imports)]
use log::{debug, error, info, trace};

use crate::types::Network;

pub mod bip32;

use bip32::ExtendedPrivKey;

/// Errors thrown while generating or using keys
#[derive(Debug)]
pub enum KeyError {
    /// A mnemonic was requested with a word count outside {12, 15, 18, 21, 24}
    InvalidWordCount(u32),
    /// BIP39 error, including checksum failures when reconstructing a mnemonic
    Bip39(bip39::Error),
    /// BIP32 error
    Bip32(bip32::Error),
}

impl fmt::Display for KeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidWordCount(count) => {
                write!(f, "Unsupported mnemonic word count: {}", count)
            }
            Self::Bip39(err) => write!(f, "BIP39 error: {}", err),
            Self::Bip32(err) => write!(f, "BIP32 error: {}", err),
        }
    }
}

impl std::error::Error for KeyError {}

impl From<bip39::Error> for KeyError {
    fn from(err: bip39::Error) -> Self {
        KeyError::Bip39(err)
    }
}

impl From<bip32::Error> for KeyError {
    fn from(err: bip32::Error) -> Self {
        KeyError::Bip32(err)
    }
}

/// The number of words in a mnemonic, tied to the entropy it encodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WordCount {
    /// 12 words (128 bits of entropy)
    Words12 = 12,
    /// 15 words (160 bits of entropy)
    Words15 = 15,
    /// 18 words (192 bits of entropy)
    Words18 = 18,
    /// 21 words (224 bits of entropy)
    Words21 = 21,
    /// 24 words (256 bits of entropy)
    Words24 = 24,
}

impl WordCount {
    /// Map a plain number of words to a [`WordCount`].
    pub fn from_count(count: u32) -> Result<WordCount, KeyError> {
        match count {
            12 => Ok(WordCount::Words12),
            15 => Ok(WordCount::Words15),
            18 => Ok(WordCount::Words18),
            21 => Ok(WordCount::Words21),
            24 => Ok(WordCount::Words24),
            other => Err(KeyError::InvalidWordCount(other)),
        }
    }

    /// The number of entropy bytes encoded by a mnemonic of this length.
    pub fn entropy_bytes(self) -> usize {
        // 11 bits per word, minus one checksum bit per 32 entropy bits
        (self as usize / 3) * 4
    }
}

/// Generate a new mnemonic from fresh entropy.
pub fn generate_mnemonic(word_count: WordCount) -> Result<Mnemonic, KeyError> {
    let mut entropy = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut entropy);
    generate_mnemonic_with_entropy(word_count, entropy)
}

/// Generate a mnemonic from caller-provided entropy.
///
/// Only the first `word_count.entropy_bytes()` bytes are used.
pub fn generate_mnemonic_with_entropy(
    word_count: WordCount,
    entropy: [u8; 32],
) -> Result<Mnemonic, KeyError> {
    let entropy = &entropy[..word_count.entropy_bytes()];
    Ok(Mnemonic::from_entropy_in(Language::English, entropy)?)
}

/// Reconstruct a mnemonic from caller-supplied words, validating the checksum.
pub fn parse_mnemonic(words: &str) -> Result<Mnemonic, KeyError> {
    Ok(Mnemonic::parse_in_normalized(Language::English, words)?)
}

/// Stretch a mnemonic (and optional passphrase) into a 64-byte seed.
///
/// Pure and deterministic: the same inputs always produce the same seed.
pub fn mnemonic_to_seed(mnemonic: &Mnemonic, passphrase: Option<&str>) -> [u8; 64] {
    mnemonic.to_seed(passphrase.unwrap_or(""))
}

/// Build the master extended private key for `network` from a mnemonic.
pub fn master_key(
    network: Network,
    mnemonic: &Mnemonic,
    passphrase: Option<&str>,
) -> Result<ExtendedPrivKey, KeyError> {
    let seed = mnemonic_to_seed(mnemonic, passphrase);
    debug!("deriving master key for {}", network);
    Ok(ExtendedPrivKey::new_master(network, &seed)?)
}
