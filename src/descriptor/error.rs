// Koinu
// Copyright (c) 2024 Koinu Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Descriptor errors

use std::fmt;

use crate::keys::bip32;
use crate::types::Network;

/// Errors related to the parsing and usage of descriptors
#[derive(Debug)]
pub enum Error {
    /// The descriptor contains a character outside the descriptor charset
    InvalidDescriptorCharacter(char),
    /// The trailing `#` checksum doesn't match the descriptor body
    InvalidChecksum,
    /// The template is part of the descriptor grammar but not supported here
    UnsupportedDescriptor(String),
    /// The descriptor text couldn't be parsed
    MalformedInput,
    /// A non-ranged descriptor was asked to derive at an index
    MissingWildcard,
    /// A hardened wildcard (`/*'`) on a public-only key expression
    HardenedDerivationOnXpub,
    /// The derived output script has no address form
    ScriptWithoutAddressForm,
    /// The embedded extended key's network tag disagrees with the descriptor's
    /// declared network
    KeyNetworkMismatch {
        /// Network class the key is serialized for
        key: Network,
        /// Network the descriptor was declared for
        expected: Network,
    },
    /// BIP32 error
    Bip32(bip32::Error),
    /// A secp256k1 error
    Secp256k1(secp256k1::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDescriptorCharacter(ch) => {
                write!(f, "Invalid descriptor character: {}", ch)
            }
            Self::InvalidChecksum => write!(f, "Descriptor checksum mismatch"),
            Self::UnsupportedDescriptor(form) => {
                write!(f, "Unsupported descriptor template: `{}`", form)
            }
            Self::MalformedInput => write!(f, "Malformed descriptor"),
            Self::MissingWildcard => write!(
                f,
                "Descriptor is not ranged, it cannot be derived at an index"
            ),
            Self::HardenedDerivationOnXpub => write!(
                f,
                "Hardened wildcard derivation requires the private key"
            ),
            Self::ScriptWithoutAddressForm => {
                write!(f, "Derived script doesn't have address form")
            }
            Self::KeyNetworkMismatch { key, expected } => write!(
                f,
                "Key is serialized for {} but the descriptor was declared for {}",
                key, expected
            ),
            Self::Bip32(err) => write!(f, "BIP32 error: {}", err),
            Self::Secp256k1(err) => write!(f, "Secp256k1 error: {}", err),
        }
    }
}

impl std::error::Error for Error {}

impl From<bip32::Error> for Error {
    fn from(err: bip32::Error) -> Self {
        Error::Bip32(err)
    }
}

impl From<secp256k1::Error> for Error {
    fn from(err: secp256k1::Error) -> Self {
        Error::Secp256k1(err)
    }
}
