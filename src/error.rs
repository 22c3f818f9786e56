// Koinu
// Copyright (c) 2024 Koinu Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

use std::fmt;

use crate::types::OutPoint;
use crate::{address, descriptor, keys};

/// Errors that can be thrown by the [`Wallet`](crate::wallet::Wallet)
#[derive(Debug)]
pub enum Error {
    /// Generic error
    Generic(String),
    /// This error is thrown when trying to convert a script without address form
    ScriptDoesntHaveAddressForm,
    /// An ingested output's script doesn't match any address issued by the wallet
    UnownedOutput(OutPoint),
    /// The persistence backend failed to load or write wallet state
    Persist(String),
    /// Error related to the parsing and usage of descriptors
    Descriptor(descriptor::error::Error),
    /// Error while working with [`keys`](crate::keys)
    Key(keys::KeyError),
    /// BIP32 error
    Bip32(keys::bip32::Error),
    /// Address encoding error
    Address(address::Error),
    /// A secp256k1 error
    Secp256k1(secp256k1::Error),
    /// Error serializing or deserializing JSON data
    Json(serde_json::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generic(err) => write!(f, "Generic error: {}", err),
            Self::ScriptDoesntHaveAddressForm => write!(f, "Script doesn't have address form"),
            Self::UnownedOutput(outpoint) => write!(
                f,
                "Output {} doesn't belong to any address issued by this wallet",
                outpoint
            ),
            Self::Persist(err) => write!(f, "Persistence backend error: {}", err),
            Self::Descriptor(err) => write!(f, "Descriptor error: {}", err),
            Self::Key(err) => write!(f, "Key error: {}", err),
            Self::Bip32(err) => write!(f, "BIP32 error: {}", err),
            Self::Address(err) => write!(f, "Address error: {}", err),
            Self::Secp256k1(err) => write!(f, "Secp256k1 error: {}", err),
            Self::Json(err) => write!(f, "Serialize/Deserialize JSON error: {}", err),
        }
    }
}

impl std::error::Error for Error {}

macro_rules! impl_error {
    ( $from:ty, $to:ident ) => {
        impl_error!($from, $to, $crate::error::Error);
    };
    ( $from:ty, $to:ident, $impl_for:ty ) => {
        impl std::convert::From<$from> for $impl_for {
            fn from(err: $from) -> Self {
                <$impl_for>::$to(err)
            }
        }
    };
}

impl_error!(descriptor::error::Error, Descriptor);
impl_error!(keys::KeyError, Key);
impl_error!(keys::bip32::Error, Bip32);
impl_error!(address::Error, Address);
impl_error!(secp256k1::Error, Secp256k1);
impl_error!(serde_json::Error, Json);
