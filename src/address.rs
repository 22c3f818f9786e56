// Koinu
// Copyright (c) 2024 Koinu Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Address encoding and decoding.
//!
//! Legacy payloads use base58check with a network version byte; witness
//! programs use bech32 for version 0 and bech32m for later versions, with a
//! network-specific human-readable part.

use std::fmt;
use std::str::FromStr;

use bech32::{u5, FromBase32, ToBase32, Variant};
use bitcoin_hashes::{hash160, Hash};

use crate::types::{Network, Script};

/// Base58 version byte for mainnet P2PKH addresses.
const PUBKEY_ADDRESS_PREFIX_MAIN: u8 = 0;
/// Base58 version byte for testnet/signet/regtest P2PKH addresses.
const PUBKEY_ADDRESS_PREFIX_TEST: u8 = 111;
/// Base58 version byte for mainnet P2SH addresses.
const SCRIPT_ADDRESS_PREFIX_MAIN: u8 = 5;
/// Base58 version byte for testnet/signet/regtest P2SH addresses.
const SCRIPT_ADDRESS_PREFIX_TEST: u8 = 196;

/// An address parsing or encoding error.
#[derive(Debug)]
pub enum Error {
    /// Base58check decoding error
    Base58(bs58::decode::Error),
    /// Bech32 decoding error
    Bech32(bech32::Error),
    /// The human-readable part doesn't match any supported network
    UnknownHrp(String),
    /// The base58 version byte doesn't match any supported network
    UnknownAddressVersion(u8),
    /// Witness version above 16, or not encodable as a single opcode
    InvalidWitnessVersion(u8),
    /// The witness program has an invalid length for its version
    InvalidWitnessProgramLength(usize),
    /// Bech32 variant doesn't match the witness version (v0 must use bech32,
    /// v1+ must use bech32m)
    InvalidBech32Variant,
    /// A base58 payload had an unexpected length
    InvalidBase58PayloadLength(usize),
    /// The script has no address form
    UnrepresentableScript,
    /// The address belongs to a different network
    NetworkMismatch {
        /// Network the address encodes
        found: Network,
        /// Network that was expected
        expected: Network,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Base58(err) => write!(f, "Base58 error: {}", err),
            Self::Bech32(err) => write!(f, "Bech32 error: {}", err),
            Self::UnknownHrp(hrp) => write!(f, "Unknown bech32 prefix: `{}`", hrp),
            Self::UnknownAddressVersion(v) => write!(f, "Unknown address version byte: {}", v),
            Self::InvalidWitnessVersion(v) => write!(f, "Invalid witness version: {}", v),
            Self::InvalidWitnessProgramLength(len) => {
                write!(f, "Invalid witness program length: {}", len)
            }
            Self::InvalidBech32Variant => {
                write!(f, "Bech32 variant doesn't match the witness version")
            }
            Self::InvalidBase58PayloadLength(len) => {
                write!(f, "Invalid base58 payload length: {}", len)
            }
            Self::UnrepresentableScript => write!(f, "Script doesn't have address form"),
            Self::NetworkMismatch { found, expected } => write!(
                f,
                "Address belongs to {} but {} was expected",
                found, expected
            ),
        }
    }
}

impl std::error::Error for Error {}

impl From<bs58::decode::Error> for Error {
    fn from(err: bs58::decode::Error) -> Self {
        Error::Base58(err)
    }
}

impl From<bech32::Error> for Error {
    fn from(err: bech32::Error) -> Self {
        Error::Bech32(err)
    }
}

/// The method used to produce an address from a script.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Payload {
    /// P2PKH
    PubkeyHash(hash160::Hash),
    /// P2SH
    ScriptHash(hash160::Hash),
    /// Segwit address of any version
    WitnessProgram {
        /// The witness version, `0..=16`
        version: u8,
        /// The witness program, `2..=40` bytes
        program: Vec<u8>,
    },
}

/// A parsed address, tagged with the network it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    /// The address payload
    pub payload: Payload,
    /// The network this address is valid on
    pub network: Network,
}

impl Address {
    /// Interpret an output script as an address, if it has address form.
    pub fn from_script(script: &Script, network: Network) -> Result<Address, Error> {
        let bytes = script.as_bytes();
        let payload = if script.is_p2pkh() {
            Payload::PubkeyHash(
                hash160::Hash::from_slice(&bytes[3..23])
                    .expect("20-byte slice is a valid hash160"),
            )
        } else if script.is_p2wpkh() {
            Payload::WitnessProgram {
                version: 0,
                program: bytes[2..22].to_vec(),
            }
        } else if script.is_p2tr() {
            Payload::WitnessProgram {
                version: 1,
                program: bytes[2..34].to_vec(),
            }
        } else {
            return Err(Error::UnrepresentableScript);
        };

        Ok(Address { payload, network })
    }

    /// Generate the output script this address describes.
    pub fn script_pubkey(&self) -> Script {
        match &self.payload {
            Payload::PubkeyHash(hash) => Script::new_p2pkh(hash),
            Payload::ScriptHash(hash) => {
                // OP_HASH160 <20-byte hash> OP_EQUAL
                let mut script = Vec::with_capacity(23);
                script.push(0xa9);
                script.push(20);
                script.extend_from_slice(&hash.to_byte_array());
                script.push(0x87);
                Script::from_bytes(script)
            }
            Payload::WitnessProgram { version, program } => {
                let mut script = Vec::with_capacity(2 + program.len());
                // OP_0, or OP_1..OP_16 offset into the opcode table
                script.push(if *version == 0 { 0x00 } else { 0x50 + version });
                script.push(program.len() as u8);
                script.extend_from_slice(program);
                Script::from_bytes(script)
            }
        }
    }

    /// Parse an address, additionally checking it belongs to `network`.
    pub fn from_str_checked(s: &str, network: Network) -> Result<Address, Error> {
        let address = Address::from_str(s)?;
        if !address.valid_for(network) {
            return Err(Error::NetworkMismatch {
                found: address.network,
                expected: network,
            });
        }
        Ok(Address { network, ..address })
    }

    /// Whether this address's encoding is also valid on `network`.
    ///
    /// Witness programs are told apart by their bech32 prefix; base58
    /// payloads only distinguish mainnet from the test networks, so a
    /// testnet legacy address passes for signet and regtest too.
    fn valid_for(&self, network: Network) -> bool {
        match self.payload {
            Payload::WitnessProgram { .. } => {
                self.network.bech32_hrp() == network.bech32_hrp()
            }
            Payload::PubkeyHash(_) | Payload::ScriptHash(_) => {
                self.network.is_same_key_class(network)
            }
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.payload {
            Payload::PubkeyHash(hash) => {
                let version = match self.network {
                    Network::Bitcoin => PUBKEY_ADDRESS_PREFIX_MAIN,
                    _ => PUBKEY_ADDRESS_PREFIX_TEST,
                };
                base58check_fmt(f, version, &hash.to_byte_array())
            }
            Payload::ScriptHash(hash) => {
                let version = match self.network {
                    Network::Bitcoin => SCRIPT_ADDRESS_PREFIX_MAIN,
                    _ => SCRIPT_ADDRESS_PREFIX_TEST,
                };
                base58check_fmt(f, version, &hash.to_byte_array())
            }
            Payload::WitnessProgram { version, program } => {
                let witness_version = u5::try_from_u8(*version).map_err(|_| fmt::Error)?;
                let variant = if *version == 0 {
                    Variant::Bech32
                } else {
                    Variant::Bech32m
                };

                let mut data = vec![witness_version];
                data.extend(program.to_base32());
                let encoded = bech32::encode(self.network.bech32_hrp(), data, variant)
                    .map_err(|_| fmt::Error)?;
                write!(f, "{}", encoded)
            }
        }
    }
}

fn base58check_fmt(f: &mut fmt::Formatter<'_>, version: u8, payload: &[u8]) -> fmt::Result {
    let mut data = Vec::with_capacity(1 + payload.len());
    data.push(version);
    data.extend_from_slice(payload);
    write!(f, "{}", bs58::encode(data).with_check().into_string())
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // bech32 addresses always contain a separator; base58 never encodes '1'
        // as a leading-hrp separator pattern we'd accept, so try bech32 first
        if let Ok((hrp, data, variant)) = bech32::decode(s) {
            let network = match hrp.as_str() {
                "bc" => Network::Bitcoin,
                "tb" => Network::Testnet,
                "bcrt" => Network::Regtest,
                _ => return Err(Error::UnknownHrp(hrp)),
            };

            if data.is_empty() {
                return Err(Error::InvalidWitnessProgramLength(0));
            }
            let version = data[0].to_u8();
            if version > 16 {
                return Err(Error::InvalidWitnessVersion(version));
            }
            let program = Vec::<u8>::from_base32(&data[1..])?;
            if program.len() < 2 || program.len() > 40 {
                return Err(Error::InvalidWitnessProgramLength(program.len()));
            }
            if version == 0 && program.len() != 20 && program.len() != 32 {
                return Err(Error::InvalidWitnessProgramLength(program.len()));
            }

            let expected_variant = if version == 0 {
                Variant::Bech32
            } else {
                Variant::Bech32m
            };
            if variant != expected_variant {
                return Err(Error::InvalidBech32Variant);
            }

            return Ok(Address {
                payload: Payload::WitnessProgram { version, program },
                network,
            });
        }

        let data = bs58::decode(s).with_check(None).into_vec()?;
        if data.len() != 21 {
            return Err(Error::InvalidBase58PayloadLength(data.len()));
        }

        let hash = hash160::Hash::from_slice(&data[1..]).expect("21-byte payload checked above");
        let (network, payload) = match data[0] {
            PUBKEY_ADDRESS_PREFIX_MAIN => (Network::Bitcoin, Payload::PubkeyHash(hash)),
            PUBKEY_ADDRESS_PREFIX_TEST => (Network::Testnet, Payload::PubkeyHash(hash)),
            SCRIPT_ADDRESS_PREFIX_MAIN => (Network::Bitcoin, Payload::ScriptHash(hash)),
            SCRIPT_ADDRESS_PREFIX_TEST => (Network::Testnet, Payload::ScriptHash(hash)),
            version => return Err(Error::UnknownAddressVersion(version)),
        };

        Ok(Address { payload, network })
    }
}
