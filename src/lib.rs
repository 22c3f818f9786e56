// Koinu
// Copyright (c) 2024 Koinu Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! A compact, descriptor-based wallet engine.
//!
//! Koinu implements the deterministic core that wallet bindings build on: BIP39
//! mnemonics, a BIP32 hierarchical key tree, an output-script descriptor
//! language (`pkh`, `wpkh` and single-key `tr`), deterministic address
//! derivation per keychain, and UTXO/balance bookkeeping over the addresses it
//! has issued.
//!
//! Everything in this crate is synchronous and side-effect free except for the
//! [`Wallet`] watermark and UTXO set: chain data is supplied by the caller as
//! already-materialized [`TxOut`]s, and persistence is an optional capability
//! ([`wallet::persist::PersistBackend`]) that defaults to none.
//!
//! ```no_run
//! use koinu::{AddressIndex, Network, Wallet};
//!
//! # fn main() -> Result<(), koinu::Error> {
//! let mut wallet = Wallet::new_no_persist(
//!     "wpkh([c258d2e4/84h/1h/0h]tpubDDYkZojQFQjht8Tm4jsS3iuEmKjTiEGjG6KnuFNKKJb5A6ZUCUZKdvLdSDWofKi4ToRCwb9poe1XdqfUnP4jaJjCB2Zwv11ZLgSbnZSNecE/0/*)",
//!     None,
//!     Network::Testnet,
//! )?;
//!
//! let info = wallet.get_address(AddressIndex::New)?;
//! println!("receive to {} (index {})", info.address, info.index);
//! println!("balance: {}", wallet.get_balance().total());
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

pub extern crate bech32;
pub extern crate bip39;
pub extern crate bitcoin_hashes;
pub extern crate secp256k1;

pub mod address;
pub mod descriptor;
mod error;
pub mod keys;
pub mod types;
pub mod wallet;

pub use address::Address;
pub use descriptor::Descriptor;
pub use error::Error;
pub use types::*;
pub use wallet::{AddressIndex, AddressInfo, Wallet};
