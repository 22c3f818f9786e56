// Koinu
// Copyright (c) 2024 Koinu Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Wallet persistence.
//!
//! The wallet stages a [`ChangeSet`] describing everything that happened
//! since the last commit, and a [`PersistBackend`] decides where it goes.
//! The `()` backend throws changes away, which is what
//! [`Wallet::new_no_persist`](crate::Wallet::new_no_persist) relies on.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::types::{KeychainKind, LocalUtxo};

/// An incremental diff of the wallet's derivation and output state.
///
/// Change sets are monoidal: an empty one is a no-op, and appending two gives
/// the same result as applying them in sequence.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// New derivation watermarks, keyed by keychain
    pub next_index: BTreeMap<KeychainKind, u32>,
    /// Outputs tracked since the last commit
    pub utxos: Vec<LocalUtxo>,
}

impl ChangeSet {
    /// Whether applying this change set would do nothing.
    pub fn is_empty(&self) -> bool {
        self.next_index.is_empty() && self.utxos.is_empty()
    }

    /// Fold `other` into `self`, with `other`'s watermarks taking precedence.
    pub fn append(&mut self, other: ChangeSet) {
        self.next_index.extend(other.next_index);
        self.utxos.extend(other.utxos);
    }
}

/// A place the wallet can write its change sets to and load them back from.
pub trait PersistBackend<C> {
    /// Error when writing out a change set
    type WriteError: Debug;
    /// Error when loading the aggregate change set
    type LoadError: Debug;

    /// Append `changeset` to the persistence layer.
    fn write_changes(&mut self, changeset: &C) -> Result<(), Self::WriteError>;

    /// Load the aggregate of every change set written so far.
    fn load_from_persistence(&mut self) -> Result<C, Self::LoadError>;
}

impl<C: Default> PersistBackend<C> for () {
    type WriteError = Infallible;
    type LoadError = Infallible;

    fn write_changes(&mut self, _changeset: &C) -> Result<(), Self::WriteError> {
        Ok(())
    }

    fn load_from_persistence(&mut self) -> Result<C, Self::LoadError> {
        Ok(C::default())
    }
}
