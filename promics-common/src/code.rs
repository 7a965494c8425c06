// Copyright 2025 promics Project Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::hash::Hasher;

use serde::{de::DeserializeOwned, Serialize};
use twox_hash::XxHash64;

/// Caller-assigned 64-bit logical key identifying an object across cache and store.
///
/// Typically derived from a content hash of the object's accession, see [`key_for`].
/// A key, once inserted, must never be reused for a different object.
pub type ObjectKey = i64;

/// Derives a logical key from an accession string.
pub fn key_for(accession: &str) -> ObjectKey {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(accession.as_bytes());
    hasher.finish() as ObjectKey
}

/// Capability contract for domain objects managed by the object store.
///
/// This is the only coupling the store has to domain types. Heterogeneous
/// domain models are expected to be expressed as an enum implementing this
/// trait, with `type_name` reporting the variant-level name used for
/// class indexing.
pub trait StoreObject: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Returns the logical key stamped on this object.
    fn id(&self) -> ObjectKey;

    /// Stamps the logical key on this object.
    fn set_id(&mut self, id: ObjectKey);

    /// Whether this object is a top-level persisted root.
    fn first_level(&self) -> bool;

    /// Marks this object as a top-level persisted root.
    fn set_first_level(&mut self, first_level: bool);

    /// Type name used for class indexing and "all objects of class" queries.
    fn type_name(&self) -> &'static str;
}
