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

use promics_common::code::ObjectKey;

/// Object store error.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A logical key was inserted twice. Keys must never be reused for a
    /// different object; indices are left untouched when this fires.
    #[error("duplicate insertion, key: {key}")]
    DuplicateKey {
        /// The offending logical key.
        key: ObjectKey,
    },
    /// A terminal operation referenced a key unknown to the id mapping.
    #[error("unknown key: {key}")]
    KeyNotFound {
        /// The unknown logical key.
        key: ObjectKey,
    },
    /// The store is not in the `Active` state.
    #[error("store is not active")]
    Closed,
    /// Backing engine error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Object (de)serialization error.
    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),
    /// Filesystem error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Object cache error.
    #[error("cache error: {0}")]
    Cache(#[from] promics_cache::Error),
}

/// Object store result.
pub type Result<T> = core::result::Result<T, Error>;
