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

//! promics is a toolkit for proteomics data processing pipelines:
//!
//! - a memory-pressure-driven object cache with FIFO eviction
//!   ([`ObjectCache`]),
//! - an identity-stable object store over an embedded SQLite engine
//!   ([`ObjectStore`]),
//! - a compressed, memory-mapped spectrum container
//!   ([`SpectrumWriter`] / [`SpectrumReader`]).
//!
//! [`ObjectCache`]: crate::ObjectCache
//! [`ObjectStore`]: crate::ObjectStore
//! [`SpectrumWriter`]: crate::SpectrumWriter
//! [`SpectrumReader`]: crate::SpectrumReader

mod prelude;
pub use prelude::*;
