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

//! Bounded in-memory object cache with FIFO admission order and
//! memory-pressure-driven write-back to a backing store.

mod backend;
mod cache;
mod entry;
mod error;

pub use backend::CacheBackend;
pub use cache::{CacheConfig, ObjectCache};
pub use entry::CachedEntry;
pub use error::{Error, Result};
