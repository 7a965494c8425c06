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

use std::sync::Arc;

use promics_common::code::ObjectKey;

/// Write-back seam between the object cache and its backing store.
///
/// A flush hands the backend one batch: `inserts` are entries with no
/// persisted counterpart yet, `updates` are edited entries that already
/// have one. The backend persists both and commits before returning;
/// an error must leave the store unchanged up to its own commit boundary.
pub trait CacheBackend<T>: Send + Sync + 'static {
    /// Persists one flush batch and commits.
    fn write_back(
        &self,
        inserts: &[(ObjectKey, Arc<T>)],
        updates: &[(ObjectKey, Arc<T>)],
    ) -> anyhow::Result<()>;
}
