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

/// A cached domain object with its residency flags.
#[derive(Debug)]
pub struct CachedEntry<T> {
    pub(crate) object: Arc<T>,
    /// Whether a persisted counterpart exists in the backing store.
    pub(crate) in_store: bool,
    /// Whether the object changed since it was admitted or last flushed.
    pub(crate) edited: bool,
}

impl<T> CachedEntry<T> {
    pub(crate) fn new(object: Arc<T>, in_store: bool, edited: bool) -> Self {
        Self {
            object,
            in_store,
            edited,
        }
    }

    /// The cached object.
    pub fn object(&self) -> &Arc<T> {
        &self.object
    }

    /// Whether a persisted counterpart exists in the backing store.
    pub fn in_store(&self) -> bool {
        self.in_store
    }

    /// Whether the object is dirty since load.
    pub fn edited(&self) -> bool {
        self.edited
    }
}
