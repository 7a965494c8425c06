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

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Progress sink for long-running batch operations.
///
/// Cancellation is cooperative: operations check `is_cancelled` once per
/// element and return whatever partial result has accumulated. Cancellation
/// is not an error.
pub trait Progress: Send + Sync {
    /// Announces the number of elements the operation will process.
    fn set_total(&self, _total: usize) {}

    /// Reports that one element has been processed.
    fn tick(&self) {}

    /// Whether the caller asked for the operation to stop.
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Progress sink that ignores reports and never cancels.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl Progress for NoProgress {}

/// Progress sink counting ticks, cancellable from another thread.
#[derive(Debug, Default)]
pub struct CountingProgress {
    total: AtomicUsize,
    ticks: AtomicUsize,
    cancelled: AtomicBool,
}

impl CountingProgress {
    /// Requests cancellation of the running operation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Number of elements processed so far.
    pub fn ticks(&self) -> usize {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Announced total, 0 if never set.
    pub fn total(&self) -> usize {
        self.total.load(Ordering::Relaxed)
    }
}

impl Progress for CountingProgress {
    fn set_total(&self, total: usize) {
        self.total.store(total, Ordering::Relaxed);
    }

    fn tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn test_counting_progress() {
        let progress = CountingProgress::default();
        progress.set_total(3);
        progress.tick();
        progress.tick();
        assert_eq!(progress.total(), 3);
        assert_eq!(progress.ticks(), 2);
        assert!(!progress.is_cancelled());
        progress.cancel();
        assert!(progress.is_cancelled());
    }
}
