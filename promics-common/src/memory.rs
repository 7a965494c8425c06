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

/// Reports the memory used by the current process.
///
/// `used_bytes` returning `None` means the platform cannot report usage;
/// consumers fall back to count-based bounds.
pub trait MemoryProbe: Send + Sync + 'static {
    /// Returns the current resident set size in bytes, if available.
    fn used_bytes(&self) -> Option<u64>;
}

/// Probe backed by `/proc/self/status` (Linux).
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcStatusProbe;

impl MemoryProbe for ProcStatusProbe {
    fn used_bytes(&self) -> Option<u64> {
        rss_bytes()
    }
}

/// Returns the resident set size of the current process in bytes.
pub fn rss_bytes() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    read_kb_line(&status, "VmRSS:")
}

/// Returns the total memory of the host in bytes.
pub fn total_memory_bytes() -> Option<u64> {
    let meminfo = std::fs::read_to_string("/proc/meminfo").ok()?;
    read_kb_line(&meminfo, "MemTotal:")
}

/// Parses a `<tag> <n> kB` line out of a procfs dump.
fn read_kb_line(text: &str, tag: &str) -> Option<u64> {
    let line = text.lines().find_map(|line| line.strip_prefix(tag))?;
    let kb: u64 = line.trim().trim_end_matches("kB").trim().parse().ok()?;
    Some(kb * 1024)
}
