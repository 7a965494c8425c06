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

/// Precursor ion of a fragmentation spectrum.
#[derive(Debug, Clone, PartialEq)]
pub struct Precursor {
    /// Retention time in seconds.
    pub rt: f64,
    /// Mass over charge ratio.
    pub mz: f64,
    /// Measured intensity.
    pub intensity: f64,
    /// Possible charge states.
    pub charges: Vec<i32>,
}

impl Precursor {
    /// Creates a precursor.
    pub fn new(rt: f64, mz: f64, intensity: f64, charges: Vec<i32>) -> Self {
        Self {
            rt,
            mz,
            intensity,
            charges,
        }
    }
}

/// A mass spectrum: a precursor and parallel peak arrays.
///
/// `mz` and `intensity` are index-aligned and kept in acquisition order.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    /// Precursor ion.
    pub precursor: Precursor,
    /// Peak mass over charge ratios.
    pub mz: Vec<f64>,
    /// Peak intensities, aligned with `mz`.
    pub intensity: Vec<f64>,
    /// MSn level, e.g. 2 for a fragmentation spectrum.
    pub level: i32,
}

impl Spectrum {
    /// Creates a spectrum.
    pub fn new(precursor: Precursor, mz: Vec<f64>, intensity: Vec<f64>, level: i32) -> Self {
        debug_assert_eq!(mz.len(), intensity.len());
        Self {
            precursor,
            mz,
            intensity,
            level,
        }
    }

    /// Number of peaks.
    pub fn peak_count(&self) -> usize {
        self.mz.len()
    }

    /// Highest peak intensity, if any peaks are present.
    pub fn max_intensity(&self) -> Option<f64> {
        self.intensity.iter().copied().reduce(f64::max)
    }

    /// Sum of all peak intensities.
    pub fn total_intensity(&self) -> f64 {
        self.intensity.iter().sum()
    }
}
