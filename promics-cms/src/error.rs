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

/// Spectrum container error type.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The file does not start with the container magic number.
    #[error("unsupported file format")]
    UnsupportedFormat,
    /// No spectrum with the requested title exists in the container.
    #[error("spectrum not found: {title}")]
    NotFound {
        /// Requested spectrum title.
        title: String,
    },
    /// The container layout is inconsistent with its header or footer.
    #[error("corrupt container data: {reason}")]
    Corrupt {
        /// What failed to parse or validate.
        reason: String,
    },
    /// The title cannot be stored in the tab-separated footer.
    #[error("invalid spectrum title: {title:?}")]
    InvalidTitle {
        /// Rejected title.
        title: String,
    },
    /// A spectrum with the same title was already added.
    #[error("duplicate spectrum title: {title}")]
    DuplicateTitle {
        /// Rejected title.
        title: String,
    },
    /// Mass and intensity arrays must be the same length.
    #[error("peak arrays disagree: {mz} masses, {intensity} intensities")]
    PeakMismatch {
        /// Number of mass values.
        mz: usize,
        /// Number of intensity values.
        intensity: usize,
    },
    /// Io error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn corrupt(reason: impl Into<String>) -> Self {
        Self::Corrupt {
            reason: reason.into(),
        }
    }
}

/// Spectrum container result type.
pub type Result<T> = std::result::Result<T, Error>;
