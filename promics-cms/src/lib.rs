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

//! Compressed spectrum container (`.cms`) with a streaming writer and a
//! memory-mapped random-access reader.

mod error;
mod format;
mod reader;
mod spectrum;
mod writer;

pub use error::{Error, Result};
pub use format::{HEADER_LEN, MAGIC};
pub use reader::SpectrumReader;
pub use spectrum::{Precursor, Spectrum};
pub use writer::SpectrumWriter;
