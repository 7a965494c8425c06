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

//! On-disk layout of the `.cms` container.
//!
//! ```plain
//! header:  magic (8) | footer offset (i64) | min mz, max mz, max intensity, max rt (f64 each)
//! entry:   mz, rt, intensity (f64 each) | level (i32) | compressed len (i32)
//!          | peak count (i32) | deflated interleaved (mz, intensity) f64 pairs
//!          | charge count (i32) | charges (i32 each)
//! footer:  compressed len (i32) | uncompressed len (i32) | deflated footer text
//! ```
//!
//! The footer text is tab-joined: the spectrum titles, their absolute entry
//! offsets, the postcursor linkage field and the buffer start list. All
//! integers and floats are big-endian.

use std::{
    collections::HashMap,
    io::{Read, Write},
};

use bytes::Buf;
use flate2::{read::DeflateDecoder, write::DeflateEncoder, Compression};

use crate::error::{Error, Result};

/// Magic number opening every container file.
pub const MAGIC: [u8; 8] = *b"CMSFMT01";

/// Fixed header length in bytes: magic, footer offset, four precursor stats.
pub const HEADER_LEN: u64 = 8 + 8 + 4 * 8;

/// Field separator of the footer text. Titles must not contain it.
pub(crate) const TITLE_SEPARATOR: char = '\t';

/// Entries are assigned to a fresh mapped region once the current one would
/// outgrow this many bytes.
pub(crate) const MAX_BUFFER_BYTES: u64 = 1 << 30;

/// Deflates `data` with the raw deflate format (no zlib wrapper).
pub(crate) fn deflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Inflates `data`, checking the result against the recorded length.
///
/// A zero-length result for a non-empty expectation is always corruption, as
/// is any other length disagreement.
pub(crate) fn inflate(data: &[u8], expected_len: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(expected_len);
    DeflateDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|err| Error::corrupt(format!("deflate stream: {err}")))?;
    if out.len() != expected_len {
        return Err(Error::corrupt(format!(
            "decompressed {} bytes where {} were recorded",
            out.len(),
            expected_len
        )));
    }
    Ok(out)
}

/// Bounds-checked big-endian reads over a mapped byte region.
///
/// Out-of-range reads surface as [`Error::Corrupt`] instead of panicking, so
/// a truncated or mis-indexed file never takes the process down.
pub(crate) struct EntryCursor<'a> {
    buf: &'a [u8],
}

impl<'a> EntryCursor<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn need(&self, n: usize) -> Result<()> {
        if self.buf.remaining() < n {
            return Err(Error::corrupt("entry truncated by mapped region end"));
        }
        Ok(())
    }

    pub(crate) fn get_f64(&mut self) -> Result<f64> {
        self.need(8)?;
        Ok(self.buf.get_f64())
    }

    pub(crate) fn get_i32(&mut self) -> Result<i32> {
        self.need(4)?;
        Ok(self.buf.get_i32())
    }

    /// Reads a non-negative i32 length prefix.
    pub(crate) fn get_len(&mut self) -> Result<usize> {
        let len = self.get_i32()?;
        usize::try_from(len).map_err(|_| Error::corrupt(format!("negative length prefix {len}")))
    }

    pub(crate) fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        self.need(n)?;
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    pub(crate) fn skip(&mut self, n: usize) -> Result<()> {
        self.need(n)?;
        self.buf.advance(n);
        Ok(())
    }
}

/// Decoded footer of a finalized container.
pub(crate) struct Footer {
    pub(crate) titles: Vec<String>,
    pub(crate) offsets: Vec<u64>,
    pub(crate) postcursors: HashMap<String, Vec<String>>,
    pub(crate) buffer_starts: Vec<u64>,
}

/// Renders the footer text, tab-joining titles, offsets, the postcursor
/// linkage field and the buffer start list.
///
/// The linkage field references spectra by their position in the title
/// list, never by title, so titles stay free of any reserved syntax
/// beyond the tab separator itself.
pub(crate) fn encode_footer_text(
    titles: &[String],
    offsets: &[u64],
    postcursors: &[(usize, Vec<usize>)],
    buffer_starts: &[u64],
) -> String {
    let mut fields: Vec<String> = Vec::with_capacity(2 * titles.len() + 2);
    fields.extend(titles.iter().cloned());
    fields.extend(offsets.iter().map(|offset| offset.to_string()));

    if postcursors.is_empty() {
        fields.push("null".to_string());
    } else {
        let linkage = postcursors
            .iter()
            .map(|(parent, children)| {
                let children = children
                    .iter()
                    .map(|child| child.to_string())
                    .collect::<Vec<_>>()
                    .join(",");
                format!("{parent} {{{children}}}")
            })
            .collect::<Vec<_>>()
            .join(" # ");
        fields.push(linkage);
    }

    let starts = buffer_starts
        .iter()
        .map(|start| start.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    fields.push(format!("[{starts}]"));

    fields.join(&TITLE_SEPARATOR.to_string())
}

pub(crate) fn decode_footer_text(text: &str) -> Result<Footer> {
    let fields: Vec<&str> = text.split(TITLE_SEPARATOR).collect();
    if fields.len() < 2 || fields.len() % 2 != 0 {
        return Err(Error::corrupt(format!(
            "footer holds {} fields, expected an even count of at least two",
            fields.len()
        )));
    }
    let n_titles = (fields.len() - 2) / 2;

    let titles: Vec<String> = fields[..n_titles].iter().map(|s| s.to_string()).collect();
    let offsets = fields[n_titles..2 * n_titles]
        .iter()
        .map(|s| {
            s.parse::<u64>()
                .map_err(|_| Error::corrupt(format!("unparsable entry offset {s:?}")))
        })
        .collect::<Result<Vec<_>>>()?;

    let title_at = |index: &str| {
        index
            .parse::<usize>()
            .ok()
            .and_then(|index| titles.get(index))
            .cloned()
            .ok_or_else(|| Error::corrupt(format!("linkage index {index:?} out of range")))
    };

    let linkage = fields[fields.len() - 2];
    let mut postcursors: HashMap<String, Vec<String>> = HashMap::new();
    if !linkage.eq_ignore_ascii_case("null") {
        for part in linkage.split(" # ") {
            let (parent, children) = part
                .split_once(" {")
                .and_then(|(parent, rest)| Some((parent, rest.strip_suffix('}')?)))
                .ok_or_else(|| Error::corrupt(format!("unparsable linkage field {part:?}")))?;
            let children = children
                .split(',')
                .map(title_at)
                .collect::<Result<Vec<_>>>()?;
            postcursors
                .entry(title_at(parent)?)
                .or_default()
                .extend(children);
        }
    }

    let starts = fields[fields.len() - 1];
    let starts = starts
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(|| Error::corrupt(format!("unparsable buffer start list {starts:?}")))?;
    let buffer_starts = starts
        .split(", ")
        .map(|s| {
            s.parse::<u64>()
                .map_err(|_| Error::corrupt(format!("unparsable buffer start {s:?}")))
        })
        .collect::<Result<Vec<_>>>()?;
    if buffer_starts.is_empty() {
        return Err(Error::corrupt("empty buffer start list"));
    }

    Ok(Footer {
        titles,
        offsets,
        postcursors,
        buffer_starts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deflate_round_trip() {
        let data: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
        let compressed = deflate(&data).unwrap();
        assert!(compressed.len() < data.len());
        assert_eq!(inflate(&compressed, data.len()).unwrap(), data);
    }

    #[test]
    fn test_inflate_length_mismatch_is_corrupt() {
        let compressed = deflate(b"abcdef").unwrap();
        assert!(matches!(
            inflate(&compressed, 7),
            Err(Error::Corrupt { .. })
        ));
    }

    #[test]
    fn test_footer_text_round_trip() {
        let titles = vec!["scan=1".to_string(), "scan=2".to_string()];
        let offsets = vec![48, 1024];
        let postcursors = vec![(0, vec![1])];
        let buffer_starts = vec![48];

        let text = encode_footer_text(&titles, &offsets, &postcursors, &buffer_starts);
        let footer = decode_footer_text(&text).unwrap();

        assert_eq!(footer.titles, titles);
        assert_eq!(footer.offsets, offsets);
        assert_eq!(footer.postcursors.get("scan=1").unwrap(), &["scan=2"]);
        assert_eq!(footer.buffer_starts, buffer_starts);
    }

    #[test]
    fn test_linkage_survives_titles_with_delimiter_syntax() {
        // Titles may legally contain the linkage syntax; only the index
        // representation goes into the footer.
        let titles = vec!["File: run.raw {scan 12}".to_string(), "frag # 1".to_string()];
        let offsets = vec![48, 96];

        let text = encode_footer_text(&titles, &offsets, &[(0, vec![1])], &[48]);
        let footer = decode_footer_text(&text).unwrap();

        assert_eq!(
            footer.postcursors.get("File: run.raw {scan 12}").unwrap(),
            &["frag # 1"]
        );
    }

    #[test]
    fn test_out_of_range_linkage_index_is_corrupt() {
        let titles = vec!["scan=1".to_string()];
        let text = encode_footer_text(&titles, &[48], &[(0, vec![7])], &[48]);
        assert!(matches!(
            decode_footer_text(&text),
            Err(Error::Corrupt { .. })
        ));
    }

    #[test]
    fn test_empty_footer_round_trips_as_null_linkage() {
        let text = encode_footer_text(&[], &[], &[], &[HEADER_LEN]);
        let footer = decode_footer_text(&text).unwrap();
        assert!(footer.titles.is_empty());
        assert!(footer.postcursors.is_empty());
        assert_eq!(footer.buffer_starts, vec![HEADER_LEN]);
    }

    #[test]
    fn test_cursor_rejects_truncated_reads() {
        let mut cursor = EntryCursor::new(&[0u8; 6]);
        assert!(cursor.get_i32().is_ok());
        assert!(matches!(cursor.get_f64(), Err(Error::Corrupt { .. })));
    }
}
