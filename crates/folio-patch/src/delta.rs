//! The copy/insert delta encoding.
//!
//! Layout: `varint(base_len) varint(result_len)` followed by an instruction
//! stream. Instructions:
//!
//! - `0x01 varint(offset) varint(len)` — copy `len` bytes from the base
//!   starting at `offset`;
//! - `0x02 varint(len) <len literal bytes>` — insert literal bytes.
//!
//! Matching uses a block index over the base (fixed-size blocks hashed into
//! a table) with greedy forward extension, so large unchanged regions
//! collapse into single copy instructions.

use std::collections::HashMap;

use crate::error::{PatchError, PatchResult};

const OP_COPY: u8 = 0x01;
const OP_INSERT: u8 = 0x02;

/// Block size used to index the base for match detection.
const BLOCK: usize = 16;

fn write_varint(mut value: u64, out: &mut Vec<u8>) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

fn read_varint(data: &[u8], pos: &mut usize) -> PatchResult<u64> {
    let mut value: u64 = 0;
    let mut shift = 0u32;
    loop {
        let byte = *data
            .get(*pos)
            .ok_or_else(|| PatchError::MalformedDelta("varint runs past end".into()))?;
        *pos += 1;
        if shift >= 63 {
            return Err(PatchError::MalformedDelta("varint overflow".into()));
        }
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
        shift += 7;
    }
}

/// Compute a delta that transforms `base` into `target`.
pub fn create_delta(base: &[u8], target: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    write_varint(base.len() as u64, &mut out);
    write_varint(target.len() as u64, &mut out);

    // Index the base in non-overlapping blocks.
    let mut blocks: HashMap<&[u8], Vec<usize>> = HashMap::new();
    if base.len() >= BLOCK {
        let mut offset = 0;
        while offset + BLOCK <= base.len() {
            blocks.entry(&base[offset..offset + BLOCK]).or_default().push(offset);
            offset += BLOCK;
        }
    }

    let mut literal: Vec<u8> = Vec::new();
    let mut pos = 0;
    while pos < target.len() {
        let candidate = if pos + BLOCK <= target.len() {
            blocks.get(&target[pos..pos + BLOCK]).and_then(|offsets| {
                // Pick the candidate with the longest forward extension.
                offsets
                    .iter()
                    .map(|&start| {
                        let mut len = BLOCK;
                        while start + len < base.len()
                            && pos + len < target.len()
                            && base[start + len] == target[pos + len]
                        {
                            len += 1;
                        }
                        (start, len)
                    })
                    .max_by_key(|&(_, len)| len)
            })
        } else {
            None
        };

        match candidate {
            Some((start, len)) => {
                flush_insert(&mut literal, &mut out);
                out.push(OP_COPY);
                write_varint(start as u64, &mut out);
                write_varint(len as u64, &mut out);
                pos += len;
            }
            None => {
                literal.push(target[pos]);
                pos += 1;
            }
        }
    }
    flush_insert(&mut literal, &mut out);
    out
}

fn flush_insert(literal: &mut Vec<u8>, out: &mut Vec<u8>) {
    if literal.is_empty() {
        return;
    }
    out.push(OP_INSERT);
    write_varint(literal.len() as u64, out);
    out.extend_from_slice(literal);
    literal.clear();
}

/// Apply a delta to `base`, reconstructing the target bytes.
///
/// Fails with [`PatchError::MalformedDelta`] when the stream is truncated,
/// declares a different base length, references a range outside the base,
/// or produces a result of the wrong length.
pub fn apply_delta(base: &[u8], delta: &[u8]) -> PatchResult<Vec<u8>> {
    let mut pos = 0;
    let declared_base = read_varint(delta, &mut pos)? as usize;
    if declared_base != base.len() {
        return Err(PatchError::MalformedDelta(format!(
            "delta declares base of {declared_base} bytes, got {}",
            base.len()
        )));
    }
    let declared_result = read_varint(delta, &mut pos)? as usize;

    let mut result = Vec::with_capacity(declared_result);
    while pos < delta.len() {
        let op = delta[pos];
        pos += 1;
        match op {
            OP_COPY => {
                let offset = read_varint(delta, &mut pos)? as usize;
                let len = read_varint(delta, &mut pos)? as usize;
                let end = offset
                    .checked_add(len)
                    .filter(|&end| end <= base.len())
                    .ok_or_else(|| {
                        PatchError::MalformedDelta(format!(
                            "copy range {offset}+{len} outside base of {} bytes",
                            base.len()
                        ))
                    })?;
                result.extend_from_slice(&base[offset..end]);
            }
            OP_INSERT => {
                let len = read_varint(delta, &mut pos)? as usize;
                let end = pos
                    .checked_add(len)
                    .filter(|&end| end <= delta.len())
                    .ok_or_else(|| {
                        PatchError::MalformedDelta("insert literal runs past end".into())
                    })?;
                result.extend_from_slice(&delta[pos..end]);
                pos = end;
            }
            other => {
                return Err(PatchError::MalformedDelta(format!(
                    "unknown instruction 0x{other:02x}"
                )));
            }
        }
    }

    if result.len() != declared_result {
        return Err(PatchError::MalformedDelta(format!(
            "result is {} bytes, delta declared {declared_result}",
            result.len()
        )));
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn roundtrip(base: &[u8], target: &[u8]) {
        let delta = create_delta(base, target);
        let rebuilt = apply_delta(base, &delta).unwrap();
        assert_eq!(rebuilt, target);
    }

    #[test]
    fn identical_content() {
        let text = b"the quick brown fox jumps over the lazy dog".repeat(4);
        roundtrip(&text, &text);
    }

    #[test]
    fn large_middle_replacement() {
        let base: Vec<u8> = (0..2000u32).map(|i| (i % 251) as u8).collect();
        let mut target = base.clone();
        target.splice(800..1200, b"replacement".iter().copied().cycle().take(100));
        roundtrip(&base, &target);
    }

    #[test]
    fn scattered_edits() {
        let base = b"line one\nline two\nline three\nline four\nline five\n".repeat(10);
        let target = String::from_utf8(base.clone())
            .unwrap()
            .replace("two", "2")
            .replace("five", "5")
            .into_bytes();
        roundtrip(&base, &target);
    }

    #[test]
    fn empty_base_and_target() {
        roundtrip(b"", b"");
        roundtrip(b"", b"fresh content");
        roundtrip(b"about to vanish", b"");
    }

    #[test]
    fn unchanged_region_collapses_to_copy() {
        let base: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();
        let delta = create_delta(&base, &base);
        // One copy instruction plus the two size varints: far smaller than
        // the content itself.
        assert!(delta.len() < 32, "delta was {} bytes", delta.len());
    }

    #[test]
    fn rejects_wrong_base_length() {
        let delta = create_delta(b"original base bytes", b"target");
        let err = apply_delta(b"different length", &delta).unwrap_err();
        assert!(matches!(err, PatchError::MalformedDelta(_)));
    }

    #[test]
    fn rejects_unknown_instruction() {
        let mut delta = Vec::new();
        write_varint(0, &mut delta);
        write_varint(1, &mut delta);
        delta.push(0x7f);
        let err = apply_delta(b"", &delta).unwrap_err();
        assert!(matches!(err, PatchError::MalformedDelta(_)));
    }

    #[test]
    fn rejects_copy_outside_base() {
        let mut delta = Vec::new();
        write_varint(4, &mut delta);
        write_varint(8, &mut delta);
        delta.push(OP_COPY);
        write_varint(2, &mut delta);
        write_varint(100, &mut delta);
        let err = apply_delta(b"base", &delta).unwrap_err();
        assert!(matches!(err, PatchError::MalformedDelta(_)));
    }

    #[test]
    fn varint_roundtrip() {
        for value in [0u64, 1, 127, 128, 300, 1 << 20, u64::from(u32::MAX)] {
            let mut buf = Vec::new();
            write_varint(value, &mut buf);
            let mut pos = 0;
            assert_eq!(read_varint(&buf, &mut pos).unwrap(), value);
            assert_eq!(pos, buf.len());
        }
    }

    proptest! {
        #[test]
        fn roundtrip_arbitrary_bytes(
            base in proptest::collection::vec(any::<u8>(), 0..512),
            target in proptest::collection::vec(any::<u8>(), 0..512),
        ) {
            let delta = create_delta(&base, &target);
            let rebuilt = apply_delta(&base, &delta).unwrap();
            prop_assert_eq!(rebuilt, target);
        }

        #[test]
        fn roundtrip_edited_text(
            text in "[a-z \n]{0,400}",
            edit in "[A-Z]{0,40}",
            at in 0usize..400,
        ) {
            let base = text.as_bytes().to_vec();
            let cut = at.min(base.len());
            let mut target = base[..cut].to_vec();
            target.extend_from_slice(edit.as_bytes());
            target.extend_from_slice(&base[cut..]);
            let delta = create_delta(&base, &target);
            prop_assert_eq!(apply_delta(&base, &delta).unwrap(), target);
        }
    }
}
