//! Intermediate record encoding and key partitioning.
//!
//! Each intermediate record is written as one self-delimiting JSON object
//! per line (newline-delimited JSON). A reader can recover the exact
//! sequence of writes without any extra framing, the same guarantee the
//! authoritative lab source gets from `encoding/gob`.

use std::io::{self, BufRead, Write};

use serde::{Deserialize, Serialize};

/// One key/value pair emitted by a map function or read back by a reducer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// FNV-1a, masked to 31 bits, matching the authoritative source's `ihash`.
fn fnv1a32(bytes: &[u8]) -> u32 {
    const OFFSET_BASIS: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;
    let mut hash = OFFSET_BASIS;
    for b in bytes {
        hash ^= *b as u32;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

/// Stable 31-bit hash of a key, used to pick a reduce partition.
pub fn ihash(key: &str) -> u32 {
    fnv1a32(key.as_bytes()) & 0x7fff_ffff
}

/// Partition index in `[0, n_reduce)` that a key belongs to.
pub fn partition_for_key(key: &str, n_reduce: usize) -> usize {
    assert!(n_reduce > 0, "n_reduce must be positive");
    (ihash(key) as usize) % n_reduce
}

/// Writes one record as a single NDJSON line.
pub fn write_record<W: Write>(mut w: W, kv: &KeyValue) -> io::Result<()> {
    serde_json::to_writer(&mut w, kv)?;
    w.write_all(b"\n")
}

/// Reads every record out of an NDJSON stream, in file order.
pub fn read_records<R: BufRead>(reader: R) -> io::Result<Vec<KeyValue>> {
    let mut out = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let kv: KeyValue = serde_json::from_str(&line)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        out.push(kv);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ihash_is_stable_and_in_range() {
        let h1 = ihash("hello");
        let h2 = ihash("hello");
        assert_eq!(h1, h2);
        assert!(h1 <= 0x7fff_ffff);
    }

    #[test]
    fn partition_is_within_bounds() {
        for key in ["a", "b", "apple", "banana", ""] {
            let p = partition_for_key(key, 7);
            assert!(p < 7);
        }
    }

    #[test]
    fn round_trips_through_ndjson() {
        let records = vec![
            KeyValue::new("a", "1"),
            KeyValue::new("b", "2"),
            KeyValue::new("with space", "tab\tand\nnewline"),
        ];
        let mut buf = Vec::new();
        for kv in &records {
            write_record(&mut buf, kv).unwrap();
        }
        let decoded = read_records(io::BufReader::new(&buf[..])).unwrap();
        assert_eq!(decoded, records);
    }
}
