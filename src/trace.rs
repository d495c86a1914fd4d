use std::{fs, path::Path};

use log::warn;

use crate::Result;

/// Reference kinds as encoded in trace files: `0` data load, `1` data
/// store, `2` instruction fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    DataLoad,
    DataStore,
    InstFetch,
}

#[derive(Debug, Clone, Copy)]
pub struct TraceRef {
    pub kind: AccessKind,
    pub addr: u32,
}

pub struct Trace {
    inner: Vec<TraceRef>,
    idx: usize,
}

impl Iterator for Trace {
    type Item = TraceRef;

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.idx;
        self.idx += 1;
        self.inner.get(idx).copied()
    }
}

impl Trace {
    /// Loads a whole trace file, one `<access_type> <hex address>` record
    /// per line. Records the engine cannot process are dropped here.
    pub fn open<S: AsRef<Path>>(path: S) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let inner = content
            .lines()
            .enumerate()
            .filter_map(|(lineno, line)| parse_line(lineno + 1, line))
            .collect();
        Ok(Self { inner, idx: 0 })
    }
}

fn parse_line(lineno: usize, line: &str) -> Option<TraceRef> {
    let mut fields = line.split_whitespace();
    let (kind, addr) = match (fields.next(), fields.next()) {
        (Some(kind), Some(addr)) => (kind, addr),
        (None, _) => return None, // blank line
        _ => {
            warn!("skipping malformed trace line {lineno}: {line:?}");
            return None;
        }
    };

    let kind = match kind.parse::<u32>() {
        Ok(0) => AccessKind::DataLoad,
        Ok(1) => AccessKind::DataStore,
        Ok(2) => AccessKind::InstFetch,
        Ok(n) => {
            warn!("skipping access at line {lineno}, unknown type({n})");
            return None;
        }
        Err(_) => {
            warn!("skipping malformed trace line {lineno}: {line:?}");
            return None;
        }
    };

    // addresses may carry a 0x prefix
    let digits = addr
        .strip_prefix("0x")
        .or_else(|| addr.strip_prefix("0X"))
        .unwrap_or(addr);
    match u32::from_str_radix(digits, 16) {
        Ok(addr) => Some(TraceRef { kind, addr }),
        Err(_) => {
            warn!("skipping malformed trace line {lineno}: {line:?}");
            None
        }
    }
}
