use rusqlite::Row;
use serde::{Deserialize, Serialize};

/// Identity of a progress row: one per set, part, color and spare flag
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub struct ProgressKey {
    pub set_num: String,
    pub part_num: String,
    pub color_id: i64,
    pub is_spare: bool,
}

// Strings end with TERMINATOR; a NUL byte inside a string becomes ESCAPED_NUL.
// Both sort below every other byte sequence, which keeps the encoding
// order-preserving and prefix-free.
const TERMINATOR: [u8; 2] = [0x00, 0x01];
const ESCAPED_NUL: [u8; 2] = [0x00, 0x02];
const SUFFIX_REGULAR: &[u8] = b"regular";
const SUFFIX_SPARE: &[u8] = b"spare";

impl ProgressKey {
    pub fn new(set_num: &str, part_num: &str, color_id: i64, is_spare: bool) -> Self {
        Self {
            set_num: set_num.to_string(),
            part_num: part_num.to_string(),
            color_id,
            is_spare,
        }
    }

    /// Storage key. Byte order of encoded keys matches the derived `Ord`.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.set_num.len() + self.part_num.len() + 20);
        push_escaped(&mut out, &self.set_num);
        push_escaped(&mut out, &self.part_num);
        // Flip the sign bit so negative ids (e.g. -1 "unknown color") sort first
        out.extend_from_slice(&((self.color_id as u64) ^ (1 << 63)).to_be_bytes());
        out.extend_from_slice(if self.is_spare {
            SUFFIX_SPARE
        } else {
            SUFFIX_REGULAR
        });
        out
    }

    /// Inverse of [`ProgressKey::encode`]; `None` for bytes it never produces
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let (set_num, rest) = take_escaped(bytes)?;
        let (part_num, rest) = take_escaped(rest)?;
        if rest.len() < 8 {
            return None;
        }
        let (color_bytes, suffix) = rest.split_at(8);
        let raw = u64::from_be_bytes(color_bytes.try_into().ok()?);
        let color_id = (raw ^ (1 << 63)) as i64;
        let is_spare = if suffix == SUFFIX_SPARE {
            true
        } else if suffix == SUFFIX_REGULAR {
            false
        } else {
            return None;
        };

        Some(Self {
            set_num,
            part_num,
            color_id,
            is_spare,
        })
    }
}

fn push_escaped(out: &mut Vec<u8>, s: &str) {
    for &b in s.as_bytes() {
        if b == 0 {
            out.extend_from_slice(&ESCAPED_NUL);
        } else {
            out.push(b);
        }
    }
    out.extend_from_slice(&TERMINATOR);
}

fn take_escaped(bytes: &[u8]) -> Option<(String, &[u8])> {
    let mut raw = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == 0 {
            match bytes.get(i + 1)? {
                0x01 => {
                    let s = String::from_utf8(raw).ok()?;
                    return Some((s, &bytes[i + 2..]));
                }
                0x02 => raw.push(0),
                _ => return None,
            }
            i += 2;
        } else {
            raw.push(bytes[i]);
            i += 1;
        }
    }
    None
}

/// Found/needed count for one part of a set
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressRecord {
    #[serde(flatten)]
    pub key: ProgressKey,
    pub needed_qty: u32,
    pub found_qty: u32,
    /// Epoch ms of the last write; last-write-wins merges compare this
    pub updated_at: i64,
}

impl ProgressRecord {
    pub fn is_complete(&self) -> bool {
        self.found_qty >= self.needed_qty
    }
}

impl<'r> TryFrom<&Row<'r>> for ProgressRecord {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'r>) -> Result<Self, Self::Error> {
        Ok(ProgressRecord {
            key: ProgressKey {
                set_num: row.get("set_num")?,
                part_num: row.get("part_num")?,
                color_id: row.get("color_id")?,
                is_spare: row.get("is_spare")?,
            },
            needed_qty: row.get("needed_qty")?,
            found_qty: row.get("found_qty")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Clamps a requested found count to the stored range (never negative)
pub fn clamp_found_qty(requested: i64) -> u32 {
    u32::try_from(requested.max(0)).unwrap_or(u32::MAX)
}
