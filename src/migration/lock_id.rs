//! Advisory lock ids derived from store names

use once_cell::sync::Lazy;
use std::fmt;

const LOCK_NAMESPACE: &str = "WAYMARK";

static CRC32_TABLE: Lazy<[u32; 256]> = Lazy::new(|| {
    let mut table = [0u32; 256];
    for (n, entry) in table.iter_mut().enumerate() {
        let mut c = n as u32;
        for _ in 0..8 {
            c = if c & 1 == 1 { 0xEDB8_8320 ^ (c >> 1) } else { c >> 1 };
        }
        *entry = c;
    }
    table
});

/// CRC-32 (IEEE, reflected) of `data` as a signed 32-bit integer
#[must_use]
pub fn crc32(data: &str) -> i32 {
    let mut crc = 0xFFFF_FFFFu32;
    for &byte in data.as_bytes() {
        crc = (crc >> 8) ^ CRC32_TABLE[((crc ^ u32::from(byte)) & 0xFF) as usize];
    }
    (crc ^ 0xFFFF_FFFF) as i32
}

/// Two-part advisory lock id
///
/// The first part namespaces every lock taken by this crate, the second
/// identifies the store and migration table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AdvisoryLockId(pub i32, pub i32);

impl fmt::Display for AdvisoryLockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.0, self.1)
    }
}

/// Derive a lock id from the database name and any further names
/// (typically the migration table name)
#[must_use]
pub fn advisory_lock_id(database_name: &str, additional_names: &[&str]) -> AdvisoryLockId {
    let mut identifier = database_name.to_string();
    for name in additional_names {
        identifier.push('\0');
        identifier.push_str(name);
    }

    AdvisoryLockId(crc32(LOCK_NAMESPACE), crc32(&identifier))
}
