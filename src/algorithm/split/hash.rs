//! Stable hashing of patient identifiers onto the unit interval
//!
//! The value must be identical across processes, machines and releases, so
//! it is a CRC32 (IEEE, zlib-compatible) checksum of the UTF-8 bytes rather
//! than anything seeded or address-based.

/// 2^32, the size of the CRC32 output space
const HASH_SPACE: f64 = 4_294_967_296.0;

/// Map an identifier to a real number in [0, 1)
#[must_use]
pub fn patient_hash(identifier: &str) -> f64 {
    f64::from(crc32fast::hash(identifier.as_bytes())) / HASH_SPACE
}
