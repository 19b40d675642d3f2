//! # Content Digests
//!
//! Hex-encoded content digests for target files. Descriptors carry a map of
//! algorithm name to hex digest; `HashAlgorithm` names the algorithms this
//! client can compute and check. `blake2b-256` is what repositories
//! populated with RSTUF defaults record.
//!
//! Files are hashed in 8 KiB chunks, and several algorithms can be fed from
//! a single read of the file.

use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use blake2::digest::consts::U32;
use blake2::Blake2b;
use sha2::{Digest, Sha256, Sha512};

type Blake2b256 = Blake2b<U32>;

/// A hash algorithm supported for target descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// SHA-256, the default for new descriptors.
    Sha256,
    /// SHA-512.
    Sha512,
    /// BLAKE2b with a 256-bit output.
    #[serde(rename = "blake2b-256")]
    Blake2b256,
}

impl HashAlgorithm {
    /// The algorithm name as it appears in a descriptor's `hashes` map.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
            Self::Blake2b256 => "blake2b-256",
        }
    }

    /// Look up an algorithm by descriptor name. Unknown names yield `None`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "sha256" => Some(Self::Sha256),
            "sha512" => Some(Self::Sha512),
            "blake2b-256" => Some(Self::Blake2b256),
            _ => None,
        }
    }

    /// Hex digest of `data`.
    pub fn digest(&self, data: &[u8]) -> String {
        match self {
            Self::Sha256 => hex_encode(&Sha256::digest(data)),
            Self::Sha512 => hex_encode(&Sha512::digest(data)),
            Self::Blake2b256 => hex_encode(&Blake2b256::digest(data)),
        }
    }
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Incremental hasher over one algorithm.
enum Hasher {
    Sha256(Sha256),
    Sha512(Sha512),
    Blake2b256(Blake2b256),
}

impl Hasher {
    fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Sha256 => Self::Sha256(Sha256::new()),
            HashAlgorithm::Sha512 => Self::Sha512(Sha512::new()),
            HashAlgorithm::Blake2b256 => Self::Blake2b256(Blake2b256::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Self::Sha256(h) => h.update(data),
            Self::Sha512(h) => h.update(data),
            Self::Blake2b256(h) => h.update(data),
        }
    }

    fn finalize_hex(self) -> String {
        match self {
            Self::Sha256(h) => hex_encode(&h.finalize()),
            Self::Sha512(h) => hex_encode(&h.finalize()),
            Self::Blake2b256(h) => hex_encode(&h.finalize()),
        }
    }
}

/// Hash everything from `reader` under each of `algorithms`.
///
/// Returns the number of bytes read and one hex digest per algorithm, in
/// the order given.
pub fn digest_reader<R: Read>(
    mut reader: R,
    algorithms: &[HashAlgorithm],
) -> std::io::Result<(u64, Vec<(HashAlgorithm, String)>)> {
    let mut hashers: Vec<(HashAlgorithm, Hasher)> = algorithms
        .iter()
        .map(|alg| (*alg, Hasher::new(*alg)))
        .collect();
    let mut buf = [0u8; 8192];
    let mut length = 0u64;
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        length += n as u64;
        for (_, hasher) in hashers.iter_mut() {
            hasher.update(&buf[..n]);
        }
    }
    let digests = hashers
        .into_iter()
        .map(|(alg, hasher)| (alg, hasher.finalize_hex()))
        .collect();
    Ok((length, digests))
}

/// Compute the hex digest of a file under one algorithm.
///
/// Returns the file length alongside the digest.
pub fn file_digest<P: AsRef<Path>>(
    path: P,
    algorithm: HashAlgorithm,
) -> std::io::Result<(u64, String)> {
    let file = std::fs::File::open(path.as_ref())?;
    let (length, mut digests) = digest_reader(file, &[algorithm])?;
    let digest = digests.pop().map(|(_, hex)| hex).unwrap_or_default();
    Ok((length, digest))
}

/// SHA-256 hex digest of a byte slice.
#[must_use]
pub fn bytes_digest(data: &[u8]) -> String {
    HashAlgorithm::Sha256.digest(data)
}

/// Encode bytes as a lowercase hex string.
fn hex_encode(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push_str(&format!("{b:02x}"));
    }
    s
}
