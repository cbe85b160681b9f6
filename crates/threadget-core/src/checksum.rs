//! Optional MD5 verification of files already on disk.
//!
//! The board publishes a base64 MD5 per attachment. Hashing only happens
//! when verification is switched on, never inline with a transfer.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use md5::{Digest, Md5};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

const BUF_SIZE: usize = 64 * 1024;

/// Raw 16-byte MD5 digest.
pub type Md5Digest = [u8; 16];

/// Decodes the board's base64 digest. Anything that is not exactly 16 bytes
/// after decoding is rejected.
pub fn decode_md5(encoded: &str) -> Option<Md5Digest> {
    let bytes = STANDARD.decode(encoded.trim()).ok()?;
    bytes.try_into().ok()
}

/// MD5 of the file at `path`, read in chunks.
pub fn md5_path(path: &Path) -> io::Result<Md5Digest> {
    let mut f = File::open(path)?;
    let mut hasher = Md5::new();
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = f.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().into())
}
