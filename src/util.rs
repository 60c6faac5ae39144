/*!
Miscellaneous utilities for `stockcast`
*/

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// The hex-encoded SHA-256 digest of a file's contents
pub fn fingerprint_file<P: AsRef<Path>>(path: P) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let read = file.read(&mut buf)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Format a price for display, e.g. `$123.45`
pub fn format_price(price: f64) -> String {
    format!("${:.2}", price)
}
