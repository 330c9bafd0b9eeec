//! Digest primitives shared by the carrier signing schemes.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use md5::{Digest, Md5};

pub fn md5_hex_lower(input: &str) -> String {
    format!("{:x}", Md5::digest(input.as_bytes()))
}

pub fn md5_hex_upper(input: &str) -> String {
    format!("{:X}", Md5::digest(input.as_bytes()))
}

/// Base64 of the raw 16-byte MD5 digest (not of its hex form).
pub fn md5_base64(input: &str) -> String {
    STANDARD.encode(Md5::digest(input.as_bytes()))
}
