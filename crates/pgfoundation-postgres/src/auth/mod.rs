//! Password authentication exchanges.
//!
//! - cleartext: the password is sent as is
//! - MD5: `"md5" + md5(md5(password + user) + salt)`
//! - SCRAM-SHA-256: see [`ScramClient`]

mod scram;

pub use scram::ScramClient;

use std::fmt::Write;

/// Name of the only SASL mechanism the driver speaks.
pub const SCRAM_SHA_256: &str = "SCRAM-SHA-256";

/// Answer to an `AuthenticationMD5Password` challenge.
pub fn md5_password(user: &str, password: &str, salt: [u8; 4]) -> String {
    let inner = md5::compute(format!("{password}{user}").as_bytes());

    let mut outer_input = format!("{inner:x}").into_bytes();
    outer_input.extend_from_slice(&salt);
    let outer = md5::compute(&outer_input);

    let mut result = String::with_capacity(35);
    result.push_str("md5");
    let _ = write!(result, "{outer:x}");
    result
}
