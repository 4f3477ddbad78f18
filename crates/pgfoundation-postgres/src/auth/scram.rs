//! SCRAM-SHA-256 client (RFC 5802 / RFC 7677) without channel binding.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use hmac::{Hmac, Mac};
use rand::{Rng, distributions::Alphanumeric, thread_rng};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use pgfoundation_core::error::{ConnectionErrorKind, Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// `base64("n,,")`: no channel binding, no authzid.
const GS2_HEADER_B64: &str = "biws";

/// Keys kept between the client-final and server-final messages.
struct Proof {
    salted_password: [u8; 32],
    auth_message: String,
}

pub struct ScramClient {
    password: String,
    client_first_bare: String,
    client_nonce: String,
    proof: Option<Proof>,
}

impl ScramClient {
    pub fn new(username: &str, password: &str) -> Self {
        let nonce: String = thread_rng()
            .sample_iter(&Alphanumeric)
            .take(24)
            .map(char::from)
            .collect();
        Self::with_nonce(username, password, nonce)
    }

    fn with_nonce(username: &str, password: &str, client_nonce: String) -> Self {
        Self {
            password: password.to_string(),
            client_first_bare: format!("n={},r={}", sasl_name(username), client_nonce),
            client_nonce,
            proof: None,
        }
    }

    /// Client-first message, sent with the SASLInitialResponse.
    pub fn client_first(&self) -> Vec<u8> {
        format!("n,,{}", self.client_first_bare).into_bytes()
    }

    /// Consume the server-first message and produce the client-final one.
    pub fn process_server_first(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        let msg = std::str::from_utf8(data)
            .map_err(|e| protocol_error(format!("invalid UTF-8 in SASL continue: {e}")))?;

        let mut nonce = None;
        let mut salt = None;
        let mut iterations = None;
        for part in msg.split(',') {
            if let Some(v) = part.strip_prefix("r=") {
                nonce = Some(v);
            } else if let Some(v) = part.strip_prefix("s=") {
                salt = Some(
                    BASE64
                        .decode(v)
                        .map_err(|e| protocol_error(format!("invalid base64 salt: {e}")))?,
                );
            } else if let Some(v) = part.strip_prefix("i=") {
                iterations = Some(
                    v.parse::<u32>()
                        .map_err(|e| protocol_error(format!("invalid iteration count: {e}")))?,
                );
            }
        }

        let nonce = nonce.ok_or_else(|| protocol_error("server-first without nonce"))?;
        let salt = salt.ok_or_else(|| protocol_error("server-first without salt"))?;
        let iterations = iterations.ok_or_else(|| protocol_error("server-first without iterations"))?;
        if !nonce.starts_with(&self.client_nonce) || nonce.len() == self.client_nonce.len() {
            return Err(auth_error("server nonce does not extend the client nonce"));
        }

        let mut salted_password = [0u8; 32];
        pbkdf2::pbkdf2::<HmacSha256>(
            self.password.as_bytes(),
            &salt,
            iterations,
            &mut salted_password,
        )
        .map_err(|e| protocol_error(format!("PBKDF2 failed: {e}")))?;

        let without_proof = format!("c={GS2_HEADER_B64},r={nonce}");
        let auth_message = format!("{},{},{}", self.client_first_bare, msg, without_proof);

        let client_key = hmac_sha256(&salted_password, b"Client Key")?;
        let stored_key: [u8; 32] = Sha256::digest(client_key).into();
        let signature = hmac_sha256(&stored_key, auth_message.as_bytes())?;
        let proof: Vec<u8> = client_key
            .iter()
            .zip(signature.iter())
            .map(|(k, s)| k ^ s)
            .collect();

        self.proof = Some(Proof {
            salted_password,
            auth_message,
        });
        Ok(format!("{without_proof},p={}", BASE64.encode(proof)).into_bytes())
    }

    /// Check the server's signature from the server-final message.
    pub fn verify_server_final(&self, data: &[u8]) -> Result<()> {
        let msg = std::str::from_utf8(data)
            .map_err(|e| protocol_error(format!("invalid UTF-8 in SASL final: {e}")))?;
        if let Some(reason) = msg.strip_prefix("e=") {
            return Err(auth_error(format!("server rejected SCRAM exchange: {reason}")));
        }
        let encoded = msg
            .strip_prefix("v=")
            .ok_or_else(|| protocol_error("malformed server-final message"))?;
        let received = BASE64
            .decode(encoded)
            .map_err(|e| protocol_error(format!("invalid base64 server signature: {e}")))?;

        let proof = self
            .proof
            .as_ref()
            .ok_or_else(|| protocol_error("server-final received before server-first"))?;
        let server_key = hmac_sha256(&proof.salted_password, b"Server Key")?;
        let expected = hmac_sha256(&server_key, proof.auth_message.as_bytes())?;

        if bool::from(expected.as_slice().ct_eq(&received)) {
            Ok(())
        } else {
            Err(auth_error("server signature mismatch"))
        }
    }
}

/// Escape `=` and `,` in a user name (RFC 5802 `saslname`).
fn sasl_name(name: &str) -> String {
    name.replace('=', "=3D").replace(',', "=2C")
}

fn protocol_error(msg: impl Into<String>) -> Error {
    Error::connection(ConnectionErrorKind::Protocol, msg)
}

fn auth_error(msg: impl Into<String>) -> Error {
    Error::connection(ConnectionErrorKind::Authentication, msg)
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<[u8; 32]> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| protocol_error(format!("HMAC init failed: {e}")))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().into())
}

#[cfg(test)]
mod tests {
    use super::*;

    // Exchange from RFC 7677 section 3.
    const CLIENT_NONCE: &str = "rOprNGfwEbeRWgbNEkqO";
    const SERVER_FIRST: &str = "r=rOprNGfwEbeRWgbNEkqO%hvYDpWUa2RaTCAfuxFIlj)hNlF$k0,s=W22ZaJ0SNY7soEsUEjb6gQ==,i=4096";
    const CLIENT_FINAL: &str = "c=biws,r=rOprNGfwEbeRWgbNEkqO%hvYDpWUa2RaTCAfuxFIlj)hNlF$k0,p=dHzbZapWIk4jUhN+Ute9ytag9zjfMHgsqmmiz7AndVQ=";
    const SERVER_FINAL: &str = "v=6rriTRBi23WpRR/wtup+mMhUZUn/dB5nLTJRsjl95G4=";

    fn rfc_client() -> ScramClient {
        ScramClient::with_nonce("user", "pencil", CLIENT_NONCE.to_string())
    }

    #[test]
    fn test_rfc7677_exchange() {
        let mut client = rfc_client();
        assert_eq!(client.client_first(), b"n,,n=user,r=rOprNGfwEbeRWgbNEkqO");
        let client_final = client.process_server_first(SERVER_FIRST.as_bytes()).unwrap();
        assert_eq!(String::from_utf8(client_final).unwrap(), CLIENT_FINAL);
        client.verify_server_final(SERVER_FINAL.as_bytes()).unwrap();
    }

    #[test]
    fn test_rejects_wrong_server_signature() {
        let mut client = rfc_client();
        client.process_server_first(SERVER_FIRST.as_bytes()).unwrap();
        let err = client
            .verify_server_final(b"v=AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=")
            .unwrap_err();
        assert!(err.to_string().contains("mismatch"));
    }

    #[test]
    fn test_rejects_foreign_nonce() {
        let mut client = rfc_client();
        let err = client
            .process_server_first(b"r=somebodyelse,s=W22ZaJ0SNY7soEsUEjb6gQ==,i=4096")
            .unwrap_err();
        assert!(matches!(err, Error::Connection(ref c) if c.kind == ConnectionErrorKind::Authentication));
    }

    #[test]
    fn test_final_before_first_is_an_error() {
        assert!(rfc_client().verify_server_final(SERVER_FINAL.as_bytes()).is_err());
    }

    #[test]
    fn test_sasl_name_escaping() {
        assert_eq!(sasl_name("a=b,c"), "a=3Db=2Cc");
    }
}
