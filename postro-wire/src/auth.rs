//! Password authentication.
//!
//! - cleartext, the password is sent as is
//! - md5, `"md5" + hex(md5(hex(md5(password + user)) + salt))`
//! - SCRAM-SHA-256, RFC 5802 and RFC 7677 without channel binding
//!
//! Also provides client side password encryption for `ALTER ROLE .. PASSWORD`.
use base64::{Engine, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use md5::Md5;
use rand::Rng;
use sha2::{Digest, Sha256};
use std::{borrow::Cow, fmt};

use crate::common::hex;

type HmacSha256 = Hmac<Sha256>;

pub const SCRAM_SHA_256: &str = "SCRAM-SHA-256";

const NONCE_LEN: usize = 18;
const SCRAM_ITERATIONS: u32 = 4096;
const SCRAM_SALT_LEN: usize = 16;

/// Md5 password hash sent in response to `AuthenticationMD5Password`.
pub fn md5_password(user: &str, password: &str, salt: [u8; 4]) -> String {
    let inner = hex(&Md5::new().chain_update(password).chain_update(user).finalize());
    let outer = Md5::new().chain_update(inner).chain_update(salt).finalize();
    format!("md5{}", hex(&outer))
}

/// Encrypt a password the way the server stores it, for `algorithm` as in
/// the `password_encryption` setting.
pub fn encrypt_password(user: &str, password: &str, algorithm: &str) -> Result<String, AuthError> {
    match algorithm {
        "md5" => {
            let hash = Md5::new().chain_update(password).chain_update(user).finalize();
            Ok(format!("md5{}", hex(&hash)))
        }
        "scram-sha-256" => {
            let mut salt = [0u8; SCRAM_SALT_LEN];
            rand::rng().fill(&mut salt);
            Ok(scram_verifier(password, &salt, SCRAM_ITERATIONS))
        }
        _ => Err(AuthError::new(format!("unrecognized password encryption algorithm \"{algorithm}\""))),
    }
}

fn scram_verifier(password: &str, salt: &[u8], iterations: u32) -> String {
    let salted = hi(&normalize(password), salt, iterations);
    let stored_key = Sha256::digest(hmac(&salted, b"Client Key"));
    let server_key = hmac(&salted, b"Server Key");
    format!(
        "SCRAM-SHA-256${iterations}:{}${}:{}",
        STANDARD.encode(salt),
        STANDARD.encode(stored_key),
        STANDARD.encode(server_key),
    )
}

/// SASLprep the password, fallback to raw bytes when it is not valid for it.
fn normalize(password: &str) -> Vec<u8> {
    match stringprep::saslprep(password) {
        Ok(Cow::Borrowed(p)) => p.as_bytes().to_vec(),
        Ok(Cow::Owned(p)) => p.into_bytes(),
        Err(_) => password.as_bytes().to_vec(),
    }
}

fn hmac(key: &[u8], data: &[u8]) -> [u8; 32] {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().into()
}

/// `Hi()` from RFC 5802, which is PBKDF2 with HMAC-SHA-256.
fn hi(password: &[u8], salt: &[u8], iterations: u32) -> [u8; 32] {
    let mut mac = HmacSha256::new_from_slice(password).expect("HMAC accepts any key length");
    mac.update(salt);
    mac.update(&1u32.to_be_bytes());
    let mut prev: [u8; 32] = mac.finalize().into_bytes().into();
    let mut out = prev;

    for _ in 1..iterations {
        prev = hmac(password, &prev);
        for (o, p) in out.iter_mut().zip(prev) {
            *o ^= p;
        }
    }

    out
}

enum ScramState {
    Init,
    Continue {
        salted_password: [u8; 32],
        auth_message: String,
    },
    Done,
}

/// SCRAM-SHA-256 client exchange.
///
/// ```text
/// client-first  -> n,,n=,r=<client nonce>
/// server-first  <- r=<nonce>,s=<salt>,i=<iterations>
/// client-final  -> c=biws,r=<nonce>,p=<proof>
/// server-final  <- v=<signature>
/// ```
pub struct ScramSha256 {
    password: Vec<u8>,
    client_first_bare: String,
    nonce: String,
    state: ScramState,
}

impl ScramSha256 {
    pub fn new(password: &str) -> ScramSha256 {
        let mut raw = [0u8; NONCE_LEN];
        rand::rng().fill(&mut raw);
        Self::with_nonce("", password, STANDARD.encode(raw))
    }

    fn with_nonce(user: &str, password: &str, nonce: String) -> ScramSha256 {
        ScramSha256 {
            password: normalize(password),
            client_first_bare: format!("n={user},r={nonce}"),
            nonce,
            state: ScramState::Init,
        }
    }

    /// The client-first-message, sent in `SASLInitialResponse`.
    pub fn client_first(&self) -> Vec<u8> {
        format!("n,,{}", self.client_first_bare).into_bytes()
    }

    /// Consume server-first-message, returns client-final-message.
    pub fn update(&mut self, server_first: &[u8]) -> Result<Vec<u8>, AuthError> {
        if !matches!(self.state, ScramState::Init) {
            return Err(AuthError::new("unexpected SCRAM server-first-message"));
        }

        let server_first = std::str::from_utf8(server_first)
            .map_err(|_| AuthError::new("invalid SCRAM server-first-message"))?;

        let mut nonce = None;
        let mut salt = None;
        let mut iterations = None;
        for attr in server_first.split(',') {
            match attr.split_once('=') {
                Some(("r", v)) => nonce = Some(v),
                Some(("s", v)) => salt = Some(v),
                Some(("i", v)) => iterations = Some(v),
                _ => {}
            }
        }

        let (Some(nonce), Some(salt), Some(iterations)) = (nonce, salt, iterations) else {
            return Err(AuthError::new("malformed SCRAM message"));
        };
        if !nonce.starts_with(&self.nonce) || nonce.len() == self.nonce.len() {
            return Err(AuthError::new("invalid SCRAM response (nonce mismatch)"));
        }
        let salt = STANDARD
            .decode(salt)
            .map_err(|_| AuthError::new("malformed SCRAM message (invalid salt)"))?;
        let iterations = iterations
            .parse::<u32>()
            .ok()
            .filter(|i| *i > 0)
            .ok_or_else(|| AuthError::new("malformed SCRAM message (invalid iteration count)"))?;

        let salted_password = hi(&self.password, &salt, iterations);
        let client_key = hmac(&salted_password, b"Client Key");
        let stored_key = Sha256::digest(client_key);

        // "biws" is base64 of the gs2 header "n,,"
        let without_proof = format!("c=biws,r={nonce}");
        let auth_message = format!("{},{server_first},{without_proof}", self.client_first_bare);

        let signature = hmac(&stored_key, auth_message.as_bytes());
        let mut proof = client_key;
        for (p, s) in proof.iter_mut().zip(signature) {
            *p ^= s;
        }

        self.state = ScramState::Continue { salted_password, auth_message };

        Ok(format!("{without_proof},p={}", STANDARD.encode(proof)).into_bytes())
    }

    /// Verify the server-final-message.
    pub fn finish(&mut self, server_final: &[u8]) -> Result<(), AuthError> {
        let ScramState::Continue { salted_password, auth_message } =
            std::mem::replace(&mut self.state, ScramState::Done)
        else {
            return Err(AuthError::new("unexpected SCRAM server-final-message"));
        };

        let server_final = std::str::from_utf8(server_final)
            .map_err(|_| AuthError::new("invalid SCRAM server-final-message"))?;

        if let Some(err) = server_final.strip_prefix("e=") {
            return Err(AuthError::new(format!("error received from server in SCRAM exchange: {err}")));
        }

        let Some(verifier) = server_final.split(',').find_map(|a| a.strip_prefix("v=")) else {
            return Err(AuthError::new("malformed SCRAM message"));
        };
        let verifier = STANDARD
            .decode(verifier)
            .map_err(|_| AuthError::new("malformed SCRAM message (invalid server signature)"))?;

        let server_key = hmac(&salted_password, b"Server Key");
        let expected = hmac(&server_key, auth_message.as_bytes());

        if verifier != expected {
            return Err(AuthError::new("incorrect server signature"));
        }

        Ok(())
    }
}

/// Authentication method the server asked for which is not implemented.
pub struct UnsupportedAuth {
    pub method: &'static str,
}

impl std::error::Error for UnsupportedAuth { }

impl fmt::Display for UnsupportedAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "authentication method {} not supported", self.method)
    }
}

impl fmt::Debug for UnsupportedAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

/// Failure during an authentication exchange.
pub struct AuthError {
    reason: Cow<'static, str>,
}

impl AuthError {
    pub fn new(reason: impl Into<Cow<'static, str>>) -> AuthError {
        Self { reason: reason.into() }
    }
}

impl std::error::Error for AuthError { }

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

impl fmt::Debug for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn md5_hash() {
        let hash = md5_password("postgres", "secret", *b"abcd");
        assert!(hash.starts_with("md5"));
        assert_eq!(hash.len(), 35);
        assert_eq!(hash, md5_password("postgres", "secret", *b"abcd"));
        assert_ne!(hash, md5_password("postgres", "secret", *b"abce"));
    }

    #[test]
    fn scram_rfc7677_vector() {
        let mut scram = ScramSha256::with_nonce("user", "pencil", "rOprNGfwEbeRWgbNEkqO".into());
        assert_eq!(scram.client_first(), b"n,,n=user,r=rOprNGfwEbeRWgbNEkqO");

        let client_final = scram
            .update(b"r=rOprNGfwEbeRWgbNEkqO%hvYDpWUa2RaTCAfuxFIlj)hNlF$k0,s=W22ZaJ0SNY7soEsUEjb6gQ==,i=4096")
            .unwrap();
        assert_eq!(
            String::from_utf8(client_final).unwrap(),
            "c=biws,r=rOprNGfwEbeRWgbNEkqO%hvYDpWUa2RaTCAfuxFIlj)hNlF$k0,p=dHzbZapWIk4jUhN+Ute9ytag9zjfMHgsqmmiz7AndVQ=",
        );

        scram.finish(b"v=6rriTRBi23WpRR/wtup+mMhUZUn/dB5nLTJRsjl95G4=").unwrap();
    }

    #[test]
    fn scram_nonce_mismatch() {
        let mut scram = ScramSha256::with_nonce("", "pencil", "abc".into());
        let err = scram.update(b"r=xyz123,s=W22ZaJ0SNY7soEsUEjb6gQ==,i=4096").unwrap_err();
        assert_eq!(err.to_string(), "invalid SCRAM response (nonce mismatch)");
    }

    #[test]
    fn scram_server_error() {
        let mut scram = ScramSha256::with_nonce("", "pencil", "abc".into());
        scram.update(b"r=abcdef,s=W22ZaJ0SNY7soEsUEjb6gQ==,i=1").unwrap();
        let err = scram.finish(b"e=invalid-proof").unwrap_err();
        assert_eq!(err.to_string(), "error received from server in SCRAM exchange: invalid-proof");
    }

    #[test]
    fn encrypted_password_formats() {
        let md5 = encrypt_password("al", "pw", "md5").unwrap();
        assert!(md5.starts_with("md5") && md5.len() == 35);

        let scram = encrypt_password("al", "pw", "scram-sha-256").unwrap();
        assert!(scram.starts_with("SCRAM-SHA-256$4096:"));
        assert_eq!(scram.matches('$').count(), 2);

        assert!(encrypt_password("al", "pw", "des").is_err());
    }
}
