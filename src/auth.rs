//! HTTP Digest authentication (RFC 7616, with RFC 2617 and RFC 2069
//! compatibility) for ISAPI devices.
//!
//! The handshake is split into two pure steps so it can be tested without a
//! device:
//!
//! 1. [`DigestChallenge::parse`] turns a `WWW-Authenticate` header value into
//!    a typed challenge.
//! 2. [`digest_authorization`] computes the `Authorization` header value for
//!    one request from that challenge, the request line, a client nonce and
//!    the caller's [`Credentials`].
//!
//! `IsapiClient` generates the client nonce with [`new_cnonce`] and performs
//! the actual round trip.

use std::fmt;

use md5::Md5;
use sha2::{Digest, Sha256};

/// Digest username and password for one run.
///
/// Passed by reference into each request and never stored globally. The
/// `Debug` impl redacts the password so the value is safe to log.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    /// Creates credentials from a username and password.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials {
            username: username.into(),
            password: password.into(),
        }
    }

    /// The digest username.
    pub fn username(&self) -> &str {
        &self.username
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Reasons a `WWW-Authenticate` header cannot be answered.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChallengeError {
    /// No `Digest` challenge was offered (e.g. only `Basic`, or no
    /// `WWW-Authenticate` header at all).
    #[error("device did not offer a digest challenge")]
    NotDigest,

    /// A required challenge parameter is absent.
    #[error("digest challenge is missing '{0}'")]
    MissingParameter(&'static str),

    /// The challenge names a hash algorithm this client does not implement.
    #[error("unsupported digest algorithm '{0}'")]
    UnsupportedAlgorithm(String),

    /// `qop` was present but offered neither `auth` nor `auth-int`.
    #[error("unsupported digest qop '{0}'")]
    UnsupportedQop(String),

    /// The header could not be tokenized.
    #[error("malformed digest challenge: {0}")]
    Malformed(String),
}

/// Digest hash algorithm named by the challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    /// `MD5`, the default when the challenge omits `algorithm`.
    Md5,
    /// `MD5-sess`
    Md5Sess,
    /// `SHA-256`
    Sha256,
    /// `SHA-256-sess`
    Sha256Sess,
}

impl Algorithm {
    fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_uppercase().as_str() {
            "MD5" => Some(Algorithm::Md5),
            "MD5-SESS" => Some(Algorithm::Md5Sess),
            "SHA-256" => Some(Algorithm::Sha256),
            "SHA-256-SESS" => Some(Algorithm::Sha256Sess),
            _ => None,
        }
    }

    /// The token used in the `algorithm` parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Md5 => "MD5",
            Algorithm::Md5Sess => "MD5-sess",
            Algorithm::Sha256 => "SHA-256",
            Algorithm::Sha256Sess => "SHA-256-sess",
        }
    }

    fn is_session(&self) -> bool {
        matches!(self, Algorithm::Md5Sess | Algorithm::Sha256Sess)
    }

    /// Lowercase hex digest of `data`.
    fn hash(&self, data: impl AsRef<[u8]>) -> String {
        match self {
            Algorithm::Md5 | Algorithm::Md5Sess => format!("{:x}", Md5::digest(data)),
            Algorithm::Sha256 | Algorithm::Sha256Sess => format!("{:x}", Sha256::digest(data)),
        }
    }
}

/// Quality of protection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Qop {
    /// Authentication only.
    Auth,
    /// Authentication with request-body integrity.
    AuthInt,
}

impl Qop {
    /// The token used in the `qop` parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            Qop::Auth => "auth",
            Qop::AuthInt => "auth-int",
        }
    }
}

/// A parsed `Digest` challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestChallenge {
    /// Protection space, shown to users and mixed into HA1.
    pub realm: String,
    /// Server nonce.
    pub nonce: String,
    /// Opaque value that must be echoed back unchanged.
    pub opaque: Option<String>,
    /// Hash algorithm; `MD5` when the challenge omits it.
    pub algorithm: Algorithm,
    /// Offered qop values this client understands. Empty means the legacy
    /// RFC 2069 computation without `qop`, `nc` and `cnonce`.
    pub qop: Vec<Qop>,
    /// `stale=true`: the nonce expired but the credentials were fine.
    pub stale: bool,
}

impl DigestChallenge {
    /// Parses a single `WWW-Authenticate` header value.
    ///
    /// The value may list several challenges (`Basic realm="x", Digest
    /// ...`); the first `Digest` one is used.
    pub fn parse(header: &str) -> Result<Self, ChallengeError> {
        let params_start = find_digest_scheme(header).ok_or(ChallengeError::NotDigest)?;
        let params = parse_auth_params(&header[params_start..])?;
        let lookup = |name: &str| {
            params
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.clone())
        };

        let realm = lookup("realm").ok_or(ChallengeError::MissingParameter("realm"))?;
        let nonce = lookup("nonce").ok_or(ChallengeError::MissingParameter("nonce"))?;

        let algorithm = match lookup("algorithm") {
            Some(token) => Algorithm::from_token(&token)
                .ok_or(ChallengeError::UnsupportedAlgorithm(token))?,
            None => Algorithm::Md5,
        };

        let qop = match lookup("qop") {
            Some(raw) => {
                let offered: Vec<Qop> = raw
                    .split(',')
                    .filter_map(|token| match token.trim().to_ascii_lowercase().as_str() {
                        "auth" => Some(Qop::Auth),
                        "auth-int" => Some(Qop::AuthInt),
                        _ => None,
                    })
                    .collect();
                if offered.is_empty() {
                    return Err(ChallengeError::UnsupportedQop(raw));
                }
                offered
            }
            None => Vec::new(),
        };

        let stale = lookup("stale").is_some_and(|v| v.eq_ignore_ascii_case("true"));

        Ok(DigestChallenge {
            realm,
            nonce,
            opaque: lookup("opaque"),
            algorithm,
            qop,
            stale,
        })
    }

    /// Picks the challenge from a set of `WWW-Authenticate` header values,
    /// using the first one that contains a `Digest` challenge.
    pub fn from_headers<'a>(values: impl IntoIterator<Item = &'a str>) -> Result<Self, ChallengeError> {
        let mut last_err = ChallengeError::NotDigest;
        for value in values {
            match DigestChallenge::parse(value) {
                Ok(challenge) => return Ok(challenge),
                Err(ChallengeError::NotDigest) => continue,
                Err(e) => last_err = e,
            }
        }
        Err(last_err)
    }

    /// The qop the client will answer with: `auth` when offered, else
    /// `auth-int`, else none.
    pub fn preferred_qop(&self) -> Option<Qop> {
        if self.qop.contains(&Qop::Auth) {
            Some(Qop::Auth)
        } else {
            self.qop.first().copied()
        }
    }
}

/// The request-line inputs of one digest response.
#[derive(Debug, Clone, Copy)]
pub struct DigestRequest<'a> {
    /// HTTP method, e.g. `"POST"`.
    pub method: &'a str,
    /// Request target as sent on the wire (path plus query).
    pub uri: &'a str,
    /// Request body; only hashed for `auth-int`.
    pub body: &'a [u8],
    /// Client nonce.
    pub cnonce: &'a str,
    /// Number of requests sent with this server nonce, starting at 1.
    pub nonce_count: u32,
}

/// Computes the `Authorization` header value answering `challenge`.
///
/// Deterministic for a given input; all randomness lives in the `cnonce`
/// chosen by the caller.
pub fn digest_authorization(
    challenge: &DigestChallenge,
    credentials: &Credentials,
    request: &DigestRequest<'_>,
) -> String {
    let algorithm = challenge.algorithm;
    let qop = challenge.preferred_qop();
    let nc = format!("{:08x}", request.nonce_count);

    let mut ha1 = algorithm.hash(format!(
        "{}:{}:{}",
        credentials.username, challenge.realm, credentials.password
    ));
    if algorithm.is_session() {
        ha1 = algorithm.hash(format!("{ha1}:{}:{}", challenge.nonce, request.cnonce));
    }

    let ha2 = match qop {
        Some(Qop::AuthInt) => algorithm.hash(format!(
            "{}:{}:{}",
            request.method,
            request.uri,
            algorithm.hash(request.body)
        )),
        _ => algorithm.hash(format!("{}:{}", request.method, request.uri)),
    };

    let response = match qop {
        Some(q) => algorithm.hash(format!(
            "{ha1}:{}:{nc}:{}:{}:{ha2}",
            challenge.nonce,
            request.cnonce,
            q.as_str()
        )),
        None => algorithm.hash(format!("{ha1}:{}:{ha2}", challenge.nonce)),
    };

    let mut header = format!(
        "Digest username={}, realm={}, nonce={}, uri={}, algorithm={}, response={}",
        quote(&credentials.username),
        quote(&challenge.realm),
        quote(&challenge.nonce),
        quote(request.uri),
        algorithm.as_str(),
        quote(&response),
    );
    if let Some(opaque) = &challenge.opaque {
        header.push_str(&format!(", opaque={}", quote(opaque)));
    }
    if let Some(q) = qop {
        header.push_str(&format!(
            ", qop={}, nc={nc}, cnonce={}",
            q.as_str(),
            quote(request.cnonce)
        ));
    }
    header
}

/// A fresh random client nonce (128 bits, hex).
pub fn new_cnonce() -> String {
    format!("{:032x}", rand::random::<u128>())
}

// ── Header tokenizing ────────────────────────────────────────────────

/// Byte offset just past the `Digest` scheme token, if present at a
/// challenge boundary. Quoted-strings are skipped, so a realm such as
/// `"use digest auth"` never matches.
fn find_digest_scheme(header: &str) -> Option<usize> {
    const SCHEME: &[u8] = b"digest";
    let bytes = header.as_bytes();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut at_boundary = true;

    for (i, &b) in bytes.iter().enumerate() {
        if in_quotes {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_quotes = false,
                _ => {}
            }
            continue;
        }
        if b == b'"' {
            in_quotes = true;
            at_boundary = false;
            continue;
        }
        if at_boundary && bytes[i..].len() >= SCHEME.len() {
            let end = i + SCHEME.len();
            let followed = bytes.get(end).is_none_or(|c| c.is_ascii_whitespace());
            if bytes[i..end].eq_ignore_ascii_case(SCHEME) && followed {
                return Some(end);
            }
        }
        at_boundary = b == b',' || b.is_ascii_whitespace();
    }
    None
}

/// Splits `key=value, key="quoted value"` pairs. Keys are lowercased;
/// quoted values are unescaped. Stops at the start of a following
/// challenge (a bare token not followed by `=`).
fn parse_auth_params(input: &str) -> Result<Vec<(String, String)>, ChallengeError> {
    let mut params = Vec::new();
    let mut chars = input.chars().peekable();

    loop {
        while chars
            .peek()
            .is_some_and(|c| c.is_ascii_whitespace() || *c == ',')
        {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }

        let mut key = String::new();
        while let Some(&c) = chars.peek() {
            if c == '=' || c == ',' || c.is_ascii_whitespace() {
                break;
            }
            key.push(c);
            chars.next();
        }
        while chars.peek().is_some_and(|c| c.is_ascii_whitespace()) {
            chars.next();
        }
        if chars.peek() != Some(&'=') {
            if params.is_empty() {
                return Err(ChallengeError::Malformed(format!(
                    "expected '=' after '{key}'"
                )));
            }
            // Next challenge scheme begins.
            break;
        }
        chars.next();
        while chars.peek().is_some_and(|c| c.is_ascii_whitespace()) {
            chars.next();
        }

        let mut value = String::new();
        if chars.peek() == Some(&'"') {
            chars.next();
            let mut closed = false;
            while let Some(c) = chars.next() {
                match c {
                    '\\' => {
                        if let Some(escaped) = chars.next() {
                            value.push(escaped);
                        }
                    }
                    '"' => {
                        closed = true;
                        break;
                    }
                    other => value.push(other),
                }
            }
            if !closed {
                return Err(ChallengeError::Malformed(format!(
                    "unterminated quoted value for '{key}'"
                )));
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c == ',' || c.is_ascii_whitespace() {
                    break;
                }
                value.push(c);
                chars.next();
            }
        }

        params.push((key.to_ascii_lowercase(), value));
    }

    Ok(params)
}

/// Quoted-string form of `value`.
fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}
