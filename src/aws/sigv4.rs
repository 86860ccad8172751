//! AWS Signature Version 4 request signing.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use super::credentials::Credentials;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

type HmacSha256 = Hmac<Sha256>;

/// The parts of an HTTP request that go into the signature.
#[derive(Clone, Debug)]
pub struct RequestParts<'a> {
    pub method: &'a str,
    /// `host[:port]` exactly as sent.
    pub host: &'a str,
    /// Already URI-encoded absolute path.
    pub path: &'a str,
    /// Raw (unencoded) query parameters.
    pub query: &'a [(String, String)],
    /// Extra headers to sign, e.g. `content-type`, `x-amz-target`.
    pub headers: &'a [(String, String)],
    pub payload: &'a [u8],
}

/// Request timestamp in the two formats SigV4 needs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SigningTime {
    /// `YYYYMMDDTHHMMSSZ`
    pub amz_date: String,
    /// `YYYYMMDD`
    pub date: String,
}

impl SigningTime {
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self {
            amz_date: at.format("%Y%m%dT%H%M%SZ").to_string(),
            date: at.format("%Y%m%d").to_string(),
        }
    }

    pub fn from_unix(secs: i64) -> Result<Self> {
        let at = DateTime::from_timestamp(secs, 0)
            .ok_or_else(|| anyhow!("timestamp {} out of range", secs))?;
        Ok(Self::from_datetime(at))
    }
}

/// Headers to attach to a request: `x-amz-date`, the optional
/// `x-amz-security-token`, and `authorization`.
pub fn sign(
    parts: &RequestParts<'_>,
    creds: &Credentials,
    region: &str,
    service: &str,
    time: &SigningTime,
) -> Result<Vec<(String, String)>> {
    let mut headers: Vec<(String, String)> = parts
        .headers
        .iter()
        .map(|(k, v)| (k.to_ascii_lowercase(), v.trim().to_string()))
        .collect();
    headers.push(("host".to_string(), parts.host.to_string()));
    headers.push(("x-amz-date".to_string(), time.amz_date.clone()));
    if let Some(token) = &creds.session_token {
        headers.push(("x-amz-security-token".to_string(), token.clone()));
    }
    headers.sort();

    let canonical = canonical_request(parts, &headers);
    let scope = format!("{}/{}/{}/aws4_request", time.date, region, service);
    let string_to_sign = format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        time.amz_date,
        scope,
        hex::encode(Sha256::digest(canonical.as_bytes()))
    );
    let key = signing_key(&creds.secret_access_key, &time.date, region, service)?;
    let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes())?);
    let signed_headers = signed_header_names(&headers);

    let mut out = vec![("x-amz-date".to_string(), time.amz_date.clone())];
    if let Some(token) = &creds.session_token {
        out.push(("x-amz-security-token".to_string(), token.clone()));
    }
    out.push((
        "authorization".to_string(),
        format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            ALGORITHM, creds.access_key_id, scope, signed_headers, signature
        ),
    ));
    Ok(out)
}

/// Hex SHA-256 of a payload, as used in `x-amz-content-sha256`.
pub fn payload_hash(payload: &[u8]) -> String {
    hex::encode(Sha256::digest(payload))
}

/// Percent-encodes everything except RFC 3986 unreserved characters.
/// `/` is kept when `encode_slash` is false (object key paths).
pub fn uri_encode(input: &str, encode_slash: bool) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        let keep = byte.is_ascii_alphanumeric()
            || matches!(byte, b'-' | b'_' | b'.' | b'~')
            || (byte == b'/' && !encode_slash);
        if keep {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}

/// Sorted, encoded query string shared by the signature and the request URL.
pub fn canonical_query(query: &[(String, String)]) -> String {
    let mut pairs: Vec<(String, String)> = query
        .iter()
        .map(|(k, v)| (uri_encode(k, true), uri_encode(v, true)))
        .collect();
    pairs.sort();
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

fn canonical_request(parts: &RequestParts<'_>, sorted_headers: &[(String, String)]) -> String {
    let canonical_headers: String = sorted_headers
        .iter()
        .map(|(k, v)| format!("{}:{}\n", k, v))
        .collect();
    format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        parts.method,
        parts.path,
        canonical_query(parts.query),
        canonical_headers,
        signed_header_names(sorted_headers),
        payload_hash(parts.payload)
    )
}

fn signed_header_names(sorted_headers: &[(String, String)]) -> String {
    sorted_headers
        .iter()
        .map(|(k, _)| k.as_str())
        .collect::<Vec<_>>()
        .join(";")
}

fn signing_key(secret: &str, date: &str, region: &str, service: &str) -> Result<[u8; 32]> {
    let k_date = hmac_sha256(format!("AWS4{}", secret).as_bytes(), date.as_bytes())?;
    let k_region = hmac_sha256(&k_date, region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, service.as_bytes())?;
    hmac_sha256(&k_service, b"aws4_request")
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<[u8; 32]> {
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|e| anyhow!("hmac key rejected: {}", e))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().into())
}
