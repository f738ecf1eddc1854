//! NTLMv2 response computation: key derivation, blob construction, and the
//! NTv2/LMv2 responses built from them.

use hmac::{Hmac, Mac};
use md5::Md5;

use ntlmproxy_core::error::ProxyError;
use ntlmproxy_core::ProxyResult;

use crate::util::bytes::{u16_to_bytes, u32_to_bytes, u64_to_bytes, utf16le_bytes};

type HmacMd5 = Hmac<Md5>;

const BLOB_HEADER: [u8; 4] = [0x01, 0x01, 0x00, 0x00];
const BLOB_RESERVED: [u8; 4] = [0x00; 4];
const BLOB_TRAILER: [u8; 4] = [0x00; 4];

/// HMAC-MD5 keyed with the NT hash over UTF-16LE(uppercase(user) ‖ domain).
pub fn ntlmv2_key(nt_hash: &[u8; 16], user: &str, domain: &str) -> ProxyResult<[u8; 16]> {
    let mut mac = new_hmac(nt_hash)?;
    let identity = utf16le_bytes(&(user.to_uppercase() + domain));
    mac.update(&identity);
    Ok(mac.finalize().into_bytes().into())
}

/// Builds the variable-length blob: header ‖ reserved ‖ timestamp (Windows
/// FILETIME, little-endian) ‖ client nonce ‖ reserved ‖ target-info ‖
/// trailer.
pub fn build_blob(timestamp: u64, client_nonce: &[u8; 8], target_info: &[u8]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(28 + target_info.len());
    blob.extend_from_slice(&BLOB_HEADER);
    blob.extend_from_slice(&BLOB_RESERVED);
    blob.extend_from_slice(&u64_to_bytes(timestamp));
    blob.extend_from_slice(client_nonce);
    blob.extend_from_slice(&BLOB_RESERVED);
    blob.extend_from_slice(target_info);
    blob.extend_from_slice(&BLOB_TRAILER);
    blob
}

/// NTv2 response: HMAC-MD5(NTLMv2 key, server_challenge ‖ blob) ‖ blob.
pub fn ntlmv2_response(
    ntlmv2_key: &[u8; 16],
    server_challenge: &[u8; 8],
    blob: &[u8],
) -> ProxyResult<Vec<u8>> {
    let mut mac = new_hmac(ntlmv2_key)?;
    mac.update(server_challenge);
    mac.update(blob);
    let proof = mac.finalize().into_bytes();

    let mut out = Vec::with_capacity(16 + blob.len());
    out.extend_from_slice(&proof);
    out.extend_from_slice(blob);
    Ok(out)
}

/// LMv2 response: HMAC-MD5(NTLMv2 key, server_challenge ‖ client_nonce) ‖
/// client_nonce. Shorter sibling of the NTv2 response, same key.
pub fn lmv2_response(
    ntlmv2_key: &[u8; 16],
    server_challenge: &[u8; 8],
    client_nonce: &[u8; 8],
) -> ProxyResult<Vec<u8>> {
    let mut mac = new_hmac(ntlmv2_key)?;
    mac.update(server_challenge);
    mac.update(client_nonce);
    let proof = mac.finalize().into_bytes();

    let mut out = Vec::with_capacity(24);
    out.extend_from_slice(&proof);
    out.extend_from_slice(client_nonce);
    Ok(out)
}

fn new_hmac(key: &[u8]) -> ProxyResult<HmacMd5> {
    HmacMd5::new_from_slice(key).map_err(|_| ProxyError::protocol("invalid HMAC-MD5 key length"))
}

/// Appends an AV_PAIR entry in the wire format NTLMv2 target-info blocks
/// use: `u16 type, u16 len, value`.
pub fn push_av_pair(out: &mut Vec<u8>, av_type: u16, value: &[u8]) {
    out.extend_from_slice(&u16_to_bytes(av_type));
    out.extend_from_slice(&u16_to_bytes(value.len() as u16));
    out.extend_from_slice(value);
}

/// Appends the MsvAvEOL terminator (type 0, length 0) that closes a
/// target-info block.
pub fn terminate_target_info(out: &mut Vec<u8>) {
    out.extend_from_slice(&u32_to_bytes(0));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::crypto::hash::nt_hash;

    #[test]
    fn ntlmv2_response_is_deterministic_and_self_consistent() {
        let hash = nt_hash("SecREt01");
        let key = ntlmv2_key(&hash, "User", "Domain").unwrap();
        let challenge = [0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef];
        let nonce = [0xff, 0xff, 0xff, 0x00, 0x11, 0x22, 0x33, 0x44];
        let blob = build_blob(0, &nonce, &[]);

        let r1 = ntlmv2_response(&key, &challenge, &blob).unwrap();
        let r2 = ntlmv2_response(&key, &challenge, &blob).unwrap();
        assert_eq!(r1, r2);
        assert_eq!(r1.len(), 16 + blob.len());

        let mut mac = new_hmac(&key).unwrap();
        mac.update(&challenge);
        mac.update(&blob);
        let expected = mac.finalize().into_bytes();
        assert_eq!(&r1[..16], expected.as_slice());
    }

    #[test]
    fn blob_layout_has_header_and_trailer() {
        let nonce = [0u8; 8];
        let blob = build_blob(12345, &nonce, b"targetinfo");
        assert_eq!(&blob[0..4], &BLOB_HEADER);
        assert_eq!(&blob[blob.len() - 4..], &BLOB_TRAILER);
    }

    #[test]
    fn lmv2_response_is_24_bytes_with_trailing_nonce() {
        let hash = nt_hash("SecREt01");
        let key = ntlmv2_key(&hash, "User", "Domain").unwrap();
        let challenge = [0u8; 8];
        let nonce = [9u8; 8];
        let response = lmv2_response(&key, &challenge, &nonce).unwrap();
        assert_eq!(response.len(), 24);
        assert_eq!(&response[16..], &nonce);
    }

    #[test]
    fn av_pair_round_trips_type_and_length() {
        let mut out = Vec::new();
        push_av_pair(&mut out, 2, b"DOMAIN");
        assert_eq!(&out[0..2], &u16_to_bytes(2));
        assert_eq!(&out[2..4], &u16_to_bytes(6));
        assert_eq!(&out[4..], b"DOMAIN");
    }
}
