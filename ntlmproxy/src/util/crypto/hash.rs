//! LM and NT base hash derivation plus the LM/NT and NTLM2 Session
//! Response functions.

use digest::Digest;
use md4::Md4;
use md5::Md5;

use ntlmproxy_core::ProxyResult;

use crate::util::bytes::utf16le_bytes;
use crate::util::crypto::des::{des_encrypt_block, des_long_encrypt, LM_MAGIC};

/// Upper-cases and pads/truncates `password` to 14 bytes, splits it into
/// two 7-byte DES keys, each encrypting the constant `"KGS!@#$%"`.
pub fn lm_hash(password: &str) -> ProxyResult<[u8; 16]> {
    let mut padded = [0u8; 14];
    let upper = password.to_uppercase();
    let upper_bytes = upper.as_bytes();
    let n = upper_bytes.len().min(14);
    padded[..n].copy_from_slice(&upper_bytes[..n]);

    let k1: [u8; 7] = padded[0..7].try_into().unwrap();
    let k2: [u8; 7] = padded[7..14].try_into().unwrap();

    let h1 = des_encrypt_block(&k1, LM_MAGIC)?;
    let h2 = des_encrypt_block(&k2, LM_MAGIC)?;

    let mut out = [0u8; 16];
    out[..8].copy_from_slice(&h1);
    out[8..].copy_from_slice(&h2);
    Ok(out)
}

/// MD4 of the password in little-endian UTF-16 ("unicode" in NTLM parlance).
pub fn nt_hash(password: &str) -> [u8; 16] {
    let utf16 = utf16le_bytes(password);
    let digest = Md4::digest(&utf16);
    digest.into()
}

/// The LM/NT response: the 16-byte hash zero-padded to a 21-byte key, split
/// into three 7-byte DES keys, each encrypting the 8-byte server challenge.
pub fn lm_nt_response(hash: &[u8; 16], server_challenge: &[u8; 8]) -> ProxyResult<[u8; 24]> {
    let response = des_long_encrypt(hash, server_challenge)?;
    Ok(response.try_into().expect("des_long_encrypt always returns 24 bytes"))
}

/// NTLM2 Session Response: an 8-byte client nonce (padded to a 16-byte
/// "LM response" with trailing zeros), a session hash computed as the
/// first 8 bytes of MD5(server_challenge ‖ client_nonce), and the NT
/// response computed over that session hash instead of the raw challenge.
pub fn ntlm2_session_response(
    nt_hash: &[u8; 16],
    server_challenge: &[u8; 8],
    client_nonce: &[u8; 8],
) -> ProxyResult<(Vec<u8>, [u8; 24])> {
    let mut lm_response = vec![0u8; 24];
    lm_response[..8].copy_from_slice(client_nonce);

    let mut hasher = Md5::new();
    hasher.update(server_challenge);
    hasher.update(client_nonce);
    let digest = hasher.finalize();
    let session_hash: [u8; 8] = digest[..8].try_into().unwrap();

    let nt_response = lm_nt_response(nt_hash, &session_hash)?;
    Ok((lm_response, nt_response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lm_hash_known_vector() {
        // "password" -> well-known LM hash used across NTLM test suites.
        let hash = lm_hash("password").unwrap();
        assert_eq!(
            hash,
            [
                0xe5, 0x2c, 0xac, 0x67, 0x41, 0x9a, 0x9a, 0x22, 0x4a, 0x3b, 0x10, 0x8f, 0x3f, 0xa6,
                0xcb, 0x6d
            ]
        );
    }

    #[test]
    fn nt_hash_known_vector() {
        let hash = nt_hash("password");
        assert_eq!(
            hash,
            [
                0x88, 0x46, 0xf7, 0xea, 0xee, 0x8f, 0xb1, 0x17, 0xad, 0x06, 0xbd, 0xd8, 0x30, 0xb7,
                0x58, 0x6c
            ]
        );
    }

    #[test]
    fn response_is_24_bytes() {
        let hash = nt_hash("SecREt01");
        let challenge = [0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef];
        let response = lm_nt_response(&hash, &challenge).unwrap();
        assert_eq!(response.len(), 24);
    }

    #[test]
    fn ntlm2_session_response_is_deterministic() {
        let hash = nt_hash("SecREt01");
        let challenge = [0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef];
        let nonce = [0xff, 0xff, 0xff, 0x00, 0x11, 0x22, 0x33, 0x44];
        let (lm1, nt1) = ntlm2_session_response(&hash, &challenge, &nonce).unwrap();
        let (lm2, nt2) = ntlm2_session_response(&hash, &challenge, &nonce).unwrap();
        assert_eq!(lm1, lm2);
        assert_eq!(nt1, nt2);
    }
}
