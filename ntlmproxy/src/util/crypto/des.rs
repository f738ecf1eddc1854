//! DES primitives backing the LM family of responses: a 16 or 21-byte key
//! split into three 7-byte DES keys, each encrypting an 8-byte challenge.

use des::cipher::BlockEncrypt;
use des::Des;
use digest::KeyInit;

use ntlmproxy_core::error::ProxyError;
use ntlmproxy_core::ProxyResult;

/// Splits `key` (zero-padded to 21 bytes) into three 7-byte DES keys, each
/// encrypting `plaintext` (an 8-byte challenge). Used for both the LM and
/// NT response and for NTLM2 Session Response.
pub fn des_long_encrypt(key: &[u8], plaintext: &[u8]) -> ProxyResult<Vec<u8>> {
    if key.len() > 21 || plaintext.len() != 8 {
        return Err(ProxyError::protocol("invalid DES key/plaintext length"));
    }
    let mut padded = key.to_vec();
    padded.resize(21, 0);

    let k1 = &padded[0..7];
    let k2 = &padded[7..14];
    let k3 = &padded[14..21];

    let r1 = des_encrypt(&extend_des_key(k1), plaintext)?;
    let r2 = des_encrypt(&extend_des_key(k2), plaintext)?;
    let r3 = des_encrypt(&extend_des_key(k3), plaintext)?;

    Ok([r1, r2, r3].concat())
}

/// Expands a 56-bit (7-byte) key into the 64-bit form DES expects by
/// inserting a parity bit after every 7 bits.
fn extend_des_key(key: &[u8]) -> [u8; 8] {
    let mut result = [0u8; 8];

    result[0] = key[0] >> 1;
    result[1] = ((key[0] & 0x01) << 6) | (key[1] >> 2);
    result[2] = ((key[1] & 0x03) << 5) | (key[2] >> 3);
    result[3] = ((key[2] & 0x07) << 4) | (key[3] >> 4);
    result[4] = ((key[3] & 0x0F) << 3) | (key[4] >> 5);
    result[5] = ((key[4] & 0x1F) << 2) | (key[5] >> 6);
    result[6] = ((key[5] & 0x3F) << 1) | (key[6] >> 7);
    result[7] = key[6] & 0x7F;

    for byte in result.iter_mut() {
        *byte <<= 1;
    }

    result
}

fn des_encrypt(key: &[u8], plaintext: &[u8]) -> ProxyResult<Vec<u8>> {
    let cipher =
        Des::new_from_slice(key).map_err(|_| ProxyError::protocol("invalid DES key length"))?;
    let mut result = [0u8; 8];
    cipher.encrypt_block_b2b(plaintext.into(), (&mut result).into());
    Ok(result.to_vec())
}

/// The DES-ECB encryption plaintext used by the LM hash.
pub const LM_MAGIC: &[u8; 8] = b"KGS!@#$%";

/// Encrypts a single 8-byte block under a 7-byte DES key, parity-expanded
/// the same way `des_long_encrypt` expands each third of its key. Used
/// directly by the LM hash, which DES-encrypts a fixed magic string rather
/// than a server challenge.
pub fn des_encrypt_block(key7: &[u8; 7], plaintext: &[u8; 8]) -> ProxyResult<[u8; 8]> {
    let bytes = des_encrypt(&extend_des_key(key7), plaintext)?;
    Ok(bytes.try_into().expect("des_encrypt always returns 8 bytes"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_encrypt_produces_24_bytes() {
        let key = [0u8; 16];
        let challenge = [1, 2, 3, 4, 5, 6, 7, 8];
        let out = des_long_encrypt(&key, &challenge).unwrap();
        assert_eq!(out.len(), 24);
    }

    #[test]
    fn rejects_wrong_challenge_length() {
        let key = [0u8; 16];
        assert!(des_long_encrypt(&key, &[0; 7]).is_err());
    }
}
