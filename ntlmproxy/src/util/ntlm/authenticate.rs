//! Type-3 Authenticate message: built from the LM/NT response pair and
//! sent back to the parent to complete the handshake.

use crate::util::bytes::{u16_to_bytes, u32_to_bytes, utf16le_bytes};
use crate::util::ntlm::flags::NTLMFlags;
use crate::util::ntlm::message::SIGNATURE;

const HEADER_LEN: u32 = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticateMessage {
    pub flags: NTLMFlags,
    pub domain: String,
    pub user: String,
    pub workstation: String,
    pub lm_response: Vec<u8>,
    pub nt_response: Vec<u8>,
    pub session_key: Vec<u8>,
}

impl AuthenticateMessage {
    pub fn as_bytes(&self) -> Vec<u8> {
        let domain = utf16le_bytes(&self.domain);
        let user = utf16le_bytes(&self.user);
        let workstation = utf16le_bytes(&self.workstation);

        let domain_offset = HEADER_LEN;
        let user_offset = domain_offset + domain.len() as u32;
        let workstation_offset = user_offset + user.len() as u32;
        let lm_offset = workstation_offset + workstation.len() as u32;
        let nt_offset = lm_offset + self.lm_response.len() as u32;
        let session_key_offset = nt_offset + self.nt_response.len() as u32;

        let mut out = Vec::with_capacity(session_key_offset as usize + self.session_key.len());
        out.extend_from_slice(SIGNATURE);
        out.extend_from_slice(&u32_to_bytes(3));
        push_field(&mut out, self.lm_response.len() as u16, lm_offset);
        push_field(&mut out, self.nt_response.len() as u16, nt_offset);
        push_field(&mut out, domain.len() as u16, domain_offset);
        push_field(&mut out, user.len() as u16, user_offset);
        push_field(&mut out, workstation.len() as u16, workstation_offset);
        push_field(&mut out, self.session_key.len() as u16, session_key_offset);
        out.extend_from_slice(&u32_to_bytes(self.flags.bits()));

        out.extend_from_slice(&domain);
        out.extend_from_slice(&user);
        out.extend_from_slice(&workstation);
        out.extend_from_slice(&self.lm_response);
        out.extend_from_slice(&self.nt_response);
        out.extend_from_slice(&self.session_key);
        out
    }
}

fn push_field(out: &mut Vec<u8>, length: u16, offset: u32) {
    out.extend_from_slice(&u16_to_bytes(length));
    out.extend_from_slice(&u16_to_bytes(length));
    out.extend_from_slice(&u32_to_bytes(offset));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_offsets_match_header_length() {
        let msg = AuthenticateMessage {
            flags: NTLMFlags::for_scheme(true, false, "DOMAIN", "HOST"),
            domain: "DOMAIN".into(),
            user: "alice".into(),
            workstation: "HOST".into(),
            lm_response: vec![0u8; 24],
            nt_response: vec![1u8; 40],
            session_key: Vec::new(),
        };
        let bytes = msg.as_bytes();
        assert_eq!(&bytes[0..8], SIGNATURE);
        let expected_len = HEADER_LEN as usize
            + utf16le_bytes("DOMAIN").len()
            + utf16le_bytes("alice").len()
            + utf16le_bytes("HOST").len()
            + 24
            + 40;
        assert_eq!(bytes.len(), expected_len);
    }

    #[test]
    fn empty_session_key_produces_zero_length_field() {
        let msg = AuthenticateMessage {
            flags: NTLMFlags::for_scheme(false, false, "", ""),
            domain: String::new(),
            user: "bob".into(),
            workstation: String::new(),
            lm_response: vec![0u8; 24],
            nt_response: vec![0u8; 24],
            session_key: Vec::new(),
        };
        let bytes = msg.as_bytes();
        // session key field length lives at header offset 28..30
        assert_eq!(&bytes[28..30], &u16_to_bytes(0));
    }
}
