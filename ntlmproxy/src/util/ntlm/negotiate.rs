//! Type-1 Negotiate message, sent first to advertise this proxy's
//! capabilities to the parent.

use crate::util::bytes::{u16_to_bytes, u32_to_bytes};
use crate::util::ntlm::flags::NTLMFlags;
use crate::util::ntlm::message::SIGNATURE;

const HEADER_LEN: u32 = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiateMessage {
    pub flags: NTLMFlags,
    pub domain: String,
    pub workstation: String,
}

impl NegotiateMessage {
    pub fn new(flags: NTLMFlags, domain: impl Into<String>, workstation: impl Into<String>) -> Self {
        Self {
            flags,
            domain: domain.into(),
            workstation: workstation.into(),
        }
    }

    /// Domain and workstation travel as OEM (ASCII) strings here, unlike
    /// the UTF-16LE payloads later messages carry, matching what real NTLM
    /// clients emit in the Negotiate message.
    pub fn as_bytes(&self) -> Vec<u8> {
        let domain = self.domain.as_bytes();
        let workstation = self.workstation.as_bytes();
        let domain_offset = HEADER_LEN;
        let workstation_offset = domain_offset + domain.len() as u32;

        let mut out = Vec::with_capacity(HEADER_LEN as usize + domain.len() + workstation.len());
        out.extend_from_slice(SIGNATURE);
        out.extend_from_slice(&u32_to_bytes(1));
        out.extend_from_slice(&u32_to_bytes(self.flags.bits()));
        out.extend_from_slice(&u16_to_bytes(domain.len() as u16));
        out.extend_from_slice(&u16_to_bytes(domain.len() as u16));
        out.extend_from_slice(&u32_to_bytes(domain_offset));
        out.extend_from_slice(&u16_to_bytes(workstation.len() as u16));
        out.extend_from_slice(&u16_to_bytes(workstation.len() as u16));
        out.extend_from_slice(&u32_to_bytes(workstation_offset));
        out.extend_from_slice(domain);
        out.extend_from_slice(workstation);
        out
    }
}
