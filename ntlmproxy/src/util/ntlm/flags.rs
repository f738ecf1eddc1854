use bitflags::bitflags;

bitflags! {
    /// NTLMSSP `NegotiateFlags`, shared by all three message types.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct NTLMFlags: u32 {
        const UNICODE               = 0x0000_0001;
        const OEM                   = 0x0000_0002;
        const REQUEST_TARGET        = 0x0000_0004;
        const SIGN                  = 0x0000_0010;
        const SEAL                  = 0x0000_0020;
        const DATAGRAM              = 0x0000_0040;
        const LM_KEY                = 0x0000_0080;
        const NTLM                  = 0x0000_0200;
        const ANONYMOUS             = 0x0000_0800;
        const NEGOTIATE_DOMAIN      = 0x0000_1000;
        const NEGOTIATE_WORKSTATION = 0x0000_2000;
        const ALWAYS_SIGN           = 0x0000_8000;
        const TARGET_TYPE_DOMAIN    = 0x0001_0000;
        const TARGET_TYPE_SERVER    = 0x0002_0000;
        const EXTENDED_SECURITY     = 0x0008_0000;
        const IDENTIFY              = 0x0010_0000;
        const REQUEST_LM_KEY        = 0x0040_0000;
        const TARGET_INFO           = 0x0080_0000;
        const VERSION               = 0x0200_0000;
        const KEY_128               = 0x2000_0000;
        const KEY_EXCHANGE          = 0x4000_0000;
        const KEY_56                = 0x8000_0000;
    }
}

impl NTLMFlags {
    /// Negotiate flags computed from the credential/hash configuration in
    /// use. `ntlmv2` picks extended session security and unicode
    /// target-info handling; `key_exchange` mirrors the operator's
    /// selected hash set demanding a session key.
    pub fn for_scheme(ntlmv2: bool, key_exchange: bool, domain: &str, workstation: &str) -> Self {
        let mut flags = Self::UNICODE | Self::NTLM | Self::REQUEST_TARGET | Self::ALWAYS_SIGN;
        if ntlmv2 {
            flags |= Self::EXTENDED_SECURITY;
        }
        if !domain.is_empty() {
            flags |= Self::NEGOTIATE_DOMAIN;
        }
        if !workstation.is_empty() {
            flags |= Self::NEGOTIATE_WORKSTATION;
        }
        if key_exchange {
            flags |= Self::KEY_EXCHANGE;
        }
        flags
    }
}
