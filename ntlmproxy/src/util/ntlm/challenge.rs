//! Type-2 Challenge message: the only NTLMSSP message this proxy parses,
//! since it plays the client role toward the parent proxy.

use nom::bytes::complete::{tag, take};
use nom::combinator::cond;
use nom::number::complete::le_u32;
use nom::IResult;

use crate::util::ntlm::flags::NTLMFlags;
use crate::util::ntlm::message::{parse_buffer_fields, slice_buffer, SIGNATURE};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeMessage {
    pub target_name: Vec<u8>,
    pub flags: NTLMFlags,
    pub server_challenge: [u8; 8],
    pub target_info: Vec<u8>,
}

impl ChallengeMessage {
    pub fn parse(bytes: &[u8]) -> IResult<&[u8], Self> {
        let (remaining, _) = tag(SIGNATURE.as_slice())(bytes)?;
        let (remaining, _message_type) = le_u32(remaining)?;
        let (remaining, (target_name_len, target_name_offset)) = parse_buffer_fields(remaining)?;
        let (remaining, flags_bits) = le_u32(remaining)?;
        let flags = NTLMFlags::from_bits_truncate(flags_bits);
        let (remaining, challenge_bytes) = take(8_usize)(remaining)?;
        let (remaining, _reserved) = take(8_usize)(remaining)?;
        let (remaining, (target_info_len, target_info_offset)) = parse_buffer_fields(remaining)?;
        let (remaining, _version) =
            cond(flags.contains(NTLMFlags::VERSION), take(8_usize))(remaining)?;

        let (_, target_name) = slice_buffer(bytes, target_name_len, target_name_offset)?;
        let (_, target_info) = slice_buffer(bytes, target_info_len, target_info_offset)?;

        let mut server_challenge = [0u8; 8];
        server_challenge.copy_from_slice(challenge_bytes);

        Ok((
            remaining,
            ChallengeMessage {
                target_name: target_name.to_vec(),
                flags,
                server_challenge,
                target_info: target_info.to_vec(),
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::bytes::{u16_to_bytes, u32_to_bytes};

    const HEADER_LEN: u32 = 48;

    fn build_sample_challenge() -> Vec<u8> {
        let target_name = b"DOMAIN".to_vec();
        let target_info: Vec<u8> = vec![
            0x02, 0x00, 0x0c, 0x00, b'D', 0x00, b'O', 0x00, b'M', 0x00, b'A', 0x00, b'I', 0x00,
            b'N', 0x00, 0x00, 0x00, 0x00, 0x00,
        ];
        let target_name_offset = HEADER_LEN;
        let target_info_offset = target_name_offset + target_name.len() as u32;
        let flags = NTLMFlags::for_scheme(true, false, "DOMAIN", "");

        let mut out = Vec::new();
        out.extend_from_slice(SIGNATURE);
        out.extend_from_slice(&u32_to_bytes(2));
        out.extend_from_slice(&u16_to_bytes(target_name.len() as u16));
        out.extend_from_slice(&u16_to_bytes(target_name.len() as u16));
        out.extend_from_slice(&u32_to_bytes(target_name_offset));
        out.extend_from_slice(&u32_to_bytes(flags.bits()));
        out.extend_from_slice(&[0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef]);
        out.extend_from_slice(&[0u8; 8]);
        out.extend_from_slice(&u16_to_bytes(target_info.len() as u16));
        out.extend_from_slice(&u16_to_bytes(target_info.len() as u16));
        out.extend_from_slice(&u32_to_bytes(target_info_offset));
        out.extend_from_slice(&target_name);
        out.extend_from_slice(&target_info);
        out
    }

    #[test]
    fn parses_target_name_and_server_challenge() {
        let bytes = build_sample_challenge();
        let (_, msg) = ChallengeMessage::parse(&bytes).unwrap();
        assert_eq!(msg.target_name, b"DOMAIN");
        assert_eq!(
            msg.server_challenge,
            [0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef]
        );
        assert_eq!(msg.target_info.len(), 20);
    }

    #[test]
    fn rejects_wrong_signature() {
        let mut bytes = build_sample_challenge();
        bytes[0] = b'X';
        assert!(ChallengeMessage::parse(&bytes).is_err());
    }
}
