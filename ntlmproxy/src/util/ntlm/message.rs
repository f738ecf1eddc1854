//! Shared wire-format helpers for the NTLMSSP message family: the common
//! signature and the buffer-descriptor convention (length, max-length,
//! offset-from-message-start) every variable-length field uses.

use nom::bytes::complete::take;
use nom::number::complete::{le_u16, le_u32};
use nom::IResult;

pub const SIGNATURE: &[u8; 8] = b"NTLMSSP\0";

/// Reads a buffer descriptor: 2-byte length, 2-byte (ignored) max length,
/// 4-byte offset from the start of the message.
pub(crate) fn parse_buffer_fields(bytes: &[u8]) -> IResult<&[u8], (u16, u32)> {
    let (remaining, length) = le_u16(bytes)?;
    let (remaining, _max_length) = le_u16(remaining)?;
    let (remaining, offset) = le_u32(remaining)?;
    Ok((remaining, (length, offset)))
}

/// Slices `length` bytes out of `message` starting at `offset`, per the
/// NTLM convention that buffer descriptors are offsets from message start,
/// not from the current parse cursor.
pub(crate) fn slice_buffer(message: &[u8], length: u16, offset: u32) -> IResult<&[u8], &[u8]> {
    let (after_offset, _) = take(offset as usize)(message)?;
    take(length as usize)(after_offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::bytes::{u16_to_bytes, u32_to_bytes};

    #[test]
    fn slice_buffer_respects_offset_from_start() {
        let message = [b"header".as_slice(), b"payload"].concat();
        let (_, slice) = slice_buffer(&message, 7, 6).unwrap();
        assert_eq!(slice, b"payload");
    }

    #[test]
    fn parse_buffer_fields_reads_length_and_offset() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&u16_to_bytes(10));
        bytes.extend_from_slice(&u16_to_bytes(10));
        bytes.extend_from_slice(&u32_to_bytes(40));
        let (_, (length, offset)) = parse_buffer_fields(&bytes).unwrap();
        assert_eq!(length, 10);
        assert_eq!(offset, 40);
    }
}
