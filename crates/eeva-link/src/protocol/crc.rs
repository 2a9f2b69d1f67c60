//! CRC-16 used to protect every frame
//!
//! CRC-16/CCITT-FALSE: polynomial 0x1021, MSB first, no reflection and no
//! final XOR. The firmware runs the same routine seeded with
//! [`CRC_INITIAL`], so both directions of the link must call this function.

/// Seed value for frame checksums
pub const CRC_INITIAL: u16 = 0xFFFF;

/// CRC-16/IBM-3740, also known as CCITT-FALSE
const CRC_KIND: crc::Crc<u16> = crc::Crc::<u16>::new(&crc::CRC_16_IBM_3740);

/// Compute the CRC over the first `length` bytes of `bytes`, starting from `initial`.
///
/// `length` is clamped to the slice, so this never reads past `bytes`.
pub fn crc16(bytes: &[u8], length: usize, initial: u16) -> u16 {
    let end = length.min(bytes.len());
    let mut digest = CRC_KIND.digest_with_initial(initial);
    digest.update(&bytes[..end]);
    digest.finalize()
}

/// CRC of a complete byte range with the frame seed
pub fn crc16_frame(bytes: &[u8]) -> u16 {
    crc16(bytes, bytes.len(), CRC_INITIAL)
}
