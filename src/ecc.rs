//! Reed-Solomon P/Q error-correction code over GF(2^8), generator 0x11D.
//!
//! Both the P and Q parity blocks are produced by the same interleaved
//! kernel (`block`), just with different major/minor strides. The source
//! window is always the 2340 bytes starting right after the sync pattern
//! (sector offset 12), which is why Q's source overlaps the freshly
//! written P bytes: the Q code protects the address, the data *and* P.

use crate::tables::tables;

/// Offset of the ECC-P region within a full 2352-byte sector.
pub const ECC_P_OFFSET: usize = 0x81C;
/// Size in bytes of the ECC-P region.
pub const ECC_P_SIZE: usize = 172;
/// Offset of the ECC-Q region within a full 2352-byte sector.
pub const ECC_Q_OFFSET: usize = 0x8C8;
/// Size in bytes of the ECC-Q region.
pub const ECC_Q_SIZE: usize = 104;

const SRC_BASE: usize = 12;
const ADDRESS_SIZE: usize = 4;

/// Temporarily zero `sector[12..16]` if `zero` is set, returning the saved
/// bytes to be restored by the caller once the computation is done.
fn zero_address(sector: &mut [u8; 2352], zero: bool) -> Option<[u8; ADDRESS_SIZE]> {
    if !zero {
        return None;
    }
    let saved = [sector[12], sector[13], sector[14], sector[15]];
    sector[12..16].fill(0);
    Some(saved)
}

fn restore_address(sector: &mut [u8; 2352], saved: Option<[u8; ADDRESS_SIZE]>) {
    if let Some(saved) = saved {
        sector[12..16].copy_from_slice(&saved);
    }
}

/// The interleaved P/Q kernel: XORs `minor_count` bytes of `sector` (read
/// starting at `SRC_BASE`, strided by `minor_inc` and wrapped modulo
/// `major_count * minor_count`) into a Reed-Solomon codeword pair per
/// `major`, writing both parity bytes into `dest`.
fn block(
    sector: &[u8; 2352],
    major_count: usize,
    minor_count: usize,
    major_mult: usize,
    minor_inc: usize,
    dest: &mut [u8],
) {
    let t = tables();
    let size = major_count * minor_count;

    for major in 0..major_count {
        let mut index = (major / 2) * major_mult + (major % 2);
        let mut a = 0u8;
        let mut b = 0u8;

        for _ in 0..minor_count {
            let byte = sector[SRC_BASE + index];
            index += minor_inc;
            if index >= size {
                index -= size;
            }
            a ^= byte;
            b ^= byte;
            a = t.ecc_f[a as usize];
        }

        a = t.ecc_b[(t.ecc_f[a as usize] ^ b) as usize];
        dest[major] = a;
        dest[major_count + major] = a ^ b;
    }
}

/// Generate ECC-P and ECC-Q for `sector`, writing them in place.
///
/// `zero_address_flag` selects the Mode 2 Form 1 policy of computing ECC
/// with the 4-byte address field cleared; Mode 1 leaves the address intact.
pub fn generate(sector: &mut [u8; 2352], zero_address_flag: bool) {
    let saved = zero_address(sector, zero_address_flag);

    let mut p = [0u8; ECC_P_SIZE];
    block(sector, 86, 24, 2, 86, &mut p);
    sector[ECC_P_OFFSET..ECC_P_OFFSET + ECC_P_SIZE].copy_from_slice(&p);

    let mut q = [0u8; ECC_Q_SIZE];
    block(sector, 52, 43, 86, 88, &mut q);
    sector[ECC_Q_OFFSET..ECC_Q_OFFSET + ECC_Q_SIZE].copy_from_slice(&q);

    restore_address(sector, saved);
}

/// Verify that `sector`'s stored ECC-P/Q match what `generate` would
/// produce. Leaves the sector unchanged (the address field, if zeroed for
/// the computation, is always restored before returning).
pub fn verify(sector: &mut [u8; 2352], zero_address_flag: bool) -> bool {
    let saved = zero_address(sector, zero_address_flag);

    let mut p = [0u8; ECC_P_SIZE];
    block(sector, 86, 24, 2, 86, &mut p);
    let mut q = [0u8; ECC_Q_SIZE];
    block(sector, 52, 43, 86, 88, &mut q);

    let ok = sector[ECC_P_OFFSET..ECC_P_OFFSET + ECC_P_SIZE] == p
        && sector[ECC_Q_OFFSET..ECC_Q_OFFSET + ECC_Q_SIZE] == q;

    restore_address(sector, saved);
    ok
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn generate_then_verify_roundtrips() {
        let mut sector = [0u8; 2352];
        for (i, b) in sector.iter_mut().enumerate() {
            *b = (i * 31) as u8;
        }

        generate(&mut sector, false);
        assert!(verify(&mut sector, false));

        sector[ECC_P_OFFSET] ^= 0xFF;
        assert!(!verify(&mut sector, false));
    }

    #[test]
    fn address_is_restored_after_zeroed_compute() {
        let mut sector = [0u8; 2352];
        sector[12] = 0x12;
        sector[13] = 0x34;
        sector[14] = 0x56;
        sector[15] = 0x02;

        generate(&mut sector, true);
        assert_eq!(&sector[12..16], &[0x12, 0x34, 0x56, 0x02]);
        assert!(verify(&mut sector, true));
        assert_eq!(&sector[12..16], &[0x12, 0x34, 0x56, 0x02]);
    }
}
