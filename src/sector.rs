//! CD-ROM sector layout: sync pattern, per-mode offsets and the
//! full-sector ECC/EDC generator of §4.1's `generate` table.

use crate::ecc;
use crate::edc::{edc_compute, edc_to_bytes, edc_update};
use crate::msf::Msf;

/// Size in bytes of a full raw CD-ROM sector.
pub const SECTOR_SIZE: usize = 2352;

/// The fixed 12-byte sync pattern every CD-ROM sector starts with.
pub const SYNC_PATTERN: [u8; 12] = [0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x00];

/// Offset of the 3-byte MSF address.
pub const ADDRESS_OFFSET: usize = 0x00C;
/// Offset of the mode byte.
pub const MODE_OFFSET: usize = 0x00F;

/// Offset of Mode 1 user data (2048 bytes).
pub const MODE1_DATA_OFFSET: usize = 0x010;
/// Offset of the Mode 1 EDC field (4 bytes).
pub const MODE1_EDC_OFFSET: usize = 0x810;
/// Offset of the Mode 1 reserved field (8 bytes, must be zero).
pub const MODE1_RESERVED_OFFSET: usize = 0x814;
/// Size of the Mode 1 reserved field.
pub const MODE1_RESERVED_SIZE: usize = 8;

/// Offset of the Mode 2 subheader (4 bytes).
pub const MODE2_SUBHEADER_OFFSET: usize = 0x010;
/// Offset of the Mode 2 subheader copy (4 bytes).
pub const MODE2_SUBHEADER_COPY_OFFSET: usize = 0x014;
/// Offset of Mode 2 user data, common to both forms.
pub const MODE2_DATA_OFFSET: usize = 0x018;
/// Offset of the Mode 2 Form 1 EDC field.
pub const MODE2_FORM1_EDC_OFFSET: usize = 0x818;
/// Offset of the Mode 2 Form 2 EDC field.
pub const MODE2_FORM2_EDC_OFFSET: usize = 0x92C;
/// Size of the 2336-byte Mode 2 body used when folding the image-wide EDC.
pub const MODE2_BODY_SIZE: usize = SECTOR_SIZE - 0x010;

/// The four sector layouts the codec distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectorKind {
    /// Opaque bytes that matched no recognized sector layout.
    Literal,
    /// 2352-byte Mode 1 data sector.
    Mode1,
    /// 2352-byte Mode 2 Form 1 (2048-byte payload, ECC-protected).
    Mode2Form1,
    /// 2352-byte Mode 2 Form 2 (2324-byte payload, no ECC).
    Mode2Form2,
}

impl SectorKind {
    /// The 2-bit tag stored in the type/count stream.
    pub fn tag(self) -> u8 {
        match self {
            SectorKind::Literal => 0,
            SectorKind::Mode1 => 1,
            SectorKind::Mode2Form1 => 2,
            SectorKind::Mode2Form2 => 3,
        }
    }

    /// Recover a `SectorKind` from its stream tag.
    pub fn from_tag(tag: u8) -> Option<SectorKind> {
        match tag {
            0 => Some(SectorKind::Literal),
            1 => Some(SectorKind::Mode1),
            2 => Some(SectorKind::Mode2Form1),
            3 => Some(SectorKind::Mode2Form2),
            _ => None,
        }
    }
}

/// Pack a binary value as BCD (`(v/10)<<4 | v%10`), matching the encoding
/// used throughout the CD-ROM format for MSF and track numbers.
///
/// Unlike `Bcd::from_binary` this never fails: an out-of-range minute
/// field (only reachable on pathologically large images, see DESIGN.md)
/// still produces a deterministic, if no longer meaningful, byte instead
/// of panicking mid-decode.
fn to_bcd(v: u32) -> u8 {
    ((v / 10) % 16 << 4 | (v % 10)) as u8
}

/// Compute the BCD-encoded MSF address for the sector at `ordinal` sectors
/// from the start of the image (the first data sector, ordinal 0, sits at
/// 00:02:00 per the 150-sector pregap convention).
pub fn msf_for_ordinal(ordinal: u32) -> [u8; 3] {
    let frame = ordinal + 150;

    match Msf::from_sector_index(frame) {
        Some(msf) => {
            let (m, s, f) = msf.into_bcd();
            [m.bcd(), s.bcd(), f.bcd()]
        }
        // Beyond 99 minutes (~445,500 sectors) Msf::new has nowhere left to
        // carry into; fall back to the same arithmetic without the BCD
        // range check so encoding a pathologically large image still
        // produces a deterministic address instead of panicking.
        None => {
            let m = (frame / 75) / 60;
            let s = (frame / 75) % 60;
            let f = frame % 75;
            [to_bcd(m), to_bcd(s), to_bcd(f)]
        }
    }
}

/// Write the sync pattern and mode byte shared by every reconstructed
/// sector, matching `kind`.
pub fn write_header(sector: &mut [u8; SECTOR_SIZE], kind: SectorKind) {
    sector[..12].copy_from_slice(&SYNC_PATTERN);
    sector[MODE_OFFSET] = match kind {
        SectorKind::Mode1 => 0x01,
        SectorKind::Mode2Form1 | SectorKind::Mode2Form2 => 0x02,
        SectorKind::Literal => unreachable!("literal sectors have no header"),
    };
}

/// Regenerate the EDC (and, for Mode 1 / Mode 2 Form 1, the ECC-P/Q)
/// fields of `sector` in place, per the table in §4.1. `sector` must
/// already hold sync, address, mode, subheader and user data.
pub fn generate(sector: &mut [u8; SECTOR_SIZE], kind: SectorKind) {
    match kind {
        SectorKind::Mode1 => {
            let e = edc_compute(&sector[0..MODE1_EDC_OFFSET]);
            sector[MODE1_EDC_OFFSET..MODE1_EDC_OFFSET + 4].copy_from_slice(&edc_to_bytes(e));
            sector[MODE1_RESERVED_OFFSET..MODE1_RESERVED_OFFSET + MODE1_RESERVED_SIZE].fill(0);
            ecc::generate(sector, false);
        }
        SectorKind::Mode2Form1 => {
            let e = edc_compute(&sector[MODE2_SUBHEADER_OFFSET..MODE2_FORM1_EDC_OFFSET]);
            sector[MODE2_FORM1_EDC_OFFSET..MODE2_FORM1_EDC_OFFSET + 4].copy_from_slice(&edc_to_bytes(e));
            ecc::generate(sector, true);
        }
        SectorKind::Mode2Form2 => {
            let e = edc_compute(&sector[MODE2_SUBHEADER_OFFSET..MODE2_FORM2_EDC_OFFSET]);
            sector[MODE2_FORM2_EDC_OFFSET..MODE2_FORM2_EDC_OFFSET + 4].copy_from_slice(&edc_to_bytes(e));
        }
        SectorKind::Literal => unreachable!("literal sectors have nothing to generate"),
    }
}

/// Fold the image-wide EDC range appropriate for `kind` into `running`.
///
/// Mode 1 covers the whole 2352-byte sector; both Mode 2 forms cover only
/// the 2336-byte body (sync/address/mode are not re-hashed).
pub fn fold_image_edc(running: u32, sector: &[u8; SECTOR_SIZE], kind: SectorKind) -> u32 {
    match kind {
        SectorKind::Mode1 => edc_update(running, &sector[..]),
        SectorKind::Mode2Form1 | SectorKind::Mode2Form2 => {
            edc_update(running, &sector[0x010..0x010 + MODE2_BODY_SIZE])
        }
        SectorKind::Literal => running,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn msf_matches_pregap_convention() {
        assert_eq!(msf_for_ordinal(0), [0x00, 0x02, 0x00]);
        assert_eq!(msf_for_ordinal(59), [0x00, 0x02, 0x59]);
        assert_eq!(msf_for_ordinal(10), [0x00, 0x02, 0x10]);
        assert_eq!(msf_for_ordinal(4500), [0x01, 0x02, 0x00]);
    }

    #[test]
    fn mode1_generate_then_verify() {
        let mut sector = [0u8; SECTOR_SIZE];
        write_header(&mut sector, SectorKind::Mode1);
        sector[ADDRESS_OFFSET..ADDRESS_OFFSET + 3].copy_from_slice(&msf_for_ordinal(0));
        for i in 0..2048 {
            sector[MODE1_DATA_OFFSET + i] = i as u8;
        }
        generate(&mut sector, SectorKind::Mode1);

        assert_eq!(&sector[MODE1_RESERVED_OFFSET..MODE1_RESERVED_OFFSET + 8], &[0u8; 8]);
        assert!(ecc::verify(&mut sector, false));
    }

    #[test]
    fn mode2_form1_generate_then_verify() {
        let mut sector = [0u8; SECTOR_SIZE];
        write_header(&mut sector, SectorKind::Mode2Form1);
        sector[ADDRESS_OFFSET..ADDRESS_OFFSET + 3].copy_from_slice(&msf_for_ordinal(0));
        let subheader = [0x00, 0x00, 0x08, 0x00];
        sector[MODE2_SUBHEADER_OFFSET..MODE2_SUBHEADER_OFFSET + 4].copy_from_slice(&subheader);
        sector[MODE2_SUBHEADER_COPY_OFFSET..MODE2_SUBHEADER_COPY_OFFSET + 4].copy_from_slice(&subheader);
        for i in 0..2048 {
            sector[MODE2_DATA_OFFSET + i] = ((7 * i) & 0xFF) as u8;
        }
        generate(&mut sector, SectorKind::Mode2Form1);

        assert!(ecc::verify(&mut sector, true));
    }
}
