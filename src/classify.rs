//! Sector type classification (§4.2): decide whether a raw 2352-byte
//! buffer is a Mode 1 sector, a Mode 2 Form 1/Form 2 sector, or neither
//! (in which case it's archived verbatim as a literal sector).
//!
//! Classification never mutates the input: it copies the candidate
//! region into a scratch buffer before handing it to `ecc::verify`,
//! which needs a `&mut` sector to zero/restore the address field.

use arrayref::array_ref;
use log::trace;

use crate::ecc;
use crate::edc::edc_compute;
use crate::sector::{
    SectorKind, MODE2_FORM1_EDC_OFFSET, MODE2_FORM2_EDC_OFFSET, MODE2_SUBHEADER_COPY_OFFSET,
    MODE2_SUBHEADER_OFFSET, MODE_OFFSET, SECTOR_SIZE, SYNC_PATTERN,
};

/// Inspect `sector` and return the most specific `SectorKind` it matches.
///
/// Order matters: a buffer is classified as Mode 1 before Mode 2 is even
/// considered, and Mode 2 Form 1 is checked before falling back to Form
/// 2, since Form 1's stronger EDC+ECC check is less likely to pass by
/// chance than Form 2's EDC-only check.
pub fn classify(sector: &[u8; SECTOR_SIZE]) -> SectorKind {
    if sector[..12] != SYNC_PATTERN {
        trace!("no sync pattern, classifying as literal");
        return SectorKind::Literal;
    }

    let kind = match sector[MODE_OFFSET] {
        0x01 => {
            if is_mode1(sector) {
                SectorKind::Mode1
            } else {
                SectorKind::Literal
            }
        }
        0x02 => {
            if is_mode2_form1(sector) {
                SectorKind::Mode2Form1
            } else if is_mode2_form2(sector) {
                SectorKind::Mode2Form2
            } else {
                SectorKind::Literal
            }
        }
        _ => SectorKind::Literal,
    };

    trace!("mode byte 0x{:02x} -> {kind:?}", sector[MODE_OFFSET]);
    kind
}

fn is_mode1(sector: &[u8; SECTOR_SIZE]) -> bool {
    use crate::sector::{MODE1_EDC_OFFSET, MODE1_RESERVED_OFFSET, MODE1_RESERVED_SIZE};

    if sector[MODE1_RESERVED_OFFSET..MODE1_RESERVED_OFFSET + MODE1_RESERVED_SIZE] != [0u8; 8] {
        return false;
    }

    let expected = edc_compute(&sector[0..MODE1_EDC_OFFSET]);
    let actual = u32::from_le_bytes(*array_ref![sector, MODE1_EDC_OFFSET, 4]);
    if expected != actual {
        return false;
    }

    let mut scratch = *sector;
    ecc::verify(&mut scratch, false)
}

fn is_mode2_form1(sector: &[u8; SECTOR_SIZE]) -> bool {
    if sector[MODE2_SUBHEADER_OFFSET..MODE2_SUBHEADER_OFFSET + 4]
        != sector[MODE2_SUBHEADER_COPY_OFFSET..MODE2_SUBHEADER_COPY_OFFSET + 4]
    {
        return false;
    }

    let expected = edc_compute(&sector[MODE2_SUBHEADER_OFFSET..MODE2_FORM1_EDC_OFFSET]);
    let actual = u32::from_le_bytes(*array_ref![sector, MODE2_FORM1_EDC_OFFSET, 4]);
    if expected != actual {
        return false;
    }

    let mut scratch = *sector;
    ecc::verify(&mut scratch, true)
}

fn is_mode2_form2(sector: &[u8; SECTOR_SIZE]) -> bool {
    if sector[MODE2_SUBHEADER_OFFSET..MODE2_SUBHEADER_OFFSET + 4]
        != sector[MODE2_SUBHEADER_COPY_OFFSET..MODE2_SUBHEADER_COPY_OFFSET + 4]
    {
        return false;
    }

    let expected = edc_compute(&sector[MODE2_SUBHEADER_OFFSET..MODE2_FORM2_EDC_OFFSET]);
    let actual = u32::from_le_bytes(*array_ref![sector, MODE2_FORM2_EDC_OFFSET, 4]);
    expected == actual
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sector::{generate, write_header, ADDRESS_OFFSET, MODE1_DATA_OFFSET, MODE2_DATA_OFFSET};

    fn mode1_sector() -> [u8; SECTOR_SIZE] {
        let mut sector = [0u8; SECTOR_SIZE];
        write_header(&mut sector, SectorKind::Mode1);
        sector[ADDRESS_OFFSET..ADDRESS_OFFSET + 3].copy_from_slice(&crate::sector::msf_for_ordinal(3));
        for i in 0..2048 {
            sector[MODE1_DATA_OFFSET + i] = (i * 3) as u8;
        }
        generate(&mut sector, SectorKind::Mode1);
        sector
    }

    fn mode2_form1_sector() -> [u8; SECTOR_SIZE] {
        let mut sector = [0u8; SECTOR_SIZE];
        write_header(&mut sector, SectorKind::Mode2Form1);
        sector[ADDRESS_OFFSET..ADDRESS_OFFSET + 3].copy_from_slice(&crate::sector::msf_for_ordinal(3));
        let subheader = [1, 0, 0x08, 0];
        sector[MODE2_SUBHEADER_OFFSET..MODE2_SUBHEADER_OFFSET + 4].copy_from_slice(&subheader);
        sector[MODE2_SUBHEADER_COPY_OFFSET..MODE2_SUBHEADER_COPY_OFFSET + 4].copy_from_slice(&subheader);
        for i in 0..2048 {
            sector[MODE2_DATA_OFFSET + i] = (i * 5) as u8;
        }
        generate(&mut sector, SectorKind::Mode2Form1);
        sector
    }

    fn mode2_form2_sector() -> [u8; SECTOR_SIZE] {
        let mut sector = [0u8; SECTOR_SIZE];
        write_header(&mut sector, SectorKind::Mode2Form2);
        sector[ADDRESS_OFFSET..ADDRESS_OFFSET + 3].copy_from_slice(&crate::sector::msf_for_ordinal(3));
        let subheader = [1, 0, 0x28, 0];
        sector[MODE2_SUBHEADER_OFFSET..MODE2_SUBHEADER_OFFSET + 4].copy_from_slice(&subheader);
        sector[MODE2_SUBHEADER_COPY_OFFSET..MODE2_SUBHEADER_COPY_OFFSET + 4].copy_from_slice(&subheader);
        for i in 0..2324 {
            sector[MODE2_DATA_OFFSET + i] = (i * 7) as u8;
        }
        generate(&mut sector, SectorKind::Mode2Form2);
        sector
    }

    #[test]
    fn classifies_mode1() {
        assert_eq!(classify(&mode1_sector()), SectorKind::Mode1);
    }

    #[test]
    fn classifies_mode2_form1() {
        assert_eq!(classify(&mode2_form1_sector()), SectorKind::Mode2Form1);
    }

    #[test]
    fn classifies_mode2_form2() {
        assert_eq!(classify(&mode2_form2_sector()), SectorKind::Mode2Form2);
    }

    #[test]
    fn corrupt_mode1_falls_back_to_literal() {
        let mut sector = mode1_sector();
        sector[MODE1_DATA_OFFSET] ^= 0xFF;
        assert_eq!(classify(&sector), SectorKind::Literal);
    }

    #[test]
    fn non_sync_buffer_is_literal() {
        let sector = [0x42u8; SECTOR_SIZE];
        assert_eq!(classify(&sector), SectorKind::Literal);
    }
}
