//! ECM decoding (§4.6): reconstruct the original raw image from a `.ecm`
//! container, regenerating the fields that encoding stripped out and
//! verifying the trailing image-wide EDC.

use std::io::{Read, Write};

use log::{debug, trace, warn};

use crate::container::MAGIC;
use crate::edc::edc_update;
use crate::error::{EcmError, EcmResult};
use crate::sector::{
    self, fold_image_edc, SectorKind, MODE1_DATA_OFFSET, MODE2_DATA_OFFSET, MODE2_SUBHEADER_COPY_OFFSET,
    MODE2_SUBHEADER_OFFSET, SECTOR_SIZE,
};
use crate::varint::{self, HeaderOrEnd};

/// Which sector types were present in a decoded image, used by the
/// `unecm` front-end to decide what kind of `.cue` sheet (if any) to
/// emit alongside the reconstructed image.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DecodeStats {
    /// At least one literal (opaque) run was present.
    pub saw_literal: bool,
    /// At least one Mode 1 sector was present.
    pub saw_mode1: bool,
    /// At least one Mode 2 Form 1 sector was present.
    pub saw_mode2_form1: bool,
    /// At least one Mode 2 Form 2 sector was present.
    pub saw_mode2_form2: bool,
    /// Total number of bytes written to the output image.
    pub output_bytes: u64,
}

impl DecodeStats {
    fn record(&mut self, kind: SectorKind) {
        match kind {
            SectorKind::Literal => self.saw_literal = true,
            SectorKind::Mode1 => self.saw_mode1 = true,
            SectorKind::Mode2Form1 => self.saw_mode2_form1 = true,
            SectorKind::Mode2Form2 => self.saw_mode2_form2 = true,
        }
    }

    /// True if every recognized sector was Mode 1 (the common case for a
    /// plain data CD, where a `MODE1/2352` cue sheet is unambiguous).
    pub fn mode1_only(&self) -> bool {
        self.saw_mode1 && !self.saw_mode2_form1 && !self.saw_mode2_form2
    }
}

fn read_exact_or_truncated<R: Read>(input: &mut R, buf: &mut [u8]) -> EcmResult<()> {
    input.read_exact(buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            EcmError::Truncated
        } else {
            EcmError::Io(e)
        }
    })
}

/// Reconstruct one sector of `kind` at `ordinal` sectors from the start
/// of the image, reading its stored payload from `input`.
fn reconstruct_sector<R: Read>(input: &mut R, ordinal: u32, kind: SectorKind) -> EcmResult<[u8; SECTOR_SIZE]> {
    let mut sector = [0u8; SECTOR_SIZE];

    match kind {
        SectorKind::Mode1 => {
            sector::write_header(&mut sector, kind);
            sector[sector::ADDRESS_OFFSET..sector::ADDRESS_OFFSET + 3]
                .copy_from_slice(&sector::msf_for_ordinal(ordinal));
            read_exact_or_truncated(input, &mut sector[MODE1_DATA_OFFSET..MODE1_DATA_OFFSET + 2048])?;
            sector::generate(&mut sector, kind);
        }
        SectorKind::Mode2Form1 | SectorKind::Mode2Form2 => {
            sector::write_header(&mut sector, kind);
            sector[sector::ADDRESS_OFFSET..sector::ADDRESS_OFFSET + 3]
                .copy_from_slice(&sector::msf_for_ordinal(ordinal));

            read_exact_or_truncated(input, &mut sector[MODE2_SUBHEADER_OFFSET..MODE2_SUBHEADER_OFFSET + 4])?;
            sector.copy_within(MODE2_SUBHEADER_OFFSET..MODE2_SUBHEADER_OFFSET + 4, MODE2_SUBHEADER_COPY_OFFSET);

            let data_len = if kind == SectorKind::Mode2Form1 { 2048 } else { 2324 };
            read_exact_or_truncated(input, &mut sector[MODE2_DATA_OFFSET..MODE2_DATA_OFFSET + data_len])?;
            sector::generate(&mut sector, kind);
        }
        SectorKind::Literal => unreachable!("literal sectors are copied verbatim, not reconstructed"),
    }

    Ok(sector)
}

/// Decode a `.ecm` container from `input`, writing the reconstructed
/// image to `output` and verifying the trailing image-wide EDC.
pub fn decode<R: Read, W: Write>(input: &mut R, output: &mut W) -> EcmResult<DecodeStats> {
    let mut magic = [0u8; 4];
    read_exact_or_truncated(input, &mut magic)?;
    if magic != MAGIC {
        warn!("input is missing the ECM magic header");
        return Err(EcmError::BadMagic);
    }

    let mut stats = DecodeStats::default();
    let mut image_edc = 0u32;
    let mut ordinal: u32 = 0;
    let mut literal_buf = vec![0u8; SECTOR_SIZE];

    loop {
        match varint::read_header_or_end(input)? {
            HeaderOrEnd::End => break,
            HeaderOrEnd::Header(tag, count) => {
                let kind = SectorKind::from_tag(tag).ok_or_else(|| {
                    warn!("record header carries unknown type tag {tag}");
                    EcmError::Corrupt("unknown sector type tag")
                })?;
                trace!("run boundary: {kind:?} x {count}");
                stats.record(kind);

                if kind == SectorKind::Literal {
                    let mut remaining = count as u64;
                    while remaining > 0 {
                        let take = remaining.min(SECTOR_SIZE as u64) as usize;
                        read_exact_or_truncated(input, &mut literal_buf[..take])?;
                        output.write_all(&literal_buf[..take])?;
                        image_edc = edc_update(image_edc, &literal_buf[..take]);
                        stats.output_bytes += take as u64;
                        remaining -= take as u64;
                    }
                } else {
                    for _ in 0..count {
                        let sector = reconstruct_sector(input, ordinal, kind)?;
                        output.write_all(&sector)?;
                        image_edc = fold_image_edc(image_edc, &sector, kind);
                        stats.output_bytes += SECTOR_SIZE as u64;
                        ordinal += 1;
                    }
                }
            }
        }
    }

    let mut trailer = [0u8; 4];
    read_exact_or_truncated(input, &mut trailer)?;
    let expected = u32::from_le_bytes(trailer);

    if expected != image_edc {
        warn!("image EDC mismatch: expected {expected:#010x}, computed {image_edc:#010x}");
        return Err(EcmError::EdcMismatch { expected, actual: image_edc });
    }

    debug!("decoded {} bytes across {} sectors", stats.output_bytes, ordinal);
    Ok(stats)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::encode::encode_batch;
    use std::io::Cursor;

    #[test]
    fn rejects_bad_magic() {
        let mut input = Cursor::new(vec![1, 2, 3, 4, 0, 0, 0, 0]);
        let mut output = Vec::new();
        assert!(matches!(decode(&mut input, &mut output), Err(EcmError::BadMagic)));
    }

    #[test]
    fn round_trips_mixed_image() {
        let mut raw = Vec::new();

        let mut mode1 = [0u8; SECTOR_SIZE];
        sector::write_header(&mut mode1, SectorKind::Mode1);
        mode1[sector::ADDRESS_OFFSET..sector::ADDRESS_OFFSET + 3].copy_from_slice(&sector::msf_for_ordinal(0));
        for i in 0..2048 {
            mode1[MODE1_DATA_OFFSET + i] = (i * 3) as u8;
        }
        sector::generate(&mut mode1, SectorKind::Mode1);
        raw.extend_from_slice(&mode1);

        let mut form1 = [0u8; SECTOR_SIZE];
        sector::write_header(&mut form1, SectorKind::Mode2Form1);
        form1[sector::ADDRESS_OFFSET..sector::ADDRESS_OFFSET + 3].copy_from_slice(&sector::msf_for_ordinal(1));
        let subheader = [2, 0, 0x08, 0];
        form1[MODE2_SUBHEADER_OFFSET..MODE2_SUBHEADER_OFFSET + 4].copy_from_slice(&subheader);
        form1[MODE2_SUBHEADER_COPY_OFFSET..MODE2_SUBHEADER_COPY_OFFSET + 4].copy_from_slice(&subheader);
        for i in 0..2048 {
            form1[MODE2_DATA_OFFSET + i] = (i * 5) as u8;
        }
        sector::generate(&mut form1, SectorKind::Mode2Form1);
        raw.extend_from_slice(&form1);

        raw.extend_from_slice(b"trailer!");

        let mut ecm = Vec::new();
        encode_batch(&mut Cursor::new(raw.clone()), &mut ecm).unwrap();

        let mut decoded = Vec::new();
        let stats = decode(&mut Cursor::new(ecm), &mut decoded).unwrap();

        assert_eq!(decoded, raw);
        assert!(stats.saw_mode1);
        assert!(stats.saw_mode2_form1);
        assert!(stats.saw_literal);
        assert!(!stats.mode1_only());
    }

    #[test]
    fn corrupted_trailer_is_rejected() {
        let raw = vec![0x55u8; SECTOR_SIZE];
        let mut ecm = Vec::new();
        encode_batch(&mut Cursor::new(raw), &mut ecm).unwrap();

        let last = ecm.len() - 1;
        ecm[last] ^= 0xFF;

        let mut decoded = Vec::new();
        assert!(matches!(
            decode(&mut Cursor::new(ecm), &mut decoded),
            Err(EcmError::EdcMismatch { .. })
        ));
    }
}
