//! ECM encoding: the two-pass batch encoder (§4.4) and the single-pass
//! streaming fallback (§4.5). Both produce the same container framing
//! and differ only in how they discover run boundaries.
//!
//! A run's `count` means different things depending on its type: for
//! Mode 1 / Mode 2 Form 1 / Mode 2 Form 2 runs it's a number of
//! 2352-byte sectors; for literal runs it's a raw byte length, since
//! literal data isn't guaranteed to be sector-aligned (the final
//! trailing chunk of a non-sector-sized image is always literal).

use std::io::{self, Read, Seek, SeekFrom, Write};

use log::{debug, trace};

use crate::classify::classify;
use crate::container::MAGIC;
use crate::edc::{edc_to_bytes, edc_update};
use crate::error::{EcmError, EcmResult};
use crate::sector::{
    fold_image_edc, SectorKind, MODE1_DATA_OFFSET, MODE2_DATA_OFFSET, MODE2_SUBHEADER_OFFSET, SECTOR_SIZE,
};
use crate::varint;

/// Per-type sector tallies, reported back to the caller (and logged at
/// `info` by the CLI front-ends) once encoding finishes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EncodeStats {
    /// Number of literal (unrecognized) sectors, not counting trailing bytes.
    pub literal: u64,
    /// Number of Mode 1 sectors.
    pub mode1: u64,
    /// Number of Mode 2 Form 1 sectors.
    pub mode2_form1: u64,
    /// Number of Mode 2 Form 2 sectors.
    pub mode2_form2: u64,
    /// Trailing bytes that didn't fill a whole sector.
    pub trailing_bytes: u64,
}

impl EncodeStats {
    fn record(&mut self, kind: SectorKind) {
        match kind {
            SectorKind::Literal => self.literal += 1,
            SectorKind::Mode1 => self.mode1 += 1,
            SectorKind::Mode2Form1 => self.mode2_form1 += 1,
            SectorKind::Mode2Form2 => self.mode2_form2 += 1,
        }
    }

    /// Total number of whole sectors seen (excludes `trailing_bytes`).
    pub fn total_sectors(&self) -> u64 {
        self.literal + self.mode1 + self.mode2_form1 + self.mode2_form2
    }
}

fn write_payload<W: Write>(out: &mut W, sector: &[u8; SECTOR_SIZE], kind: SectorKind) -> io::Result<()> {
    match kind {
        SectorKind::Literal => out.write_all(&sector[..]),
        SectorKind::Mode1 => out.write_all(&sector[MODE1_DATA_OFFSET..MODE1_DATA_OFFSET + 2048]),
        SectorKind::Mode2Form1 => {
            out.write_all(&sector[MODE2_SUBHEADER_OFFSET..MODE2_SUBHEADER_OFFSET + 4])?;
            out.write_all(&sector[MODE2_DATA_OFFSET..MODE2_DATA_OFFSET + 2048])
        }
        SectorKind::Mode2Form2 => {
            out.write_all(&sector[MODE2_SUBHEADER_OFFSET..MODE2_SUBHEADER_OFFSET + 4])?;
            out.write_all(&sector[MODE2_DATA_OFFSET..MODE2_DATA_OFFSET + 2324])
        }
    }
}

/// Read one sector-sized chunk from `input`. Returns `Ok(None)` at a
/// clean EOF, `Ok(Some(n))` with `n < SECTOR_SIZE` for a final partial
/// chunk, and `Ok(Some(SECTOR_SIZE))` for a full sector.
fn read_chunk<R: Read>(input: &mut R, buf: &mut [u8; SECTOR_SIZE]) -> io::Result<Option<usize>> {
    let mut filled = 0;
    while filled < SECTOR_SIZE {
        match input.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }

    if filled == 0 {
        Ok(None)
    } else {
        Ok(Some(filled))
    }
}

/// One coalesced run as discovered by the classifier pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Run {
    kind: SectorKind,
    /// Sectors for a recognized type, raw bytes for `Literal`.
    count: u64,
}

/// Encode `input` to the ECM container, assuming `input` supports
/// seeking: a first pass classifies every sector without buffering
/// payload data, then a second pass rewinds and writes the container in
/// one sequential sweep.
pub fn encode_batch<R: Read + Seek, W: Write>(input: &mut R, output: &mut W) -> EcmResult<EncodeStats> {
    let mut stats = EncodeStats::default();
    let mut runs: Vec<Run> = Vec::new();
    let mut buf = [0u8; SECTOR_SIZE];

    loop {
        match read_chunk(input, &mut buf)? {
            None => break,
            Some(SECTOR_SIZE) => {
                let kind = classify(&buf);
                trace!("classified sector {} as {kind:?}", stats.total_sectors());
                stats.record(kind);
                push_sector(&mut runs, kind);
            }
            Some(n) => {
                stats.trailing_bytes = n as u64;
                push_literal_bytes(&mut runs, n as u64);
                break;
            }
        }
    }

    debug!("classifier pass found {} runs", runs.len());
    input.seek(SeekFrom::Start(0))?;
    output.write_all(&MAGIC)?;

    let mut image_edc = 0u32;

    for run in &runs {
        trace!("writing run: {:?} x {}", run.kind, run.count);
        varint::write_header(output, run.kind.tag(), run.count as u32)?;

        if run.kind == SectorKind::Literal {
            let mut remaining = run.count;
            while remaining > 0 {
                let n = read_chunk(input, &mut buf)?.ok_or(EcmError::Truncated)?;
                let take = (n as u64).min(remaining) as usize;
                output.write_all(&buf[..take])?;
                image_edc = edc_update(image_edc, &buf[..take]);
                remaining -= take as u64;
            }
        } else {
            for _ in 0..run.count {
                let n = read_chunk(input, &mut buf)?.ok_or(EcmError::Truncated)?;
                if n != SECTOR_SIZE {
                    return Err(EcmError::Truncated);
                }
                write_payload(output, &buf, run.kind)?;
                image_edc = fold_image_edc(image_edc, &buf, run.kind);
            }
        }
    }

    varint::write_end(output)?;
    output.write_all(&edc_to_bytes(image_edc))?;

    Ok(stats)
}

fn push_sector(runs: &mut Vec<Run>, kind: SectorKind) {
    if kind == SectorKind::Literal {
        push_literal_bytes(runs, SECTOR_SIZE as u64);
        return;
    }

    match runs.last_mut() {
        Some(run) if run.kind == kind && run.count < varint::MAX_COUNT as u64 - 1 => run.count += 1,
        _ => runs.push(Run { kind, count: 1 }),
    }
}

fn push_literal_bytes(runs: &mut Vec<Run>, bytes: u64) {
    match runs.last_mut() {
        Some(run) if run.kind == SectorKind::Literal && run.count + bytes < varint::MAX_COUNT as u64 => {
            run.count += bytes
        }
        _ => runs.push(Run { kind: SectorKind::Literal, count: bytes }),
    }
}

/// Encode `input` to the ECM container without requiring seek support.
///
/// Unlike `encode_batch`, this never looks ahead: a recognized-type
/// sector is written out as its own `(type, 1)` record the moment it's
/// classified, so consecutive sectors of the same type each cost their
/// own header. Only literal byte spans are coalesced (and may cross a
/// sector boundary into the trailing partial chunk), since a literal
/// record's count is a byte length rather than a sector count.
pub fn encode_streaming<R: Read, W: Write>(input: &mut R, output: &mut W) -> EcmResult<EncodeStats> {
    let mut stats = EncodeStats::default();
    output.write_all(&MAGIC)?;

    let mut image_edc = 0u32;
    let mut literal_count: u64 = 0;
    let mut literal_payload: Vec<u8> = Vec::new();
    let mut buf = [0u8; SECTOR_SIZE];

    macro_rules! flush_literal {
        () => {
            if literal_count > 0 {
                trace!("flushing run: Literal x {literal_count}");
                varint::write_header(output, SectorKind::Literal.tag(), literal_count as u32)?;
                output.write_all(&literal_payload)?;
                literal_payload.clear();
                literal_count = 0;
            }
        };
    }

    loop {
        match read_chunk(input, &mut buf)? {
            None => break,
            Some(SECTOR_SIZE) => {
                let kind = classify(&buf);
                trace!("classified sector {} as {kind:?}", stats.total_sectors());
                stats.record(kind);
                image_edc = fold_image_edc(image_edc, &buf, kind);

                if kind == SectorKind::Literal {
                    if literal_count.saturating_add(SECTOR_SIZE as u64) >= varint::MAX_COUNT as u64 {
                        flush_literal!();
                    }
                    literal_count += SECTOR_SIZE as u64;
                    literal_payload.extend_from_slice(&buf[..]);
                } else {
                    flush_literal!();
                    trace!("writing sector: {kind:?} x 1");
                    varint::write_header(output, kind.tag(), 1)?;
                    write_payload(output, &buf, kind).map_err(EcmError::from)?;
                }
            }
            Some(n) => {
                stats.trailing_bytes = n as u64;
                image_edc = edc_update(image_edc, &buf[..n]);

                if literal_count + n as u64 >= varint::MAX_COUNT as u64 {
                    flush_literal!();
                }
                literal_count += n as u64;
                literal_payload.extend_from_slice(&buf[..n]);
                break;
            }
        }
    }

    debug!("streaming encode complete: {} bytes trailing", stats.trailing_bytes);
    flush_literal!();
    varint::write_end(output)?;
    output.write_all(&edc_to_bytes(image_edc))?;

    Ok(stats)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn empty_input_produces_magic_sentinel_and_zero_edc() {
        let mut input = Cursor::new(Vec::new());
        let mut output = Vec::new();
        let stats = encode_batch(&mut input, &mut output).unwrap();

        assert_eq!(stats, EncodeStats::default());
        assert_eq!(&output[..4], &MAGIC);
        assert_eq!(&output[4..9], &crate::container::SENTINEL);
        assert_eq!(&output[9..13], &[0, 0, 0, 0]);
    }

    fn mode1(ordinal: u32) -> [u8; SECTOR_SIZE] {
        let mut sector = [0u8; SECTOR_SIZE];
        crate::sector::write_header(&mut sector, SectorKind::Mode1);
        sector[crate::sector::ADDRESS_OFFSET..crate::sector::ADDRESS_OFFSET + 3]
            .copy_from_slice(&crate::sector::msf_for_ordinal(ordinal));
        crate::sector::generate(&mut sector, SectorKind::Mode1);
        sector
    }

    #[test]
    fn batch_and_streaming_decode_to_same_image() {
        let mut raw = Vec::new();
        raw.extend_from_slice(&mode1(0));
        raw.extend_from_slice(&mode1(1));
        raw.extend_from_slice(b"tail");

        let mut batch_out = Vec::new();
        let batch_stats = encode_batch(&mut Cursor::new(raw.clone()), &mut batch_out).unwrap();

        let mut stream_out = Vec::new();
        let stream_stats = encode_streaming(&mut Cursor::new(raw.clone()), &mut stream_out).unwrap();

        assert_eq!(batch_stats, stream_stats);
        assert_eq!(batch_stats.mode1, 2);
        assert_eq!(batch_stats.trailing_bytes, 4);

        // The streaming encoder doesn't batch consecutive same-type
        // sectors into one record, so its container bytes differ from the
        // batch encoder's even though both describe the same image.
        assert_ne!(batch_out, stream_out);

        let mut batch_decoded = Vec::new();
        crate::decode::decode(&mut Cursor::new(batch_out), &mut batch_decoded).unwrap();

        let mut stream_decoded = Vec::new();
        crate::decode::decode(&mut Cursor::new(stream_out), &mut stream_decoded).unwrap();

        assert_eq!(batch_decoded, raw);
        assert_eq!(stream_decoded, raw);
    }

    #[test]
    fn literal_run_merges_across_sector_boundary_into_trailing_bytes() {
        let mut raw = vec![0x11u8; SECTOR_SIZE];
        raw.extend_from_slice(b"xy");

        let mut out = Vec::new();
        let stats = encode_batch(&mut Cursor::new(raw), &mut out).unwrap();
        assert_eq!(stats.literal, 1);
        assert_eq!(stats.trailing_bytes, 2);

        // The classifier pass records one literal sector plus 2 trailing
        // bytes, but both get coalesced into a single literal run whose
        // count (in bytes) is 2352 + 2.
        let mut cursor = &out[4..];
        let (tag, count) = varint::read_header(&mut cursor).unwrap();
        assert_eq!(tag, SectorKind::Literal.tag());
        assert_eq!(count, SECTOR_SIZE as u32 + 2);
    }
}
