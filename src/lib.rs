//! Codec for the ECM ("Error Code Modeler") CD-ROM image compression
//! format: strips the reconstructible ECC/EDC redundancy out of raw
//! 2352-byte sectors and restores it losslessly on decode.

#![warn(missing_docs)]

pub mod bcd;
pub mod classify;
pub mod container;
pub mod decode;
pub mod ecc;
pub mod edc;
pub mod encode;
pub mod error;
pub mod msf;
pub mod sector;
mod tables;
pub mod varint;

pub use bcd::Bcd;
pub use classify::classify;
pub use decode::{decode, DecodeStats};
pub use encode::{encode_batch, encode_streaming, EncodeStats};
pub use error::{EcmError, EcmResult};
pub use msf::Msf;
pub use sector::{SectorKind, SECTOR_SIZE};
