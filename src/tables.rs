//! Lookup tables shared by the EDC and Reed-Solomon ECC engines.
//!
//! Built once per process behind a `OnceLock` and never mutated afterwards,
//! so concurrent callers from independent jobs never observe a half-built
//! table (see the concurrency notes in the crate's top-level docs).

use std::sync::OnceLock;

/// The three 256-entry tables used by the ECC/EDC primitives.
pub struct EccTables {
    /// GF(2^8) "forward" multiplication table for the 0x11D generator.
    pub ecc_f: [u8; 256],
    /// Inverse of `ecc_f`, indexed by `i ^ ecc_f[i]`.
    pub ecc_b: [u8; 256],
    /// EDC polynomial table (reflected CRC-32/CD-ROM-EDC style, poly 0xD8018001).
    pub edc: [u32; 256],
}

impl EccTables {
    fn build() -> EccTables {
        let mut ecc_f = [0u8; 256];
        let mut ecc_b = [0u8; 256];
        let mut edc = [0u32; 256];

        for i in 0..256u32 {
            let j = (i << 1) ^ if i & 0x80 != 0 { 0x11D } else { 0 };
            ecc_f[i as usize] = j as u8;
            ecc_b[(i ^ j) as usize & 0xFF] = i as u8;

            let mut e = i;
            for _ in 0..8 {
                e = (e >> 1) ^ if e & 1 != 0 { 0xD801_8001 } else { 0 };
            }
            edc[i as usize] = e;
        }

        EccTables { ecc_f, ecc_b, edc }
    }
}

static TABLES: OnceLock<EccTables> = OnceLock::new();

/// Return the process-wide lookup tables, building them on first use.
pub fn tables() -> &'static EccTables {
    TABLES.get_or_init(EccTables::build)
}

#[cfg(test)]
mod test {
    use super::tables;

    #[test]
    fn ecc_f_b_are_inverses() {
        let t = tables();
        for i in 0..256usize {
            let j = t.ecc_f[i];
            assert_eq!(t.ecc_b[i ^ j as usize], i as u8);
        }
    }

    #[test]
    fn edc_table_zero_is_zero() {
        assert_eq!(tables().edc[0], 0);
    }
}
