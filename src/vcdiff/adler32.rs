// Adler-32 checksum (RFC 1950), used to verify a decoded target window.
//
// Feature `adler32` dispatches to `simd-adler32`'s runtime-selected SIMD
// kernels; without it, a portable scalar implementation is used. Both must
// agree bit-for-bit — the scalar path is also what the test suite checks
// against the RFC's modulus arithmetic directly.

/// Compute the Adler-32 checksum of `data`.
pub fn compute(data: &[u8]) -> u32 {
    #[cfg(feature = "adler32")]
    {
        use simd_adler32::Adler32;
        let mut hasher = Adler32::new();
        hasher.write(data);
        hasher.finish()
    }
    #[cfg(not(feature = "adler32"))]
    {
        compute_scalar(data)
    }
}

/// Portable scalar Adler-32, matching RFC 1950 exactly.
#[cfg_attr(feature = "adler32", allow(dead_code))]
fn compute_scalar(data: &[u8]) -> u32 {
    const MOD_ADLER: u32 = 65521;
    let mut a: u32 = 1;
    let mut b: u32 = 0;
    for &byte in data {
        a = (a + u32::from(byte)) % MOD_ADLER;
        b = (b + a) % MOD_ADLER;
    }
    (b << 16) | a
}

#[cfg(test)]
mod tests {
    use super::*;

    // Conformance vectors: these must hold regardless of which backend
    // `compute` dispatches to.
    #[test]
    fn conformance_vectors() {
        let cases: &[(&[u8], u32)] = &[
            (&[0x00, 0x00], 0x0002_0001),
            (&[0x00, 0x00, 0x00, 0x00], 0x0004_0001),
            (&[0x01, 0x02, 0x03, 0x04], 0x0018_000B),
            (&[0x01; 8], 0x002C_0009),
            (
                &[
                    0xD6, 0xC3, 0xC4, 0x00, 0x04, 0x14, 0x74, 0x65, 0x73, 0x74, 0x32, 0x2E, 0x74,
                    0x78, 0x74, 0x2F,
                ],
                0x39DB_0625,
            ),
            (&[0xFF, 0xFF, 0xFF], 0x05FD_02FE),
            (&[0xFF; 18], 0xAA67_11EF),
            (
                &[
                    0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xAA, 0xBB, 0xCC,
                    0xDD, 0xEE, 0xFF,
                ],
                0x2D38_07F9,
            ),
        ];

        for (input, expected) in cases {
            assert_eq!(compute_scalar(input), *expected, "input {input:02X?}");
            assert_eq!(compute(input), *expected, "input {input:02X?}");
        }
    }

    #[test]
    fn empty_input() {
        assert_eq!(compute(&[]), 1);
    }
}
