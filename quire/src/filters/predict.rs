//! PNG-style predictor post-filter shared by Flate and LZW, plus the TIFF
//! byte differencer (predictor 2).

use super::LzwFlateParams;
use crate::error::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PredictorKind {
    None = 0,
    Sub = 1,
    Up = 2,
    Avg = 3,
    Paeth = 4,
}

impl PredictorKind {
    pub fn from_u8(n: u8) -> Result<PredictorKind> {
        match n {
            0 => Ok(PredictorKind::None),
            1 => Ok(PredictorKind::Sub),
            2 => Ok(PredictorKind::Up),
            3 => Ok(PredictorKind::Avg),
            4 => Ok(PredictorKind::Paeth),
            n => Err(PdfError::Predictor { predictor: n as i64 }),
        }
    }
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let ia = a as i16;
    let ib = b as i16;
    let ic = c as i16;
    let p = ia + ib - ic;
    let pa = (p - ia).abs();
    let pb = (p - ib).abs();
    let pc = (p - ic).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

/// Reverse one row of PNG filtering.
pub fn unfilter_row(kind: PredictorKind, bpp: usize, prev: &[u8], inp: &[u8], out: &mut [u8]) {
    use PredictorKind::*;
    let len = inp.len();
    debug_assert_eq!(len, out.len());
    debug_assert_eq!(len, prev.len());

    match kind {
        None => out[..len].copy_from_slice(&inp[..len]),
        Sub => {
            out[..bpp.min(len)].copy_from_slice(&inp[..bpp.min(len)]);
            for i in bpp..len {
                out[i] = inp[i].wrapping_add(out[i - bpp]);
            }
        }
        Up => {
            for i in 0..len {
                out[i] = inp[i].wrapping_add(prev[i]);
            }
        }
        Avg => {
            for i in 0..bpp.min(len) {
                out[i] = inp[i].wrapping_add(prev[i] / 2);
            }
            for i in bpp..len {
                out[i] = inp[i].wrapping_add(((out[i - bpp] as u16 + prev[i] as u16) / 2) as u8);
            }
        }
        Paeth => {
            for i in 0..bpp.min(len) {
                out[i] = inp[i].wrapping_add(paeth(0, prev[i], 0));
            }
            for i in bpp..len {
                out[i] = inp[i].wrapping_add(paeth(out[i - bpp], prev[i], prev[i - bpp]));
            }
        }
    }
}

/// Apply one row of PNG filtering in place.
pub fn apply_row_predictor(kind: PredictorKind, bpp: usize, prev: &[u8], row: &mut [u8]) {
    use PredictorKind::*;
    let len = row.len();
    match kind {
        None => {}
        Sub => {
            for i in (bpp..len).rev() {
                row[i] = row[i].wrapping_sub(row[i - bpp]);
            }
        }
        Up => {
            for i in 0..len {
                row[i] = row[i].wrapping_sub(prev[i]);
            }
        }
        Avg => {
            for i in (bpp..len).rev() {
                row[i] = row[i].wrapping_sub(((row[i - bpp] as u16 + prev[i] as u16) / 2) as u8);
            }
            for i in 0..bpp.min(len) {
                row[i] = row[i].wrapping_sub(prev[i] / 2);
            }
        }
        Paeth => {
            for i in (bpp..len).rev() {
                row[i] = row[i].wrapping_sub(paeth(row[i - bpp], prev[i], prev[i - bpp]));
            }
            for i in 0..bpp.min(len) {
                row[i] = row[i].wrapping_sub(paeth(0, prev[i], 0));
            }
        }
    }
}

/// Post-filter pass after inflate: reverse the predictor named in the
/// parameter dictionary. Predictor 1 is the identity, 2 is TIFF horizontal
/// differencing, 10..=14 are the PNG row filters (each row carries its own
/// filter byte).
pub fn undo_predictor(data: Vec<u8>, params: &LzwFlateParams) -> Result<Vec<u8>> {
    let predictor = params.predictor;
    match predictor {
        1 => Ok(data),
        2 => {
            if params.bits_per_component != 8 {
                err!(PdfError::Filter {
                    filter: "FlateDecode",
                    msg: "TIFF predictor requires 8 bits per component".into(),
                });
            }
            let bpp = params.colors.max(1) as usize;
            let stride = params.columns.max(1) as usize * bpp;
            let mut data = data;
            for row in data.chunks_mut(stride) {
                for i in bpp..row.len() {
                    row[i] = row[i].wrapping_add(row[i - bpp]);
                }
            }
            Ok(data)
        }
        10..=15 => {
            let bpp = ((params.colors.max(1) * params.bits_per_component.max(1) + 7) / 8) as usize;
            let stride = ((params.columns.max(1)
                * params.colors.max(1)
                * params.bits_per_component.max(1)
                + 7)
                / 8) as usize;
            let rows = data.len() / (stride + 1);
            let mut out = vec![0; rows * stride];
            let zero_row = vec![0; stride];

            let mut in_off = 0;
            let mut out_off = 0;
            while in_off + stride < data.len() {
                let kind = PredictorKind::from_u8(data[in_off])?;
                in_off += 1;
                let row_in = &data[in_off..in_off + stride];
                let (prev_row, row_out) = if out_off == 0 {
                    (&zero_row[..], &mut out[..stride])
                } else {
                    let (prev, curr) = out.split_at_mut(out_off);
                    (&prev[out_off - stride..], &mut curr[..stride])
                };
                unfilter_row(kind, bpp, prev_row, row_in, row_out);
                in_off += stride;
                out_off += stride;
            }
            Ok(out)
        }
        p => Err(PdfError::Predictor { predictor: p }),
    }
}

/// Forward pass used when writing predictor-coded data (the xref stream
/// writer uses `Up` rows).
pub fn apply_predictor(
    data: &[u8],
    params: &LzwFlateParams,
    per_row: impl Fn(usize) -> PredictorKind,
) -> Result<Vec<u8>> {
    if params.predictor < 10 {
        return Ok(data.to_vec());
    }
    let bpp = ((params.colors.max(1) * params.bits_per_component.max(1) + 7) / 8) as usize;
    let stride = ((params.columns.max(1) * params.colors.max(1) * params.bits_per_component.max(1)
        + 7)
        / 8) as usize;
    if stride == 0 || data.len() % stride != 0 {
        err!(PdfError::Filter {
            filter: "FlateDecode",
            msg: "data length is not a whole number of rows".into(),
        });
    }
    let rows = data.len() / stride;
    let mut out = Vec::with_capacity(rows * (stride + 1));
    let zero_row = vec![0; stride];
    let mut prev: &[u8] = &zero_row;
    let mut scratch = vec![0u8; stride];
    for r in 0..rows {
        let kind = per_row(r);
        let row = &data[r * stride..(r + 1) * stride];
        scratch.copy_from_slice(row);
        apply_row_predictor(kind, bpp, prev, &mut scratch);
        out.push(kind as u8);
        out.extend_from_slice(&scratch);
        prev = &data[r * stride..(r + 1) * stride];
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(predictor: i64, columns: i64, colors: i64) -> LzwFlateParams {
        LzwFlateParams {
            predictor,
            colors,
            bits_per_component: 8,
            columns,
            early_change: 1,
        }
    }

    #[test]
    fn png_round_trip_every_filter() {
        let data: Vec<u8> = (0u8..=255).cycle().take(4 * 16 * 3).collect();
        for predictor in 10..=14 {
            let p = params(predictor, 16, 3);
            let kind = PredictorKind::from_u8((predictor - 10) as u8).unwrap();
            let filtered = apply_predictor(&data, &p, |_| kind).unwrap();
            let restored = undo_predictor(filtered, &p).unwrap();
            assert_eq!(restored, data, "predictor {}", predictor);
        }
    }

    #[test]
    fn png_round_trip_mixed_rows() {
        let data: Vec<u8> = (0u8..=255).cycle().take(8 * 10 * 2).collect();
        let p = params(15, 10, 2);
        let filtered = apply_predictor(&data, &p, |row| {
            PredictorKind::from_u8((row % 5) as u8).unwrap()
        })
        .unwrap();
        let restored = undo_predictor(filtered, &p).unwrap();
        assert_eq!(restored, data);
    }

    #[test]
    fn tiff_differencing() {
        let p = params(2, 4, 1);
        let restored = undo_predictor(vec![10, 1, 1, 1, 20, 2, 2, 2], &p).unwrap();
        assert_eq!(restored, vec![10, 11, 12, 13, 20, 22, 24, 26]);
    }
}
