//! Function objects and the lookup-table interpolation the color machinery
//! plugs into. Color transform math itself lives with external
//! collaborators; what they need from us is the sampled data and a correct
//! multilinear interpolator.

use crate as quire;
use crate::error::*;
use crate::object::*;
use crate::primitive::{Dict, Primitive};

/// A color lookup table: an n-dimensional grid of output tuples with
/// multilinear interpolation between the corners.
#[derive(Debug, Clone)]
pub struct Clut {
    /// Number of grid points per input dimension.
    dims: Vec<usize>,
    n_out: usize,
    /// Samples with the last input dimension varying fastest, each grid
    /// point contributing `n_out` consecutive values.
    samples: Vec<f32>,
}

impl Clut {
    pub fn new(dims: Vec<usize>, n_out: usize, samples: Vec<f32>) -> Result<Clut> {
        let points: usize = dims.iter().product();
        if dims.is_empty() || n_out == 0 || points.checked_mul(n_out) != Some(samples.len()) {
            bail!(
                "lookup table size mismatch: {:?} x {} vs {} samples",
                dims,
                n_out,
                samples.len()
            );
        }
        if dims.iter().any(|&d| d < 2) {
            bail!("each grid dimension needs at least two points");
        }
        Ok(Clut {
            dims,
            n_out,
            samples,
        })
    }

    pub fn input_dim(&self) -> usize {
        self.dims.len()
    }
    pub fn output_dim(&self) -> usize {
        self.n_out
    }

    fn grid_value(&self, index: &[usize], out_component: usize) -> f32 {
        let mut offset = 0;
        for (i, &dim) in self.dims.iter().enumerate() {
            offset = offset * dim + index[i];
        }
        self.samples[offset * self.n_out + out_component]
    }

    /// Multilinear interpolation at `at`, each coordinate in `0.0..=1.0`
    /// spanning its grid axis. For three inputs this is the tri-linear
    /// blend of the surrounding 8 corners.
    pub fn sample(&self, at: &[f32], out: &mut [f32]) -> Result<()> {
        if at.len() != self.dims.len() || out.len() != self.n_out {
            bail!(
                "interpolation arity mismatch: {} in / {} out",
                at.len(),
                out.len()
            );
        }
        let n = self.dims.len();
        // cell origin and fractional position per axis
        let mut base = Vec::with_capacity(n);
        let mut frac = Vec::with_capacity(n);
        for (&x, &dim) in at.iter().zip(&self.dims) {
            let scaled = x.clamp(0.0, 1.0) * (dim - 1) as f32;
            let cell = (scaled.floor() as usize).min(dim - 2);
            base.push(cell);
            frac.push(scaled - cell as f32);
        }

        out.iter_mut().for_each(|o| *o = 0.0);
        let mut index = vec![0; n];
        for corner in 0..1usize << n {
            let mut weight = 1.0;
            for axis in 0..n {
                if corner & 1 << axis != 0 {
                    index[axis] = base[axis] + 1;
                    weight *= frac[axis];
                } else {
                    index[axis] = base[axis];
                    weight *= 1.0 - frac[axis];
                }
            }
            if weight == 0.0 {
                continue;
            }
            for (component, o) in out.iter_mut().enumerate() {
                *o += weight * self.grid_value(&index, component);
            }
        }
        Ok(())
    }
}

#[derive(Object, ObjectWrite, Debug, Clone)]
pub struct RawFunction {
    #[pdf(key = "FunctionType")]
    pub function_type: i64,

    #[pdf(key = "Domain")]
    pub domain: Vec<f32>,

    #[pdf(key = "Range")]
    pub range: Option<Vec<f32>>,

    #[pdf(other)]
    pub other: Dict,
}

#[derive(Object, ObjectWrite, Debug, Clone)]
struct ExponentialDict {
    #[pdf(key = "C0")]
    c0: Option<Vec<f32>>,

    #[pdf(key = "C1")]
    c1: Option<Vec<f32>>,

    #[pdf(key = "N")]
    exponent: f32,
}

#[derive(Object, ObjectWrite, Debug, Clone)]
struct SampledDict {
    #[pdf(key = "Size")]
    size: Vec<i64>,

    #[pdf(key = "BitsPerSample")]
    bits_per_sample: i64,

    #[pdf(key = "Encode")]
    encode: Option<Vec<f32>>,

    #[pdf(key = "Decode")]
    decode: Option<Vec<f32>>,
}

#[derive(Debug, Clone)]
pub struct SampledFunction {
    pub domain: Vec<f32>,
    pub range: Vec<f32>,
    pub clut: Clut,
}

impl SampledFunction {
    pub fn apply(&self, x: &[f32], out: &mut [f32]) -> Result<()> {
        let mut at = Vec::with_capacity(x.len());
        for (i, &v) in x.iter().enumerate() {
            let (lo, hi) = (self.domain[2 * i], self.domain[2 * i + 1]);
            at.push(if hi > lo { (v - lo) / (hi - lo) } else { 0.0 });
        }
        self.clut.sample(&at, out)
    }
}

#[derive(Debug, Clone)]
pub struct InterpolatedFunctionDim {
    pub input_range: (f32, f32),
    pub output_range: (f32, f32),
    pub c0: f32,
    pub c1: f32,
    pub exponent: f32,
}

impl InterpolatedFunctionDim {
    pub fn apply(&self, x: f32) -> f32 {
        let (x0, x1) = self.input_range;
        let t = if x1 > x0 { (x - x0) / (x1 - x0) } else { 0.0 };
        let y = self.c0 + t.powf(self.exponent) * (self.c1 - self.c0);
        let (lo, hi) = self.output_range;
        y.clamp(lo, hi)
    }
}

#[derive(Debug, Clone)]
pub enum Function {
    Sampled(SampledFunction),
    Interpolated(Vec<InterpolatedFunctionDim>),
    Stitching {
        domain: (f32, f32),
        functions: Vec<Function>,
        bounds: Vec<f32>,
        encode: Vec<f32>,
    },
}

impl Function {
    pub fn apply(&self, x: &[f32], out: &mut [f32]) -> Result<()> {
        match *self {
            Function::Sampled(ref f) => f.apply(x, out),
            Function::Interpolated(ref parts) => {
                if parts.len() != out.len() {
                    bail!(
                        "incorrect output length: expected {}, found {}",
                        parts.len(),
                        out.len()
                    );
                }
                for (f, y) in parts.iter().zip(out) {
                    *y = f.apply(x[0]);
                }
                Ok(())
            }
            Function::Stitching {
                domain,
                ref functions,
                ref bounds,
                ref encode,
            } => {
                let x0 = x[0].clamp(domain.0, domain.1);
                let k = bounds.iter().take_while(|&&b| x0 >= b).count();
                let (lo, hi) = (
                    if k == 0 { domain.0 } else { bounds[k - 1] },
                    *bounds.get(k).unwrap_or(&domain.1),
                );
                let (e0, e1) = (encode[2 * k], encode[2 * k + 1]);
                let t = if hi > lo {
                    e0 + (x0 - lo) / (hi - lo) * (e1 - e0)
                } else {
                    e0
                };
                functions[k].apply(&[t], out)
            }
        }
    }
}

impl Object for Function {
    fn from_primitive(p: Primitive, resolve: &impl Resolve) -> Result<Self> {
        match p {
            Primitive::Reference(r) => Self::from_primitive(resolve.resolve(r)?, resolve),
            Primitive::Dictionary(dict) => {
                let raw = RawFunction::from_primitive(Primitive::Dictionary(dict), resolve)?;
                from_raw_dict(raw, resolve)
            }
            p @ Primitive::Stream(_) => {
                let stream = Stream::<RawFunction>::from_primitive(p, resolve)?;
                match stream.info.function_type {
                    0 => {
                        let raw = stream.info.clone();
                        let params = SampledDict::from_primitive(
                            Primitive::Dictionary(raw.other.clone()),
                            resolve,
                        )?;
                        let data = stream.data(resolve)?;
                        sampled_from_bits(raw, params, &data)
                    }
                    ty => bail!("unsupported function stream type {}", ty),
                }
            }
            p => unexpected_primitive!(Dictionary, p.get_debug_name()),
        }
    }
}

fn from_raw_dict(raw: RawFunction, resolve: &impl Resolve) -> Result<Function> {
    match raw.function_type {
        2 => {
            let f2 = ExponentialDict::from_primitive(
                Primitive::Dictionary(raw.other.clone()),
                resolve,
            )?;
            let n_dim = match (raw.range.as_ref(), f2.c0.as_ref(), f2.c1.as_ref()) {
                (Some(range), _, _) => range.len() / 2,
                (_, Some(c0), _) => c0.len(),
                (_, _, Some(c1)) => c1.len(),
                _ => bail!("unknown output dimension"),
            };
            let input_range = (raw.domain[0], raw.domain[1]);
            let mut parts = Vec::with_capacity(n_dim);
            for dim in 0..n_dim {
                let output_range = (
                    raw.range
                        .as_ref()
                        .and_then(|r| r.get(2 * dim).cloned())
                        .unwrap_or(f32::NEG_INFINITY),
                    raw.range
                        .as_ref()
                        .and_then(|r| r.get(2 * dim + 1).cloned())
                        .unwrap_or(f32::INFINITY),
                );
                parts.push(InterpolatedFunctionDim {
                    input_range,
                    output_range,
                    c0: f2.c0.as_ref().and_then(|c| c.get(dim).cloned()).unwrap_or(0.0),
                    c1: f2.c1.as_ref().and_then(|c| c.get(dim).cloned()).unwrap_or(1.0),
                    exponent: f2.exponent,
                })
            }
            Ok(Function::Interpolated(parts))
        }
        3 => {
            let mut dict = raw.other.clone();
            let functions = Vec::<Function>::from_primitive(
                dict.require("Function", "Functions")?,
                resolve,
            )?;
            let bounds = Vec::<f32>::from_primitive(
                dict.remove("Bounds").unwrap_or(Primitive::Null),
                resolve,
            )?;
            let encode = Vec::<f32>::from_primitive(
                dict.remove("Encode").unwrap_or(Primitive::Null),
                resolve,
            )?;
            if raw.domain.len() < 2 {
                bail!("stitching function without a domain");
            }
            if functions.len() != bounds.len() + 1 || encode.len() != 2 * functions.len() {
                bail!("inconsistent stitching arrays");
            }
            Ok(Function::Stitching {
                domain: (raw.domain[0], raw.domain[1]),
                functions,
                bounds,
                encode,
            })
        }
        ty => bail!("unsupported function type {}", ty),
    }
}

/// Unpack big-endian fixed-width samples into the lookup table.
fn sampled_from_bits(raw: RawFunction, params: SampledDict, data: &[u8]) -> Result<Function> {
    let range = raw
        .range
        .clone()
        .ok_or(PdfError::MissingEntry {
            typ: "SampledFunction",
            field: "Range".into(),
        })?;
    let n_out = range.len() / 2;
    let dims: Vec<usize> = params.size.iter().map(|&n| n as usize).collect();
    let bits = params.bits_per_sample as u32;
    if !matches!(bits, 1 | 2 | 4 | 8 | 12 | 16 | 24 | 32) {
        bail!("invalid BitsPerSample {}", bits);
    }
    let points: usize = dims.iter().product();
    let total = points * n_out;
    let max = ((1u64 << bits) - 1) as f32;

    let mut samples = Vec::with_capacity(total);
    let mut bit_pos = 0usize;
    for i in 0..total {
        let mut value = 0u64;
        for _ in 0..bits {
            let byte = data.get(bit_pos / 8).ok_or(PdfError::Filter {
                filter: "SampledFunction",
                msg: "sample data too short".into(),
            })?;
            value = value << 1 | (byte >> (7 - bit_pos % 8)) as u64 & 1;
            bit_pos += 1;
        }
        let component = i % n_out;
        let (lo, hi) = (range[2 * component], range[2 * component + 1]);
        let decoded = match params.decode {
            Some(ref decode) => {
                let (d0, d1) = (decode[2 * component], decode[2 * component + 1]);
                d0 + value as f32 / max * (d1 - d0)
            }
            None => lo + value as f32 / max * (hi - lo),
        };
        samples.push(decoded.clamp(lo, hi));
    }

    // Size lists the first input dimension first; grid_value indexes the
    // same way, so dims carry over directly
    Ok(Function::Sampled(SampledFunction {
        domain: raw.domain,
        range,
        clut: Clut::new(dims, n_out, samples)?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trilinear_midpoint() {
        // f(x, y, z) = 10x + 20y + 40z sampled at the corners of a unit
        // cube; index order (x, y, z) with z varying fastest
        let mut samples = Vec::new();
        for x in 0..2 {
            for y in 0..2 {
                for z in 0..2 {
                    samples.push((10 * x + 20 * y + 40 * z) as f32);
                }
            }
        }
        let clut = Clut::new(vec![2, 2, 2], 1, samples).unwrap();
        let mut out = [0.0];
        clut.sample(&[0.5, 0.5, 0.5], &mut out).unwrap();
        assert!((out[0] - 35.0).abs() < 1e-3);

        clut.sample(&[1.0, 0.0, 0.0], &mut out).unwrap();
        assert!((out[0] - 10.0).abs() < 1e-6);
        clut.sample(&[0.0, 1.0, 1.0], &mut out).unwrap();
        assert!((out[0] - 60.0).abs() < 1e-6);
    }

    #[test]
    fn bilinear_two_outputs() {
        // two output components on a 2x2 grid
        let samples = vec![
            0.0, 100.0, // (0,0)
            1.0, 100.0, // (0,1)
            2.0, 100.0, // (1,0)
            3.0, 100.0, // (1,1)
        ];
        let clut = Clut::new(vec![2, 2], 2, samples).unwrap();
        let mut out = [0.0; 2];
        clut.sample(&[0.5, 0.5], &mut out).unwrap();
        assert!((out[0] - 1.5).abs() < 1e-6);
        assert!((out[1] - 100.0).abs() < 1e-6);
    }

    #[test]
    fn exponential_function() {
        let f = InterpolatedFunctionDim {
            input_range: (0.0, 1.0),
            output_range: (f32::NEG_INFINITY, f32::INFINITY),
            c0: 0.0,
            c1: 2.0,
            exponent: 1.0,
        };
        assert!((f.apply(0.25) - 0.5).abs() < 1e-6);
    }
}
