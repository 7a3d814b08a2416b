//! GPTQ checkpoint bit packing
//!
//! Codes are laid out as a little-endian bit stream along the packed axis:
//! code `k` occupies bits `[k·bits, (k+1)·bits)` of the concatenated 32-bit
//! words. For 2, 4 and 8 bits this puts `32 / bits` whole codes in each word;
//! for 3 bits every 32 codes span exactly 3 words with codes 10 and 21
//! straddling a word boundary.

use half::f16;
use ndarray::{Array2, ArrayView1, Axis};

use super::error::{QuantError, Result};
use super::gptq::QuantizedWeight;

/// A packed GPTQ linear layer
#[derive(Clone, Debug, PartialEq)]
pub struct PackedLinear {
    /// `[in·bits/32, out]`
    pub qweight: Array2<i32>,
    /// `[groups, out·bits/32]`, zero points stored minus one
    pub qzeros: Array2<i32>,
    /// `[groups, out]`
    pub scales: Array2<f16>,
    /// `[in]`
    pub g_idx: Vec<i32>,
    /// `[out]`, if the layer has one
    pub bias: Option<Vec<f16>>,
    /// Bits per code
    pub bits: u8,
}

impl PackedLinear {
    /// Pack solver output into checkpoint tensors
    ///
    /// # Errors
    ///
    /// Returns [`QuantError::Unpackable`] when the input or output dimension
    /// does not fill whole 32-bit words.
    pub fn pack(weight: &QuantizedWeight, bias: Option<&[f32]>) -> Result<Self> {
        let bits = weight.bits;
        let (out, inp) = weight.codes.dim();
        let maxq = (1u32 << bits) - 1;
        if !fills_words(inp, bits) || !fills_words(out, bits) {
            return Err(QuantError::Unpackable { rows: out, cols: inp, bits });
        }

        let packed_rows = inp * bits as usize / 32;
        let mut qweight = Array2::<i32>::zeros((packed_rows, out));
        for (col, codes) in weight.codes.axis_iter(Axis(0)).enumerate() {
            let words = pack_codes(codes, bits);
            for (row, word) in words.into_iter().enumerate() {
                qweight[[row, col]] = word as i32;
            }
        }

        let groups = weight.zeros.nrows();
        let mut qzeros = Array2::<i32>::zeros((groups, out * bits as usize / 32));
        for (g, zeros) in weight.zeros.axis_iter(Axis(0)).enumerate() {
            let stored = zeros.mapv(|z| z.wrapping_sub(1) & maxq);
            for (col, word) in pack_codes(stored.view(), bits).into_iter().enumerate() {
                qzeros[[g, col]] = word as i32;
            }
        }

        Ok(Self {
            qweight,
            qzeros,
            scales: weight.scales.mapv(f16::from_f32),
            g_idx: weight.g_idx.clone(),
            bias: bias.map(|b| b.iter().copied().map(f16::from_f32).collect()),
            bits,
        })
    }

    /// Input features
    #[must_use]
    pub fn in_features(&self) -> usize {
        self.g_idx.len()
    }

    /// Output features
    #[must_use]
    pub fn out_features(&self) -> usize {
        self.qweight.ncols()
    }

    /// Codes recovered from `qweight`, `[out, in]`
    #[must_use]
    pub fn unpack_codes(&self) -> Array2<u32> {
        let (inp, out) = (self.in_features(), self.out_features());
        let mut codes = Array2::<u32>::zeros((out, inp));
        for (col, words) in self.qweight.axis_iter(Axis(1)).enumerate() {
            let words: Vec<u32> = words.iter().map(|&w| w as u32).collect();
            codes.row_mut(col).assign(&ndarray::Array1::from(unpack_codes(&words, self.bits, inp)));
        }
        codes
    }

    /// Zero points recovered from `qzeros`, `[groups, out]`
    #[must_use]
    pub fn unpack_zeros(&self) -> Array2<u32> {
        let out = self.out_features();
        let maxq = (1u32 << self.bits) - 1;
        let mut zeros = Array2::<u32>::zeros((self.qzeros.nrows(), out));
        for (g, words) in self.qzeros.axis_iter(Axis(0)).enumerate() {
            let words: Vec<u32> = words.iter().map(|&w| w as u32).collect();
            for (col, z) in unpack_codes(&words, self.bits, out).into_iter().enumerate() {
                zeros[[g, col]] = (z + 1) & maxq;
            }
        }
        zeros
    }
}

/// Whether `len` codes of `bits` fill whole 32-bit words
#[must_use]
pub fn fills_words(len: usize, bits: u8) -> bool {
    len > 0 && (len * bits as usize) % 32 == 0
}

/// Pack codes into a little-endian bit stream of 32-bit words
#[must_use]
pub fn pack_codes(codes: ArrayView1<'_, u32>, bits: u8) -> Vec<u32> {
    let bits = bits as usize;
    let mask = (1u64 << bits) - 1;
    let mut words = vec![0u32; (codes.len() * bits).div_ceil(32)];
    for (k, &code) in codes.iter().enumerate() {
        let bit = k * bits;
        let (word, offset) = (bit / 32, bit % 32);
        let value = (u64::from(code) & mask) << offset;
        words[word] |= value as u32;
        if offset + bits > 32 {
            words[word + 1] |= (value >> 32) as u32;
        }
    }
    words
}

/// Read `len` codes back out of a packed bit stream
#[must_use]
pub fn unpack_codes(words: &[u32], bits: u8, len: usize) -> Vec<u32> {
    let bits = bits as usize;
    let mask = (1u64 << bits) - 1;
    (0..len)
        .map(|k| {
            let bit = k * bits;
            let (word, offset) = (bit / 32, bit % 32);
            let mut value = u64::from(words[word]) >> offset;
            if offset + bits > 32 {
                value |= u64::from(words[word + 1]) << (32 - offset);
            }
            (value & mask) as u32
        })
        .collect()
}
