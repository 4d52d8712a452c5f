//! G.711 mu-law codec.
//!
//! Encoding works on the 14-bit magnitude the carrier expects: the 16-bit
//! input is shifted down by two, biased by 33, clamped at 8159 and packed as
//! sign / 3-bit segment / 4-bit mantissa, then inverted. Decoding returns
//! 16-bit linear PCM.

/// Mu-law byte for digital silence.
pub const MULAW_SILENCE: u8 = 0xFF;

const BIAS: i32 = 33;
const CLIP: i32 = 8159;
const SEG_END: [i32; 8] = [0x3F, 0x7F, 0xFF, 0x1FF, 0x3FF, 0x7FF, 0xFFF, 0x1FFF];

/// Encode one 16-bit linear sample.
#[must_use]
pub fn encode_sample(sample: i16) -> u8 {
    let mut pcm = i32::from(sample) >> 2;
    let mask = if pcm < 0 {
        pcm = -pcm;
        0x7F
    } else {
        0xFF
    };
    pcm = pcm.min(CLIP) + BIAS;

    let segment = SEG_END.iter().zip(0i32..).find(|&(&end, _)| pcm <= end);
    let byte = match segment {
        Some((_, seg)) => {
            let mantissa = (pcm >> (seg + 1)) & 0x0F;
            ((seg << 4) | mantissa) ^ mask
        }
        None => 0x7F ^ mask,
    };
    (byte & 0xFF) as u8
}

/// Decode one mu-law byte to 16-bit linear PCM.
#[must_use]
pub fn decode_sample(byte: u8) -> i16 {
    let u = !byte;
    let mut t = (i32::from(u & 0x0F) << 3) + 0x84;
    t <<= (u & 0x70) >> 4;
    let value = if u & 0x80 == 0 { t - 0x84 } else { 0x84 - t };
    value as i16
}

#[must_use]
pub fn encode(samples: &[i16]) -> Vec<u8> {
    samples.iter().map(|&s| encode_sample(s)).collect()
}

#[must_use]
pub fn decode(bytes: &[u8]) -> Vec<i16> {
    bytes.iter().map(|&b| decode_sample(b)).collect()
}
