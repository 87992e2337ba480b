//! Compact visual placeholders in the BlurHash format: a low-frequency DCT
//! of the image packed into a short base-83 string.

use std::f32::consts::PI;

use thiserror::Error;

const ALPHABET: &[u8; 83] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz#$%*+,-.:;=?@[]^_{|}~";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlaceholderError {
    #[error("component counts must be within 1..=9, got {0}x{1}")]
    InvalidComponents(u32, u32),
    #[error("pixel buffer holds {actual} bytes, expected {expected}")]
    BufferSize { expected: usize, actual: usize },
    #[error("placeholder has length {actual}, expected {expected}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("invalid base83 character {0:?}")]
    InvalidCharacter(char),
}

/// Encodes an RGBA8 buffer of `width` x `height` pixels. Alpha is ignored.
pub fn encode(
    components_x: u32,
    components_y: u32,
    width: u32,
    height: u32,
    rgba: &[u8],
) -> Result<String, PlaceholderError> {
    if !(1..=9).contains(&components_x) || !(1..=9).contains(&components_y) {
        return Err(PlaceholderError::InvalidComponents(components_x, components_y));
    }
    let expected = width as usize * height as usize * 4;
    if rgba.len() != expected || expected == 0 {
        return Err(PlaceholderError::BufferSize {
            expected,
            actual: rgba.len(),
        });
    }

    let mut factors = Vec::with_capacity((components_x * components_y) as usize);
    for j in 0..components_y {
        for i in 0..components_x {
            factors.push(basis_factor(i, j, width, height, rgba));
        }
    }
    let (dc, ac) = factors.split_first().ok_or(PlaceholderError::InvalidComponents(0, 0))?;

    let mut hash = String::with_capacity(4 + 2 * factors.len());
    push_base83(&mut hash, (components_x - 1) + (components_y - 1) * 9, 1);

    let maximum = if ac.is_empty() {
        push_base83(&mut hash, 0, 1);
        1.0
    } else {
        let actual_max = ac
            .iter()
            .flat_map(|c| c.iter().copied())
            .fold(0.0f32, |acc, v| acc.max(v.abs()));
        let quantised = (actual_max * 166.0 - 0.5).floor().clamp(0.0, 82.0) as u32;
        push_base83(&mut hash, quantised, 1);
        (quantised as f32 + 1.0) / 166.0
    };

    push_base83(&mut hash, encode_dc(*dc), 4);
    for component in ac {
        push_base83(&mut hash, encode_ac(*component, maximum), 2);
    }
    Ok(hash)
}

/// Renders `hash` into an RGBA8 buffer of `width` x `height` pixels.
/// `punch` scales the contrast of the AC components.
pub fn decode(hash: &str, width: u32, height: u32, punch: f32) -> Result<Vec<u8>, PlaceholderError> {
    if let Some(ch) = hash.chars().find(|ch| !ch.is_ascii()) {
        return Err(PlaceholderError::InvalidCharacter(ch));
    }
    if hash.len() < 6 {
        return Err(PlaceholderError::InvalidLength {
            expected: 6,
            actual: hash.len(),
        });
    }
    let size_flag = decode_base83(&hash[..1])?;
    let components_x = size_flag % 9 + 1;
    let components_y = size_flag / 9 + 1;
    let expected = 4 + 2 * (components_x * components_y) as usize;
    if hash.len() != expected {
        return Err(PlaceholderError::InvalidLength {
            expected,
            actual: hash.len(),
        });
    }

    let maximum = (decode_base83(&hash[1..2])? as f32 + 1.0) / 166.0 * punch;
    let mut colors = Vec::with_capacity((components_x * components_y) as usize);
    colors.push(decode_dc(decode_base83(&hash[2..6])?));
    for index in 1..(components_x * components_y) as usize {
        let start = 4 + index * 2;
        colors.push(decode_ac(decode_base83(&hash[start..start + 2])?, maximum));
    }

    let mut pixels = Vec::with_capacity(width as usize * height as usize * 4);
    for y in 0..height {
        for x in 0..width {
            let mut pixel = [0.0f32; 3];
            for j in 0..components_y {
                for i in 0..components_x {
                    let basis = (PI * x as f32 * i as f32 / width as f32).cos()
                        * (PI * y as f32 * j as f32 / height as f32).cos();
                    let color = colors[(i + j * components_x) as usize];
                    for channel in 0..3 {
                        pixel[channel] += color[channel] * basis;
                    }
                }
            }
            pixels.extend(pixel.iter().map(|v| linear_to_srgb(*v)));
            pixels.push(255);
        }
    }
    Ok(pixels)
}

fn basis_factor(i: u32, j: u32, width: u32, height: u32, rgba: &[u8]) -> [f32; 3] {
    let normalisation = if i == 0 && j == 0 { 1.0 } else { 2.0 };
    let mut sum = [0.0f32; 3];
    for y in 0..height {
        for x in 0..width {
            let basis = normalisation
                * (PI * i as f32 * x as f32 / width as f32).cos()
                * (PI * j as f32 * y as f32 / height as f32).cos();
            let offset = 4 * (x + y * width) as usize;
            for channel in 0..3 {
                sum[channel] += basis * srgb_to_linear(rgba[offset + channel]);
            }
        }
    }
    let scale = 1.0 / (width * height) as f32;
    sum.map(|v| v * scale)
}

fn encode_dc(color: [f32; 3]) -> u32 {
    let [r, g, b] = color.map(|v| linear_to_srgb(v) as u32);
    (r << 16) + (g << 8) + b
}

fn encode_ac(color: [f32; 3], maximum: f32) -> u32 {
    let [r, g, b] = color.map(|v| {
        (sign_pow(v / maximum, 0.5) * 9.0 + 9.5)
            .floor()
            .clamp(0.0, 18.0) as u32
    });
    r * 19 * 19 + g * 19 + b
}

fn decode_dc(value: u32) -> [f32; 3] {
    [value >> 16, (value >> 8) & 255, value & 255].map(|v| srgb_to_linear(v as u8))
}

fn decode_ac(value: u32, maximum: f32) -> [f32; 3] {
    [value / (19 * 19), (value / 19) % 19, value % 19]
        .map(|q| sign_pow((q as f32 - 9.0) / 9.0, 2.0) * maximum)
}

fn srgb_to_linear(value: u8) -> f32 {
    let v = value as f32 / 255.0;
    if v <= 0.04045 {
        v / 12.92
    } else {
        ((v + 0.055) / 1.055).powf(2.4)
    }
}

fn linear_to_srgb(value: f32) -> u8 {
    let v = value.clamp(0.0, 1.0);
    let srgb = if v <= 0.003_130_8 {
        v * 12.92
    } else {
        1.055 * v.powf(1.0 / 2.4) - 0.055
    };
    (srgb * 255.0 + 0.5).clamp(0.0, 255.0) as u8
}

fn sign_pow(value: f32, exp: f32) -> f32 {
    value.abs().powf(exp).copysign(value)
}

fn push_base83(out: &mut String, value: u32, length: u32) {
    for i in 1..=length {
        let digit = (value / 83u32.pow(length - i)) % 83;
        out.push(ALPHABET[digit as usize] as char);
    }
}

fn decode_base83(input: &str) -> Result<u32, PlaceholderError> {
    input.chars().try_fold(0u32, |acc, ch| {
        let digit = ALPHABET
            .iter()
            .position(|&c| c as char == ch)
            .ok_or(PlaceholderError::InvalidCharacter(ch))?;
        Ok(acc * 83 + digit as u32)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
        (0..width * height)
            .flat_map(|_| [color[0], color[1], color[2], 255])
            .collect()
    }

    #[test]
    fn hash_length_follows_component_count() {
        let pixels = solid(8, 6, [120, 40, 200]);
        let hash = encode(4, 3, 8, 6, &pixels).unwrap();
        assert_eq!(hash.len(), 4 + 2 * 12);
        assert!(hash.starts_with('L'));
        assert!(hash.bytes().all(|b| ALPHABET.contains(&b)));
    }

    #[test]
    fn solid_color_survives_round_trip() {
        let color = [200, 120, 30];
        let hash = encode(4, 3, 16, 16, &solid(16, 16, color)).unwrap();
        let pixels = decode(&hash, 8, 8, 1.0).unwrap();

        assert_eq!(pixels.len(), 8 * 8 * 4);
        for pixel in pixels.chunks_exact(4) {
            for channel in 0..3 {
                let diff = (pixel[channel] as i32 - color[channel] as i32).abs();
                assert!(diff <= 3, "channel {channel} off by {diff}");
            }
            assert_eq!(pixel[3], 255);
        }
    }

    #[test]
    fn left_right_split_keeps_its_sides() {
        let mut pixels = Vec::new();
        for _ in 0..8 {
            for x in 0..8 {
                let v = if x < 4 { 0 } else { 255 };
                pixels.extend([v, v, v, 255]);
            }
        }
        let hash = encode(4, 3, 8, 8, &pixels).unwrap();
        let decoded = decode(&hash, 8, 8, 1.0).unwrap();
        let left = decoded[0];
        let right = decoded[7 * 4];
        assert!(left < 100, "left = {left}");
        assert!(right > 155, "right = {right}");
    }

    #[test]
    fn single_component_encodes_only_the_average() {
        let hash = encode(1, 1, 2, 2, &solid(2, 2, [0, 0, 0])).unwrap();
        assert_eq!(hash.len(), 6);
        assert_eq!(&hash[..2], "00");
    }

    #[test]
    fn rejects_out_of_range_components() {
        let pixels = solid(2, 2, [0, 0, 0]);
        assert_eq!(
            encode(0, 3, 2, 2, &pixels),
            Err(PlaceholderError::InvalidComponents(0, 3))
        );
        assert_eq!(
            encode(4, 10, 2, 2, &pixels),
            Err(PlaceholderError::InvalidComponents(4, 10))
        );
    }

    #[test]
    fn rejects_mismatched_buffer() {
        assert!(matches!(
            encode(4, 3, 2, 2, &[0; 12]),
            Err(PlaceholderError::BufferSize { expected: 16, actual: 12 })
        ));
    }

    #[test]
    fn decode_rejects_malformed_input() {
        assert!(matches!(
            decode("L", 4, 4, 1.0),
            Err(PlaceholderError::InvalidLength { .. })
        ));
        // "L" announces 4x3 components, so 28 characters are required.
        assert!(matches!(
            decode("L00000000", 4, 4, 1.0),
            Err(PlaceholderError::InvalidLength { expected: 28, actual: 9 })
        ));
        assert_eq!(
            decode("00\"000", 4, 4, 1.0),
            Err(PlaceholderError::InvalidCharacter('"'))
        );
        assert_eq!(
            decode("0é0000", 4, 4, 1.0),
            Err(PlaceholderError::InvalidCharacter('é'))
        );
    }
}
