//! Class lookup colors.

use palette::{Hsl, IntoColor, Srgb};

/// Color of the "No data" class.
pub const NO_DATA_COLOR: [u8; 3] = [0, 0, 0];

/// Generates `n` visually distinct colors using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<[u8; 3]> {
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.55);
            let rgb: Srgb = hsl.into_color();
            let rgb: Srgb<u8> = rgb.into_format();
            [rgb.red, rgb.green, rgb.blue]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palette_is_distinct() {
        let colors = generate_palette(6);
        assert_eq!(colors.len(), 6);
        for (i, a) in colors.iter().enumerate() {
            assert_ne!(*a, NO_DATA_COLOR);
            for b in &colors[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_empty_palette() {
        assert!(generate_palette(0).is_empty());
    }
}
