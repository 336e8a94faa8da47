use serde::{Deserialize, Serialize};

/// Linear RGB color with components in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0);
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Builds a color from a `0xRRGGBB` literal.
    pub fn from_hex(hex: u32) -> Self {
        let channel = |shift: u32| ((hex >> shift) & 0xFF) as f32 / 255.0;
        Self::new(channel(16), channel(8), channel(0))
    }

    pub fn lerp(self, other: Self, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        Self::new(
            self.r + (other.r - self.r) * t,
            self.g + (other.g - self.g) * t,
            self.b + (other.b - self.b) * t,
        )
    }

    pub fn to_rgba8(self, alpha: f32) -> [u8; 4] {
        let byte = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        [byte(self.r), byte(self.g), byte(self.b), byte(alpha)]
    }
}

/// Theme tags understood by [`ColorContext::for_theme`].
pub const THEMES: [&str; 8] = [
    "root",
    "sacral",
    "solar-plexus",
    "heart",
    "throat",
    "third-eye",
    "crown",
    "cosmic",
];

/// Palette shared by every node of a geometry variant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorContext {
    pub base: Rgb,
    pub accent: Rgb,
    pub emissive: Rgb,
}

impl ColorContext {
    /// Palette for a theme or chakra tag. Matching ignores case and treats
    /// `_` and spaces like `-`; unknown tags get the cosmic palette.
    pub fn for_theme(tag: &str) -> Self {
        let normalized = tag.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        let (base, accent) = match normalized.as_str() {
            "root" | "muladhara" => (0xC0392B, 0xFF6F61),
            "sacral" | "svadhisthana" => (0xE67E22, 0xFFB36B),
            "solar-plexus" | "manipura" => (0xF1C40F, 0xFFE680),
            "heart" | "anahata" => (0x27AE60, 0x7DFFB0),
            "throat" | "vishuddha" => (0x2E86C1, 0x85C1FF),
            "third-eye" | "ajna" => (0x4B3F9E, 0x9B8CFF),
            "crown" | "sahasrara" => (0x8E44AD, 0xE0B0FF),
            _ => (0xB8860B, 0x6FD6FF),
        };
        Self::from_pair(Rgb::from_hex(base), Rgb::from_hex(accent))
    }

    fn from_pair(base: Rgb, accent: Rgb) -> Self {
        Self {
            base,
            accent,
            emissive: accent.lerp(Rgb::WHITE, 0.35),
        }
    }

    /// Dark backdrop tinted towards the base color.
    pub fn background(&self) -> Rgb {
        Rgb::new(0.02, 0.02, 0.05).lerp(self.base, 0.08)
    }
}

impl Default for ColorContext {
    fn default() -> Self {
        Self::for_theme("cosmic")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn theme_lookup_is_pure_and_normalized() {
        assert_eq!(ColorContext::for_theme("Third Eye"), ColorContext::for_theme("third-eye"));
        assert_eq!(ColorContext::for_theme("heart"), ColorContext::for_theme("heart"));
    }

    #[test]
    fn unknown_theme_uses_cosmic_palette() {
        assert_eq!(ColorContext::for_theme("jazz"), ColorContext::default());
    }

    #[test]
    fn named_themes_are_distinct() {
        let palettes: Vec<_> = THEMES.iter().map(|t| ColorContext::for_theme(t)).collect();
        for (i, a) in palettes.iter().enumerate() {
            for b in &palettes[i + 1..] {
                assert_ne!(a.base, b.base);
            }
        }
    }

    #[test]
    fn hex_round_trips_through_bytes() {
        let color = Rgb::from_hex(0x2E86C1);
        assert_eq!(color.to_rgba8(1.0), [0x2E, 0x86, 0xC1, 0xFF]);
    }
}
