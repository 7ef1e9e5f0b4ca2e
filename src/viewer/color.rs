use eframe::egui::Color32;
use palette::{LinSrgb, Mix, Srgb};

// Viridis anchor colours, dark purple to yellow.
const VIRIDIS: [(u8, u8, u8); 5] = [
    (0x44, 0x01, 0x54),
    (0x3b, 0x52, 0x8b),
    (0x21, 0x91, 0x8c),
    (0x5e, 0xc9, 0x62),
    (0xfd, 0xe7, 0x25),
];

/// Sample the viridis scale at `t` in [0, 1]; values outside are clamped.
pub fn viridis(t: f32) -> Color32 {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    let scaled = t * (VIRIDIS.len() - 1) as f32;
    let lower = (scaled.floor() as usize).min(VIRIDIS.len() - 2);
    let factor = scaled - lower as f32;

    let a = anchor(lower);
    let b = anchor(lower + 1);
    let rgb: Srgb<u8> = Srgb::<f32>::from_linear(a.mix(b, factor)).into_format();

    Color32::from_rgb(rgb.red, rgb.green, rgb.blue)
}

/// Colour for `topic` on a viridis scale spanning `min_topic..=max_topic`.
pub fn topic_color(topic: i32, min_topic: i32, max_topic: i32) -> Color32 {
    if max_topic <= min_topic {
        return viridis(0.0);
    }
    let t = (topic - min_topic) as f32 / (max_topic - min_topic) as f32;
    viridis(t)
}

fn anchor(i: usize) -> LinSrgb {
    let (r, g, b) = VIRIDIS[i];
    Srgb::new(r, g, b).into_format::<f32>().into_linear()
}
