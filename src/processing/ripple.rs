//! CPU reference of the carousel panel fragment pipeline.
//!
//! `shaders/panel.wgsl` performs the same operations in the same order; the
//! functions here back the still-frame preview and the tests.

use std::f32::consts::TAU;

use image::RgbaImage;

use crate::config::RippleConfig;

/// Hermite interpolation between `edge0` and `edge1`. Reversed edges yield a
/// falling curve.
pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

fn distance(a: [f32; 2], b: [f32; 2]) -> f32 {
    ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)).sqrt()
}

fn mix3(a: [f32; 3], b: [f32; 3], t: f32) -> [f32; 3] {
    [
        a[0] + (b[0] - a[0]) * t,
        a[1] + (b[1] - a[1]) * t,
        a[2] + (b[2] - a[2]) * t,
    ]
}

/// `elapsed` lies within `[0, lifetime)`.
pub fn ripple_active(elapsed: f32, lifetime: f32) -> bool {
    (0.0..lifetime).contains(&elapsed)
}

/// Signed wave height at `uv` for a ripple anchored at `origin`, zero when inactive.
pub fn ripple_height(uv: [f32; 2], origin: [f32; 2], elapsed: f32, ripple: &RippleConfig) -> f32 {
    if !ripple_active(elapsed, ripple.lifetime) {
        return 0.0;
    }
    let fade = 1.0 - elapsed / ripple.lifetime;
    let dist = distance(uv, origin);
    let progress = elapsed * 2.0 - dist / ripple.radius;
    (progress * TAU).sin() * smoothstep(ripple.radius, 0.0, dist) * fade
}

/// Gamma-like lift followed by a 10% blend toward a contrast-boosted square.
pub fn enhance_colors(rgb: [f32; 3]) -> [f32; 3] {
    let lifted = rgb.map(|c| c.max(0.0).powf(0.9));
    let boosted = lifted.map(|c| c * c * 3.0);
    mix3(lifted, boosted, 0.1)
}

/// Radial falloff centred on the panel, 1.0 at the centre down to 0.8.
pub fn glow(uv: [f32; 2]) -> f32 {
    1.0 - smoothstep(0.0, 0.7, distance(uv, [0.5, 0.5])) * 0.2
}

/// Per-panel inputs of the fragment pipeline.
#[derive(Debug, Clone, Copy)]
pub struct PanelShading {
    pub time: f32,
    pub ripple_origin: [f32; 2],
    pub ripple_start: f32,
    pub ripple: RippleConfig,
    pub opacity: f32,
    pub panel_width: f32,
}

/// Shades one fragment at image-space `uv` (v downward).
pub fn shade_fragment(
    sample: impl Fn([f32; 2]) -> [f32; 4],
    uv: [f32; 2],
    params: &PanelShading,
) -> [f32; 4] {
    let elapsed = params.time - params.ripple_start;
    let height = ripple_height(uv, params.ripple_origin, elapsed, &params.ripple);
    let offset = height * params.ripple.strength;
    let texel = sample([uv[0] + offset, uv[1] + offset]);

    let mut color = enhance_colors([texel[0], texel[1], texel[2]]);
    let g = glow(uv);
    color = color.map(|c| c * g);

    let local_x = (uv[0] - 0.5) * params.panel_width;
    let wobble = (params.time * 0.5 + local_x * 0.1).sin() * 0.002;
    let parallax = sample([uv[0] + wobble, uv[1] + wobble]);
    color = mix3(color, [parallax[0], parallax[1], parallax[2]], 0.1);

    [color[0], color[1], color[2], texel[3] * params.opacity]
}

/// Clamp-to-edge nearest sample in normalized coordinates.
pub fn sample_nearest(image: &RgbaImage, uv: [f32; 2]) -> [f32; 4] {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return [0.0; 4];
    }
    let x = ((uv[0].clamp(0.0, 1.0) * w as f32) as u32).min(w - 1);
    let y = ((uv[1].clamp(0.0, 1.0) * h as f32) as u32).min(h - 1);
    image.get_pixel(x, y).0.map(|c| c as f32 / 255.0)
}

/// Shades a whole texture as one panel, producing an image of the same size.
pub fn render_panel(image: &RgbaImage, params: &PanelShading) -> RgbaImage {
    let (w, h) = image.dimensions();
    RgbaImage::from_fn(w, h, |x, y| {
        let uv = [
            (x as f32 + 0.5) / w as f32,
            (y as f32 + 0.5) / h as f32,
        ];
        let rgba = shade_fragment(|p| sample_nearest(image, p), uv, params);
        image::Rgba(rgba.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ripple() -> RippleConfig {
        RippleConfig::default()
    }

    #[test]
    fn liveness_window_is_half_open() {
        assert!(ripple_active(0.0, 3.0));
        assert!(ripple_active(2.999, 3.0));
        assert!(!ripple_active(3.0, 3.0));
        assert!(!ripple_active(-0.01, 3.0));
    }

    #[test]
    fn inactive_ripple_has_no_height() {
        let origin = [0.5, 0.5];
        assert_eq!(ripple_height([0.55, 0.5], origin, 3.0, &ripple()), 0.0);
        assert_eq!(ripple_height([0.55, 0.5], origin, -1.0, &ripple()), 0.0);
    }

    #[test]
    fn height_at_start_depends_only_on_distance() {
        let cfg = ripple();
        let origin = [0.5, 0.5];
        let dist: f32 = 0.075;
        let expected = (-dist / cfg.radius * TAU).sin() * smoothstep(cfg.radius, 0.0, dist);
        let h = ripple_height([0.5 + dist, 0.5], origin, 0.0, &cfg);
        assert!((h - expected).abs() < 1e-6);
        // quarter radius out: sin(-pi/2) = -1 scaled by the falloff
        assert!(h < 0.0);
    }

    #[test]
    fn no_influence_beyond_radius() {
        assert_eq!(ripple_height([0.95, 0.5], [0.5, 0.5], 0.4, &ripple()), 0.0);
    }

    #[test]
    fn fade_shrinks_amplitude_over_lifetime() {
        let cfg = ripple();
        let origin = [0.5, 0.5];
        let uv = [0.5, 0.5];
        // at the origin sin(elapsed * 2 * tau) peaks at elapsed = 0.125 + k/2
        let early = ripple_height(uv, origin, 0.125, &cfg).abs();
        let late = ripple_height(uv, origin, 2.625, &cfg).abs();
        assert!(early > late);
        assert!(late > 0.0);
    }

    #[test]
    fn reversed_smoothstep_falls() {
        assert_eq!(smoothstep(0.3, 0.0, 0.0), 1.0);
        assert_eq!(smoothstep(0.3, 0.0, 0.3), 0.0);
        assert!((smoothstep(0.3, 0.0, 0.15) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn glow_dims_towards_corners() {
        assert_eq!(glow([0.5, 0.5]), 1.0);
        assert!((glow([1.2, 0.5]) - 0.8).abs() < 1e-6);
    }

    #[test]
    fn untouched_panel_matches_color_pipeline() {
        let image = RgbaImage::from_pixel(4, 4, image::Rgba([128, 64, 32, 255]));
        let params = PanelShading {
            time: 0.0,
            ripple_origin: [-1.0, -1.0],
            ripple_start: -100.0,
            ripple: ripple(),
            opacity: 0.5,
            panel_width: 4.0,
        };
        let uv = [0.5, 0.5];
        let out = shade_fragment(|p| sample_nearest(&image, p), uv, &params);
        let texel = sample_nearest(&image, uv);
        let enhanced = enhance_colors([texel[0], texel[1], texel[2]]);
        let expected = mix3(enhanced, [texel[0], texel[1], texel[2]], 0.1);
        for c in 0..3 {
            assert!((out[c] - expected[c]).abs() < 1e-5);
        }
        assert!((out[3] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn render_panel_preserves_dimensions() {
        let image = RgbaImage::from_pixel(6, 3, image::Rgba([200, 200, 200, 255]));
        let params = PanelShading {
            time: 1.0,
            ripple_origin: [0.5, 0.5],
            ripple_start: 0.5,
            ripple: ripple(),
            opacity: 1.0,
            panel_width: 4.0,
        };
        let out = render_panel(&image, &params);
        assert_eq!(out.dimensions(), (6, 3));
        assert_eq!(out.get_pixel(0, 0)[3], 255);
    }
}
