/// UV transform `[scale_x, scale_y, offset_x, offset_y]` that fills a viewport with
/// a texture while preserving its aspect ratio (CSS `background-size: cover`,
/// centred).
pub fn cover_uv(tex_w: u32, tex_h: u32, view_w: u32, view_h: u32) -> [f32; 4] {
    if tex_w == 0 || tex_h == 0 || view_w == 0 || view_h == 0 {
        return [1.0, 1.0, 0.0, 0.0];
    }
    let tex_aspect = tex_w as f32 / tex_h as f32;
    let view_aspect = view_w as f32 / view_h as f32;
    if tex_aspect > view_aspect {
        let sx = view_aspect / tex_aspect;
        [sx, 1.0, (1.0 - sx) / 2.0, 0.0]
    } else {
        let sy = tex_aspect / view_aspect;
        [1.0, sy, 0.0, (1.0 - sy) / 2.0]
    }
}

/// Half extents of the orthographic carousel camera for a viewport.
pub fn view_half_extents(view_height: f32, width_px: u32, height_px: u32) -> [f32; 2] {
    let aspect = width_px.max(1) as f32 / height_px.max(1) as f32;
    [view_height * aspect / 2.0, view_height / 2.0]
}

/// Maps a window pixel position to carousel world coordinates (y up).
pub fn pixel_to_world(
    px: [f32; 2],
    width_px: u32,
    height_px: u32,
    view_height: f32,
) -> [f32; 2] {
    let [hw, hh] = view_half_extents(view_height, width_px, height_px);
    let nx = px[0] / width_px.max(1) as f32 * 2.0 - 1.0;
    let ny = 1.0 - px[1] / height_px.max(1) as f32 * 2.0;
    [nx * hw, ny * hh]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wide_texture_crops_horizontally() {
        let [sx, sy, ox, oy] = cover_uv(400, 100, 200, 100);
        assert!((sx - 0.5).abs() < 1e-6);
        assert_eq!(sy, 1.0);
        assert!((ox - 0.25).abs() < 1e-6);
        assert_eq!(oy, 0.0);
    }

    #[test]
    fn tall_texture_crops_vertically() {
        let [sx, sy, ox, oy] = cover_uv(100, 400, 100, 100);
        assert_eq!(sx, 1.0);
        assert!((sy - 0.25).abs() < 1e-6);
        assert_eq!(ox, 0.0);
        assert!((oy - 0.375).abs() < 1e-6);
    }

    #[test]
    fn pixel_centre_maps_to_origin() {
        let w = pixel_to_world([960.0, 540.0], 1920, 1080, 8.0);
        assert!(w[0].abs() < 1e-5 && w[1].abs() < 1e-5);
        let corner = pixel_to_world([0.0, 0.0], 1920, 1080, 8.0);
        assert!((corner[1] - 4.0).abs() < 1e-5);
        assert!((corner[0] + 8.0 * 16.0 / 9.0 / 2.0).abs() < 1e-4);
    }
}
