//! FFmpeg filter graphs for layout compositing.
//!
//! The composite graph starts from a solid canvas in the job's background
//! color and overlays every region of a [`ResolvedLayout`] in z order.
//! Inputs are expected in the order screen (0), face (1), background (2).

use facecast_models::{Corners, Fit, HexColor, PixelRegion, ResolvedLayout, SourceRole};

/// Input index for screen recording.
pub const SCREEN_INPUT: usize = 0;
/// Input index for face recording.
pub const FACE_INPUT: usize = 1;
/// Input index for the looped background image.
pub const BACKGROUND_INPUT: usize = 2;

/// Label of the final video stream.
pub const OUTPUT_LABEL: &str = "vout";

fn input_index(role: SourceRole) -> Option<usize> {
    match role {
        SourceRole::ScreenRecording => Some(SCREEN_INPUT),
        SourceRole::FaceRecording => Some(FACE_INPUT),
        SourceRole::BackgroundImage => Some(BACKGROUND_INPUT),
        SourceRole::SolidFill => None,
    }
}

/// Build the `-filter_complex` graph compositing `layout`.
pub fn build_composite_filter(
    layout: &ResolvedLayout,
    background: &HexColor,
    duration: f64,
    frame_rate: u32,
) -> String {
    let mut chains: Vec<String> = Vec::new();

    chains.push(format!(
        "color=c={}:s={}x{}:r={}:d={:.3}[base0]",
        background.to_ffmpeg(),
        layout.width,
        layout.height,
        frame_rate,
        duration
    ));

    // Sources drawn more than once need a split.
    let mut source_labels: [Vec<String>; 3] = Default::default();
    for (i, region) in layout.regions.iter().enumerate() {
        if let Some(idx) = input_index(region.source_role) {
            source_labels[idx].push(format!("src{}", i));
        }
    }
    for (idx, labels) in source_labels.iter().enumerate() {
        match labels.len() {
            0 => {}
            1 => chains.push(format!("[{}:v]null[{}]", idx, labels[0])),
            n => chains.push(format!(
                "[{}:v]split={}{}",
                idx,
                n,
                labels.iter().map(|l| format!("[{}]", l)).collect::<String>()
            )),
        }
    }

    let mut current = "base0".to_string();
    let mut step = 0;
    for (i, region) in layout.regions.iter().enumerate() {
        let layer = format!("layer{}", i);
        let chain = match input_index(region.source_role) {
            Some(_) => {
                let fit = fit_filter(region, background);
                format!("[src{}]{}{}[{}]", i, fit, shape_filter(region), layer)
            }
            None => {
                // A full-canvas fill without an explicit color is the base itself.
                let Some(fill) = region.fill else {
                    continue;
                };
                format!(
                    "color=c={}:s={}x{}:r={}:d={:.3},format=rgba{}[{}]",
                    fill.to_ffmpeg(),
                    region.width,
                    region.height,
                    frame_rate,
                    duration,
                    shape_filter(region),
                    layer
                )
            }
        };
        chains.push(chain);

        step += 1;
        let next = format!("base{}", step);
        chains.push(format!(
            "[{}][{}]overlay=x={}:y={}:format=auto:eof_action=pass[{}]",
            current, layer, region.x, region.y, next
        ));
        current = next;
    }

    chains.push(format!("[{}]format=yuv420p[{}]", current, OUTPUT_LABEL));
    chains.join(";")
}

/// Scale a source into its region box.
fn fit_filter(region: &PixelRegion, background: &HexColor) -> String {
    let (w, h) = (region.width, region.height);
    match region.fit {
        Fit::Contain => format!(
            "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:color={},setsar=1",
            background.to_ffmpeg()
        ),
        Fit::Cover => format!(
            "scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h},setsar=1"
        ),
    }
}

/// Rounded corners and opacity, applied on an RGBA frame.
fn shape_filter(region: &PixelRegion) -> String {
    let mut filters = String::new();
    let needs_alpha = region.corner_radius > 0 || region.opacity < 1.0;
    if !needs_alpha {
        return filters;
    }

    filters.push_str(",format=rgba");
    if region.corner_radius > 0 {
        filters.push_str(&format!(
            ",geq=r='r(X,Y)':g='g(X,Y)':b='b(X,Y)':a='{}'",
            rounded_alpha_expr(region.width, region.height, region.corner_radius, region.corners)
        ));
    }
    if region.opacity < 1.0 {
        filters.push_str(&format!(",colorchannelmixer=aa={:.2}", region.opacity.max(0.0)));
    }
    filters
}

/// `geq` alpha expression that clears pixels outside the rounded corners.
fn rounded_alpha_expr(width: u32, height: u32, radius: u32, corners: Corners) -> String {
    let r = radius as f64;
    let half_w = width as f64 / 2.0;
    let half_h = height as f64 / 2.0;
    // Distance past the straight edge, measured from the corner circle center.
    let dx = format!("(abs(X+0.5-{half_w:.1})-{:.1})", half_w - r);
    let dy = match corners {
        Corners::All => format!("(abs(Y+0.5-{half_h:.1})-{:.1})", half_h - r),
        Corners::Top => format!("({r:.1}-Y-0.5)"),
    };
    format!(
        "if(gt({dx},0)*gt({dy},0)*gt(hypot({dx},{dy}),{r:.1}),0,alpha(X,Y))"
    )
}

/// Scale-to-fit one video onto a `width` x `height` canvas, padding with `background`.
pub fn build_normalize_filter(width: u32, height: u32, background: &HexColor, frame_rate: u32) -> String {
    format!(
        "[0:v]scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:color={c},setsar=1,fps={fps},format=yuv420p[{out}]",
        w = width,
        h = height,
        c = background.to_ffmpeg(),
        fps = frame_rate,
        out = OUTPUT_LABEL
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use facecast_models::{layout_for, LayoutId};

    fn color() -> HexColor {
        HexColor::parse("#112233").unwrap()
    }

    #[test]
    fn test_vertical_graph_structure() {
        let layout = layout_for(LayoutId::Vertical9x16).resolve_reference();
        let graph = build_composite_filter(&layout, &color(), 10.0, 30);

        assert!(graph.starts_with("color=c=0x112233:s=1080x1920:r=30:d=10.000[base0]"));
        assert!(graph.contains("[0:v]null[src"));
        assert!(graph.contains("[1:v]null[src"));
        assert!(graph.contains("[2:v]null[src"));
        // Screen is fitted, never cropped.
        assert!(graph.contains("scale=1080:668:force_original_aspect_ratio=decrease,pad=1080:668"));
        assert!(graph.contains("overlay=x=0:y=211"));
        assert!(graph.contains("overlay=x=32:y=1118"));
        assert!(graph.ends_with("format=yuv420p[vout]"));
    }

    #[test]
    fn test_overlays_follow_z_order() {
        let layout = layout_for(LayoutId::Vertical9x16).resolve_reference();
        let graph = build_composite_filter(&layout, &color(), 5.0, 30);
        let bg = graph.find("overlay=x=32:y=1118").unwrap();
        let face = graph.find("overlay=x=0:y=981").unwrap();
        let screen = graph.find("overlay=x=0:y=211").unwrap();
        assert!(bg < face && face < screen);
    }

    #[test]
    fn test_horizontal_pip_layers() {
        let layout = layout_for(LayoutId::Horizontal16x9).resolve_reference();
        let graph = build_composite_filter(&layout, &color(), 5.0, 30);

        assert!(graph.contains("color=c=0xFFFFFF@0.50"));
        assert!(graph.contains("color=c=0x000000@1.00"));
        assert!(graph.contains("colorchannelmixer=aa=0.50"));
        assert!(graph.contains("overlay=x=1530:y=846"));
        assert!(graph.contains("overlay=x=1538:y=854"));
        assert!(graph.contains("scale=1920:1080:force_original_aspect_ratio=decrease"));
    }

    #[test]
    fn test_unrounded_opaque_region_has_no_alpha_work() {
        let layout = layout_for(LayoutId::Horizontal16x9).resolve_reference();
        let screen = layout.regions_for(SourceRole::ScreenRecording).next().unwrap();
        assert_eq!(shape_filter(screen), "");
    }

    #[test]
    fn test_top_corner_expression_ignores_bottom() {
        let expr = rounded_alpha_expr(100, 50, 10, Corners::Top);
        assert!(expr.contains("(10.0-Y-0.5)"));
        let all = rounded_alpha_expr(100, 50, 10, Corners::All);
        assert!(all.contains("abs(Y+0.5-25.0)"));
    }

    #[test]
    fn test_normalize_filter() {
        let graph = build_normalize_filter(1080, 1920, &color(), 30);
        assert!(graph.starts_with("[0:v]scale=1080:1920:force_original_aspect_ratio=decrease"));
        assert!(graph.contains("color=0x112233"));
        assert!(graph.ends_with("[vout]"));
    }
}
