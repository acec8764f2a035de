//! Natural-language description of a layout for the generative renderer.

use std::fmt::Write;

use facecast_models::{Corners, Fit, HexColor, LayoutId, LayoutSpec, Region, SourceRole};

/// Describe `layout` as a generation prompt.
///
/// Derived mechanically from the region list so the text always agrees with
/// the geometry the local renderer draws.
pub fn describe_layout(layout: &LayoutSpec, background_color: &HexColor) -> String {
    let mut prompt = String::new();

    let kind = match layout.layout_id {
        LayoutId::Vertical9x16 => "a short-form vertical video (like a TikTok or Reel)",
        LayoutId::Horizontal16x9 => "a long-form horizontal video (like a YouTube video)",
    };
    let _ = writeln!(
        prompt,
        "Create {} with a {} aspect ratio ({}x{}).",
        kind,
        layout.layout_id.aspect_ratio(),
        layout.canvas_width,
        layout.canvas_height
    );
    let _ = writeln!(prompt, "The main content is a screen recording; it is the primary focus.");
    let _ = writeln!(
        prompt,
        "Fill every area not covered below with the solid color {}.",
        background_color
    );
    let _ = writeln!(prompt, "Layers from back to front:");

    let mut index = 1;
    for region in &layout.regions {
        let Some(subject) = subject(region) else {
            continue;
        };
        let _ = writeln!(prompt, "{}. {}", index, describe_region(subject, region));
        index += 1;
    }

    prompt.trim_end().to_string()
}

fn subject(region: &Region) -> Option<&'static str> {
    match region.source_role {
        SourceRole::ScreenRecording => Some("The screen recording"),
        SourceRole::FaceRecording => Some("The face recording"),
        SourceRole::BackgroundImage => Some("The provided background image"),
        SourceRole::SolidFill if region.fill.is_some() && !is_full_canvas(region) => Some("A solid frame"),
        SourceRole::SolidFill => None,
    }
}

fn is_full_canvas(region: &Region) -> bool {
    let r = &region.rect;
    r.x <= 0.0 && r.y <= 0.0 && r.width >= 1.0 && r.height >= 1.0
}

fn describe_region(subject: &str, region: &Region) -> String {
    let r = &region.rect;
    let mut text = if is_full_canvas(region) {
        format!("{} fills the entire frame", subject)
    } else {
        format!(
            "{} spans {}% to {}% of the width and {}% to {}% of the height",
            subject,
            pct(r.x),
            pct(r.x + r.width),
            pct(r.y),
            pct(r.y + r.height)
        )
    };

    match region.fit {
        Fit::Contain if region.source_role != SourceRole::SolidFill => {
            text.push_str(", scaled to fit without cropping");
        }
        Fit::Cover if region.source_role != SourceRole::SolidFill => {
            text.push_str(", cropped to fill its area");
        }
        _ => {}
    }

    if region.corner_radius > 0.0 {
        text.push_str(match region.corners {
            Corners::All => ", with rounded corners",
            Corners::Top => ", with rounded top corners",
        });
    }

    if region.opacity < 1.0 {
        let _ = write!(text, ", at {}% opacity", pct(region.opacity as f64));
    }

    text.push('.');
    text
}

fn pct(fraction: f64) -> u32 {
    (fraction.clamp(0.0, 1.0) * 100.0).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use facecast_models::layout_for;

    #[test]
    fn test_vertical_prompt() {
        let color = HexColor::parse("#112233").unwrap();
        let prompt = describe_layout(&layout_for(LayoutId::Vertical9x16), &color);

        assert!(prompt.contains("vertical"));
        assert!(prompt.contains("9:16"));
        assert!(prompt.contains("#112233"));
        assert!(prompt.contains("rounded top corners"));

        let bg = prompt.find("background image").unwrap();
        let face = prompt.find("The face recording").unwrap();
        let screen = prompt.find("The screen recording spans").unwrap();
        assert!(bg < face && face < screen, "layers must follow z-order");
    }

    #[test]
    fn test_horizontal_prompt() {
        let prompt = describe_layout(&layout_for(LayoutId::Horizontal16x9), &HexColor::BLACK);

        assert!(prompt.contains("16:9"));
        assert!(prompt.contains("The screen recording fills the entire frame, scaled to fit without cropping"));
        assert!(prompt.contains("A solid frame"));
        assert!(prompt.contains("50% opacity"));
    }

    #[test]
    fn test_prompt_is_deterministic() {
        let layout = layout_for(LayoutId::Horizontal16x9);
        assert_eq!(
            describe_layout(&layout, &HexColor::BLACK),
            describe_layout(&layout, &HexColor::BLACK)
        );
    }
}
