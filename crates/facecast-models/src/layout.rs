//! Output layouts and their region geometry.
//!
//! Geometry is stored as fractions of the canvas so a layout can be
//! re-targeted to any output resolution with [`LayoutSpec::resolve`].
//! The reference canvases are 1080x1920 (vertical) and 1920x1080
//! (horizontal); the constants below are the reference pixel positions.

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::color::Rgba;
use crate::rect::NormalizedRect;

/// Target output layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
pub enum LayoutId {
    /// 9:16 reel for short-form vertical platforms.
    #[serde(rename = "vertical")]
    Vertical9x16,
    /// 16:9 widescreen for long-form platforms.
    #[serde(rename = "horizontal")]
    Horizontal16x9,
}

impl LayoutId {
    pub const ALL: [LayoutId; 2] = [LayoutId::Vertical9x16, LayoutId::Horizontal16x9];

    pub fn as_str(&self) -> &'static str {
        match self {
            LayoutId::Vertical9x16 => "vertical",
            LayoutId::Horizontal16x9 => "horizontal",
        }
    }

    /// Aspect ratio label, e.g. `9:16`.
    pub fn aspect_ratio(&self) -> &'static str {
        match self {
            LayoutId::Vertical9x16 => "9:16",
            LayoutId::Horizontal16x9 => "16:9",
        }
    }

    /// Reference canvas size in pixels (width, height).
    pub fn reference_canvas(&self) -> (u32, u32) {
        match self {
            LayoutId::Vertical9x16 => (1080, 1920),
            LayoutId::Horizontal16x9 => (1920, 1080),
        }
    }
}

impl fmt::Display for LayoutId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LayoutId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vertical" | "short" | "vertical9x16" => Ok(LayoutId::Vertical9x16),
            "horizontal" | "long" | "horizontal16x9" => Ok(LayoutId::Horizontal16x9),
            other => Err(format!("Unknown layout: {}", other)),
        }
    }
}

/// What a region draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SourceRole {
    ScreenRecording,
    FaceRecording,
    BackgroundImage,
    SolidFill,
}

/// Which corners carry the radius.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Corners {
    All,
    Top,
}

/// How a source is fitted into its region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Fit {
    /// Scale to fit, pad the remainder with the background color. Never crops.
    Contain,
    /// Scale to fill, crop the overflow.
    Cover,
}

/// A single composited region, in canvas fractions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Region {
    pub name: String,
    pub rect: NormalizedRect,
    /// Corner radius as a fraction of canvas width.
    pub corner_radius: f64,
    pub corners: Corners,
    /// Higher draws on top.
    pub z_index: u32,
    pub source_role: SourceRole,
    pub fit: Fit,
    pub opacity: f32,
    /// Explicit fill for `SolidFill` regions; `None` means the job's background color.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill: Option<Rgba>,
}

/// Immutable geometry for one target aspect ratio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LayoutSpec {
    pub layout_id: LayoutId,
    pub canvas_width: u32,
    pub canvas_height: u32,
    /// Sorted by ascending `z_index`.
    pub regions: Vec<Region>,
}

/// A region resolved to integer pixels on a concrete canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PixelRegion {
    pub name: String,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub corner_radius: u32,
    pub corners: Corners,
    pub z_index: u32,
    pub source_role: SourceRole,
    pub fit: Fit,
    pub opacity: f32,
    pub fill: Option<Rgba>,
}

/// A layout resolved to a concrete output resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ResolvedLayout {
    pub layout_id: LayoutId,
    pub width: u32,
    pub height: u32,
    pub regions: Vec<PixelRegion>,
}

// Vertical reference geometry (1080x1920)
const V_W: u32 = 1080;
const V_H: u32 = 1920;
const V_SCREEN: (u32, u32, u32, u32) = (0, 211, 1080, 669);
const V_SCREEN_RADIUS: u32 = 54;
const V_FACE: (u32, u32, u32, u32) = (0, 981, 1080, 939);
const V_BACKGROUND: (u32, u32, u32, u32) = (32, 1118, 1016, 802);
const V_BAND_RADIUS: u32 = 116;

// Horizontal reference geometry (1920x1080)
const H_W: u32 = 1920;
const H_H: u32 = 1080;
const H_PIP_WIDTH: u32 = 365;
const H_PIP_HEIGHT: u32 = 206;
const H_PIP_MARGIN_RIGHT: u32 = 25;
const H_PIP_MARGIN_BOTTOM: u32 = 28;
const H_PIP_BORDER: u32 = 8;
const H_PIP_RADIUS: u32 = 32;
const H_PIP_BACKDROP_OPACITY: f32 = 0.5;

const PIP_BORDER_FILL: Rgba = Rgba::new(255, 255, 255, 0.5);
const PIP_BACKDROP_FILL: Rgba = Rgba::new(0, 0, 0, 1.0);

/// Geometry for a layout. Pure and deterministic.
pub fn layout_for(layout_id: LayoutId) -> LayoutSpec {
    let spec = match layout_id {
        LayoutId::Vertical9x16 => vertical_layout(),
        LayoutId::Horizontal16x9 => horizontal_layout(),
    };
    debug_assert!(spec.validate().is_ok());
    spec
}

fn region(
    name: &str,
    rect: NormalizedRect,
    radius_px: u32,
    canvas_w: u32,
    corners: Corners,
    z_index: u32,
    source_role: SourceRole,
    fit: Fit,
) -> Region {
    Region {
        name: name.to_string(),
        rect,
        corner_radius: radius_px as f64 / canvas_w as f64,
        corners,
        z_index,
        source_role,
        fit,
        opacity: 1.0,
        fill: None,
    }
}

fn vertical_layout() -> LayoutSpec {
    let px = |(x, y, w, h): (u32, u32, u32, u32)| NormalizedRect::from_pixels(x, y, w, h, V_W, V_H);

    let regions = vec![
        region("canvas", NormalizedRect::full(), 0, V_W, Corners::All, 0, SourceRole::SolidFill, Fit::Cover),
        region("background", px(V_BACKGROUND), V_BAND_RADIUS, V_W, Corners::Top, 2, SourceRole::BackgroundImage, Fit::Cover),
        region("face", px(V_FACE), V_BAND_RADIUS, V_W, Corners::Top, 3, SourceRole::FaceRecording, Fit::Cover),
        region("screen", px(V_SCREEN), V_SCREEN_RADIUS, V_W, Corners::All, 4, SourceRole::ScreenRecording, Fit::Contain),
    ];

    LayoutSpec {
        layout_id: LayoutId::Vertical9x16,
        canvas_width: V_W,
        canvas_height: V_H,
        regions,
    }
}

fn horizontal_layout() -> LayoutSpec {
    let frame_x = H_W - H_PIP_MARGIN_RIGHT - H_PIP_WIDTH;
    let frame_y = H_H - H_PIP_MARGIN_BOTTOM - H_PIP_HEIGHT;
    let frame = NormalizedRect::from_pixels(frame_x, frame_y, H_PIP_WIDTH, H_PIP_HEIGHT, H_W, H_H);
    let inner = NormalizedRect::from_pixels(
        frame_x + H_PIP_BORDER,
        frame_y + H_PIP_BORDER,
        H_PIP_WIDTH - 2 * H_PIP_BORDER,
        H_PIP_HEIGHT - 2 * H_PIP_BORDER,
        H_W,
        H_H,
    );
    let inner_radius = H_PIP_RADIUS - H_PIP_BORDER;

    let mut border = region("pip_border", frame, H_PIP_RADIUS, H_W, Corners::All, 2, SourceRole::SolidFill, Fit::Cover);
    border.fill = Some(PIP_BORDER_FILL);

    let mut backdrop = region("pip_backdrop", inner, inner_radius, H_W, Corners::All, 3, SourceRole::SolidFill, Fit::Cover);
    backdrop.fill = Some(PIP_BACKDROP_FILL);

    let mut background = region("pip_background", inner, inner_radius, H_W, Corners::All, 4, SourceRole::BackgroundImage, Fit::Cover);
    background.opacity = H_PIP_BACKDROP_OPACITY;

    let regions = vec![
        region("canvas", NormalizedRect::full(), 0, H_W, Corners::All, 0, SourceRole::SolidFill, Fit::Cover),
        region("screen", NormalizedRect::full(), 0, H_W, Corners::All, 1, SourceRole::ScreenRecording, Fit::Contain),
        border,
        backdrop,
        background,
        region("pip_face", inner, inner_radius, H_W, Corners::All, 5, SourceRole::FaceRecording, Fit::Cover),
    ];

    LayoutSpec {
        layout_id: LayoutId::Horizontal16x9,
        canvas_width: H_W,
        canvas_height: H_H,
        regions,
    }
}

impl LayoutSpec {
    /// First region drawing the given source.
    pub fn region_for(&self, role: SourceRole) -> Option<&Region> {
        self.regions.iter().find(|r| r.source_role == role)
    }

    /// Regions drawing the given source, bottom to top.
    pub fn regions_for(&self, role: SourceRole) -> impl Iterator<Item = &Region> {
        self.regions.iter().filter(move |r| r.source_role == role)
    }

    /// Check structural invariants: in-bounds rectangles and strictly ordered z.
    pub fn validate(&self) -> Result<(), String> {
        for r in &self.regions {
            if !r.rect.is_valid() {
                return Err(format!("Region '{}' lies outside the canvas", r.name));
            }
            if !(0.0..=1.0).contains(&r.opacity) {
                return Err(format!("Region '{}' has opacity {}", r.name, r.opacity));
            }
        }
        if self.regions.windows(2).any(|w| w[0].z_index >= w[1].z_index) {
            return Err("Regions are not strictly ordered by z_index".to_string());
        }
        Ok(())
    }

    /// Resolve at the reference canvas size.
    pub fn resolve_reference(&self) -> ResolvedLayout {
        self.resolve(self.canvas_width, self.canvas_height)
    }

    /// Resolve to integer pixels on a `width` x `height` canvas.
    ///
    /// Region sizes are rounded down to even numbers for 4:2:0 encoding,
    /// and every region is clamped inside the canvas.
    pub fn resolve(&self, width: u32, height: u32) -> ResolvedLayout {
        let regions = self
            .regions
            .iter()
            .map(|r| {
                let (x, w) = resolve_axis(r.rect.x, r.rect.width, width);
                let (y, h) = resolve_axis(r.rect.y, r.rect.height, height);
                let radius = (r.corner_radius * width as f64).round() as u32;
                PixelRegion {
                    name: r.name.clone(),
                    x,
                    y,
                    width: w,
                    height: h,
                    corner_radius: radius.min(w / 2).min(h / 2),
                    corners: r.corners,
                    z_index: r.z_index,
                    source_role: r.source_role,
                    fit: r.fit,
                    opacity: r.opacity,
                    fill: r.fill,
                }
            })
            .collect();

        ResolvedLayout {
            layout_id: self.layout_id,
            width: width & !1,
            height: height & !1,
            regions,
        }
    }
}

fn resolve_axis(start: f64, length: f64, extent: u32) -> (u32, u32) {
    let extent_f = extent as f64;
    let start_px = (start * extent_f).round().clamp(0.0, extent_f) as u32;
    let end_px = ((start + length) * extent_f).round().clamp(0.0, extent_f) as u32;
    let size = end_px.saturating_sub(start_px) & !1;
    (start_px, size.max(2).min(extent.saturating_sub(start_px) & !1))
}

impl ResolvedLayout {
    pub fn regions_for(&self, role: SourceRole) -> impl Iterator<Item = &PixelRegion> {
        self.regions.iter().filter(move |r| r.source_role == role)
    }
}
