use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use palette::Srgb;
use serde::Deserialize;
use serde::de::{self, Deserializer};

use crate::animation::Ease;

/// sRGB colour parsed from a `#rrggbb` / `#rgb` hex string.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct HexColor(pub Srgb<u8>);

impl HexColor {
    /// Gamma-encoded components in `[0, 1]`; rendering happens in encoded space.
    pub fn rgb_f32(self) -> [f32; 3] {
        let c: Srgb<f32> = self.0.into_format();
        [c.red, c.green, c.blue]
    }
}

impl fmt::Debug for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{:02x}{:02x}{:02x}",
            self.0.red, self.0.green, self.0.blue
        )
    }
}

impl FromStr for HexColor {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let rgb = Srgb::<u8>::from_str(s.trim())
            .map_err(|err| anyhow::anyhow!("invalid hex colour {s:?}: {err}"))?;
        Ok(Self(rgb))
    }
}

impl<'de> Deserialize<'de> for HexColor {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SectionKind {
    /// Cover-fitted still image, optionally with a masked overlay image.
    Image,
    /// Hosts the shaded carousel.
    Carousel,
    /// Solid colour only.
    Plain,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct SectionConfig {
    pub kind: SectionKind,
    #[serde(default)]
    pub background: Option<PathBuf>,
    /// Second image revealed by the section-0 two-stage gesture.
    #[serde(default)]
    pub clip_overlay: Option<PathBuf>,
    #[serde(default)]
    pub color: Option<HexColor>,
}

impl SectionConfig {
    fn image(background: &str, overlay: Option<&str>) -> Self {
        Self {
            kind: SectionKind::Image,
            background: Some(PathBuf::from(background)),
            clip_overlay: overlay.map(PathBuf::from),
            color: None,
        }
    }

    fn bare(kind: SectionKind) -> Self {
        Self {
            kind,
            background: None,
            clip_overlay: None,
            color: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct TransitionConfig {
    /// Length of a full section transition.
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    pub ease: Ease,
    /// Vertical parallax applied to background layers, in percent of layer height.
    pub parallax_percent: f32,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            duration: Duration::from_millis(1250),
            ease: Ease::Power1InOut,
            parallax_percent: 15.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct RevealConfig {
    /// Length of the section-0 overlay reveal.
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    pub ease: Ease,
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self {
            duration: Duration::from_millis(1500),
            ease: Ease::Power3Out,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct GestureConfig {
    /// Minimum accumulated movement (pixels) before a step intent fires.
    pub tolerance: f32,
    /// Pixels per wheel "line" for devices reporting line deltas.
    pub wheel_line_px: f32,
    /// Multiplier on wheel deltas; negative inverts so that scrolling down steps forward.
    pub wheel_speed: f32,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            tolerance: 10.0,
            wheel_line_px: 100.0,
            wheel_speed: -1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct RippleConfig {
    /// Radius of influence in panel UV units.
    pub radius: f32,
    /// UV displacement scale applied to the wave height.
    pub strength: f32,
    /// Seconds of simulation time before a ripple has faded out.
    pub lifetime: f32,
}

impl Default for RippleConfig {
    fn default() -> Self {
        Self {
            radius: 0.3,
            strength: 0.02,
            lifetime: 3.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct ParticleConfig {
    pub count: usize,
    /// Full extent of the initial random placement along x, y, z.
    pub spread: [f32; 3],
    /// Particles rising above `bound` are recycled to `-bound`.
    pub bound: f32,
    /// Horizontal sway amplitude factor.
    pub drift: f32,
    pub size: [f32; 2],
    pub speed: [f32; 2],
    pub opacity: f32,
    pub highlight_opacity: f32,
    /// Fixed RNG seed for a reproducible field.
    pub seed: Option<u64>,
}

impl Default for ParticleConfig {
    fn default() -> Self {
        Self {
            count: 25,
            spread: [30.0, 20.0, 20.0],
            bound: 15.0,
            drift: 0.2,
            size: [0.1, 0.5],
            speed: [0.5, 1.5],
            opacity: 0.6,
            highlight_opacity: 0.14,
            seed: None,
        }
    }
}

impl ParticleConfig {
    fn validate(&self) -> Result<()> {
        ensure!(self.bound > 0.0, "particles.bound must be positive");
        ensure!(
            self.spread.iter().all(|s| *s >= 0.0),
            "particles.spread must not be negative"
        );
        ensure!(
            self.size[0] > 0.0 && self.size[0] <= self.size[1],
            "particles.size must be a positive [min, max] range"
        );
        ensure!(
            self.speed[0] >= 0.0 && self.speed[0] <= self.speed[1],
            "particles.speed must be a non-negative [min, max] range"
        );
        ensure!(
            (0.0..=1.0).contains(&self.opacity) && (0.0..=1.0).contains(&self.highlight_opacity),
            "particle opacities must be within [0, 1]"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct CarouselConfig {
    /// Ordered texture sources for the strip.
    pub images: Vec<PathBuf>,
    pub panel_width: f32,
    pub spacing: f32,
    /// Strip scroll speed in world units per second.
    pub scroll_speed: f32,
    /// Global panel opacity.
    pub opacity: f32,
    /// World units visible vertically.
    pub view_height: f32,
    /// Drop carousel state whenever its section is hidden.
    pub unmount_when_hidden: bool,
    pub ripple: RippleConfig,
    pub particles: ParticleConfig,
}

impl Default for CarouselConfig {
    fn default() -> Self {
        Self {
            images: ["11.webp", "2.webp", "3.webp", "4.webp", "5.webp", "6.webp", "9.webp"]
                .into_iter()
                .map(PathBuf::from)
                .collect(),
            panel_width: 4.0,
            spacing: 0.4,
            scroll_speed: 0.8,
            opacity: 1.0,
            view_height: 7.67,
            unmount_when_hidden: false,
            ripple: RippleConfig::default(),
            particles: ParticleConfig::default(),
        }
    }
}

impl CarouselConfig {
    fn validate(&self) -> Result<()> {
        ensure!(self.panel_width > 0.0, "carousel.panel-width must be positive");
        ensure!(self.spacing >= 0.0, "carousel.spacing must not be negative");
        ensure!(
            self.scroll_speed.is_finite() && self.scroll_speed >= 0.0,
            "carousel.scroll-speed must not be negative"
        );
        ensure!(self.view_height > 0.0, "carousel.view-height must be positive");
        ensure!(
            (0.0..=1.0).contains(&self.opacity),
            "carousel.opacity must be within [0, 1]"
        );
        ensure!(self.ripple.radius > 0.0, "carousel.ripple.radius must be positive");
        ensure!(
            self.ripple.lifetime > 0.0,
            "carousel.ripple.lifetime must be positive"
        );
        self.particles
            .validate()
            .context("invalid carousel.particles configuration")
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Configuration {
    /// Directory relative asset paths are resolved against. Defaults to the
    /// directory holding the configuration file; a relative value is taken
    /// relative to that directory.
    pub asset_root: Option<PathBuf>,
    /// Clear colour of the carousel scene.
    pub background_color: HexColor,
    /// Full-viewport sections in presentation order.
    pub sections: Vec<SectionConfig>,
    /// Section-to-section transition timing.
    pub transition: TransitionConfig,
    /// Section-0 overlay reveal timing.
    pub reveal: RevealConfig,
    /// Input normalisation for step gestures.
    pub gesture: GestureConfig,
    /// Shaded carousel parameters.
    pub carousel: CarouselConfig,
    /// Maximum number of concurrent texture decodes.
    pub loader_max_concurrent_decodes: usize,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            asset_root: None,
            background_color: HexColor(Srgb::new(0x00, 0x1a, 0x33)),
            sections: vec![
                SectionConfig::image("bannerr.webp", Some("banner.webp")),
                SectionConfig::bare(SectionKind::Carousel),
                SectionConfig::bare(SectionKind::Plain),
            ],
            transition: TransitionConfig::default(),
            reveal: RevealConfig::default(),
            gesture: GestureConfig::default(),
            carousel: CarouselConfig::default(),
            loader_max_concurrent_decodes: 4,
        }
    }
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)?;
        let mut cfg: Self = serde_yaml::from_str(&s)?;
        let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
        cfg.asset_root = Some(match cfg.asset_root.take() {
            Some(root) if root.is_relative() => base.join(root),
            Some(root) => root,
            None => base,
        });
        Ok(cfg)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        ensure!(!self.sections.is_empty(), "at least one section is required");
        ensure!(
            self.sections
                .iter()
                .filter(|s| s.kind == SectionKind::Carousel)
                .count()
                <= 1,
            "only one carousel section is supported"
        );
        ensure!(
            self.sections
                .iter()
                .skip(1)
                .all(|s| s.clip_overlay.is_none()),
            "clip-overlay is only supported on the first section"
        );
        ensure!(
            self.loader_max_concurrent_decodes > 0,
            "loader-max-concurrent-decodes must be greater than zero"
        );
        ensure!(
            !self.transition.duration.is_zero(),
            "transition.duration must be greater than zero"
        );
        ensure!(
            !self.reveal.duration.is_zero(),
            "reveal.duration must be greater than zero"
        );
        ensure!(
            self.gesture.tolerance > 0.0,
            "gesture.tolerance must be positive"
        );
        self.carousel
            .validate()
            .context("invalid carousel configuration")?;
        Ok(self)
    }

    /// Resolves an asset path against `asset-root`.
    pub fn resolve_asset(&self, path: &Path) -> PathBuf {
        match &self.asset_root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }

    pub fn carousel_sources(&self) -> Vec<PathBuf> {
        self.carousel
            .images
            .iter()
            .map(|p| self.resolve_asset(p))
            .collect()
    }

    pub fn carousel_section(&self) -> Option<usize> {
        self.sections
            .iter()
            .position(|s| s.kind == SectionKind::Carousel)
    }
}
