use std::path::PathBuf;
use std::time::Duration;

use ghibli_showcase::animation::Ease;
use ghibli_showcase::config::{Configuration, SectionKind};

#[test]
fn empty_document_uses_defaults() {
    let cfg: Configuration = serde_yaml::from_str("{}").unwrap();
    assert_eq!(cfg.sections.len(), 3);
    assert_eq!(cfg.sections[0].kind, SectionKind::Image);
    assert_eq!(cfg.sections[1].kind, SectionKind::Carousel);
    assert_eq!(cfg.transition.duration, Duration::from_millis(1250));
    assert_eq!(cfg.transition.ease, Ease::Power1InOut);
    assert_eq!(cfg.reveal.duration, Duration::from_millis(1500));
    assert_eq!(cfg.reveal.ease, Ease::Power3Out);
    assert_eq!(cfg.carousel.images.len(), 7);
    assert_eq!(cfg.carousel.particles.count, 25);
    assert_eq!(cfg.loader_max_concurrent_decodes, 4);
    assert_eq!(format!("{:?}", cfg.background_color), "#001a33");
    assert!(cfg.validated().is_ok());
}

#[test]
fn parse_kebab_case_config() {
    let yaml = r##"
asset-root: "/srv/showcase"
background-color: "#102030"
sections:
  - kind: image
    background: hero.webp
    clip-overlay: hero-overlay.webp
  - kind: plain
    color: "#ffffff"
transition:
  duration: 800ms
  ease: power2-out
gesture:
  tolerance: 25
carousel:
  images: [a.png, b.png]
  unmount-when-hidden: true
  ripple:
    lifetime: 2.5
  particles:
    count: 0
    seed: 42
loader-max-concurrent-decodes: 2
"##;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    let cfg = cfg.validated().unwrap();
    assert_eq!(cfg.asset_root, Some(PathBuf::from("/srv/showcase")));
    assert!((cfg.background_color.rgb_f32()[0] - 16.0 / 255.0).abs() < 1e-6);
    assert_eq!(cfg.sections.len(), 2);
    assert_eq!(cfg.transition.duration, Duration::from_millis(800));
    assert_eq!(cfg.transition.ease, Ease::Power2Out);
    assert!((cfg.transition.parallax_percent - 15.0).abs() < f32::EPSILON);
    assert!((cfg.gesture.tolerance - 25.0).abs() < f32::EPSILON);
    assert!(cfg.carousel.unmount_when_hidden);
    assert!((cfg.carousel.ripple.lifetime - 2.5).abs() < f32::EPSILON);
    assert!((cfg.carousel.ripple.radius - 0.3).abs() < f32::EPSILON);
    assert_eq!(cfg.carousel.particles.seed, Some(42));
    assert_eq!(cfg.carousel_section(), None);
    assert_eq!(
        cfg.carousel_sources(),
        vec![
            PathBuf::from("/srv/showcase/a.png"),
            PathBuf::from("/srv/showcase/b.png")
        ]
    );
}

#[test]
fn unknown_fields_are_rejected() {
    let yaml = r#"
carousel:
  panel-widht: 3.0
"#;
    assert!(serde_yaml::from_str::<Configuration>(yaml).is_err());
}

#[test]
fn invalid_hex_colour_is_rejected() {
    assert!(serde_yaml::from_str::<Configuration>("background-color: \"#zzz\"").is_err());
}

#[test]
fn second_carousel_section_fails_validation() {
    let yaml = r#"
sections:
  - kind: carousel
  - kind: carousel
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    let err = cfg.validated().unwrap_err();
    assert!(err.to_string().contains("carousel"));
}

#[test]
fn clip_overlay_outside_first_section_fails_validation() {
    let yaml = r#"
sections:
  - kind: plain
  - kind: image
    background: a.webp
    clip-overlay: b.webp
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    assert!(cfg.validated().is_err());
}

#[test]
fn empty_sections_fail_validation() {
    let cfg: Configuration = serde_yaml::from_str("sections: []").unwrap();
    assert!(cfg.validated().is_err());
}

#[test]
fn zero_duration_fails_validation() {
    let cfg: Configuration = serde_yaml::from_str("transition: { duration: 0s }").unwrap();
    assert!(cfg.validated().is_err());
}

#[test]
fn out_of_range_opacity_fails_validation() {
    let cfg: Configuration = serde_yaml::from_str("carousel: { opacity: 1.5 }").unwrap();
    assert!(cfg.validated().is_err());
}

#[test]
fn negative_scroll_speed_fails_validation() {
    let cfg: Configuration = serde_yaml::from_str("carousel: { scroll-speed: -0.5 }").unwrap();
    let err = cfg.validated().unwrap_err();
    assert!(format!("{err:#}").contains("scroll-speed"));

    let still: Configuration = serde_yaml::from_str("carousel: { scroll-speed: 0.0 }").unwrap();
    assert!(still.validated().is_ok());
}

#[test]
fn asset_root_defaults_to_config_directory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("showcase.yaml");
    std::fs::write(&path, "carousel: { images: [one.webp] }\n").unwrap();
    let cfg = Configuration::from_yaml_file(&path).unwrap();
    assert_eq!(cfg.asset_root.as_deref(), Some(dir.path()));
    assert_eq!(cfg.carousel_sources(), vec![dir.path().join("one.webp")]);
}

#[test]
fn example_config_parses_and_validates() {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config.example.yaml");
    let cfg = Configuration::from_yaml_file(&path)
        .unwrap()
        .validated()
        .unwrap();
    assert_eq!(cfg.carousel_section(), Some(1));
    assert_eq!(cfg.sections[0].kind, SectionKind::Image);
}

#[test]
fn relative_asset_root_is_anchored_at_config_directory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("showcase.yaml");
    std::fs::write(&path, "asset-root: media\n").unwrap();
    let cfg = Configuration::from_yaml_file(&path).unwrap();
    assert_eq!(cfg.asset_root, Some(dir.path().join("media")));
}
