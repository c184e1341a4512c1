//! Clipgrid platform profiles.
//!
//! A profile is the bundle of limits and encoder preferences of one
//! publishing destination. The set of destinations is known at build time,
//! so profiles are plain data in a name-keyed table rather than plugins.
//! The process-wide registry is populated once at startup (built-ins plus
//! any profiles declared in the config file) and is read-only afterwards.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use clipgrid_common::config::ProfileConfig;
use clipgrid_common::error::{MediaError, MediaResult};
use serde::{Deserialize, Serialize};

const MIB: u64 = 1024 * 1024;

/// Encoding constraints of one publishing destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformProfile {
    /// Unique registry key (e.g. "tiktok").
    pub name: String,
    /// Maximum frame size in pixels.
    pub max_width: u32,
    pub max_height: u32,
    /// Longest accepted upload.
    pub max_duration_secs: u32,
    /// Largest accepted upload in bytes.
    pub max_file_size: u64,
    /// Encoder names handed to the engine.
    pub video_codec: String,
    pub audio_codec: String,
    /// Bitrates with magnitude suffix ("2M", "128k").
    pub video_bitrate: String,
    pub audio_bitrate: String,
    /// Preferred container ("mp4", "webm").
    pub output_format: String,
    /// Landscape sources are center-cropped to portrait instead of letterboxed.
    pub force_portrait: bool,
}

impl PlatformProfile {
    /// The box the fitter targets.
    ///
    /// Portrait-forcing profiles always report a portrait box, even when
    /// declared landscape, so every fit for them has height >= width.
    pub fn target_box(&self) -> (u32, u32) {
        let (w, h) = (self.max_width, self.max_height);
        if self.force_portrait && w > h {
            (h, w)
        } else {
            (w, h)
        }
    }
}

impl From<&ProfileConfig> for PlatformProfile {
    fn from(config: &ProfileConfig) -> Self {
        Self {
            name: config.name.clone(),
            max_width: config.max_width,
            max_height: config.max_height,
            max_duration_secs: config.max_duration_secs,
            max_file_size: config.max_file_size,
            video_codec: config.video_codec.clone(),
            audio_codec: config.audio_codec.clone(),
            video_bitrate: config.video_bitrate.clone(),
            audio_bitrate: config.audio_bitrate.clone(),
            output_format: config.output_format.clone(),
            force_portrait: config.force_portrait,
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn h264_profile(
    name: &str,
    max_width: u32,
    max_height: u32,
    max_duration_secs: u32,
    max_file_size: u64,
    video_bitrate: &str,
    audio_bitrate: &str,
    force_portrait: bool,
) -> PlatformProfile {
    PlatformProfile {
        name: name.to_string(),
        max_width,
        max_height,
        max_duration_secs,
        max_file_size,
        video_codec: "libx264".to_string(),
        audio_codec: "aac".to_string(),
        video_bitrate: video_bitrate.to_string(),
        audio_bitrate: audio_bitrate.to_string(),
        output_format: "mp4".to_string(),
        force_portrait,
    }
}

/// The profiles compiled into the binary.
pub fn builtin_profiles() -> Vec<PlatformProfile> {
    vec![
        h264_profile("instagram-reel", 1080, 1920, 90, 250 * MIB, "2M", "128k", true),
        h264_profile("tiktok", 1080, 1920, 180, 287 * MIB, "2M", "128k", true),
        h264_profile("x-twitter", 1920, 1200, 140, 5 * MIB, "2M", "128k", false),
        h264_profile("reddit", 1920, 1080, 300, 1024 * MIB, "4M", "192k", false),
        h264_profile("tryonhaulcentral", 1920, 1080, 300, 1024 * MIB, "4M", "192k", true),
        h264_profile(
            "tryonhaulcentral-portrait",
            1080,
            1920,
            300,
            1024 * MIB,
            "4M",
            "192k",
            true,
        ),
        h264_profile(
            "tryonhaulcentral-landscape",
            1920,
            1080,
            300,
            1024 * MIB,
            "4M",
            "192k",
            false,
        ),
    ]
}

/// Name-keyed table of platform profiles.
#[derive(Debug, Clone, Default)]
pub struct PlatformRegistry {
    profiles: BTreeMap<String, PlatformProfile>,
}

impl PlatformRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in profiles.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for profile in builtin_profiles() {
            registry.profiles.insert(profile.name.clone(), profile);
        }
        registry
    }

    /// Add a profile. A name that is already taken is rejected rather than
    /// silently shadowed.
    pub fn register(&mut self, profile: PlatformProfile) -> MediaResult<()> {
        if self.profiles.contains_key(&profile.name) {
            return Err(MediaError::DuplicatePlatform { name: profile.name });
        }
        tracing::debug!(platform = %profile.name, "Registered platform profile");
        self.profiles.insert(profile.name.clone(), profile);
        Ok(())
    }

    /// Look up a profile by name.
    pub fn get(&self, name: &str) -> MediaResult<&PlatformProfile> {
        self.profiles
            .get(name)
            .ok_or_else(|| MediaError::unsupported_platform(name))
    }

    /// Registered names, sorted.
    pub fn list(&self) -> Vec<&str> {
        self.profiles.keys().map(String::as_str).collect()
    }

    /// Registered profiles in name order.
    pub fn iter(&self) -> impl Iterator<Item = &PlatformProfile> {
        self.profiles.values()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

static GLOBAL_REGISTRY: OnceLock<PlatformRegistry> = OnceLock::new();

/// Build the process-wide registry from the built-ins and `extra` profiles.
///
/// Must run once, before any lookup through [`global`].
pub fn init_global(extra: &[ProfileConfig]) -> MediaResult<&'static PlatformRegistry> {
    let mut registry = PlatformRegistry::with_builtins();
    for config in extra {
        registry.register(PlatformProfile::from(config))?;
    }

    GLOBAL_REGISTRY
        .set(registry)
        .map_err(|_| MediaError::invalid_argument("platform registry already initialized"))?;

    Ok(global())
}

/// The process-wide registry. Falls back to the built-ins when
/// [`init_global`] was never called.
pub fn global() -> &'static PlatformRegistry {
    GLOBAL_REGISTRY.get_or_init(PlatformRegistry::with_builtins)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn custom(name: &str) -> PlatformProfile {
        h264_profile(name, 1280, 720, 60, 10 * MIB, "1M", "96k", false)
    }

    #[test]
    fn builtins_are_registered_by_name() {
        let registry = PlatformRegistry::with_builtins();
        assert_eq!(registry.len(), 7);

        let tiktok = registry.get("tiktok").unwrap();
        assert_eq!((tiktok.max_width, tiktok.max_height), (1080, 1920));
        assert_eq!(tiktok.max_file_size, 287 * MIB);
        assert!(tiktok.force_portrait);

        let twitter = registry.get("x-twitter").unwrap();
        assert_eq!(twitter.max_file_size, 5 * MIB);
        assert!(!twitter.force_portrait);
    }

    #[test]
    fn unknown_platform_is_rejected() {
        let registry = PlatformRegistry::with_builtins();
        let err = registry.get("myspace").unwrap_err();
        assert!(matches!(err, MediaError::UnsupportedPlatform { name } if name == "myspace"));
    }

    #[test]
    fn duplicate_registration_is_an_error() {
        let mut registry = PlatformRegistry::new();
        registry.register(custom("vimeo")).unwrap();
        let err = registry.register(custom("vimeo")).unwrap_err();
        assert!(matches!(err, MediaError::DuplicatePlatform { name } if name == "vimeo"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn builtin_names_cannot_be_shadowed() {
        let mut registry = PlatformRegistry::with_builtins();
        assert!(registry.register(custom("reddit")).is_err());
        assert_eq!(registry.get("reddit").unwrap().video_bitrate, "4M");
    }

    #[test]
    fn list_is_sorted() {
        let registry = PlatformRegistry::with_builtins();
        let names = registry.list();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        assert_eq!(names, sorted);
        assert!(names.contains(&"instagram-reel"));
    }

    #[test]
    fn portrait_profiles_report_portrait_boxes() {
        let registry = PlatformRegistry::with_builtins();
        for profile in registry.iter().filter(|p| p.force_portrait) {
            let (w, h) = profile.target_box();
            assert!(h >= w, "{} reported {w}x{h}", profile.name);
        }
        assert_eq!(
            registry.get("tryonhaulcentral").unwrap().target_box(),
            (1080, 1920)
        );
        assert_eq!(
            registry.get("tryonhaulcentral-landscape").unwrap().target_box(),
            (1920, 1080)
        );
    }

    #[test]
    fn profile_from_config_copies_every_field() {
        let config: ProfileConfig = serde_json::from_value(serde_json::json!({
            "name": "vimeo",
            "max_width": 1920, "max_height": 1080,
            "max_duration_secs": 600, "max_file_size": 500_000_000u64,
            "video_codec": "libx264", "audio_codec": "aac",
            "video_bitrate": "5M", "audio_bitrate": "192k",
            "output_format": "mp4", "force_portrait": true
        }))
        .unwrap();

        let profile = PlatformProfile::from(&config);
        assert_eq!(profile.name, "vimeo");
        assert_eq!(profile.video_bitrate, "5M");
        assert!(profile.force_portrait);
        assert_eq!(profile.target_box(), (1080, 1920));
    }

    #[test]
    fn global_registry_defaults_to_builtins() {
        let registry = global();
        assert!(registry.get("tiktok").is_ok());
        assert_eq!(registry.len(), builtin_profiles().len());
    }
}
