use anyhow::{Result, anyhow};
use directories::UserDirs;
use log::info;
use serde::Deserialize;
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use crate::layout::{DEFAULT_WIDE_BREAKPOINT, Viewport};

#[derive(Debug, Clone, Deserialize)]
pub struct Meta {
    pub name: Option<String>,
    /// Front-facing cameras want a mirrored image.
    #[serde(default = "default_true")]
    pub mirror: bool,
}

fn default_true() -> bool {
    true
}

impl Default for Meta {
    fn default() -> Self {
        Self {
            name: None,
            mirror: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub extension_ratio: f32,
    pub thumb_open_dist: f32,
    pub shake_window: usize,
    pub shake_range_deg: f32,
    pub shuffle_speed: f32,
    pub sound_throttle_ms: u64,
    pub lock_secs: u64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            extension_ratio: 1.2,
            thumb_open_dist: 0.1,
            shake_window: 20,
            shake_range_deg: 20.0,
            shuffle_speed: 0.8,
            sound_throttle_ms: 200,
            lock_secs: 20,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LayoutCfg {
    pub width: f32,
    pub height: f32,
    pub wide_breakpoint: f32,
}

impl Default for LayoutCfg {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 720.0,
            wide_breakpoint: DEFAULT_WIDE_BREAKPOINT,
        }
    }
}

impl LayoutCfg {
    pub fn viewport(&self) -> Viewport {
        Viewport {
            width: self.width,
            height: self.height,
            wide_breakpoint: self.wide_breakpoint,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub meta: Meta,
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub layout: LayoutCfg,
}

impl Profile {
    pub fn parse(txt: &str) -> Result<Self> {
        let profile: Profile = toml::from_str(txt)?;
        validate_profile(&profile)?;
        Ok(profile)
    }
}

#[derive(Debug, Clone)]
pub struct DaemonConfigState {
    pub active_name: String,
    pub profile: Profile,
    pub config_dir: PathBuf,
    pub profiles_dir: PathBuf,
    pub active_ptr: PathBuf,
}

pub fn config_dir() -> Result<PathBuf> {
    let dirs = UserDirs::new().ok_or_else(|| anyhow!("cannot resolve home directory"))?;
    Ok(dirs.home_dir().join(".config").join("arcanum"))
}

fn default_profile_text() -> &'static str {
    include_str!("../profiles/default.toml")
}

impl DaemonConfigState {
    pub fn load_or_install_default() -> Result<Self> {
        Self::open(config_dir()?)
    }

    /// Opens (and seeds, on first use) the config tree rooted at `cfgdir`.
    pub fn open(cfgdir: PathBuf) -> Result<Self> {
        let profdir = cfgdir.join("profiles");
        fs::create_dir_all(&profdir)?;

        let def_path = profdir.join("default.toml");
        if !def_path.exists() {
            fs::write(&def_path, default_profile_text())?;
            info!("installed default profile at {}", def_path.display());
        }

        let active_ptr = cfgdir.join("active");
        if !active_ptr.exists() {
            let mut f = fs::File::create(&active_ptr)?;
            f.write_all(b"default")?;
        }

        let active_name = fs::read_to_string(&active_ptr)?.trim().to_string();
        let profile = load_profile(&profdir, &active_name)?;

        Ok(Self {
            active_name,
            profile,
            config_dir: cfgdir,
            profiles_dir: profdir,
            active_ptr,
        })
    }

    /// Re-reads the active profile. On error the last good profile stays.
    pub fn reload(&mut self) -> Result<()> {
        self.profile = load_profile(&self.profiles_dir, &self.active_name)?;
        Ok(())
    }

    /// Loads and validates `name` without switching to it.
    pub fn check_profile(&self, name: &str) -> Result<Profile> {
        let p = self.profiles_dir.join(format!("{name}.toml"));
        if !p.exists() {
            return Err(anyhow!("profile not found: {}", p.display()));
        }
        load_profile(&self.profiles_dir, name)
    }

    pub fn set_active(&mut self, name: &str) -> Result<()> {
        let profile = self.check_profile(name)?;
        fs::write(&self.active_ptr, name.as_bytes())?;
        self.active_name = name.to_string();
        self.profile = profile;
        Ok(())
    }

    pub fn list_profiles(&self) -> Vec<String> {
        let mut v = Vec::new();
        if let Ok(rd) = fs::read_dir(&self.profiles_dir) {
            for e in rd.flatten() {
                let path = e.path();
                if path.extension().is_some_and(|ext| ext == "toml") {
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        v.push(stem.to_string());
                    }
                }
            }
        }
        v.sort();
        v
    }

    pub fn doctor_report(&self, socket: &Path) -> serde_json::Value {
        let th = &self.profile.thresholds;
        serde_json::json!({
            "user": whoami::username(),
            "config_dir": self.config_dir,
            "profiles_dir": self.profiles_dir,
            "active_profile": self.active_name,
            "profile_name": self.profile.meta.name,
            "profiles": self.list_profiles(),
            "socket": socket,
            "socket_present": socket.exists(),
            "thresholds": {
                "extension_ratio": th.extension_ratio,
                "thumb_open_dist": th.thumb_open_dist,
                "shake_window": th.shake_window,
                "shake_range_deg": th.shake_range_deg,
                "shuffle_speed": th.shuffle_speed,
                "sound_throttle_ms": th.sound_throttle_ms,
                "lock_secs": th.lock_secs,
            },
            "mirror": self.profile.meta.mirror,
        })
    }
}

fn load_profile(profdir: &Path, name: &str) -> Result<Profile> {
    let path = profdir.join(format!("{name}.toml"));
    let txt = fs::read_to_string(&path)
        .map_err(|e| anyhow!("failed to read {}: {e}", path.display()))?;
    Profile::parse(&txt).map_err(|e| anyhow!("failed to load {}: {e}", path.display()))
}

fn validate_profile(p: &Profile) -> Result<()> {
    let th = &p.thresholds;
    if !(th.extension_ratio > 0.0) {
        return Err(anyhow!("thresholds.extension_ratio must be positive"));
    }
    if !(th.thumb_open_dist > 0.0 && th.thumb_open_dist < 1.0) {
        return Err(anyhow!(
            "thresholds.thumb_open_dist must be in (0,1) normalized units"
        ));
    }
    if th.shake_window == 0 {
        return Err(anyhow!("thresholds.shake_window must be at least one sample"));
    }
    if !(th.shake_range_deg > 0.0) {
        return Err(anyhow!("thresholds.shake_range_deg must be positive"));
    }
    if th.shuffle_speed < 0.0 {
        return Err(anyhow!("thresholds.shuffle_speed must not be negative"));
    }
    if th.lock_secs == 0 {
        return Err(anyhow!("thresholds.lock_secs must be a positive duration"));
    }

    let l = &p.layout;
    if !(l.width > 0.0 && l.height > 0.0) {
        return Err(anyhow!("layout.width and layout.height must be positive"));
    }
    if l.wide_breakpoint < 0.0 {
        return Err(anyhow!("layout.wide_breakpoint must not be negative"));
    }
    Ok(())
}
