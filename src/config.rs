//! Lightning configuration.
//!
//! [`LightningConfig`] is a flat, serializable set of options read by every
//! component on every tick. It may change at any time, including mid-bolt;
//! only the per-edge style captured when an edge is created is frozen.
//!
//! Changes go through [`LightningConfig::apply_patch`], which merges a JSON
//! object of options, migrates legacy single-control options onto their
//! detailed counterparts, and clamps everything to a sane range:
//!
//! ```ignore
//! let mut cfg = LightningConfig::default();
//! cfg.apply_patch(&serde_json::json!({ "render_mode": "capsule", "max_step_dist": 2.0 }))?;
//! assert_eq!(cfg.render_mode_spark_win, RenderMode::Capsule);
//! assert_eq!(cfg.max_step_dist, 8.0);
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::color::{Hsv, Rgb};
use crate::error::ConfigError;
use crate::surface::LineCap;

/// How an edge segment is drawn.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// Stroked line using the current line cap.
    Stroke,
    /// Filled quad spanning the segment (default).
    #[default]
    Rect,
    /// Filled quad with semicircular end caps.
    Capsule,
}

impl RenderMode {
    pub fn variants() -> &'static [&'static str] {
        &["stroke", "rect", "capsule"]
    }
}

/// Complete lightning configuration.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LightningConfig {
    /// Master switch; when off `update` does nothing.
    pub enabled: bool,

    // Spawning and cadence
    pub initial_delay_ms: f64,
    pub interval_ms: f64,

    // Growth pacing and phase durations
    pub hop_delay_ms: f64,
    pub rise_ms: f64,
    pub spark_rise_ms: f64,
    pub spark_hold_ms: f64,
    pub fade_ms: f64,
    pub no_win_delay_ms: f64,

    // Growth geometry
    /// Width of the spawn column at the left edge.
    pub left_col_width: f32,
    /// Width of the goal column at the right edge.
    pub right_col_width: f32,
    pub max_step_dist: f32,
    pub max_steps_per_branch: u32,
    /// Probability per step that a branch forks.
    pub split_chance: f64,
    /// Candidates fetched from the spatial index per hop.
    pub k_nearest_budget: usize,

    // Per-phase render selectors
    pub render_mode_base: RenderMode,
    pub line_cap_base: LineCap,
    pub render_mode_spark_win: RenderMode,
    pub render_mode_spark_lose: RenderMode,
    pub line_cap_spark: LineCap,

    // Base style
    pub line_width: f32,
    pub pre_alpha: f32,
    /// Relative width noise, `0.3` = ±30% around `line_width`.
    pub width_noise_pct: f32,

    // Colors
    pub hsv_base: Hsv,
    pub hsv_spark_win: Hsv,
    pub hsv_spark_lose: Hsv,
    pub color_noise_base: Hsv,
    pub color_noise_spark: Hsv,

    // Multipliers applied at the spark event
    pub spark_width_mult: f32,
    pub loser_width_mult: f32,
    pub spark_alpha_mult: f32,
    pub loser_alpha_mult: f32,

    // Joint filling
    pub corner_enabled: bool,
    pub corner_miter_limit: f32,
}

impl Default for LightningConfig {
    fn default() -> Self {
        Self {
            enabled: true,

            initial_delay_ms: 400.0,
            interval_ms: 1000.0,

            hop_delay_ms: 10.0,
            rise_ms: 70.0,
            spark_rise_ms: 100.0,
            spark_hold_ms: 240.0,
            fade_ms: 700.0,
            no_win_delay_ms: 180.0,

            left_col_width: 100.0,
            right_col_width: 50.0,
            max_step_dist: 140.0,
            max_steps_per_branch: 70,
            split_chance: 0.02,
            k_nearest_budget: 128,

            render_mode_base: RenderMode::Rect,
            line_cap_base: LineCap::Butt,
            render_mode_spark_win: RenderMode::Rect,
            render_mode_spark_lose: RenderMode::Rect,
            line_cap_spark: LineCap::Butt,

            line_width: 10.0,
            pre_alpha: 0.7,
            width_noise_pct: 0.0,

            hsv_base: Hsv::new(200.0, 90.0, 100.0),
            hsv_spark_win: Hsv::new(200.0, 90.0, 100.0),
            hsv_spark_lose: Hsv::new(200.0, 60.0, 80.0),
            color_noise_base: Hsv::new(0.0, 0.0, 0.0),
            color_noise_spark: Hsv::new(0.0, 0.0, 0.0),

            spark_width_mult: 4.6,
            loser_width_mult: 0.25,
            spark_alpha_mult: 1.9,
            loser_alpha_mult: 0.45,

            corner_enabled: true,
            corner_miter_limit: 4.0,
        }
    }
}

/// Single-control options from older front-ends, each standing in for
/// several detailed options.
#[derive(Debug, Default, Deserialize)]
struct LegacyOptions {
    render_mode: Option<RenderMode>,
    line_cap_style: Option<LineCap>,
    hsv: Option<Hsv>,
}

impl LegacyOptions {
    const KEYS: [&'static str; 3] = ["render_mode", "line_cap_style", "hsv"];

    fn apply(self, cfg: &mut LightningConfig) {
        if let Some(mode) = self.render_mode {
            cfg.render_mode_base = mode;
            cfg.render_mode_spark_win = mode;
            cfg.render_mode_spark_lose = mode;
        }
        if let Some(cap) = self.line_cap_style {
            cfg.line_cap_base = cap;
            cfg.line_cap_spark = cap;
        }
        if let Some(hsv) = self.hsv {
            cfg.hsv_base = hsv;
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl LightningConfig {
    /// Build a config from a JSON document, applying legacy migration and
    /// normalization.
    pub fn from_json(value: &Value) -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        cfg.apply_patch(value)?;
        Ok(cfg)
    }

    /// Load a configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&json)?;
        Self::from_json(&value)
    }

    /// Save the configuration to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Merge a JSON object of options into this config.
    ///
    /// On error the config is left untouched.
    pub fn apply_patch(&mut self, patch: &Value) -> Result<(), ConfigError> {
        let Value::Object(fields) = patch else {
            return Err(ConfigError::PatchNotObject(json_kind(patch)));
        };

        let mut merged = serde_json::to_value(&*self)?;
        if let Value::Object(current) = &mut merged {
            for (key, value) in fields {
                if !LegacyOptions::KEYS.contains(&key.as_str()) {
                    current.insert(key.clone(), value.clone());
                }
            }
        }
        let mut next: LightningConfig = serde_json::from_value(merged)?;
        let legacy: LegacyOptions = serde_json::from_value(patch.clone())?;
        legacy.apply(&mut next);
        next.normalize();

        *self = next;
        Ok(())
    }

    /// Clamp every option to its valid range.
    pub fn normalize(&mut self) {
        fn floor_f32(name: &str, value: &mut f32, min: f32) {
            if !(*value >= min) {
                log::warn!("{name} = {value} is below {min}, clamping");
                *value = min;
            }
        }
        fn floor_f64(name: &str, value: &mut f64, min: f64) {
            if !(*value >= min) {
                log::warn!("{name} = {value} is below {min}, clamping");
                *value = min;
            }
        }

        floor_f32("max_step_dist", &mut self.max_step_dist, 8.0);
        floor_f32("line_width", &mut self.line_width, 0.1);
        floor_f32("pre_alpha", &mut self.pre_alpha, 0.01);
        floor_f32("width_noise_pct", &mut self.width_noise_pct, 0.0);
        floor_f32("left_col_width", &mut self.left_col_width, 0.0);
        floor_f32("right_col_width", &mut self.right_col_width, 0.0);
        floor_f32("corner_miter_limit", &mut self.corner_miter_limit, 1.0);

        floor_f64("initial_delay_ms", &mut self.initial_delay_ms, 0.0);
        floor_f64("interval_ms", &mut self.interval_ms, 0.0);
        floor_f64("hop_delay_ms", &mut self.hop_delay_ms, 0.0);
        floor_f64("rise_ms", &mut self.rise_ms, 0.0);
        floor_f64("spark_rise_ms", &mut self.spark_rise_ms, 0.0);
        floor_f64("spark_hold_ms", &mut self.spark_hold_ms, 0.0);
        floor_f64("fade_ms", &mut self.fade_ms, 0.0);
        floor_f64("no_win_delay_ms", &mut self.no_win_delay_ms, 0.0);

        if !(0.0..=1.0).contains(&self.split_chance) {
            let clamped = if self.split_chance > 1.0 { 1.0 } else { 0.0 };
            log::warn!("split_chance = {} out of range, clamping", self.split_chance);
            self.split_chance = clamped;
        }
        if self.k_nearest_budget == 0 {
            log::warn!("k_nearest_budget = 0, using 1");
            self.k_nearest_budget = 1;
        }
    }

    /// Un-jittered base color.
    pub fn preview_base(&self) -> Rgb {
        self.hsv_base.to_rgb()
    }

    /// Un-jittered winner spark color.
    pub fn preview_win(&self) -> Rgb {
        self.hsv_spark_win.to_rgb()
    }

    /// Un-jittered loser spark color.
    pub fn preview_lose(&self) -> Rgb {
        self.hsv_spark_lose.to_rgb()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_are_normalized() {
        let mut cfg = LightningConfig::default();
        let before = cfg.clone();
        cfg.normalize();
        assert_eq!(cfg, before);
    }

    #[test]
    fn test_patch_clamps_minimums() {
        let mut cfg = LightningConfig::default();
        cfg.apply_patch(&json!({
            "max_step_dist": 2.0,
            "line_width": 0.0,
            "pre_alpha": 0.0,
            "width_noise_pct": -0.5,
            "split_chance": 3.0,
        }))
        .unwrap();
        assert_eq!(cfg.max_step_dist, 8.0);
        assert_eq!(cfg.line_width, 0.1);
        assert_eq!(cfg.pre_alpha, 0.01);
        assert_eq!(cfg.width_noise_pct, 0.0);
        assert_eq!(cfg.split_chance, 1.0);
    }

    #[test]
    fn test_legacy_render_mode_mirrors() {
        let mut cfg = LightningConfig::default();
        cfg.apply_patch(&json!({ "render_mode": "capsule", "line_cap_style": "round" }))
            .unwrap();
        assert_eq!(cfg.render_mode_base, RenderMode::Capsule);
        assert_eq!(cfg.render_mode_spark_win, RenderMode::Capsule);
        assert_eq!(cfg.render_mode_spark_lose, RenderMode::Capsule);
        assert_eq!(cfg.line_cap_base, LineCap::Round);
        assert_eq!(cfg.line_cap_spark, LineCap::Round);
    }

    #[test]
    fn test_legacy_hsv_alias() {
        let mut cfg = LightningConfig::default();
        cfg.apply_patch(&json!({ "hsv": { "h": 10.0, "s": 20.0, "v": 30.0 } }))
            .unwrap();
        assert_eq!(cfg.hsv_base, Hsv::new(10.0, 20.0, 30.0));
    }

    #[test]
    fn test_patch_keeps_unmentioned_fields() {
        let mut cfg = LightningConfig::default();
        cfg.hop_delay_ms = 33.0;
        cfg.apply_patch(&json!({ "fade_ms": 50.0 })).unwrap();
        assert_eq!(cfg.hop_delay_ms, 33.0);
        assert_eq!(cfg.fade_ms, 50.0);
    }

    #[test]
    fn test_bad_patch_leaves_config_untouched() {
        let mut cfg = LightningConfig::default();
        assert!(matches!(
            cfg.apply_patch(&json!([1, 2])),
            Err(ConfigError::PatchNotObject("an array"))
        ));
        assert!(cfg.apply_patch(&json!({ "fade_ms": "slow" })).is_err());
        assert_eq!(cfg, LightningConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lightning.json");
        let mut cfg = LightningConfig::default();
        cfg.split_chance = 0.5;
        cfg.render_mode_spark_win = RenderMode::Stroke;
        cfg.save(&path).unwrap();

        let loaded = LightningConfig::load(&path).unwrap();
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn test_partial_document_uses_defaults() {
        let cfg = LightningConfig::from_json(&json!({ "interval_ms": 250.0 })).unwrap();
        assert_eq!(cfg.interval_ms, 250.0);
        assert_eq!(cfg.max_steps_per_branch, 70);
    }
}
