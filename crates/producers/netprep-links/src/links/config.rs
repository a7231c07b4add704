use std::path::PathBuf;

use serde::Deserialize;

use netprep_core::times::TimeMS;
use netprep_output::logger::LogSettings;

#[derive(Copy, Clone, Default, Debug, Deserialize)]
pub struct Radius(f64);

impl From<f64> for Radius {
    fn from(value: f64) -> Self {
        Self(value)
    }
}

impl Radius {
    pub(crate) fn as_f64(&self) -> f64 {
        self.0
    }
}

#[derive(Copy, Clone, Default, Debug, Deserialize)]
pub struct DeviceCount(u32);

impl From<u32> for DeviceCount {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl DeviceCount {
    pub(crate) fn as_usize(&self) -> usize {
        self.0 as usize
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct Settings {
    pub step_size: TimeMS,
    pub duration: TimeMS,
    pub output_path: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct LinkSettings {
    pub v2r_count: DeviceCount,
    pub r2v_radius: Radius,
    pub v2v_radius: Radius,
    pub r2r_count: DeviceCount,
    pub r2c_radius: Radius,
    pub c2r_radius: Radius,
}

#[derive(Deserialize, Debug, Clone)]
pub struct PositionFiles {
    pub vehicle_positions: String,
    pub rsu_positions: String,
    pub controller_positions: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    pub log_settings: LogSettings,
    pub settings: Settings,
    pub link_settings: LinkSettings,
    pub position_files: PositionFiles,
}

pub(crate) fn read_config(file_path: &PathBuf) -> Config {
    let input_toml = match std::fs::read_to_string(file_path) {
        Ok(parsed_string) => parsed_string,
        Err(_) => panic!("Failed to read input TOML file"),
    };
    let config: Config = match toml::from_str(&input_toml) {
        Ok(config) => config,
        Err(_) => panic!("Invalid toml file given"),
    };
    config
}
