use std::sync::LazyLock;
use std::time::Duration;

use serde::Serialize;

const DEFAULT_FRAMERATE: f64 = 30.0;
const DEFAULT_BIND: &str = "0.0.0.0:8081";
const DEFAULT_OVERVIEW_TOPIC: &str = "/overview_camera";
const DEFAULT_INSPECTION_TOPIC: &str = "/inspection_camera";

/// One configured camera source.
#[derive(Clone, Debug, Serialize)]
pub struct CameraConfig {
    pub name: String,
    pub topic: String,
    pub label: String,
    pub description: String,
}

pub struct RelayConfig {
    station_name: String,
    framerate: f64,
    bind: String,
    cameras: Vec<CameraConfig>,
}

impl RelayConfig {
    fn from_env() -> Self {
        let station_name = std::env::var("RELAY_STATION_NAME").unwrap_or_default();
        let framerate = parse_framerate(std::env::var("FRAMERATE").ok());
        let bind = std::env::var("RELAY_BIND").unwrap_or_else(|_| DEFAULT_BIND.to_string());

        let overview_topic = std::env::var("RELAY_OVERVIEW_TOPIC")
            .unwrap_or_else(|_| DEFAULT_OVERVIEW_TOPIC.to_string());
        let inspection_topic = std::env::var("RELAY_INSPECTION_TOPIC")
            .unwrap_or_else(|_| DEFAULT_INSPECTION_TOPIC.to_string());

        let cameras = vec![
            CameraConfig {
                name: "overview".to_string(),
                topic: overview_topic,
                label: "Overview Camera".to_string(),
                description: "Elevated view of the entire work cell".to_string(),
            },
            CameraConfig {
                name: "inspection".to_string(),
                topic: inspection_topic,
                label: "Inspection Camera".to_string(),
                description: "Overhead view for defect detection".to_string(),
            },
        ];

        Self {
            station_name,
            framerate,
            bind,
            cameras,
        }
    }

    pub fn station_name(&self) -> &str {
        &self.station_name
    }

    pub fn framerate(&self) -> f64 {
        self.framerate
    }

    /// Pacing interval for one frame at the configured rate.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.framerate)
    }

    pub fn bind(&self) -> &str {
        &self.bind
    }

    pub fn cameras(&self) -> &[CameraConfig] {
        &self.cameras
    }
}

fn parse_framerate(raw: Option<String>) -> f64 {
    match raw {
        None => DEFAULT_FRAMERATE,
        Some(s) => match s.parse::<f64>() {
            Ok(v) if v > 0.0 => v,
            _ => {
                log::warn!(
                    "invalid FRAMERATE {:?}, using default {} fps",
                    s,
                    DEFAULT_FRAMERATE
                );
                DEFAULT_FRAMERATE
            }
        },
    }
}

pub fn config() -> &'static RelayConfig {
    static CONFIG: LazyLock<RelayConfig> = LazyLock::new(RelayConfig::from_env);
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::{parse_framerate, CameraConfig};

    #[test]
    fn test_parse_framerate() {
        assert_eq!(parse_framerate(None), 30.0);
        assert_eq!(parse_framerate(Some("15".to_string())), 15.0);
        assert_eq!(parse_framerate(Some("24.5".to_string())), 24.5);
        assert_eq!(parse_framerate(Some("0".to_string())), 30.0);
        assert_eq!(parse_framerate(Some("-5".to_string())), 30.0);
        assert_eq!(parse_framerate(Some("abc".to_string())), 30.0);
    }

    #[test]
    fn test_camera_config_serializes_for_api() {
        let camera = CameraConfig {
            name: "overview".to_string(),
            topic: "/overview_camera".to_string(),
            label: "Overview Camera".to_string(),
            description: "Elevated view of the entire work cell".to_string(),
        };

        let value = serde_json::to_value(&camera).unwrap();
        assert_eq!(value["name"], "overview");
        assert_eq!(value["topic"], "/overview_camera");
        assert_eq!(value["label"], "Overview Camera");
        assert_eq!(value["description"], "Elevated view of the entire work cell");
    }
}
