//! Entity specs produced by home synthesis

use homesim_core::{Domain, EntityId, HomeId};
use serde::{Deserialize, Serialize};

/// Coarse device category a home's device budget is split into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceCategory {
    Sensors,
    Lights,
    Switches,
    Plugs,
    Cameras,
    Thermostats,
    Media,
    Other,
}

pub const ALL_DEVICE_CATEGORIES: &[DeviceCategory] = &[
    DeviceCategory::Sensors,
    DeviceCategory::Lights,
    DeviceCategory::Switches,
    DeviceCategory::Plugs,
    DeviceCategory::Cameras,
    DeviceCategory::Thermostats,
    DeviceCategory::Media,
    DeviceCategory::Other,
];

impl DeviceCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceCategory::Sensors => "sensors",
            DeviceCategory::Lights => "lights",
            DeviceCategory::Switches => "switches",
            DeviceCategory::Plugs => "plugs",
            DeviceCategory::Cameras => "cameras",
            DeviceCategory::Thermostats => "thermostats",
            DeviceCategory::Media => "media",
            DeviceCategory::Other => "other",
        }
    }
}

/// Static configuration of one synthesized entity
///
/// Everything a behavior engine needs to seed and drive the entity:
/// device class, environment linkage and capability knobs. Cross-entity
/// links (power sensor monitoring a plug) are by entity id, resolved
/// through the store at tick time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySpec {
    pub entity_id: EntityId,
    pub home_id: HomeId,

    /// Device class within the domain (e.g. "motion", "temperature")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_class: Option<String>,

    /// Outdoor-linked sensors track the weather context
    #[serde(default)]
    pub outdoor: bool,

    /// Entity whose on/off state a power sensor monitors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_entity: Option<EntityId>,

    /// Power sensor an energy sensor integrates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power_sensor: Option<EntityId>,

    /// Draw when the monitored device is on, in watts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rated_power_w: Option<f64>,

    /// Light capability knobs
    #[serde(default)]
    pub brightness: bool,
    #[serde(default)]
    pub color_temp: bool,

    /// Battery-powered devices carry a draining battery_level attribute
    #[serde(default)]
    pub battery_powered: bool,
}

impl EntitySpec {
    pub fn new(entity_id: EntityId, home_id: impl Into<HomeId>) -> Self {
        Self {
            entity_id,
            home_id: home_id.into(),
            device_class: None,
            outdoor: false,
            linked_entity: None,
            power_sensor: None,
            rated_power_w: None,
            brightness: false,
            color_temp: false,
            battery_powered: false,
        }
    }

    pub fn domain(&self) -> Domain {
        self.entity_id.domain()
    }

    pub fn with_device_class(mut self, device_class: impl Into<String>) -> Self {
        self.device_class = Some(device_class.into());
        self
    }

    pub fn device_class_is(&self, device_class: &str) -> bool {
        self.device_class.as_deref() == Some(device_class)
    }
}
