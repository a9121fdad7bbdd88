use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// One recorded kart run. `id` and `created_at` come from the store.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_model: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
}

/// RFC 3339, or an offset-less `timestamp` column read as UTC.
fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").map(|n| n.and_utc()))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f").map(|n| n.and_utc()))
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)?
        .map(|raw| parse_timestamp(&raw).map_err(serde::de::Error::custom))
        .transpose()
}

impl Session {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(user_id) = &self.user_id {
            if user_id.trim().is_empty() {
                return Err("user_id must not be blank".to_string());
            }
        }
        Ok(())
    }

    /// Row sent to the store on create. Client-supplied `id`/`created_at` are dropped.
    pub fn to_new_row(&self) -> NewSession {
        NewSession {
            user_id: self.user_id.clone(),
            vehicle_model: self.vehicle_model.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct NewSession {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicle_model: Option<String>,
}

/// A single timestamped observation. Every sensor channel may drop out.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorData {
    #[serde(default)]
    pub session_id: String,
    pub timestamp: i64, // ms
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uwb_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uwb_y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uwb_z: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imu_ax: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imu_ay: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imu_az: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imu_gx: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imu_gy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imu_gz: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steering_angle: Option<f64>,
}

impl SensorData {
    pub fn new(session_id: &str, timestamp: i64) -> Self {
        Self {
            session_id: session_id.to_string(),
            timestamp,
            ..Default::default()
        }
    }

    pub fn with_uwb(mut self, x: f64, y: f64) -> Self {
        self.uwb_x = Some(x);
        self.uwb_y = Some(y);
        self
    }

    pub fn with_imu(mut self, ax: f64, ay: f64, az: f64) -> Self {
        self.imu_ax = Some(ax);
        self.imu_ay = Some(ay);
        self.imu_az = Some(az);
        self
    }

    pub fn with_steering(mut self, angle: f64) -> Self {
        self.steering_angle = Some(angle);
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.timestamp < 0 {
            return Err(format!("timestamp must be >= 0, got {}", self.timestamp));
        }

        let channels = [
            ("uwb_x", self.uwb_x),
            ("uwb_y", self.uwb_y),
            ("uwb_z", self.uwb_z),
            ("imu_ax", self.imu_ax),
            ("imu_ay", self.imu_ay),
            ("imu_az", self.imu_az),
            ("imu_gx", self.imu_gx),
            ("imu_gy", self.imu_gy),
            ("imu_gz", self.imu_gz),
            ("steering_angle", self.steering_angle),
        ];
        for (name, value) in channels {
            if let Some(v) = value {
                if !v.is_finite() {
                    return Err(format!("{} must be a finite number", name));
                }
            }
        }

        Ok(())
    }
}

/// Plot/playback point derived from a record carrying both UWB coordinates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    pub x: f64,
    pub y: f64,
    pub timestamp: i64,
    pub steering_angle: Option<f64>,
}
