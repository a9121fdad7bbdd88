pub mod auth;
pub mod session;

pub use auth::{AuthResponse, LoginRequest, RegisterRequest};
pub use session::{NewSession, SensorData, Session, TrajectoryPoint};
