pub mod cloud;
pub mod config;
pub mod scan;
pub mod servo;

pub use cloud::{Point3, PointCloud, SweepWindow};
pub use config::SweepConfig;
pub use scan::{LaserScan, ScanSample};
pub use servo::{ServoCommand, ServoTarget, TravelRange};
