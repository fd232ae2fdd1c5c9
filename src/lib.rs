pub mod android_jni;
pub mod config;
pub mod error;
pub mod geo;
pub mod gpx;
pub mod heatmap;
pub mod lap;
pub mod motion;
pub mod overlay;
pub mod pipeline;
pub mod projection;
pub mod racing_line;
pub mod render;
pub mod sample;
pub mod session;
pub mod sync;
pub mod timer;
pub mod turns;
pub mod vehicle;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
