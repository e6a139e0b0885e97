pub mod shaper;

pub use shaper::{ShaperError, TrafficShaper};
