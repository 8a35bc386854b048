pub mod coloring;
pub mod iact;
pub mod welford;

pub use coloring::Coloring;
pub use iact::{integrated_autocorr_time, IactEstimate};
pub use welford::Welford;
