pub mod price_window;
pub mod schedule;

pub use price_window::PriceWindow;
pub use schedule::{CadenceUnit, JobCadence, JobId};
