pub mod flight;
pub mod booking;
pub mod payment;

pub use flight::*;
pub use booking::*;
pub use payment::*;
