pub mod root;
pub mod flights;
pub mod bookings;
pub mod payments;
