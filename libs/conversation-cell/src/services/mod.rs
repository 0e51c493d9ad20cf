pub mod booking;
pub mod controller;
pub mod diagnostic;
pub mod intent;
pub mod recommendation;
