pub mod ids;
pub mod test_utils;

pub use ids::{generate_id, generate_numeric_id, generate_session_id};
