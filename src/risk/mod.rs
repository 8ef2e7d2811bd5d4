pub mod limits;
pub mod scenario;
