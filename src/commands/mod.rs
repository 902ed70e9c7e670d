pub mod extract;
pub mod sort;
pub mod status;
