pub mod company;
pub mod error_handling;

pub use company::Company;
pub use error_handling::*;
