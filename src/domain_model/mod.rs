mod claims;
mod ids;
mod token;

pub use claims::*;
pub use ids::*;
pub use token::*;
