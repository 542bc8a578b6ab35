mod login_service;
mod token_service;

pub use login_service::*;
pub use token_service::*;
