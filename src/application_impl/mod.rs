mod login_service_impl;
mod rate_gate_impl;
mod signer;
mod token_service_impl;

pub use login_service_impl::*;
pub use rate_gate_impl::*;
pub use signer::*;
pub use token_service_impl::*;
