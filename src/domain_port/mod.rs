// store

mod revocation_list;

pub use revocation_list::*;

// repo

mod principal_repo;
mod token_family_repo;

mod rate_gate;
mod repo_tx;

pub use principal_repo::*;
pub use rate_gate::*;
pub use repo_tx::*;
pub use token_family_repo::*;
