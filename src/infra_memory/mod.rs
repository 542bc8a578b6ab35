mod principal_repo_memory;
mod repo_tx_memory;
mod revocation_list_memory;
mod token_family_repo_memory;

pub use principal_repo_memory::*;
pub use repo_tx_memory::*;
pub use revocation_list_memory::*;
pub use token_family_repo_memory::*;
