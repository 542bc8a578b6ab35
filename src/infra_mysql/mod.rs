mod principal_repo_mysql;
mod token_family_repo_mysql;

pub use principal_repo_mysql::*;
pub use token_family_repo_mysql::*;

mod repo_tx_mysql;

pub use repo_tx_mysql::*;
