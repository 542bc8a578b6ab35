mod revocation_list_redis;

pub use revocation_list_redis::*;
