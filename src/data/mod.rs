//! Result cache storage.

pub mod cache {
    pub use crate::cache::*;
}

pub mod cache_validator {
    pub use crate::cache_validator::*;
}

pub mod db {
    pub use crate::db::*;
}
