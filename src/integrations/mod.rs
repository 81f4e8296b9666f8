//! External source integrations.

pub mod probes {
    pub use crate::probes::*;
}

pub mod services {
    pub use crate::services::*;
}

pub mod circuit_breaker {
    pub use crate::circuit_breaker::*;
}
