// Domain-layer modules and shared errors/models
pub mod normalizer {
    pub use crate::normalizer::*;
}

pub mod patterns {
    pub use crate::patterns::*;
}

pub mod risk {
    pub use crate::risk::*;
}

pub mod analysis {
    pub use crate::analysis::*;
}

pub mod models {
    pub use crate::models::*;
}

pub mod errors {
    pub use crate::errors::*;
}
