//! External service integrations.

pub mod providers {
    pub use crate::providers::*;
}

pub mod llm_client {
    pub use crate::llm_client::*;
}

pub mod store {
    pub use crate::store::*;
}
