//! # Observability
//!
//! - `logging`: tracing subscriber construction (text or JSON, `RUST_LOG` filtering)

pub mod logging;

pub use logging::{build_dispatch, LogFormat};
