//! HTTP dev server.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │   GET <base>/@imagetools/{id}      GET /@load/{*path}?{query}   │
//! │                                                                 │
//! │  ┌──────────────────┐  ┌─────────────┐  ┌───────────────────┐   │
//! │  │  dev middleware  │  │  handlers   │  │      routes       │   │
//! │  │ (DevRegistry)    │  │ (load hook) │  │  (router config)  │   │
//! │  └──────────────────┘  └─────────────┘  └───────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod handlers;
pub mod routes;

pub use handlers::{
    dev_middleware, health_handler, load_handler, not_found_handler, AppState, ErrorResponse,
    HealthResponse,
};
pub use routes::{create_router, RouterConfig};
