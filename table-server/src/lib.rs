//! Mesa table server - table-service engine for a bar/restaurant POS
//!
//! # Architecture
//!
//! - **Registry** (`service::registry`): fixed and custom tables
//! - **Round store** (`service::rounds`): rounds of ordered items per table
//! - **Occupancy** (`service::occupancy`): free / serving / occupied, derived on read
//! - **Checkout** (`service::checkout`): whole or selective payment, daily ticket numbers
//! - **Transfer** (`service::transfer`): move a party to a free table
//! - **Accounting** (`service::accounting`): daily and monthly takings
//! - **Realtime** (`message`): post-commit signals over an in-process bus
//!
//! # Module layout
//!
//! ```text
//! table-server/src/
//! ├── core/          # config, state, startup errors
//! ├── auth.rs        # caller identity gate
//! ├── catalog.rs     # catalog lookup seam
//! ├── handler.rs     # request layer (ApiResponse)
//! ├── message/       # notifier + message bus
//! ├── service/       # storage, locks and table operations
//! └── utils/         # logger, business-timezone helpers
//! ```

pub mod auth;
pub mod catalog;
pub mod core;
pub mod handler;
pub mod message;
pub mod service;
pub mod utils;

// Re-export public types
pub use auth::{CallerIdentity, IdentityProvider, Role};
pub use catalog::{Catalog, MemoryCatalog};
pub use crate::core::{Config, ServerError, ServerState};
pub use handler::Handler;
pub use message::{BusMessage, MessageBus, Notifier, SignalKind, TableSignal, Topic, TransportError};
pub use service::{ServiceError, ServiceResult, TableService, TableStorage};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};
