//! # studio-db: Persistence for the Art Studio
//!
//! SQLite storage for catalog, contacts, stock, sales and provenance,
//! accessed through one repository per entity.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Studio Data Flow                                 │
//! │                                                                         │
//! │  Caller (admin UI, API handler, seed binary)                           │
//! │       │   ProductInput / OrderInput / ...  (studio-core)               │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    studio-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │ (repository/) │    │  (embedded)  │  │   │
//! │  │   │               │    │               │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ validate      │    │ 001_initial_ │  │   │
//! │  │   │ foreign_keys  │    │ check refs    │    │   schema.sql │  │   │
//! │  │   │ WAL           │    │ write in tx   │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite file (STUDIO_DB_PATH, default ./studio.db)                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - Environment-driven settings
//! - [`pool`] - Connection pool and repository accessors
//! - [`migrations`] - Embedded schema migrations
//! - [`error`] - Database error types
//! - [`repository`] - One repository per entity, plus paging types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use studio_core::validation::ProductInput;
//! use studio_core::ProductType;
//! use studio_db::{Database, StudioConfig};
//!
//! let config = StudioConfig::from_env()?;
//! let db = Database::new(config.db_config()).await?;
//!
//! let product = db
//!     .products()
//!     .create(&ProductInput {
//!         title: "Harbor at Dusk".to_string(),
//!         product_type: Some(ProductType::LimitedPrint),
//!         ..Default::default()
//!     })
//!     .await?;
//! assert_eq!(product.sku, "PATRICIA-FORBES-HARBOR-AT-DUSK");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{ConfigError, StudioConfig};
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use repository::{Page, PageRequest, SortDirection};

// Repository re-exports for convenience
pub use repository::coa::{CoaFilter, CoaRepository};
pub use repository::consignment::{ConsignmentFilter, ConsignmentRepository};
pub use repository::consignment_item::{ConsignmentItemFilter, ConsignmentItemRepository};
pub use repository::contact::{ContactFilter, ContactRepository};
pub use repository::crm_note::{CrmNoteFilter, CrmNoteRepository};
pub use repository::inventory::{InventoryFilter, InventoryRepository};
pub use repository::location::{LocationFilter, LocationRepository};
pub use repository::media::{MediaFilter, MediaRepository};
pub use repository::order::{OrderFilter, OrderRepository, OrderSort};
pub use repository::order_item::{OrderItemFilter, OrderItemRepository};
pub use repository::payment::{PaymentFilter, PaymentRepository};
pub use repository::product::{ProductFilter, ProductRepository, ProductSort, ProductWithChildren};
pub use repository::variant::{VariantFilter, VariantRepository, VariantSort};
