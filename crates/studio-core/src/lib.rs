//! # studio-core: Pure Domain Logic for Studio Inventory
//!
//! This crate holds the data model of the studio tracker and every rule
//! that can be checked without touching storage.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Studio Inventory Architecture                        │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              API layer / Admin UI (external)                    │   │
//! │  │    list, retrieve, create, update, delete per entity            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ studio-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │    sku    │  │ validation│  │   │
//! │  │   │  Product  │  │   Money   │  │ normalize │  │  inputs   │  │   │
//! │  │   │  Order    │  │  dollars  │  │ allocate  │  │  reports  │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    studio-db (Database Layer)                   │   │
//! │  │        SQLite schema, transactions, delete policies             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Entities and enums (Product, Order, Consignment, ...)
//! - [`money`] - Integer cents, decimal display, exact dollar parsing
//! - [`sku`] - Product code normalization and unique allocation
//! - [`validation`] - Write inputs and their field validation
//! - [`views`] - Read models with resolved names for the API layer
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use studio_core::money::{parse_dollars, Money};
//! use studio_core::sku::normalize;
//!
//! assert_eq!(normalize("Patricia Forbes-Sunset #3!!"), "PATRICIA-FORBES-SUNSET-3");
//!
//! let cents = parse_dollars("price_dollars", "19.99").unwrap();
//! assert_eq!(Money::from_cents(cents).display_decimal(), "19.99");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod sku;
pub mod types;
pub mod validation;
pub mod views;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError, ValidationErrors};
pub use money::{CommissionRate, Money};
pub use types::*;
pub use views::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum length of a product SKU.
pub const SKU_MAX_LEN: usize = 255;

/// Upper bound on `-N` suffixes tried when allocating a SKU.
pub const MAX_SKU_ATTEMPTS: u32 = 10_000;

/// Artist recorded on a product when none is supplied.
pub const DEFAULT_ARTIST: &str = "Patricia Forbes";

/// Maximum length of short text fields (titles, names, labels).
pub const MAX_NAME_LEN: usize = 255;

/// Maximum length of phone numbers and COA serial numbers.
pub const MAX_SHORT_TEXT_LEN: usize = 50;
