//! # Domain Types
//!
//! The studio's entity graph.
//!
//! ## Ownership
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Entity Graph                                    │
//! │                                                                         │
//! │  Product ──owns──► ProductVariant ◄──ref── InventoryByLocation ──► Location
//! │     │                    ▲   ▲  ▲                                       │
//! │     └──owns──► Media     │   │  └──ref (set null)── CoaCertificate      │
//! │                          │   │                                          │
//! │  Order ──owns──► OrderItem ──┘ (protect)                               │
//! │    └────owns──► Payment  │                                              │
//! │                          │                                              │
//! │  Consignment ──owns──► ConsignmentItem (protect)                       │
//! │       ▲                                                                 │
//! │  Contact (gallery) ──cascade                                           │
//! │  Contact ──owns──► CrmNote;  Order.buyer / COA.purchaser: set null     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Identity
//! Every entity has a UUID v4 `id`. Products also carry a human-readable,
//! immutable `sku`.
//!
//! ## Money
//! Every `*_cents` field is an integer count of cents; decimal views are
//! derived through [`Money`].

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::{CommissionRate, Money};

// =============================================================================
// Enum helpers
// =============================================================================

/// Adds `as_str`, `ALL` and a field-aware `parse` to a snake_case enum.
///
/// `parse` is what filters coming in as query strings go through, so an
/// unknown value becomes a `NotAllowed` error keyed to the field.
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Stored / serialized representation.
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            /// Parses the stored representation, reporting against `field`.
            pub fn parse(field: &str, value: &str) -> Result<Self, ValidationError> {
                match value {
                    $($text => Ok($name::$variant),)+
                    _ => Err(ValidationError::NotAllowed {
                        field: field.to_string(),
                        allowed: Self::ALL.iter().map(|v| v.as_str().to_string()).collect(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

// =============================================================================
// Catalog
// =============================================================================

/// What kind of work a product is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ProductType {
    /// One-of-a-kind artwork.
    Original,
    /// Print run with a fixed edition size.
    LimitedPrint,
    /// Print run without an edition limit.
    OpenPrint,
    Merch,
}

text_enum!(ProductType {
    Original => "original",
    LimitedPrint => "limited_print",
    OpenPrint => "open_print",
    Merch => "merch",
});

/// A sellable artwork or design.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Stock Keeping Unit. Unique, never changes once assigned.
    pub sku: String,

    pub title: String,

    pub description: Option<String>,

    pub product_type: ProductType,

    pub artist: String,

    pub series: Option<String>,

    /// Inactive products stay in the catalog but are hidden from sale.
    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A purchasable option of a product, e.g. "18x24 Hahnemühle".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ProductVariant {
    pub id: String,
    pub product_id: String,
    pub option_label: String,
    pub price_cents: i64,
    /// `None` means an open edition.
    pub edition_size: Option<i64>,
    pub edition_sold: i64,
    pub weight_grams: Option<i64>,
    pub taxable: bool,
}

impl ProductVariant {
    /// Returns the price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// More units recorded as sold than the edition holds.
    ///
    /// Nothing rejects this state; it is surfaced so the studio can see it.
    pub fn is_oversold(&self) -> bool {
        matches!(self.edition_size, Some(size) if self.edition_sold > size)
    }
}

/// Role of an image within a product's gallery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Primary,
    Detail,
    Framed,
    InSitu,
}

text_enum!(MediaKind {
    Primary => "primary",
    Detail => "detail",
    Framed => "framed",
    InSitu => "in_situ",
});

/// An image attached to a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Media {
    pub id: String,
    pub product_id: String,
    pub kind: MediaKind,
    /// Storage path relative to the media root, e.g. `products/2025/09/x.jpg`.
    pub image: Option<String>,
    pub alt_text: Option<String>,
}

impl Media {
    /// The uploaded file. Admin screens read it under this name.
    pub fn file(&self) -> Option<&str> {
        self.image.as_deref()
    }
}

// =============================================================================
// Contacts / CRM
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ContactKind {
    Collector,
    Vendor,
    Gallery,
    Staff,
    Other,
}

text_enum!(ContactKind {
    Collector => "collector",
    Vendor => "vendor",
    Gallery => "gallery",
    Staff => "staff",
    Other => "other",
});

/// A person or organization the studio deals with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Contact {
    pub id: String,
    pub kind: ContactKind,
    pub name: String,
    /// Unique across contacts when present.
    pub email: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
}

/// A timestamped note on a contact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CrmNote {
    pub id: String,
    pub contact_id: String,
    pub note: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Locations & Inventory
// =============================================================================

/// A physical stock location such as "Studio" or "Gallery".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Location {
    pub id: String,
    pub name: String,
    pub is_sellable: bool,
}

/// Units of one variant on hand at one location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InventoryByLocation {
    pub id: String,
    pub variant_id: String,
    pub location_id: String,
    pub on_hand: i64,
}

// =============================================================================
// Orders / Payments
// =============================================================================

/// Where a sale happened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderChannel {
    #[default]
    Online,
    InPerson,
    Consignment,
}

text_enum!(OrderChannel {
    Online => "online",
    InPerson => "in_person",
    Consignment => "consignment",
});

/// Lifecycle state of an order. Transitions are not restricted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Paid,
    Fulfilled,
    Cancelled,
    Refunded,
}

text_enum!(OrderStatus {
    Pending => "pending",
    Paid => "paid",
    Fulfilled => "fulfilled",
    Cancelled => "cancelled",
    Refunded => "refunded",
});

/// A sale transaction.
///
/// The cents fields are stored exactly as supplied; nothing here sums
/// line items, tax or shipping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Order {
    pub id: String,
    /// Cleared when the contact is deleted.
    pub buyer_contact_id: Option<String>,
    pub channel: OrderChannel,
    pub status: OrderStatus,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub shipping_cents: i64,
    pub total_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub paid_at: Option<DateTime<Utc>>,
}

impl Order {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

/// A line item of an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub variant_id: String,
    pub qty: i64,
    pub unit_price_cents: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    Cash,
    Check,
    Stripe,
    Paypal,
}

text_enum!(PaymentMethod {
    Card => "card",
    Cash => "cash",
    Check => "check",
    Stripe => "stripe",
    Paypal => "paypal",
});

/// A payment received against an order. Ledger only, no gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Payment {
    pub id: String,
    pub order_id: String,
    pub method: PaymentMethod,
    pub amount_cents: i64,
    #[ts(as = "String")]
    pub received_at: DateTime<Utc>,
}

impl Payment {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

// =============================================================================
// Certificates of Authenticity
// =============================================================================

/// Provenance document for a sold unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CoaCertificate {
    pub id: String,
    pub product_id: Option<String>,
    pub variant_id: Option<String>,
    /// Edition number as printed, e.g. "7/50".
    pub serial_no: String,
    pub purchaser_contact_id: Option<String>,
    #[ts(as = "String")]
    pub issued_at: DateTime<Utc>,
}

// =============================================================================
// Consignments
// =============================================================================

/// An agreement under which a gallery sells work for a commission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Consignment {
    pub id: String,
    /// Always a contact of kind `gallery`.
    pub gallery_contact_id: String,
    #[ts(as = "String")]
    pub start_date: NaiveDate,
    #[ts(as = "Option<String>")]
    pub end_date: Option<NaiveDate>,
    /// 4000 = 40.00%
    pub commission_rate_bps: u32,
}

impl Consignment {
    #[inline]
    pub fn commission_rate(&self) -> CommissionRate {
        CommissionRate::from_bps(self.commission_rate_bps)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ConsignmentItem {
    pub id: String,
    pub consignment_id: String,
    pub variant_id: String,
    pub qty: i64,
    pub listed_price_cents: i64,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn variant(edition_size: Option<i64>, edition_sold: i64) -> ProductVariant {
        ProductVariant {
            id: "v".to_string(),
            product_id: "p".to_string(),
            option_label: "18x24".to_string(),
            price_cents: 12500,
            edition_size,
            edition_sold,
            weight_grams: None,
            taxable: true,
        }
    }

    #[test]
    fn test_variant_oversold() {
        assert!(!variant(None, 1000).is_oversold());
        assert!(!variant(Some(50), 50).is_oversold());
        assert!(variant(Some(50), 51).is_oversold());
    }

    #[test]
    fn test_variant_price() {
        assert_eq!(variant(None, 0).price().display_decimal(), "125.00");
    }

    #[test]
    fn test_enum_parse_and_as_str() {
        assert_eq!(
            ProductType::parse("product_type", "limited_print").unwrap(),
            ProductType::LimitedPrint
        );
        assert_eq!(MediaKind::InSitu.as_str(), "in_situ");
        assert_eq!(OrderChannel::InPerson.to_string(), "in_person");

        let err = OrderStatus::parse("status", "shipped").unwrap_err();
        match err {
            ValidationError::NotAllowed { field, allowed } => {
                assert_eq!(field, "status");
                assert_eq!(allowed.len(), OrderStatus::ALL.len());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_enum_serde_matches_as_str() {
        for kind in ContactKind::ALL {
            let json = serde_json::to_string(kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
        for method in PaymentMethod::ALL {
            let json = serde_json::to_string(method).unwrap();
            assert_eq!(json, format!("\"{}\"", method.as_str()));
        }
    }

    #[test]
    fn test_order_defaults() {
        assert_eq!(OrderChannel::default(), OrderChannel::Online);
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
    }

    #[test]
    fn test_media_file_mirrors_image() {
        let media = Media {
            id: "m".to_string(),
            product_id: "p".to_string(),
            kind: MediaKind::Primary,
            image: Some("products/2025/09/dawn.jpg".to_string()),
            alt_text: None,
        };
        assert_eq!(media.file(), Some("products/2025/09/dawn.jpg"));
    }
}
