//! # Validation Module
//!
//! Write inputs for every entity and the field rules they must satisfy.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Input::validate() (THIS MODULE)                              │
//! │  ├── Required fields, lengths, ranges, formats                         │
//! │  └── Every failing field collected into one ValidationErrors report    │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Repository (studio-db, same transaction as the write)        │
//! │  ├── Referenced rows exist                                             │
//! │  └── Unique values are free                                            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── UNIQUE constraints                                                │
//! │  └── Foreign key constraints with ON DELETE policies                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Inputs carry `Option`s for anything with a default, so a missing value
//! and an explicit value are distinguishable. Required enums are optional
//! too; leaving one out yields a `Required` error instead of a
//! deserialization failure.
//!
//! ## Usage
//! ```rust
//! use studio_core::validation::ContactInput;
//! use studio_core::ContactKind;
//!
//! let input = ContactInput {
//!     kind: Some(ContactKind::Collector),
//!     name: "Ada Lovelace".to_string(),
//!     email: Some("not-an-email".to_string()),
//!     ..Default::default()
//! };
//! let report = input.validate().unwrap_err();
//! assert!(report.has("email"));
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{ValidationError, ValidationErrors};
use crate::money::{parse_dollars, CommissionRate};
use crate::types::{
    ContactKind, MediaKind, OrderChannel, OrderStatus, PaymentMethod, ProductType,
};
use crate::{DEFAULT_ARTIST, MAX_NAME_LEN, MAX_SHORT_TEXT_LEN, SKU_MAX_LEN};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Maximum length of a stored media path.
pub const MAX_FILE_PATH_LEN: usize = 100;

/// Maximum length of an email address.
pub const MAX_EMAIL_LEN: usize = 254;

/// Maximum length of a list search term.
pub const MAX_SEARCH_LEN: usize = 100;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a required text field.
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most `max` characters
///
/// ## Example
/// ```rust
/// use studio_core::validation::validate_required_text;
///
/// assert!(validate_required_text("title", "Sunset #3", 255).is_ok());
/// assert!(validate_required_text("title", "   ", 255).is_err());
/// ```
pub fn validate_required_text(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    validate_max_len(field, value, max)
}

/// Validates an optional text field; `None` always passes.
pub fn validate_optional_text(field: &str, value: Option<&str>, max: usize) -> ValidationResult<()> {
    match value {
        Some(v) => validate_max_len(field, v, max),
        None => Ok(()),
    }
}

fn validate_max_len(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

/// Validates an email address.
///
/// ## Rules
/// - Exactly one `@` with a non-empty local part
/// - Domain has at least one dot and no empty labels
/// - No whitespace, at most 254 characters
pub fn validate_email(field: &str, email: &str) -> ValidationResult<()> {
    validate_max_len(field, email, MAX_EMAIL_LEN)?;

    let invalid = || ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid email address".to_string(),
    };

    if email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;

    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|l| l.is_empty()) {
        return Err(invalid());
    }

    Ok(())
}

/// Validates a search query.
///
/// ## Rules
/// - Can be empty (no filtering)
/// - Maximum 100 characters
///
/// ## Returns
/// The trimmed query string.
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();

    if query.chars().count() > MAX_SEARCH_LEN {
        return Err(ValidationError::TooLong {
            field: "search".to_string(),
            max: MAX_SEARCH_LEN,
        });
    }

    Ok(query.to_string())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a count or amount that may be zero but not negative.
///
/// ## Example
/// ```rust
/// use studio_core::validation::validate_non_negative;
///
/// assert!(validate_non_negative("price_cents", 0).is_ok());
/// assert!(validate_non_negative("price_cents", -100).is_err());
/// ```
pub fn validate_non_negative(field: &str, value: i64) -> ValidationResult<()> {
    if value < 0 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a line quantity. Must be at least one.
pub fn validate_quantity(field: &str, qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }

    Ok(())
}

fn validate_optional_non_negative(field: &str, value: Option<i64>) -> ValidationResult<()> {
    value.map_or(Ok(()), |v| validate_non_negative(field, v))
}

// =============================================================================
// Reference Validators
// =============================================================================

/// Validates a UUID string format.
///
/// ## Example
/// ```rust
/// use studio_core::validation::validate_uuid;
///
/// assert!(validate_uuid("product_id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("product_id", "not-a-uuid").is_err());
/// ```
pub fn validate_uuid(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

fn validate_optional_uuid(field: &str, id: Option<&str>) -> ValidationResult<()> {
    id.map_or(Ok(()), |id| validate_uuid(field, id))
}

/// Unwraps a required value or reports it missing.
pub fn require<T: Copy>(field: &str, value: Option<T>) -> ValidationResult<T> {
    value.ok_or_else(|| ValidationError::Required {
        field: field.to_string(),
    })
}

/// Trims an optional string, mapping blank to `None`.
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

// =============================================================================
// Catalog Inputs
// =============================================================================

/// Create / update payload for a product.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductInput {
    /// Left blank to have one allocated from artist and title.
    pub sku: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub product_type: Option<ProductType>,
    pub artist: Option<String>,
    pub series: Option<String>,
    pub is_active: Option<bool>,
    #[ts(as = "Option<String>")]
    pub created_at: Option<DateTime<Utc>>,
}

impl ProductInput {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        errors.check(validate_optional_text("sku", self.manual_sku(), SKU_MAX_LEN));
        errors.check(validate_required_text("title", &self.title, MAX_NAME_LEN));
        errors.check(require("product_type", self.product_type).map(|_| ()));
        if let Some(artist) = &self.artist {
            errors.check(validate_required_text("artist", artist, MAX_NAME_LEN));
        }
        errors.check(validate_optional_text("series", self.series.as_deref(), MAX_NAME_LEN));

        errors.into_result()
    }

    /// The caller-chosen SKU, trimmed, or `None` when it should be allocated.
    pub fn manual_sku(&self) -> Option<&str> {
        non_blank(self.sku.as_deref())
    }

    pub fn artist_or_default(&self) -> &str {
        non_blank(self.artist.as_deref()).unwrap_or(DEFAULT_ARTIST)
    }

    /// Free text the SKU allocator derives a code from.
    pub fn sku_base(&self) -> String {
        format!("{}-{}", self.artist_or_default(), self.title.trim())
    }
}

/// Create / update payload for a product variant.
///
/// The price may be given as cents or as a dollar string; when both are
/// present the dollar string wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct VariantInput {
    pub product_id: String,
    pub option_label: String,
    pub price_cents: Option<i64>,
    pub price_dollars: Option<String>,
    pub edition_size: Option<i64>,
    pub edition_sold: Option<i64>,
    pub weight_grams: Option<i64>,
    pub taxable: Option<bool>,
}

impl VariantInput {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        errors.check(validate_uuid("product_id", &self.product_id));
        errors.check(validate_required_text("option_label", &self.option_label, MAX_NAME_LEN));
        errors.check(self.resolved_price_cents().map(|_| ()));
        errors.check(validate_optional_non_negative("edition_size", self.edition_size));
        errors.check(validate_optional_non_negative("edition_sold", self.edition_sold));
        errors.check(validate_optional_non_negative("weight_grams", self.weight_grams));

        errors.into_result()
    }

    /// The price in cents after applying the dollar-string precedence.
    pub fn resolved_price_cents(&self) -> ValidationResult<i64> {
        if let Some(dollars) = non_blank(self.price_dollars.as_deref()) {
            return parse_dollars("price_dollars", dollars);
        }

        let cents = require("price_cents", self.price_cents)?;
        validate_non_negative("price_cents", cents)?;
        Ok(cents)
    }
}

/// Create / update payload for a product image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MediaInput {
    pub product_id: String,
    pub kind: Option<MediaKind>,
    pub image: Option<String>,
    pub alt_text: Option<String>,
}

impl MediaInput {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        errors.check(validate_uuid("product_id", &self.product_id));
        errors.check(require("kind", self.kind).map(|_| ()));
        errors.check(validate_optional_text("image", self.image.as_deref(), MAX_FILE_PATH_LEN));
        errors.check(validate_optional_text("alt_text", self.alt_text.as_deref(), MAX_NAME_LEN));

        errors.into_result()
    }
}

// =============================================================================
// Contact Inputs
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ContactInput {
    pub kind: Option<ContactKind>,
    pub name: String,
    /// Blank is stored as no email.
    pub email: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
}

impl ContactInput {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        errors.check(require("kind", self.kind).map(|_| ()));
        errors.check(validate_required_text("name", &self.name, MAX_NAME_LEN));
        if let Some(email) = self.normalized_email() {
            errors.check(validate_email("email", email));
        }
        errors.check(validate_optional_text("phone", self.phone.as_deref(), MAX_SHORT_TEXT_LEN));

        errors.into_result()
    }

    /// Trimmed email, `None` when absent or blank.
    pub fn normalized_email(&self) -> Option<&str> {
        non_blank(self.email.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CrmNoteInput {
    pub contact_id: String,
    pub note: String,
    #[ts(as = "Option<String>")]
    pub created_at: Option<DateTime<Utc>>,
}

impl CrmNoteInput {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        errors.check(validate_uuid("contact_id", &self.contact_id));
        if self.note.trim().is_empty() {
            errors.push(ValidationError::Required {
                field: "note".to_string(),
            });
        }

        errors.into_result()
    }
}

// =============================================================================
// Location & Inventory Inputs
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LocationInput {
    pub name: String,
    pub is_sellable: Option<bool>,
}

impl LocationInput {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.check(validate_required_text("name", &self.name, MAX_NAME_LEN));
        errors.into_result()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InventoryInput {
    pub variant_id: String,
    pub location_id: String,
    pub on_hand: Option<i64>,
}

impl InventoryInput {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        errors.check(validate_uuid("variant_id", &self.variant_id));
        errors.check(validate_uuid("location_id", &self.location_id));
        errors.check(validate_optional_non_negative("on_hand", self.on_hand));

        errors.into_result()
    }
}

// =============================================================================
// Order Inputs
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderInput {
    pub buyer_contact_id: Option<String>,
    pub channel: Option<OrderChannel>,
    pub status: Option<OrderStatus>,
    pub subtotal_cents: Option<i64>,
    pub tax_cents: Option<i64>,
    pub shipping_cents: Option<i64>,
    pub total_cents: Option<i64>,
    #[ts(as = "Option<String>")]
    pub created_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub paid_at: Option<DateTime<Utc>>,
}

impl OrderInput {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        errors.check(validate_optional_uuid("buyer_contact_id", self.buyer_contact_id()));
        errors.check(validate_optional_non_negative("subtotal_cents", self.subtotal_cents));
        errors.check(validate_optional_non_negative("tax_cents", self.tax_cents));
        errors.check(validate_optional_non_negative("shipping_cents", self.shipping_cents));
        errors.check(validate_optional_non_negative("total_cents", self.total_cents));

        errors.into_result()
    }

    pub fn buyer_contact_id(&self) -> Option<&str> {
        non_blank(self.buyer_contact_id.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderItemInput {
    pub order_id: String,
    pub variant_id: String,
    pub qty: i64,
    pub unit_price_cents: i64,
}

impl OrderItemInput {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        errors.check(validate_uuid("order_id", &self.order_id));
        errors.check(validate_uuid("variant_id", &self.variant_id));
        errors.check(validate_quantity("qty", self.qty));
        errors.check(validate_non_negative("unit_price_cents", self.unit_price_cents));

        errors.into_result()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentInput {
    pub order_id: String,
    pub method: Option<PaymentMethod>,
    pub amount_cents: i64,
    #[ts(as = "Option<String>")]
    pub received_at: Option<DateTime<Utc>>,
}

impl PaymentInput {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        errors.check(validate_uuid("order_id", &self.order_id));
        errors.check(require("method", self.method).map(|_| ()));
        errors.check(validate_non_negative("amount_cents", self.amount_cents));

        errors.into_result()
    }
}

// =============================================================================
// Certificate Input
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CoaInput {
    pub product_id: Option<String>,
    pub variant_id: Option<String>,
    pub serial_no: String,
    pub purchaser_contact_id: Option<String>,
    #[ts(as = "Option<String>")]
    pub issued_at: Option<DateTime<Utc>>,
}

impl CoaInput {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        errors.check(validate_optional_uuid("product_id", self.product_id()));
        errors.check(validate_optional_uuid("variant_id", self.variant_id()));
        errors.check(validate_required_text("serial_no", &self.serial_no, MAX_SHORT_TEXT_LEN));
        errors.check(validate_optional_uuid(
            "purchaser_contact_id",
            self.purchaser_contact_id(),
        ));

        errors.into_result()
    }

    pub fn product_id(&self) -> Option<&str> {
        non_blank(self.product_id.as_deref())
    }

    pub fn variant_id(&self) -> Option<&str> {
        non_blank(self.variant_id.as_deref())
    }

    pub fn purchaser_contact_id(&self) -> Option<&str> {
        non_blank(self.purchaser_contact_id.as_deref())
    }
}

// =============================================================================
// Consignment Inputs
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ConsignmentInput {
    pub gallery_contact_id: String,
    #[ts(as = "Option<String>")]
    pub start_date: Option<NaiveDate>,
    #[ts(as = "Option<String>")]
    pub end_date: Option<NaiveDate>,
    /// Percentage with up to two decimals, e.g. `"40.00"`.
    pub commission_rate: String,
}

impl ConsignmentInput {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        errors.check(validate_uuid("gallery_contact_id", &self.gallery_contact_id));
        errors.check(self.commission_rate().map(|_| ()));

        match (self.start_date, self.end_date) {
            (None, _) => errors.push(ValidationError::Required {
                field: "start_date".to_string(),
            }),
            (Some(start), Some(end)) if end < start => {
                errors.push(ValidationError::InvalidFormat {
                    field: "end_date".to_string(),
                    reason: "must not be before start_date".to_string(),
                })
            }
            _ => {}
        }

        errors.into_result()
    }

    pub fn commission_rate(&self) -> ValidationResult<CommissionRate> {
        if self.commission_rate.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "commission_rate".to_string(),
            });
        }
        CommissionRate::parse("commission_rate", &self.commission_rate)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ConsignmentItemInput {
    pub consignment_id: String,
    pub variant_id: String,
    pub qty: i64,
    pub listed_price_cents: i64,
}

impl ConsignmentItemInput {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        errors.check(validate_uuid("consignment_id", &self.consignment_id));
        errors.check(validate_uuid("variant_id", &self.variant_id));
        errors.check(validate_quantity("qty", self.qty));
        errors.check(validate_non_negative("listed_price_cents", self.listed_price_cents));

        errors.into_result()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "550e8400-e29b-41d4-a716-446655440000";

    #[test]
    fn test_validate_required_text() {
        assert!(validate_required_text("title", "Sunset", 255).is_ok());
        assert!(validate_required_text("title", "", 255).is_err());
        assert!(validate_required_text("title", &"A".repeat(256), 255).is_err());
        // length is measured in characters, not bytes
        assert!(validate_required_text("title", &"ü".repeat(255), 255).is_ok());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("email", "pf@studio.art").is_ok());
        assert!(validate_email("email", "first.last@mail.example.com").is_ok());

        for bad in ["plain", "@studio.art", "pf@", "pf@studio", "pf@studio..art", "p f@studio.art", "a@b@c.d"] {
            assert!(validate_email("email", bad).is_err(), "{bad} accepted");
        }
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("id", ID).is_ok());
        assert!(matches!(validate_uuid("id", ""), Err(ValidationError::Required { .. })));
        assert!(matches!(
            validate_uuid("id", "123"),
            Err(ValidationError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn test_validate_search_query() {
        assert_eq!(validate_search_query("  dawn ").unwrap(), "dawn");
        assert!(validate_search_query(&"q".repeat(101)).is_err());
    }

    #[test]
    fn test_product_input_collects_every_error() {
        let input = ProductInput {
            title: "  ".to_string(),
            series: Some("S".repeat(300)),
            ..Default::default()
        };
        let report = input.validate().unwrap_err();
        assert_eq!(report.len(), 3);
        assert!(report.has("title"));
        assert!(report.has("product_type"));
        assert!(report.has("series"));
    }

    #[test]
    fn test_product_input_sku_base_uses_default_artist() {
        let input = ProductInput {
            title: "Sunset #3!!".to_string(),
            product_type: Some(ProductType::Original),
            sku: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(input.validate().is_ok());
        assert_eq!(input.manual_sku(), None);
        assert_eq!(input.sku_base(), "Patricia Forbes-Sunset #3!!");
    }

    #[test]
    fn test_variant_price_dollars_wins() {
        let input = VariantInput {
            product_id: ID.to_string(),
            option_label: "18x24".to_string(),
            price_cents: Some(100),
            price_dollars: Some("19.99".to_string()),
            ..Default::default()
        };
        assert_eq!(input.resolved_price_cents().unwrap(), 1999);
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_variant_price_required() {
        let input = VariantInput {
            product_id: ID.to_string(),
            option_label: "18x24".to_string(),
            ..Default::default()
        };
        let report = input.validate().unwrap_err();
        assert!(matches!(
            report.get("price_cents"),
            Some(ValidationError::Required { .. })
        ));
    }

    #[test]
    fn test_variant_bad_dollars_keyed_to_field() {
        let input = VariantInput {
            product_id: ID.to_string(),
            option_label: "18x24".to_string(),
            price_cents: Some(100),
            price_dollars: Some("twelve".to_string()),
            edition_sold: Some(-1),
            ..Default::default()
        };
        let report = input.validate().unwrap_err();
        assert!(matches!(
            report.get("price_dollars"),
            Some(ValidationError::InvalidMoney { .. })
        ));
        assert!(report.has("edition_sold"));
    }

    #[test]
    fn test_contact_blank_email_is_none() {
        let input = ContactInput {
            kind: Some(ContactKind::Collector),
            name: "Ada".to_string(),
            email: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(input.validate().is_ok());
        assert_eq!(input.normalized_email(), None);
    }

    #[test]
    fn test_order_item_quantity_must_be_positive() {
        let input = OrderItemInput {
            order_id: ID.to_string(),
            variant_id: ID.to_string(),
            qty: 0,
            unit_price_cents: 500,
        };
        assert!(input.validate().unwrap_err().has("qty"));
    }

    #[test]
    fn test_order_rejects_negative_money() {
        let input = OrderInput {
            total_cents: Some(-1),
            ..Default::default()
        };
        assert!(input.validate().unwrap_err().has("total_cents"));
        assert!(OrderInput::default().validate().is_ok());
    }

    #[test]
    fn test_coa_serial_required_and_bounded() {
        let input = CoaInput {
            serial_no: "7/50".to_string(),
            variant_id: Some(ID.to_string()),
            ..Default::default()
        };
        assert!(input.validate().is_ok());

        let input = CoaInput {
            serial_no: "9".repeat(51),
            ..Default::default()
        };
        assert!(input.validate().unwrap_err().has("serial_no"));
    }

    #[test]
    fn test_consignment_dates_and_rate() {
        let start = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let input = ConsignmentInput {
            gallery_contact_id: ID.to_string(),
            start_date: Some(start),
            end_date: Some(start.pred_opt().unwrap()),
            commission_rate: "40.005".to_string(),
        };
        let report = input.validate().unwrap_err();
        assert!(report.has("end_date"));
        assert!(report.has("commission_rate"));

        let input = ConsignmentInput {
            gallery_contact_id: ID.to_string(),
            start_date: Some(start),
            end_date: None,
            commission_rate: "40".to_string(),
        };
        assert!(input.validate().is_ok());
        assert_eq!(input.commission_rate().unwrap().bps(), 4000);
    }
}
