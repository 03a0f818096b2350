//! # Read Models
//!
//! What the API layer and admin UI see when they read an entity: the stored
//! row flattened, plus resolved names and derived display values.
//!
//! ```text
//! ┌──────────────────────┐        ┌──────────────────────────────────────┐
//! │ ProductVariant (row) │ ─────► │ VariantView                          │
//! │   price_cents: 1999  │        │   ...row fields...                   │
//! │   product_id: "..."  │        │   price: "19.99"                     │
//! └──────────────────────┘        │   product_title: "Sunset #3"         │
//!                                 └──────────────────────────────────────┘
//! ```
//!
//! Views are built by studio-db from joined queries and never written back.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::types::{
    CoaCertificate, Consignment, ConsignmentItem, CrmNote, InventoryByLocation, Media, Order,
    OrderItem, ProductVariant,
};

// =============================================================================
// Catalog
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct VariantView {
    #[serde(flatten)]
    pub variant: ProductVariant,
    /// Two-decimal price, e.g. "19.99".
    pub price: String,
    pub product_title: String,
}

impl VariantView {
    pub fn new(variant: ProductVariant, product_title: String) -> Self {
        let price = variant.price().display_decimal();
        VariantView {
            variant,
            price,
            product_title,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MediaView {
    #[serde(flatten)]
    pub media: Media,
    pub product_title: String,
    /// Absolute URL of the image, when there is one and a base URL is known.
    pub file_url: Option<String>,
}

impl MediaView {
    pub fn new(media: Media, product_title: String, media_base_url: Option<&str>) -> Self {
        let file_url = match (media_base_url, media.file()) {
            (Some(base), Some(path)) => Some(media_url(base, path)),
            _ => None,
        };
        MediaView {
            media,
            product_title,
            file_url,
        }
    }
}

/// Joins a base URL and a stored path with exactly one slash.
pub fn media_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

// =============================================================================
// CRM / Inventory
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CrmNoteView {
    #[serde(flatten)]
    pub note: CrmNote,
    pub contact_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InventoryView {
    #[serde(flatten)]
    pub row: InventoryByLocation,
    /// Title of the variant's product.
    pub product: String,
    pub variant_label: String,
    pub location_name: String,
}

// =============================================================================
// Orders
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderItemView {
    #[serde(flatten)]
    pub item: OrderItem,
    pub variant_label: String,
    pub product_title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub buyer_name: Option<String>,
    pub items: Vec<OrderItemView>,
}

// =============================================================================
// Provenance / Consignment
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CoaView {
    #[serde(flatten)]
    pub certificate: CoaCertificate,
    pub product_title: Option<String>,
    pub variant_label: Option<String>,
    pub purchaser_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ConsignmentItemView {
    #[serde(flatten)]
    pub item: ConsignmentItem,
    pub variant_label: String,
    pub product_title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ConsignmentView {
    #[serde(flatten)]
    pub consignment: Consignment,
    pub gallery_name: String,
    /// Commission as a two-decimal percentage, e.g. "40.00".
    pub commission_rate: String,
    pub items: Vec<ConsignmentItemView>,
}

impl ConsignmentView {
    pub fn new(consignment: Consignment, gallery_name: String, items: Vec<ConsignmentItemView>) -> Self {
        let commission_rate = consignment.commission_rate().to_string();
        ConsignmentView {
            consignment,
            gallery_name,
            commission_rate,
            items,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MediaKind;
    use chrono::NaiveDate;

    #[test]
    fn test_variant_view_flattens_and_formats_price() {
        let variant = ProductVariant {
            id: "v1".to_string(),
            product_id: "p1".to_string(),
            option_label: "18x24".to_string(),
            price_cents: 1999,
            edition_size: Some(50),
            edition_sold: 0,
            weight_grams: None,
            taxable: true,
        };
        let view = VariantView::new(variant, "Sunset #3".to_string());
        let json = serde_json::to_value(&view).unwrap();

        assert_eq!(json["price"], "19.99");
        assert_eq!(json["price_cents"], 1999);
        assert_eq!(json["option_label"], "18x24");
        assert_eq!(json["product_title"], "Sunset #3");
        assert!(json.get("variant").is_none());
    }

    #[test]
    fn test_media_view_file_url() {
        let media = Media {
            id: "m1".to_string(),
            product_id: "p1".to_string(),
            kind: MediaKind::Detail,
            image: Some("products/2025/09/dawn.jpg".to_string()),
            alt_text: None,
        };

        let view = MediaView::new(media.clone(), "Dawn".to_string(), Some("https://cdn.example/media/"));
        assert_eq!(
            view.file_url.as_deref(),
            Some("https://cdn.example/media/products/2025/09/dawn.jpg")
        );

        let view = MediaView::new(media.clone(), "Dawn".to_string(), None);
        assert_eq!(view.file_url, None);

        let no_image = Media { image: None, ..media };
        let view = MediaView::new(no_image, "Dawn".to_string(), Some("https://cdn.example"));
        assert_eq!(view.file_url, None);
    }

    #[test]
    fn test_consignment_view_rate_display() {
        let consignment = Consignment {
            id: "c1".to_string(),
            gallery_contact_id: "g1".to_string(),
            start_date: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
            end_date: None,
            commission_rate_bps: 3750,
        };
        let view = ConsignmentView::new(consignment, "North Gallery".to_string(), Vec::new());
        let json = serde_json::to_value(&view).unwrap();

        assert_eq!(json["commission_rate"], "37.50");
        assert_eq!(json["commission_rate_bps"], 3750);
        assert_eq!(json["gallery_name"], "North Gallery");
        assert_eq!(json["start_date"], "2025-01-15");
    }
}
