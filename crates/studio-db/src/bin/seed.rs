//! # Seed Data Generator
//!
//! Populates a studio database with a small, realistic catalog for
//! development.
//!
//! ## Usage
//! ```bash
//! # Seed the database named by STUDIO_DB_PATH (default ./studio.db)
//! cargo run -p studio-db --bin seed
//!
//! # Generate more print editions
//! cargo run -p studio-db --bin seed -- --count 40
//!
//! # Specify database path
//! cargo run -p studio-db --bin seed -- --db ./data/studio.db
//! ```
//!
//! ## Generated Data
//! - Locations: studio (sellable), flat files (storage)
//! - Contacts: collectors, a gallery, a vendor
//! - Products: limited prints in three sizes, an original, a tote
//! - Stock per variant and location
//! - One paid order with a payment and certificate
//! - One open gallery consignment

use chrono::{Duration, NaiveDate, Utc};
use std::env;
use studio_core::validation::{
    CoaInput, ConsignmentInput, ConsignmentItemInput, ContactInput, CrmNoteInput, InventoryInput,
    LocationInput, MediaInput, OrderInput, OrderItemInput, PaymentInput, ProductInput,
    VariantInput,
};
use studio_core::{
    ContactKind, MediaKind, OrderChannel, OrderStatus, PaymentMethod, ProductType, ProductVariant,
};
use studio_db::{Database, StudioConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Print series titles; each becomes a limited edition.
const PRINT_TITLES: &[&str] = &[
    "Harbor at Dusk",
    "Low Tide, Morning",
    "Lighthouse Study",
    "Salt Marsh in Fog",
    "North Pier",
    "Boathouse Window",
    "Winter Dunes",
    "Gulls over the Breakwater",
];

/// (option label, price in cents, edition size)
const PRINT_SIZES: &[(&str, i64, i64)] = &[("8x10", 4500, 100), ("11x14", 8500, 50), ("18x24", 18000, 25)];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = env::args().collect();

    let mut config = StudioConfig::from_env()?;
    let mut count: usize = PRINT_TITLES.len();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(PRINT_TITLES.len());
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    config.db_path = args[i + 1].clone().into();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Studio Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of print editions (default: {})", PRINT_TITLES.len());
                println!("  -d, --db <PATH>    Database file path (default: $STUDIO_DB_PATH or ./studio.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            other => warn!(arg = %other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    info!(db = %config.db_path.display(), prints = count, "Seeding studio database");

    let db = Database::new(config.db_config()).await?;

    let existing = db.products().count().await?;
    if existing > 0 {
        warn!(existing, "Database already has products; skipping seed");
        return Ok(());
    }

    let start = std::time::Instant::now();

    // Locations
    let studio = db
        .locations()
        .create(&LocationInput {
            name: "Studio".to_string(),
            is_sellable: Some(true),
        })
        .await?;
    let flat_files = db
        .locations()
        .create(&LocationInput {
            name: "Flat Files".to_string(),
            is_sellable: Some(false),
        })
        .await?;

    // Contacts
    let collector = db
        .contacts()
        .create(&ContactInput {
            kind: Some(ContactKind::Collector),
            name: "Margaret Hale".to_string(),
            email: Some("margaret.hale@example.com".to_string()),
            phone: Some("555-0142".to_string()),
            notes: Some("Prefers large formats".to_string()),
        })
        .await?;
    let gallery = db
        .contacts()
        .create(&ContactInput {
            kind: Some(ContactKind::Gallery),
            name: "Harborview Gallery".to_string(),
            email: Some("hello@harborview.example".to_string()),
            ..Default::default()
        })
        .await?;
    db.contacts()
        .create(&ContactInput {
            kind: Some(ContactKind::Vendor),
            name: "Coastline Framing".to_string(),
            ..Default::default()
        })
        .await?;
    db.crm_notes()
        .create(&CrmNoteInput {
            contact_id: collector.id.clone(),
            note: "Met at the spring open studio; asked about the harbor series.".to_string(),
            created_at: Some(Utc::now() - Duration::days(30)),
        })
        .await?;

    // Catalog
    let mut editions: Vec<ProductVariant> = Vec::new();
    for (n, title) in PRINT_TITLES.iter().cycle().take(count).enumerate() {
        let title = if n < PRINT_TITLES.len() {
            title.to_string()
        } else {
            format!("{title} ({})", n / PRINT_TITLES.len() + 1)
        };

        let variants: Vec<VariantInput> = PRINT_SIZES
            .iter()
            .map(|(label, cents, edition)| VariantInput {
                option_label: label.to_string(),
                price_cents: Some(*cents),
                edition_size: Some(*edition),
                weight_grams: Some(250),
                ..Default::default()
            })
            .collect();
        let media = [MediaInput {
            kind: Some(MediaKind::Primary),
            image: Some(format!("products/{}.jpg", n + 1)),
            alt_text: Some(title.clone()),
            ..Default::default()
        }];

        let created = db
            .products()
            .create_with_children(
                &ProductInput {
                    title,
                    product_type: Some(ProductType::LimitedPrint),
                    series: Some("Coastal".to_string()),
                    ..Default::default()
                },
                &variants,
                &media,
            )
            .await?;

        for variant in &created.variants {
            let on_hand = variant.edition_size.unwrap_or(0) / 10;
            db.inventory()
                .set_for_variant(
                    &variant.id,
                    &[
                        InventoryInput {
                            location_id: studio.id.clone(),
                            on_hand: Some(on_hand.min(3)),
                            ..Default::default()
                        },
                        InventoryInput {
                            location_id: flat_files.id.clone(),
                            on_hand: Some(on_hand),
                            ..Default::default()
                        },
                    ],
                )
                .await?;
        }

        editions.extend(created.variants);
    }

    let original = db
        .products()
        .create_with_children(
            &ProductInput {
                title: "Harbor Light (Original)".to_string(),
                product_type: Some(ProductType::Original),
                description: Some("Oil on linen, 24 x 36 in.".to_string()),
                ..Default::default()
            },
            &[VariantInput {
                option_label: "Framed".to_string(),
                price_dollars: Some("3200.00".to_string()),
                edition_size: Some(1),
                taxable: Some(true),
                ..Default::default()
            }],
            &[],
        )
        .await?;
    db.products()
        .create_with_children(
            &ProductInput {
                title: "Studio Tote".to_string(),
                product_type: Some(ProductType::Merch),
                ..Default::default()
            },
            &[VariantInput {
                option_label: "Natural".to_string(),
                price_cents: Some(2400),
                ..Default::default()
            }],
            &[],
        )
        .await?;

    // A paid in-person sale with its certificate
    if let Some(sold) = editions.iter().find(|v| v.option_label == "18x24") {
        let paid_at = Utc::now() - Duration::days(7);
        let sale = db
            .orders()
            .create_with_items(
                &OrderInput {
                    buyer_contact_id: Some(collector.id.clone()),
                    channel: Some(OrderChannel::InPerson),
                    status: Some(OrderStatus::Paid),
                    subtotal_cents: Some(sold.price_cents),
                    tax_cents: Some(sold.price_cents * 8 / 100),
                    total_cents: Some(sold.price_cents + sold.price_cents * 8 / 100),
                    paid_at: Some(paid_at),
                    ..Default::default()
                },
                &[OrderItemInput {
                    variant_id: sold.id.clone(),
                    qty: 1,
                    unit_price_cents: sold.price_cents,
                    ..Default::default()
                }],
            )
            .await?;
        db.payments()
            .create(&PaymentInput {
                order_id: sale.order.id.clone(),
                method: Some(PaymentMethod::Card),
                amount_cents: sale.order.total_cents,
                received_at: Some(paid_at),
            })
            .await?;
        db.coas()
            .create(&CoaInput {
                product_id: Some(sold.product_id.clone()),
                variant_id: Some(sold.id.clone()),
                serial_no: format!("1/{}", sold.edition_size.unwrap_or(1)),
                purchaser_contact_id: Some(collector.id.clone()),
                issued_at: Some(paid_at),
            })
            .await?;
    }

    // Open consignment with the original and two prints
    let consigned: Vec<ConsignmentItemInput> = original
        .variants
        .iter()
        .chain(editions.iter().filter(|v| v.option_label == "11x14").take(2))
        .map(|v| ConsignmentItemInput {
            variant_id: v.id.clone(),
            qty: 1,
            listed_price_cents: v.price_cents,
            ..Default::default()
        })
        .collect();
    db.consignments()
        .create_with_items(
            &ConsignmentInput {
                gallery_contact_id: gallery.id.clone(),
                start_date: NaiveDate::from_ymd_opt(2025, 9, 1),
                end_date: None,
                commission_rate: "40".to_string(),
            },
            &consigned,
        )
        .await?;

    info!(
        products = db.products().count().await?,
        variants = editions.len() + 2,
        elapsed = ?start.elapsed(),
        "Seed complete"
    );

    db.close().await;
    Ok(())
}

/// Initializes the tracing subscriber.
///
/// `RUST_LOG` overrides the default `info,studio_db=debug,sqlx=warn`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,studio_db=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
