//! # Seed Data Generator
//!
//! Populates the database with test data for development.
//!
//! ## Usage
//! ```bash
//! # Generate 500 products (default)
//! cargo run -p comptoir-db --bin seed
//!
//! # Generate custom amount
//! cargo run -p comptoir-db --bin seed -- --count 2000
//!
//! # Specify database path
//! cargo run -p comptoir-db --bin seed -- --db ./data/comptoir.db
//! ```
//!
//! ## Generated Data
//! - Products across categories (beverages, snacks, dairy, grocery),
//!   each with an inventory counter and a pseudo-random stock level
//! - A handful of customers with loyalty balances
//! - Three promotions: store-wide percentage, scoped fixed amount,
//!   and a scoped buy-two-get-one

use chrono::{Datelike, Duration, NaiveDate, Utc};
use std::env;
use uuid::Uuid;

use comptoir_core::{Customer, Product, Promotion, PromotionKind};
use comptoir_db::{Database, DbConfig};

/// Product categories for realistic test data
const CATEGORIES: &[(&str, &[&str])] = &[
    (
        "BEV",
        &[
            "Coca-Cola",
            "Pepsi",
            "Sprite",
            "Orangina",
            "Perrier",
            "Evian Water",
            "Orange Juice",
            "Apple Juice",
            "Lemonade",
            "Iced Tea",
            "Espresso Beans",
            "Hot Chocolate",
        ],
    ),
    (
        "SNK",
        &[
            "Lays Classic",
            "Doritos Nacho",
            "Pringles",
            "Snickers",
            "Kit Kat",
            "Twix",
            "Gummy Bears",
            "Oreos",
            "Madeleines",
            "Pretzels",
            "Trail Mix",
            "Rice Cakes",
        ],
    ),
    (
        "DRY",
        &[
            "Whole Milk",
            "Skim Milk",
            "Almond Milk",
            "Cheddar Cheese",
            "Camembert",
            "Butter",
            "Greek Yogurt",
            "Sour Cream",
            "Heavy Cream",
            "Eggs Dozen",
            "Cottage Cheese",
            "Creme Fraiche",
        ],
    ),
    (
        "GRO",
        &[
            "Baguette",
            "Wheat Bread",
            "Pasta Spaghetti",
            "Pasta Penne",
            "Rice White",
            "Canned Beans",
            "Canned Tomatoes",
            "Cereal Flakes",
            "Oatmeal",
            "Peanut Butter",
            "Honey",
            "Olive Oil",
        ],
    ),
];

/// Size variants for products
const SIZES: &[(&str, i64)] = &[
    ("Small", 0),
    ("Medium", 100),
    ("Large", 200),
    ("12oz", 0),
    ("20oz", 100),
    ("1L", 150),
    ("6-Pack", 300),
    ("12-Pack", 500),
];

const CUSTOMER_NAMES: &[(&str, i64)] = &[
    ("Marie Dupont", 250),
    ("Jean Martin", 40),
    ("Amina Benali", 0),
    ("Lucas Moreau", 1200),
    ("Sofia Rossi", 75),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 500;
    let mut db_path = String::from("./comptoir_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(500);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Comptoir Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of products to generate (default: 500)");
                println!("  -d, --db <PATH>    Database file path (default: ./comptoir_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Comptoir Seed Data Generator");
    println!("===============================");
    println!("Database: {}", db_path);
    println!("Products: {}", count);
    println!();

    // Connect to database
    let config = DbConfig::new(&db_path);
    let db = Database::new(config).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    // Check existing products
    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    // Generate products
    println!();
    println!("Generating products...");

    let mut generated = 0;
    let mut scoped_ids: Vec<String> = Vec::new();
    let start = std::time::Instant::now();

    'outer: for (category_idx, (category_code, products)) in CATEGORIES.iter().enumerate() {
        for (product_idx, product_name) in products.iter().enumerate() {
            for (size_idx, (size_name, price_addon)) in SIZES.iter().enumerate() {
                if generated >= count {
                    break 'outer;
                }

                let seed = category_idx * 1000 + product_idx * 20 + size_idx;
                let product = generate_product(category_code, product_name, size_name, *price_addon, seed);
                let initial_stock = (seed % 101) as i64;

                // First beverage of each size feeds the scoped promotions.
                if category_idx == 0 && product_idx == 0 {
                    scoped_ids.push(product.id.clone());
                }

                if let Err(e) = db.products().insert(&product, initial_stock).await {
                    eprintln!("Failed to insert {}: {}", product.sku, e);
                    continue;
                }

                generated += 1;

                if generated % 100 == 0 {
                    println!("  Generated {} products...", generated);
                }
            }
        }
    }

    let elapsed = start.elapsed();
    println!();
    println!("✓ Generated {} products in {:?}", generated, elapsed);
    println!(
        "  Rate: {:.0} products/second",
        generated as f64 / elapsed.as_secs_f64()
    );

    // Customers
    println!();
    println!("Generating customers...");
    for (name, points) in CUSTOMER_NAMES {
        let now = Utc::now();
        let customer = Customer {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            loyalty_points: *points,
            created_at: now,
            updated_at: now,
        };
        db.customers().insert(&customer).await?;
    }
    println!("✓ Generated {} customers", CUSTOMER_NAMES.len());

    // Promotions
    println!();
    println!("Generating promotions...");
    let today = Utc::now().date_naive();

    let store_wide = promotion("Everything 10% Off", PromotionKind::Percentage, 1000, today);
    db.promotions().insert(&store_wide, &[]).await?;

    let mut cola_fixed = promotion("Cola Club: 1.00 Off", PromotionKind::Fixed, 100, today);
    cola_fixed.min_purchase_cents = Some(500);
    db.promotions().insert(&cola_fixed, &scoped_ids).await?;

    let mut b2g1 = promotion("Buy 2 Get 1 Free", PromotionKind::BuyXGetY, 1, today);
    b2g1.min_quantity = Some(2);
    b2g1.max_uses = Some(100);
    db.promotions().insert(&b2g1, &scoped_ids).await?;

    println!("✓ Generated 3 promotions ({} scoped products)", scoped_ids.len());

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// Generates a single product with realistic data.
fn generate_product(
    category: &str,
    name: &str,
    size: &str,
    price_addon: i64,
    seed: usize,
) -> Product {
    let now = Utc::now();

    // Unique SKU: {CATEGORY}-{NAME3}-{INDEX}
    let sku = format!(
        "{}-{}-{:03}",
        category,
        &name.replace(' ', "")[..3].to_uppercase(),
        seed
    );

    // Price: base 1.99-9.99 + size addon
    let base_price = 199 + ((seed * 17) % 800) as i64;
    let selling_price_cents = base_price + price_addon;

    // Cost: 60-80% of price
    let cost_pct = 60 + (seed % 20) as i64;
    let cost_price_cents = selling_price_cents * cost_pct / 100;

    Product {
        id: Uuid::new_v4().to_string(),
        sku,
        name: format!("{} {}", name, size),
        description: None,
        cost_price_cents,
        selling_price_cents,
        min_stock_level: 5 + (seed % 10) as i64,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

/// Builds a promotion valid from 30 days ago through a year out.
fn promotion(name: &str, kind: PromotionKind, value: i64, today: NaiveDate) -> Promotion {
    let now = Utc::now();
    Promotion {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        kind,
        value,
        min_quantity: None,
        min_purchase_cents: None,
        max_uses: None,
        current_uses: 0,
        starts_on: today - Duration::days(30),
        ends_on: today.with_year(today.year() + 1).unwrap_or(today),
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}
