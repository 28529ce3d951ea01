//! # Seed Data Generator
//!
//! Populates a development database with a small kiosk menu, stock levels
//! and a few unactivated devices.
//!
//! ## Usage
//! ```bash
//! # Seed ./kiosk_dev.db with 3 device codes (default)
//! cargo run -p kiosk-db --bin seed
//!
//! # Custom path and device count
//! cargo run -p kiosk-db --bin seed -- --db ./data/kiosk.db --devices 10
//! ```
//!
//! ## Generated Data
//! - One product per menu entry, priced in cents, with stock 0 - 40
//! - Device activation codes `KSK001`, `KSK002`, ... (6 characters)

use std::env;

use kiosk_core::CatalogProduct;
use kiosk_db::{Database, DbConfig};

/// (id, name, price in cents)
const MENU: &[(&str, &str, i64)] = &[
    ("burger-classic", "Classic Burger", 2490),
    ("burger-double", "Double Burger", 3290),
    ("burger-veggie", "Veggie Burger", 2690),
    ("fries-small", "Fries Small", 890),
    ("fries-large", "Fries Large", 1290),
    ("nuggets-6", "Chicken Nuggets 6pc", 1590),
    ("soda-can", "Soda Can", 650),
    ("juice-orange", "Orange Juice", 990),
    ("water", "Mineral Water", 450),
    ("sundae", "Chocolate Sundae", 1190),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut devices: usize = 3;
    let mut db_path = String::from("./kiosk_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--devices" | "-n" => {
                if i + 1 < args.len() {
                    devices = args[i + 1].parse().unwrap_or(3);
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
                println!("Kiosk Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -n, --devices <N>  Number of device codes to create (default: 3)");
                println!("  -d, --db <PATH>    Database file path (default: ./kiosk_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Kiosk Seed Data Generator");
    println!("============================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    if db.catalog().get_product(MENU[0].0).await?.is_some() {
        println!("⚠ Menu already present, skipping seed.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    println!();
    println!("Creating menu...");
    for (index, (id, name, price_cents)) in MENU.iter().enumerate() {
        let product = CatalogProduct {
            id: id.to_string(),
            name: name.to_string(),
            price_cents: *price_cents,
            is_active: true,
        };
        db.catalog().insert(&product).await?;

        let quantity = ((index * 13) % 41) as i64;
        db.stock().set_quantity(id, quantity).await?;
        println!("  {:<16} {:>8}  stock {}", id, product.price().to_string(), quantity);
    }

    println!();
    println!("Creating device codes...");
    for n in 1..=devices {
        let code = format!("KSK{:03}", n);
        match db.devices().insert_inactive(&code, None).await {
            Ok(_) => println!("  {}", code),
            Err(e) => eprintln!("Failed to create {}: {}", code, e),
        }
    }

    println!();
    println!("✓ Seed complete!");

    Ok(())
}
