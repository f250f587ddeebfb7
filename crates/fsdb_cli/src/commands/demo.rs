//! Demo command implementation.
//!
//! In one transaction, creates and fills `Products`, `Customers` and
//! `Orders`. Then finds every customer named Collins, deletes their orders,
//! and moves every Alice in Berlin to Seattle.

use super::{connect, StoreFormat};
use fsdb_core::{record, Connection, CoreResult, Filter, RecordId, Request, Value};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};

const FIRST_NAMES: [&str; 10] = [
    "Bob", "Alice", "Phil", "Edwyn", "Matt", "Rob", "Andrew", "Dave", "Kyle", "Mark",
];
const LAST_NAMES: [&str; 9] = [
    "Dylan", "Cooper", "Collins", "Trux", "Pike", "Gerrand", "Cheney", "Isom", "Smalley",
];
const CITIES: [&str; 15] = [
    "Berlin",
    "London",
    "Sydney",
    "Phnom Penh",
    "Kuala Lumpur",
    "Jakarta",
    "Taipei",
    "Hong Kong",
    "San Francisco",
    "San Diego",
    "Los Santos",
    "San Fierro",
    "Liberty City",
    "Vice City",
    "Las Venturas",
];
const PRODUCT_ATTRIBUTES: [&str; 8] = [
    "Vintage",
    "Luxury",
    "Budget",
    "Dick-Tracey",
    "Swiss",
    "Traditional",
    "Stylish",
    "Modern",
];
const PRODUCT_KINDS: [&str; 6] = ["Dumbphone", "Console", "Toaster", "Kettle", "Tablet", "Watch"];

/// What the demo did.
#[derive(Debug, Default, Serialize)]
pub struct DemoSummary {
    /// Products inserted.
    pub products: usize,
    /// Customers inserted.
    pub customers: usize,
    /// Orders inserted.
    pub orders: usize,
    /// Customers with last name Collins.
    pub collins: usize,
    /// Orders deleted.
    pub orders_deleted: u64,
    /// Customers moved from Berlin to Seattle.
    pub customers_moved: u64,
}

/// Runs the demo command.
pub fn run(
    dir: &Path,
    format: StoreFormat,
    seed: Option<u64>,
    max_orders: u32,
) -> Result<DemoSummary, Box<dyn std::error::Error>> {
    let mut conn = connect(dir, format)?;
    info!(dir = %dir.display(), "demo database location");

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut summary = DemoSummary::default();
    conn.begin()?;
    if let Err(e) = populate(&mut conn, &mut rng, max_orders.max(1), &mut summary) {
        if let Err(e2) = conn.rollback() {
            warn!(error = %e2, "rollback failed");
        }
        return Err(e.into());
    }
    conn.commit()?;

    let collins: Vec<RecordId> = conn
        .query(&Request::select_from(
            "Customers",
            Filter::new().equals("LastName", "Collins"),
        ))?
        .map(|row| row.id().to_string())
        .collect();
    summary.collins = collins.len();
    info!(
        customers = collins.len(),
        "found customers with LastName=Collins, deleting all their orders"
    );

    summary.orders_deleted = conn
        .exec(&Request::delete_from(
            "Orders",
            Filter::new().any_of("Customer", collins),
        ))?
        .affected_rows;
    info!(rows = summary.orders_deleted, "deletion done");

    info!("updating all FirstName=Alice customers from Berlin to Seattle");
    summary.customers_moved = conn
        .exec(&Request::update_where(
            "Customers",
            record! { "City" => "Seattle" },
            Filter::new()
                .equals("City", "Berlin")
                .equals("FirstName", "Alice"),
        ))?
        .affected_rows;
    info!(records = summary.customers_moved, "update done");

    conn.close()?;
    Ok(summary)
}

fn populate(
    conn: &mut Connection,
    rng: &mut StdRng,
    max_orders: u32,
    summary: &mut DemoSummary,
) -> CoreResult<()> {
    conn.exec(&Request::create_table("Products"))?;
    let products = add_products(conn)?;
    summary.products = products.len();
    info!(records = products.len(), "added Products");

    conn.exec(&Request::create_table("Customers"))?;
    let customers = add_customers(conn)?;
    summary.customers = customers.len();
    info!(records = customers.len(), "added Customers");

    conn.exec(&Request::create_table("Orders"))?;
    summary.orders = add_orders(conn, rng, max_orders, &customers, &products)?;
    info!(records = summary.orders, "added Orders");
    Ok(())
}

fn insert(conn: &mut Connection, table: &str, record: fsdb_core::Record) -> CoreResult<RecordId> {
    let res = conn.exec(&Request::insert_into(table, record))?;
    Ok(res.last_insert_id.unwrap_or_default())
}

fn add_products(conn: &mut Connection) -> CoreResult<Vec<RecordId>> {
    let mut ids = Vec::new();
    for first in PRODUCT_ATTRIBUTES {
        for kind in PRODUCT_KINDS {
            for second in PRODUCT_ATTRIBUTES {
                let atts: Vec<&str> = if first == second {
                    vec![first]
                } else {
                    vec![first, second]
                };
                let rec = record! {
                    "Name" => format!("{} {kind}", atts.join(" ")),
                    "Kind" => kind,
                    "Atts" => atts,
                };
                ids.push(insert(conn, "Products", rec)?);
            }
        }
    }
    Ok(ids)
}

fn add_customers(conn: &mut Connection) -> CoreResult<Vec<RecordId>> {
    let mut ids = Vec::new();
    for first in FIRST_NAMES {
        for last in LAST_NAMES {
            for city in CITIES {
                let rec = record! {
                    "FullName" => format!("{first} {last}"),
                    "FirstName" => first,
                    "LastName" => last,
                    "City" => city,
                };
                ids.push(insert(conn, "Customers", rec)?);
            }
        }
    }
    Ok(ids)
}

fn add_orders(
    conn: &mut Connection,
    rng: &mut StdRng,
    max_orders: u32,
    customers: &[RecordId],
    products: &[RecordId],
) -> CoreResult<usize> {
    let mut total = 0;
    for customer in customers {
        for _ in 0..rng.gen_range(1..=max_orders) {
            let picks: Vec<Value> = (0..rng.gen_range(1..=16))
                .map(|_| Value::Text(products[rng.gen_range(0..products.len())].clone()))
                .collect();
            let rec = record! {
                "Customer" => customer.as_str(),
                "Products" => picks,
            };
            insert(conn, "Orders", rec)?;
            total += 1;
        }
    }
    Ok(total)
}
