//! Benchmark utilities.

#![allow(missing_docs)]

use fsdb_codec::{record, Record, RecordId, RecordSet};
use fsdb_core::{Config, Connection, Driver, Request};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;

const CITIES: [&str; 8] = [
    "Berlin", "London", "Sydney", "Taipei", "Jakarta", "Seattle", "Hong Kong", "San Diego",
];

/// Generate a customer-like record.
pub fn random_record(rng: &mut StdRng) -> Record {
    record! {
        "Name" => format!("Customer {}", rng.gen::<u32>()),
        "City" => CITIES[rng.gen_range(0..CITIES.len())],
        "Visits" => rng.gen_range(0..1000i64),
        "Active" => rng.gen_bool(0.5),
    }
}

/// Generate a record set with `count` records keyed by sequential IDs.
pub fn random_record_set(count: usize) -> RecordSet {
    let mut rng = StdRng::seed_from_u64(42);
    (0..count)
        .map(|i| (i.to_string(), random_record(&mut rng)))
        .collect()
}

/// A populated table in a temporary directory.
pub struct Fixture {
    pub conn: Connection,
    pub ids: Vec<RecordId>,
    _dir: TempDir,
}

/// Open a connection to a fresh directory and fill table `T` with `count`
/// records in one transaction.
pub fn populated(driver: &Driver, count: usize) -> Fixture {
    let dir = TempDir::new().unwrap();
    let mut conn = driver.open(dir.path()).unwrap();
    let mut rng = StdRng::seed_from_u64(7);

    conn.exec(&Request::create_table("T")).unwrap();
    conn.begin().unwrap();
    let ids = (0..count)
        .map(|_| {
            conn.exec(&Request::insert_into("T", random_record(&mut rng)))
                .unwrap()
                .last_insert_id
                .unwrap()
        })
        .collect();
    conn.commit().unwrap();

    Fixture {
        conn,
        ids,
        _dir: dir,
    }
}

/// A JSON driver with default settings.
pub fn json_driver() -> Driver {
    Driver::json(Config::default())
}
