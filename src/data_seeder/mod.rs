// Sample data seeder - deterministic users with emails and phones

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::Value;
use tracing::info;

use crate::error::AppResult;
use crate::infrastructure::{Record, RecordStore, StoreTransaction};
use crate::record_schema::{Schema, SchemaRegistry};

const FIRST_NAMES: &[&str] = &[
    "Alice", "Boris", "Clara", "Daniel", "Elena", "Fedir", "Galina", "Hector", "Irina", "Jonas",
    "Katya", "Leonid", "Marta", "Nikolai", "Olena", "Pavel",
];

const LAST_NAMES: &[&str] = &[
    "Smith", "Kovalenko", "Garcia", "Novak", "Petrenko", "Schmidt", "Rossi", "Larsen", "Moreau",
    "Tkachenko",
];

const STREETS: &[&str] = &["Oak", "Maple", "Station", "River", "Market", "Church", "Mill"];

const CITIES: &[&str] = &["Springfield", "Riverton", "Lakeside", "Fairview", "Oakridge"];

/// Rows per insert statement
const CHUNK_SIZE: usize = 200;

fn pick<'a>(rng: &mut StdRng, values: &[&'a str]) -> &'a str {
    values[rng.random_range(0..values.len())]
}

fn record(pairs: Vec<(&str, Value)>) -> Record {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

fn sample_user(rng: &mut StdRng) -> (Record, String) {
    let first = pick(rng, FIRST_NAMES);
    let last = pick(rng, LAST_NAMES);
    let gender = if rng.random_bool(0.5) { "male" } else { "female" };
    let born_at = format!(
        "{}-{:02}-{:02}",
        rng.random_range(1950..=2015),
        rng.random_range(1..=12),
        rng.random_range(1..=28)
    );
    let address = format!(
        "{} {} Street, {}",
        rng.random_range(1..=250),
        pick(rng, STREETS),
        pick(rng, CITIES)
    );

    let user = record(vec![
        ("name", Value::from(format!("{} {}", first, last))),
        ("photo_path", Value::from("")),
        ("gender", Value::from(gender)),
        ("born_at", Value::from(born_at)),
        ("address", Value::from(address)),
    ]);
    let handle = format!("{}.{}", first, last).to_lowercase();
    (user, handle)
}

fn sample_emails(user_id: i64, handle: &str) -> Vec<Record> {
    vec![
        record(vec![
            ("user_id", Value::from(user_id)),
            ("type", Value::from("personal")),
            ("email", Value::from(format!("{}{}@example.com", handle, user_id))),
        ]),
        record(vec![
            ("user_id", Value::from(user_id)),
            ("type", Value::from("work")),
            ("email", Value::from(format!("{}{}@work.example.org", handle, user_id))),
        ]),
    ]
}

fn sample_phones(rng: &mut StdRng, user_id: i64) -> Vec<Record> {
    ["mobile", "city"]
        .into_iter()
        .map(|kind| {
            let number = format!("+380{}", rng.random_range(100_000_000..=999_999_999u32));
            record(vec![
                ("user_id", Value::from(user_id)),
                ("type", Value::from(kind)),
                ("number", Value::from(number)),
            ])
        })
        .collect()
}

async fn insert_chunked(
    tx: &mut dyn StoreTransaction,
    schema: &Schema,
    rows: &[Record],
) -> AppResult<Vec<i64>> {
    let mut ids = Vec::with_capacity(rows.len());
    for chunk in rows.chunks(CHUNK_SIZE) {
        ids.extend(tx.insert(schema.table(), schema.required_fields(), chunk).await?);
    }
    Ok(ids)
}

/// Insert `rows` users, each with two emails and two phones, in one transaction.
///
/// The same `seed` always produces the same data. Returns the number of users
/// inserted.
pub async fn seed_sample_data(
    registry: &SchemaRegistry,
    store: &dyn RecordStore,
    rows: usize,
    seed: u64,
) -> AppResult<usize> {
    let users_schema = registry.schema("users")?;
    let emails_schema = registry.schema("emails")?;
    let phones_schema = registry.schema("phones")?;

    let mut rng = StdRng::seed_from_u64(seed);
    let (users, handles): (Vec<Record>, Vec<String>) =
        (0..rows).map(|_| sample_user(&mut rng)).unzip();

    let mut tx = store.begin().await?;
    let ids = insert_chunked(&mut *tx, users_schema, &users).await?;

    let mut emails = Vec::with_capacity(ids.len() * 2);
    let mut phones = Vec::with_capacity(ids.len() * 2);
    for (&id, handle) in ids.iter().zip(&handles) {
        emails.extend(sample_emails(id, handle));
        phones.extend(sample_phones(&mut rng, id));
    }
    insert_chunked(&mut *tx, emails_schema, &emails).await?;
    insert_chunked(&mut *tx, phones_schema, &phones).await?;
    tx.commit().await?;

    info!(
        "Seeded {} users, {} emails and {} phones",
        ids.len(),
        emails.len(),
        phones.len()
    );
    Ok(ids.len())
}
