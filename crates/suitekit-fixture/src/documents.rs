//! Synthetic fixture documents and the shell script that inserts them

use serde_json::{Value, json};

/// Count used when a seed call does not ask for a specific number
pub const DEFAULT_DOCUMENT_COUNT: usize = 1;

const FIRST_NAMES: [&str; 8] = [
    "Joey", "Alice", "Bob", "Carol", "Dave", "Erin", "Frank", "Grace",
];
const LAST_NAMES: [&str; 5] = ["Smith", "Nguyen", "Garcia", "Kim", "Okafor"];

/// Deterministic document number `seq`
///
/// Ages spread over 10..90 so that range-sharded scenarios split chunks
/// across several shards.
#[must_use]
pub fn document(seq: usize) -> Value {
    let first = FIRST_NAMES[seq % FIRST_NAMES.len()];
    let last = LAST_NAMES[(seq / FIRST_NAMES.len()) % LAST_NAMES.len()];
    json!({
        "seq": seq,
        "user": {
            "name": format!("{first} {last}"),
            "age": (seq * 37) % 80 + 10,
        },
        "email": format!("{}.{}{}@example.com", first.to_lowercase(), last.to_lowercase(), seq),
        "active": seq % 3 != 0,
    })
}

#[must_use]
pub fn documents(count: usize) -> Vec<Value> {
    (0..count).map(document).collect()
}

/// Shell script that creates `collection` if missing, then inserts `count` documents
///
/// Creating only when absent keeps repeated seeding of one instance safe.
#[must_use]
pub fn seed_script(database: &str, collection: &str, count: usize) -> String {
    let database = Value::from(database).to_string();
    let collection = Value::from(collection).to_string();
    let mut script = format!(
        "var target = db.getSiblingDB({database});\n\
         if (target.getCollectionNames().indexOf({collection}) < 0) {{ target.createCollection({collection}); }}\n"
    );
    if count > 0 {
        let batch = Value::Array(documents(count)).to_string();
        script.push_str(&format!("target.getCollection({collection}).insertMany({batch});\n"));
    }
    script
}
