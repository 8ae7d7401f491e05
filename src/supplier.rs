use rand::Rng;
use uuid::{Builder, Uuid};

use crate::constants::SUPPLIER_USERNAMES;
use crate::model::Supplier;

pub fn random_supplier() -> Supplier {
    random_supplier_with(&mut rand::thread_rng())
}

/// Builds a supplier from `rng`, so seeded generators give repeatable output.
pub fn random_supplier_with<R: Rng>(rng: &mut R) -> Supplier {
    let id: Uuid = Builder::from_random_bytes(rng.gen()).into_uuid();
    Supplier {
        id,
        username: pick_username(rng).to_string(),
    }
}

fn pick_username<R: Rng>(rng: &mut R) -> &'static str {
    SUPPLIER_USERNAMES[rng.gen_range(0..SUPPLIER_USERNAMES.len())]
}
