//! Synthetic customer records.
//!
//! Feeds the source collection for demos and load tests. Names and addresses
//! are drawn from small fixed word lists, so values repeat often; that is
//! intended, since repeated inputs must produce repeated pseudonyms.

use crate::record::{Address, Record, RecordId, Timestamp};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

const FIRST_NAMES: &[&str] = &[
    "Amara", "Bjorn", "Chidi", "Dana", "Elif", "Farah", "Goran", "Hana", "Ines", "Jonas",
    "Kofi", "Lena", "Mateo", "Nadia", "Oren", "Priya", "Quinn", "Rosa", "Sami", "Tariq",
];

const LAST_NAMES: &[&str] = &[
    "Abara", "Berg", "Costa", "Dubois", "Eze", "Fischer", "Garcia", "Haddad", "Ivanova",
    "Jensen", "Kowalski", "Larsen", "Moreau", "Nakamura", "Okafor", "Petrov", "Rossi",
];

const STREETS: &[&str] = &[
    "Maple Street", "Harbour Road", "Station Lane", "Mill Way", "Church Walk", "Park Avenue",
];

const DOMAINS: &[&str] = &["example.com", "mail.test", "inbox.example.org", "post.invalid"];

const PLACES: &[(&str, &str, &str)] = &[
    ("Lisbon", "Lisboa", "PT"),
    ("Lyon", "Auvergne-Rhone-Alpes", "FR"),
    ("Leeds", "West Yorkshire", "GB"),
    ("Austin", "Texas", "US"),
    ("Osaka", "Osaka", "JP"),
    ("Lagos", "Lagos", "NG"),
    ("Gdansk", "Pomorskie", "PL"),
];

/// Generates random customer records.
pub struct RecordGenerator {
    rng: StdRng,
}

impl RecordGenerator {
    /// Creates a generator seeded from the OS.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Creates a generator with a fixed seed.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn pick(&mut self, values: &[&'static str]) -> &'static str {
        values.choose(&mut self.rng).copied().unwrap_or_default()
    }

    fn record_id(&mut self, created_at: Timestamp) -> RecordId {
        let mut bytes = [0u8; 12];
        let secs = (created_at.as_millis() / 1000).clamp(0, i64::from(u32::MAX)) as u32;
        bytes[..4].copy_from_slice(&secs.to_be_bytes());
        self.rng.fill(&mut bytes[4..]);
        RecordId::from_bytes(bytes)
    }

    /// Generates one record created at `created_at`.
    pub fn record_at(&mut self, created_at: Timestamp) -> Record {
        let first_name = self.pick(FIRST_NAMES);
        let last_name = self.pick(LAST_NAMES);
        let domain = self.pick(DOMAINS);
        let street = self.pick(STREETS);
        let (city, state, country) = *PLACES.choose(&mut self.rng).unwrap_or(&PLACES[0]);
        let number: u16 = self.rng.gen_range(1..400);
        let flat: u16 = self.rng.gen_range(1..60);
        let postcode: u32 = self.rng.gen_range(10_000..99_999);
        let tag: u16 = self.rng.gen_range(0..1000);

        Record {
            id: self.record_id(created_at),
            first_name: first_name.to_owned(),
            last_name: last_name.to_owned(),
            email: format!(
                "{}.{}{}@{}",
                first_name.to_lowercase(),
                last_name.to_lowercase(),
                tag,
                domain
            ),
            address: Address {
                line1: format!("{number} {street}"),
                line2: format!("Apt. {flat}"),
                postcode: postcode.to_string(),
                city: city.to_owned(),
                state: state.to_owned(),
                country: country.to_owned(),
            },
            created_at,
        }
    }

    /// Generates one record created now.
    pub fn record(&mut self) -> Record {
        self.record_at(Timestamp::now())
    }

    /// Generates `size` records created now.
    pub fn batch(&mut self, size: usize) -> Vec<Record> {
        (0..size).map(|_| self.record()).collect()
    }

    /// Picks a batch size between 1 and 10.
    pub fn batch_size(&mut self) -> usize {
        self.rng.gen_range(1..=10)
    }
}

impl Default for RecordGenerator {
    fn default() -> Self {
        Self::new()
    }
}
