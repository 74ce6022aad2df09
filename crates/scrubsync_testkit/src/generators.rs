//! Property-based test generators using proptest.
//!
//! Strings cover ASCII, accented and astral-plane characters, since the
//! anonymizer hashes by code point.

use proptest::prelude::*;
use scrubsync_core::{Address, ChangeEvent, Record, RecordId, Timestamp};

/// Strategy for generating record IDs.
pub fn record_id_strategy() -> impl Strategy<Value = RecordId> {
    prop::array::uniform12(any::<u8>()).prop_map(RecordId::from_bytes)
}

/// Strategy for generating free-text field values, including empty ones.
pub fn text_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        prop::string::string_regex("[A-Za-z '-]{0,24}").expect("Invalid regex"),
        prop::string::string_regex("[a-zàéöñß]{1,12}").expect("Invalid regex"),
        any::<String>(),
    ]
}

/// Strategy for generating email addresses, some without an `@`.
pub fn email_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => (
            prop::string::string_regex("[a-z0-9._]{1,16}").expect("Invalid regex"),
            prop::string::string_regex("[a-z]{2,10}\\.(com|org|net|io)").expect("Invalid regex"),
        )
            .prop_map(|(local, domain)| format!("{local}@{domain}")),
        1 => prop::string::string_regex("[a-z0-9.]{0,16}").expect("Invalid regex"),
    ]
}

/// Strategy for generating creation timestamps between 2000 and 2100.
pub fn timestamp_strategy() -> impl Strategy<Value = Timestamp> {
    (946_684_800_000i64..4_102_444_800_000i64).prop_map(Timestamp::from_millis)
}

/// Strategy for generating postal addresses.
pub fn address_strategy() -> impl Strategy<Value = Address> {
    (
        text_strategy(),
        text_strategy(),
        prop::string::string_regex("[0-9A-Z ]{3,8}").expect("Invalid regex"),
        text_strategy(),
        text_strategy(),
        prop::string::string_regex("[A-Z]{2}").expect("Invalid regex"),
    )
        .prop_map(|(line1, line2, postcode, city, state, country)| Address {
            line1,
            line2,
            postcode,
            city,
            state,
            country,
        })
}

/// Strategy for generating complete records.
pub fn record_strategy() -> impl Strategy<Value = Record> {
    (
        record_id_strategy(),
        text_strategy(),
        text_strategy(),
        email_strategy(),
        address_strategy(),
        timestamp_strategy(),
    )
        .prop_map(
            |(id, first_name, last_name, email, address, created_at)| Record {
                id,
                first_name,
                last_name,
                email,
                address,
                created_at,
            },
        )
}

/// Strategy for generating batches of records with distinct identities.
pub fn record_batch_strategy(max_len: usize) -> impl Strategy<Value = Vec<Record>> {
    prop::collection::vec(record_strategy(), 0..=max_len).prop_map(|mut records| {
        records.sort_by_key(|r| r.id);
        records.dedup_by_key(|r| r.id);
        records
    })
}

/// Strategy for generating change events of every kind.
pub fn change_event_strategy() -> impl Strategy<Value = ChangeEvent> {
    prop_oneof![
        4 => record_strategy().prop_map(ChangeEvent::Insert),
        2 => record_strategy().prop_map(ChangeEvent::Update),
        2 => prop::option::of(record_id_strategy()).prop_map(|id| ChangeEvent::Delete { id }),
        1 => Just(ChangeEvent::CollectionDrop),
        1 => Just(ChangeEvent::DatabaseDrop),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn batches_have_distinct_ids(batch in record_batch_strategy(20)) {
            let mut ids: Vec<_> = batch.iter().map(|r| r.id).collect();
            ids.dedup();
            prop_assert_eq!(ids.len(), batch.len());
        }

        #[test]
        fn timestamps_are_in_range(ts in timestamp_strategy()) {
            prop_assert!(ts.to_datetime().is_some());
        }
    }
}
