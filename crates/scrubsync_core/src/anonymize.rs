//! Deterministic pseudonymization of personal fields.
//!
//! Each personal string is reduced to a 32-bit rolling hash (`h = h * 31 + c`,
//! wrapping) and rendered in decimal, sign included. The rendering is cut into
//! eight 4-character windows; the digits of each window are parsed as
//! hexadecimal, reduced modulo 62 and mapped onto `[A-Za-z0-9]`. A rendering
//! shorter than 32 characters leaves trailing windows empty. Those are filled
//! by reading the digits of the hash magnitude as a cyclic stream.
//!
//! This is pseudonymization, not encryption. Distinct inputs may collide and
//! short inputs are trivially brute-forced; do not treat the output as secret.

use crate::record::{Address, Record};

/// Length of every pseudonym produced by [`anonymize_value`].
pub const PSEUDONYM_LEN: usize = 8;

const WINDOW: usize = 4;

fn rolling_hash(value: &str) -> i32 {
    value
        .chars()
        .fold(0i32, |acc, c| acc.wrapping_mul(31).wrapping_add(c as i32))
}

fn symbol(code: u32) -> char {
    let code = code as u8;
    match code {
        0..=25 => char::from(b'A' + code),
        26..=51 => char::from(b'a' + code - 26),
        _ => char::from(b'0' + code - 52),
    }
}

/// Maps a string onto an 8-character `[A-Za-z0-9]` pseudonym.
///
/// Total and deterministic: the same input always yields the same output.
pub fn anonymize_value(value: &str) -> String {
    let hash = rolling_hash(value);
    let rendered = hash.to_string();
    let digits = hash.unsigned_abs().to_string().into_bytes();

    (0..PSEUDONYM_LEN)
        .map(|i| {
            let start = i * WINDOW;
            let end = rendered.len().min(start + WINDOW);
            let window: Vec<u8> = match rendered.get(start..end) {
                Some(slice) if !slice.is_empty() => {
                    slice.bytes().filter(u8::is_ascii_digit).collect()
                }
                _ => (0..WINDOW)
                    .map(|k| digits[(start + k) % digits.len()])
                    .collect(),
            };
            let code = window
                .iter()
                .fold(0u32, |acc, d| acc * 16 + u32::from(d - b'0'));
            symbol(code % 62)
        })
        .collect()
}

/// Pseudonymizes the local part of an email address, keeping the domain verbatim.
///
/// A value without `@` is treated as a bare local part.
pub fn anonymize_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) => format!("{}@{}", anonymize_value(local), domain),
        None => anonymize_value(email),
    }
}

/// Produces the scrubbed counterpart of a record.
///
/// Names, email local part, address lines and postcode are replaced; identity,
/// city, state, country and `created_at` pass through unchanged.
pub fn anonymize(record: &Record) -> Record {
    Record {
        id: record.id,
        first_name: anonymize_value(&record.first_name),
        last_name: anonymize_value(&record.last_name),
        email: anonymize_email(&record.email),
        address: Address {
            line1: anonymize_value(&record.address.line1),
            line2: anonymize_value(&record.address.line2),
            postcode: anonymize_value(&record.address.postcode),
            city: record.address.city.clone(),
            state: record.address.state.clone(),
            country: record.address.country.clone(),
        },
        created_at: record.created_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{RecordId, Timestamp};
    use proptest::prelude::*;

    fn sample() -> Record {
        Record {
            id: RecordId::from_bytes([7; 12]),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@example.com".into(),
            address: Address {
                line1: "12 Analytical Row".into(),
                line2: "Flat 3".into(),
                postcode: "W1 4AB".into(),
                city: "London".into(),
                state: "Greater London".into(),
                country: "GB".into(),
            },
            created_at: Timestamp::from_millis(1_700_000_000_000),
        }
    }

    #[test]
    fn known_pseudonyms() {
        assert_eq!(anonymize_value(""), "AAAAAAAA");
        assert_eq!(anonymize_value("a"), "b5555555");
        assert_eq!(anonymize_value("Ada"), "qCRwqqSR");
        assert_eq!(anonymize_value("Lovelace"), "EBDzfDXd");
    }

    #[test]
    fn leading_windows_follow_signed_rendering() {
        // "Lovelace" hashes to -1781877975: windows "-178", "1877", "975".
        let out = anonymize_value("Lovelace");
        assert_eq!(&out[..3], "EBD");
        // "Ada" hashes to 65662: windows "6566", "2", then padding.
        assert_eq!(&anonymize_value("Ada")[..2], "qC");
    }

    #[test]
    fn email_keeps_domain() {
        assert_eq!(anonymize_email("ada@example.com"), "ZEAjOZCA@example.com");
        assert_eq!(anonymize_email("john.doe@mail.co.uk"), "ND9nTX0A@mail.co.uk");
        assert_eq!(anonymize_email("ada"), "ZEAjOZCA");
    }

    #[test]
    fn passthrough_fields() {
        let record = sample();
        let scrubbed = anonymize(&record);

        assert_eq!(scrubbed.id, record.id);
        assert_eq!(scrubbed.created_at, record.created_at);
        assert_eq!(scrubbed.address.city, "London");
        assert_eq!(scrubbed.address.state, "Greater London");
        assert_eq!(scrubbed.address.country, "GB");

        assert_ne!(scrubbed.first_name, record.first_name);
        assert_ne!(scrubbed.address.line1, record.address.line1);
        assert_ne!(scrubbed.address.postcode, record.address.postcode);
    }

    #[test]
    fn anonymize_is_deterministic() {
        let record = sample();
        assert_eq!(anonymize(&record), anonymize(&record));
    }

    proptest! {
        #[test]
        fn pseudonym_format(value in any::<String>()) {
            let out = anonymize_value(&value);
            prop_assert_eq!(out.len(), PSEUDONYM_LEN);
            prop_assert!(out.chars().all(|c| c.is_ascii_alphanumeric()));
            prop_assert_eq!(out, anonymize_value(&value));
        }

        #[test]
        fn email_domain_preserved(local in "[a-z0-9._]{1,20}", domain in "[a-z]{1,10}\\.[a-z]{2,3}") {
            let out = anonymize_email(&format!("{local}@{domain}"));
            let (scrubbed_local, kept) = out.split_once('@').unwrap();
            prop_assert_eq!(kept, domain.as_str());
            prop_assert_eq!(scrubbed_local.len(), PSEUDONYM_LEN);
        }
    }
}
