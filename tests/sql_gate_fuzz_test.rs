//! Randomized checks of the read-only SQL gate.

use floatchat_mcp::tools::sql_validator::is_safe_select;
use rand::distributions::Alphanumeric;
use rand::seq::SliceRandom;
use rand::{Rng, thread_rng};

const ITERATIONS: usize = 500;

const FORBIDDEN: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "DROP", "CREATE", "ALTER", "TRUNCATE", "INTO",
];

const SEPARATORS: &[&str] = &[" ", "\t", "\n", "  ", " \r\n "];

fn random_identifier(rng: &mut impl Rng) -> String {
    let len = rng.gen_range(1..12);
    let tail: String = rng
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect();
    format!("c_{}", tail.to_lowercase())
}

fn random_case(rng: &mut impl Rng, word: &str) -> String {
    word.chars()
        .map(|c| {
            if rng.gen_bool(0.5) {
                c.to_ascii_uppercase()
            } else {
                c.to_ascii_lowercase()
            }
        })
        .collect()
}

fn separator(rng: &mut impl Rng) -> &'static str {
    SEPARATORS.choose(rng).copied().unwrap_or(" ")
}

#[test]
fn test_random_selects_pass() {
    let mut rng = thread_rng();
    for _ in 0..ITERATIONS {
        let columns: Vec<String> = (0..rng.gen_range(1..5))
            .map(|_| random_identifier(&mut rng))
            .collect();
        let sql = format!(
            "{}{}{}{}FROM{}profiles WHERE depth > {}",
            random_case(&mut rng, "select"),
            separator(&mut rng),
            columns.join(", "),
            separator(&mut rng),
            separator(&mut rng),
            rng.gen_range(0..2000)
        );
        assert!(is_safe_select(&sql), "rejected: {sql:?}");
    }
}

#[test]
fn test_forbidden_keyword_anywhere_rejected() {
    let mut rng = thread_rng();
    for _ in 0..ITERATIONS {
        let word = FORBIDDEN.choose(&mut rng).unwrap();
        let keyword = random_case(&mut rng, word);
        let column = random_identifier(&mut rng);
        let sql = match rng.gen_range(0..3) {
            0 => format!("SELECT {column}{}{keyword} FROM profiles", separator(&mut rng)),
            1 => format!("SELECT {column} FROM profiles WHERE {keyword}({column})"),
            _ => format!("{keyword}{}{column}", separator(&mut rng)),
        };
        assert!(!is_safe_select(&sql), "accepted: {sql:?}");
    }
}

#[test]
fn test_markers_rejected_wherever_inserted() {
    let mut rng = thread_rng();
    let base = "SELECT float_id, depth FROM profiles WHERE qc = 'ok'";
    for _ in 0..ITERATIONS {
        let marker = [";", "--", "/*"].choose(&mut rng).unwrap();
        let boundaries: Vec<usize> = base
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(base.len()))
            .collect();
        let at = *boundaries.choose(&mut rng).unwrap();
        let sql = format!("{}{}{}", &base[..at], marker, &base[at..]);
        assert!(!is_safe_select(&sql), "accepted: {sql:?}");
    }
}

#[test]
fn test_keyword_prefixed_identifiers_pass() {
    let mut rng = thread_rng();
    for _ in 0..ITERATIONS {
        let keyword = FORBIDDEN.choose(&mut rng).unwrap().to_lowercase();
        let column = format!("{keyword}_{}", random_identifier(&mut rng));
        let sql = format!("SELECT {column} FROM profile_summaries");
        assert!(is_safe_select(&sql), "rejected: {sql:?}");
    }
}

#[test]
fn test_random_noise_never_panics() {
    let mut rng = thread_rng();
    for _ in 0..ITERATIONS {
        let len = rng.gen_range(0..64);
        let noise: String = (0..len)
            .map(|_| char::from(rng.gen_range(0x20u8..0x7f)))
            .collect();
        let _ = is_safe_select(&noise);
        let _ = is_safe_select(&format!("SELECT {noise}"));
    }
}
