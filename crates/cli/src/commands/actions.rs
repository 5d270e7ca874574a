//! `mindloop actions` — Print the innate repertoire.

use std::collections::BTreeMap;

use mindloop_actions::default_registry;

pub fn run() {
    for (category, signatures) in by_category() {
        println!("{category}");
        for signature in signatures {
            println!("   {signature}");
        }
        println!();
    }
}

/// Action signatures keyed by category, both sorted.
fn by_category() -> BTreeMap<String, Vec<String>> {
    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for schema in default_registry().schemas() {
        grouped
            .entry(schema.category.clone())
            .or_default()
            .push(schema.signature());
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speak_listed_under_communication() {
        let grouped = by_category();
        let communication = &grouped["communication"];
        assert!(communication.iter().any(|s| s.starts_with("speak(content)")));
        assert!(grouped.values().all(|v| !v.is_empty()));
    }
}
