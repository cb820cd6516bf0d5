//! `cpuid leaves`: print the leaf catalog.

use anyhow::Result;
use cpuid_core::leaf::LEAVES;

use super::print_json;

pub fn run() -> Result<()> {
    print_json(&LEAVES)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_serializes() {
        let json = serde_json::to_value(LEAVES).unwrap();
        let entries = json.as_array().unwrap();
        assert_eq!(entries.len(), LEAVES.len());
        assert_eq!(entries[0]["name"], "basic_info");
        assert_eq!(entries[0]["subleaves"], "single");
    }
}
