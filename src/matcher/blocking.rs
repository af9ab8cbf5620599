//! Blocking keys.
//!
//! Candidates are only compared inside a block: the department for exact
//! name equality, the full postal code for approximate similarity.
use std::collections::HashMap;
use std::hash::Hash;

use super::clean::{char_len, name_clean};

/// First two characters of a postal code ("2A"/"2B" for Corsica included).
pub fn department(postal_code: &str) -> &str {
    match postal_code.char_indices().nth(2) {
        Some((end, _)) => &postal_code[..end],
        None => postal_code,
    }
}

/// One side of a candidate pair, with its blocking keys precomputed.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate<'a> {
    pub id: &'a str,
    pub postal_code: &'a str,
    pub department: &'a str,
    pub name_clean: String,
    /// `name_clean` length in characters.
    pub name_len: usize,
}

impl<'a> Candidate<'a> {
    pub fn new(id: &'a str, name: &str, postal_code: &'a str) -> Self {
        let name_clean = name_clean(name);
        Self {
            id,
            postal_code,
            department: department(postal_code),
            name_len: char_len(&name_clean),
            name_clean,
        }
    }
}

/// Group candidates by `key`, keeping input order inside each block.
pub fn block_by<'c, 'a, K, F>(candidates: &'c [Candidate<'a>], key: F) -> HashMap<K, Vec<&'c Candidate<'a>>>
where
    K: Eq + Hash,
    F: Fn(&'c Candidate<'a>) -> K,
{
    let mut blocks: HashMap<K, Vec<&'c Candidate<'a>>> = HashMap::new();
    for candidate in candidates {
        blocks.entry(key(candidate)).or_default().push(candidate);
    }
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_department() {
        assert_eq!(department("75001"), "75");
        assert_eq!(department("2A004"), "2A");
        assert_eq!(department("7"), "7");
        assert_eq!(department(""), "");
    }

    #[test]
    fn test_candidate_keys() {
        let c = Candidate::new("W1", "Amicale des Pêcheurs", "29200");
        assert_eq!(c.department, "29");
        assert_eq!(c.name_clean, "PÊCHEURS");
        assert_eq!(c.name_len, 8);
    }

    #[test]
    fn test_block_by_postal_code() {
        let candidates = vec![
            Candidate::new("1", "A", "75001"),
            Candidate::new("2", "B", "75002"),
            Candidate::new("3", "C", "75001"),
        ];
        let blocks = block_by(&candidates, |c| c.postal_code);
        assert_eq!(blocks.len(), 2);
        let ids: Vec<&str> = blocks["75001"].iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["1", "3"]);

        let by_department = block_by(&candidates, |c| c.department);
        assert_eq!(by_department["75"].len(), 3);
    }
}
