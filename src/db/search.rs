use super::{Artifact, Catalog};
use crate::error::Result;
use crate::models::SearchEntry;
use rusqlite::params;
use rusqlite::types::Value;
use serde::Serialize;

#[derive(Debug, Default)]
pub struct SearchFilter<'a> {
    /// Postal-code prefix, e.g. "75". Takes precedence over `postal_code`.
    pub department: Option<&'a str>,
    pub postal_code: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub siret: String,
    pub name: String,
    pub city: Option<String>,
    pub is_association: bool,
}

/// Quote every whitespace-separated token so free text never reaches the
/// FTS5 query parser as syntax. `None` when the term has no token.
pub fn fts_query(term: &str) -> Option<String> {
    let tokens: Vec<String> = term
        .split_whitespace()
        .map(|t| format!("\"{}\"", t.replace('"', "\"\"")))
        .collect();
    if tokens.is_empty() {
        None
    } else {
        Some(tokens.join(" "))
    }
}

fn map_hit_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SearchHit> {
    Ok(SearchHit {
        siret: row.get(0)?,
        name: row.get(1)?,
        city: row.get(2)?,
        is_association: row.get::<_, i64>(3)? != 0,
    })
}

impl Catalog {
    /// Drop and rebuild the full-text index.
    pub fn replace_search_index(&mut self, version: &str, entries: &[SearchEntry]) -> Result<usize> {
        self.replace_artifact(Artifact::SearchIndex, version, |tx| {
            let mut stmt = tx.prepare(
                "INSERT INTO search_view (siret, name, postal_code, city, is_association) VALUES (?, ?, ?, ?, ?)",
            )?;
            for e in entries {
                stmt.execute(params![
                    e.siret,
                    e.name,
                    e.postal_code,
                    e.city,
                    i64::from(e.is_association),
                ])?;
            }
            Ok(entries.len())
        })
    }

    /// Full-text search on establishment names.
    pub fn search(&self, term: &str, limit: Option<usize>) -> Result<Vec<SearchHit>> {
        self.search_with_filter(term, limit, None)
    }

    /// Full-text search narrowed by department or exact postal code.
    pub fn search_with_filter(
        &self,
        term: &str,
        limit: Option<usize>,
        filter: Option<&SearchFilter<'_>>,
    ) -> Result<Vec<SearchHit>> {
        let Some(match_expr) = fts_query(term) else {
            return Ok(Vec::new());
        };

        let mut query = String::from(
            "SELECT siret, name, city, is_association FROM search_view WHERE search_view MATCH ?",
        );
        let mut params: Vec<Value> = vec![Value::Text(match_expr)];

        if let Some(f) = filter {
            if let Some(dept) = f.department {
                query.push_str(" AND substr(postal_code, 1, ?) = ?");
                params.push(Value::Integer(dept.chars().count() as i64));
                params.push(Value::Text(dept.to_string()));
            } else if let Some(pc) = f.postal_code {
                query.push_str(" AND postal_code = ?");
                params.push(Value::Text(pc.to_string()));
            }
        }

        query.push_str(" ORDER BY rank LIMIT ?");
        params.push(Value::Integer(limit.map_or(-1, |l| l as i64)));

        let param_refs: Vec<&dyn rusqlite::ToSql> =
            params.iter().map(|p| p as &dyn rusqlite::ToSql).collect();

        let mut stmt = self.conn.prepare(&query)?;
        let rows = stmt.query_map(param_refs.as_slice(), map_hit_row)?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }

        Ok(results)
    }
}
