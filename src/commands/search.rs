//! `schemalink search` command.

use std::fmt::Write;

use crate::context::ServiceContext;
use crate::ports::fetcher::SourceKind;
use crate::ports::index::SearchHit;

/// Search the document index and print the best matches.
///
/// # Errors
///
/// Returns an error string if the index cannot be read.
pub fn run(
    ctx: &ServiceContext,
    query: &str,
    limit: usize,
    source_type: Option<SourceKind>,
    json: bool,
) -> Result<(), String> {
    let Some(index) = &ctx.index else {
        println!("Document index is disabled.");
        return Ok(());
    };
    let hits = index
        .search(query, limit, source_type)
        .map_err(|e| format!("Search failed: {e}"))?;

    if json {
        return super::print_json(&hits);
    }
    print!("{}", format_hits(query, &hits));
    Ok(())
}

fn format_hits(query: &str, hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return format!("No results for '{query}'.\n");
    }
    let mut out = format!("{} results for '{query}'\n", hits.len());
    for hit in hits {
        let _ = write!(
            out,
            "  [{:.2}] {}:{} {}",
            hit.score, hit.source_type, hit.source_id, hit.title
        );
        if !hit.tables_mentioned.is_empty() {
            let _ = write!(out, " (tables: {})", hit.tables_mentioned.join(", "));
        }
        let _ = writeln!(out, "\n      {}", hit.excerpt);
    }
    out
}
