//! `schemalink lineage` command.

use crate::cli::LineageQuery;
use crate::config::AppConfig;
use crate::context::ServiceContext;
use crate::lineage::TraversalHit;

/// Execute a lineage query against the configured graph.
///
/// # Errors
///
/// Returns an error string if the graph cannot be loaded.
pub fn run(ctx: &ServiceContext, config: &AppConfig, query: &LineageQuery) -> Result<(), String> {
    let graph = super::open_graph(ctx, config)?;

    match query {
        LineageQuery::Upstream { node_id, depth } => {
            print_hits("Upstream", node_id, &graph.upstream_of(node_id, *depth));
        }
        LineageQuery::Downstream { node_id, depth } => {
            print_hits("Downstream", node_id, &graph.downstream_of(node_id, *depth));
        }
        LineageQuery::Impact { table } => {
            let report = graph.impact_analysis(table);
            println!(
                "Impact of changing {}: {} nodes",
                report.table, report.total_affected
            );
            for (label, ids) in [
                ("Tables", &report.affected_tables),
                ("Transformations", &report.affected_transformations),
                ("Documents", &report.affected_documents),
            ] {
                if ids.is_empty() {
                    continue;
                }
                println!("{label}:");
                for id in ids {
                    println!("  {id}");
                }
            }
        }
        LineageQuery::Stats => {
            let stats = graph.stats();
            println!("Nodes: {}", stats.total_nodes);
            for (kind, count) in &stats.nodes_by_kind {
                println!("  {kind}: {count}");
            }
            println!("Edges: {}", stats.total_edges);
            for (relationship, count) in &stats.edges_by_relationship {
                println!("  {relationship}: {count}");
            }
        }
        LineageQuery::Dot => print!("{}", graph.export_dot()),
    }
    Ok(())
}

fn print_hits(direction: &str, node_id: &str, hits: &[TraversalHit]) {
    if hits.is_empty() {
        println!("{direction} of {node_id}: none");
        return;
    }
    println!("{direction} of {node_id}:");
    for hit in hits {
        println!(
            "  [{}] {} ({}, via {})",
            hit.depth, hit.node.id, hit.node.kind, hit.relationship
        );
    }
}
