use std::env;

use anyhow::Context;

use lexdraft_retrieval::core::logging;
use lexdraft_retrieval::{AppPaths, RetrievalConfig, RetrievalService, RuleFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let paths = AppPaths::new();
    logging::init(&paths);

    let config = RetrievalConfig::load(&paths);
    let service = RetrievalService::new(&paths, &config);

    let outcome = service
        .initialize(true)
        .await
        .context("Failed to load the drafting rule corpus")?;
    tracing::info!(
        "Corpus ready: {} rules, semantic search {}",
        outcome.rules_loaded,
        if outcome.embeddings_ready { "on" } else { "off" }
    );

    let query: String = env::args().skip(1).collect::<Vec<_>>().join(" ");

    if query.trim().is_empty() {
        let stats = service.stats().await;
        println!(
            "corpus {} ({} rules), embeddings {}",
            stats.corpus_version.as_deref().unwrap_or("?"),
            stats.rule_count,
            if stats.embeddings_ready { "ready" } else { "unavailable" }
        );
        println!();
        println!("Default rule selection (high and medium severity):");
        for rule in service.get_relevant_rules(&RuleFilter::default()).await {
            println!("- {} [{}]", rule.id, rule.metadata.severity);
        }
        return Ok(());
    }

    let context = service
        .build_semantic_context(&query, config.default_top_k)
        .await;

    if context.is_empty() {
        println!("(no matching rules)");
    } else {
        println!("{}", context);
    }

    Ok(())
}
