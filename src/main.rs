//! Demo binary for lexroute
//!
//! Builds the orchestrator over a small static legal corpus and an echo
//! generator, then drives a mix of questions through it: fast-path
//! acronyms, simple and complex questions, a repeated question to show the
//! cache, and a deliberately slow retrieval to show degradation.
//!
//! ## Environment Variables
//!
//! - `LOG_FORMAT=json` — structured JSON output (production)
//! - `RUST_LOG=info` — log level filter (default: info)
//! - `LEXROUTE_CONFIG` — optional path to a TOML configuration file

use std::sync::Arc;

use lexroute::adapters::{EchoGenerator, RetrievedDocument, StaticRetriever};
use lexroute::config::loader;
use lexroute::orchestrator::AskRequest;
use lexroute::{init_tracing, metrics, Orchestrator};
use tracing::info;

fn demo_corpus() -> Vec<RetrievedDocument> {
    let entries = [
        (
            "ipc-302",
            "Section 302 of the Indian Penal Code prescribes the punishment for \
             murder: death or imprisonment for life, and a fine. The corresponding \
             provision in the Bharatiya Nyaya Sanhita is Section 103.",
            0.92,
            "criminal",
        ),
        (
            "crpc-154",
            "Section 154 of the Code of Criminal Procedure requires the police to \
             record a First Information Report for every cognizable offence reported \
             to them, and to provide a copy to the informant free of cost.",
            0.85,
            "criminal",
        ),
        (
            "bail-basics",
            "Bail is the conditional release of an accused person pending trial, \
             granted against a bond or surety. Offences are classified as bailable, \
             where bail is a right, or non-bailable, where it is discretionary.",
            0.8,
            "criminal",
        ),
        (
            "dpdp-consent",
            "The Digital Personal Data Protection Act, 2023 requires consent that is \
             free, specific, informed, unconditional, and unambiguous, given through \
             a clear affirmative action, for the processing of digital personal data.",
            0.88,
            "privacy",
        ),
        (
            "dpdp-transfer",
            "Cross-border transfer of personal data under the DPDP Act is permitted \
             to any country not restricted by government notification; penalties for \
             breach of transfer obligations can reach 250 crore rupees.",
            0.82,
            "privacy",
        ),
    ];
    entries
        .into_iter()
        .map(|(id, text, score, domain)| RetrievedDocument {
            id: id.to_string(),
            text: text.to_string(),
            score,
            domain: Some(domain.to_string()),
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = init_tracing();
    metrics::init_metrics()?;

    let config = loader::load_default()?;
    info!("starting lexroute demo");

    let orchestrator = Orchestrator::from_config(
        &config,
        Arc::new(StaticRetriever::new(demo_corpus())),
        Arc::new(EchoGenerator::with_delay(25)),
    );

    let demo_questions = [
        ("session-1", "full form of IPC"),
        ("session-1", "What is IPC Section 302?"),
        ("session-2", "what is FIR"),
        ("session-2", "How do I file an FIR and what documents do I need?"),
        (
            "session-3",
            "Explain DPDP Act consent requirements for data processing including \
             cross-border transfer obligations and penalties",
        ),
        // Repeat from a different conversation: shares the cache entry.
        ("session-4", "What is IPC Section 302?"),
    ];

    for (session, question) in demo_questions {
        let response = orchestrator
            .ask(AskRequest {
                question: question.to_string(),
                session_id: Some(session.to_string()),
                domain: None,
                streaming: false,
            })
            .await;

        info!(
            tier = %response.tier,
            query_type = %response.query_type,
            from_cache = response.from_cache,
            degraded = response.degraded,
            latency_ms = (response.latency_seconds * 1000.0) as u64,
            answer_len = response.answer.len(),
            "answered"
        );
    }

    // A retriever slower than any tier's retrieval share forces the
    // degradation path.
    let slow = Orchestrator::from_config(
        &config,
        Arc::new(StaticRetriever::new(demo_corpus()).with_delay(60_000)),
        Arc::new(EchoGenerator::new()),
    );
    let degraded = slow
        .ask(AskRequest::question("Is anticipatory bail available here"))
        .await;
    info!(
        degraded = degraded.degraded,
        answer_len = degraded.answer.len(),
        "degradation demo"
    );

    let report = metrics::report();
    info!(
        total_requests = report.total_requests,
        cache_hit_rate = report.cache_hit_rate,
        "demo complete"
    );
    for tier in &report.tiers {
        info!(
            tier = %tier.tier,
            requests = tier.requests,
            p50_ms = (tier.p50 * 1000.0) as u64,
            p95_ms = (tier.p95 * 1000.0) as u64,
            "tier latency"
        );
    }

    Ok(())
}
