//! Configuration validation engine.
//!
//! ## Responsibility
//! Validate semantic constraints on a parsed [`OrchestratorConfig`] that
//! cannot be expressed through the type system alone: ordering invariants
//! across the tier table, range checks, and cross-field rules.
//!
//! ## Guarantees
//! - Every validation rule has at least one test that triggers it
//! - Validation collects *all* errors before returning (no short-circuit)
//! - Error messages include the field path and the invalid value
//!
//! ## NOT Responsible For
//! - Parsing TOML (that belongs to `loader`)
//! - File I/O (that belongs to `loader`)

use crate::routing::ComplexityTier;

use super::{CacheBackend, OrchestratorConfig};

/// Errors arising from configuration parsing, validation, or I/O.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parsing failed.
    #[error("parse error in {file}: {source}")]
    Parse {
        /// Path of the file that failed to parse.
        file: String,
        /// Underlying TOML deserialization error.
        #[source]
        source: toml::de::Error,
    },

    /// One or more semantic validation rules failed.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A specific field has an out-of-range or contradictory value.
    #[error("field '{field}' has invalid value {value}: {reason}")]
    InvalidField {
        /// Dot-separated field path (e.g., "cache.ttl_s").
        field: String,
        /// String representation of the invalid value.
        value: String,
        /// Human-readable explanation of the constraint.
        reason: String,
    },

    /// File I/O error.
    #[error("IO error reading {file}: {source}")]
    Io {
        /// Path of the file that could not be read.
        file: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Validate all semantic constraints on an [`OrchestratorConfig`].
///
/// Collects every violation before returning so the caller sees the full
/// scope of issues at once.
///
/// # Errors
///
/// Returns `Err(Vec<ConfigError>)` with every violation found.
pub fn validate(config: &OrchestratorConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    // ── Tier budget table ────────────────────────────────────────────
    // Ceilings must strictly increase so a higher tier always buys
    // strictly more time.
    let mut prev: Option<(ComplexityTier, u64)> = None;
    for tier in ComplexityTier::ALL {
        let budget = config.routing.budgets.get(tier);

        if let Some((prev_tier, prev_ms)) = prev {
            if budget.total_ms <= prev_ms {
                errors.push(ConfigError::InvalidField {
                    field: format!("routing.budgets.{tier}.total_ms"),
                    value: budget.total_ms.to_string(),
                    reason: format!("must exceed the {prev_tier} ceiling of {prev_ms}ms"),
                });
            }
        }
        prev = Some((tier, budget.total_ms));

        let frac_sum = budget.retrieval_frac + budget.selection_frac + budget.generation_frac;
        if frac_sum > 1.0 {
            errors.push(ConfigError::InvalidField {
                field: format!("routing.budgets.{tier}"),
                value: format!("{frac_sum:.3}"),
                reason: "stage fractions must sum to at most 1.0".into(),
            });
        }
        for (name, frac) in [
            ("retrieval_frac", budget.retrieval_frac),
            ("selection_frac", budget.selection_frac),
            ("generation_frac", budget.generation_frac),
        ] {
            if !(0.0..=1.0).contains(&frac) {
                errors.push(ConfigError::InvalidField {
                    field: format!("routing.budgets.{tier}.{name}"),
                    value: frac.to_string(),
                    reason: "must be between 0.0 and 1.0".into(),
                });
            }
        }

        if budget.document_count == 0 {
            errors.push(ConfigError::InvalidField {
                field: format!("routing.budgets.{tier}.document_count"),
                value: "0".into(),
                reason: "must request at least 1 document".into(),
            });
        }
        if budget.max_tokens == 0 {
            errors.push(ConfigError::InvalidField {
                field: format!("routing.budgets.{tier}.max_tokens"),
                value: "0".into(),
                reason: "must allow at least 1 token".into(),
            });
        }
        if budget.context_chars == 0 {
            errors.push(ConfigError::InvalidField {
                field: format!("routing.budgets.{tier}.context_chars"),
                value: "0".into(),
                reason: "must allow at least 1 character of context".into(),
            });
        }
    }

    // ── Cut points ───────────────────────────────────────────────────
    let c = config.routing.cut_points;
    let ordered = c.ultra_simple_max < c.simple_max
        && c.simple_max < c.moderate_max
        && c.moderate_max < c.complex_max;
    if !ordered {
        errors.push(ConfigError::InvalidField {
            field: "routing.cut_points".into(),
            value: format!(
                "{} / {} / {} / {}",
                c.ultra_simple_max, c.simple_max, c.moderate_max, c.complex_max
            ),
            reason: "boundaries must strictly increase".into(),
        });
    }

    // ── Fast lookup gate ─────────────────────────────────────────────
    if config.routing.fast_lookup_max_words == 0 {
        errors.push(ConfigError::InvalidField {
            field: "routing.fast_lookup_max_words".into(),
            value: "0".into(),
            reason: "must be at least 1".into(),
        });
    }

    // ── Cache ────────────────────────────────────────────────────────
    if config.cache.backend != CacheBackend::Disabled {
        if config.cache.ttl_s == 0 {
            errors.push(ConfigError::InvalidField {
                field: "cache.ttl_s".into(),
                value: "0".into(),
                reason: "TTL must be at least 1 second".into(),
            });
        }
        if config.cache.max_entries == 0 {
            errors.push(ConfigError::InvalidField {
                field: "cache.max_entries".into(),
                value: "0".into(),
                reason: "must hold at least 1 entry".into(),
            });
        }
    }
    if config.cache.flight_lease_s == 0 {
        errors.push(ConfigError::InvalidField {
            field: "cache.flight_lease_s".into(),
            value: "0".into(),
            reason: "lease must be at least 1 second".into(),
        });
    }
    if config.cache.backend == CacheBackend::Redis && config.cache.redis_url.trim().is_empty() {
        errors.push(ConfigError::InvalidField {
            field: "cache.redis_url".into(),
            value: String::new(),
            reason: "must not be empty when the redis backend is selected".into(),
        });
    }

    // ── Adapters ─────────────────────────────────────────────────────
    if !(0.0..=2.0).contains(&config.adapters.temperature) {
        errors.push(ConfigError::InvalidField {
            field: "adapters.temperature".into(),
            value: config.adapters.temperature.to_string(),
            reason: "must be between 0.0 and 2.0".into(),
        });
    }

    // ── Memory & feedback ────────────────────────────────────────────
    if config.memory.capacity == 0 {
        errors.push(ConfigError::InvalidField {
            field: "memory.capacity".into(),
            value: "0".into(),
            reason: "must keep at least 1 exchange per session".into(),
        });
    }
    if config.feedback.queue_capacity == 0 {
        errors.push(ConfigError::InvalidField {
            field: "feedback.queue_capacity".into(),
            value: "0".into(),
            reason: "must queue at least 1 record".into(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
