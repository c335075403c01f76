//! Per-type trigger conditions.
//!
//! A `TriggerCondition` is the type-specific half of a rule, consulted only
//! after the cooldown gate has passed. Conditions look at nothing but the
//! latest signal for the agent's pool, and compare basis points as integers,
//! inclusively.

use autoswap_contracts::{
    execution::Decision,
    rule::{Rule, RuleType},
    signal::{Signal, SignalKind},
    Bps,
};

/// What a rule needs to see before it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerCondition {
    /// Fires whenever the cooldown has elapsed; the cooldown is the interval.
    Interval,

    /// Fires on a signal of `kind` with `magnitude_bps >= threshold_bps`.
    SignalAtLeast { kind: SignalKind, threshold_bps: Bps },

    /// Needs a price oracle that is not wired in. Never fires.
    RequiresOracle,

    /// No trigger semantics are defined for this rule type. Never fires.
    Unsupported(RuleType),
}

impl TriggerCondition {
    pub fn for_rule(rule: &Rule) -> Self {
        match rule.rule_type {
            RuleType::TimeWeighted => TriggerCondition::Interval,
            RuleType::RebalanceThreshold | RuleType::StopLoss => TriggerCondition::SignalAtLeast {
                kind: SignalKind::PRICE_IMPACT,
                threshold_bps: rule.threshold_bps,
            },
            RuleType::CustomSignal => TriggerCondition::SignalAtLeast {
                kind: SignalKind(rule.target_value),
                threshold_bps: rule.threshold_bps,
            },
            RuleType::TakeProfit => TriggerCondition::RequiresOracle,
            other @ RuleType::LiquidityRange => TriggerCondition::Unsupported(other),
        }
    }

    pub fn check(&self, latest_signal: Option<&Signal>) -> Decision {
        match *self {
            TriggerCondition::Interval => Decision::execute("interval elapsed"),

            TriggerCondition::SignalAtLeast { kind, threshold_bps } => {
                let Some(signal) = latest_signal else {
                    return Decision::skip("no signal");
                };
                if signal.kind != kind {
                    return Decision::skip(format!("no signal: latest is {}, need {}", signal.kind, kind));
                }
                if signal.magnitude_bps >= threshold_bps {
                    Decision::execute(format!(
                        "{} {}bps >= threshold {}bps",
                        kind, signal.magnitude_bps, threshold_bps
                    ))
                } else {
                    Decision::skip(format!(
                        "below threshold: {}bps < {}bps",
                        signal.magnitude_bps, threshold_bps
                    ))
                }
            }

            TriggerCondition::RequiresOracle => {
                Decision::skip("insufficient data: take-profit requires a price oracle")
            }

            TriggerCondition::Unsupported(rule_type) => {
                Decision::skip(format!("unsupported rule type {:?}", rule_type))
            }
        }
    }
}
