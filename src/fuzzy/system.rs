//! Mamdani fuzzy control system: config schema, compilation and inference.
//!
//! Config (TOML, one per domain):
//! ```toml
//! [fuzzy.output]
//! name = "recommendation"
//! universe = [0.0, 1.0]
//! step = 0.1
//! terms = { poor = [0.0, 0.0, 0.5], good = [0.5, 1.0, 1.0] }
//!
//! [[fuzzy.inputs]]
//! name = "rating"
//! signal = "rating"
//! universe = [0.0, 10.0]
//! terms = { poor = [0.0, 0.0, 4.0], good = [6.0, 10.0, 10.0] }
//!
//! [[fuzzy.rules]]
//! when = { rating = "good" }
//! then = "good"
//! ```
//!
//! Inference: fuzzify clamped inputs, fire each rule with `min` over its
//! clauses, clip the consequent term at the firing strength, aggregate with
//! pointwise `max` over the sampled output universe, take the centroid.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

use super::defuzz::{centroid, sample_universe};
use super::membership::Triangle;
use crate::numeric::clamp_to;

/// Upper bound on output samples; keeps a bad `step` from allocating wildly.
const MAX_OUTPUT_SAMPLES: usize = 100_000;

/// Item-derived quantity an input variable reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    /// Blended preference/content score.
    Relevance,
    Rating,
    Popularity,
    Cost,
}

/* ----------------------------
Config schema
---------------------------- */

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VariableConfig {
    pub name: String,
    /// Required for inputs, ignored for the output.
    #[serde(default)]
    pub signal: Option<Signal>,
    pub universe: [f64; 2],
    /// Sampling resolution of the output universe; required there. Inputs are
    /// fuzzified at their crisp value, so an input `step` is only sanity-checked.
    #[serde(default)]
    pub step: Option<f64>,
    pub terms: BTreeMap<String, Triangle>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    #[serde(default)]
    pub name: Option<String>,
    /// Antecedent clauses: input variable → term. Combined with AND (min).
    pub when: BTreeMap<String, String>,
    /// Consequent term of the output variable.
    pub then: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FuzzySystemConfig {
    pub inputs: Vec<VariableConfig>,
    pub output: VariableConfig,
    pub rules: Vec<RuleConfig>,
}

/* ----------------------------
Compiled structures
---------------------------- */

/// A compiled linguistic variable.
#[derive(Debug, Clone)]
pub struct FuzzyVariable {
    pub name: String,
    pub lo: f64,
    pub hi: f64,
    terms: Vec<(String, Triangle)>,
}

impl FuzzyVariable {
    fn compile(cfg: &VariableConfig) -> anyhow::Result<Self> {
        let [lo, hi] = cfg.universe;
        if !(lo.is_finite() && hi.is_finite() && lo < hi) {
            anyhow::bail!(
                "variable `{}`: universe must be finite with lo < hi, got [{lo}, {hi}]",
                cfg.name
            );
        }
        if let Some(step) = cfg.step {
            if !(step.is_finite() && step > 0.0) {
                anyhow::bail!("variable `{}`: step must be > 0, got {step}", cfg.name);
            }
        }
        if cfg.terms.is_empty() {
            anyhow::bail!("variable `{}` declares no terms", cfg.name);
        }
        let mut terms = Vec::with_capacity(cfg.terms.len());
        for (term, tri) in &cfg.terms {
            tri.validate()
                .with_context(|| format!("variable `{}` term `{term}`", cfg.name))?;
            terms.push((term.clone(), *tri));
        }
        Ok(Self {
            name: cfg.name.clone(),
            lo,
            hi,
            terms,
        })
    }

    pub fn clamp(&self, x: f64) -> f64 {
        clamp_to(x, self.lo, self.hi)
    }

    pub fn term_names(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().map(|(n, _)| n.as_str())
    }

    fn term_index(&self, term: &str) -> Option<usize> {
        self.terms.iter().position(|(n, _)| n == term)
    }

    /// Degree of `x` (clamped to the universe) in `term`.
    pub fn membership(&self, term: &str, x: f64) -> Option<f64> {
        let idx = self.term_index(term)?;
        Some(self.terms[idx].1.degree(self.clamp(x)))
    }

    fn degrees(&self, x: f64) -> Vec<f64> {
        let x = self.clamp(x);
        self.terms.iter().map(|(_, t)| t.degree(x)).collect()
    }
}

#[derive(Debug, Clone)]
struct CompiledRule {
    label: String,
    /// `(input index, term index)`
    clauses: Vec<(usize, usize)>,
    consequent: usize,
}

/// Result of one inference.
#[derive(Debug, Clone, PartialEq)]
pub struct Inference {
    /// Crisp output in the output universe.
    pub value: f64,
    pub fired_rules: usize,
    /// True when no rule fired and `value` is the universe midpoint.
    pub fallback: bool,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FuzzyError {
    #[error("expected {expected} crisp inputs, got {got}")]
    Arity { expected: usize, got: usize },
    #[error("no value supplied for input `{0}`")]
    MissingInput(String),
}

/// Compiled, immutable fuzzy system. Cheap to share across threads.
#[derive(Debug, Clone)]
pub struct FuzzySystem {
    inputs: Vec<FuzzyVariable>,
    signals: Vec<Signal>,
    output: FuzzyVariable,
    output_samples: Vec<f64>,
    rules: Vec<CompiledRule>,
}

impl FuzzySystem {
    /// Validate and compile a config.
    pub fn compile(cfg: &FuzzySystemConfig) -> anyhow::Result<Self> {
        if cfg.inputs.is_empty() {
            anyhow::bail!("fuzzy system declares no inputs");
        }
        let mut seen = HashSet::new();
        let mut inputs = Vec::with_capacity(cfg.inputs.len());
        let mut signals = Vec::with_capacity(cfg.inputs.len());
        for v in &cfg.inputs {
            if !seen.insert(v.name.as_str()) {
                anyhow::bail!("duplicate input variable `{}`", v.name);
            }
            let signal = v
                .signal
                .ok_or_else(|| anyhow::anyhow!("input `{}` has no `signal`", v.name))?;
            inputs.push(FuzzyVariable::compile(v)?);
            signals.push(signal);
        }

        let output = FuzzyVariable::compile(&cfg.output)?;
        let step = cfg
            .output
            .step
            .ok_or_else(|| anyhow::anyhow!("output `{}` has no `step`", output.name))?;
        if (output.hi - output.lo) / step >= MAX_OUTPUT_SAMPLES as f64 {
            anyhow::bail!(
                "output `{}` step {step} is too fine (max {MAX_OUTPUT_SAMPLES} samples)",
                output.name
            );
        }
        let output_samples = sample_universe(output.lo, output.hi, step);

        if cfg.rules.is_empty() {
            anyhow::bail!("fuzzy system declares no rules");
        }
        let rules = cfg
            .rules
            .iter()
            .enumerate()
            .map(|(i, r)| {
                let label = r.name.clone().unwrap_or_else(|| format!("rule#{}", i + 1));
                if r.when.is_empty() {
                    anyhow::bail!("{label}: `when` has no clauses");
                }
                let clauses = r
                    .when
                    .iter()
                    .map(|(var, term)| {
                        let vi = inputs
                            .iter()
                            .position(|v| &v.name == var)
                            .ok_or_else(|| anyhow::anyhow!("{label}: unknown input `{var}`"))?;
                        let ti = inputs[vi].term_index(term).ok_or_else(|| {
                            anyhow::anyhow!("{label}: input `{var}` has no term `{term}`")
                        })?;
                        Ok((vi, ti))
                    })
                    .collect::<anyhow::Result<Vec<_>>>()?;
                let consequent = output.term_index(&r.then).ok_or_else(|| {
                    anyhow::anyhow!("{label}: output `{}` has no term `{}`", output.name, r.then)
                })?;
                Ok(CompiledRule {
                    label,
                    clauses,
                    consequent,
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Self {
            inputs,
            signals,
            output,
            output_samples,
            rules,
        })
    }

    pub fn inputs(&self) -> &[FuzzyVariable] {
        &self.inputs
    }

    pub fn output(&self) -> &FuzzyVariable {
        &self.output
    }

    /// Signals feeding the inputs, in input order.
    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn input(&self, name: &str) -> Option<&FuzzyVariable> {
        self.inputs.iter().find(|v| v.name == name)
    }

    /// Run inference on crisp inputs given in input order.
    pub fn evaluate(&self, crisp: &[f64]) -> Result<Inference, FuzzyError> {
        if crisp.len() != self.inputs.len() {
            return Err(FuzzyError::Arity {
                expected: self.inputs.len(),
                got: crisp.len(),
            });
        }

        let degrees: Vec<Vec<f64>> = self
            .inputs
            .iter()
            .zip(crisp)
            .map(|(v, &x)| v.degrees(x))
            .collect();

        // (firing strength, consequent) for every rule that fired.
        let fired: Vec<(f64, usize)> = self
            .rules
            .iter()
            .filter_map(|r| {
                let strength = r
                    .clauses
                    .iter()
                    .map(|&(vi, ti)| degrees[vi][ti])
                    .fold(1.0_f64, f64::min);
                (strength > 0.0).then_some((strength, r.consequent))
            })
            .collect();

        let midpoint = (self.output.lo + self.output.hi) / 2.0;
        if fired.is_empty() {
            return Ok(Inference {
                value: midpoint,
                fired_rules: 0,
                fallback: true,
            });
        }

        let aggregated: Vec<f64> = self
            .output_samples
            .iter()
            .map(|&x| {
                fired
                    .iter()
                    .map(|&(s, term)| s.min(self.output.terms[term].1.degree(x)))
                    .fold(0.0_f64, f64::max)
            })
            .collect();

        match centroid(&self.output_samples, &aggregated) {
            Some(c) => Ok(Inference {
                value: self.output.clamp(c),
                fired_rules: fired.len(),
                fallback: false,
            }),
            // Fired, but the clipped terms vanish on every sample.
            None => Ok(Inference {
                value: midpoint,
                fired_rules: fired.len(),
                fallback: true,
            }),
        }
    }

    /// Run inference pulling each input's value from `lookup` by its signal.
    pub fn evaluate_signals<F>(&self, lookup: F) -> Result<Inference, FuzzyError>
    where
        F: Fn(Signal) -> Option<f64>,
    {
        let crisp = self
            .inputs
            .iter()
            .zip(&self.signals)
            .map(|(v, &s)| lookup(s).ok_or_else(|| FuzzyError::MissingInput(v.name.clone())))
            .collect::<Result<Vec<_>, _>>()?;
        self.evaluate(&crisp)
    }

    /// Firing strength of every rule for the given inputs, labelled. For diagnostics.
    pub fn rule_strengths(&self, crisp: &[f64]) -> Result<Vec<(String, f64)>, FuzzyError> {
        if crisp.len() != self.inputs.len() {
            return Err(FuzzyError::Arity {
                expected: self.inputs.len(),
                got: crisp.len(),
            });
        }
        Ok(self
            .rules
            .iter()
            .map(|r| {
                let s = r
                    .clauses
                    .iter()
                    .map(|&(vi, ti)| {
                        let v = &self.inputs[vi];
                        v.terms[ti].1.degree(v.clamp(crisp[vi]))
                    })
                    .fold(1.0_f64, f64::min);
                (r.label.clone(), s)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIP_TOML: &str = r#"
[output]
name = "tip"
universe = [0.0, 1.0]
step = 0.1
terms = { low = [0.0, 0.0, 0.5], high = [0.5, 1.0, 1.0] }

[[inputs]]
name = "service"
signal = "rating"
universe = [0.0, 10.0]
step = 0.1
terms = { bad = [0.0, 0.0, 5.0], great = [5.0, 10.0, 10.0] }

[[rules]]
name = "bad service"
when = { service = "bad" }
then = "low"

[[rules]]
name = "great service"
when = { service = "great" }
then = "high"
"#;

    fn tip() -> FuzzySystem {
        let cfg: FuzzySystemConfig = toml::from_str(TIP_TOML).unwrap();
        FuzzySystem::compile(&cfg).unwrap()
    }

    #[test]
    fn extremes_pull_output_to_the_matching_side() {
        let sys = tip();
        let low = sys.evaluate(&[0.0]).unwrap();
        let high = sys.evaluate(&[10.0]).unwrap();
        assert!(!low.fallback && !high.fallback);
        assert!(low.value < 0.3, "low {}", low.value);
        assert!(high.value > 0.7, "high {}", high.value);
        // Mirror-image rule base → mirror-image outputs.
        assert!((low.value + high.value - 1.0).abs() < 1e-9);
    }

    #[test]
    fn output_is_monotonic_for_monotonic_rules() {
        let sys = tip();
        let mut last = f64::NEG_INFINITY;
        for k in 0..=20 {
            let v = sys.evaluate(&[k as f64 * 0.5]).unwrap().value;
            assert!(v >= last - 1e-12, "service {}: {v} < {last}", k as f64 * 0.5);
            last = v;
        }
    }

    #[test]
    fn no_rule_fired_falls_back_to_midpoint() {
        // service = 5 sits on the zero edge of both triangles.
        let out = tip().evaluate(&[5.0]).unwrap();
        assert!(out.fallback);
        assert_eq!(out.fired_rules, 0);
        assert_eq!(out.value, 0.5);
    }

    #[test]
    fn inputs_are_clamped_to_the_universe() {
        let sys = tip();
        let clamped = sys.evaluate(&[10.0]).unwrap();
        assert_eq!(sys.evaluate(&[42.0]).unwrap(), clamped);
        assert_eq!(sys.evaluate(&[f64::NAN]).unwrap(), sys.evaluate(&[0.0]).unwrap());
    }

    #[test]
    fn arity_and_missing_inputs_are_errors() {
        let sys = tip();
        assert_eq!(
            sys.evaluate(&[1.0, 2.0]),
            Err(FuzzyError::Arity {
                expected: 1,
                got: 2
            })
        );
        let err = sys.evaluate_signals(|_| None).unwrap_err();
        assert_eq!(err, FuzzyError::MissingInput("service".into()));
        let ok = sys
            .evaluate_signals(|s| (s == Signal::Rating).then_some(10.0))
            .unwrap();
        assert!(ok.value > 0.7);
    }

    #[test]
    fn rule_strengths_are_labelled() {
        let s = tip().rule_strengths(&[7.5]).unwrap();
        assert_eq!(s[0].0, "bad service");
        assert_eq!(s[0].1, 0.0);
        assert_eq!(s[1].0, "great service");
        assert!((s[1].1 - 0.5).abs() < 1e-12);
    }

    #[test]
    fn compile_rejects_bad_configs() {
        let base: FuzzySystemConfig = toml::from_str(TIP_TOML).unwrap();

        let mut unknown_var = base.clone();
        unknown_var.rules[0].when = BTreeMap::from([("mood".to_string(), "bad".to_string())]);
        let err = FuzzySystem::compile(&unknown_var).unwrap_err().to_string();
        assert!(err.contains("unknown input `mood`"), "{err}");

        let mut unknown_term = base.clone();
        unknown_term.rules[1].then = "huge".into();
        assert!(FuzzySystem::compile(&unknown_term).is_err());

        let mut bad_triangle = base.clone();
        bad_triangle.inputs[0]
            .terms
            .insert("odd".into(), Triangle::new(3.0, 2.0, 1.0));
        let err = format!("{:#}", FuzzySystem::compile(&bad_triangle).unwrap_err());
        assert!(err.contains("variable `service` term `odd`"), "{err}");
        assert!(err.contains("a <= b <= c"), "{err}");

        let mut no_signal = base.clone();
        no_signal.inputs[0].signal = None;
        assert!(FuzzySystem::compile(&no_signal).is_err());

        let mut inverted = base.clone();
        inverted.output.universe = [1.0, 0.0];
        assert!(FuzzySystem::compile(&inverted).is_err());

        let mut no_rules = base;
        no_rules.rules.clear();
        assert!(FuzzySystem::compile(&no_rules).is_err());
    }

    #[test]
    fn only_the_output_step_drives_sampling() {
        let base: FuzzySystemConfig = toml::from_str(TIP_TOML).unwrap();
        let with_step = FuzzySystem::compile(&base).unwrap();

        let mut coarse_input = base.clone();
        coarse_input.inputs[0].step = Some(5.0);
        let mut no_input_step = base.clone();
        no_input_step.inputs[0].step = None;
        for cfg in [coarse_input, no_input_step] {
            let sys = FuzzySystem::compile(&cfg).unwrap();
            for x in [0.0, 2.5, 7.3, 10.0] {
                assert_eq!(sys.evaluate(&[x]), with_step.evaluate(&[x]));
            }
        }

        let mut zero_input_step = base.clone();
        zero_input_step.inputs[0].step = Some(0.0);
        let err = FuzzySystem::compile(&zero_input_step).unwrap_err().to_string();
        assert!(err.contains("step must be > 0"), "{err}");

        let mut no_output_step = base.clone();
        no_output_step.output.step = None;
        let err = FuzzySystem::compile(&no_output_step).unwrap_err().to_string();
        assert!(err.contains("has no `step`"), "{err}");

        let mut too_fine = base;
        too_fine.output.step = Some(1e-9);
        let err = FuzzySystem::compile(&too_fine).unwrap_err().to_string();
        assert!(err.contains("too fine"), "{err}");
    }
}
