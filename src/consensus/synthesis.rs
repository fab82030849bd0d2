//! Compromise synthesis for conflicted rounds.
//!
//! A template library keyed by (opposed, favoured) axiom pairs. The chosen
//! template derives a new proposal from the conflicted one and tags it with
//! what it preserves and what it sacrifices.

use crate::consensus::conflict::{AxisPair, ConflictReport};
use crate::core::Axiom;
use crate::proposal::{Proposal, Reversibility, SynthesisOrigin, VerbClass};
use serde::{Deserialize, Serialize};

/// How a template rewrites the action text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rewrite {
    /// Replace the first verb of `class` with `with`
    ReplaceVerb { class: VerbClass, with: String },
    /// Put `text` in front of the action
    Prefix { text: String },
    /// Append `text` to the action
    Suffix { text: String },
    /// Leave the text; only declared properties change
    Keep,
}

impl Rewrite {
    /// Apply to an action. `None` when the rewrite does not fit.
    pub fn apply(&self, action: &str) -> Option<String> {
        match self {
            Rewrite::ReplaceVerb { class, with } => {
                let (start, end) = class.find(action)?;
                let replacement = if start == 0 {
                    with.clone()
                } else {
                    lowercase_first(with)
                };
                Some(format!("{}{}{}", &action[..start], replacement, &action[end..]))
            }
            Rewrite::Prefix { text } => {
                if action.starts_with(text.as_str()) {
                    None
                } else {
                    Some(format!("{}{}", text, lowercase_first(action)))
                }
            }
            Rewrite::Suffix { text } => {
                if action.ends_with(text.as_str()) {
                    None
                } else {
                    Some(format!("{}{}", action, text))
                }
            }
            Rewrite::Keep => Some(action.to_string()),
        }
    }
}

fn lowercase_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// A compromise template for one axis pair.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SynthesisTemplate {
    pub id: String,
    pub opposed: Axiom,
    pub favoured: Axiom,
    pub rewrite: Rewrite,
    /// Reversibility the compromise declares
    pub reversibility: Option<Reversibility>,
    /// Whether the compromise commits to logging its process
    pub logs_process: Option<bool>,
    pub preserves: Vec<Axiom>,
    pub sacrifices: Vec<String>,
}

impl SynthesisTemplate {
    /// Create a template.
    pub fn new(id: &str, opposed: Axiom, favoured: Axiom, rewrite: Rewrite) -> Self {
        Self {
            id: id.to_string(),
            preserves: vec![opposed.clone(), favoured.clone()],
            opposed,
            favoured,
            rewrite,
            reversibility: None,
            logs_process: None,
            sacrifices: Vec::new(),
        }
    }

    pub fn with_reversibility(mut self, reversibility: Reversibility) -> Self {
        self.reversibility = Some(reversibility);
        self
    }

    pub fn with_process_logging(mut self) -> Self {
        self.logs_process = Some(true);
        self
    }

    pub fn sacrificing(mut self, sacrifices: &[&str]) -> Self {
        self.sacrifices = sacrifices.iter().map(|s| s.to_string()).collect();
        self
    }

    fn matches(&self, pair: &AxisPair) -> bool {
        self.opposed == pair.opposed && self.favoured == pair.favoured
    }

    /// Derive the compromise proposal.
    fn instantiate(&self, proposal: &Proposal, derived_from_round: u32) -> Option<Proposal> {
        let action = self.rewrite.apply(proposal.action())?;

        let mut context = proposal.context().clone();
        if let Some(logs_process) = self.logs_process {
            context.logs_process = logs_process;
        }

        let origin = SynthesisOrigin {
            parent_id: proposal.id().clone(),
            derived_from_round,
            template: self.id.clone(),
            preserves: self.preserves.clone(),
            sacrifices: self.sacrifices.clone(),
        };

        Some(Proposal::synthesized(
            proposal,
            action,
            self.reversibility.unwrap_or(proposal.reversibility()),
            context,
            origin,
        ))
    }
}

/// Template library.
#[derive(Clone, Debug, Default)]
pub struct SynthesisGenerator {
    templates: Vec<SynthesisTemplate>,
}

impl SynthesisGenerator {
    /// Create an empty generator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with the standard template library.
    pub fn with_defaults() -> Self {
        let mut generator = Self::new();

        generator.add_template(
            SynthesisTemplate::new(
                "archive-instead-of-delete",
                Axiom::Preservation,
                Axiom::Efficiency,
                Rewrite::ReplaceVerb {
                    class: VerbClass::Destructive,
                    with: "Compress and archive".to_string(),
                },
            )
            .with_reversibility(Reversibility::Reversible)
            .sacrificing(&["immediate storage reclamation"]),
        );

        generator.add_template(
            SynthesisTemplate::new(
                "staged-rollout",
                Axiom::Safety,
                Axiom::Efficiency,
                Rewrite::Prefix {
                    text: "Stage with a rollback plan: ".to_string(),
                },
            )
            .with_reversibility(Reversibility::Reversible)
            .sacrificing(&["rollout speed"]),
        );

        for favoured in [Axiom::Efficiency, Axiom::Safety] {
            generator.add_template(
                SynthesisTemplate::new(
                    "opt-in-instead-of-force",
                    Axiom::Autonomy,
                    favoured,
                    Rewrite::ReplaceVerb {
                        class: VerbClass::Coercive,
                        with: "Offer opt-in to".to_string(),
                    },
                )
                .sacrificing(&["universal coverage"]),
            );
        }

        generator.add_template(
            SynthesisTemplate::new(
                "log-while-optimizing",
                Axiom::Transparency,
                Axiom::Efficiency,
                Rewrite::Suffix {
                    text: " with a process summary log".to_string(),
                },
            )
            .with_process_logging()
            .sacrificing(&["some logging overhead"]),
        );

        generator
    }

    /// Add a template. Earlier templates win for the same pair.
    pub fn add_template(&mut self, template: SynthesisTemplate) {
        self.templates.push(template);
    }

    pub fn templates(&self) -> &[SynthesisTemplate] {
        &self.templates
    }

    /// Produce a compromise for the first axis pair that has a fitting
    /// template, or `None` when nothing fits.
    pub fn synthesize(
        &self,
        proposal: &Proposal,
        conflict: &ConflictReport,
        derived_from_round: u32,
    ) -> Option<Proposal> {
        if !conflict.detected {
            return None;
        }

        conflict.axis_pairs.iter().find_map(|pair| {
            self.templates
                .iter()
                .filter(|t| t.matches(pair))
                .find_map(|t| t.instantiate(proposal, derived_from_round))
        })
    }
}
