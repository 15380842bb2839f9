//! # Build-Trace Advisory Engine
//!
//! A rule-driven analysis engine that turns build-profile traces (Chrome
//! Trace Event format) into targeted optimisation advice. This crate is the
//! analysis core: a small Datalog-like language (lexer, parser, AST), a
//! bottom-up fixpoint evaluator with comparisons, arithmetic, aggregation
//! and stratified negation, a fact-extraction layer that lifts trace events
//! into relational facts, and a suggestion-rule evaluator that binds rule
//! outputs to a template renderer.
//!
//! Trace decoding, HTTP serving, CLI handling, browser launch and
//! cross-format profile parsing are collaborators outside this crate's
//! scope — it consumes a sequence of [`fact_builder::TraceEvent`] records
//! and a set of rule-file texts, and emits a set of
//! [`suggestion::Suggestion`]s plus evaluation diagnostics.
//!
//! ## Pipeline
//!
//! ```text
//! rule source text
//!     │  lexer::tokenize
//!     ▼
//! token stream
//!     │  parser::parse_program
//!     ▼
//! ast::Program ───────────────┐
//!                              │ engine::Engine::load_rules
//! trace events                 ▼
//!     │  fact_builder::build_facts
//!     ▼                  engine::Engine::evaluate (fixpoint)
//! ground facts ──────────────► │
//!                               ▼
//!                   suggestion::SuggestionEvaluator
//!                               │
//!                               ▼
//!                     ordered, deduplicated suggestions
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use buildtrace_advisor::fact_builder::TraceEvent;
//! use buildtrace_advisor::suggestion::SuggestionEvaluator;
//!
//! let events: Vec<TraceEvent> = load_events_from_somewhere();
//! let evaluator = SuggestionEvaluator::load(None)?;
//! let report = evaluator.evaluate(&events)?;
//! for suggestion in &report.suggestions {
//!     println!("[{}] {}", suggestion.impact, suggestion.title);
//! }
//! ```

pub mod ast;
pub mod config;
pub mod engine;
pub mod error;
pub mod fact_builder;
pub mod lexer;
pub mod parser;
pub mod suggestion;
pub mod value;

pub use ast::{
    AggregateOp, Atom, Clause, CompareOp, Expression, MetricTemplate, Program, Rule,
    SuggestionRule, SuggestionTemplate, Term,
};
pub use config::EngineConfig;
pub use engine::{Bindings, Engine, EvaluationDiagnostics, Fact};
pub use error::{Error, EvaluationError, LexError, ParseError, Result, RuleLoadError};
pub use fact_builder::TraceEvent;
pub use lexer::{tokenize, Token, TokenKind};
pub use parser::parse_program;
pub use suggestion::{Metric, Suggestion, SuggestionEvaluator, SuggestionReport};
pub use value::Value;
