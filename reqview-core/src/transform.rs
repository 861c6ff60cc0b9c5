//! Response transform engine.
//!
//! Compiles the user's expression once per change of its source text and
//! runs it against each response. Failures never escape as panics: they are
//! reported as a message and the untransformed response is used instead.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::ast::Expr;
use crate::interpreter::{evaluate, EvalError};
use crate::parser::{parse_expression, ParseError};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransformError {
    #[error(transparent)]
    Syntax(#[from] ParseError),
    #[error(transparent)]
    Runtime(#[from] EvalError),
}

/// A compiled transform expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    source: String,
    expr: Expr,
}

impl Program {
    pub fn compile(source: &str) -> Result<Self, TransformError> {
        let expr = parse_expression(source)?;
        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn run(&self, response: &Value) -> Result<Value, TransformError> {
        Ok(evaluate(&self.expr, response)?)
    }
}

/// Result of applying the current transform to a response.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformOutcome {
    /// The transformed value, or the response itself on failure.
    pub view: Value,
    pub error: Option<String>,
}

type Compiled = Result<Option<Arc<Program>>, TransformError>;

/// Caches the compiled form of the most recent expression source.
#[derive(Debug, Default)]
pub struct TransformEngine {
    cached: Option<(String, Compiled)>,
    compilations: usize,
}

impl TransformEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile `source`, reusing the cached program when the text is
    /// unchanged. A blank source is the identity transform (`Ok(None)`).
    pub fn compile(&mut self, source: &str) -> Compiled {
        if let Some((cached_source, compiled)) = &self.cached {
            if cached_source == source {
                return compiled.clone();
            }
        }
        let compiled = if source.trim().is_empty() {
            Ok(None)
        } else {
            self.compilations += 1;
            Program::compile(source).map(|p| Some(Arc::new(p)))
        };
        if let Err(e) = &compiled {
            tracing::debug!(error = %e, "transform failed to compile");
        }
        self.cached = Some((source.to_string(), compiled.clone()));
        compiled
    }

    /// Transform `response` with `source`.
    pub fn apply(&mut self, source: &str, response: &Value) -> TransformOutcome {
        let result = self
            .compile(source)
            .and_then(|program| match program {
                Some(program) => program.run(response),
                None => Ok(response.clone()),
            });
        match result {
            Ok(view) => TransformOutcome { view, error: None },
            Err(e) => {
                tracing::debug!(error = %e, "transform failed");
                TransformOutcome {
                    view: response.clone(),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// How many times a non-blank source has actually been parsed.
    pub fn compilations(&self) -> usize {
        self.compilations
    }
}
