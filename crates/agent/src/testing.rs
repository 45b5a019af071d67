//! Scripted collaborator doubles for workflow and pipeline tests.
//!
//! Both doubles count invocations so tests can assert contracts like "the
//! generator is never called on the escalated path".

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use deskline_core::domain::PolicyVariant;
use deskline_core::errors::PipelineError;
use deskline_core::routing::{Category, Classification, ResponseKind, Sentiment};

use crate::llm::{Classifier, Generator};

pub struct ScriptedClassifier {
    outcome: Result<Classification, PipelineError>,
    delay: Duration,
    calls: AtomicUsize,
}

impl ScriptedClassifier {
    pub fn fixed(category: Category, sentiment: Sentiment) -> Self {
        Self {
            outcome: Ok(Classification { category, sentiment }),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            outcome: Err(PipelineError::Classification(message.to_owned())),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Classifier for ScriptedClassifier {
    async fn classify(&self, _query: &str) -> Result<Classification, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.delay > Duration::ZERO {
            tokio::time::sleep(self.delay).await;
        }
        self.outcome.clone()
    }
}

pub struct ScriptedGenerator {
    failure: Option<PipelineError>,
    delay: Duration,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    /// Echoes the routing decision back in the reply so tests can assert
    /// which handler and variant were used.
    pub fn echoing() -> Self {
        Self { failure: None, delay: Duration::ZERO, calls: AtomicUsize::new(0) }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(PipelineError::Generation(message.to_owned())),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(
        &self,
        query: &str,
        variant: PolicyVariant,
        kind: ResponseKind,
    ) -> Result<String, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.delay > Duration::ZERO {
            tokio::time::sleep(self.delay).await;
        }
        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(format!("[{}/{}] {query}", variant.as_str(), kind.as_str())),
        }
    }
}
