//! Boolean combinators over termination conditions.
//!
//! Named constructors instead of operator overloading; children are kept as
//! an ordered list and every child is evaluated on every call so that
//! cumulative counters keep advancing.

use async_trait::async_trait;

use crate::error::{EnsembleError, Result};
use crate::types::{StopMessage, TeamItem};

use super::TerminationCondition;

/// Fires the first time any child fires.
pub fn any_of(conditions: Vec<Box<dyn TerminationCondition>>) -> Box<dyn TerminationCondition> {
    Box::new(OrTermination { conditions })
}

/// Fires only once every child has fired at least once.
pub fn all_of(conditions: Vec<Box<dyn TerminationCondition>>) -> Box<dyn TerminationCondition> {
    Box::new(AndTermination {
        conditions,
        fired: Vec::new(),
    })
}

/// OR combination: terminated when any child is terminated.
pub struct OrTermination {
    conditions: Vec<Box<dyn TerminationCondition>>,
}

#[async_trait]
impl TerminationCondition for OrTermination {
    fn terminated(&self) -> bool {
        self.conditions.iter().any(|c| c.terminated())
    }

    async fn evaluate(&mut self, new_items: &[TeamItem]) -> Result<Option<StopMessage>> {
        if self.terminated() {
            return Err(EnsembleError::AlreadyTerminated);
        }
        // Every child sees the delta, so all counters advance even when an
        // earlier child already produced the stop message for this call.
        let mut fired = None;
        for condition in &mut self.conditions {
            if let Some(stop) = condition.evaluate(new_items).await? {
                fired.get_or_insert(stop);
            }
        }
        Ok(fired)
    }

    async fn reset(&mut self) -> Result<()> {
        for condition in &mut self.conditions {
            condition.reset().await?;
        }
        Ok(())
    }

    fn save_state(&self) -> serde_json::Value {
        serde_json::Value::Array(self.conditions.iter().map(|c| c.save_state()).collect())
    }

    fn load_state(&mut self, state: &serde_json::Value) -> Result<()> {
        let children = state
            .as_array()
            .ok_or_else(|| EnsembleError::InvalidSnapshot("expected child state array".into()))?;
        if children.len() != self.conditions.len() {
            return Err(EnsembleError::InvalidSnapshot(format!(
                "expected {} child states, found {}",
                self.conditions.len(),
                children.len()
            )));
        }
        for (condition, child) in self.conditions.iter_mut().zip(children) {
            condition.load_state(child)?;
        }
        Ok(())
    }
}

/// AND combination: each child's firing is sticky; the combined condition
/// stops the run only once every child has fired.
pub struct AndTermination {
    conditions: Vec<Box<dyn TerminationCondition>>,
    fired: Vec<StopMessage>,
}

#[async_trait]
impl TerminationCondition for AndTermination {
    fn terminated(&self) -> bool {
        self.conditions.iter().all(|c| c.terminated())
    }

    async fn evaluate(&mut self, new_items: &[TeamItem]) -> Result<Option<StopMessage>> {
        if self.terminated() {
            return Err(EnsembleError::AlreadyTerminated);
        }
        for condition in &mut self.conditions {
            if condition.terminated() {
                continue;
            }
            if let Some(stop) = condition.evaluate(new_items).await? {
                self.fired.push(stop);
            }
        }
        if self.terminated() {
            let content = self
                .fired
                .iter()
                .map(|s| s.content.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            return Ok(Some(StopMessage::new(content, "AndTermination")));
        }
        Ok(None)
    }

    async fn reset(&mut self) -> Result<()> {
        for condition in &mut self.conditions {
            condition.reset().await?;
        }
        self.fired.clear();
        Ok(())
    }

    fn save_state(&self) -> serde_json::Value {
        serde_json::json!({
            "children": self.conditions.iter().map(|c| c.save_state()).collect::<Vec<_>>(),
            "fired": self.fired,
        })
    }

    fn load_state(&mut self, state: &serde_json::Value) -> Result<()> {
        let children = state
            .get("children")
            .and_then(serde_json::Value::as_array)
            .ok_or_else(|| EnsembleError::InvalidSnapshot("expected 'children' array".into()))?;
        if children.len() != self.conditions.len() {
            return Err(EnsembleError::InvalidSnapshot(format!(
                "expected {} child states, found {}",
                self.conditions.len(),
                children.len()
            )));
        }
        for (condition, child) in self.conditions.iter_mut().zip(children) {
            condition.load_state(child)?;
        }
        self.fired = state
            .get("fired")
            .map(|v| serde_json::from_value(v.clone()))
            .transpose()?
            .unwrap_or_default();
        Ok(())
    }
}
