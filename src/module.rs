//! The host contract: options in, one JSON object out.

use serde::Serialize;
use serde_json::Value;

use crate::crypto;
use crate::error::{GroupError, Result};
use crate::params::ModuleArgs;
use crate::reconciler::{Outcome, Reconciler};
use crate::store::Database;

/// Failure payload for the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub failed: bool,
    pub changed: bool,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,
}

impl Failure {
    pub fn new(msg: impl Into<String>, exception: Option<String>) -> Self {
        Self {
            failed: true,
            changed: false,
            msg: msg.into(),
            exception,
        }
    }
}

impl From<&GroupError> for Failure {
    fn from(err: &GroupError) -> Self {
        Failure::new(err.to_string(), err.cause_chain())
    }
}

/// One invocation's result, ready to print.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleResult {
    Exit(Outcome),
    Fail(Failure),
}

impl ModuleResult {
    pub fn is_failure(&self) -> bool {
        matches!(self, ModuleResult::Fail(_))
    }

    pub fn to_json(&self) -> Value {
        let value = match self {
            ModuleResult::Exit(outcome) => serde_json::to_value(outcome),
            ModuleResult::Fail(failure) => serde_json::to_value(failure),
        };
        value.unwrap_or_else(|e| {
            serde_json::json!({"failed": true, "changed": false, "msg": e.to_string()})
        })
    }
}

/// Validates, opens the store, reconciles.
pub fn execute(args: &ModuleArgs) -> Result<Outcome> {
    args.validate()?;

    log::info!(
        "Running action '{}' for group '{}' on {}",
        args.action,
        args.name,
        args.database.display()
    );
    let credentials = args.credentials();
    let mut db = crate::log_timed!(
        "database open",
        Database::open(&args.database, &credentials)
    )?;
    Reconciler::new(&mut db)
        .with_check_mode(args.check_mode)
        .apply(&args.action, &args.request())
}

/// Runs the module on the raw JSON arguments text.
pub fn run(json: &str) -> ModuleResult {
    if let Err(e) = crypto::probe() {
        log::error!("Cryptographic backend unavailable: {}", e);
        return ModuleResult::Fail(Failure::new(
            "Missing required cryptographic backend.",
            Some(e.to_string()),
        ));
    }

    let outcome = ModuleArgs::from_json(json).and_then(|args| execute(&args));
    match outcome {
        Ok(outcome) => {
            log::info!("Finished, changed={}", outcome.changed);
            ModuleResult::Exit(outcome)
        }
        Err(e) => {
            log::error!("Failed ({}): {}", e.kind(), e);
            ModuleResult::Fail(Failure::from(&e))
        }
    }
}
