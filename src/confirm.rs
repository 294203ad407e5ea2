//! Operator confirmation.

use std::io::{self, BufRead, Write};

use crate::error::{MigrantError, Result};

/// Asks the operator whether to go ahead with a step.
pub trait Confirm: Send + Sync {
    fn confirm(&self, prompt: &str) -> Result<bool>;
}

/// Interactive `[y/N]` prompt on stdin/stdout. Only `y` or `Y` approve.
pub struct TerminalPrompt;

impl Confirm for TerminalPrompt {
    fn confirm(&self, prompt: &str) -> Result<bool> {
        print!("{} [y/N]: ", prompt);
        io::stdout()
            .flush()
            .map_err(|e| MigrantError::io("<stdout>", e))?;

        let mut input = String::new();
        io::stdin()
            .lock()
            .read_line(&mut input)
            .map_err(|e| MigrantError::io("<stdin>", e))?;
        Ok(is_approval(&input))
    }
}

/// Approves everything (`--auto-approve`).
pub struct AutoApprove;

impl Confirm for AutoApprove {
    fn confirm(&self, _prompt: &str) -> Result<bool> {
        Ok(true)
    }
}

fn is_approval(input: &str) -> bool {
    matches!(input.trim(), "y" | "Y")
}

/// Ask and turn a decline into [`MigrantError::AbortedByOperator`].
pub fn require(confirm: &dyn Confirm, prompt: &str) -> Result<()> {
    if confirm.confirm(prompt)? {
        Ok(())
    } else {
        Err(MigrantError::AbortedByOperator(prompt.trim_end_matches('?').to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Decline;

    impl Confirm for Decline {
        fn confirm(&self, _prompt: &str) -> Result<bool> {
            Ok(false)
        }
    }

    #[test]
    fn test_approval_answers() {
        assert!(is_approval("y\n"));
        assert!(is_approval("Y"));
        assert!(!is_approval("yes"));
        assert!(!is_approval(""));
        assert!(!is_approval("n\n"));
    }

    #[test]
    fn test_require() {
        require(&AutoApprove, "Apply this migration?").unwrap();
        match require(&Decline, "Apply this migration?") {
            Err(MigrantError::AbortedByOperator(what)) => assert_eq!(what, "Apply this migration"),
            other => panic!("expected AbortedByOperator, got {other:?}"),
        }
    }
}
