//! Utility Passes
//!
//! Passes that inspect an instance without rewriting it. They slot into a
//! recipe between transformation passes, typically to pin down which pass
//! broke an invariant or to capture the SSA at a known point.

use super::{Pass, PassResult};
use crate::ir::{dump_instance, validate_instance, DerivedDataKind, DumpFormat, TypedInstance};
use crate::session::{CompilationSession, CompileError};
use diagnostics::Diagnostic;

/// Checks SSA well-formedness and reports every violation found
pub struct ValidateSsaPass {
    strict: bool,
    max_reported: usize,
}

impl ValidateSsaPass {
    pub const NAME: &'static str = "ValidateSsaPass";

    pub fn new(strict: bool, max_reported: usize) -> Self {
        Self {
            strict,
            max_reported,
        }
    }
}

impl Default for ValidateSsaPass {
    fn default() -> Self {
        Self::new(true, 16)
    }
}

impl Pass for ValidateSsaPass {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn preserved_data(&self) -> &[DerivedDataKind] {
        &DerivedDataKind::ALL
    }

    fn run(&self, session: &CompilationSession, instance: &mut TypedInstance) -> PassResult {
        if instance.body().skips_pass(Self::NAME) {
            log::debug!("{} skipped by directive in {}", Self::NAME, instance.identity());
            return Ok(());
        }
        let violations = match validate_instance(instance) {
            Ok(()) => return Ok(()),
            Err(violations) => violations,
        };

        let function = instance.identity().to_string();
        for violation in violations.iter().take(self.max_reported) {
            let diagnostic = if self.strict {
                Diagnostic::error(violation.to_string())
            } else {
                Diagnostic::warning(violation.to_string())
            };
            session.report(diagnostic.with_pass(Self::NAME).with_function(&function));
        }
        if violations.len() > self.max_reported {
            session.report(
                Diagnostic::warning(format!(
                    "{} further violations not shown",
                    violations.len() - self.max_reported
                ))
                .with_pass(Self::NAME)
                .with_function(&function),
            );
        }

        if self.strict {
            Err(CompileError::Validation {
                function: instance.identity().clone(),
                violations,
            })
        } else {
            Ok(())
        }
    }
}

/// Writes the SSA of the instance to the report stream
pub struct DumpSsaPass {
    label: String,
    format: DumpFormat,
}

impl DumpSsaPass {
    pub const NAME: &'static str = "DumpSsaPass";

    pub fn new(label: impl Into<String>, format: DumpFormat) -> Self {
        Self {
            label: label.into(),
            format,
        }
    }
}

impl Default for DumpSsaPass {
    fn default() -> Self {
        Self::new("ssa", DumpFormat::Compact)
    }
}

impl Pass for DumpSsaPass {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn preserved_data(&self) -> &[DerivedDataKind] {
        &DerivedDataKind::ALL
    }

    fn run(&self, session: &CompilationSession, instance: &mut TypedInstance) -> PassResult {
        if instance.body().skips_pass(Self::NAME) {
            return Ok(());
        }
        session.report(
            Diagnostic::info(format!(
                "[{}]\n{}",
                self.label,
                dump_instance(instance, self.format)
            ))
            .with_pass(Self::NAME)
            .with_function(instance.identity().to_string()),
        );
        Ok(())
    }
}
