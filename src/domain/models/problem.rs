use serde::{Deserialize, Serialize};

use crate::domain::errors::ValidationError;

/// An algorithmic problem plus the single test case that drives convergence.
///
/// The secondary test case is collected and carried along but never gates
/// convergence; only the primary test case and its expected output are used
/// by the synthesis loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemSpec {
    /// Natural-language problem statement
    pub statement: String,

    /// Required function signature, e.g. `def reverse(s):`
    pub function_signature: String,

    /// Input the driver code must hardcode
    pub primary_test_case: String,

    /// Exact output the driver code must print
    pub expected_output: String,

    /// Reserved second test case (unused by convergence)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_test_case: Option<String>,

    /// Reserved second expected output (unused by convergence)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_expected_output: Option<String>,

    /// Set once the statement has been replaced by a model refinement
    #[serde(default)]
    refined: bool,
}

impl ProblemSpec {
    pub fn new(
        statement: impl Into<String>,
        function_signature: impl Into<String>,
        primary_test_case: impl Into<String>,
        expected_output: impl Into<String>,
    ) -> Self {
        Self {
            statement: statement.into(),
            function_signature: function_signature.into(),
            primary_test_case: primary_test_case.into(),
            expected_output: expected_output.into(),
            secondary_test_case: None,
            secondary_expected_output: None,
            refined: false,
        }
    }

    /// Attach the reserved secondary test case.
    #[must_use]
    pub fn with_secondary(
        mut self,
        test_case: impl Into<String>,
        expected_output: impl Into<String>,
    ) -> Self {
        self.secondary_test_case = Some(test_case.into());
        self.secondary_expected_output = Some(expected_output.into());
        self
    }

    /// Check that every field the loop depends on is present.
    ///
    /// Whitespace-only values count as missing.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let required = [
            ("statement", &self.statement),
            ("function_signature", &self.function_signature),
            ("primary_test_case", &self.primary_test_case),
            ("expected_output", &self.expected_output),
        ];

        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(ValidationError::MissingField(name));
            }
        }

        Ok(())
    }

    /// Replace the statement with a model-produced refinement.
    ///
    /// Allowed at most once per problem, and only before a run starts (the
    /// controller takes the problem by shared reference for the whole run).
    pub fn apply_refinement(&mut self, refined: impl Into<String>) -> Result<(), ValidationError> {
        if self.refined {
            return Err(ValidationError::AlreadyRefined);
        }

        let refined = refined.into();
        if refined.trim().is_empty() {
            return Err(ValidationError::EmptyRefinement);
        }

        self.statement = refined;
        self.refined = true;
        Ok(())
    }

    pub const fn is_refined(&self) -> bool {
        self.refined
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reverse_problem() -> ProblemSpec {
        ProblemSpec::new("reverse a string", "def reverse(s):", "hello", "olleh")
    }

    #[test]
    fn test_validate_complete_problem() {
        assert!(reverse_problem().validate().is_ok());
    }

    #[test]
    fn test_validate_reports_first_missing_field() {
        let mut problem = reverse_problem();
        problem.function_signature = "   ".to_string();
        assert_eq!(
            problem.validate(),
            Err(ValidationError::MissingField("function_signature"))
        );

        let problem = ProblemSpec::new("", "", "", "");
        assert_eq!(
            problem.validate(),
            Err(ValidationError::MissingField("statement"))
        );
    }

    #[test]
    fn test_secondary_case_does_not_affect_validation() {
        let problem = reverse_problem().with_secondary("", "");
        assert!(problem.validate().is_ok());
    }

    #[test]
    fn test_refinement_applies_once() {
        let mut problem = reverse_problem();
        problem
            .apply_refinement("Return the input string reversed.")
            .unwrap();
        assert_eq!(problem.statement, "Return the input string reversed.");
        assert!(problem.is_refined());

        assert_eq!(
            problem.apply_refinement("again"),
            Err(ValidationError::AlreadyRefined)
        );
        assert_eq!(problem.statement, "Return the input string reversed.");
    }

    #[test]
    fn test_empty_refinement_rejected() {
        let mut problem = reverse_problem();
        assert_eq!(
            problem.apply_refinement("  \n"),
            Err(ValidationError::EmptyRefinement)
        );
        assert!(!problem.is_refined());
    }

    #[test]
    fn test_yaml_problem_file() {
        let yaml = r"
statement: reverse a string
function_signature: 'def reverse(s):'
primary_test_case: hello
expected_output: olleh
secondary_test_case: abc
secondary_expected_output: cba
";
        let problem: ProblemSpec = serde_yaml::from_str(yaml).expect("YAML should parse");
        assert_eq!(problem.function_signature, "def reverse(s):");
        assert_eq!(problem.secondary_expected_output.as_deref(), Some("cba"));
        assert!(!problem.is_refined());
    }
}
