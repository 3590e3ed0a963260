//! Matches a command vector against an ordered list of wildcarded
//! authorisation rules. See `spec.md` §4.3. Deliberately has no
//! dependency on `kube`: it is a pure function over plain data, tested
//! without a cluster, the same way `planner.rs`-style decision code is
//! tested in the reconciler crate.

/// A single authorisation rule, decoupled from the CRD wire type so this
/// crate stays dependency-free.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub name: String,
    pub match_command_elements: Vec<String>,
    pub authorisations_required: u32,
    /// Names of subjects permitted to approve.
    pub subjects: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchedRule<'a> {
    pub name: &'a str,
    pub rule: &'a Rule,
}

pub const DEFAULT_RULE_NAME: &str = "default";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MatchError {
    #[error("no rule matches and no default authorisation rule is defined")]
    NoRule,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("rules are defined but no default authorisation rule is set")]
    MissingDefault,
    #[error("rule '{rule}': {issues}")]
    InvalidElements { rule: String, issues: String },
}

/// Matches `command` against `rules` in order, falling back to `default`.
pub fn match_command<'a>(
    rules: &'a [Rule],
    default: Option<&'a Rule>,
    command: &[String],
) -> Result<MatchedRule<'a>, MatchError> {
    for rule in rules {
        if command_matches(&rule.match_command_elements, command) {
            return Ok(MatchedRule {
                name: &rule.name,
                rule,
            });
        }
    }
    default
        .map(|rule| MatchedRule {
            name: DEFAULT_RULE_NAME,
            rule,
        })
        .ok_or(MatchError::NoRule)
}

fn command_matches(pattern: &[String], command: &[String]) -> bool {
    for (i, element) in pattern.iter().enumerate() {
        if element == "**" {
            // Matches zero or more trailing elements; validated to only
            // ever appear as the final pattern element.
            return true;
        }
        let Some(actual) = command.get(i) else {
            return false;
        };
        if element == "*" {
            continue;
        }
        if element != actual {
            return false;
        }
    }
    pattern.len() == command.len()
}

/// Validates one rule's `match_command_elements`: every element
/// non-empty, `**` only at the final position.
fn rule_element_issues(rule: &Rule) -> Vec<String> {
    let mut issues = Vec::new();
    if rule.match_command_elements.is_empty() {
        issues.push("matchCommandElements must not be empty".to_string());
        return issues;
    }
    let last = rule.match_command_elements.len() - 1;
    for (i, element) in rule.match_command_elements.iter().enumerate() {
        if element.is_empty() {
            issues.push(format!("element {i} must not be empty"));
        }
        if element == "**" && i != last {
            issues.push(format!(
                "element {i}: '**' is only legal as the final element"
            ));
        }
    }
    issues
}

/// Validates the full rule set and default, run on template admission and
/// before every match invocation (`spec.md` §4.3).
pub fn validate(rules: &[Rule], default: Option<&Rule>) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if !rules.is_empty() && default.is_none() {
        errors.push(ValidationError::MissingDefault);
    }

    for rule in rules.iter().chain(default) {
        let issues = rule_element_issues(rule);
        if !issues.is_empty() {
            errors.push(ValidationError::InvalidElements {
                rule: rule.name.clone(),
                issues: issues.join("; "),
            });
        }
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

/// The PendingAuthorisation -> Pending transition predicate (`spec.md` §4.2):
/// enough approvers, none of whom is the console owner, and all of whom are
/// in the rule's subject list.
pub fn authorisation_satisfied(rule: &Rule, owner: &str, approvers: &[String]) -> bool {
    if approvers.len() < rule.authorisations_required as usize {
        return false;
    }
    if approvers.iter().any(|a| a == owner) {
        return false;
    }
    approvers.iter().all(|a| rule.subjects.iter().any(|s| s == a))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(name: &str, pattern: &[&str]) -> Rule {
        Rule {
            name: name.to_string(),
            match_command_elements: pattern.iter().map(|s| s.to_string()).collect(),
            authorisations_required: 0,
            subjects: Vec::new(),
        }
    }

    fn cmd(elems: &[&str]) -> Vec<String> {
        elems.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn rails_runner_matches_suffix_wildcard() {
        let rules = vec![rule("ruby", &["ruby"]), rule("rails", &["rails", "runner", "**"])];
        let default = rule("default", &["**"]);
        let matched = match_command(&rules, Some(&default), &cmd(&["rails", "runner", "Migrate.new.run"])).unwrap();
        assert_eq!(matched.name, "rails");
    }

    #[test]
    fn unmatched_command_falls_back_to_default() {
        let rules = vec![rule("ruby", &["ruby"]), rule("rails", &["rails", "runner", "**"])];
        let default = rule("default", &["**"]);
        let matched = match_command(&rules, Some(&default), &cmd(&["python"])).unwrap();
        assert_eq!(matched.name, DEFAULT_RULE_NAME);
    }

    #[test]
    fn no_default_and_no_match_is_an_error() {
        let rules = vec![rule("ruby", &["ruby"])];
        let err = match_command(&rules, None, &cmd(&["python"])).unwrap_err();
        assert_eq!(err, MatchError::NoRule);
    }

    #[test]
    fn exact_length_required_without_suffix_wildcard() {
        let rules = vec![rule("bash", &["bash"])];
        assert!(match_command(&rules, None, &cmd(&["bash"])).is_ok());
        assert!(match_command(&rules, None, &cmd(&["bash", "-c"])).is_err());
    }

    #[test]
    fn single_wildcard_requires_an_element_to_exist() {
        let rules = vec![rule("one-arg", &["exec", "*"])];
        assert!(match_command(&rules, None, &cmd(&["exec", "ls"])).is_ok());
        assert!(match_command(&rules, None, &cmd(&["exec"])).is_err());
    }

    #[test]
    fn validation_rejects_double_wildcard_before_end() {
        let rules = vec![rule("bad", &["**", "bash"])];
        let err = validate(&rules, Some(&rule("default", &["**"]))).unwrap_err();
        assert!(matches!(err[0], ValidationError::InvalidElements { .. }));
    }

    #[test]
    fn validation_rejects_empty_element() {
        let rules = vec![rule("bad", &["", "bash"])];
        let err = validate(&rules, Some(&rule("default", &["**"]))).unwrap_err();
        assert!(matches!(err[0], ValidationError::InvalidElements { .. }));
    }

    #[test]
    fn validation_requires_default_when_rules_present() {
        let rules = vec![rule("bash", &["bash"])];
        let err = validate(&rules, None).unwrap_err();
        assert_eq!(err, vec![ValidationError::MissingDefault]);
    }

    #[test]
    fn determinism() {
        let rules = vec![rule("bash", &["bash"])];
        let default = rule("default", &["**"]);
        let command = cmd(&["bash"]);
        let a = match_command(&rules, Some(&default), &command).unwrap();
        let b = match_command(&rules, Some(&default), &command).unwrap();
        assert_eq!(a.name, b.name);
    }

    #[test]
    fn double_approval_predicate() {
        let rule = Rule {
            name: "bash".to_string(),
            match_command_elements: vec!["bash".to_string()],
            authorisations_required: 2,
            subjects: vec!["bob".to_string(), "carol".to_string()],
        };
        assert!(!authorisation_satisfied(&rule, "alice", &["bob".to_string()]));
        assert!(authorisation_satisfied(
            &rule,
            "alice",
            &["bob".to_string(), "carol".to_string()]
        ));
        // Owner sneaking into the approver list invalidates it even if count is met.
        assert!(!authorisation_satisfied(
            &rule,
            "alice",
            &["bob".to_string(), "alice".to_string()]
        ));
    }
}
