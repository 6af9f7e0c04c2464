//! Safety filter (spec.md §4.2). The policy itself is "fixed but
//! unspecified" upstream; the orchestrator only depends on the three
//! documented output fields, so the policy lives behind a trait.

pub struct SafetyResult {
    pub cleaned_text: String,
    pub flags: Vec<String>,
    pub blocked: bool,
    pub reason: Option<String>,
}

pub trait SafetyFilter: Send + Sync {
    fn inspect(&self, raw: &str) -> SafetyResult;
}

/// A concrete, swappable policy: blocks obvious script-injection/markup,
/// flags shouting and excessive punctuation, otherwise passes through.
pub struct RegexSafetyFilter {
    block_re: regex::Regex,
    profanity_re: regex::Regex,
}

impl Default for RegexSafetyFilter {
    fn default() -> Self {
        Self {
            block_re: regex::Regex::new(r"(?i)<\s*script|javascript:|on\w+\s*=\s*\"").unwrap(),
            profanity_re: regex::Regex::new(r"(?i)\b(damn|hell|stupid idiot)\b").unwrap(),
        }
    }
}

impl SafetyFilter for RegexSafetyFilter {
    fn inspect(&self, raw: &str) -> SafetyResult {
        if self.block_re.is_match(raw) {
            return SafetyResult {
                cleaned_text: String::new(),
                flags: vec!["blocked_markup".into()],
                blocked: true,
                reason: Some("message blocked: contains disallowed script/markup content".into()),
            };
        }

        let mut flags = Vec::new();
        if self.profanity_re.is_match(raw) {
            flags.push("profanity".into());
        }
        let letters: Vec<char> = raw.chars().filter(|c| c.is_alphabetic()).collect();
        if letters.len() > 6 && letters.iter().all(|c| c.is_uppercase()) {
            flags.push("shouting".into());
        }
        if raw.matches(['!', '?']).count() > 5 {
            flags.push("excessive_punctuation".into());
        }

        SafetyResult {
            cleaned_text: raw.trim().to_string(),
            flags,
            blocked: false,
            reason: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_script_tag() {
        let f = RegexSafetyFilter::default();
        let r = f.inspect("<script>evil</script>");
        assert!(r.blocked);
        assert!(r.reason.is_some());
    }

    #[test]
    fn passes_normal_text() {
        let f = RegexSafetyFilter::default();
        let r = f.inspect("Let's practice fractions today.");
        assert!(!r.blocked);
        assert!(r.flags.is_empty());
    }
}
