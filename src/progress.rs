use std::sync::OnceLock;

use regex::Regex;

fn step_of_total_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(\d+)\s*(?:of|/)\s*(\d+)").expect("step regex must compile"))
}

/// Position parsed from a progress indicator such as "Step 3 of 7".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepProgress {
    pub current: u32,
    pub total: u32,
}

impl StepProgress {
    pub fn parse(text: &str) -> Option<Self> {
        let caps = step_of_total_re().captures(text)?;
        let current = caps[1].parse().ok()?;
        let total = caps[2].parse().ok()?;
        (total > 0).then_some(Self { current, total })
    }

    pub fn is_final(&self) -> bool {
        self.current >= self.total
    }
}
