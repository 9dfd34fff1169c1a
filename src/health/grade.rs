//! Aggregate system-health grade.
//!
//! The grade is a pure function of the ratio `running / registered`. A
//! disabled service counts in the denominator but never the numerator, so a
//! fleet of ten with one disabled member grades `Excellent` at 90%.

/// Coarse system-health classification derived from the healthy ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HealthGrade {
    /// Below 25% healthy.
    Failed,
    /// 25–50% healthy.
    Critical,
    /// 50–75% healthy.
    Degraded,
    /// 75–90% healthy.
    Good,
    /// 90% or more healthy.
    Excellent,
}

impl HealthGrade {
    /// Maps a healthy ratio in `[0, 1]` to a grade.
    ///
    /// An empty registry has nothing unhealthy to report; callers pass a
    /// ratio of `1.0` for it.
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio >= 0.90 {
            HealthGrade::Excellent
        } else if ratio >= 0.75 {
            HealthGrade::Good
        } else if ratio >= 0.50 {
            HealthGrade::Degraded
        } else if ratio >= 0.25 {
            HealthGrade::Critical
        } else {
            HealthGrade::Failed
        }
    }

    /// Short stable label (snake_case) for logs and events.
    pub fn as_label(&self) -> &'static str {
        match self {
            HealthGrade::Excellent => "excellent",
            HealthGrade::Good => "good",
            HealthGrade::Degraded => "degraded",
            HealthGrade::Critical => "critical",
            HealthGrade::Failed => "failed",
        }
    }

    /// Whether this grade triggers the emergency recovery procedure.
    pub fn is_emergency(&self) -> bool {
        matches!(self, HealthGrade::Critical | HealthGrade::Failed)
    }
}

impl std::fmt::Display for HealthGrade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_label())
    }
}
