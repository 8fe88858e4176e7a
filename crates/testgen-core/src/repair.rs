//! Bounded build-repair policy.
//!
//! Decisions are pure functions of the latest build attempt and the number
//! of repairs already made, so the retry ceiling can be tested without
//! running anything.

use serde::{Deserialize, Serialize};
use testgen_ci::BuildAttempt;

/// Policy governing oracle-assisted build repair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairPolicy {
    /// Repairs allowed after the first failing build.
    pub max_attempts: u32,
}

impl Default for RepairPolicy {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

impl RepairPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts }
    }

    /// Upper bound on build invocations: the first build plus one per repair.
    pub fn max_builds(&self) -> u32 {
        self.max_attempts.saturating_add(1)
    }
}

/// What to do after a build attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RepairDecision {
    /// Build and tests passed.
    Verified,
    /// Ask the oracle for repair number `attempt`, then rebuild.
    Repair { attempt: u32 },
    /// Ceiling reached; continue without a verified build.
    Exhausted { repairs: u32 },
}

/// Decide the next step given the latest build and repairs made so far.
pub fn decide(build: &BuildAttempt, repairs_done: u32, policy: &RepairPolicy) -> RepairDecision {
    if build.success {
        return RepairDecision::Verified;
    }
    if repairs_done >= policy.max_attempts {
        return RepairDecision::Exhausted {
            repairs: repairs_done,
        };
    }
    RepairDecision::Repair {
        attempt: repairs_done.saturating_add(1),
    }
}

/// Oracle input for a repair: every artifact followed by the failure log.
pub fn repair_request<'a>(artifacts: impl IntoIterator<Item = &'a str>, log: &str) -> String {
    let mut request = String::new();
    for code in artifacts {
        request.push_str(code);
        request.push('\n');
    }
    request.push('\n');
    request.push_str(log);
    request
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_is_verified_regardless_of_count() {
        let build = BuildAttempt::passed(4, "ok");
        assert_eq!(decide(&build, 3, &RepairPolicy::default()), RepairDecision::Verified);
    }

    #[test]
    fn test_failure_under_ceiling_repairs() {
        let build = BuildAttempt::failed(1, "error");
        assert_eq!(
            decide(&build, 0, &RepairPolicy::default()),
            RepairDecision::Repair { attempt: 1 }
        );
        assert_eq!(
            decide(&build, 2, &RepairPolicy::default()),
            RepairDecision::Repair { attempt: 3 }
        );
    }

    #[test]
    fn test_failure_at_ceiling_is_exhausted() {
        let build = BuildAttempt::failed(4, "error");
        assert_eq!(
            decide(&build, 3, &RepairPolicy::default()),
            RepairDecision::Exhausted { repairs: 3 }
        );
    }

    #[test]
    fn test_zero_ceiling_never_repairs() {
        let build = BuildAttempt::failed(1, "error");
        assert_eq!(
            decide(&build, 0, &RepairPolicy::new(0)),
            RepairDecision::Exhausted { repairs: 0 }
        );
        assert_eq!(RepairPolicy::new(0).max_builds(), 1);
    }

    #[test]
    fn test_largest_ceiling_does_not_overflow() {
        let policy = RepairPolicy::new(u32::MAX);
        assert_eq!(policy.max_builds(), u32::MAX);
        let build = BuildAttempt::failed(1, "error");
        assert_eq!(
            decide(&build, u32::MAX - 1, &policy),
            RepairDecision::Repair { attempt: u32::MAX }
        );
        assert_eq!(
            decide(&build, u32::MAX, &policy),
            RepairDecision::Exhausted { repairs: u32::MAX }
        );
    }

    #[test]
    fn test_simulated_loop_respects_build_bound() {
        for ceiling in 0..5 {
            let policy = RepairPolicy::new(ceiling);
            let mut builds = 0;
            let mut repairs = 0;
            loop {
                builds += 1;
                let attempt = BuildAttempt::failed(builds, "still broken");
                match decide(&attempt, repairs, &policy) {
                    RepairDecision::Repair { attempt } => repairs = attempt,
                    _ => break,
                }
            }
            assert_eq!(builds, policy.max_builds());
        }
    }

    #[test]
    fn test_repair_request_layout() {
        let request = repair_request(["int a;", "int b;"], "ld: error");
        assert_eq!(request, "int a;\nint b;\n\nld: error");
    }
}
