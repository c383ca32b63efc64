//! Output-parser seam.
//!
//! Test binaries talk to the grader through tab-separated `key<TAB>value`
//! lines on stdout. The pipeline only interprets the reserved `result` key
//! (`pass | fail | done`) and the `time` key; everything else is collected
//! verbatim for the reporter. Exercise-specific meaning of those fields
//! lives outside this crate.

use std::collections::BTreeMap;

/// Classification of one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Test driver reported a correct result.
    Pass,
    /// Test driver ran to completion and reported a wrong answer.
    Fail,
    /// Test driver finished a run with no pass/fail notion (benchmarks).
    Done,
    /// The process exceeded its timeout and was killed.
    Timeout,
    /// Infrastructure failure: crash, missing protocol output, tool error.
    Error,
}

impl Verdict {
    /// True for outcomes that count as a successful run.
    pub fn is_success(&self) -> bool {
        matches!(self, Verdict::Pass | Verdict::Done)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Pass => "pass",
            Verdict::Fail => "fail",
            Verdict::Done => "done",
            Verdict::Timeout => "timeout",
            Verdict::Error => "error",
        }
    }
}

/// Structured view of a test binary's stdout.
#[derive(Debug, Clone)]
pub struct ParsedOutput {
    pub verdict: Verdict,
    /// Wall time reported by the test driver itself, if any.
    pub time: Option<f64>,
    /// All other `key<TAB>value` fields in input order (last wins per key).
    pub fields: BTreeMap<String, String>,
}

/// Parse tab-separated driver output.
///
/// Missing or unrecognized `result` values classify as [`Verdict::Error`]:
/// the program ran but did not complete the reporting protocol.
pub fn parse_output(text: &str) -> ParsedOutput {
    let mut verdict = Verdict::Error;
    let mut time = None;
    let mut fields = BTreeMap::new();

    for line in text.lines() {
        let Some((key, value)) = line.split_once('\t') else {
            continue;
        };
        match key {
            "result" => {
                verdict = match value {
                    "pass" => Verdict::Pass,
                    "fail" => Verdict::Fail,
                    "done" => Verdict::Done,
                    _ => Verdict::Error,
                }
            }
            "time" => time = value.parse().ok(),
            _ => {
                fields.insert(key.to_string(), value.to_string());
            }
        }
    }

    ParsedOutput {
        verdict,
        time,
        fields,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_passing_run() {
        let parsed = parse_output("time\t0.125\nresult\tpass\nn\t1000\n");
        assert_eq!(parsed.verdict, Verdict::Pass);
        assert_eq!(parsed.time, Some(0.125));
        assert_eq!(parsed.fields.get("n").map(String::as_str), Some("1000"));
    }

    #[test]
    fn parses_failing_run() {
        let parsed = parse_output("result\tfail\nerror\twrong output at (2,3)\n");
        assert_eq!(parsed.verdict, Verdict::Fail);
        assert!(!parsed.verdict.is_success());
    }

    #[test]
    fn benchmark_done_is_success() {
        let parsed = parse_output("time\t1.5\nresult\tdone\n");
        assert_eq!(parsed.verdict, Verdict::Done);
        assert!(parsed.verdict.is_success());
    }

    #[test]
    fn missing_result_is_an_error() {
        let parsed = parse_output("some stray output\nwithout tabs\n");
        assert_eq!(parsed.verdict, Verdict::Error);
    }

    #[test]
    fn unknown_result_value_is_an_error() {
        let parsed = parse_output("result\tmaybe\n");
        assert_eq!(parsed.verdict, Verdict::Error);
    }

    #[test]
    fn lines_without_tab_are_ignored() {
        let parsed = parse_output("warming up...\nresult\tpass\n");
        assert_eq!(parsed.verdict, Verdict::Pass);
        assert!(parsed.fields.is_empty());
    }
}
