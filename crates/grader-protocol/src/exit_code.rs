//! Exit status smuggled in the last output line.
//!
//! The only channel guaranteed to cross the trust boundary is the worker's
//! captured text stream, so the worker appends its exit status as a final
//! line and the client strips it back off. This is a deliberate protocol
//! wart; it is kept bit-for-bit compatible and confined to this module.
//!
//! Decoding is total: a trailing line that is not a non-negative integer of
//! at most three digits leaves the output untouched and implies exit code 0.

/// Append `code` as the trailing line of `output`.
pub fn append_exit_code(output: &str, code: i32) -> String {
    format!("{output}\n{code}")
}

/// Split a trailing exit-status line off `output`.
///
/// Returns the remaining output and the decoded exit code (0 when no valid
/// trailing line is present).
pub fn split_exit_code(output: &str) -> (&str, i32) {
    let Some((rest, last)) = output.rsplit_once('\n') else {
        return (output, 0);
    };
    if last.is_empty() || last.len() > 3 || !last.bytes().all(|b| b.is_ascii_digit()) {
        return (output, 0);
    }
    match last.parse::<i32>() {
        Ok(code) => (rest, code),
        Err(_) => (output, 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_strips_exactly_the_appended_line() {
        let encoded = append_exit_code("compiling\nrunning tests\n", 1);
        let (output, code) = split_exit_code(&encoded);
        assert_eq!(output, "compiling\nrunning tests\n");
        assert_eq!(code, 1);
    }

    #[test]
    fn zero_after_success_is_stripped() {
        let (output, code) = split_exit_code("all tests passed\n0");
        assert_eq!(output, "all tests passed");
        assert_eq!(code, 0);
    }

    #[test]
    fn three_digit_codes_decode() {
        let (output, code) = split_exit_code("done\n255");
        assert_eq!(output, "done");
        assert_eq!(code, 255);
    }

    #[test]
    fn four_digits_are_left_intact() {
        let (output, code) = split_exit_code("done\n1234");
        assert_eq!(output, "done\n1234");
        assert_eq!(code, 0);
    }

    #[test]
    fn non_numeric_trailing_line_is_left_intact() {
        let (output, code) = split_exit_code("done\nok");
        assert_eq!(output, "done\nok");
        assert_eq!(code, 0);
    }

    #[test]
    fn negative_code_is_left_intact() {
        let (output, code) = split_exit_code("done\n-1");
        assert_eq!(output, "done\n-1");
        assert_eq!(code, 0);
    }

    #[test]
    fn output_without_newline_is_left_intact() {
        let (output, code) = split_exit_code("no newline here");
        assert_eq!(output, "no newline here");
        assert_eq!(code, 0);
    }

    #[test]
    fn trailing_newline_is_left_intact() {
        let (output, code) = split_exit_code("ends with newline\n");
        assert_eq!(output, "ends with newline\n");
        assert_eq!(code, 0);
    }

    #[test]
    fn decode_is_idempotent_on_stripped_output() {
        let encoded = append_exit_code("a\nb", 7);
        let (once, code) = split_exit_code(&encoded);
        assert_eq!(code, 7);
        // "b" is not a digit line, so a second pass changes nothing.
        let (twice, code2) = split_exit_code(once);
        assert_eq!(twice, once);
        assert_eq!(code2, 0);
    }
}
