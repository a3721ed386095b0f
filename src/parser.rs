//! Command-line tokenizer.
//!
//! Words are separated by spaces. A word opening with a single quote runs
//! to the next single quote, so `'a b'` is one argument. A final word
//! beginning with `&` requests background execution and is dropped.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    pub argv: Vec<String>,
    pub background: bool,
}

/// Returns `None` for a blank line.
pub fn parse_line(cmdline: &str) -> Option<ParsedLine> {
    let line = cmdline.trim_end_matches(['\n', '\r']);
    let mut argv = Vec::new();
    let mut rest = line.trim_start_matches(' ');

    while !rest.is_empty() {
        let (word, tail) = match rest.strip_prefix('\'') {
            Some(quoted) => match quoted.find('\'') {
                Some(end) => (&quoted[..end], &quoted[end + 1..]),
                // unterminated quote: take the remainder verbatim
                None => (quoted, ""),
            },
            None => match rest.find(' ') {
                Some(end) => (&rest[..end], &rest[end..]),
                None => (rest, ""),
            },
        };
        argv.push(word.to_string());
        rest = tail.trim_start_matches(' ');
    }

    if argv.is_empty() {
        return None;
    }
    let background = argv.last().is_some_and(|w| w.starts_with('&'));
    if background {
        argv.pop();
        if argv.is_empty() {
            return None;
        }
    }
    Some(ParsedLine { argv, background })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::empty("\n")]
    #[case::spaces("    \n")]
    #[case::lone_ampersand("&\n")]
    fn blank_lines(#[case] input: &str) {
        assert_eq!(parse_line(input), None);
    }

    #[rstest]
    #[case::simple("/bin/ls -l\n", &["/bin/ls", "-l"], false)]
    #[case::background("/bin/sleep 10 &\n", &["/bin/sleep", "10"], true)]
    #[case::extra_spaces("  jobs   \n", &["jobs"], false)]
    #[case::quoted("/bin/echo 'hello world' x\n", &["/bin/echo", "hello world", "x"], false)]
    #[case::quoted_last("/bin/echo 'a  b'\n", &["/bin/echo", "a  b"], false)]
    #[case::attached_amp_is_not_background("/bin/sleep 1&\n", &["/bin/sleep", "1&"], false)]
    #[case::no_newline("fg %1", &["fg", "%1"], false)]
    fn words_and_background_flag(
        #[case] input: &str,
        #[case] argv: &[&str],
        #[case] background: bool,
    ) {
        let parsed = parse_line(input).unwrap();
        assert_eq!(parsed.argv, argv);
        assert_eq!(parsed.background, background);
    }
}
