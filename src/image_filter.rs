use regex::Regex;

/// Regex source that can never match; produced for bracket sets left empty by reversed ranges.
const NEVER_MATCH: &str = r"[^\x{0}-\x{10FFFF}]";

/// Translate a shell-style glob into an anchored regex source.
///
/// `*` matches any run of characters (including `/`), `?` matches one character and
/// `[...]` matches one character from a set or range, negated with a leading `!`.
/// Every other character is matched literally. An unclosed `[` is a literal `[`.
pub fn translate(glob: &str) -> String {
    let chars: Vec<char> = glob.chars().collect();
    let mut out = String::from("(?s)^");
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        i += 1;
        match c {
            '*' => {
                while chars.get(i) == Some(&'*') {
                    i += 1;
                }
                out.push_str(".*");
            }
            '?' => out.push('.'),
            '[' => match bracket_end(&chars, i) {
                Some(end) => {
                    out.push_str(&translate_set(&chars[i..end]));
                    i = end + 1;
                }
                None => out.push_str(r"\["),
            },
            _ => out.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }

    out.push('$');
    out
}

/// Index of the `]` closing a set that opens just before `start`. A `]` directly after
/// `[` or `[!` is a member of the set rather than its end.
fn bracket_end(chars: &[char], start: usize) -> Option<usize> {
    let mut j = start;
    if chars.get(j) == Some(&'!') {
        j += 1;
    }
    if chars.get(j) == Some(&']') {
        j += 1;
    }
    while j < chars.len() && chars[j] != ']' {
        j += 1;
    }
    (j < chars.len()).then_some(j)
}

fn translate_set(body: &[char]) -> String {
    let (negated, body) = match body.split_first() {
        Some(('!', rest)) => (true, rest),
        _ => (false, body),
    };

    let mut ranges = Vec::new();
    let mut k = 0;
    while k < body.len() {
        let lo = body[k];
        if k + 2 < body.len() && body[k + 1] == '-' {
            let hi = body[k + 2];
            // reversed ranges contribute nothing
            if lo <= hi {
                ranges.push((lo, hi));
            }
            k += 3;
        } else {
            ranges.push((lo, lo));
            k += 1;
        }
    }

    if ranges.is_empty() {
        return if negated { ".".to_string() } else { NEVER_MATCH.to_string() };
    }

    let mut out = String::from(if negated { "[^" } else { "[" });
    for (lo, hi) in ranges {
        out.push_str(&escape_set_char(lo));
        if lo != hi {
            out.push('-');
            out.push_str(&escape_set_char(hi));
        }
    }
    out.push(']');
    out
}

fn escape_set_char(c: char) -> String {
    format!(r"\x{{{:X}}}", c as u32)
}

/// One configured glob over `<repository>:<tag>`.
#[derive(Debug, Clone)]
pub struct ImageTagFilter {
    pattern: String,
    matcher: Regex,
}

impl ImageTagFilter {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let matcher = Regex::new(&translate(pattern))?;
        Ok(Self {
            pattern: pattern.to_string(),
            matcher,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn matches(&self, image_reference: &str) -> bool {
        self.matcher.is_match(image_reference)
    }
}

/// Filters in configured order.
#[derive(Debug, Clone, Default)]
pub struct ImageTagFilters {
    filters: Vec<ImageTagFilter>,
}

impl ImageTagFilters {
    pub fn new(patterns: &[String]) -> Result<Self, (String, regex::Error)> {
        let filters = patterns
            .iter()
            .map(|pattern| ImageTagFilter::new(pattern).map_err(|e| (pattern.clone(), e)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { filters })
    }

    /// The earliest filter matching the whole reference.
    pub fn first_match(&self, image_reference: &str) -> Option<&ImageTagFilter> {
        self.filters.iter().find(|filter| filter.matches(image_reference))
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glob_matches(pattern: &str, value: &str) -> bool {
        ImageTagFilter::new(pattern).unwrap().matches(value)
    }

    fn filters(patterns: &[&str]) -> ImageTagFilters {
        let patterns: Vec<String> = patterns.iter().map(|p| p.to_string()).collect();
        ImageTagFilters::new(&patterns).unwrap()
    }

    #[test]
    fn test_translate_escapes_literals() {
        assert_eq!(translate("a.b*"), r"(?s)^a\.b.*$");
        assert_eq!(translate("repo:v?"), r"(?s)^repo:v.$");
        assert_eq!(translate("a**b"), r"(?s)^a.*b$");
        assert_eq!(translate("[ab]"), r"(?s)^[\x{61}\x{62}]$");
    }

    #[test]
    fn test_star_matches_any_run_including_slashes() {
        assert!(glob_matches("myrepo:*", "myrepo:v1"));
        assert!(glob_matches("myrepo:*", "myrepo:"));
        assert!(glob_matches("team/*:latest", "team/a/b:latest"));
        assert!(glob_matches("*", "anything/at:all"));
        assert!(!glob_matches("myrepo:*", "otherrepo:v1"));
    }

    #[test]
    fn test_matching_is_anchored() {
        assert!(!glob_matches("repo", "repo:latest"));
        assert!(!glob_matches("repo:latest", "myrepo:latest"));
        assert!(!glob_matches("repo:v1", "repo:v10"));
        assert!(glob_matches("myrepo:", "myrepo:"));
    }

    #[test]
    fn test_question_mark_matches_one_char() {
        assert!(glob_matches("repo:v?", "repo:v1"));
        assert!(!glob_matches("repo:v?", "repo:v"));
        assert!(!glob_matches("repo:v?", "repo:v12"));
    }

    #[test]
    fn test_bracket_sets() {
        assert!(glob_matches("repo:v[0-9]", "repo:v7"));
        assert!(!glob_matches("repo:v[0-9]", "repo:vx"));
        assert!(glob_matches("repo:[!a]", "repo:b"));
        assert!(!glob_matches("repo:[!a]", "repo:a"));
        assert!(glob_matches("repo:[]]", "repo:]"));
        assert!(glob_matches("repo:[a-]", "repo:-"));
        assert!(glob_matches("repo:[a-]", "repo:a"));
    }

    #[test]
    fn test_reversed_ranges() {
        assert!(!glob_matches("repo:[z-a]", "repo:m"));
        assert!(glob_matches("repo:[!z-a]", "repo:m"));
    }

    #[test]
    fn test_metacharacters_are_literal() {
        assert!(glob_matches("repo:v1.0", "repo:v1.0"));
        assert!(!glob_matches("repo:v1.0", "repo:v1x0"));
        assert!(glob_matches("repo:[abc", "repo:[abc"));
        assert!(glob_matches("repo:{a,b}", "repo:{a,b}"));
        assert!(!glob_matches("repo:{a,b}", "repo:a"));
        assert!(glob_matches(r"repo:\d", r"repo:\d"));
        assert!(glob_matches("repo:(x|y)+", "repo:(x|y)+"));
        assert!(glob_matches("repo:[&&]", "repo:&"));
    }

    #[test]
    fn test_matching_is_case_sensitive() {
        assert!(!glob_matches("MyRepo:*", "myrepo:v1"));
    }

    #[test]
    fn test_first_match_follows_configured_order() {
        let list = filters(&["other:*", "myrepo:v*", "myrepo:*"]);
        assert_eq!(list.len(), 3);
        assert_eq!(list.first_match("myrepo:v1").unwrap().pattern(), "myrepo:v*");
        assert_eq!(list.first_match("myrepo:latest").unwrap().pattern(), "myrepo:*");
        assert!(list.first_match("unrelated:v1").is_none());

        for _ in 0..3 {
            assert_eq!(list.first_match("myrepo:v1").unwrap().pattern(), "myrepo:v*");
        }
    }

    #[test]
    fn test_empty_pattern_only_matches_empty_reference() {
        let list = filters(&[""]);
        assert_eq!(list.len(), 1);
        assert!(list.first_match("myrepo:").is_none());
        assert!(list.first_match("").is_some());
    }
}
